//! Focus tracker: which conversation each identity is actively viewing.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct FocusTracker {
    viewing: HashMap<String, String>,
}

impl FocusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_focus(&mut self, identity_id: &str, conversation_id: &str) {
        self.viewing
            .insert(identity_id.to_string(), conversation_id.to_string());
    }

    /// Clear the focus only if it still points at `conversation_id`; a focus
    /// that has since moved elsewhere stays untouched.
    pub fn clear_focus(&mut self, identity_id: &str, conversation_id: &str) -> bool {
        if self.viewing.get(identity_id).map(String::as_str) == Some(conversation_id) {
            self.viewing.remove(identity_id);
            true
        } else {
            false
        }
    }

    /// Drop whatever the identity was viewing (confirmed offline)
    pub fn clear_all(&mut self, identity_id: &str) {
        self.viewing.remove(identity_id);
    }

    /// The single predicate the fan-out engine uses to pick between
    /// unread-increment and immediate-read behavior
    pub fn is_focused(&self, identity_id: &str, conversation_id: &str) -> bool {
        self.viewing.get(identity_id).map(String::as_str) == Some(conversation_id)
    }
}

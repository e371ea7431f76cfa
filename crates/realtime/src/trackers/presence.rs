//! Presence tracker: the set of identities currently considered online.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct PresenceTracker {
    online: HashSet<String>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identity to the presence set. Returns whether this is a fresh
    /// online transition (`false` on rapid reconnect).
    pub fn mark_online(&mut self, identity_id: &str) -> bool {
        self.online.insert(identity_id.to_string())
    }

    /// Remove an identity from the presence set. Returns whether it was
    /// online, so a confirmed offline transition is announced exactly once.
    pub fn mark_offline(&mut self, identity_id: &str) -> bool {
        self.online.remove(identity_id)
    }

    pub fn is_online(&self, identity_id: &str) -> bool {
        self.online.contains(identity_id)
    }

    /// Stable snapshot of the online set
    pub fn snapshot(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.online.iter().cloned().collect();
        ids.sort();
        ids
    }
}

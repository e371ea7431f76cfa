//! Typing tracker: per-conversation map of identities currently typing.
//!
//! Entries carry the instant of the last typing signal. An entry older than
//! the staleness window is treated as not-typing even before the periodic
//! sweep removes it, which covers clients that vanish without a clean stop
//! signal.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct TypingTracker {
    typing: HashMap<String, HashMap<String, Instant>>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or clear a typing signal. Returns the previous observable
    /// state so the caller emits an event only when the state actually
    /// changed: repeated `true` signals refresh the timestamp silently.
    pub fn set_typing(
        &mut self,
        conversation_id: &str,
        identity_id: &str,
        is_typing: bool,
        now: Instant,
        ttl: Duration,
    ) -> bool {
        if is_typing {
            let previous = self
                .typing
                .entry(conversation_id.to_string())
                .or_default()
                .insert(identity_id.to_string(), now);
            previous.is_some_and(|at| now.duration_since(at) <= ttl)
        } else {
            let Some(entries) = self.typing.get_mut(conversation_id) else {
                return false;
            };
            let previous = entries.remove(identity_id);
            if entries.is_empty() {
                self.typing.remove(conversation_id);
            }
            previous.is_some_and(|at| now.duration_since(at) <= ttl)
        }
    }

    /// Identities with a live (non-stale) typing entry in a conversation
    pub fn active_typists(&self, conversation_id: &str, now: Instant, ttl: Duration) -> Vec<String> {
        let Some(entries) = self.typing.get(conversation_id) else {
            return Vec::new();
        };
        let mut typists: Vec<String> = entries
            .iter()
            .filter(|(_, at)| now.duration_since(**at) <= ttl)
            .map(|(identity_id, _)| identity_id.clone())
            .collect();
        typists.sort();
        typists
    }

    /// Remove every entry older than the staleness window, returning the
    /// removed `(conversation, identity)` pairs so the caller can emit a
    /// typing-stopped event for each
    pub fn sweep(&mut self, now: Instant, ttl: Duration) -> Vec<(String, String)> {
        let mut expired = Vec::new();
        self.typing.retain(|conversation_id, entries| {
            entries.retain(|identity_id, at| {
                if now.duration_since(*at) > ttl {
                    expired.push((conversation_id.clone(), identity_id.clone()));
                    false
                } else {
                    true
                }
            });
            !entries.is_empty()
        });
        expired.sort();
        expired
    }

    /// Remove the identity from every conversation it appears in, returning
    /// the conversation ids (confirmed offline path)
    pub fn clear_identity(&mut self, identity_id: &str) -> Vec<String> {
        let mut cleared = Vec::new();
        self.typing.retain(|conversation_id, entries| {
            if entries.remove(identity_id).is_some() {
                cleared.push(conversation_id.clone());
            }
            !entries.is_empty()
        });
        cleared.sort();
        cleared
    }
}

//! Connection hub: per-connection outbound channels and topic groups.
//!
//! Every live connection registers an unbounded sender; a writer task on the
//! transport side drains the matching receiver into the socket, so delivery
//! order per connection is the channel order. Topic groups collect the
//! connections that receive a conversation's or identity's broadcasts.

use crate::types::events::ServerEvent;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Message pushed to a connection's writer task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Event(ServerEvent),
    /// Instructs the writer task to drop the socket (forced close)
    Close,
}

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

/// Topic id for a conversation's live group
pub fn conversation_topic(conversation_id: &str) -> String {
    format!("conversation:{conversation_id}")
}

/// Topic id for direct delivery to an identity's connection
pub fn identity_topic(identity_id: &str) -> String {
    format!("identity:{identity_id}")
}

#[derive(Default)]
struct HubInner {
    connections: HashMap<String, OutboundSender>,
    topics: HashMap<String, HashSet<String>>,
}

/// Shared registry of live connections and topic membership
#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<Mutex<HubInner>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound channel
    pub fn register(&self, connection_id: &str, sender: OutboundSender) {
        let mut inner = self.inner.lock().unwrap();
        inner.connections.insert(connection_id.to_string(), sender);
    }

    /// Remove a connection and purge its topic memberships
    pub fn unregister(&self, connection_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.connections.remove(connection_id);
        inner.topics.retain(|_, members| {
            members.remove(connection_id);
            !members.is_empty()
        });
    }

    /// Force-close a connection: tell its writer task to drop the socket,
    /// then forget it
    pub fn close_connection(&self, connection_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(sender) = inner.connections.remove(connection_id) {
            let _ = sender.send(Outbound::Close);
        }
        inner.topics.retain(|_, members| {
            members.remove(connection_id);
            !members.is_empty()
        });
    }

    pub fn send_to_connection(&self, connection_id: &str, event: ServerEvent) {
        let inner = self.inner.lock().unwrap();
        if let Some(sender) = inner.connections.get(connection_id) {
            let _ = sender.send(Outbound::Event(event));
        }
    }

    /// Deliver an event to every member of a topic, optionally excluding one
    /// connection (typically the originator)
    pub fn send_to_topic(&self, topic: &str, event: ServerEvent, exclude: Option<&str>) {
        let inner = self.inner.lock().unwrap();
        let Some(members) = inner.topics.get(topic) else {
            return;
        };
        for connection_id in members {
            if exclude == Some(connection_id.as_str()) {
                continue;
            }
            if let Some(sender) = inner.connections.get(connection_id) {
                let _ = sender.send(Outbound::Event(event.clone()));
            }
        }
    }

    /// Deliver an event to every registered connection
    pub fn broadcast(&self, event: ServerEvent, exclude: Option<&str>) {
        let inner = self.inner.lock().unwrap();
        for (connection_id, sender) in &inner.connections {
            if exclude == Some(connection_id.as_str()) {
                continue;
            }
            let _ = sender.send(Outbound::Event(event.clone()));
        }
    }

    pub fn join_topic(&self, topic: &str, connection_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .topics
            .entry(topic.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    pub fn leave_topic(&self, topic: &str, connection_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(members) = inner.topics.get_mut(topic) {
            members.remove(connection_id);
            if members.is_empty() {
                inner.topics.remove(topic);
            }
        }
    }

    pub fn topic_contains(&self, topic: &str, connection_id: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .topics
            .get(topic)
            .map(|members| members.contains(connection_id))
            .unwrap_or(false)
    }
}

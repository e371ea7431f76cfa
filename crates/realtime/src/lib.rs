//! Intercom realtime core: the presence & messaging coordinator.
//!
//! The coordinator sits between many concurrent bidirectional client
//! connections and the persistence store. It keeps the in-memory session
//! state (who is online, which connection represents which identity, who is
//! viewing which conversation, who is typing) consistent with the persisted
//! conversation state, and fans events out to the right subset of
//! connections in emission order.

pub mod coordinator;
mod fanout;
pub mod hub;
pub mod trackers;
pub mod types;

pub use coordinator::Coordinator;
pub use hub::{conversation_topic, identity_topic, Hub, Outbound, OutboundReceiver, OutboundSender};
pub use types::errors::{CoordinatorError, CoordinatorResult};
pub use types::events::{ClientEvent, ServerEvent};

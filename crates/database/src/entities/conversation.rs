//! Conversation and participant entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub kind: ConversationKind,
    pub group_name: Option<String>,
    pub participants: Vec<Participant>,
    pub last_message: Option<LastMessage>,
    pub created_at: String,
    pub updated_at: String,
}

impl Conversation {
    /// Look up a participant record by identity id
    pub fn participant(&self, identity_id: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.identity_id == identity_id)
    }

    pub fn is_participant(&self, identity_id: &str) -> bool {
        self.participant(identity_id).is_some()
    }

    /// The other side of a private conversation, if there is exactly one
    pub fn other_participant(&self, identity_id: &str) -> Option<&Participant> {
        if self.kind != ConversationKind::Private {
            return None;
        }
        self.participants
            .iter()
            .find(|p| p.identity_id != identity_id)
    }
}

/// Membership record of one identity within one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub identity_id: String,
    pub display_name: String,
    pub role: ParticipantRole,
    pub unread_count: i64,
}

/// Denormalized last-message summary used for conversation-list previews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub message_id: String,
    pub content: String,
    pub sender_id: String,
    pub sender_name: String,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConversationRequest {
    pub kind: ConversationKind,
    pub group_name: Option<String>,
    pub participants: Vec<NewParticipant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParticipant {
    pub identity_id: String,
    pub role: Option<ParticipantRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Private,
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Private => "private",
            ConversationKind::Group => "group",
        }
    }
}

impl From<&str> for ConversationKind {
    fn from(s: &str) -> Self {
        match s {
            "group" => ConversationKind::Group,
            _ => ConversationKind::Private,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Admin,
    Member,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Admin => "admin",
            ParticipantRole::Member => "member",
        }
    }
}

impl From<&str> for ParticipantRole {
    fn from(s: &str) -> Self {
        match s {
            "admin" => ParticipantRole::Admin,
            _ => ParticipantRole::Member,
        }
    }
}

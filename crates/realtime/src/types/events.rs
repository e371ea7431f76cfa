//! Wire event types exchanged with clients.
//!
//! The serialized names match the socket protocol the frontend speaks:
//! `{"type": "<event name>", "data": {...}}`.

use intercom_database::{LastMessage, MessageStatus};
use serde::{Deserialize, Serialize};

/// Events accepted from clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "joinConversation", rename_all = "camelCase")]
    JoinConversation {
        identity_id: String,
        conversation_id: String,
    },

    #[serde(rename = "leaveConversation", rename_all = "camelCase")]
    LeaveConversation {
        identity_id: String,
        conversation_id: String,
    },

    #[serde(rename = "sendMessage", rename_all = "camelCase")]
    SendMessage {
        conversation_id: String,
        sender_id: String,
        content: String,
        #[serde(default)]
        temp_id: Option<String>,
    },

    #[serde(rename = "messageSeen", rename_all = "camelCase")]
    MessageSeen {
        identity_id: String,
        conversation_id: String,
    },

    #[serde(rename = "setTyping", rename_all = "camelCase")]
    SetTyping {
        identity_id: String,
        conversation_id: String,
        is_typing: bool,
    },

    /// Refresh/repair the session binding without a full reconnect
    #[serde(rename = "keepalive", rename_all = "camelCase")]
    Keepalive {
        #[serde(default)]
        identity_id: Option<String>,
    },

    /// Replay the currently-typing identities across all of the requester's
    /// conversations
    #[serde(rename = "subscribeChatList", rename_all = "camelCase")]
    SubscribeChatList { identity_id: String },
}

/// Events pushed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "user-online", rename_all = "camelCase")]
    UserOnline { identity_id: String },

    #[serde(rename = "user-offline", rename_all = "camelCase")]
    UserOffline { identity_id: String },

    /// Snapshot of the online set, delivered to a freshly bound connection
    #[serde(rename = "online-users", rename_all = "camelCase")]
    OnlineUsers { identity_ids: Vec<String> },

    #[serde(rename = "receive_message", rename_all = "camelCase")]
    ReceiveMessage {
        message_id: String,
        sender_id: String,
        content: String,
        timestamp: i64,
        status: MessageStatus,
    },

    /// Delivery confirmation back to the sender, correlating the client's
    /// optimistic temporary id
    #[serde(rename = "message_confirmation", rename_all = "camelCase")]
    MessageConfirmation {
        message_id: String,
        temp_id: Option<String>,
        content: String,
        timestamp: i64,
        status: MessageStatus,
    },

    #[serde(rename = "message_failed", rename_all = "camelCase")]
    MessageFailed {
        error: String,
        temp_id: Option<String>,
    },

    /// Conversation-list update: new preview and the receiver's own unread
    /// count
    #[serde(rename = "chat_update", rename_all = "camelCase")]
    ChatUpdate {
        conversation_id: String,
        last_message: Option<LastMessage>,
        unread_count: i64,
    },

    #[serde(rename = "message_status_update", rename_all = "camelCase")]
    MessageStatusUpdate {
        message_id: String,
        status: MessageStatus,
    },

    #[serde(rename = "user_typing", rename_all = "camelCase")]
    UserTyping {
        identity_id: String,
        conversation_id: String,
        is_typing: bool,
    },

    #[serde(rename = "pong_connection", rename_all = "camelCase")]
    Pong { success: bool },
}

//! Message fan-out engine: persist a new message, recompute unread counts,
//! and deliver events to the right subset of connections.

use crate::coordinator::{require_id, Coordinator};
use crate::hub::conversation_topic;
use crate::types::errors::{CoordinatorError, CoordinatorResult};
use crate::types::events::ServerEvent;
use intercom_database::{
    Conversation, ConversationKind, CreateMessageRequest, LastMessage, MessageStatus,
};
use tracing::{info, warn};

impl Coordinator {
    /// Send a message into a conversation.
    ///
    /// Persistence (message row, last-message summary, unread counts) runs
    /// under the conversation lock and completes before any event is
    /// emitted, so a failure never produces a partial fan-out. The caller
    /// turns an `Err` into a `message_failed` event for the sender only.
    pub(crate) async fn send_message(
        &self,
        connection_id: &str,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
        temp_id: Option<String>,
    ) -> CoordinatorResult<()> {
        require_id(conversation_id, "conversationId")?;
        require_id(sender_id, "senderId")?;
        if content.trim().is_empty() {
            return Err(CoordinatorError::invalid_input(
                "message content must not be empty",
            ));
        }

        // Serialize with other sends and read-sweeps on this conversation.
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        let conversation = self
            .load_conversation_for(sender_id, conversation_id)
            .await?;
        let sender_name = conversation
            .participant(sender_id)
            .map(|p| p.display_name.clone())
            .ok_or_else(|| CoordinatorError::not_participant(sender_id, conversation_id))?;

        let message = self
            .store
            .messages()
            .create(&CreateMessageRequest {
                conversation_id: conversation_id.to_string(),
                sender_id: sender_id.to_string(),
                content: content.to_string(),
            })
            .await?;

        // Focused participants stay at zero unread; everyone else (except
        // the sender, whose row is untouched) gets an increment.
        let (reset_to_zero, increment) = {
            let focus = self.focus.lock().unwrap();
            let mut reset = Vec::new();
            let mut increment = Vec::new();
            for participant in &conversation.participants {
                if participant.identity_id == sender_id {
                    continue;
                }
                if focus.is_focused(&participant.identity_id, conversation_id) {
                    reset.push(participant.identity_id.clone());
                } else {
                    increment.push(participant.identity_id.clone());
                }
            }
            (reset, increment)
        };

        let summary = LastMessage {
            message_id: message.id.clone(),
            content: message.content.clone(),
            sender_id: sender_id.to_string(),
            sender_name,
            timestamp_ms: message.created_at_ms,
        };

        let participants = self
            .store
            .conversations()
            .apply_message_update(conversation_id, &summary, &reset_to_zero, &increment)
            .await?;

        // Everything is persisted; fan-out starts here.
        self.hub.send_to_topic(
            &conversation_topic(conversation_id),
            ServerEvent::ReceiveMessage {
                message_id: message.id.clone(),
                sender_id: sender_id.to_string(),
                content: message.content.clone(),
                timestamp: message.created_at_ms,
                status: MessageStatus::Sent,
            },
            Some(connection_id),
        );

        self.hub.send_to_connection(
            connection_id,
            ServerEvent::MessageConfirmation {
                message_id: message.id.clone(),
                temp_id,
                content: message.content.clone(),
                timestamp: message.created_at_ms,
                status: MessageStatus::Sent,
            },
        );

        // Conversation-list updates go to every participant's bound
        // connection, inside the topic group or not.
        {
            let sessions = self.sessions.lock().unwrap();
            for participant in &participants {
                if let Some(target) = sessions.connection_for(&participant.identity_id) {
                    self.hub.send_to_connection(
                        target,
                        ServerEvent::ChatUpdate {
                            conversation_id: conversation_id.to_string(),
                            last_message: Some(summary.clone()),
                            unread_count: participant.unread_count,
                        },
                    );
                }
            }
        }

        // Private-chat fast path: the other side is already looking at the
        // conversation, so the message is read without a messageSeen round
        // trip.
        if conversation.kind == ConversationKind::Private {
            let focused_reader = conversation
                .other_participant(sender_id)
                .filter(|other| {
                    self.focus
                        .lock()
                        .unwrap()
                        .is_focused(&other.identity_id, conversation_id)
                })
                .map(|other| other.identity_id.clone());

            if let Some(reader_id) = focused_reader {
                match self.store.messages().mark_read(&message.id).await {
                    Ok(true) => {
                        self.hub.send_to_connection(
                            connection_id,
                            ServerEvent::MessageStatusUpdate {
                                message_id: message.id.clone(),
                                status: MessageStatus::Read,
                            },
                        );
                        info!(
                            message_id = %message.id,
                            reader_id = %reader_id,
                            "message read immediately, reader already viewing"
                        );
                    }
                    Ok(false) => {}
                    Err(error) => warn!(
                        message_id = %message.id,
                        %error,
                        "failed to mark message read on the focused-reader path"
                    ),
                }
            }
        }

        info!(
            conversation_id,
            sender_id,
            message_id = %message.id,
            "message fanned out"
        );
        Ok(())
    }

    /// Transition the viewer's unread private messages to `read` (notifying
    /// each original sender) and zero the viewer's unread count. Group
    /// conversations only get the unread reset; per-message read receipts
    /// are not propagated for them.
    pub(crate) async fn read_sweep(
        &self,
        viewer_id: &str,
        conversation: &Conversation,
    ) -> CoordinatorResult<()> {
        let lock = self.conversation_lock(&conversation.id);
        let _guard = lock.lock().await;

        if conversation.kind == ConversationKind::Private {
            let unread = self
                .store
                .messages()
                .find_unread_for_reader(&conversation.id, viewer_id)
                .await?;

            for message in unread {
                if self.store.messages().mark_read(&message.id).await? {
                    let sender_connection = self
                        .sessions
                        .lock()
                        .unwrap()
                        .connection_for(&message.sender_id)
                        .map(str::to_string);
                    if let Some(target) = sender_connection {
                        self.hub.send_to_connection(
                            &target,
                            ServerEvent::MessageStatusUpdate {
                                message_id: message.id.clone(),
                                status: MessageStatus::Read,
                            },
                        );
                    }
                }
            }
        }

        self.store
            .conversations()
            .reset_unread(&conversation.id, viewer_id)
            .await?;

        let viewer_connection = self
            .sessions
            .lock()
            .unwrap()
            .connection_for(viewer_id)
            .map(str::to_string);
        if let Some(target) = viewer_connection {
            self.hub.send_to_connection(
                &target,
                ServerEvent::ChatUpdate {
                    conversation_id: conversation.id.clone(),
                    last_message: conversation.last_message.clone(),
                    unread_count: 0,
                },
            );
        }

        Ok(())
    }
}

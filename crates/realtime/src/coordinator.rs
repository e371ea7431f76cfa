//! Coordinator: owns the session/presence/focus/typing state, binds it to
//! connection lifecycle events and in-band requests, and fans events out
//! through the hub.
//!
//! Lock discipline: the tracker mutexes are `std::sync::Mutex` with short
//! critical sections that never span an await; acquisition order is
//! sessions → presence → focus → typing. Persistence-ordering per
//! conversation is handled by `conversation_lock`.

use crate::hub::{conversation_topic, identity_topic, Hub};
use crate::trackers::{FocusTracker, PresenceTracker, SessionRegistry, TypingTracker};
use crate::types::errors::{CoordinatorError, CoordinatorResult};
use crate::types::events::{ClientEvent, ServerEvent};
use intercom_config::RealtimeConfig;
use intercom_database::{Conversation, Store};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct Coordinator {
    pub(crate) hub: Hub,
    pub(crate) store: Store,
    pub(crate) sessions: Mutex<SessionRegistry>,
    pub(crate) presence: Mutex<PresenceTracker>,
    pub(crate) focus: Mutex<FocusTracker>,
    pub(crate) typing: Mutex<TypingTracker>,
    conversation_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    config: RealtimeConfig,
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn require_id(value: &str, field: &str) -> CoordinatorResult<()> {
    if value.trim().is_empty() {
        return Err(CoordinatorError::invalid_input(format!(
            "{field} is required"
        )));
    }
    Ok(())
}

impl Coordinator {
    pub fn new(hub: Hub, store: Store, config: RealtimeConfig) -> Self {
        Self {
            hub,
            store,
            sessions: Mutex::new(SessionRegistry::new()),
            presence: Mutex::new(PresenceTracker::new()),
            focus: Mutex::new(FocusTracker::new()),
            typing: Mutex::new(TypingTracker::new()),
            conversation_locks: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    fn offline_grace(&self) -> Duration {
        Duration::from_millis(self.config.offline_grace_ms)
    }

    pub(crate) fn typing_ttl(&self) -> Duration {
        Duration::from_millis(self.config.typing_ttl_ms)
    }

    fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.config.typing_sweep_interval_ms)
    }

    /// Serialization handle for one conversation's message persistence and
    /// fan-out. Different conversations proceed concurrently.
    pub(crate) fn conversation_lock(&self, conversation_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.conversation_locks.lock().unwrap();
        locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Handshake of a freshly registered connection: bind the session
    /// (evicting any previous connection for the identity), mark presence,
    /// persist last-seen, announce a fresh online transition, and deliver
    /// the current online set to the new connection.
    pub async fn connect(&self, connection_id: &str, identity_id: &str) {
        if identity_id.trim().is_empty() {
            warn!(connection_id, "connection without identity ignored");
            return;
        }

        let evicted = self
            .sessions
            .lock()
            .unwrap()
            .bind(connection_id, identity_id);
        if let Some(previous) = evicted {
            info!(
                identity_id,
                superseded_connection = %previous,
                "evicting superseded connection"
            );
            self.hub.close_connection(&previous);
        }

        let fresh = self.presence.lock().unwrap().mark_online(identity_id);

        if let Err(error) = self
            .store
            .identities()
            .update_last_seen(identity_id, now_ms())
            .await
        {
            warn!(identity_id, %error, "failed to update last-seen on connect");
        }

        self.hub
            .join_topic(&identity_topic(identity_id), connection_id);

        if fresh {
            self.hub.broadcast(
                ServerEvent::UserOnline {
                    identity_id: identity_id.to_string(),
                },
                Some(connection_id),
            );
        }

        let online = self.presence.lock().unwrap().snapshot();
        self.hub.send_to_connection(
            connection_id,
            ServerEvent::OnlineUsers {
                identity_ids: online,
            },
        );

        info!(connection_id, identity_id, fresh, "connection bound");
    }

    /// Channel-close path: unbind (stale unbinds are no-ops), persist
    /// last-seen, and arm the delayed offline check.
    pub async fn disconnect(self: &Arc<Self>, connection_id: &str) {
        let identity = self.sessions.lock().unwrap().unbind(connection_id);
        self.hub.unregister(connection_id);

        let Some(identity_id) = identity else {
            debug!(connection_id, "disconnect of stale or unbound connection");
            return;
        };

        if let Err(error) = self
            .store
            .identities()
            .update_last_seen(&identity_id, now_ms())
            .await
        {
            warn!(identity_id = %identity_id, %error, "failed to update last-seen on disconnect");
        }

        info!(
            connection_id,
            identity_id = %identity_id,
            "connection closed, offline check scheduled"
        );
        self.schedule_offline_check(identity_id);
    }

    fn schedule_offline_check(self: &Arc<Self>, identity_id: String) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        let grace = self.offline_grace();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            coordinator.confirm_offline(&identity_id).await;
        })
    }

    /// Fire-time half of the offline check. Re-validates against the
    /// current registry state: a rebind within the grace window wins.
    async fn confirm_offline(&self, identity_id: &str) {
        if self
            .sessions
            .lock()
            .unwrap()
            .connection_for(identity_id)
            .is_some()
        {
            debug!(identity_id, "offline check: identity rebound within grace window");
            return;
        }

        if !self.presence.lock().unwrap().mark_offline(identity_id) {
            return;
        }

        self.focus.lock().unwrap().clear_all(identity_id);

        let conversations = self.typing.lock().unwrap().clear_identity(identity_id);
        for conversation_id in conversations {
            match self.store.conversations().find_by_id(&conversation_id).await {
                Ok(Some(conversation)) => {
                    self.broadcast_typing_update(&conversation, identity_id, false);
                }
                Ok(None) => {}
                Err(error) => warn!(
                    conversation_id = %conversation_id,
                    %error,
                    "failed to load conversation during offline typing cleanup"
                ),
            }
        }

        self.hub.broadcast(
            ServerEvent::UserOffline {
                identity_id: identity_id.to_string(),
            },
            None,
        );
        info!(identity_id, "identity offline");
    }

    /// Dispatch one in-band request. Failures are absorbed here: they are
    /// logged, surfaced as `message_failed` for sends, and never terminate
    /// another connection's handling.
    pub async fn handle_event(&self, connection_id: &str, event: ClientEvent) {
        match event {
            ClientEvent::SendMessage {
                conversation_id,
                sender_id,
                content,
                temp_id,
            } => {
                if let Err(error) = self
                    .send_message(
                        connection_id,
                        &conversation_id,
                        &sender_id,
                        &content,
                        temp_id.clone(),
                    )
                    .await
                {
                    warn!(
                        connection_id,
                        conversation_id = %conversation_id,
                        %error,
                        "sendMessage failed"
                    );
                    self.hub.send_to_connection(
                        connection_id,
                        ServerEvent::MessageFailed {
                            error: error.to_string(),
                            temp_id,
                        },
                    );
                }
            }
            ClientEvent::JoinConversation {
                identity_id,
                conversation_id,
            } => {
                if let Err(error) = self
                    .join_conversation(connection_id, &identity_id, &conversation_id)
                    .await
                {
                    warn!(connection_id, conversation_id = %conversation_id, %error, "joinConversation dropped");
                }
            }
            ClientEvent::LeaveConversation {
                identity_id,
                conversation_id,
            } => {
                if let Err(error) = self
                    .leave_conversation(connection_id, &identity_id, &conversation_id)
                    .await
                {
                    warn!(connection_id, conversation_id = %conversation_id, %error, "leaveConversation dropped");
                }
            }
            ClientEvent::MessageSeen {
                identity_id,
                conversation_id,
            } => {
                if let Err(error) = self.message_seen(&identity_id, &conversation_id).await {
                    warn!(connection_id, conversation_id = %conversation_id, %error, "messageSeen dropped");
                }
            }
            ClientEvent::SetTyping {
                identity_id,
                conversation_id,
                is_typing,
            } => {
                if let Err(error) = self
                    .set_typing(&identity_id, &conversation_id, is_typing)
                    .await
                {
                    warn!(connection_id, conversation_id = %conversation_id, %error, "setTyping dropped");
                }
            }
            ClientEvent::Keepalive { identity_id } => {
                self.keepalive(connection_id, identity_id.as_deref());
            }
            ClientEvent::SubscribeChatList { identity_id } => {
                if let Err(error) = self.subscribe_chat_list(connection_id, &identity_id).await {
                    warn!(connection_id, identity_id = %identity_id, %error, "subscribeChatList dropped");
                }
            }
        }
    }

    /// Load a conversation and require `identity_id` to be a participant
    pub(crate) async fn load_conversation_for(
        &self,
        identity_id: &str,
        conversation_id: &str,
    ) -> CoordinatorResult<Conversation> {
        let conversation = self
            .store
            .conversations()
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| CoordinatorError::conversation_not_found(conversation_id))?;

        if !conversation.is_participant(identity_id) {
            return Err(CoordinatorError::not_participant(
                identity_id,
                conversation_id,
            ));
        }

        Ok(conversation)
    }

    async fn join_conversation(
        &self,
        connection_id: &str,
        identity_id: &str,
        conversation_id: &str,
    ) -> CoordinatorResult<()> {
        require_id(identity_id, "identityId")?;
        require_id(conversation_id, "conversationId")?;

        let conversation = self
            .load_conversation_for(identity_id, conversation_id)
            .await?;

        self.hub
            .join_topic(&conversation_topic(conversation_id), connection_id);
        self.focus
            .lock()
            .unwrap()
            .set_focus(identity_id, conversation_id);

        info!(identity_id, conversation_id, "joined conversation");

        self.read_sweep(identity_id, &conversation).await?;

        // Replay whoever is currently typing to the joiner.
        let typists = self.typing.lock().unwrap().active_typists(
            conversation_id,
            Instant::now(),
            self.typing_ttl(),
        );
        for typist in typists {
            if typist != identity_id {
                self.hub.send_to_connection(
                    connection_id,
                    ServerEvent::UserTyping {
                        identity_id: typist,
                        conversation_id: conversation_id.to_string(),
                        is_typing: true,
                    },
                );
            }
        }

        Ok(())
    }

    async fn leave_conversation(
        &self,
        connection_id: &str,
        identity_id: &str,
        conversation_id: &str,
    ) -> CoordinatorResult<()> {
        require_id(identity_id, "identityId")?;
        require_id(conversation_id, "conversationId")?;

        self.hub
            .leave_topic(&conversation_topic(conversation_id), connection_id);
        self.focus
            .lock()
            .unwrap()
            .clear_focus(identity_id, conversation_id);

        let was_typing = self.typing.lock().unwrap().set_typing(
            conversation_id,
            identity_id,
            false,
            Instant::now(),
            self.typing_ttl(),
        );
        if was_typing {
            if let Some(conversation) = self
                .store
                .conversations()
                .find_by_id(conversation_id)
                .await?
            {
                self.broadcast_typing_update(&conversation, identity_id, false);
            }
        }

        info!(identity_id, conversation_id, "left conversation");
        Ok(())
    }

    async fn message_seen(&self, identity_id: &str, conversation_id: &str) -> CoordinatorResult<()> {
        require_id(identity_id, "identityId")?;
        require_id(conversation_id, "conversationId")?;

        let conversation = self
            .load_conversation_for(identity_id, conversation_id)
            .await?;
        self.read_sweep(identity_id, &conversation).await
    }

    async fn set_typing(
        &self,
        identity_id: &str,
        conversation_id: &str,
        is_typing: bool,
    ) -> CoordinatorResult<()> {
        require_id(identity_id, "identityId")?;
        require_id(conversation_id, "conversationId")?;

        let conversation = self
            .load_conversation_for(identity_id, conversation_id)
            .await?;

        let previous = self.typing.lock().unwrap().set_typing(
            conversation_id,
            identity_id,
            is_typing,
            Instant::now(),
            self.typing_ttl(),
        );

        if previous != is_typing {
            self.broadcast_typing_update(&conversation, identity_id, is_typing);
        }

        Ok(())
    }

    /// Refresh/repair the session binding without a full reconnect.
    /// Tolerates the registry having lost the mapping; a keepalive on a
    /// never-bound connection with no identity supplied is dropped.
    fn keepalive(&self, connection_id: &str, identity_id: Option<&str>) {
        let resolved = identity_id
            .map(str::to_string)
            .or_else(|| {
                self.sessions
                    .lock()
                    .unwrap()
                    .identity_for(connection_id)
                    .map(str::to_string)
            })
            .filter(|id| !id.trim().is_empty());

        let Some(identity_id) = resolved else {
            debug!(connection_id, "keepalive without resolvable identity dropped");
            return;
        };

        let evicted = self
            .sessions
            .lock()
            .unwrap()
            .bind(connection_id, &identity_id);
        if let Some(previous) = evicted {
            info!(
                identity_id = %identity_id,
                superseded_connection = %previous,
                "keepalive repaired binding"
            );
            self.hub.close_connection(&previous);
        }

        self.hub
            .send_to_connection(connection_id, ServerEvent::Pong { success: true });
    }

    /// Replay live typing indicators across every conversation the identity
    /// participates in, to the requesting connection only
    async fn subscribe_chat_list(
        &self,
        connection_id: &str,
        identity_id: &str,
    ) -> CoordinatorResult<()> {
        require_id(identity_id, "identityId")?;

        let conversations = self
            .store
            .conversations()
            .find_by_participant(identity_id)
            .await?;

        let now = Instant::now();
        let ttl = self.typing_ttl();
        for conversation in conversations {
            let typists = self
                .typing
                .lock()
                .unwrap()
                .active_typists(&conversation.id, now, ttl);
            for typist in typists {
                if typist != identity_id {
                    self.hub.send_to_connection(
                        connection_id,
                        ServerEvent::UserTyping {
                            identity_id: typist,
                            conversation_id: conversation.id.clone(),
                            is_typing: true,
                        },
                    );
                }
            }
        }

        Ok(())
    }

    /// Deliver a typing transition to the conversation's live topic group
    /// (excluding the typist) and directly to participants who are not
    /// focused on the conversation
    pub(crate) fn broadcast_typing_update(
        &self,
        conversation: &Conversation,
        typist_id: &str,
        is_typing: bool,
    ) {
        let event = ServerEvent::UserTyping {
            identity_id: typist_id.to_string(),
            conversation_id: conversation.id.clone(),
            is_typing,
        };
        let topic = conversation_topic(&conversation.id);

        let sessions = self.sessions.lock().unwrap();
        let focus = self.focus.lock().unwrap();

        let typist_connection = sessions.connection_for(typist_id);
        self.hub
            .send_to_topic(&topic, event.clone(), typist_connection);

        for participant in &conversation.participants {
            if participant.identity_id == typist_id {
                continue;
            }
            if focus.is_focused(&participant.identity_id, &conversation.id) {
                continue;
            }
            let Some(connection_id) = sessions.connection_for(&participant.identity_id) else {
                continue;
            };
            if !self.hub.topic_contains(&topic, connection_id) {
                self.hub.send_to_connection(connection_id, event.clone());
            }
        }
    }

    /// Spawn the periodic sweep that expires stale typing entries
    pub fn spawn_typing_sweep(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(coordinator.sweep_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                coordinator.sweep_typing().await;
            }
        })
    }

    /// One sweep pass: remove stale typing entries and notify each affected
    /// conversation
    pub async fn sweep_typing(&self) {
        let expired = self
            .typing
            .lock()
            .unwrap()
            .sweep(Instant::now(), self.typing_ttl());

        for (conversation_id, identity_id) in expired {
            debug!(
                conversation_id = %conversation_id,
                identity_id = %identity_id,
                "typing entry expired"
            );
            match self.store.conversations().find_by_id(&conversation_id).await {
                Ok(Some(conversation)) => {
                    self.broadcast_typing_update(&conversation, &identity_id, false);
                }
                Ok(None) => {}
                Err(error) => warn!(
                    conversation_id = %conversation_id,
                    %error,
                    "failed to load conversation during typing sweep"
                ),
            }
        }
    }
}

//! One open conversation: history, live pushes, outgoing sends.
//!
//! A `ChatSession` moves `Uninitialized -> Loading -> Active -> Closed` and
//! may be reopened. Each `open` starts a new epoch; results and pushes that
//! belong to an earlier epoch are discarded, so nothing from a closed or
//! replaced conversation leaks into the current view.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use nivaran_gateway::{ChatGateway, FeedEvent, InsertCallback, ObjectStore, Subscription};
use nivaran_types::api::{BUCKET_CHAT_ATTACHMENTS, NewMessage};
use nivaran_types::events::{InsertFilter, RowInsert, Table};
use nivaran_types::models::{ChatDetails, Message, PartyRef};

use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::session_store::SessionStore;
use crate::timeline::{DeliveryStatus, Timeline, TimelineEntry};

/// Text stored for a message that only carries attachments.
pub const ATTACHMENT_PLACEHOLDER: &str = "(Attachment)";

/// A file picked for sending.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Loading,
    Active,
    Closed,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Opened { chat_id: Uuid, history_len: usize },
    MessageAppended(Message),
    LocalEcho { local_id: Uuid, status: DeliveryStatus },
    Closed { chat_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub optimistic_echo: bool,
    pub history_window: Option<usize>,
    pub attachments_bucket: String,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            optimistic_echo: false,
            history_window: None,
            attachments_bucket: BUCKET_CHAT_ATTACHMENTS.into(),
        }
    }
}

impl From<&Config> for ChatOptions {
    fn from(config: &Config) -> Self {
        Self {
            optimistic_echo: config.optimistic_echo,
            history_window: config.history_window,
            attachments_bucket: config.app.chat_attachments_bucket.clone(),
        }
    }
}

struct SessionState {
    phase: SessionPhase,
    epoch: u64,
    chat_id: Option<Uuid>,
    details: Option<ChatDetails>,
    counterpart: Option<PartyRef>,
    history_complete: bool,
    timeline: Timeline,
    subscription: Option<Subscription>,
}

struct SessionShared {
    id: Uuid,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Release the subscription and clear the view. Returns the chat that was
    /// open, if any.
    fn shutdown(&self) -> Option<Uuid> {
        let (chat_id, subscription) = {
            let mut state = self.lock();
            state.epoch += 1;
            state.phase = SessionPhase::Closed;
            state.details = None;
            state.counterpart = None;
            state.history_complete = false;
            state.timeline.clear();
            (state.chat_id.take(), state.subscription.take())
        };

        if let Some(subscription) = subscription {
            subscription.cancel();
        }
        if let Some(chat_id) = chat_id {
            self.emit(SessionEvent::Closed { chat_id });
        }
        chat_id
    }

    /// Merge a pushed message if it belongs to `epoch`.
    fn merge(&self, epoch: u64, message: Message) {
        let mut state = self.lock();
        if state.epoch != epoch || state.chat_id != Some(message.chat_id) {
            debug!(message = %message.id, "Dropping push for a stale session");
            return;
        }
        if state.timeline.upsert(message.clone()) {
            drop(state);
            self.emit(SessionEvent::MessageAppended(message));
        }
    }

    /// Re-read the history after the live feed dropped pushes. The view is
    /// marked incomplete until the reload lands.
    async fn resync(self: Arc<Self>, epoch: u64, chat_id: Uuid, chats: Arc<dyn ChatGateway>) {
        {
            let mut state = self.lock();
            if state.epoch != epoch {
                return;
            }
            state.history_complete = false;
        }

        let history = match chats.list_messages(chat_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!(chat = %chat_id, "Reload after falling behind failed: {}", e);
                return;
            }
        };

        let appended = {
            let mut state = self.lock();
            if state.epoch != epoch {
                return;
            }
            let appended: Vec<Message> = history
                .into_iter()
                .filter(|message| state.timeline.upsert(message.clone()))
                .collect();
            state.history_complete = true;
            appended
        };

        info!(chat = %chat_id, recovered = appended.len(), "Chat history reloaded");
        for message in appended {
            self.emit(SessionEvent::MessageAppended(message));
        }
    }
}

/// Process-wide map of which session currently owns each chat's live
/// subscription. Opening a chat that another session holds closes that one.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    slots: Arc<Mutex<HashMap<Uuid, Weak<SessionShared>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Weak<SessionShared>>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn claim(&self, chat_id: Uuid, session: &Arc<SessionShared>) {
        let previous = self.lock().insert(chat_id, Arc::downgrade(session));

        if let Some(previous) = previous.and_then(|w| w.upgrade()) {
            if previous.id != session.id {
                info!(chat = %chat_id, "Chat opened by another session, closing the previous one");
                previous.shutdown();
            }
        }
    }

    fn release(&self, chat_id: Uuid, session_id: Uuid) {
        let mut slots = self.lock();
        let owned = slots
            .get(&chat_id)
            .map(|w| w.upgrade().is_none_or(|s| s.id == session_id))
            .unwrap_or(false);
        if owned {
            slots.remove(&chat_id);
        }
    }

    /// Chats that currently have an owning session.
    pub fn open_chats(&self) -> usize {
        self.lock().values().filter(|w| w.strong_count() > 0).count()
    }
}

pub struct ChatSession {
    shared: Arc<SessionShared>,
    chats: Arc<dyn ChatGateway>,
    objects: Arc<dyn ObjectStore>,
    store: SessionStore,
    registry: SessionRegistry,
    options: ChatOptions,
}

impl ChatSession {
    pub fn new(
        chats: Arc<dyn ChatGateway>,
        objects: Arc<dyn ObjectStore>,
        store: SessionStore,
        registry: SessionRegistry,
        options: ChatOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let shared = Arc::new(SessionShared {
            id: Uuid::new_v4(),
            state: Mutex::new(SessionState {
                phase: SessionPhase::Uninitialized,
                epoch: 0,
                chat_id: None,
                details: None,
                counterpart: None,
                history_complete: false,
                timeline: Timeline::new(options.history_window),
                subscription: None,
            }),
            events,
        });

        Self {
            shared,
            chats,
            objects,
            store,
            registry,
            options,
        }
    }

    /// Load the conversation and start receiving its new messages.
    ///
    /// Missing or forbidden chats fail and leave the session closed. A
    /// transient failure to load metadata or history still yields an
    /// `Active` session; see `counterpart` and `history_complete`.
    pub async fn open(&self, chat_id: Uuid) -> ClientResult<()> {
        if self.phase() != SessionPhase::Uninitialized {
            self.close();
        }
        let user = self.store.require_user()?;

        let epoch = {
            let mut state = self.shared.lock();
            state.epoch += 1;
            state.phase = SessionPhase::Loading;
            state.chat_id = Some(chat_id);
            state.details = None;
            state.counterpart = None;
            state.history_complete = false;
            state.timeline = Timeline::new(self.options.history_window);
            state.epoch
        };
        self.registry.claim(chat_id, &self.shared);
        info!(chat = %chat_id, user = %user.id, "Opening chat session");

        let details = match self.chats.get_chat(chat_id).await {
            Ok(details) => Some(details),
            Err(e) if e.is_transient() => {
                warn!(chat = %chat_id, "Chat metadata unavailable, counterpart unresolved: {}", e);
                None
            }
            Err(e) => {
                self.abort_open(epoch, chat_id);
                return Err(e.into());
            }
        };

        // Subscribe before loading history: anything committed in between is
        // delivered by the feed and deduplicated against the history.
        let weak = Arc::downgrade(&self.shared);
        let chats = self.chats.clone();
        let on_insert: InsertCallback = Arc::new(move |event| match event {
            FeedEvent::Insert(RowInsert::ChatMessages(message)) => {
                if let Some(shared) = weak.upgrade() {
                    shared.merge(epoch, message);
                }
            }
            FeedEvent::Lagged { missed } => {
                if let Some(shared) = weak.upgrade() {
                    warn!(chat = %chat_id, missed, "Live feed fell behind, reloading history");
                    tokio::spawn(shared.resync(epoch, chat_id, chats.clone()));
                }
            }
            FeedEvent::Insert(_) => {}
        });
        let filter = InsertFilter::eq(Table::ChatMessages, "chat_id", chat_id);
        let subscription = match self.chats.subscribe_inserts(filter, on_insert).await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!(chat = %chat_id, "Failed to subscribe to chat messages: {}", e);
                self.abort_open(epoch, chat_id);
                return Err(e.into());
            }
        };

        {
            let mut state = self.shared.lock();
            if state.epoch != epoch {
                debug!(chat = %chat_id, "Open superseded before subscribing");
                subscription.cancel();
                return Ok(());
            }
            if let Some(previous) = state.subscription.replace(subscription) {
                previous.cancel();
            }
            state.counterpart = details.as_ref().map(|d| d.counterpart_of(user.id).clone());
            state.details = details;
        }

        let history = match self.chats.list_messages(chat_id).await {
            Ok(history) => Some(history),
            Err(e) if e.is_transient() => {
                warn!(chat = %chat_id, "History unavailable, continuing with live messages only: {}", e);
                None
            }
            Err(e) => {
                self.abort_open(epoch, chat_id);
                return Err(e.into());
            }
        };

        let history_len = {
            let mut state = self.shared.lock();
            if state.epoch != epoch {
                debug!(chat = %chat_id, "Open superseded while loading history");
                return Ok(());
            }
            if let Some(history) = history {
                for message in history {
                    state.timeline.upsert(message);
                }
                state.history_complete = true;
            }
            state.phase = SessionPhase::Active;
            state.timeline.len()
        };

        self.shared.emit(SessionEvent::Opened { chat_id, history_len });
        info!(chat = %chat_id, messages = history_len, "Chat session active");
        Ok(())
    }

    fn abort_open(&self, epoch: u64, chat_id: Uuid) {
        if self.shared.lock().epoch != epoch {
            return;
        }
        self.shared.shutdown();
        self.registry.release(chat_id, self.shared.id);
    }

    /// Release the subscription and clear the view. Safe to call repeatedly.
    pub fn close(&self) {
        if let Some(chat_id) = self.shared.shutdown() {
            self.registry.release(chat_id, self.shared.id);
            info!(chat = %chat_id, "Chat session closed");
        }
    }

    /// Send a message, uploading attachments first.
    ///
    /// Returns `Ok(None)` without touching the network when there is nothing
    /// to send. Attachments that fail to upload are dropped. The stored
    /// message reaches the timeline through the live feed.
    pub async fn send(&self, text: &str, attachments: Vec<Attachment>) -> ClientResult<Option<Message>> {
        let text = text.trim();
        if text.is_empty() && attachments.is_empty() {
            return Ok(None);
        }

        let (chat_id, epoch) = {
            let state = self.shared.lock();
            match (state.phase, state.chat_id) {
                (SessionPhase::Active, Some(chat_id)) => (chat_id, state.epoch),
                _ => return Err(ClientError::ValidationFailed("no open chat".into())),
            }
        };
        let user = self.store.require_user()?;
        let body = if text.is_empty() { ATTACHMENT_PLACEHOLDER } else { text }.to_string();

        let local_id = self.options.optimistic_echo.then(|| {
            let local_id = Uuid::new_v4();
            self.with_timeline(epoch, |timeline| {
                timeline.push_local(Message {
                    id: local_id,
                    chat_id,
                    sender_id: user.id,
                    text: body.clone(),
                    attachments: Vec::new(),
                    read_by: vec![user.id],
                    created_at: Utc::now(),
                })
            });
            self.shared.emit(SessionEvent::LocalEcho {
                local_id,
                status: DeliveryStatus::Pending,
            });
            local_id
        });

        let mut urls = Vec::with_capacity(attachments.len());
        for (index, file) in attachments.into_iter().enumerate() {
            let path = attachment_path(chat_id, user.id, index, &file.file_name);
            match self
                .objects
                .upload_object(&self.options.attachments_bucket, &path, file.bytes, &file.content_type)
                .await
            {
                Ok(url) => urls.push(url),
                Err(e) => warn!(chat = %chat_id, file = %file.file_name, "Attachment upload failed, skipping: {}", e),
            }
        }

        let new_message = NewMessage {
            chat_id,
            sender_id: user.id,
            text: body,
            attachments: urls,
            read_by: vec![user.id],
        };

        let message = match self.chats.create_message(new_message).await {
            Ok(message) => message,
            Err(e) => {
                error!(chat = %chat_id, "Failed to send message: {}", e);
                if let Some(local_id) = local_id {
                    self.with_timeline(epoch, |timeline| timeline.fail(local_id));
                    self.shared.emit(SessionEvent::LocalEcho {
                        local_id,
                        status: DeliveryStatus::Failed,
                    });
                }
                return Err(ClientError::SendFailed(e.to_string()));
            }
        };

        if let Some(local_id) = local_id {
            let appended = self
                .with_timeline(epoch, |timeline| timeline.confirm(local_id, message.clone()))
                .unwrap_or(false);
            if appended {
                self.shared.emit(SessionEvent::MessageAppended(message.clone()));
            }
            self.shared.emit(SessionEvent::LocalEcho {
                local_id,
                status: DeliveryStatus::Confirmed,
            });
        }

        if let Err(e) = self.chats.touch_chat(chat_id).await {
            warn!(chat = %chat_id, "Failed to advance chat timestamp: {}", e);
        }

        debug!(chat = %chat_id, message = %message.id, attachments = message.attachments.len(), "Message sent");
        Ok(Some(message))
    }

    fn with_timeline<T>(&self, epoch: u64, f: impl FnOnce(&mut Timeline) -> T) -> Option<T> {
        let mut state = self.shared.lock();
        (state.epoch == epoch).then(|| f(&mut state.timeline))
    }

    /// Merge a message into the open conversation. Messages for another chat
    /// and ids already present are ignored.
    pub fn on_incoming(&self, message: Message) {
        let epoch = self.shared.lock().epoch;
        self.shared.merge(epoch, message);
    }

    /// Remove a failed local echo.
    pub fn dismiss_failed(&self, local_id: Uuid) {
        self.shared.lock().timeline.dismiss(local_id);
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.lock().phase
    }

    pub fn chat_id(&self) -> Option<Uuid> {
        self.shared.lock().chat_id
    }

    pub fn details(&self) -> Option<ChatDetails> {
        self.shared.lock().details.clone()
    }

    /// The other participant; `None` if metadata could not be loaded.
    pub fn counterpart(&self) -> Option<PartyRef> {
        self.shared.lock().counterpart.clone()
    }

    pub fn history_complete(&self) -> bool {
        self.shared.lock().history_complete
    }

    /// Active but missing the counterpart or part of the history.
    pub fn is_degraded(&self) -> bool {
        let state = self.shared.lock();
        state.phase == SessionPhase::Active && (state.counterpart.is_none() || !state.history_complete)
    }

    pub fn has_subscription(&self) -> bool {
        self.shared
            .lock()
            .subscription
            .as_ref()
            .is_some_and(|s| s.is_active())
    }

    /// Confirmed messages, ascending by `(created_at, id)`.
    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock().timeline.messages()
    }

    /// Confirmed messages followed by local echoes.
    pub fn entries(&self) -> Vec<TimelineEntry> {
        self.shared.lock().timeline.entries()
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// `{chat}/{sender}/{millis}-{index}-{file}` with path separators stripped from the name.
fn attachment_path(chat_id: Uuid, sender_id: Uuid, index: usize, file_name: &str) -> String {
    let name: String = file_name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let name = if name.trim().is_empty() { "file".to_string() } else { name };
    format!("{}/{}/{}-{}-{}", chat_id, sender_id, Utc::now().timestamp_millis(), index, name)
}

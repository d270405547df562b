use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio::sync::Notify;
use uuid::Uuid;

use nivaran_client::chat::ATTACHMENT_PLACEHOLDER;
use nivaran_client::roster::ChatRoster;
use nivaran_client::timeline::DeliveryStatus;
use nivaran_client::{
    Attachment, ChatOptions, ChatSession, ClientError, SessionEvent, SessionPhase, SessionRegistry, SessionStore,
};
use nivaran_gateway::{
    AuthGateway, Backend, BackendOptions, ChatGateway, FeedEvent, GatewayError, GatewayResult, InsertCallback,
    LocalGateway, ObjectStore, Subscription,
};
use nivaran_types::api::{NewMessage, SignUpProfile};
use nivaran_types::events::InsertFilter;
use nivaran_types::models::{Chat, ChatDetails, Message, Role};

/// Delegates to a real connection, with switchable outages and a call counter.
struct Flaky {
    inner: Arc<LocalGateway>,
    calls: AtomicUsize,
    metadata_down: AtomicBool,
    history_down: AtomicBool,
    writes_down: AtomicBool,
    touch_down: AtomicBool,
    reject_uploads: Mutex<Vec<String>>,
    /// One-shot: the next metadata or history read parks until `release`.
    hold_metadata: AtomicBool,
    hold_history: AtomicBool,
    entered: Notify,
    release: Notify,
    /// Drop live inserts on the floor while set.
    feed_muted: Arc<AtomicBool>,
    feed: Mutex<Option<InsertCallback>>,
}

impl Flaky {
    fn new(inner: Arc<LocalGateway>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
            metadata_down: AtomicBool::new(false),
            history_down: AtomicBool::new(false),
            writes_down: AtomicBool::new(false),
            touch_down: AtomicBool::new(false),
            reject_uploads: Mutex::new(Vec::new()),
            hold_metadata: AtomicBool::new(false),
            hold_history: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
            feed_muted: Arc::new(AtomicBool::new(false)),
            feed: Mutex::new(None),
        })
    }

    async fn gate(&self, hold: &AtomicBool) {
        if hold.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    /// Tell the latest subscriber it missed `missed` inserts.
    fn fall_behind(&self, missed: u64) {
        let feed = self.feed.lock().unwrap().clone().expect("no subscriber");
        feed(FeedEvent::Lagged { missed });
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn outage(flag: &AtomicBool) -> GatewayResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatGateway for Flaky {
    async fn get_chat(&self, chat_id: Uuid) -> GatewayResult<ChatDetails> {
        self.hit();
        self.gate(&self.hold_metadata).await;
        Self::outage(&self.metadata_down)?;
        self.inner.get_chat(chat_id).await
    }

    async fn get_or_create_chat(&self, donor_id: Uuid, ngo_id: Uuid, post_id: Option<Uuid>) -> GatewayResult<Chat> {
        self.hit();
        self.inner.get_or_create_chat(donor_id, ngo_id, post_id).await
    }

    async fn list_user_chats(&self, user_id: Uuid) -> GatewayResult<Vec<ChatDetails>> {
        self.hit();
        self.inner.list_user_chats(user_id).await
    }

    async fn list_messages(&self, chat_id: Uuid) -> GatewayResult<Vec<Message>> {
        self.hit();
        self.gate(&self.hold_history).await;
        Self::outage(&self.history_down)?;
        self.inner.list_messages(chat_id).await
    }

    async fn create_message(&self, message: NewMessage) -> GatewayResult<Message> {
        self.hit();
        Self::outage(&self.writes_down)?;
        self.inner.create_message(message).await
    }

    async fn touch_chat(&self, chat_id: Uuid) -> GatewayResult<()> {
        self.hit();
        Self::outage(&self.touch_down)?;
        self.inner.touch_chat(chat_id).await
    }

    async fn subscribe_inserts(&self, filter: InsertFilter, on_insert: InsertCallback) -> GatewayResult<Subscription> {
        self.hit();
        let muted = self.feed_muted.clone();
        let on_insert: InsertCallback = Arc::new(move |event| {
            if matches!(event, FeedEvent::Insert(_)) && muted.load(Ordering::SeqCst) {
                return;
            }
            on_insert(event)
        });
        *self.feed.lock().unwrap() = Some(on_insert.clone());
        self.inner.subscribe_inserts(filter, on_insert).await
    }
}

#[async_trait]
impl ObjectStore for Flaky {
    async fn upload_object(&self, bucket: &str, path: &str, bytes: Bytes, content_type: &str) -> GatewayResult<String> {
        self.hit();
        let rejected = self.reject_uploads.lock().unwrap().iter().any(|n| path.ends_with(n.as_str()));
        if rejected {
            return Err(GatewayError::Unavailable("upload timed out".into()));
        }
        self.inner.upload_object(bucket, path, bytes, content_type).await
    }

    async fn delete_object(&self, bucket: &str, path: &str) -> GatewayResult<()> {
        self.hit();
        self.inner.delete_object(bucket, path).await
    }
}

struct User {
    conn: Arc<LocalGateway>,
    store: SessionStore,
}

impl User {
    fn id(&self) -> Uuid {
        self.conn.current_user().unwrap().id
    }

    fn session(&self, registry: &SessionRegistry, options: ChatOptions) -> ChatSession {
        ChatSession::new(
            self.conn.clone(),
            self.conn.clone(),
            self.store.clone(),
            registry.clone(),
            options,
        )
    }

    fn flaky_session(&self, flaky: &Arc<Flaky>, registry: &SessionRegistry) -> ChatSession {
        ChatSession::new(
            flaky.clone(),
            flaky.clone(),
            self.store.clone(),
            registry.clone(),
            ChatOptions::default(),
        )
    }
}

struct World {
    _tmp: TempDir,
    backend: Arc<Backend>,
    registry: SessionRegistry,
}

impl World {
    async fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Backend::open(BackendOptions::in_memory(tmp.path().to_path_buf()))
            .await
            .unwrap();
        Self {
            _tmp: tmp,
            backend,
            registry: SessionRegistry::new(),
        }
    }

    async fn user(&self, email: &str, name: &str, role: Role) -> User {
        let conn = Arc::new(self.backend.connect());
        let store = SessionStore::new(conn.clone());
        store
            .sign_up(email, "password1", SignUpProfile::new(name, role))
            .await
            .unwrap();
        User { conn, store }
    }

    fn live(&self) -> usize {
        self.backend.dispatcher().live_subscriptions()
    }

    /// Donor D1, NGO N1 and their chat C1.
    async fn pair(&self) -> (User, User, Chat) {
        let d1 = self.user("d1@example.org", "Dev", Role::Donor).await;
        let n1 = self.user("n1@example.org", "Annam Trust", Role::Ngo).await;
        let chat = d1.conn.get_or_create_chat(d1.id(), n1.id(), None).await.unwrap();
        (d1, n1, chat)
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn text(chat_id: Uuid, sender_id: Uuid, body: &str) -> NewMessage {
    NewMessage {
        chat_id,
        sender_id,
        text: body.into(),
        attachments: vec![],
        read_by: vec![sender_id],
    }
}

#[tokio::test]
async fn first_message_in_a_new_chat() {
    let w = World::new().await;
    let (d1, n1, c1) = w.pair().await;
    let session = d1.session(&w.registry, ChatOptions::default());
    let mut events = session.events();

    session.open(c1.id).await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Active);
    assert!(session.messages().is_empty());
    assert_eq!(session.counterpart().unwrap().id, n1.id());
    assert!(matches!(events.recv().await.unwrap(), SessionEvent::Opened { history_len: 0, .. }));

    let sent = session.send("Can I pick this up at 5pm?", vec![]).await.unwrap().unwrap();
    assert_eq!(sent.sender_id, d1.id());
    assert!(sent.attachments.is_empty());
    settle().await;

    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, sent.id);
    match events.recv().await.unwrap() {
        SessionEvent::MessageAppended(m) => assert_eq!(m.id, sent.id),
        other => panic!("unexpected event {:?}", other),
    }

    let roster = ChatRoster::new(d1.conn.clone(), d1.store.clone());
    let chats = roster.load_chats(d1.id()).await;
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].chat_id, c1.id);
    assert_eq!(chats[0].counterpart.name, "Annam Trust");
    assert!(chats[0].updated_at > c1.updated_at);
}

#[tokio::test]
async fn open_then_close_leaves_no_subscription() {
    let w = World::new().await;
    let (d1, _n1, c1) = w.pair().await;
    let session = d1.session(&w.registry, ChatOptions::default());

    session.open(c1.id).await.unwrap();
    assert_eq!(w.live(), 1);
    assert!(session.has_subscription());

    session.close();
    session.close();
    assert_eq!(w.live(), 0);
    assert_eq!(session.phase(), SessionPhase::Closed);
    assert!(session.chat_id().is_none());
    assert!(session.counterpart().is_none());

    session.open(c1.id).await.unwrap();
    assert_eq!(w.live(), 1);
    drop(session);
    assert_eq!(w.live(), 0);
    assert_eq!(w.registry.open_chats(), 0);
}

#[tokio::test]
async fn persisted_count_matches_valid_sends() {
    let w = World::new().await;
    let (d1, _n1, c1) = w.pair().await;
    let session = d1.session(&w.registry, ChatOptions::default());
    session.open(c1.id).await.unwrap();

    let mut accepted = 0;
    for body in ["hello", "", "   ", "\n", "are you open today?", "thanks"] {
        if session.send(body, vec![]).await.unwrap().is_some() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 3);
    assert_eq!(d1.conn.list_messages(c1.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn reopening_keeps_one_subscription_and_same_history() {
    let w = World::new().await;
    let (d1, n1, c1) = w.pair().await;
    for (who, body) in [(&d1, "one"), (&n1, "two"), (&d1, "three")] {
        who.conn.create_message(text(c1.id, who.id(), body)).await.unwrap();
    }

    let session = d1.session(&w.registry, ChatOptions::default());
    session.open(c1.id).await.unwrap();
    session.open(c1.id).await.unwrap();
    assert_eq!(w.live(), 1);

    let fresh = n1.session(&SessionRegistry::new(), ChatOptions::default());
    fresh.open(c1.id).await.unwrap();
    assert_eq!(session.messages(), fresh.messages());
    let texts: Vec<_> = session.messages().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn second_session_on_the_same_chat_closes_the_first() {
    let w = World::new().await;
    let (d1, _n1, c1) = w.pair().await;
    let first = d1.session(&w.registry, ChatOptions::default());
    let second = d1.session(&w.registry, ChatOptions::default());

    first.open(c1.id).await.unwrap();
    second.open(c1.id).await.unwrap();

    assert_eq!(w.live(), 1);
    assert_eq!(first.phase(), SessionPhase::Closed);
    assert_eq!(second.phase(), SessionPhase::Active);
    assert!(matches!(
        first.send("still there?", vec![]).await,
        Err(ClientError::ValidationFailed(_))
    ));

    // Closing the evicted session must not release the new owner's slot.
    first.close();
    assert_eq!(w.registry.open_chats(), 1);
    assert!(second.has_subscription());
}

#[tokio::test]
async fn empty_send_makes_no_network_call() {
    let w = World::new().await;
    let (d1, _n1, c1) = w.pair().await;
    let flaky = Flaky::new(d1.conn.clone());
    let session = d1.flaky_session(&flaky, &w.registry);
    session.open(c1.id).await.unwrap();

    let before = flaky.calls();
    assert!(session.send("", vec![]).await.unwrap().is_none());
    assert!(session.send("  \t", vec![]).await.unwrap().is_none());
    assert_eq!(flaky.calls(), before);
    assert!(d1.conn.list_messages(c1.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn attachments_follow_successful_uploads() {
    let w = World::new().await;
    let (d1, n1, c1) = w.pair().await;
    let flaky = Flaky::new(d1.conn.clone());
    flaky.reject_uploads.lock().unwrap().push("broken.pdf".into());
    let session = d1.flaky_session(&flaky, &w.registry);
    session.open(c1.id).await.unwrap();

    let files = vec![
        Attachment::new("menu.png", "image/png", Bytes::from_static(b"png")),
        Attachment::new("broken.pdf", "application/pdf", Bytes::from_static(b"pdf")),
        Attachment::new("receipt.jpg", "image/jpeg", Bytes::from_static(b"jpg")),
    ];
    let sent = session.send("Photos of the food", files).await.unwrap().unwrap();
    assert_eq!(sent.attachments.len(), 2);
    assert!(sent.attachments.iter().all(|url| url.contains("/chat-attachments/")));

    // The counterpart sees the same record.
    let seen = n1.conn.list_messages(c1.id).await.unwrap();
    assert_eq!(seen[0].attachments, sent.attachments);

    // Only attachments, none of which uploaded: still a message.
    let only = vec![Attachment::new("broken.pdf", "application/pdf", Bytes::from_static(b"pdf"))];
    let sent = session.send("", only).await.unwrap().unwrap();
    assert_eq!(sent.text, ATTACHMENT_PLACEHOLDER);
    assert!(sent.attachments.is_empty());
}

#[tokio::test]
async fn counterpart_messages_stream_in() {
    let w = World::new().await;
    let (d1, n1, c1) = w.pair().await;
    let donor_view = d1.session(&w.registry, ChatOptions::default());
    let ngo_registry = SessionRegistry::new();
    let ngo_view = n1.session(&ngo_registry, ChatOptions::default());
    donor_view.open(c1.id).await.unwrap();
    ngo_view.open(c1.id).await.unwrap();

    ngo_view.send("Yes, 5pm works", vec![]).await.unwrap();
    donor_view.send("Great, see you", vec![]).await.unwrap();
    settle().await;

    let texts = |s: &ChatSession| s.messages().into_iter().map(|m| m.text).collect::<Vec<_>>();
    assert_eq!(texts(&donor_view), vec!["Yes, 5pm works", "Great, see you"]);
    assert_eq!(texts(&donor_view), texts(&ngo_view));
}

#[tokio::test]
async fn closed_session_ignores_late_pushes() {
    let w = World::new().await;
    let (d1, n1, c1) = w.pair().await;
    let session = d1.session(&w.registry, ChatOptions::default());
    session.open(c1.id).await.unwrap();
    session.close();

    n1.conn.create_message(text(c1.id, n1.id(), "anyone?")).await.unwrap();
    settle().await;
    assert!(session.messages().is_empty());

    // A stray message for another chat is ignored too.
    session.open(c1.id).await.unwrap();
    let mut stray = d1.conn.list_messages(c1.id).await.unwrap().remove(0);
    stray.chat_id = Uuid::new_v4();
    stray.id = Uuid::new_v4();
    session.on_incoming(stray);
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn history_outage_degrades_to_live_only() {
    let w = World::new().await;
    let (d1, n1, c1) = w.pair().await;
    n1.conn.create_message(text(c1.id, n1.id(), "earlier")).await.unwrap();

    let flaky = Flaky::new(d1.conn.clone());
    flaky.history_down.store(true, Ordering::SeqCst);
    let session = d1.flaky_session(&flaky, &w.registry);

    session.open(c1.id).await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Active);
    assert!(!session.history_complete());
    assert!(session.is_degraded());
    assert!(session.messages().is_empty());

    n1.conn.create_message(text(c1.id, n1.id(), "live")).await.unwrap();
    settle().await;
    let texts: Vec<_> = session.messages().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["live"]);
}

async fn close_while_open_is_parked(hold: impl Fn(&Flaky) -> &AtomicBool) {
    let w = World::new().await;
    let (d1, n1, c1) = w.pair().await;
    n1.conn.create_message(text(c1.id, n1.id(), "earlier")).await.unwrap();
    let flaky = Flaky::new(d1.conn.clone());
    hold(flaky.as_ref()).store(true, Ordering::SeqCst);
    let session = d1.flaky_session(&flaky, &w.registry);

    let (opened, ()) = tokio::join!(session.open(c1.id), async {
        flaky.entered.notified().await;
        session.close();
        flaky.release.notify_one();
    });
    opened.unwrap();

    n1.conn.create_message(text(c1.id, n1.id(), "after close")).await.unwrap();
    settle().await;

    assert_eq!(w.live(), 0);
    assert_eq!(w.registry.open_chats(), 0);
    assert_eq!(session.phase(), SessionPhase::Closed);
    assert!(!session.has_subscription());
    assert!(session.messages().is_empty());
    assert!(session.chat_id().is_none());
}

#[tokio::test]
async fn close_during_metadata_load_discards_the_open() {
    close_while_open_is_parked(|f| &f.hold_metadata).await;
}

#[tokio::test]
async fn close_during_history_load_discards_the_open() {
    close_while_open_is_parked(|f| &f.hold_history).await;
}

#[tokio::test]
async fn falling_behind_the_feed_reloads_history() {
    let w = World::new().await;
    let (d1, n1, c1) = w.pair().await;
    let flaky = Flaky::new(d1.conn.clone());
    let session = d1.flaky_session(&flaky, &w.registry);
    session.open(c1.id).await.unwrap();
    assert!(session.history_complete());

    flaky.feed_muted.store(true, Ordering::SeqCst);
    n1.conn.create_message(text(c1.id, n1.id(), "missed")).await.unwrap();
    settle().await;
    assert!(session.messages().is_empty());
    flaky.feed_muted.store(false, Ordering::SeqCst);

    let mut events = session.events();
    flaky.hold_history.store(true, Ordering::SeqCst);
    flaky.fall_behind(1);
    flaky.entered.notified().await;
    assert!(!session.history_complete());
    assert!(session.is_degraded());

    flaky.release.notify_one();
    settle().await;
    assert!(session.history_complete());
    let texts: Vec<_> = session.messages().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["missed"]);
    match events.recv().await.unwrap() {
        SessionEvent::MessageAppended(m) => assert_eq!(m.text, "missed"),
        other => panic!("unexpected event {:?}", other),
    }

    // Pushes keep flowing after the reload, without duplicates.
    n1.conn.create_message(text(c1.id, n1.id(), "live again")).await.unwrap();
    settle().await;
    let texts: Vec<_> = session.messages().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["missed", "live again"]);
}

#[tokio::test]
async fn timestamp_outage_does_not_fail_the_send() {
    let w = World::new().await;
    let (d1, _n1, c1) = w.pair().await;
    let flaky = Flaky::new(d1.conn.clone());
    flaky.touch_down.store(true, Ordering::SeqCst);
    let session = d1.flaky_session(&flaky, &w.registry);
    session.open(c1.id).await.unwrap();

    let sent = session.send("hello", vec![]).await.unwrap().unwrap();
    let stored = d1.conn.list_messages(c1.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, sent.id);
    assert_eq!(session.phase(), SessionPhase::Active);
}

#[tokio::test]
async fn metadata_outage_leaves_counterpart_unresolved() {
    let w = World::new().await;
    let (d1, _n1, c1) = w.pair().await;
    let flaky = Flaky::new(d1.conn.clone());
    flaky.metadata_down.store(true, Ordering::SeqCst);
    let session = d1.flaky_session(&flaky, &w.registry);

    session.open(c1.id).await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Active);
    assert!(session.counterpart().is_none());
    assert!(session.history_complete());
    assert!(session.send("hello", vec![]).await.unwrap().is_some());
}

#[tokio::test]
async fn unknown_or_foreign_chats_fail_to_open() {
    let w = World::new().await;
    let (_d1, _n1, c1) = w.pair().await;
    let outsider = w.user("other@example.org", "Riya", Role::Donor).await;
    let session = outsider.session(&w.registry, ChatOptions::default());

    let err = session.open(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));
    assert_eq!(session.phase(), SessionPhase::Closed);

    let err = session.open(c1.id).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(_)));
    assert_eq!(w.live(), 0);
    assert_eq!(w.registry.open_chats(), 0);
}

#[tokio::test]
async fn signed_out_session_cannot_open() {
    let w = World::new().await;
    let (d1, _n1, c1) = w.pair().await;
    d1.store.sign_out().await.unwrap();
    let session = d1.session(&w.registry, ChatOptions::default());
    assert!(matches!(session.open(c1.id).await, Err(ClientError::Unauthorized(_))));
}

#[tokio::test]
async fn optimistic_echo_is_replaced_not_duplicated() {
    let w = World::new().await;
    let (d1, _n1, c1) = w.pair().await;
    let options = ChatOptions {
        optimistic_echo: true,
        ..ChatOptions::default()
    };
    let session = d1.session(&w.registry, options);
    session.open(c1.id).await.unwrap();

    let sent = session.send("on my way", vec![]).await.unwrap().unwrap();
    settle().await;

    let entries = session.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, DeliveryStatus::Confirmed);
    assert_eq!(entries[0].message.id, sent.id);
}

#[tokio::test]
async fn failed_send_surfaces_and_marks_the_echo() {
    let w = World::new().await;
    let (d1, _n1, c1) = w.pair().await;
    let flaky = Flaky::new(d1.conn.clone());
    let session = ChatSession::new(
        flaky.clone(),
        flaky.clone(),
        d1.store.clone(),
        w.registry.clone(),
        ChatOptions {
            optimistic_echo: true,
            ..ChatOptions::default()
        },
    );
    session.open(c1.id).await.unwrap();

    flaky.writes_down.store(true, Ordering::SeqCst);
    let err = session.send("will this arrive?", vec![]).await.unwrap_err();
    assert!(matches!(err, ClientError::SendFailed(_)));

    let entries = session.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, DeliveryStatus::Failed);
    session.dismiss_failed(entries[0].message.id);
    assert!(session.entries().is_empty());
    assert!(d1.conn.list_messages(c1.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_window_keeps_the_newest() {
    let w = World::new().await;
    let (d1, n1, c1) = w.pair().await;
    for i in 0..5 {
        n1.conn.create_message(text(c1.id, n1.id(), &format!("m{}", i))).await.unwrap();
    }
    let options = ChatOptions {
        history_window: Some(3),
        ..ChatOptions::default()
    };
    let session = d1.session(&w.registry, options);
    session.open(c1.id).await.unwrap();

    let texts: Vec<_> = session.messages().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["m2", "m3", "m4"]);
}

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use nivaran_db::Database;
use nivaran_db::models::ObjectRow;
use nivaran_types::api::{
    AuthUser, BUCKET_CHAT_ATTACHMENTS, BUCKET_POST_IMAGES, BUCKET_PROFILE_IMAGES, NewDonation,
    NewMessage, NgoProfileUpdate, PostFilter, PostInput, SignUpProfile, UserProfileUpdate, ViewKind,
};
use nivaran_types::events::{AuthEvent, InsertFilter, RowInsert, Table};
use nivaran_types::models::{
    Chat, ChatDetails, DonationRecord, DonationStatus, Message, NearbyNgo, NgoProfile, Post, Role,
    UserProfile, ViewedNgo,
};

use crate::auth;
use crate::backend::{
    AuthGateway, ChatGateway, DonationGateway, InsertCallback, ObjectStore, PostGateway,
    ProfileGateway, SignUpOutcome,
};
use crate::convert;
use crate::dispatcher::Dispatcher;
use crate::error::{GatewayError, GatewayResult};
use crate::storage::{BucketPolicy, Storage};
use crate::subscription::Subscription;

#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// `None` keeps the database in memory.
    pub db_path: Option<PathBuf>,
    pub storage_dir: PathBuf,
    pub public_base_url: String,
    pub jwt_secret: String,
    pub max_image_bytes: usize,
    pub max_attachment_bytes: usize,
}

impl BackendOptions {
    pub fn in_memory(storage_dir: PathBuf) -> Self {
        Self {
            db_path: None,
            storage_dir,
            public_base_url: "http://localhost:54321".into(),
            jwt_secret: "dev-secret-change-me".into(),
            max_image_bytes: 5 * 1024 * 1024,
            max_attachment_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Shared state behind every connection: database, change feed, object storage.
pub struct Backend {
    db: Arc<Database>,
    dispatcher: Dispatcher,
    storage: Storage,
    jwt_secret: String,
}

impl Backend {
    pub async fn open(options: BackendOptions) -> GatewayResult<Arc<Self>> {
        let db = match &options.db_path {
            Some(path) => Database::open(path),
            None => Database::open_in_memory(),
        }
        .map_err(GatewayError::from_db)?;

        let mut buckets = HashMap::new();
        buckets.insert(BUCKET_POST_IMAGES.to_string(), BucketPolicy::images(options.max_image_bytes));
        buckets.insert(BUCKET_PROFILE_IMAGES.to_string(), BucketPolicy::images(options.max_image_bytes));
        buckets.insert(
            BUCKET_CHAT_ATTACHMENTS.to_string(),
            BucketPolicy::any(options.max_attachment_bytes),
        );
        let storage = Storage::new(options.storage_dir.clone(), options.public_base_url.clone(), buckets).await?;

        info!("Local backend ready");
        Ok(Arc::new(Self {
            db: Arc::new(db),
            dispatcher: Dispatcher::new(),
            storage,
            jwt_secret: options.jwt_secret,
        }))
    }

    /// A fresh, signed-out connection.
    pub fn connect(self: &Arc<Self>) -> LocalGateway {
        let (auth_tx, _) = broadcast::channel(16);
        LocalGateway {
            backend: self.clone(),
            caller: RwLock::new(None),
            auth_tx,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

/// One client's connection to the embedded backend. Carries its own
/// signed-in identity; row-level policies are checked against it.
pub struct LocalGateway {
    backend: Arc<Backend>,
    caller: RwLock<Option<AuthUser>>,
    auth_tx: broadcast::Sender<AuthEvent>,
}

impl LocalGateway {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    /// Run a blocking DB call off the async runtime.
    async fn blocking<T, F>(&self, f: F) -> GatewayResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.backend.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                GatewayError::Unavailable(e.to_string())
            })?
            .map_err(GatewayError::from_db)
    }

    fn set_caller(&self, user: Option<AuthUser>) {
        let mut caller = self.caller.write().unwrap_or_else(|e| e.into_inner());
        *caller = user;
    }

    fn require_user(&self) -> GatewayResult<AuthUser> {
        self.current_user()
            .ok_or_else(|| GatewayError::Unauthorized("not signed in".into()))
    }

    fn require_self(&self, user_id: Uuid) -> GatewayResult<AuthUser> {
        let caller = self.require_user()?;
        if caller.id != user_id {
            return Err(GatewayError::Unauthorized("cannot act on another user's data".into()));
        }
        Ok(caller)
    }

    async fn load_user(&self, user_id: Uuid) -> GatewayResult<UserProfile> {
        let id = user_id.to_string();
        self.blocking(move |db| db.get_user(&id))
            .await?
            .map(convert::user)
            .ok_or_else(|| GatewayError::NotFound(format!("user {}", user_id)))
    }

    async fn load_post(&self, post_id: Uuid) -> GatewayResult<Post> {
        let id = post_id.to_string();
        self.blocking(move |db| db.get_post(&id))
            .await?
            .map(convert::post)
            .ok_or_else(|| GatewayError::NotFound(format!("post {}", post_id)))
    }

    /// The chat, provided the caller participates in it.
    async fn authorize_chat(&self, chat_id: Uuid) -> GatewayResult<(AuthUser, Chat)> {
        let caller = self.require_user()?;
        let id = chat_id.to_string();
        let chat = self
            .blocking(move |db| db.get_chat(&id))
            .await?
            .map(convert::chat)
            .ok_or_else(|| GatewayError::NotFound(format!("chat {}", chat_id)))?;

        if !chat.is_participant(caller.id) {
            return Err(GatewayError::Unauthorized(format!("not a participant of chat {}", chat_id)));
        }
        Ok((caller, chat))
    }

    async fn authorize_post_owner(&self, post_id: Uuid) -> GatewayResult<Post> {
        let caller = self.require_user()?;
        let post = self.load_post(post_id).await?;
        if post.author_id != caller.id {
            return Err(GatewayError::Unauthorized(format!("post {} belongs to another user", post_id)));
        }
        Ok(post)
    }

    async fn load_donation(&self, donation_id: Uuid) -> GatewayResult<DonationRecord> {
        let id = donation_id.to_string();
        self.blocking(move |db| db.get_donation(&id))
            .await?
            .map(convert::donation)
            .ok_or_else(|| GatewayError::NotFound(format!("donation {}", donation_id)))
    }

    fn start_session(&self, id: Uuid, email: &str) -> GatewayResult<AuthUser> {
        let access_token = auth::create_token(&self.backend.jwt_secret, id, email)?;
        let user = AuthUser {
            id,
            email: email.to_string(),
            access_token,
        };
        self.set_caller(Some(user.clone()));
        let _ = self.auth_tx.send(AuthEvent::SignedIn(user.clone()));
        Ok(user)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthGateway for LocalGateway {
    async fn sign_up(&self, email: &str, password: &str, profile: SignUpProfile) -> GatewayResult<SignUpOutcome> {
        auth::validate_credentials(email, password)?;
        if profile.name.trim().is_empty() {
            return Err(GatewayError::Rejected("name is required".into()));
        }
        let email = normalize_email(email);

        let lookup = email.clone();
        if self.blocking(move |db| db.get_auth_user_by_email(&lookup)).await?.is_some() {
            return Err(GatewayError::Conflict(format!("{} is already registered", email)));
        }

        let password_hash = auth::hash_password(password)?;
        let user_id = Uuid::new_v4();
        let (id, mail) = (user_id.to_string(), email.clone());
        self.blocking(move |db| db.create_auth_user(&id, &mail, &password_hash)).await?;

        // The account exists from here on; a failed profile write leaves it
        // signed in without a profile.
        let (id, mail) = (user_id.to_string(), email.clone());
        let written = self
            .blocking(move |db| {
                db.create_user_profile(&id, &mail, &profile)?;
                if profile.role == Role::Ngo {
                    db.create_ngo_profile(&id, &profile.ngo.clone().unwrap_or_default())?;
                }
                Ok(())
            })
            .await;

        let profile = match written {
            Ok(()) => Some(self.load_user(user_id).await?),
            Err(e) => {
                warn!("Profile write failed for {}: {}", user_id, e);
                None
            }
        };

        let user = self.start_session(user_id, &email)?;
        info!("User signed up: {} ({})", email, user_id);
        Ok(SignUpOutcome { user, profile })
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<AuthUser> {
        let email = normalize_email(email);
        let lookup = email.clone();
        let row = self
            .blocking(move |db| db.get_auth_user_by_email(&lookup))
            .await?
            .ok_or_else(|| GatewayError::Unauthorized("invalid email or password".into()))?;

        auth::verify_password(password, &row.password)?;

        let user_id: Uuid = row
            .id
            .parse()
            .map_err(|e| GatewayError::Unavailable(format!("corrupt user id '{}': {}", row.id, e)))?;

        let user = self.start_session(user_id, &row.email)?;
        info!("User signed in: {}", email);
        Ok(user)
    }

    async fn restore_session(&self, access_token: &str) -> GatewayResult<AuthUser> {
        let claims = auth::verify_token(&self.backend.jwt_secret, access_token)?;
        let user = AuthUser {
            id: claims.sub,
            email: claims.email,
            access_token: access_token.to_string(),
        };
        self.set_caller(Some(user.clone()));
        let _ = self.auth_tx.send(AuthEvent::SignedIn(user.clone()));
        debug!("Session restored for {}", user.email);
        Ok(user)
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        if let Some(user) = self.current_user() {
            debug!("User signed out: {}", user.email);
        }
        self.set_caller(None);
        let _ = self.auth_tx.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> GatewayResult<()> {
        let caller = self.require_user()?;
        auth::validate_password(new_password)?;
        let hash = auth::hash_password(new_password)?;
        let id = caller.id.to_string();

        if !self.blocking(move |db| db.update_password(&id, &hash)).await? {
            return Err(GatewayError::NotFound(format!("user {}", caller.id)));
        }
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.caller.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_tx.subscribe()
    }
}

#[async_trait]
impl ProfileGateway for LocalGateway {
    async fn get_user(&self, user_id: Uuid) -> GatewayResult<UserProfile> {
        self.load_user(user_id).await
    }

    async fn update_user_profile(&self, user_id: Uuid, update: UserProfileUpdate) -> GatewayResult<UserProfile> {
        self.require_self(user_id)?;
        let id = user_id.to_string();
        if !self.blocking(move |db| db.update_user(&id, &update)).await? {
            return Err(GatewayError::NotFound(format!("user {}", user_id)));
        }
        self.load_user(user_id).await
    }

    async fn get_ngo(&self, ngo_id: Uuid) -> GatewayResult<NgoProfile> {
        let id = ngo_id.to_string();
        self.blocking(move |db| db.get_ngo(&id))
            .await?
            .map(convert::ngo)
            .ok_or_else(|| GatewayError::NotFound(format!("ngo {}", ngo_id)))
    }

    async fn update_ngo_profile(&self, ngo_id: Uuid, update: NgoProfileUpdate) -> GatewayResult<NgoProfile> {
        self.require_self(ngo_id)?;
        let id = ngo_id.to_string();
        if !self.blocking(move |db| db.update_ngo(&id, &update)).await? {
            return Err(GatewayError::NotFound(format!("ngo {}", ngo_id)));
        }
        self.get_ngo(ngo_id).await
    }

    async fn increment_ngo_views(&self, ngo_id: Uuid) -> GatewayResult<()> {
        let id = ngo_id.to_string();
        if !self.blocking(move |db| db.increment_ngo_views(&id)).await? {
            return Err(GatewayError::NotFound(format!("ngo {}", ngo_id)));
        }
        Ok(())
    }

    async fn find_nearby_ngos(&self, lat: f64, lng: f64, radius_km: f64) -> GatewayResult<Vec<NearbyNgo>> {
        if radius_km <= 0.0 {
            return Err(GatewayError::Rejected("radius must be positive".into()));
        }
        let rows = self.blocking(move |db| db.find_nearby_ngos(lat, lng, radius_km)).await?;
        Ok(rows.into_iter().map(convert::nearby_ngo).collect())
    }

    async fn log_view(&self, target_user_id: Uuid, kind: ViewKind) -> GatewayResult<()> {
        let viewer = self.current_user().map(|u| u.id.to_string());
        let target = target_user_id.to_string();
        let id = Uuid::new_v4().to_string();
        self.blocking(move |db| db.insert_view(&id, viewer.as_deref(), &target, kind))
            .await
    }

    async fn recently_viewed_ngos(&self, viewer_id: Uuid, limit: u32) -> GatewayResult<Vec<ViewedNgo>> {
        self.require_self(viewer_id)?;
        let id = viewer_id.to_string();
        let rows = self
            .blocking(move |db| db.recently_viewed(&id, ViewKind::NgoProfile, limit))
            .await?;
        Ok(rows.into_iter().map(convert::viewed_ngo).collect())
    }

    async fn ngo_view_stats(&self, ngo_id: Uuid) -> GatewayResult<u64> {
        let id = ngo_id.to_string();
        let count = self.blocking(move |db| db.view_count(&id, ViewKind::NgoProfile)).await?;
        Ok(count.max(0) as u64)
    }
}

fn validate_post(input: &PostInput) -> GatewayResult<()> {
    if input.title.trim().is_empty() {
        return Err(GatewayError::Rejected("post title is required".into()));
    }
    if input.lat.is_some() != input.lng.is_some() {
        return Err(GatewayError::Rejected("post location needs both lat and lng".into()));
    }
    Ok(())
}

#[async_trait]
impl PostGateway for LocalGateway {
    async fn create_post(&self, input: PostInput) -> GatewayResult<Post> {
        let caller = self.require_user()?;
        validate_post(&input)?;
        let author = self.load_user(caller.id).await.map_err(|e| match e {
            GatewayError::NotFound(_) => GatewayError::Rejected("a profile is required to post".into()),
            other => other,
        })?;

        let post_id = Uuid::new_v4();
        let (id, author_id) = (post_id.to_string(), caller.id.to_string());
        let role = author.role;
        self.blocking(move |db| db.insert_post(&id, &author_id, role.as_str(), &input))
            .await?;

        let post = self.load_post(post_id).await?;
        self.backend.dispatcher.publish(RowInsert::Posts(post.clone()));
        info!("Post created: {} by {}", post_id, caller.id);
        Ok(post)
    }

    async fn get_posts(&self, filter: PostFilter) -> GatewayResult<Vec<Post>> {
        let rows = self.blocking(move |db| db.get_posts(&filter)).await?;
        Ok(rows.into_iter().map(convert::post).collect())
    }

    async fn get_post(&self, post_id: Uuid) -> GatewayResult<Post> {
        self.load_post(post_id).await
    }

    async fn update_post(&self, post_id: Uuid, input: PostInput) -> GatewayResult<Post> {
        validate_post(&input)?;
        self.authorize_post_owner(post_id).await?;

        let id = post_id.to_string();
        if !self.blocking(move |db| db.update_post(&id, &input)).await? {
            return Err(GatewayError::NotFound(format!("post {}", post_id)));
        }
        self.load_post(post_id).await
    }

    async fn delete_post(&self, post_id: Uuid) -> GatewayResult<()> {
        self.authorize_post_owner(post_id).await?;

        let id = post_id.to_string();
        if !self.blocking(move |db| db.delete_post(&id)).await? {
            return Err(GatewayError::NotFound(format!("post {}", post_id)));
        }
        info!("Post deleted: {}", post_id);
        Ok(())
    }

    async fn find_nearby_posts(&self, lat: f64, lng: f64, radius_km: f64) -> GatewayResult<Vec<Post>> {
        if radius_km <= 0.0 {
            return Err(GatewayError::Rejected("radius must be positive".into()));
        }
        let rows = self.blocking(move |db| db.find_nearby_posts(lat, lng, radius_km)).await?;
        Ok(rows.into_iter().map(convert::post).collect())
    }
}

#[async_trait]
impl ChatGateway for LocalGateway {
    async fn get_chat(&self, chat_id: Uuid) -> GatewayResult<ChatDetails> {
        self.authorize_chat(chat_id).await?;
        let id = chat_id.to_string();
        self.blocking(move |db| db.get_chat_details(&id))
            .await?
            .map(convert::chat_details)
            .ok_or_else(|| GatewayError::NotFound(format!("chat {}", chat_id)))
    }

    async fn get_or_create_chat(&self, donor_id: Uuid, ngo_id: Uuid, post_id: Option<Uuid>) -> GatewayResult<Chat> {
        let caller = self.require_user()?;
        if caller.id != donor_id && caller.id != ngo_id {
            return Err(GatewayError::Unauthorized("caller must be a participant".into()));
        }
        if donor_id == ngo_id {
            return Err(GatewayError::Rejected("cannot start a chat with yourself".into()));
        }

        let donor = self.load_user(donor_id).await?;
        let ngo = self.load_user(ngo_id).await?;
        if donor.role != Role::Donor || ngo.role != Role::Ngo {
            return Err(GatewayError::Rejected("a chat needs one donor and one NGO".into()));
        }

        let id = Uuid::new_v4().to_string();
        let (donor, ngo) = (donor_id.to_string(), ngo_id.to_string());
        let post = post_id.map(|p| p.to_string());
        let (row, created) = self
            .blocking(move |db| db.find_or_insert_chat(&id, &donor, &ngo, post.as_deref()))
            .await?;

        let chat = convert::chat(row);
        if created {
            self.backend.dispatcher.publish(RowInsert::Chats(chat.clone()));
            info!("Chat created: {} (donor {}, ngo {})", chat.id, donor_id, ngo_id);
        }
        Ok(chat)
    }

    async fn list_user_chats(&self, user_id: Uuid) -> GatewayResult<Vec<ChatDetails>> {
        self.require_self(user_id)?;
        let id = user_id.to_string();
        let rows = self.blocking(move |db| db.list_user_chats(&id)).await?;
        Ok(rows.into_iter().map(convert::chat_details).collect())
    }

    async fn list_messages(&self, chat_id: Uuid) -> GatewayResult<Vec<Message>> {
        self.authorize_chat(chat_id).await?;
        let id = chat_id.to_string();
        let rows = self.blocking(move |db| db.get_messages(&id)).await?;
        Ok(rows.into_iter().map(convert::message).collect())
    }

    async fn create_message(&self, message: NewMessage) -> GatewayResult<Message> {
        let (caller, _) = self.authorize_chat(message.chat_id).await?;
        if message.sender_id != caller.id {
            return Err(GatewayError::Unauthorized("sender must be the signed-in user".into()));
        }
        if message.text.trim().is_empty() {
            return Err(GatewayError::Rejected("message text is required".into()));
        }

        let dispatcher = self.backend.dispatcher.clone();
        let id = Uuid::new_v4().to_string();
        let row = self
            .blocking(move |db| {
                db.insert_message(&id, &message, |row| {
                    dispatcher.publish(RowInsert::ChatMessages(convert::message(row.clone())));
                })
            })
            .await?;

        Ok(convert::message(row))
    }

    async fn touch_chat(&self, chat_id: Uuid) -> GatewayResult<()> {
        self.authorize_chat(chat_id).await?;
        let id = chat_id.to_string();
        match self.blocking(move |db| db.touch_chat(&id)).await? {
            Some(_) => Ok(()),
            None => Err(GatewayError::NotFound(format!("chat {}", chat_id))),
        }
    }

    async fn subscribe_inserts(&self, filter: InsertFilter, on_insert: InsertCallback) -> GatewayResult<Subscription> {
        let caller = self.require_user()?;

        // Message streams are only open to the chat's participants.
        if filter.table == Table::ChatMessages {
            if filter.column != "chat_id" {
                return Err(GatewayError::Rejected("chat_messages can only be filtered by chat_id".into()));
            }
            let chat_id: Uuid = filter
                .value
                .parse()
                .map_err(|_| GatewayError::Rejected(format!("invalid chat id '{}'", filter.value)))?;
            self.authorize_chat(chat_id).await?;
        }

        debug!(
            user = %caller.id,
            table = filter.table.as_str(),
            column = %filter.column,
            "Subscribing to inserts"
        );
        Ok(self.backend.dispatcher.subscribe_inserts(filter, on_insert))
    }
}

#[async_trait]
impl DonationGateway for LocalGateway {
    async fn create_donation_record(&self, donation: NewDonation) -> GatewayResult<DonationRecord> {
        let caller = self.require_user()?;
        if caller.id != donation.donor_id && caller.id != donation.ngo_id {
            return Err(GatewayError::Unauthorized("caller must be the donor or the NGO".into()));
        }

        let donation_id = Uuid::new_v4();
        let id = donation_id.to_string();
        self.blocking(move |db| db.insert_donation(&id, &donation)).await?;

        let record = self.load_donation(donation_id).await?;
        self.backend.dispatcher.publish(RowInsert::DonationsHistory(record.clone()));
        Ok(record)
    }

    async fn donation_history(&self, user_id: Uuid, role: Role) -> GatewayResult<Vec<DonationRecord>> {
        self.require_self(user_id)?;
        let id = user_id.to_string();
        let rows = self
            .blocking(move |db| db.donation_history(&id, role == Role::Donor))
            .await?;
        Ok(rows.into_iter().map(convert::donation).collect())
    }

    async fn update_donation_status(
        &self,
        donation_id: Uuid,
        status: DonationStatus,
        notes: Option<String>,
    ) -> GatewayResult<DonationRecord> {
        let caller = self.require_user()?;
        let record = self.load_donation(donation_id).await?;
        if caller.id != record.donor_id && caller.id != record.ngo_id {
            return Err(GatewayError::Unauthorized(format!("not a party to donation {}", donation_id)));
        }

        let id = donation_id.to_string();
        self.blocking(move |db| db.update_donation_status(&id, status, notes.as_deref()))
            .await?;
        self.load_donation(donation_id).await
    }
}

#[async_trait]
impl ObjectStore for LocalGateway {
    async fn upload_object(&self, bucket: &str, path: &str, bytes: Bytes, content_type: &str) -> GatewayResult<String> {
        let caller = self.require_user()?;
        let put = self.backend.storage.put(bucket, path, &bytes, content_type).await?;

        let mut row = ObjectRow {
            bucket: bucket.to_string(),
            path: path.to_string(),
            owner_id: caller.id.to_string(),
            size: put.size as i64,
            content_type: content_type.to_string(),
            sha256: put.sha256,
            created_at: String::new(),
        };
        let recorded = self
            .blocking(move |db| {
                row.created_at = db.next_timestamp()?;
                db.insert_object(&row)
            })
            .await;

        if let Err(e) = recorded {
            if let Err(cleanup) = self.backend.storage.delete(bucket, path).await {
                warn!("Failed to remove unrecorded object {}/{}: {}", bucket, path, cleanup);
            }
            return Err(e);
        }

        info!("Stored {}/{} ({} bytes)", bucket, path, put.size);
        Ok(self.backend.storage.public_url(bucket, path))
    }

    async fn delete_object(&self, bucket: &str, path: &str) -> GatewayResult<()> {
        let caller = self.require_user()?;
        let (b, p) = (bucket.to_string(), path.to_string());
        let object = self
            .blocking(move |db| db.get_object(&b, &p))
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("{}/{}", bucket, path)))?;

        if object.owner_id != caller.id.to_string() {
            return Err(GatewayError::Unauthorized(format!("{}/{} belongs to another user", bucket, path)));
        }

        self.backend.storage.delete(bucket, path).await?;
        let (b, p) = (bucket.to_string(), path.to_string());
        self.blocking(move |db| db.delete_object(&b, &p)).await?;
        Ok(())
    }
}

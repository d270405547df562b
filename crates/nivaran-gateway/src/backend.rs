use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use uuid::Uuid;

use nivaran_types::api::{
    AuthUser, NewDonation, NewMessage, NgoProfileUpdate, PostFilter, PostInput, SignUpProfile,
    UserProfileUpdate, ViewKind,
};
use nivaran_types::events::{AuthEvent, InsertFilter, RowInsert};
use nivaran_types::models::{
    Chat, ChatDetails, DonationRecord, DonationStatus, Message, NearbyNgo, NgoProfile, Post, Role,
    UserProfile, ViewedNgo,
};

use crate::error::GatewayResult;
use crate::subscription::Subscription;

/// What a change-feed subscriber is handed.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A matching committed insert, in commit order.
    Insert(RowInsert),
    /// The subscriber fell behind and `missed` inserts (matching or not)
    /// were dropped. Anything the subscriber mirrors should be re-read.
    Lagged { missed: u64 },
}

pub type InsertCallback = Arc<dyn Fn(FeedEvent) + Send + Sync>;

/// Result of a sign-up. `profile` is `None` when the profile write failed;
/// the user can complete it later.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub profile: Option<UserProfile>,
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, profile: SignUpProfile) -> GatewayResult<SignUpOutcome>;

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<AuthUser>;

    /// Resumes a previously issued session from its access token.
    async fn restore_session(&self, access_token: &str) -> GatewayResult<AuthUser>;

    async fn sign_out(&self) -> GatewayResult<()>;

    async fn update_password(&self, new_password: &str) -> GatewayResult<()>;

    /// The identity this connection is signed in as.
    fn current_user(&self) -> Option<AuthUser>;

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent>;
}

#[async_trait]
pub trait ProfileGateway: Send + Sync {
    async fn get_user(&self, user_id: Uuid) -> GatewayResult<UserProfile>;

    async fn update_user_profile(&self, user_id: Uuid, update: UserProfileUpdate) -> GatewayResult<UserProfile>;

    async fn get_ngo(&self, ngo_id: Uuid) -> GatewayResult<NgoProfile>;

    async fn update_ngo_profile(&self, ngo_id: Uuid, update: NgoProfileUpdate) -> GatewayResult<NgoProfile>;

    async fn increment_ngo_views(&self, ngo_id: Uuid) -> GatewayResult<()>;

    async fn find_nearby_ngos(&self, lat: f64, lng: f64, radius_km: f64) -> GatewayResult<Vec<NearbyNgo>>;

    async fn log_view(&self, target_user_id: Uuid, kind: ViewKind) -> GatewayResult<()>;

    async fn recently_viewed_ngos(&self, viewer_id: Uuid, limit: u32) -> GatewayResult<Vec<ViewedNgo>>;

    async fn ngo_view_stats(&self, ngo_id: Uuid) -> GatewayResult<u64>;
}

#[async_trait]
pub trait PostGateway: Send + Sync {
    async fn create_post(&self, input: PostInput) -> GatewayResult<Post>;

    async fn get_posts(&self, filter: PostFilter) -> GatewayResult<Vec<Post>>;

    async fn get_post(&self, post_id: Uuid) -> GatewayResult<Post>;

    async fn update_post(&self, post_id: Uuid, input: PostInput) -> GatewayResult<Post>;

    async fn delete_post(&self, post_id: Uuid) -> GatewayResult<()>;

    async fn find_nearby_posts(&self, lat: f64, lng: f64, radius_km: f64) -> GatewayResult<Vec<Post>>;
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Chat metadata with both participants resolved.
    async fn get_chat(&self, chat_id: Uuid) -> GatewayResult<ChatDetails>;

    /// Idempotent on the (donor, ngo, post) tuple.
    async fn get_or_create_chat(&self, donor_id: Uuid, ngo_id: Uuid, post_id: Option<Uuid>) -> GatewayResult<Chat>;

    /// Chats where the user is a participant, most recently updated first.
    async fn list_user_chats(&self, user_id: Uuid) -> GatewayResult<Vec<ChatDetails>>;

    /// Full history, ascending by creation time.
    async fn list_messages(&self, chat_id: Uuid) -> GatewayResult<Vec<Message>>;

    async fn create_message(&self, message: NewMessage) -> GatewayResult<Message>;

    /// Advances the chat's last-activity timestamp.
    async fn touch_chat(&self, chat_id: Uuid) -> GatewayResult<()>;

    /// Starts delivering matching inserts to `on_insert` until the returned
    /// handle is cancelled or dropped.
    async fn subscribe_inserts(&self, filter: InsertFilter, on_insert: InsertCallback) -> GatewayResult<Subscription>;
}

#[async_trait]
pub trait DonationGateway: Send + Sync {
    async fn create_donation_record(&self, donation: NewDonation) -> GatewayResult<DonationRecord>;

    async fn donation_history(&self, user_id: Uuid, role: Role) -> GatewayResult<Vec<DonationRecord>>;

    async fn update_donation_status(
        &self,
        donation_id: Uuid,
        status: DonationStatus,
        notes: Option<String>,
    ) -> GatewayResult<DonationRecord>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` at `bucket/path` and returns its public URL. Never
    /// overwrites an existing object.
    async fn upload_object(&self, bucket: &str, path: &str, bytes: Bytes, content_type: &str) -> GatewayResult<String>;

    async fn delete_object(&self, bucket: &str, path: &str) -> GatewayResult<()>;
}

/// Everything a full client needs from one connection.
pub trait Gateway:
    AuthGateway + ProfileGateway + PostGateway + ChatGateway + DonationGateway + ObjectStore
{
}

impl<T> Gateway for T where
    T: AuthGateway + ProfileGateway + PostGateway + ChatGateway + DonationGateway + ObjectStore
{
}

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use nivaran_gateway::ChatGateway;
use nivaran_types::models::{Chat, ChatSummary, Post, Role};

use crate::error::{ClientError, ClientResult};
use crate::session_store::SessionStore;

/// A user's conversations, most recently active first.
#[derive(Clone)]
pub struct ChatRoster {
    chats: Arc<dyn ChatGateway>,
    store: SessionStore,
}

impl ChatRoster {
    pub fn new(chats: Arc<dyn ChatGateway>, store: SessionStore) -> Self {
        Self { chats, store }
    }

    /// Full reload. Any failure yields an empty roster.
    pub async fn load_chats(&self, user_id: Uuid) -> Vec<ChatSummary> {
        match self.chats.list_user_chats(user_id).await {
            Ok(chats) => chats
                .into_iter()
                .map(|details| ChatSummary {
                    chat_id: details.chat.id,
                    counterpart: details.counterpart_of(user_id).clone(),
                    post_id: details.chat.post_id,
                    post_title: details.post_title.clone(),
                    updated_at: details.chat.updated_at,
                })
                .collect(),
            Err(e) => {
                warn!(user = %user_id, "Failed to load chats: {}", e);
                Vec::new()
            }
        }
    }

    /// Open (or find) the conversation between the signed-in user and
    /// `counterpart_id`. Donor and NGO slots follow the caller's role.
    pub async fn start_chat(&self, counterpart_id: Uuid, post_id: Option<Uuid>) -> ClientResult<Chat> {
        let me = self.store.require_profile()?;
        if me.id == counterpart_id {
            return Err(ClientError::ValidationFailed("cannot start a chat with yourself".into()));
        }

        let (donor_id, ngo_id) = match me.role {
            Role::Donor => (me.id, counterpart_id),
            Role::Ngo => (counterpart_id, me.id),
        };
        let chat = self.chats.get_or_create_chat(donor_id, ngo_id, post_id).await?;
        info!(chat = %chat.id, "Chat ready with {}", counterpart_id);
        Ok(chat)
    }

    /// Contact the author of a post about that post.
    pub async fn contact_for_post(&self, post: &Post) -> ClientResult<Chat> {
        let me = self.store.require_profile()?;
        if post.author_id == me.id {
            return Err(ClientError::ValidationFailed("this is your own post".into()));
        }
        if post.role == me.role {
            return Err(ClientError::ValidationFailed(format!(
                "a {} cannot contact another {}",
                me.role.label(),
                post.role.label()
            )));
        }
        self.start_chat(post.author_id, Some(post.id)).await
    }
}

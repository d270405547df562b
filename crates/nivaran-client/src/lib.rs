//! Client-side state for the donation platform: who is signed in, open
//! conversations, the post feed and editor, the NGO directory and the map.

pub mod chat;
pub mod config;
pub mod directory;
pub mod donations;
pub mod editor;
pub mod error;
pub mod feed;
pub mod geocode;
pub mod map;
pub mod roster;
pub mod session_store;
pub mod timeline;

use std::sync::Arc;

use nivaran_gateway::{ChatGateway, DonationGateway, Gateway, ObjectStore, PostGateway, ProfileGateway};

pub use chat::{Attachment, ChatOptions, ChatSession, SessionEvent, SessionPhase, SessionRegistry};
pub use config::{AppConfig, Config};
pub use error::{ClientError, ClientResult};
pub use session_store::SessionStore;

use crate::directory::Directory;
use crate::donations::Donations;
use crate::editor::PostEditor;
use crate::feed::Feed;
use crate::geocode::Geocoder;
use crate::roster::ChatRoster;

/// One signed-in client over one gateway connection. Hands out the
/// components, all sharing the same session store.
#[derive(Clone)]
pub struct ClientContext {
    chats: Arc<dyn ChatGateway>,
    objects: Arc<dyn ObjectStore>,
    posts: Arc<dyn PostGateway>,
    profiles: Arc<dyn ProfileGateway>,
    donations: Arc<dyn DonationGateway>,
    geocoder: Option<Arc<dyn Geocoder>>,
    store: SessionStore,
    registry: SessionRegistry,
    config: Config,
}

impl ClientContext {
    pub fn new<G>(gateway: Arc<G>, config: Config) -> Self
    where
        G: Gateway + 'static,
    {
        Self {
            chats: gateway.clone(),
            objects: gateway.clone(),
            posts: gateway.clone(),
            profiles: gateway.clone(),
            donations: gateway.clone(),
            geocoder: None,
            store: SessionStore::new(gateway),
            registry: SessionRegistry::new(),
            config,
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn geocoder(&self) -> Option<Arc<dyn Geocoder>> {
        self.geocoder.clone()
    }

    pub fn chat_session(&self) -> ChatSession {
        ChatSession::new(
            self.chats.clone(),
            self.objects.clone(),
            self.store.clone(),
            self.registry.clone(),
            ChatOptions::from(&self.config),
        )
    }

    pub fn roster(&self) -> ChatRoster {
        ChatRoster::new(self.chats.clone(), self.store.clone())
    }

    pub fn feed(&self) -> Feed {
        Feed::new(self.posts.clone(), self.config.app.clone())
    }

    pub fn post_editor(&self) -> PostEditor {
        PostEditor::new(
            self.posts.clone(),
            self.objects.clone(),
            self.geocoder.clone(),
            self.store.clone(),
            self.config.app.clone(),
        )
    }

    pub fn directory(&self) -> Directory {
        Directory::new(self.profiles.clone(), self.store.clone(), self.config.app.clone())
    }

    pub fn donations(&self) -> Donations {
        Donations::new(self.donations.clone(), self.store.clone())
    }
}

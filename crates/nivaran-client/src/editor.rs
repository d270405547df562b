use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use nivaran_gateway::{ObjectStore, PostGateway};
use nivaran_types::api::PostInput;
use nivaran_types::models::{GeoPoint, Post};

use crate::config::AppConfig;
use crate::error::{ClientError, ClientResult};
use crate::geocode::Geocoder;
use crate::session_store::SessionStore;

/// An image picked for a post, not yet uploaded.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// A file left out of the selection, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRejection {
    pub file_name: String,
    pub reason: String,
}

/// Form fields of a post being written.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub title: String,
    pub body: Option<String>,
    pub food_type: Option<String>,
    pub quantity: Option<String>,
    pub pickup_time: Option<DateTime<Utc>>,
    pub pickup_address: Option<String>,
    /// Resolved from `pickup_address` on submit when unset.
    pub location: Option<GeoPoint>,
}

impl PostDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

impl From<&Post> for PostDraft {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            body: post.body.clone(),
            food_type: post.food_type.clone(),
            quantity: post.quantity.clone(),
            pickup_time: post.pickup_time,
            pickup_address: post.pickup_address.clone(),
            location: post.location(),
        }
    }
}

/// Create or edit one post: image selection, uploads, geocoding, write.
pub struct PostEditor {
    posts: Arc<dyn PostGateway>,
    objects: Arc<dyn ObjectStore>,
    geocoder: Option<Arc<dyn Geocoder>>,
    store: SessionStore,
    app: AppConfig,
    editing: Option<Uuid>,
    existing_images: Vec<String>,
    selected: Vec<ImageFile>,
}

impl PostEditor {
    pub fn new(
        posts: Arc<dyn PostGateway>,
        objects: Arc<dyn ObjectStore>,
        geocoder: Option<Arc<dyn Geocoder>>,
        store: SessionStore,
        app: AppConfig,
    ) -> Self {
        Self {
            posts,
            objects,
            geocoder,
            store,
            app,
            editing: None,
            existing_images: Vec::new(),
            selected: Vec::new(),
        }
    }

    /// Load one of the caller's posts for editing.
    pub async fn load_post(&mut self, post_id: Uuid) -> ClientResult<PostDraft> {
        let user = self.store.require_user()?;
        let post = self.posts.get_post(post_id).await?;
        if post.author_id != user.id {
            return Err(ClientError::Unauthorized("you can only edit your own posts".into()));
        }

        self.editing = Some(post.id);
        self.existing_images = post.images.clone();
        self.selected.clear();
        Ok(PostDraft::from(&post))
    }

    pub fn editing(&self) -> Option<Uuid> {
        self.editing
    }

    pub fn existing_images(&self) -> &[String] {
        &self.existing_images
    }

    pub fn selected_images(&self) -> &[ImageFile] {
        &self.selected
    }

    /// Add files to the selection. A batch that would exceed the per-post
    /// limit is refused whole; otherwise files with a disallowed type or
    /// size are skipped and reported.
    pub fn add_images(&mut self, files: Vec<ImageFile>) -> ClientResult<Vec<ImageRejection>> {
        let total = self.existing_images.len() + self.selected.len() + files.len();
        if total > self.app.max_images_per_post {
            return Err(ClientError::ValidationFailed(format!(
                "at most {} images per post",
                self.app.max_images_per_post
            )));
        }

        let mut rejected = Vec::new();
        for file in files {
            if !self.app.allowed_image_types.iter().any(|t| t == &file.content_type) {
                rejected.push(ImageRejection {
                    reason: format!("unsupported type {}", file.content_type),
                    file_name: file.file_name,
                });
            } else if file.bytes.len() > self.app.max_image_bytes {
                rejected.push(ImageRejection {
                    reason: format!("larger than {} bytes", self.app.max_image_bytes),
                    file_name: file.file_name,
                });
            } else {
                self.selected.push(file);
            }
        }
        Ok(rejected)
    }

    pub fn remove_image(&mut self, index: usize) -> Option<ImageFile> {
        (index < self.selected.len()).then(|| self.selected.remove(index))
    }

    /// Drop an already stored image from the post being edited.
    pub fn remove_existing_image(&mut self, url: &str) {
        self.existing_images.retain(|u| u != url);
    }

    /// Upload the selection, resolve the address and write the post.
    ///
    /// Images that fail to upload are left out. If the post write fails the
    /// images uploaded for it are deleted again.
    pub async fn submit(&mut self, draft: PostDraft) -> ClientResult<Post> {
        let profile = self.store.require_profile()?;
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(ClientError::ValidationFailed("title is required".into()));
        }

        let bucket = self.app.post_images_bucket.clone();
        let started = Utc::now().timestamp_millis();
        let mut uploaded_paths = Vec::new();
        let mut images = self.existing_images.clone();

        for (index, file) in self.selected.iter().enumerate() {
            let path = format!("{}/{}-{}-{}", profile.id, started, index, file_name_component(&file.file_name));
            match self
                .objects
                .upload_object(&bucket, &path, file.bytes.clone(), &file.content_type)
                .await
            {
                Ok(url) => {
                    uploaded_paths.push(path);
                    images.push(url);
                }
                Err(e) => warn!(file = %file.file_name, "Image upload failed, skipping: {}", e),
            }
        }

        let pickup_address = draft
            .pickup_address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        let mut location = draft.location;
        if location.is_none() {
            if let (Some(address), Some(geocoder)) = (&pickup_address, &self.geocoder) {
                location = geocoder.geocode(address).await.map(|hit| hit.location);
                if location.is_none() {
                    debug!("Pickup address '{}' not resolved, saving without a location", address);
                }
            }
        }

        let input = PostInput {
            title: title.to_string(),
            body: draft.body,
            food_type: draft.food_type,
            quantity: draft.quantity,
            pickup_time: draft.pickup_time,
            pickup_address,
            lat: location.map(|l| l.lat),
            lng: location.map(|l| l.lng),
            images,
        };

        let result = match self.editing {
            Some(post_id) => self.posts.update_post(post_id, input).await,
            None => self.posts.create_post(input).await,
        };

        match result {
            Ok(post) => {
                info!(post = %post.id, images = post.images.len(), "Post saved");
                self.editing = Some(post.id);
                self.existing_images = post.images.clone();
                self.selected.clear();
                Ok(post)
            }
            Err(e) => {
                error!("Failed to save post: {}", e);
                for path in uploaded_paths {
                    if let Err(e) = self.objects.delete_object(&bucket, &path).await {
                        warn!(path = %path, "Failed to remove orphaned image: {}", e);
                    }
                }
                Err(e.into())
            }
        }
    }
}

fn file_name_component(name: &str) -> String {
    let name: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    if name.trim().is_empty() { "image".to_string() } else { name }
}

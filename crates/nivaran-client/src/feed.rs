use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use nivaran_gateway::PostGateway;
use nivaran_types::api::PostFilter;
use nivaran_types::models::{GeoPoint, Post, Role};

use crate::config::AppConfig;
use crate::error::ClientResult;

/// Client-side narrowing of an already loaded post set.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub role: Option<Role>,
    /// Case-insensitive substring of the food type.
    pub food_type: Option<String>,
    /// Case-insensitive substring of title or body.
    pub text: Option<String>,
}

/// The post feed: loads a page of posts and filters it locally.
pub struct Feed {
    posts: Arc<dyn PostGateway>,
    app: AppConfig,
    filter: PostFilter,
    loaded: Vec<Post>,
}

impl Feed {
    pub fn new(posts: Arc<dyn PostGateway>, app: AppConfig) -> Self {
        let filter = PostFilter {
            limit: Some(app.posts_per_page),
            ..PostFilter::default()
        };
        Self {
            posts,
            app,
            filter,
            loaded: Vec::new(),
        }
    }

    /// Load active posts, newest first, under `filter`. It replaces the
    /// remembered filter entirely, so unset fields clear earlier ones; an
    /// unset limit means one page. Read failures leave the feed empty.
    pub async fn load(&mut self, filter: PostFilter) -> &[Post] {
        self.filter = PostFilter {
            limit: filter.limit.or(Some(self.app.posts_per_page)),
            ..filter
        };
        self.reload().await
    }

    /// Load again with the remembered filter.
    pub async fn reload(&mut self) -> &[Post] {
        self.loaded = match self.posts.get_posts(self.filter.clone()).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!("Failed to load posts: {}", e);
                Vec::new()
            }
        };
        &self.loaded
    }

    /// Replace the loaded set with active posts around `center`, nearest first.
    pub async fn load_nearby(&mut self, center: GeoPoint, radius_km: f64) -> &[Post] {
        let radius = self.app.clamp_radius(radius_km);
        self.loaded = match self.posts.find_nearby_posts(center.lat, center.lng, radius).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!("Failed to load nearby posts: {}", e);
                Vec::new()
            }
        };
        &self.loaded
    }

    pub fn posts(&self) -> &[Post] {
        &self.loaded
    }

    pub fn filter(&self, query: &FeedQuery) -> Vec<Post> {
        filter_posts(&self.loaded, query)
    }

    pub async fn get_post(&self, post_id: Uuid) -> ClientResult<Post> {
        Ok(self.posts.get_post(post_id).await?)
    }

    /// Owner only; also drops the post from the loaded set.
    pub async fn delete_post(&mut self, post_id: Uuid) -> ClientResult<()> {
        self.posts.delete_post(post_id).await?;
        self.loaded.retain(|p| p.id != post_id);
        info!("Post {} deleted", post_id);
        Ok(())
    }
}

pub fn filter_posts(posts: &[Post], query: &FeedQuery) -> Vec<Post> {
    let food_type = query.food_type.as_deref().map(str::to_lowercase);
    let text = query.text.as_deref().map(str::to_lowercase);

    posts
        .iter()
        .filter(|p| query.role.is_none_or(|r| p.role == r))
        .filter(|p| match &food_type {
            Some(needle) => p
                .food_type
                .as_deref()
                .is_some_and(|f| f.to_lowercase().contains(needle.as_str())),
            None => true,
        })
        .filter(|p| match &text {
            Some(needle) => {
                p.title.to_lowercase().contains(needle.as_str())
                    || p.body.as_deref().is_some_and(|b| b.to_lowercase().contains(needle.as_str()))
            }
            None => true,
        })
        .cloned()
        .collect()
}

/// Relative age for post cards: "Just now", "5m ago", "3h ago", "2d ago",
/// then the calendar date after a week.
pub fn time_ago(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - at).num_minutes();
    let hours = minutes / 60;
    let days = hours / 24;

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 7 {
        format!("{}d ago", days)
    } else {
        at.format("%d/%m/%Y").to_string()
    }
}

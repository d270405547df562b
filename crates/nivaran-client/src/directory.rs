use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use nivaran_gateway::ProfileGateway;
use nivaran_types::api::{NgoProfileUpdate, UserProfileUpdate, ViewKind};
use nivaran_types::models::{GeoPoint, NearbyNgo, NgoProfile, UserProfile, ViewedNgo};

use crate::config::AppConfig;
use crate::error::ClientResult;
use crate::session_store::SessionStore;

const RECENTLY_VIEWED_LIMIT: u32 = 10;

/// NGO discovery and profile pages.
#[derive(Clone)]
pub struct Directory {
    profiles: Arc<dyn ProfileGateway>,
    store: SessionStore,
    app: AppConfig,
}

impl Directory {
    pub fn new(profiles: Arc<dyn ProfileGateway>, store: SessionStore, app: AppConfig) -> Self {
        Self { profiles, store, app }
    }

    /// NGOs within `radius_km` (clamped), nearest first. Failures yield an empty list.
    pub async fn nearby_ngos(&self, center: GeoPoint, radius_km: f64) -> Vec<NearbyNgo> {
        let radius = self.app.clamp_radius(radius_km);
        match self.profiles.find_nearby_ngos(center.lat, center.lng, radius).await {
            Ok(ngos) => ngos,
            Err(e) => {
                warn!("Failed to load nearby NGOs: {}", e);
                Vec::new()
            }
        }
    }

    /// Load an NGO page. The view is logged and counted, best-effort.
    pub async fn view_ngo(&self, ngo_id: Uuid) -> ClientResult<NgoProfile> {
        let ngo = self.profiles.get_ngo(ngo_id).await?;

        let viewer = self.store.current_user().map(|u| u.id);
        if viewer != Some(ngo_id) {
            if let Err(e) = self.profiles.log_view(ngo_id, ViewKind::NgoProfile).await {
                warn!(ngo = %ngo_id, "Failed to log profile view: {}", e);
            }
            if let Err(e) = self.profiles.increment_ngo_views(ngo_id).await {
                warn!(ngo = %ngo_id, "Failed to count profile view: {}", e);
            }
        }
        Ok(ngo)
    }

    /// NGOs the signed-in user looked at, latest first.
    pub async fn recently_viewed(&self) -> ClientResult<Vec<ViewedNgo>> {
        let user = self.store.require_user()?;
        Ok(self.profiles.recently_viewed_ngos(user.id, RECENTLY_VIEWED_LIMIT).await?)
    }

    /// Logged views of the signed-in NGO's profile.
    pub async fn my_view_stats(&self) -> ClientResult<u64> {
        let user = self.store.require_user()?;
        Ok(self.profiles.ngo_view_stats(user.id).await?)
    }

    pub async fn update_profile(&self, update: UserProfileUpdate) -> ClientResult<UserProfile> {
        let user = self.store.require_user()?;
        let profile = self.profiles.update_user_profile(user.id, update).await?;
        let _ = self.store.refresh().await;
        Ok(profile)
    }

    pub async fn update_ngo_profile(&self, update: NgoProfileUpdate) -> ClientResult<NgoProfile> {
        let user = self.store.require_user()?;
        Ok(self.profiles.update_ngo_profile(user.id, update).await?)
    }
}

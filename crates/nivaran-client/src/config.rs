use std::path::PathBuf;

use anyhow::Context;

use nivaran_gateway::BackendOptions;
use nivaran_types::api::{BUCKET_CHAT_ATTACHMENTS, BUCKET_POST_IMAGES, BUCKET_PROFILE_IMAGES};
use nivaran_types::models::GeoPoint;

/// Application constants shared by the feed, editor, directory and map.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub default_radius_km: f64,
    pub max_radius_km: f64,
    pub nearby_radius_km: f64,
    pub posts_per_page: u32,
    pub map_zoom: u8,
    pub map_center: GeoPoint,
    pub max_image_bytes: usize,
    pub allowed_image_types: Vec<String>,
    pub max_images_per_post: usize,
    pub post_images_bucket: String,
    pub profile_images_bucket: String,
    pub chat_attachments_bucket: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_radius_km: 10.0,
            max_radius_km: 50.0,
            nearby_radius_km: 50.0,
            posts_per_page: 20,
            map_zoom: 13,
            // Geographic centre of India
            map_center: GeoPoint::new(20.5937, 78.9629),
            max_image_bytes: 5 * 1024 * 1024,
            allowed_image_types: vec!["image/jpeg".into(), "image/png".into(), "image/webp".into()],
            max_images_per_post: 5,
            post_images_bucket: BUCKET_POST_IMAGES.into(),
            profile_images_bucket: BUCKET_PROFILE_IMAGES.into(),
            chat_attachments_bucket: BUCKET_CHAT_ATTACHMENTS.into(),
        }
    }
}

impl AppConfig {
    /// Clamp a requested search radius into `(0, max_radius_km]`, falling
    /// back to the default for non-positive input.
    pub fn clamp_radius(&self, radius_km: f64) -> f64 {
        if radius_km.is_nan() || radius_km <= 0.0 {
            self.default_radius_km
        } else {
            radius_km.min(self.max_radius_km)
        }
    }
}

/// Runtime configuration, read from `NIVARAN_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub storage_dir: PathBuf,
    pub public_base_url: String,
    pub jwt_secret: String,
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    /// Show outgoing messages immediately as pending entries.
    pub optimistic_echo: bool,
    /// Cap on messages held by one chat session. `None` keeps everything.
    pub history_window: Option<usize>,
    pub app: AppConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("nivaran.db"),
            storage_dir: PathBuf::from("storage"),
            public_base_url: "http://localhost:54321".into(),
            jwt_secret: "dev-secret-change-me".into(),
            geocoder_url: "https://nominatim.openstreetmap.org".into(),
            geocoder_user_agent: format!("nivaran/{}", env!("CARGO_PKG_VERSION")),
            optimistic_echo: false,
            history_window: None,
            app: AppConfig::default(),
        }
    }
}

impl Config {
    /// Loads `.env` if present, then overlays any `NIVARAN_*` variables on the defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let optimistic_echo = match std::env::var("NIVARAN_OPTIMISTIC_ECHO") {
            Ok(v) => parse_bool(&v).with_context(|| format!("NIVARAN_OPTIMISTIC_ECHO='{}'", v))?,
            Err(_) => defaults.optimistic_echo,
        };
        let history_window = match std::env::var("NIVARAN_HISTORY_WINDOW") {
            Ok(v) if v.trim().is_empty() || v.trim() == "0" => None,
            Ok(v) => Some(
                v.trim()
                    .parse::<usize>()
                    .with_context(|| format!("NIVARAN_HISTORY_WINDOW='{}'", v))?,
            ),
            Err(_) => defaults.history_window,
        };

        Ok(Self {
            db_path: env_or("NIVARAN_DB_PATH", defaults.db_path.to_string_lossy().as_ref()).into(),
            storage_dir: env_or("NIVARAN_STORAGE_DIR", defaults.storage_dir.to_string_lossy().as_ref()).into(),
            public_base_url: env_or("NIVARAN_PUBLIC_URL", &defaults.public_base_url),
            jwt_secret: env_or("NIVARAN_JWT_SECRET", &defaults.jwt_secret),
            geocoder_url: env_or("NIVARAN_GEOCODER_URL", &defaults.geocoder_url),
            geocoder_user_agent: env_or("NIVARAN_GEOCODER_USER_AGENT", &defaults.geocoder_user_agent),
            optimistic_echo,
            history_window,
            app: defaults.app,
        })
    }

    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            db_path: Some(self.db_path.clone()),
            storage_dir: self.storage_dir.clone(),
            public_base_url: self.public_base_url.clone(),
            jwt_secret: self.jwt_secret.clone(),
            max_image_bytes: self.app.max_image_bytes,
            max_attachment_bytes: 4 * self.app.max_image_bytes,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}

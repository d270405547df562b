use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DonationStatus, Role};

// -- Auth --

/// Access-token claims issued by the gateway on sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

/// The authenticated identity, before any profile is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NgoSignUp {
    pub registration_number: Option<String>,
    pub website: Option<String>,
    pub representative_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignUpProfile {
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub bio: Option<String>,
    pub ngo: Option<NgoSignUp>,
}

impl SignUpProfile {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            phone: None,
            address: None,
            city: None,
            state: None,
            lat: None,
            lng: None,
            bio: None,
            ngo: None,
        }
    }
}

// -- Profiles --

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub profile_completed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NgoProfileUpdate {
    pub registration_number: Option<String>,
    pub website: Option<String>,
    pub representative_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    NgoProfile,
    Post,
}

impl ViewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NgoProfile => "ngo_profile",
            Self::Post => "post",
        }
    }
}

// -- Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMessage {
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub attachments: Vec<String>,
    pub read_by: Vec<Uuid>,
}

// -- Posts --

/// Fields written on post create and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostInput {
    pub title: String,
    pub body: Option<String>,
    pub food_type: Option<String>,
    pub quantity: Option<String>,
    pub pickup_time: Option<DateTime<Utc>>,
    pub pickup_address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub images: Vec<String>,
}

/// Server-side post filter. `food_type` is a case-insensitive substring match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostFilter {
    pub author_id: Option<Uuid>,
    pub role: Option<Role>,
    pub food_type: Option<String>,
    pub limit: Option<u32>,
}

// -- Donations --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDonation {
    pub donor_id: Uuid,
    pub ngo_id: Uuid,
    pub post_id: Option<Uuid>,
    pub status: DonationStatus,
    pub notes: Option<String>,
}

// -- Storage --

pub const BUCKET_POST_IMAGES: &str = "post-images";
pub const BUCKET_PROFILE_IMAGES: &str = "profile-images";
pub const BUCKET_CHAT_ATTACHMENTS: &str = "chat-attachments";

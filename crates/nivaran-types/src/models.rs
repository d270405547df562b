use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Donor,
    Ngo,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Donor => "donor",
            Self::Ngo => "ngo",
        }
    }

    /// Label used next to names in lists and popups.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Donor => "Donor",
            Self::Ngo => "NGO",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "donor" => Ok(Self::Donor),
            "ngo" => Ok(Self::Ngo),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Mean Earth radius used for all great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance in kilometres (Haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

        EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Explicit completion flag; when unset, completeness is judged from the fields.
    #[serde(default)]
    pub profile_completed: Option<bool>,
}

impl UserProfile {
    pub fn location(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.lat?, self.lng?))
    }

    pub fn as_party(&self) -> PartyRef {
        PartyRef {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
            profile_image_url: self.profile_image_url.clone(),
        }
    }
}

/// Denormalized identity embedded in chats, messages and posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyRef {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub profile_image_url: Option<String>,
}

/// Extended profile for NGO accounts. `id` is the owning user's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NgoProfile {
    pub id: Uuid,
    pub registration_number: Option<String>,
    pub website: Option<String>,
    pub representative_name: Option<String>,
    pub verified: bool,
    pub rating: Option<f64>,
    pub views: i64,
    pub user: UserProfile,
}

/// Row returned by the nearby-NGO procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyNgo {
    pub id: Uuid,
    pub name: String,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub profile_image_url: Option<String>,
    pub verified: bool,
    pub rating: Option<f64>,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Active,
    Claimed,
    Closed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Claimed => "claimed",
            Self::Closed => "closed",
        }
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "claimed" => Ok(Self::Claimed),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown post status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub role: Role,
    pub title: String,
    pub body: Option<String>,
    pub food_type: Option<String>,
    pub quantity: Option<String>,
    pub pickup_time: Option<DateTime<Utc>>,
    pub pickup_address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub images: Vec<String>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub author: Option<PartyRef>,
    /// Only set by the nearby-posts procedure.
    pub distance_km: Option<f64>,
}

impl Post {
    pub fn location(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.lat?, self.lng?))
    }
}

/// A conversation between one donor and one NGO, optionally about a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub ngo_id: Uuid,
    pub post_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.donor_id == user_id || self.ngo_id == user_id
    }
}

/// Chat joined with both participants and the referenced post title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDetails {
    pub chat: Chat,
    pub donor: PartyRef,
    pub ngo: PartyRef,
    pub post_title: Option<String>,
}

impl ChatDetails {
    /// The participant that is not `user_id`.
    pub fn counterpart_of(&self, user_id: Uuid) -> &PartyRef {
        if self.donor.id == user_id {
            &self.ngo
        } else {
            &self.donor
        }
    }
}

/// Roster entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat_id: Uuid,
    pub counterpart: PartyRef,
    pub post_id: Option<Uuid>,
    pub post_title: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub attachments: Vec<String>,
    pub read_by: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Completed,
    Cancelled,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for DonationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown donation status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationRecord {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub ngo_id: Uuid,
    pub post_id: Option<Uuid>,
    pub status: DonationStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub donor: Option<PartyRef>,
    pub ngo: Option<PartyRef>,
    pub post_title: Option<String>,
}

/// An NGO profile the viewer looked at, most recent view only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewedNgo {
    pub ngo: PartyRef,
    pub address: Option<String>,
    pub last_viewed: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let p = GeoPoint::new(19.076, 72.8777);
        assert!(p.distance_km(&p).abs() < 1e-9);
    }

    #[test]
    fn mumbai_to_pune_is_about_120_km() {
        let mumbai = GeoPoint::new(19.0760, 72.8777);
        let pune = GeoPoint::new(18.5204, 73.8567);
        let d = mumbai.distance_km(&pune);
        assert!((d - 120.0).abs() < 5.0, "got {}", d);
        assert!((d - pune.distance_km(&mumbai)).abs() < 1e-9);
    }

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!("ngo".parse::<Role>().unwrap(), Role::Ngo);
        assert_eq!(Role::Donor.to_string(), "donor");
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn counterpart_is_the_other_participant() {
        let party = |role| PartyRef {
            id: Uuid::new_v4(),
            name: "x".into(),
            role,
            profile_image_url: None,
        };
        let details = ChatDetails {
            chat: Chat {
                id: Uuid::new_v4(),
                donor_id: Uuid::nil(),
                ngo_id: Uuid::nil(),
                post_id: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            donor: party(Role::Donor),
            ngo: party(Role::Ngo),
            post_title: None,
        };
        assert_eq!(details.counterpart_of(details.donor.id).id, details.ngo.id);
        assert_eq!(details.counterpart_of(details.ngo.id).id, details.donor.id);
    }
}

/// Database row types. Each maps directly to a SQLite row.
/// Distinct from nivaran-types API models to keep the DB layer independent.

pub struct AuthUserRow {
    pub id: String,
    pub email: String,
    pub password: String,
}

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub created_at: String,
    pub profile_completed: Option<bool>,
}

pub struct NgoRow {
    pub id: String,
    pub registration_number: Option<String>,
    pub website: Option<String>,
    pub representative_name: Option<String>,
    pub verified: bool,
    pub rating: Option<f64>,
    pub views: i64,
    pub user: UserRow,
}

pub struct NearbyNgoRow {
    pub id: String,
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

/// Minimal user columns joined into chats, posts and messages.
pub struct PartyRow {
    pub id: String,
    pub name: String,
    pub role: String,
    pub profile_image_url: Option<String>,
}

pub struct PostRow {
    pub id: String,
    pub author_id: String,
    pub role: String,
    pub title: String,
    pub body: Option<String>,
    pub food_type: Option<String>,
    pub quantity: Option<String>,
    pub pickup_time: Option<String>,
    pub pickup_address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// JSON array of URLs
    pub images: String,
    pub status: String,
    pub created_at: String,
    pub author: Option<PartyRow>,
    pub distance_km: Option<f64>,
}

pub struct ChatRow {
    pub id: String,
    pub donor_id: String,
    pub ngo_id: String,
    pub post_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ChatDetailsRow {
    pub chat: ChatRow,
    pub donor: PartyRow,
    pub ngo: PartyRow,
    pub post_title: Option<String>,
}

#[derive(Clone)]
pub struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub text: String,
    /// JSON array of URLs
    pub attachments: String,
    /// JSON array of user ids
    pub read_by: String,
    pub created_at: String,
}

pub struct DonationRow {
    pub id: String,
    pub donor_id: String,
    pub ngo_id: String,
    pub post_id: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub donor: Option<PartyRow>,
    pub ngo: Option<PartyRow>,
    pub post_title: Option<String>,
}

pub struct ViewedRow {
    pub target: PartyRow,
    pub address: Option<String>,
    pub viewed_at: String,
}

pub struct ObjectRow {
    pub bucket: String,
    pub path: String,
    pub owner_id: String,
    pub size: i64,
    pub content_type: String,
    pub sha256: String,
    pub created_at: String,
}

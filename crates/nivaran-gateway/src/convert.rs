//! Row-to-model conversion. Corrupt columns are logged and replaced with a
//! default rather than failing the whole read.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::warn;
use uuid::Uuid;

use nivaran_db::models::{
    ChatDetailsRow, ChatRow, DonationRow, MessageRow, NearbyNgoRow, NgoRow, PartyRow, PostRow,
    UserRow, ViewedRow,
};
use nivaran_types::models::{
    Chat, ChatDetails, DonationRecord, DonationStatus, Message, NearbyNgo, NgoProfile, PartyRef,
    Post, PostStatus, Role, UserProfile, ViewedNgo,
};

fn uuid(value: &str, column: &str, row_id: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on row '{}': {}", column, value, row_id, e);
        Uuid::default()
    })
}

fn opt_uuid(value: Option<&str>, column: &str, row_id: &str) -> Option<Uuid> {
    value.map(|v| uuid(v, column, row_id))
}

pub(crate) fn timestamp(value: &str, column: &str, row_id: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt {} '{}' on row '{}': {}", column, value, row_id, e);
            DateTime::default()
        })
}

fn enum_value<T: FromStr<Err = String>>(value: &str, column: &str, row_id: &str, fallback: T) -> T {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} on row '{}': {}", column, row_id, e);
        fallback
    })
}

fn json_list<T: DeserializeOwned>(value: &str, column: &str, row_id: &str) -> Vec<T> {
    serde_json::from_str(value).unwrap_or_else(|e| {
        warn!("Corrupt {} JSON on row '{}': {}", column, row_id, e);
        Vec::new()
    })
}

pub fn party(row: PartyRow) -> PartyRef {
    PartyRef {
        id: uuid(&row.id, "user id", &row.id),
        role: enum_value(&row.role, "role", &row.id, Role::Donor),
        name: row.name,
        profile_image_url: row.profile_image_url,
    }
}

pub fn user(row: UserRow) -> UserProfile {
    UserProfile {
        id: uuid(&row.id, "id", &row.id),
        role: enum_value(&row.role, "role", &row.id, Role::Donor),
        created_at: timestamp(&row.created_at, "created_at", &row.id),
        email: row.email,
        name: row.name,
        phone: row.phone,
        address: row.address,
        city: row.city,
        state: row.state,
        lat: row.lat,
        lng: row.lng,
        bio: row.bio,
        profile_image_url: row.profile_image_url,
        profile_completed: row.profile_completed,
    }
}

pub fn ngo(row: NgoRow) -> NgoProfile {
    NgoProfile {
        id: uuid(&row.id, "id", &row.id),
        registration_number: row.registration_number,
        website: row.website,
        representative_name: row.representative_name,
        verified: row.verified,
        rating: row.rating,
        views: row.views,
        user: user(row.user),
    }
}

pub fn nearby_ngo(row: NearbyNgoRow) -> NearbyNgo {
    NearbyNgo {
        id: uuid(&row.id, "id", &row.id),
        name: row.name,
        bio: row.bio,
        phone: row.phone,
        address: row.address,
        lat: row.lat,
        lng: row.lng,
        profile_image_url: row.profile_image_url,
        verified: row.verified,
        rating: row.rating,
        distance_km: row.distance_km,
    }
}

pub fn post(row: PostRow) -> Post {
    let id = row.id.as_str();
    Post {
        id: uuid(id, "id", id),
        author_id: uuid(&row.author_id, "author_id", id),
        role: enum_value(&row.role, "role", id, Role::Donor),
        pickup_time: row.pickup_time.as_deref().map(|t| timestamp(t, "pickup_time", id)),
        images: json_list(&row.images, "images", id),
        status: enum_value(&row.status, "status", id, PostStatus::Active),
        created_at: timestamp(&row.created_at, "created_at", id),
        author: row.author.map(party),
        title: row.title,
        body: row.body,
        food_type: row.food_type,
        quantity: row.quantity,
        pickup_address: row.pickup_address,
        lat: row.lat,
        lng: row.lng,
        distance_km: row.distance_km,
    }
}

pub fn chat(row: ChatRow) -> Chat {
    let id = row.id.as_str();
    Chat {
        id: uuid(id, "id", id),
        donor_id: uuid(&row.donor_id, "donor_id", id),
        ngo_id: uuid(&row.ngo_id, "ngo_id", id),
        post_id: opt_uuid(row.post_id.as_deref(), "post_id", id),
        created_at: timestamp(&row.created_at, "created_at", id),
        updated_at: timestamp(&row.updated_at, "updated_at", id),
    }
}

pub fn chat_details(row: ChatDetailsRow) -> ChatDetails {
    ChatDetails {
        chat: chat(row.chat),
        donor: party(row.donor),
        ngo: party(row.ngo),
        post_title: row.post_title,
    }
}

pub fn message(row: MessageRow) -> Message {
    let id = row.id.as_str();
    Message {
        id: uuid(id, "id", id),
        chat_id: uuid(&row.chat_id, "chat_id", id),
        sender_id: uuid(&row.sender_id, "sender_id", id),
        attachments: json_list(&row.attachments, "attachments", id),
        read_by: json_list(&row.read_by, "read_by", id),
        created_at: timestamp(&row.created_at, "created_at", id),
        text: row.text,
    }
}

pub fn donation(row: DonationRow) -> DonationRecord {
    let id = row.id.as_str();
    DonationRecord {
        id: uuid(id, "id", id),
        donor_id: uuid(&row.donor_id, "donor_id", id),
        ngo_id: uuid(&row.ngo_id, "ngo_id", id),
        post_id: opt_uuid(row.post_id.as_deref(), "post_id", id),
        status: enum_value(&row.status, "status", id, DonationStatus::Pending),
        created_at: timestamp(&row.created_at, "created_at", id),
        notes: row.notes,
        donor: row.donor.map(party),
        ngo: row.ngo.map(party),
        post_title: row.post_title,
    }
}

pub fn viewed_ngo(row: ViewedRow) -> ViewedNgo {
    let last_viewed = timestamp(&row.viewed_at, "created_at", &row.target.id);
    ViewedNgo {
        ngo: party(row.target),
        address: row.address,
        last_viewed,
    }
}

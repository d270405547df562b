use crate::models::{
    AuthUserRow, ChatDetailsRow, ChatRow, DonationRow, MessageRow, NearbyNgoRow, NgoRow, ObjectRow,
    PartyRow, PostRow, UserRow, ViewedRow,
};
use crate::{Database, format_timestamp};
use anyhow::Result;
use rusqlite::{Row, params};

use nivaran_types::api::{
    NewDonation, NewMessage, NgoProfileUpdate, NgoSignUp, PostFilter, PostInput, SignUpProfile,
    UserProfileUpdate, ViewKind,
};
use nivaran_types::models::DonationStatus;

const USER_COLUMNS: &str = "u.id, u.email, u.name, u.role, u.phone, u.address, u.city, u.state, \
     u.lat, u.lng, u.bio, u.profile_image_url, u.created_at, u.profile_completed";

const POST_COLUMNS: &str = "p.id, p.author_id, p.role, p.title, p.body, p.food_type, p.quantity, \
     p.pickup_time, p.pickup_address, p.lat, p.lng, p.images, p.status, p.created_at, \
     a.id, a.name, a.role, a.profile_image_url";

const CHAT_DETAILS_SELECT: &str = "SELECT c.id, c.donor_id, c.ngo_id, c.post_id, c.created_at, c.updated_at,
            d.id, d.name, d.role, d.profile_image_url,
            n.id, n.name, n.role, n.profile_image_url,
            p.title
     FROM chats c
     JOIN users d ON d.id = c.donor_id
     JOIN users n ON n.id = c.ngo_id
     LEFT JOIN posts p ON p.id = c.post_id";

const DONATION_SELECT: &str = "SELECT h.id, h.donor_id, h.ngo_id, h.post_id, h.status, h.notes, h.created_at,
            d.id, d.name, d.role, d.profile_image_url,
            n.id, n.name, n.role, n.profile_image_url,
            p.title
     FROM donations_history h
     LEFT JOIN users d ON d.id = h.donor_id
     LEFT JOIN users n ON n.id = h.ngo_id
     LEFT JOIN posts p ON p.id = h.post_id";

impl Database {
    // -- Auth --

    pub fn create_auth_user(&self, id: &str, email: &str, password_hash: &str) -> Result<()> {
        let now = self.next_timestamp()?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO auth_users (id, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, email, password_hash, &now),
            )?;
            Ok(())
        })
    }

    pub fn get_auth_user_by_email(&self, email: &str) -> Result<Option<AuthUserRow>> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT id, email, password FROM auth_users WHERE email = ?1",
                [email],
                |row| {
                    Ok(AuthUserRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        password: row.get(2)?,
                    })
                },
            )
            .optional()?)
        })
    }

    pub fn update_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("UPDATE auth_users SET password = ?2 WHERE id = ?1", (id, password_hash))?;
            Ok(n > 0)
        })
    }

    // -- Users --

    pub fn create_user_profile(&self, id: &str, email: &str, profile: &SignUpProfile) -> Result<()> {
        let now = self.next_timestamp()?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, name, role, phone, address, city, state, lat, lng, bio, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    id,
                    email,
                    profile.name,
                    profile.role.as_str(),
                    profile.phone,
                    profile.address,
                    profile.city,
                    profile.state,
                    profile.lat,
                    profile.lng,
                    profile.bio,
                    now
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users u WHERE u.id = ?1", USER_COLUMNS);
            Ok(conn.query_row(&sql, [id], |row| user_from_row(row, 0)).optional()?)
        })
    }

    /// Applies the `Some` fields of `update`. Returns false if no such user.
    pub fn update_user(&self, id: &str, update: &UserProfileUpdate) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET
                    name = COALESCE(?2, name),
                    phone = COALESCE(?3, phone),
                    address = COALESCE(?4, address),
                    city = COALESCE(?5, city),
                    state = COALESCE(?6, state),
                    lat = COALESCE(?7, lat),
                    lng = COALESCE(?8, lng),
                    bio = COALESCE(?9, bio),
                    profile_image_url = COALESCE(?10, profile_image_url),
                    profile_completed = COALESCE(?11, profile_completed)
                 WHERE id = ?1",
                params![
                    id,
                    update.name,
                    update.phone,
                    update.address,
                    update.city,
                    update.state,
                    update.lat,
                    update.lng,
                    update.bio,
                    update.profile_image_url,
                    update.profile_completed
                ],
            )?;
            Ok(n > 0)
        })
    }

    // -- NGOs --

    pub fn create_ngo_profile(&self, id: &str, ngo: &NgoSignUp) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO ngos (id, registration_number, website, representative_name) VALUES (?1, ?2, ?3, ?4)",
                params![id, ngo.registration_number, ngo.website, ngo.representative_name],
            )?;
            Ok(())
        })
    }

    pub fn get_ngo(&self, id: &str) -> Result<Option<NgoRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT g.id, g.registration_number, g.website, g.representative_name, g.verified, g.rating, g.views, {}
                 FROM ngos g JOIN users u ON u.id = g.id
                 WHERE g.id = ?1",
                USER_COLUMNS
            );
            Ok(conn.query_row(&sql, [id], |row| {
                Ok(NgoRow {
                    id: row.get(0)?,
                    registration_number: row.get(1)?,
                    website: row.get(2)?,
                    representative_name: row.get(3)?,
                    verified: row.get(4)?,
                    rating: row.get(5)?,
                    views: row.get(6)?,
                    user: user_from_row(row, 7)?,
                })
            })
            .optional()?)
        })
    }

    pub fn update_ngo(&self, id: &str, update: &NgoProfileUpdate) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE ngos SET
                    registration_number = COALESCE(?2, registration_number),
                    website = COALESCE(?3, website),
                    representative_name = COALESCE(?4, representative_name)
                 WHERE id = ?1",
                params![id, update.registration_number, update.website, update.representative_name],
            )?;
            Ok(n > 0)
        })
    }

    pub fn increment_ngo_views(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("UPDATE ngos SET views = views + 1 WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// NGOs with a known location within `radius_km`, nearest first.
    pub fn find_nearby_ngos(&self, lat: f64, lng: f64, radius_km: f64) -> Result<Vec<NearbyNgoRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.name, u.bio, u.phone, u.address, u.lat, u.lng, u.profile_image_url,
                        COALESCE(g.verified, 0), g.rating,
                        haversine_km(?1, ?2, u.lat, u.lng) AS distance_km
                 FROM users u
                 LEFT JOIN ngos g ON g.id = u.id
                 WHERE u.role = 'ngo' AND u.lat IS NOT NULL AND u.lng IS NOT NULL
                   AND haversine_km(?1, ?2, u.lat, u.lng) <= ?3
                 ORDER BY distance_km ASC",
            )?;

            let rows = stmt
                .query_map(params![lat, lng, radius_km], |row| {
                    Ok(NearbyNgoRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        bio: row.get(2)?,
                        phone: row.get(3)?,
                        address: row.get(4)?,
                        lat: row.get(5)?,
                        lng: row.get(6)?,
                        profile_image_url: row.get(7)?,
                        verified: row.get(8)?,
                        rating: row.get(9)?,
                        distance_km: row.get(10)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Posts --

    /// Inserts an active post. Returns its commit timestamp.
    pub fn insert_post(&self, id: &str, author_id: &str, role: &str, input: &PostInput) -> Result<String> {
        let now = self.next_timestamp()?;
        let images = serde_json::to_string(&input.images)?;
        let pickup_time = input.pickup_time.as_ref().map(format_timestamp);

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts (id, author_id, role, title, body, food_type, quantity, pickup_time,
                                    pickup_address, lat, lng, images, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 'active', ?13)",
                params![
                    id,
                    author_id,
                    role,
                    input.title,
                    input.body,
                    input.food_type,
                    input.quantity,
                    pickup_time,
                    input.pickup_address,
                    input.lat,
                    input.lng,
                    images,
                    now
                ],
            )?;
            Ok(now)
        })
    }

    /// Active posts, newest first.
    pub fn get_posts(&self, filter: &PostFilter) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, NULL FROM posts p
                 LEFT JOIN users a ON a.id = p.author_id
                 WHERE p.status = 'active'
                   AND (?1 IS NULL OR p.author_id = ?1)
                   AND (?2 IS NULL OR p.role = ?2)
                   AND (?3 IS NULL OR instr(lower(COALESCE(p.food_type, '')), lower(?3)) > 0)
                 ORDER BY p.created_at DESC
                 LIMIT ?4",
                POST_COLUMNS
            );
            let author_id = filter.author_id.map(|id| id.to_string());
            let role = filter.role.map(|r| r.as_str());
            let limit = filter.limit.map(i64::from).unwrap_or(-1);

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![author_id, role, filter.food_type, limit], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, NULL FROM posts p
                 LEFT JOIN users a ON a.id = p.author_id
                 WHERE p.id = ?1",
                POST_COLUMNS
            );
            Ok(conn.query_row(&sql, [id], post_from_row).optional()?)
        })
    }

    pub fn update_post(&self, id: &str, input: &PostInput) -> Result<bool> {
        let images = serde_json::to_string(&input.images)?;
        let pickup_time = input.pickup_time.as_ref().map(format_timestamp);

        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE posts SET title = ?2, body = ?3, food_type = ?4, quantity = ?5, pickup_time = ?6,
                                  pickup_address = ?7, lat = ?8, lng = ?9, images = ?10
                 WHERE id = ?1",
                params![
                    id,
                    input.title,
                    input.body,
                    input.food_type,
                    input.quantity,
                    pickup_time,
                    input.pickup_address,
                    input.lat,
                    input.lng,
                    images
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_post(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// Active posts with a location within `radius_km`, nearest first.
    pub fn find_nearby_posts(&self, lat: f64, lng: f64, radius_km: f64) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, haversine_km(?1, ?2, p.lat, p.lng) AS distance_km
                 FROM posts p
                 LEFT JOIN users a ON a.id = p.author_id
                 WHERE p.status = 'active' AND p.lat IS NOT NULL AND p.lng IS NOT NULL
                   AND haversine_km(?1, ?2, p.lat, p.lng) <= ?3
                 ORDER BY distance_km ASC",
                POST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![lat, lng, radius_km], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Chats --

    /// Returns the chat for the tuple, inserting it under `id` if absent.
    /// The bool is true when a new row was written.
    pub fn find_or_insert_chat(
        &self,
        id: &str,
        donor_id: &str,
        ngo_id: &str,
        post_id: Option<&str>,
    ) -> Result<(ChatRow, bool)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing = tx
                .query_row(
                    "SELECT id, donor_id, ngo_id, post_id, created_at, updated_at FROM chats
                     WHERE donor_id = ?1 AND ngo_id = ?2 AND post_id IS ?3",
                    params![donor_id, ngo_id, post_id],
                    |row| chat_from_row(row, 0),
                )
                .optional()?;
            if let Some(chat) = existing {
                return Ok((chat, false));
            }

            let now = self.next_timestamp()?;
            tx.execute(
                "INSERT INTO chats (id, donor_id, ngo_id, post_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![id, donor_id, ngo_id, post_id, now],
            )?;
            tx.commit()?;

            Ok((
                ChatRow {
                    id: id.to_string(),
                    donor_id: donor_id.to_string(),
                    ngo_id: ngo_id.to_string(),
                    post_id: post_id.map(str::to_string),
                    created_at: now.clone(),
                    updated_at: now,
                },
                true,
            ))
        })
    }

    pub fn get_chat(&self, id: &str) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT id, donor_id, ngo_id, post_id, created_at, updated_at FROM chats WHERE id = ?1",
                [id],
                |row| chat_from_row(row, 0),
            )
            .optional()?)
        })
    }

    pub fn get_chat_details(&self, id: &str) -> Result<Option<ChatDetailsRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE c.id = ?1", CHAT_DETAILS_SELECT);
            Ok(conn.query_row(&sql, [id], chat_details_from_row).optional()?)
        })
    }

    /// Chats where `user_id` is either participant, most recently updated first.
    pub fn list_user_chats(&self, user_id: &str) -> Result<Vec<ChatDetailsRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE c.donor_id = ?1 OR c.ngo_id = ?1 ORDER BY c.updated_at DESC",
                CHAT_DETAILS_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], chat_details_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Advances `updated_at`. Returns the new value, or None if no such chat.
    pub fn touch_chat(&self, id: &str) -> Result<Option<String>> {
        let now = self.next_timestamp()?;
        self.with_conn_mut(|conn| {
            let n = conn.execute("UPDATE chats SET updated_at = ?2 WHERE id = ?1", (id, &now))?;
            Ok((n > 0).then_some(now))
        })
    }

    // -- Messages --

    /// Inserts a message and runs `on_commit` with the stored row while the
    /// connection is still held, so notifications leave in commit order.
    pub fn insert_message<F>(&self, id: &str, msg: &NewMessage, on_commit: F) -> Result<MessageRow>
    where
        F: FnOnce(&MessageRow),
    {
        let attachments = serde_json::to_string(&msg.attachments)?;
        let read_by = serde_json::to_string(&msg.read_by)?;

        self.with_conn_mut(|conn| {
            let now = self.next_timestamp()?;
            let chat_id = msg.chat_id.to_string();
            let sender_id = msg.sender_id.to_string();
            conn.execute(
                "INSERT INTO chat_messages (id, chat_id, sender_id, text, attachments, read_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, chat_id, sender_id, msg.text, attachments, read_by, now],
            )?;

            let row = MessageRow {
                id: id.to_string(),
                chat_id,
                sender_id,
                text: msg.text.clone(),
                attachments,
                read_by,
                created_at: now,
            };
            on_commit(&row);
            Ok(row)
        })
    }

    /// Full history of a chat, oldest first.
    pub fn get_messages(&self, chat_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, sender_id, text, attachments, read_by, created_at
                 FROM chat_messages
                 WHERE chat_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;

            let rows = stmt
                .query_map([chat_id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        chat_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        text: row.get(3)?,
                        attachments: row.get(4)?,
                        read_by: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Donations --

    pub fn insert_donation(&self, id: &str, donation: &NewDonation) -> Result<()> {
        let now = self.next_timestamp()?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO donations_history (id, donor_id, ngo_id, post_id, status, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    donation.donor_id.to_string(),
                    donation.ngo_id.to_string(),
                    donation.post_id.map(|p| p.to_string()),
                    donation.status.as_str(),
                    donation.notes,
                    now
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_donation(&self, id: &str) -> Result<Option<DonationRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE h.id = ?1", DONATION_SELECT);
            Ok(conn.query_row(&sql, [id], donation_from_row).optional()?)
        })
    }

    /// Records where the user appears as donor (`as_donor`) or as NGO, newest first.
    pub fn donation_history(&self, user_id: &str, as_donor: bool) -> Result<Vec<DonationRow>> {
        self.with_conn(|conn| {
            let column = if as_donor { "h.donor_id" } else { "h.ngo_id" };
            let sql = format!("{} WHERE {} = ?1 ORDER BY h.created_at DESC", DONATION_SELECT, column);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], donation_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_donation_status(&self, id: &str, status: DonationStatus, notes: Option<&str>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE donations_history SET status = ?2, notes = COALESCE(?3, notes) WHERE id = ?1",
                params![id, status.as_str(), notes],
            )?;
            Ok(n > 0)
        })
    }

    // -- Views --

    pub fn insert_view(&self, id: &str, viewer_id: Option<&str>, target_id: &str, kind: ViewKind) -> Result<()> {
        let now = self.next_timestamp()?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO views_log (id, viewer_id, target_user_id, type, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, viewer_id, target_id, kind.as_str(), now],
            )?;
            Ok(())
        })
    }

    /// Distinct targets the viewer looked at, keeping each one's latest view.
    pub fn recently_viewed(&self, viewer_id: &str, kind: ViewKind, limit: u32) -> Result<Vec<ViewedRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.name, u.role, u.profile_image_url, u.address, v.last_viewed
                 FROM (
                    SELECT target_user_id, MAX(created_at) AS last_viewed
                    FROM views_log
                    WHERE viewer_id = ?1 AND type = ?2
                    GROUP BY target_user_id
                 ) v
                 JOIN users u ON u.id = v.target_user_id
                 ORDER BY v.last_viewed DESC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(params![viewer_id, kind.as_str(), limit], |row| {
                    Ok(ViewedRow {
                        target: party_from_row(row, 0)?,
                        address: row.get(4)?,
                        viewed_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn view_count(&self, target_id: &str, kind: ViewKind) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM views_log WHERE target_user_id = ?1 AND type = ?2",
                params![target_id, kind.as_str()],
                |row| row.get(0),
            )?)
        })
    }

    // -- Objects --

    /// Fails if an object already exists at (bucket, path); uploads never overwrite.
    pub fn insert_object(&self, row: &ObjectRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO objects (bucket, path, owner_id, size, content_type, sha256, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.bucket,
                    row.path,
                    row.owner_id,
                    row.size,
                    row.content_type,
                    row.sha256,
                    row.created_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_object(&self, bucket: &str, path: &str) -> Result<Option<ObjectRow>> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT bucket, path, owner_id, size, content_type, sha256, created_at
                 FROM objects WHERE bucket = ?1 AND path = ?2",
                [bucket, path],
                |row| {
                    Ok(ObjectRow {
                        bucket: row.get(0)?,
                        path: row.get(1)?,
                        owner_id: row.get(2)?,
                        size: row.get(3)?,
                        content_type: row.get(4)?,
                        sha256: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()?)
        })
    }

    pub fn delete_object(&self, bucket: &str, path: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM objects WHERE bucket = ?1 AND path = ?2", [bucket, path])?;
            Ok(n > 0)
        })
    }
}

fn user_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(at)?,
        email: row.get(at + 1)?,
        name: row.get(at + 2)?,
        role: row.get(at + 3)?,
        phone: row.get(at + 4)?,
        address: row.get(at + 5)?,
        city: row.get(at + 6)?,
        state: row.get(at + 7)?,
        lat: row.get(at + 8)?,
        lng: row.get(at + 9)?,
        bio: row.get(at + 10)?,
        profile_image_url: row.get(at + 11)?,
        created_at: row.get(at + 12)?,
        profile_completed: row.get(at + 13)?,
    })
}

fn party_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<PartyRow> {
    Ok(PartyRow {
        id: row.get(at)?,
        name: row.get(at + 1)?,
        role: row.get(at + 2)?,
        profile_image_url: row.get(at + 3)?,
    })
}

/// LEFT JOINed party: absent when the id column is NULL.
fn optional_party_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Option<PartyRow>> {
    match row.get::<_, Option<String>>(at)? {
        Some(_) => party_from_row(row, at).map(Some),
        None => Ok(None),
    }
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        role: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        food_type: row.get(5)?,
        quantity: row.get(6)?,
        pickup_time: row.get(7)?,
        pickup_address: row.get(8)?,
        lat: row.get(9)?,
        lng: row.get(10)?,
        images: row.get(11)?,
        status: row.get(12)?,
        created_at: row.get(13)?,
        author: optional_party_from_row(row, 14)?,
        distance_km: row.get(18)?,
    })
}

fn chat_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(at)?,
        donor_id: row.get(at + 1)?,
        ngo_id: row.get(at + 2)?,
        post_id: row.get(at + 3)?,
        created_at: row.get(at + 4)?,
        updated_at: row.get(at + 5)?,
    })
}

fn chat_details_from_row(row: &Row<'_>) -> rusqlite::Result<ChatDetailsRow> {
    Ok(ChatDetailsRow {
        chat: chat_from_row(row, 0)?,
        donor: party_from_row(row, 6)?,
        ngo: party_from_row(row, 10)?,
        post_title: row.get(14)?,
    })
}

fn donation_from_row(row: &Row<'_>) -> rusqlite::Result<DonationRow> {
    Ok(DonationRow {
        id: row.get(0)?,
        donor_id: row.get(1)?,
        ngo_id: row.get(2)?,
        post_id: row.get(3)?,
        status: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
        donor: optional_party_from_row(row, 7)?,
        ngo: optional_party_from_row(row, 11)?,
        post_title: row.get(15)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

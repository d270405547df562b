use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS auth_users (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            password        TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id                  TEXT PRIMARY KEY REFERENCES auth_users(id),
            email               TEXT NOT NULL,
            name                TEXT NOT NULL,
            role                TEXT NOT NULL CHECK (role IN ('donor', 'ngo')),
            phone               TEXT,
            address             TEXT,
            city                TEXT,
            state               TEXT,
            lat                 REAL,
            lng                 REAL,
            bio                 TEXT,
            profile_image_url   TEXT,
            profile_completed   INTEGER,
            created_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ngos (
            id                      TEXT PRIMARY KEY REFERENCES users(id),
            registration_number     TEXT,
            website                 TEXT,
            representative_name     TEXT,
            verified                INTEGER NOT NULL DEFAULT 0,
            rating                  REAL,
            views                   INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS posts (
            id              TEXT PRIMARY KEY,
            author_id       TEXT NOT NULL REFERENCES users(id),
            role            TEXT NOT NULL,
            title           TEXT NOT NULL,
            body            TEXT,
            food_type       TEXT,
            quantity        TEXT,
            pickup_time     TEXT,
            pickup_address  TEXT,
            lat             REAL,
            lng             REAL,
            images          TEXT NOT NULL DEFAULT '[]',
            status          TEXT NOT NULL DEFAULT 'active',
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_status_created
            ON posts(status, created_at);

        CREATE TABLE IF NOT EXISTS chats (
            id              TEXT PRIMARY KEY,
            donor_id        TEXT NOT NULL REFERENCES users(id),
            ngo_id          TEXT NOT NULL REFERENCES users(id),
            post_id         TEXT REFERENCES posts(id) ON DELETE SET NULL,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chats_donor ON chats(donor_id, updated_at);
        CREATE INDEX IF NOT EXISTS idx_chats_ngo ON chats(ngo_id, updated_at);

        CREATE TABLE IF NOT EXISTS chat_messages (
            id              TEXT PRIMARY KEY,
            chat_id         TEXT NOT NULL REFERENCES chats(id),
            sender_id       TEXT NOT NULL REFERENCES users(id),
            text            TEXT NOT NULL,
            attachments     TEXT NOT NULL DEFAULT '[]',
            read_by         TEXT NOT NULL DEFAULT '[]',
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_chat
            ON chat_messages(chat_id, created_at);

        CREATE TABLE IF NOT EXISTS donations_history (
            id              TEXT PRIMARY KEY,
            donor_id        TEXT NOT NULL REFERENCES users(id),
            ngo_id          TEXT NOT NULL REFERENCES users(id),
            post_id         TEXT REFERENCES posts(id) ON DELETE SET NULL,
            status          TEXT NOT NULL,
            notes           TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS views_log (
            id              TEXT PRIMARY KEY,
            viewer_id       TEXT REFERENCES users(id),
            target_user_id  TEXT NOT NULL REFERENCES users(id),
            type            TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_views_viewer
            ON views_log(viewer_id, type, created_at);

        CREATE TABLE IF NOT EXISTS objects (
            bucket          TEXT NOT NULL,
            path            TEXT NOT NULL,
            owner_id        TEXT NOT NULL,
            size            INTEGER NOT NULL,
            content_type    TEXT NOT NULL,
            sha256          TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            PRIMARY KEY (bucket, path)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}

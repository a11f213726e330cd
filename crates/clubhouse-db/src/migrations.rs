use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, posts, ownership)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id               TEXT PRIMARY KEY,
                first_name       TEXT NOT NULL,
                last_name        TEXT NOT NULL,
                email            TEXT NOT NULL UNIQUE,
                username         TEXT NOT NULL UNIQUE,
                password_hash    TEXT NOT NULL,
                avatar_ref       TEXT NOT NULL,
                membership_tier  TEXT NOT NULL DEFAULT 'basic'
                    CHECK (membership_tier IN ('basic', 'member', 'admin')),
                created_at       TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE posts (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_posts_created ON posts(created_at);

            -- One owner per post: post_id is unique on its own.
            CREATE TABLE users_posts (
                user_id  TEXT NOT NULL REFERENCES users(id),
                post_id  TEXT NOT NULL UNIQUE REFERENCES posts(id),
                PRIMARY KEY (user_id, post_id)
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

//! Database row types. These map directly to SQLite rows and stay
//! distinct from the clubhouse-types API models.

use chrono::{DateTime, Utc};
use clubhouse_types::models::{PostView, Principal, Tier};
use uuid::Uuid;

use crate::{DbError, Result};

pub struct UserRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub avatar_ref: String,
    pub membership_tier: String,
    pub created_at: String,
}

impl UserRow {
    pub fn user_id(&self) -> Result<Uuid> {
        parse_uuid(&self.id, "user id")
    }

    pub fn tier(&self) -> Result<Tier> {
        self.membership_tier
            .parse()
            .map_err(|e| DbError::Corrupt(format!("{} on user '{}'", e, self.id)))
    }

    pub fn to_principal(&self) -> Result<Principal> {
        Ok(Principal {
            id: self.user_id()?,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            avatar_ref: self.avatar_ref.clone(),
            tier: self.tier()?,
        })
    }
}

/// A post joined with its owner through `users_posts`.
pub struct OwnedPostRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub owner_id: String,
    pub owner_username: String,
    pub owner_avatar: String,
    pub owner_tier: String,
}

impl OwnedPostRow {
    pub fn into_view(self, owned_by_viewer: bool) -> Result<PostView> {
        let owner_tier = self
            .owner_tier
            .parse()
            .map_err(|e| DbError::Corrupt(format!("{} on user '{}'", e, self.owner_id)))?;

        Ok(PostView {
            id: parse_uuid(&self.id, "post id")?,
            created_at: parse_timestamp(&self.created_at)?,
            owner_id: parse_uuid(&self.owner_id, "owner id")?,
            title: self.title,
            content: self.content,
            owner: self.owner_username,
            owner_avatar: self.owner_avatar,
            owner_tier,
            owned_by_viewer,
        })
    }
}

/// Fields for a fresh `users` row. Tier always starts at `basic`.
pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub avatar_ref: &'a str,
}

/// Profile overwrite. `None` keeps the stored value.
pub struct ProfileUpdate<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: Option<&'a str>,
    pub avatar_ref: Option<&'a str>,
}

pub(crate) fn parse_uuid(raw: &str, what: &str) -> Result<Uuid> {
    raw.parse()
        .map_err(|e| DbError::Corrupt(format!("{} '{}': {}", what, raw, e)))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    // Fixed width so lexical order in SQL matches chronological order.
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

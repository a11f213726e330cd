use clubhouse_types::models::Tier;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use crate::models::{NewUser, ProfileUpdate, UserRow};
use crate::{Database, DbError, Result};

const USER_COLUMNS: &str = "id, first_name, last_name, email, username, password_hash, \
                            avatar_ref, membership_tier, created_at";

impl Database {
    // -- Users --

    /// Insert a new `basic` user. Email and username uniqueness are checked
    /// inside the same transaction as the insert.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<Uuid> {
        let id = Uuid::new_v4();

        self.with_tx(|tx| {
            if email_taken(tx, user.email, None)? {
                return Err(DbError::DuplicateEmail);
            }
            if username_taken(tx, user.username, None)? {
                return Err(DbError::DuplicateUsername);
            }

            tx.execute(
                "INSERT INTO users (id, first_name, last_name, email, username, password_hash, avatar_ref, membership_tier)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'basic')",
                rusqlite::params![
                    id.to_string(),
                    user.first_name,
                    user.last_name,
                    user.email,
                    user.username,
                    user.password_hash,
                    user.avatar_ref,
                ],
            )?;
            Ok(())
        })?;

        Ok(id)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn update_password_by_email(&self, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE email = ?2",
                (password_hash, email),
            )?;
            if changed == 0 {
                return Err(DbError::NotFound("user"));
            }
            Ok(())
        })
    }

    /// Move a user to `target` unless they already hold that tier or a
    /// higher one. Returns the tier the user ends up with.
    pub fn raise_membership_tier(&self, id: Uuid, target: Tier) -> Result<Tier> {
        let id = id.to_string();

        self.with_tx(|tx| {
            let current: String = tx
                .query_row(
                    "SELECT membership_tier FROM users WHERE id = ?1",
                    [&id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(DbError::NotFound("user"))?;

            let current: Tier = current
                .parse()
                .map_err(|e| DbError::Corrupt(format!("{} on user '{}'", e, id)))?;

            if current >= target {
                return Ok(current);
            }

            tx.execute(
                "UPDATE users SET membership_tier = ?1 WHERE id = ?2",
                (target.as_str(), &id),
            )?;
            Ok(target)
        })
    }

    /// Overwrite profile fields. Tier is never touched here.
    pub fn update_profile(&self, id: Uuid, update: &ProfileUpdate<'_>) -> Result<()> {
        let id = id.to_string();

        self.with_tx(|tx| {
            if email_taken(tx, update.email, Some(&id))? {
                return Err(DbError::DuplicateEmail);
            }
            if username_taken(tx, update.username, Some(&id))? {
                return Err(DbError::DuplicateUsername);
            }

            let changed = tx.execute(
                "UPDATE users
                 SET first_name = ?1, last_name = ?2, email = ?3, username = ?4,
                     password_hash = COALESCE(?5, password_hash),
                     avatar_ref = COALESCE(?6, avatar_ref)
                 WHERE id = ?7",
                rusqlite::params![
                    update.first_name,
                    update.last_name,
                    update.email,
                    update.username,
                    update.password_hash,
                    update.avatar_ref,
                    &id,
                ],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound("user"));
            }
            Ok(())
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is always one of our own literals, never user input.
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;

    stmt.query_row([value], map_user_row).optional()
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        username: row.get(4)?,
        password_hash: row.get(5)?,
        avatar_ref: row.get(6)?,
        membership_tier: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn email_taken(conn: &Connection, email: &str, except_id: Option<&str>) -> Result<bool> {
    value_taken(conn, "SELECT id FROM users WHERE email = ?1", email, except_id)
}

fn username_taken(conn: &Connection, username: &str, except_id: Option<&str>) -> Result<bool> {
    value_taken(conn, "SELECT id FROM users WHERE username = ?1", username, except_id)
}

fn value_taken(conn: &Connection, sql: &str, value: &str, except_id: Option<&str>) -> Result<bool> {
    let holder: Option<String> = conn.query_row(sql, [value], |row| row.get(0)).optional()?;
    Ok(match (holder, except_id) {
        (Some(holder), Some(me)) => holder != me,
        (Some(_), None) => true,
        (None, _) => false,
    })
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
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

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clubhouse_types::models::PostView;
use rusqlite::{Connection, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{OwnedPostRow, format_timestamp, parse_uuid};
use crate::queries::OptionalExt;
use crate::{Database, DbError, Result};

/// Posts joined to their owner. Ownership is resolved per row by key,
/// so the result never depends on the order either table is read in.
const OWNED_POST_SELECT: &str = "
    SELECT p.id, p.title, p.content, p.created_at,
           u.id, u.username, u.avatar_ref, u.membership_tier
    FROM posts p
    JOIN users_posts up ON up.post_id = p.id
    JOIN users u ON u.id = up.user_id";

/// Posts and the user/post ownership relation.
///
/// Every operation that touches more than one row runs as a single
/// transaction on the writer connection.
#[derive(Clone)]
pub struct ContentRepository {
    db: Arc<Database>,
}

impl ContentRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a post and its ownership row together.
    pub fn create_post(
        &self,
        author_id: Uuid,
        title: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        let post_id = Uuid::new_v4();
        let pid = post_id.to_string();
        let aid = author_id.to_string();

        self.db.with_tx(|tx| {
            let author_exists: Option<i64> = tx
                .query_row("SELECT 1 FROM users WHERE id = ?1", [&aid], |row| row.get(0))
                .optional()?;
            if author_exists.is_none() {
                return Err(DbError::NotFound("user"));
            }

            tx.execute(
                "INSERT INTO posts (id, title, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                (&pid, title, content, format_timestamp(&created_at)),
            )?;
            tx.execute(
                "INSERT INTO users_posts (user_id, post_id) VALUES (?1, ?2)",
                (&aid, &pid),
            )?;
            Ok(())
        })?;

        info!("Post {} created by {}", post_id, author_id);
        Ok(post_id)
    }

    /// One post annotated for `viewer_id`.
    pub fn get_post(&self, post_id: Uuid, viewer_id: Uuid) -> Result<PostView> {
        let row = self.db.with_conn(|conn| {
            let sql = format!("{} WHERE p.id = ?1", OWNED_POST_SELECT);
            conn.query_row(&sql, [post_id.to_string()], map_owned_post_row)
                .optional()
        })?;

        let row = row.ok_or(DbError::NotFound("post"))?;
        let mine = row.owner_id == viewer_id.to_string();
        row.into_view(mine)
    }

    /// Overwrite title and content. Callers must have checked ownership.
    pub fn edit_post(&self, post_id: Uuid, title: &str, content: &str) -> Result<()> {
        self.db.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET title = ?1, content = ?2 WHERE id = ?3",
                (title, content, post_id.to_string()),
            )?;
            if changed == 0 {
                return Err(DbError::NotFound("post"));
            }
            Ok(())
        })
    }

    /// Remove a post and its ownership row. Deleting a missing post is a no-op.
    pub fn delete_post(&self, post_id: Uuid) -> Result<()> {
        let pid = post_id.to_string();

        let removed = self.db.with_tx(|tx| {
            tx.execute("DELETE FROM users_posts WHERE post_id = ?1", [&pid])?;
            Ok(tx.execute("DELETE FROM posts WHERE id = ?1", [&pid])?)
        })?;

        if removed > 0 {
            info!("Post {} deleted", post_id);
        } else {
            debug!("Post {} already gone", post_id);
        }
        Ok(())
    }

    /// The owning user of a post, or `None` if the post does not exist.
    pub fn post_owner(&self, post_id: Uuid) -> Result<Option<Uuid>> {
        let owner: Option<String> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id FROM users_posts WHERE post_id = ?1",
                [post_id.to_string()],
                |row| row.get(0),
            )
            .optional()
        })?;

        owner.map(|raw| parse_uuid(&raw, "owner id")).transpose()
    }

    /// Every post, newest first, annotated for `viewer_id`.
    pub fn list_all_posts(&self, viewer_id: Uuid) -> Result<Vec<PostView>> {
        self.db.with_conn(|conn| {
            // One read transaction so the owned set and the post list
            // come from the same snapshot.
            let tx = conn.unchecked_transaction()?;

            let owned = owned_post_ids(&tx, &viewer_id.to_string())?;

            let sql = format!("{} ORDER BY p.created_at DESC, p.id", OWNED_POST_SELECT);
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_owned_post_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            drop(stmt);
            tx.commit()?;

            rows.into_iter()
                .map(|row| {
                    let mine = owned.contains(&row.id);
                    row.into_view(mine)
                })
                .collect()
        })
    }

    /// Only the posts owned by `user_id`, each marked as owned.
    pub fn list_posts_for_owner(&self, user_id: Uuid) -> Result<Vec<PostView>> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "{} WHERE up.user_id = ?1 ORDER BY p.created_at DESC, p.id",
                OWNED_POST_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], map_owned_post_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(|row| row.into_view(true)).collect()
        })
    }

    /// Remove a user with every post they own.
    ///
    /// Ownership rows go first, then the posts they pointed at, then the
    /// user, so foreign keys hold at every step. Returns the number of
    /// posts removed.
    pub fn delete_user(&self, user_id: Uuid) -> Result<usize> {
        let uid = user_id.to_string();

        let (posts_removed, user_removed) = self.db.with_tx(|tx| {
            let post_ids = owned_post_ids(tx, &uid)?;

            tx.execute("DELETE FROM users_posts WHERE user_id = ?1", [&uid])?;

            let mut posts_removed = 0;
            for pid in &post_ids {
                posts_removed += tx.execute("DELETE FROM posts WHERE id = ?1", [pid])?;
            }

            let user_removed = tx.execute("DELETE FROM users WHERE id = ?1", [&uid])?;
            Ok((posts_removed, user_removed))
        })?;

        if user_removed > 0 {
            info!("User {} deleted with {} posts", user_id, posts_removed);
        } else {
            debug!("User {} already gone", user_id);
        }
        Ok(posts_removed)
    }
}

fn owned_post_ids(conn: &Connection, user_id: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT post_id FROM users_posts WHERE user_id = ?1")?;
    let ids = stmt
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(ids)
}

fn map_owned_post_row(row: &Row<'_>) -> rusqlite::Result<OwnedPostRow> {
    Ok(OwnedPostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        owner_id: row.get(4)?,
        owner_username: row.get(5)?,
        owner_avatar: row.get(6)?,
        owner_tier: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use chrono::Duration;
    use clubhouse_types::models::Tier;

    fn setup() -> (Arc<Database>, ContentRepository) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let repo = ContentRepository::new(db.clone());
        (db, repo)
    }

    fn add_user(db: &Database, username: &str) -> Uuid {
        let email = format!("{}@example.com", username);
        db.create_user(&NewUser {
            first_name: "Test",
            last_name: "User",
            email: &email,
            username,
            password_hash: "$argon2id$fake",
            avatar_ref: "/images/default-avatar.png",
        })
        .unwrap()
    }

    fn count(db: &Database, table: &str) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        db.with_conn(|conn| Ok(conn.query_row(&sql, [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn created_post_is_listed_for_owner() {
        let (db, repo) = setup();
        let ada = add_user(&db, "ada");

        let before = count(&db, "posts");
        let post = repo.create_post(ada, "Hello", "First post", Utc::now()).unwrap();

        let mine = repo.list_posts_for_owner(ada).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, post);
        assert!(mine[0].owned_by_viewer);
        assert_eq!(count(&db, "posts"), before + 1);
        assert_eq!(count(&db, "users_posts"), 1);
    }

    #[test]
    fn create_post_for_unknown_author_writes_nothing() {
        let (db, repo) = setup();

        let err = repo
            .create_post(Uuid::new_v4(), "Orphan", "No owner", Utc::now())
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound("user")));
        assert_eq!(count(&db, "posts"), 0);
        assert_eq!(count(&db, "users_posts"), 0);
    }

    #[test]
    fn failed_ownership_insert_rolls_back_post() {
        let (db, repo) = setup();
        let ada = add_user(&db, "ada");

        // Make the second statement of create_post fail after the post row
        // has already been written.
        db.with_conn_mut(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_ownership BEFORE INSERT ON users_posts
                 BEGIN SELECT RAISE(ABORT, 'ownership rejected'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        let result = repo.create_post(ada, "Doomed", "Never stored", Utc::now());

        assert!(matches!(result, Err(DbError::Sqlite(_))));
        assert_eq!(count(&db, "posts"), 0);
        assert_eq!(count(&db, "users_posts"), 0);
    }

    #[test]
    fn list_all_marks_ownership_and_owner_tier() {
        let (db, repo) = setup();
        let ada = add_user(&db, "ada");
        let grace = add_user(&db, "grace");
        db.raise_membership_tier(grace, Tier::Admin).unwrap();

        let now = Utc::now();
        let ada_post = repo.create_post(ada, "Ada", "from ada", now).unwrap();
        let grace_post = repo
            .create_post(grace, "Grace", "from grace", now + Duration::seconds(1))
            .unwrap();

        let posts = repo.list_all_posts(ada).unwrap();
        assert_eq!(posts.len(), 2);

        // Newest first.
        assert_eq!(posts[0].id, grace_post);
        assert_eq!(posts[0].owner, "grace");
        assert_eq!(posts[0].owner_tier, Tier::Admin);
        assert!(!posts[0].owned_by_viewer);

        assert_eq!(posts[1].id, ada_post);
        assert_eq!(posts[1].owner, "ada");
        assert_eq!(posts[1].owner_tier, Tier::Basic);
        assert!(posts[1].owned_by_viewer);
    }

    #[test]
    fn owner_is_resolved_by_key_not_position() {
        let (db, repo) = setup();
        let ada = add_user(&db, "ada");
        let grace = add_user(&db, "grace");

        // Insert order of posts differs from their display order and from
        // the ownership table order.
        let base = Utc::now();
        let late = repo.create_post(ada, "Late", "late", base + Duration::seconds(10)).unwrap();
        let early = repo.create_post(grace, "Early", "early", base).unwrap();

        let posts = repo.list_all_posts(grace).unwrap();
        let by_id = |id: Uuid| posts.iter().find(|p| p.id == id).unwrap();
        assert_eq!(by_id(late).owner, "ada");
        assert_eq!(by_id(early).owner, "grace");
        assert!(by_id(early).owned_by_viewer);
        assert!(!by_id(late).owned_by_viewer);
    }

    #[test]
    fn edit_missing_post_is_not_found() {
        let (_db, repo) = setup();
        let err = repo.edit_post(Uuid::new_v4(), "t", "c").unwrap_err();
        assert!(matches!(err, DbError::NotFound("post")));
    }

    #[test]
    fn edit_overwrites_title_and_content() {
        let (db, repo) = setup();
        let ada = add_user(&db, "ada");
        let post = repo.create_post(ada, "Draft", "draft", Utc::now()).unwrap();

        repo.edit_post(post, "Final", "final text").unwrap();

        let view = repo.get_post(post, ada).unwrap();
        assert_eq!(view.title, "Final");
        assert_eq!(view.content, "final text");
        assert!(view.owned_by_viewer);
    }

    #[test]
    fn delete_post_is_idempotent() {
        let (db, repo) = setup();
        let ada = add_user(&db, "ada");
        let post = repo.create_post(ada, "Bye", "soon gone", Utc::now()).unwrap();

        repo.delete_post(post).unwrap();
        repo.delete_post(post).unwrap();

        assert_eq!(count(&db, "posts"), 0);
        assert_eq!(count(&db, "users_posts"), 0);
        assert!(matches!(repo.get_post(post, ada), Err(DbError::NotFound("post"))));
        assert_eq!(repo.post_owner(post).unwrap(), None);
    }

    #[test]
    fn post_owner_follows_the_relation() {
        let (db, repo) = setup();
        let ada = add_user(&db, "ada");
        let grace = add_user(&db, "grace");
        let post = repo.create_post(ada, "Mine", "mine", Utc::now()).unwrap();

        assert_eq!(repo.post_owner(post).unwrap(), Some(ada));
        assert_eq!(repo.post_owner(Uuid::new_v4()).unwrap(), None);

        let seen_by_grace = repo.get_post(post, grace).unwrap();
        assert_eq!(seen_by_grace.owner, "ada");
        assert!(!seen_by_grace.owned_by_viewer);
    }

    #[test]
    fn delete_user_cascades_to_owned_posts_only() {
        let (db, repo) = setup();
        let ada = add_user(&db, "ada");
        let grace = add_user(&db, "grace");
        repo.create_post(ada, "One", "one", Utc::now()).unwrap();
        repo.create_post(ada, "Two", "two", Utc::now()).unwrap();
        let kept = repo.create_post(grace, "Kept", "kept", Utc::now()).unwrap();

        assert_eq!(repo.delete_user(ada).unwrap(), 2);

        let remaining = repo.list_all_posts(grace).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, kept);
        assert!(db.get_user_by_id(ada).unwrap().is_none());

        let ada_refs: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM users_posts WHERE user_id = ?1",
                    [ada.to_string()],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(ada_refs, 0);
    }

    #[test]
    fn concurrent_creates_never_leave_partial_writes() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("clubhouse.db")).unwrap());
        let repo = ContentRepository::new(db.clone());
        let ada = add_user(&db, "ada");
        let grace = add_user(&db, "grace");

        std::thread::scope(|s| {
            for author in [ada, grace] {
                let repo = repo.clone();
                s.spawn(move || repo.create_post(author, "Race", "race", Utc::now()).unwrap());
            }
        });

        assert_eq!(count(&db, "posts"), 2);
        assert_eq!(count(&db, "users_posts"), 2);

        let orphans: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM posts p
                     LEFT JOIN users_posts up ON up.post_id = p.id
                     WHERE up.post_id IS NULL",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(orphans, 0);

        assert_eq!(repo.list_posts_for_owner(ada).unwrap().len(), 1);
        assert_eq!(repo.list_posts_for_owner(grace).unwrap().len(), 1);
    }
}

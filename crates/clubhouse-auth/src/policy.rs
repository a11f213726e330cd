use std::sync::Arc;

use clubhouse_db::Database;
use clubhouse_types::models::Tier;
use tracing::info;
use uuid::Uuid;

use crate::PolicyError;

/// Maps secret codes to membership tiers. This is the only path that
/// changes a user's tier.
pub struct AuthorizationPolicy {
    db: Arc<Database>,
    member_code: String,
    admin_code: String,
}

impl AuthorizationPolicy {
    pub fn new(db: Arc<Database>, member_code: impl Into<String>, admin_code: impl Into<String>) -> Self {
        Self {
            db,
            member_code: member_code.into(),
            admin_code: admin_code.into(),
        }
    }

    pub fn tier_for_code(&self, code: &str) -> Option<Tier> {
        if code == self.admin_code {
            Some(Tier::Admin)
        } else if code == self.member_code {
            Some(Tier::Member)
        } else {
            None
        }
    }

    /// Apply the tier unlocked by `code`. A user already at or above that
    /// tier keeps their tier; the returned value is the tier they hold now.
    pub fn upgrade(&self, code: &str, user_id: Uuid) -> Result<Tier, PolicyError> {
        let target = self.tier_for_code(code).ok_or(PolicyError::NotRecognized)?;
        let tier = self.db.raise_membership_tier(user_id, target)?;

        info!("User {} membership is now {}", user_id, tier);
        Ok(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clubhouse_db::models::NewUser;

    fn setup() -> (Arc<Database>, AuthorizationPolicy, Uuid) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let id = db
            .create_user(&NewUser {
                first_name: "Ada",
                last_name: "Lovelace",
                email: "ada@example.com",
                username: "ada",
                password_hash: "$argon2id$fake",
                avatar_ref: "/images/a.png",
            })
            .unwrap();
        let policy = AuthorizationPolicy::new(db.clone(), "secret", "admin");
        (db, policy, id)
    }

    fn stored_tier(db: &Database, id: Uuid) -> Tier {
        db.get_user_by_id(id).unwrap().unwrap().tier().unwrap()
    }

    #[test]
    fn member_code_upgrades_basic_user() {
        let (db, policy, id) = setup();
        assert_eq!(policy.upgrade("secret", id).unwrap(), Tier::Member);
        assert_eq!(stored_tier(&db, id), Tier::Member);
    }

    #[test]
    fn admin_code_upgrades_to_admin() {
        let (db, policy, id) = setup();
        assert_eq!(policy.upgrade("admin", id).unwrap(), Tier::Admin);
        assert_eq!(stored_tier(&db, id), Tier::Admin);
    }

    #[test]
    fn unknown_code_leaves_tier_unchanged() {
        let (db, policy, id) = setup();
        assert!(matches!(policy.upgrade("xyz", id), Err(PolicyError::NotRecognized)));
        assert_eq!(stored_tier(&db, id), Tier::Basic);
    }

    #[test]
    fn codes_are_matched_exactly() {
        let (_db, policy, _id) = setup();
        assert_eq!(policy.tier_for_code("Secret"), None);
        assert_eq!(policy.tier_for_code(" secret"), None);
    }

    #[test]
    fn member_code_never_downgrades_admin() {
        let (db, policy, id) = setup();
        policy.upgrade("admin", id).unwrap();

        assert_eq!(policy.upgrade("secret", id).unwrap(), Tier::Admin);
        assert_eq!(stored_tier(&db, id), Tier::Admin);
    }

    #[test]
    fn unknown_user_is_a_store_error() {
        let (_db, policy, _id) = setup();
        let err = policy.upgrade("secret", Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, PolicyError::Store(_)));
    }
}

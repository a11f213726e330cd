use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use clubhouse_db::Database;
use clubhouse_types::models::Principal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::SessionError;

/// Longest lifetime a session may be given.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

#[derive(Debug, Clone, Copy)]
struct SessionEntry {
    user_id: Uuid,
    expires_at: Instant,
}

/// Opaque token -> user id map.
///
/// The map only remembers *who*; every `resolve` reloads the user row so
/// the returned principal reflects the current tier and profile. The map
/// lock is never held while the database is queried.
pub struct SessionManager {
    db: Arc<Database>,
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionManager {
    /// `ttl` is capped at [`MAX_SESSION_TTL`].
    pub fn new(db: Arc<Database>, ttl: Duration) -> Self {
        Self {
            db,
            ttl: ttl.min(MAX_SESSION_TTL),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn create(&self, principal: &Principal) -> String {
        let token = generate_token();
        let now = Instant::now();
        let entry = SessionEntry {
            user_id: principal.id,
            expires_at: now.checked_add(self.ttl).unwrap_or(now),
        };

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), entry);

        info!("Session created for user {}", principal.id);
        token
    }

    pub fn resolve(&self, token: &str) -> Result<Principal, SessionError> {
        let entry = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .copied()
            .ok_or(SessionError::ExpiredOrUnknown)?;

        if entry.expires_at <= Instant::now() {
            self.destroy(token);
            debug!("Session for user {} expired", entry.user_id);
            return Err(SessionError::ExpiredOrUnknown);
        }

        let Some(user) = self.db.get_user_by_id(entry.user_id)? else {
            // The account is gone; the token can never resolve again.
            self.destroy(token);
            debug!("Session for deleted user {} dropped", entry.user_id);
            return Err(SessionError::ExpiredOrUnknown);
        };

        Ok(user.to_principal()?)
    }

    /// Remove the mapping. Unknown tokens are ignored.
    pub fn destroy(&self, token: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }

    /// Drop every session belonging to `user_id`.
    pub fn revoke_user(&self, user_id: Uuid) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, entry| entry.user_id != user_id);
        let count = before - sessions.len();

        info!("Revoked {} sessions for user {}", count, user_id);
        count
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        before - sessions.len()
    }

    pub fn active_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// 256 random bits, base64url without padding.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fast_hasher;
    use crate::{AuthenticationService, NewAccount};
    use clubhouse_db::ContentRepository;
    use clubhouse_types::models::Tier;

    fn setup(ttl: Duration) -> (Arc<Database>, SessionManager, Principal) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let auth = AuthenticationService::new(db.clone(), fast_hasher(), "/images/a.png");
        auth.register(&NewAccount {
            first_name: "Ada",
            last_name: "Lovelace",
            email: "ada@example.com",
            username: "ada",
            password: "Engine1843",
        })
        .unwrap();
        let principal = auth.authenticate("ada", "Engine1843").unwrap();
        let sessions = SessionManager::new(db.clone(), ttl);
        (db, sessions, principal)
    }

    #[test]
    fn create_then_resolve() {
        let (_db, sessions, principal) = setup(Duration::from_secs(60));
        let token = sessions.create(&principal);

        assert_eq!(sessions.resolve(&token).unwrap().id, principal.id);
    }

    #[test]
    fn tokens_are_unique_and_opaque() {
        let (_db, sessions, principal) = setup(Duration::from_secs(60));
        let a = sessions.create(&principal);
        let b = sessions.create(&principal);

        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(!a.contains(&principal.id.to_string()));
    }

    #[test]
    fn unknown_token_fails() {
        let (_db, sessions, _principal) = setup(Duration::from_secs(60));
        assert!(matches!(sessions.resolve("nope"), Err(SessionError::ExpiredOrUnknown)));
    }

    #[test]
    fn destroy_is_idempotent() {
        let (_db, sessions, principal) = setup(Duration::from_secs(60));
        let token = sessions.create(&principal);

        sessions.destroy(&token);
        sessions.destroy(&token);

        assert!(matches!(sessions.resolve(&token), Err(SessionError::ExpiredOrUnknown)));
        assert_eq!(sessions.active_count(), 0);
    }

    #[test]
    fn expired_session_is_rejected_and_removed() {
        let (_db, sessions, principal) = setup(Duration::ZERO);
        let token = sessions.create(&principal);

        assert!(matches!(sessions.resolve(&token), Err(SessionError::ExpiredOrUnknown)));
        assert_eq!(sessions.active_count(), 0);
    }

    #[test]
    fn purge_drops_expired_sessions() {
        let (db, _, principal) = setup(Duration::from_secs(60));
        let short = SessionManager::new(db, Duration::ZERO);
        short.create(&principal);
        short.create(&principal);

        assert_eq!(short.purge_expired(), 2);
        assert_eq!(short.active_count(), 0);
    }

    #[test]
    fn resolve_reflects_current_tier() {
        let (db, sessions, principal) = setup(Duration::from_secs(60));
        let token = sessions.create(&principal);

        db.raise_membership_tier(principal.id, Tier::Member).unwrap();

        assert_eq!(sessions.resolve(&token).unwrap().tier, Tier::Member);
    }

    #[test]
    fn deleted_user_cannot_resolve() {
        let (db, sessions, principal) = setup(Duration::from_secs(60));
        let token = sessions.create(&principal);

        ContentRepository::new(db).delete_user(principal.id).unwrap();

        assert!(matches!(sessions.resolve(&token), Err(SessionError::ExpiredOrUnknown)));
        assert_eq!(sessions.active_count(), 0);
    }

    #[test]
    fn oversized_ttl_is_capped() {
        let (db, _, principal) = setup(Duration::from_secs(60));
        let sessions = SessionManager::new(db, Duration::MAX);
        let token = sessions.create(&principal);

        assert_eq!(sessions.resolve(&token).unwrap().id, principal.id);
        assert_eq!(sessions.purge_expired(), 0);
    }

    #[test]
    fn revoke_user_drops_all_their_sessions() {
        let (_db, sessions, principal) = setup(Duration::from_secs(60));
        sessions.create(&principal);
        sessions.create(&principal);

        assert_eq!(sessions.revoke_user(principal.id), 2);
        assert_eq!(sessions.revoke_user(principal.id), 0);
    }
}

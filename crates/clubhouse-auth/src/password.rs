use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng,
};
use argon2::Argon2;
use tracing::warn;

use crate::AccountError;

/// Salted Argon2id hashing. The PHC output string carries algorithm,
/// cost parameters and salt, so verification needs nothing else.
#[derive(Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new(argon2: Argon2<'static>) -> Self {
        Self { argon2 }
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, AccountError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| AccountError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// `false` on mismatch and on a stored hash that can't be parsed.
    pub fn verify(&self, plaintext: &str, stored: &str) -> bool {
        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored password hash is malformed: {}", e);
                return false;
            }
        };

        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::fast_hasher;

    #[test]
    fn hash_then_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash("Hunter22").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("Hunter22"));
        assert!(hasher.verify("Hunter22", &hash));
        assert!(!hasher.verify("hunter22", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = fast_hasher();
        assert_ne!(hasher.hash("Hunter22").unwrap(), hasher.hash("Hunter22").unwrap());
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        let hasher = fast_hasher();
        assert!(!hasher.verify("Hunter22", "not-a-phc-string"));
        assert!(!hasher.verify("Hunter22", ""));
    }
}

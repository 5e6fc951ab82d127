// Password hashing and verification using bcrypt (cost factor 12).
// Verification is constant-time inside bcrypt and total: malformed
// hashes verify as false instead of erroring.

use bcrypt::{hash, verify, DEFAULT_COST};
use thiserror::Error;

/// Errors that can occur while hashing a password
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingError(String),
}

/// Hash a password with bcrypt at the default cost (12)
///
/// The resulting string embeds the algorithm, cost, and per-record salt:
/// `$2b$12$...`
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash(password, DEFAULT_COST).map_err(|e| PasswordError::HashingError(e.to_string()))
}

/// Verify a password against a stored bcrypt hash.
///
/// Returns `false` for wrong passwords AND for malformed hashes; callers
/// never have to distinguish the two, which keeps authentication guards
/// total.
pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let password = "MySecureP@ssw0rd123!";

        let hashed = hash_password(password).expect("Failed to hash password");

        assert!(hashed.starts_with("$2"));
        assert!(verify_password(password, &hashed));
        assert!(!verify_password("WrongPassword", &hashed));
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let password = "TestPassword123!";

        let hash1 = hash_password(password).expect("Failed to hash password");
        let hash2 = hash_password(password).expect("Failed to hash password");

        // Random per-record salt means no two hashes collide
        assert_ne!(hash1, hash2);
        assert!(verify_password(password, &hash1));
        assert!(verify_password(password, &hash2));
    }

    #[test]
    fn test_malformed_hash_verifies_false() {
        assert!(!verify_password("password", "not_a_valid_hash"));
        assert!(!verify_password("password", ""));
        assert!(!verify_password("password", "$2b$12$tooshort"));
    }

    #[test]
    fn test_cost_factor_is_twelve() {
        let hashed = hash_password("CostCheck1!").expect("Failed to hash");
        assert!(hashed.contains("$12$"), "expected cost 12 in {}", hashed);
    }
}

// Opaque refresh-token service.
//
// generate_token returns the pair (plain, hash): 32 random bytes as
// URL-safe unpadded base64 for the client, and the bcrypt-cost-12 hash
// for storage. Only the hash is ever persisted; lookup verifies the
// presented plain token against stored hashes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use thiserror::Error;

/// Random bytes behind each opaque token
const TOKEN_BYTES: usize = 32;

#[derive(Error, Debug)]
pub enum RefreshTokenServiceError {
    #[error("Failed to hash token: {0}")]
    HashingError(String),
}

#[derive(Clone)]
pub struct RefreshTokenService {
    expiry_days: i64,
}

impl RefreshTokenService {
    pub fn new(expiry_days: i64) -> Self {
        Self { expiry_days }
    }

    pub fn from_env() -> Self {
        Self::new(crate::app_config::config().refresh_token_expiry_days)
    }

    /// Generate a fresh opaque token pair: (plain, hash)
    pub fn generate_token(&self) -> Result<(String, String), RefreshTokenServiceError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);

        let plain = URL_SAFE_NO_PAD.encode(bytes);
        let token_hash = hash(&plain, DEFAULT_COST)
            .map_err(|e| RefreshTokenServiceError::HashingError(e.to_string()))?;

        Ok((plain, token_hash))
    }

    /// Constant-time verification of a presented token against a stored
    /// hash. Malformed hashes verify as false.
    pub fn verify_token(&self, plain: &str, token_hash: &str) -> bool {
        verify(plain, token_hash).unwrap_or(false)
    }

    /// Expiration for a newly issued token (default 30 days out)
    pub fn calculate_expiration(&self) -> DateTime<Utc> {
        Utc::now() + Duration::days(self.expiry_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> RefreshTokenService {
        RefreshTokenService::new(30)
    }

    #[test]
    fn test_round_trip() {
        let svc = service();
        let (plain, token_hash) = svc.generate_token().unwrap();

        assert!(svc.verify_token(&plain, &token_hash));
    }

    #[test]
    fn test_other_token_does_not_verify() {
        let svc = service();
        let (_, token_hash) = svc.generate_token().unwrap();
        let (other_plain, _) = svc.generate_token().unwrap();

        assert!(!svc.verify_token(&other_plain, &token_hash));
    }

    #[test]
    fn test_malformed_hash_verifies_false() {
        let svc = service();
        let (plain, _) = svc.generate_token().unwrap();

        assert!(!svc.verify_token(&plain, "garbage-hash"));
        assert!(!svc.verify_token(&plain, ""));
    }

    #[test]
    fn test_token_format() {
        let svc = service();
        let (plain, token_hash) = svc.generate_token().unwrap();

        // 32 bytes -> 43 chars of unpadded url-safe base64
        assert_eq!(plain.len(), 43);
        assert!(plain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(token_hash.starts_with("$2"));
    }

    #[test]
    fn test_tokens_are_unique() {
        let svc = service();
        let (a, _) = svc.generate_token().unwrap();
        let (b, _) = svc.generate_token().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_expiration_is_thirty_days_out() {
        let svc = service();
        let expires = svc.calculate_expiration();
        let delta = expires - Utc::now();

        assert!(delta > Duration::days(29));
        assert!(delta <= Duration::days(30));
    }
}

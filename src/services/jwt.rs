// JWT access-token service: HS256, 15-minute default expiry, claims
// carrying the session binding and the user's token version.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::AccessTokenClaims;
use crate::models::User;

/// Clock skew tolerated during validation (seconds)
const VALIDATION_LEEWAY_SECONDS: u64 = 60;

/// Closed validation error set
#[derive(Error, Debug, PartialEq, Eq)]
pub enum JwtError {
    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Malformed token")]
    Malformed,

    #[error("Token encoding failed: {0}")]
    EncodingError(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            ErrorKind::InvalidAudience | ErrorKind::InvalidIssuer => JwtError::InvalidSignature,
            _ => JwtError::Malformed,
        }
    }
}

/// JWT configuration built from the process-wide secret
#[derive(Clone)]
pub struct JwtConfig {
    pub access_token_expiry: u64,
    pub algorithm: Algorithm,
    pub audience: String,
    pub issuer: String,
    pub encoding_key: EncodingKey,
    pub decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("algorithm", &self.algorithm)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("encoding_key", &"<redacted>")
            .field("decoding_key", &"<redacted>")
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: &str, access_token_expiry: u64, audience: String, issuer: String) -> Self {
        Self {
            access_token_expiry,
            algorithm: Algorithm::HS256,
            audience,
            issuer,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Build from the centralized app configuration
    pub fn from_env() -> Self {
        let config = crate::app_config::config();
        Self::new(
            &config.jwt_secret,
            config.jwt_access_expiry,
            config.jwt_audience.clone(),
            config.jwt_issuer.clone(),
        )
    }

    /// Deterministic config for tests
    pub fn for_test() -> Self {
        Self::new(
            "test-access-secret-for-hs256",
            900,
            "test.dashtam".to_string(),
            "test.dashtam".to_string(),
        )
    }
}

pub struct JwtService {
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    /// Mint an access token bound to a session. A fresh jti is
    /// generated per issuance.
    pub fn generate_access_token(
        &self,
        user: &User,
        session_id: Option<Uuid>,
        roles: Vec<String>,
    ) -> Result<String, JwtError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?
            .as_secs();

        let claims = AccessTokenClaims {
            sub: user.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            email: user.email.clone(),
            roles,
            session_id: session_id.map(|s| s.to_string()),
            token_version: user.min_token_version,
            aud: self.config.audience.clone(),
            iss: self.config.issuer.clone(),
            iat: now,
            exp: now + self.config.access_token_expiry,
        };

        encode(
            &Header::new(self.config.algorithm),
            &claims,
            &self.config.encoding_key,
        )
        .map_err(Into::into)
    }

    /// Validate signature, expiry, audience, and issuer. Clock skew up
    /// to 60 seconds is tolerated.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.set_audience(&[self.config.audience.clone()]);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = VALIDATION_LEEWAY_SECONDS;

        let token_data =
            decode::<AccessTokenClaims>(token, &self.config.decoding_key, &validation)?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            is_verified: true,
            is_active: true,
            failed_login_attempts: 0,
            locked_until: None,
            session_tier: "basic".to_string(),
            min_token_version: 2,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_generate_and_validate() {
        let service = JwtService::new(JwtConfig::for_test());
        let user = test_user();
        let session_id = Uuid::new_v4();

        let token = service
            .generate_access_token(&user, Some(session_id), vec!["user".to_string()])
            .unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.session_id, Some(session_id.to_string()));
        assert_eq!(claims.token_version, 2);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_jti_unique_per_issuance() {
        let service = JwtService::new(JwtConfig::for_test());
        let user = test_user();

        let a = service
            .generate_access_token(&user, None, vec!["user".to_string()])
            .unwrap();
        let b = service
            .generate_access_token(&user, None, vec!["user".to_string()])
            .unwrap();

        let claims_a = service.validate_access_token(&a).unwrap();
        let claims_b = service.validate_access_token(&b).unwrap();
        assert_ne!(claims_a.jti, claims_b.jti);
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let service = JwtService::new(JwtConfig::for_test());
        let other = JwtService::new(JwtConfig::new(
            "a-completely-different-secret",
            900,
            "test.dashtam".to_string(),
            "test.dashtam".to_string(),
        ));
        let user = test_user();

        let token = other
            .generate_access_token(&user, None, vec!["user".to_string()])
            .unwrap();

        assert_eq!(
            service.validate_access_token(&token),
            Err(JwtError::InvalidSignature)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let service = JwtService::new(JwtConfig::for_test());
        assert_eq!(
            service.validate_access_token("not.a.jwt"),
            Err(JwtError::Malformed)
        );
    }
}

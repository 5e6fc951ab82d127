// JWT claim structures for access tokens.
//
// session_id is optional for backward compatibility: legacy tokens
// minted before session binding carry no session claim and skip the
// revocation check.

use serde::{Deserialize, Serialize};

fn default_roles() -> Vec<String> {
    vec!["user".to_string()]
}

/// Access token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// User id
    pub sub: String,
    /// Unique token id per issuance
    pub jti: String,
    pub email: String,
    #[serde(default = "default_roles")]
    pub roles: Vec<String>,
    /// Server-side session this token is bound to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// User's token version at issuance
    #[serde(default)]
    pub token_version: i32,
    pub aud: String,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

impl AccessTokenClaims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_default_on_deserialize() {
        let json = r#"{
            "sub": "8c1ce224-4cbb-44fc-a7ba-4d0d107f9a2e",
            "jti": "d00f17ba-4a74-4f44-a52a-3f05d2fa3a91",
            "email": "alice@example.com",
            "aud": "dashtam",
            "iss": "dashtam",
            "iat": 1700000000,
            "exp": 1700000900
        }"#;

        let claims: AccessTokenClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.roles, vec!["user".to_string()]);
        assert!(claims.session_id.is_none());
        assert_eq!(claims.token_version, 0);
    }

    #[test]
    fn test_has_role() {
        let mut claims: AccessTokenClaims = serde_json::from_str(
            r#"{
                "sub": "s", "jti": "j", "email": "e",
                "aud": "a", "iss": "i", "iat": 0, "exp": 0
            }"#,
        )
        .unwrap();

        assert!(claims.has_role("user"));
        assert!(!claims.has_role("admin"));

        claims.roles.push("admin".to_string());
        assert!(claims.has_role("admin"));
    }
}

// Centralized cache key construction. All keys are hierarchical,
// colon-delimited, and carry the deployment-wide prefix (default
// "dashtam") so several deployments can share one Redis.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Pattern: {prefix}:session:{session_id}
    pub fn session(&self, session_id: Uuid) -> String {
        format!("{}:session:{}", self.prefix, session_id)
    }

    /// Pattern: {prefix}:user:{user_id}:sessions (set of session ids)
    pub fn user_sessions(&self, user_id: Uuid) -> String {
        format!("{}:user:{}:sessions", self.prefix, user_id)
    }

    /// Pattern: {prefix}:accounts:user:{user_id}
    pub fn account_list(&self, user_id: Uuid) -> String {
        format!("{}:accounts:user:{}", self.prefix, user_id)
    }

    /// Pattern: {prefix}:authz:{user_id}:{scope}
    pub fn authz(&self, user_id: Uuid, scope: &str) -> String {
        format!("{}:authz:{}:{}", self.prefix, user_id, scope)
    }

    /// Pattern: {prefix}:reset:rate:{user_id} (password-reset request
    /// counter)
    pub fn reset_rate(&self, user_id: Uuid) -> String {
        format!("{}:reset:rate:{}", self.prefix, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_patterns() {
        let keys = CacheKeys::new("dashtam");
        let id = Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap();

        assert_eq!(
            keys.session(id),
            "dashtam:session:123e4567-e89b-12d3-a456-426614174000"
        );
        assert_eq!(
            keys.user_sessions(id),
            "dashtam:user:123e4567-e89b-12d3-a456-426614174000:sessions"
        );
        assert_eq!(
            keys.account_list(id),
            "dashtam:accounts:user:123e4567-e89b-12d3-a456-426614174000"
        );
        assert_eq!(
            keys.authz(id, "providers"),
            "dashtam:authz:123e4567-e89b-12d3-a456-426614174000:providers"
        );
    }

    #[test]
    fn test_prefix_is_configurable() {
        let keys = CacheKeys::new("staging");
        let id = Uuid::new_v4();
        assert!(keys.session(id).starts_with("staging:session:"));
    }
}

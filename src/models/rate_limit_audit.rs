// Rate-limit violation audit rows. The identifier is an opaque string
// ("user:<uuid>" or NULL for anonymous traffic) rather than a foreign
// key, so rows survive account deletion.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::rate_limit_audit_logs;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = rate_limit_audit_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RateLimitAuditLog {
    pub id: Uuid,
    pub endpoint: String,
    pub identifier: Option<String>,
    pub ip_address: Option<String>,
    pub rule: String,
    pub limit_value: i32,
    pub window_seconds: i32,
    pub violation_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = rate_limit_audit_logs)]
pub struct NewRateLimitAuditLog {
    pub endpoint: String,
    pub identifier: Option<String>,
    pub ip_address: Option<String>,
    pub rule: String,
    pub limit_value: i32,
    pub window_seconds: i32,
    pub violation_count: i32,
}

impl RateLimitAuditLog {
    /// Identifier string for an authenticated principal
    pub fn user_identifier(user_id: Uuid) -> String {
        format!("user:{}", user_id)
    }

    pub async fn append(
        conn: &mut AsyncPgConnection,
        record: NewRateLimitAuditLog,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(rate_limit_audit_logs::table)
            .values(&record)
            .get_result::<RateLimitAuditLog>(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_identifier_format() {
        let id = Uuid::new_v4();
        assert_eq!(
            RateLimitAuditLog::user_identifier(id),
            format!("user:{}", id)
        );
    }
}

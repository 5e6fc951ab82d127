// Shared payload redaction for the logging and audit sinks.
//
// Both handlers serialize the event payload; both must mask the same
// secret-bearing fields. Keeping the field list and the masking walk
// here means a new secret field is redacted everywhere or nowhere -
// the two trails cannot silently diverge.

use serde_json::Value;

use crate::events::types::EventPayload;

/// Payload keys whose values must never be persisted or logged in full
pub const REDACTED_FIELDS: &[&str] =
    &["verification_token", "token", "refresh_token", "access_token"];

/// Serialize a payload with secret fields reduced to an 8-char prefix
pub fn sanitized_payload(payload: &EventPayload) -> Value {
    let mut value = serde_json::to_value(payload).unwrap_or(Value::Null);
    redact(&mut value);
    value
}

fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&key.as_str()) {
                    if let Value::String(s) = entry {
                        let prefix: String = s.chars().take(8).collect();
                        *entry = Value::String(format!("{}...", prefix));
                    }
                } else {
                    redact(entry);
                }
            }
        },
        Value::Array(items) => {
            for item in items {
                redact(item);
            }
        },
        _ => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_verification_token_is_redacted() {
        let payload = EventPayload::UserRegistrationSucceeded {
            user_id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            verification_token: "a".repeat(64),
        };

        let value = sanitized_payload(&payload);
        let token = value["UserRegistrationSucceeded"]["verification_token"]
            .as_str()
            .unwrap();

        assert_eq!(token, "aaaaaaaa...");
    }

    #[test]
    fn test_non_secret_fields_survive() {
        let payload = EventPayload::UserLoginAttempted {
            email: "alice@example.com".to_string(),
            ip_address: Some("203.0.113.45".to_string()),
        };

        let value = sanitized_payload(&payload);
        assert_eq!(
            value["UserLoginAttempted"]["email"].as_str().unwrap(),
            "alice@example.com"
        );
        assert_eq!(
            value["UserLoginAttempted"]["ip_address"].as_str().unwrap(),
            "203.0.113.45"
        );
    }

    #[test]
    fn test_every_listed_field_is_masked_wherever_it_nests() {
        for field in REDACTED_FIELDS {
            let mut value = serde_json::json!({ "Outer": { "inner": [ {} ] } });
            value["Outer"]["inner"][0][*field] =
                Value::String("super-secret-value".to_string());

            redact(&mut value);
            assert_eq!(
                value["Outer"]["inner"][0][*field].as_str().unwrap(),
                "super-se...",
                "field {} escaped redaction",
                field
            );
        }
    }
}

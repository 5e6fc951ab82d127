// SSE registry compliance: the mapping table, the extractor function,
// and the event-type metadata must agree with each other.

use std::collections::HashSet;
use uuid::Uuid;

use dashtam_backend_core::events::types::{
    EventPayload, ImportFailureReason, SyncFailureReason,
};
use dashtam_backend_core::events::DomainEvent;
use dashtam_backend_core::sse::{map_to_sse, SseCategory, DOMAIN_TO_SSE, SSE_EVENT_REGISTRY};

/// One synthetic domain event per mapping row, in table order
fn synthetic_events() -> Vec<DomainEvent> {
    let user = Uuid::new_v4();
    let conn = Uuid::new_v4();
    let account = Uuid::new_v4();

    vec![
        DomainEvent::new(EventPayload::AccountSyncAttempted {
            user_id: user,
            connection_id: conn,
        }),
        DomainEvent::new(EventPayload::AccountSyncSucceeded {
            user_id: user,
            connection_id: conn,
            account_count: 3,
        }),
        DomainEvent::new(EventPayload::AccountSyncFailed {
            user_id: user,
            connection_id: conn,
            reason: SyncFailureReason::ProviderError,
        }),
        DomainEvent::new(EventPayload::TransactionSyncAttempted {
            user_id: user,
            connection_id: conn,
            account_id: Some(account),
        }),
        DomainEvent::new(EventPayload::TransactionSyncSucceeded {
            user_id: user,
            connection_id: conn,
            account_id: Some(account),
            transaction_count: 12,
        }),
        DomainEvent::new(EventPayload::TransactionSyncFailed {
            user_id: user,
            connection_id: conn,
            account_id: None,
            reason: SyncFailureReason::Timeout,
        }),
        DomainEvent::new(EventPayload::HoldingsSyncAttempted {
            user_id: user,
            account_id: account,
        }),
        DomainEvent::new(EventPayload::HoldingsSyncSucceeded {
            user_id: user,
            account_id: account,
            holding_count: 7,
        }),
        DomainEvent::new(EventPayload::HoldingsSyncFailed {
            user_id: user,
            account_id: account,
            reason: SyncFailureReason::Unauthorized,
        }),
        DomainEvent::new(EventPayload::ProviderTokenRefreshSucceeded {
            user_id: user,
            connection_id: conn,
            provider_slug: "schwab".to_string(),
        }),
        DomainEvent::new(EventPayload::ProviderTokenRefreshFailed {
            user_id: user,
            connection_id: conn,
            provider_slug: "schwab".to_string(),
            needs_user_action: true,
            reason: dashtam_backend_core::events::types::ProviderFailureReason::OauthError,
        }),
        DomainEvent::new(EventPayload::ProviderDisconnectionSucceeded {
            user_id: user,
            connection_id: conn,
            provider_slug: "schwab".to_string(),
        }),
        DomainEvent::new(EventPayload::FileImportAttempted {
            user_id: user,
            file_name: "transactions.csv".to_string(),
            file_format: "csv".to_string(),
        }),
        DomainEvent::new(EventPayload::FileImportProgress {
            user_id: user,
            file_name: "transactions.csv".to_string(),
            progress_percent: 40,
            records_processed: 200,
        }),
        DomainEvent::new(EventPayload::FileImportSucceeded {
            user_id: user,
            file_name: "transactions.csv".to_string(),
            transaction_count: 500,
        }),
        DomainEvent::new(EventPayload::FileImportFailed {
            user_id: user,
            file_name: "transactions.csv".to_string(),
            reason: ImportFailureReason::ParseError,
        }),
    ]
}

#[test]
fn every_mapping_row_is_produced_by_the_extractor() {
    let events = synthetic_events();
    assert_eq!(events.len(), DOMAIN_TO_SSE.len());

    for (event, row) in events.iter().zip(DOMAIN_TO_SSE.iter()) {
        assert_eq!(event.event_type(), row.domain_event, "table order drifted");

        let sse = map_to_sse(event).unwrap_or_else(|| {
            panic!("{:?} is in the mapping table but map_to_sse ignored it", row.domain_event)
        });
        assert_eq!(
            sse.event_type, row.sse_event_type,
            "extractor and table disagree for {:?}",
            row.domain_event
        );
    }
}

#[test]
fn extracted_user_id_matches_the_domain_event() {
    for event in synthetic_events() {
        let sse = map_to_sse(&event).unwrap();
        assert_eq!(Some(sse.user_id), event.payload.user_id());
    }
}

#[test]
fn mapped_types_have_metadata_with_matching_category() {
    let described: HashSet<_> = SSE_EVENT_REGISTRY.iter().map(|m| m.event_type).collect();

    for row in DOMAIN_TO_SSE {
        assert!(
            described.contains(&row.sse_event_type),
            "{:?} has no metadata entry",
            row.sse_event_type
        );
    }

    for meta in SSE_EVENT_REGISTRY {
        assert_eq!(meta.event_type.category(), meta.category);
    }
}

#[test]
fn extractor_payloads_cover_documented_fields() {
    for event in synthetic_events() {
        let sse = map_to_sse(&event).unwrap();
        let meta = SSE_EVENT_REGISTRY
            .iter()
            .find(|m| m.event_type == sse.event_type)
            .expect("metadata exists");

        let object = sse.data.as_object().expect("payload is an object");
        for field in meta.payload_fields {
            assert!(
                object.contains_key(*field),
                "{:?} payload is missing documented field {}",
                sse.event_type,
                field
            );
        }
    }
}

#[test]
fn no_mapping_targets_outside_the_closed_category_set() {
    for meta in SSE_EVENT_REGISTRY {
        assert!(SseCategory::ALL.contains(&meta.category));
    }
}

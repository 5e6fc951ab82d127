// Event registry compliance suite.
//
// The registry is authoritative: these tests enumerate it and fail the
// build when an event drifts away from its handlers or audit actions.

use std::collections::HashSet;

use dashtam_backend_core::events::handlers::{EmailEventHandler, SessionEventHandler};
use dashtam_backend_core::events::registry::{
    registry_statistics, EventCategory, WorkflowPhase, EVENT_REGISTRY,
};

#[test]
fn every_audited_event_has_a_distinct_action_name() {
    let mut seen = HashSet::new();
    for row in EVENT_REGISTRY {
        let name = row.audit_action.as_str();
        assert!(!name.is_empty(), "{:?} has an empty audit action", row.event_type);
        assert!(
            seen.insert(name),
            "audit action {} is claimed by more than one event",
            name
        );
    }
}

#[test]
fn every_email_requiring_event_maps_to_a_message() {
    for row in EVENT_REGISTRY.iter().filter(|r| r.requires_email) {
        assert!(
            EmailEventHandler::message_for(row.event_type).is_some(),
            "{:?} requires email but the email handler has no message for it",
            row.event_type
        );
        assert_eq!(
            row.phase,
            WorkflowPhase::Succeeded,
            "only SUCCEEDED events may trigger mail, {:?} does not comply",
            row.event_type
        );
    }
}

#[test]
fn every_session_requiring_event_maps_to_an_action() {
    for row in EVENT_REGISTRY.iter().filter(|r| r.requires_session) {
        assert!(
            SessionEventHandler::action_for(row.event_type).is_some(),
            "{:?} requires session handling but the session handler has no action for it",
            row.event_type
        );
        assert_eq!(
            row.phase,
            WorkflowPhase::Succeeded,
            "only SUCCEEDED events may trigger session work, {:?} does not comply",
            row.event_type
        );
    }
}

#[test]
fn email_and_session_handlers_claim_no_unregistered_events() {
    // The inverse direction: a handler mapping without a registry
    // requirement is drift too.
    for row in EVENT_REGISTRY {
        if EmailEventHandler::message_for(row.event_type).is_some() {
            assert!(
                row.requires_email,
                "email handler maps {:?} but the registry does not require it",
                row.event_type
            );
        }
        if SessionEventHandler::action_for(row.event_type).is_some() {
            assert!(
                row.requires_session,
                "session handler maps {:?} but the registry does not require it",
                row.event_type
            );
        }
    }
}

#[test]
fn registry_statistics_match_the_inventory() {
    let stats = registry_statistics();

    assert_eq!(stats.total_events, 74);
    assert_eq!(stats.requiring_logging, 74, "every event is logged");
    assert_eq!(stats.requiring_audit, 70);
    assert_eq!(stats.requiring_email, 6);
    assert_eq!(stats.requiring_session, 3);

    assert_eq!(stats.by_category["authentication"], 24);
    assert_eq!(stats.by_category["authorization"], 6);
    assert_eq!(stats.by_category["provider"], 9);
    assert_eq!(stats.by_category["data_sync"], 13);
    assert_eq!(stats.by_category["session"], 12);
    assert_eq!(stats.by_category["rate_limit"], 3);
    assert_eq!(stats.by_category["admin"], 7);

    assert_eq!(stats.by_phase["allowed"], 1);
    assert_eq!(stats.by_phase["denied"], 1);
}

#[test]
fn three_state_workflows_are_complete() {
    use std::collections::BTreeMap;

    let mut workflows: BTreeMap<&str, Vec<WorkflowPhase>> = BTreeMap::new();
    for row in EVENT_REGISTRY {
        workflows.entry(row.workflow).or_default().push(row.phase);
    }

    for (workflow, phases) in workflows {
        let has_succeeded = phases.contains(&WorkflowPhase::Succeeded);
        let has_failed = phases.contains(&WorkflowPhase::Failed);

        if has_succeeded || has_failed {
            assert!(
                phases.contains(&WorkflowPhase::Attempted),
                "workflow {} has outcome phases but no ATTEMPTED",
                workflow
            );
        }
        if has_succeeded && workflow != "file_import" {
            assert!(
                has_failed,
                "workflow {} can succeed but never fail",
                workflow
            );
        }
    }
}

#[test]
fn every_category_in_the_taxonomy_is_used() {
    let used: HashSet<_> = EVENT_REGISTRY.iter().map(|r| r.category).collect();

    for category in [
        EventCategory::Authentication,
        EventCategory::Authorization,
        EventCategory::Provider,
        EventCategory::DataSync,
        EventCategory::Session,
        EventCategory::RateLimit,
        EventCategory::Admin,
    ] {
        assert!(
            used.contains(&category),
            "category {:?} has no registry rows",
            category
        );
    }
}

#[test]
fn rate_limit_events_use_the_special_phases() {
    for row in EVENT_REGISTRY.iter().filter(|r| {
        matches!(r.phase, WorkflowPhase::Allowed | WorkflowPhase::Denied)
    }) {
        assert_eq!(row.category, EventCategory::RateLimit);
    }
}

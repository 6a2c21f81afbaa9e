use chrono::Utc;
use worklink::api::{RunStatus, StatusSnapshot};
use worklink::session::{parse_snapshot_timestamp, ConversationSession, Role, SnapshotOutcome};

fn snapshot(
    conversation_id: &str,
    status: RunStatus,
    agent_name: Option<&str>,
    message: &str,
    progress: Option<f64>,
) -> StatusSnapshot {
    StatusSnapshot {
        conversation_id: conversation_id.to_string(),
        status,
        message: message.to_string(),
        agent_name: agent_name.map(|a| a.to_string()),
        progress,
        error: None,
        timestamp: "2024-05-01T12:00:00Z".to_string(),
    }
}

fn active_session() -> ConversationSession {
    let mut session = ConversationSession::new("github.com/acme/widget");
    session.push_operator_message("Fix the importer");
    session.conversation_id = Some("conv-1".to_string());
    session
}

#[test]
fn successive_updates_from_one_agent_coalesce_into_a_single_entry() {
    let mut session = active_session();

    let outcomes = [
        session.apply_snapshot(&snapshot(
            "conv-1",
            RunStatus::Running,
            Some("A"),
            "planning",
            Some(0.2),
        )),
        session.apply_snapshot(&snapshot(
            "conv-1",
            RunStatus::Running,
            Some("A"),
            "implementing",
            Some(0.6),
        )),
        session.apply_snapshot(&snapshot(
            "conv-1",
            RunStatus::Completed,
            Some("A"),
            "done",
            Some(1.0),
        )),
    ];
    assert_eq!(
        outcomes,
        [
            SnapshotOutcome::Appended,
            SnapshotOutcome::Coalesced,
            SnapshotOutcome::Coalesced,
        ]
    );

    assert_eq!(session.timeline.len(), 2);
    assert_eq!(session.timeline[0].role, Role::Operator);
    let agent_entry = &session.timeline[1];
    assert_eq!(agent_entry.role, Role::Agent);
    assert_eq!(agent_entry.content, "done");
    assert_eq!(agent_entry.status, Some(RunStatus::Completed));
    assert_eq!(agent_entry.progress, Some(1.0));
}

#[test]
fn a_different_agent_appends_instead_of_coalescing() {
    let mut session = active_session();
    session.apply_snapshot(&snapshot(
        "conv-1",
        RunStatus::Running,
        Some("planner"),
        "planning",
        None,
    ));
    let outcome = session.apply_snapshot(&snapshot(
        "conv-1",
        RunStatus::Running,
        Some("builder"),
        "building",
        None,
    ));
    assert_eq!(outcome, SnapshotOutcome::Appended);
    assert_eq!(session.timeline.len(), 3);
}

#[test]
fn absent_agent_names_coalesce_with_each_other() {
    let mut session = active_session();
    session.apply_snapshot(&snapshot("conv-1", RunStatus::Running, None, "first", None));
    let outcome =
        session.apply_snapshot(&snapshot("conv-1", RunStatus::Running, None, "second", None));
    assert_eq!(outcome, SnapshotOutcome::Coalesced);
    assert_eq!(session.timeline.len(), 2);
    assert_eq!(session.timeline[1].content, "second");
}

#[test]
fn operator_entries_are_never_the_coalescing_target() {
    let mut session = active_session();
    let outcome = session.apply_snapshot(&snapshot(
        "conv-1",
        RunStatus::Running,
        None,
        "working",
        None,
    ));
    assert_eq!(outcome, SnapshotOutcome::Appended);
    assert_eq!(session.timeline[0].role, Role::Operator);
    assert_eq!(session.timeline[0].content, "Fix the importer");
}

#[test]
fn waiting_for_input_stops_the_run_but_keeps_the_conversation_id() {
    let mut session = active_session();
    session.apply_snapshot(&snapshot(
        "conv-1",
        RunStatus::WaitingForInput,
        Some("A"),
        "which database?",
        None,
    ));
    assert!(!session.is_run_active);
    assert!(session.accepting_input);
    assert_eq!(session.conversation_id.as_deref(), Some("conv-1"));
}

#[test]
fn terminal_status_clears_the_conversation_id() {
    for status in [RunStatus::Completed, RunStatus::Failed] {
        let mut session = active_session();
        session.apply_snapshot(&snapshot("conv-1", status, Some("A"), "end", None));
        assert!(!session.is_run_active);
        assert!(session.accepting_input);
        assert_eq!(session.conversation_id, None);
    }
}

#[test]
fn failed_snapshot_prefers_the_error_field_text() {
    let mut session = active_session();
    let mut failed = snapshot("conv-1", RunStatus::Failed, Some("A"), "generic", None);
    failed.error = Some("compile step exited with status 2".to_string());
    session.apply_snapshot(&failed);
    assert_eq!(
        session.timeline[1].content,
        "compile step exited with status 2"
    );
}

#[test]
fn snapshot_for_another_conversation_is_discarded() {
    let mut session = active_session();
    let outcome = session.apply_snapshot(&snapshot(
        "conv-other",
        RunStatus::Running,
        Some("A"),
        "working",
        None,
    ));
    assert_eq!(outcome, SnapshotOutcome::Discarded);
    assert_eq!(session.timeline.len(), 1);
    assert!(session.is_run_active);
}

#[test]
fn snapshot_arriving_after_the_run_stopped_is_discarded() {
    let mut session = active_session();
    session.apply_snapshot(&snapshot(
        "conv-1",
        RunStatus::WaitingForInput,
        Some("A"),
        "question",
        None,
    ));
    // A poll response that lost the race with cancellation.
    let outcome = session.apply_snapshot(&snapshot(
        "conv-1",
        RunStatus::Running,
        Some("A"),
        "late",
        None,
    ));
    assert_eq!(outcome, SnapshotOutcome::Discarded);
    assert_eq!(session.timeline[1].content, "question");
}

#[test]
fn transport_failure_becomes_a_single_failed_entry() {
    let mut session = active_session();
    session.fail_with("connection refused");
    assert_eq!(session.timeline.len(), 2);
    let entry = &session.timeline[1];
    assert_eq!(entry.role, Role::Agent);
    assert_eq!(entry.status, Some(RunStatus::Failed));
    assert!(entry.content.contains("connection refused"));
    assert!(!session.is_run_active);
    assert!(session.accepting_input);
    assert_eq!(session.conversation_id, None);
}

#[test]
fn reset_returns_the_session_to_idle() {
    let mut session = active_session();
    session.apply_snapshot(&snapshot(
        "conv-1",
        RunStatus::Running,
        Some("A"),
        "working",
        None,
    ));
    session.reset();
    assert!(session.is_idle());
    assert!(session.timeline.is_empty());
    assert!(session.accepting_input);
    assert!(!session.is_run_active);
}

#[test]
fn snapshot_timestamps_parse_rfc3339_and_fall_back_to_receipt_time() {
    let parsed = parse_snapshot_timestamp("2024-05-01T12:00:00Z");
    assert_eq!(parsed.timestamp(), 1_714_564_800);

    let before = Utc::now();
    let fallback = parse_snapshot_timestamp("not a date");
    assert!(fallback >= before);
    assert!(fallback <= Utc::now());
}

#[test]
fn operator_message_flags_the_run_as_active() {
    let mut session = ConversationSession::new("github.com/acme/widget");
    assert!(session.accepting_input);
    session.push_operator_message("hello");
    assert!(session.is_run_active);
    assert!(!session.accepting_input);
    assert_eq!(session.timeline.len(), 1);
}

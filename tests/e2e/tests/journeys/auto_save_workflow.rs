//! Journey: threshold-driven auto-save and auto-clear
//!
//! One conversation grows past the save threshold, is archived once, and a
//! second transcript or a new session re-arms the guard.

use std::path::PathBuf;

use chrono::Utc;
use recollect_core::{run_automation, AutomationAction, AutomationRequest, Scope};
use recollect_e2e_tests::{QueryFailingEmbedder, TestContext, TranscriptBuilder};

fn first_conversation() -> TranscriptBuilder {
    TranscriptBuilder::new()
        .session("conv-a")
        .assistant("Migrated the session store to SQLite because the JSON file corrupted on crash.")
        .assistant("Added a schema version table so future migrations can run in order.")
}

fn second_conversation() -> TranscriptBuilder {
    TranscriptBuilder::new()
        .session("conv-b")
        .assistant("Refactored the auth middleware so token refresh happens before the handler runs.")
}

fn request(path: &PathBuf, percent: f64) -> AutomationRequest {
    AutomationRequest {
        transcript_path: path.clone(),
        context_percent: Some(percent),
        project: Some("api".to_string()),
        session_id: None,
    }
}

#[test]
fn test_guard_sequence_archives_once_per_transcript() {
    let test = TestContext::new();
    let a = test.write_transcript("a", &first_conversation());
    let b = test.write_transcript("b", &second_conversation());
    let now = Utc::now();

    let below = run_automation(test.ctx(), &request(&a, 65.0), now).unwrap();
    assert_eq!(below.action, AutomationAction::None);
    assert!(below.archive.is_none());
    assert!(!below.recommend_clear);

    let saved = run_automation(test.ctx(), &request(&a, 75.0), now).unwrap();
    assert_eq!(saved.action, AutomationAction::AutoSave);
    assert_eq!(saved.archive.as_ref().unwrap().archived, 2);
    assert!(saved.restoration.as_ref().unwrap().has_content);
    assert!(saved.recommend_clear);

    let guarded = run_automation(test.ctx(), &request(&a, 80.0), now).unwrap();
    assert_eq!(guarded.action, AutomationAction::None);

    let other = run_automation(test.ctx(), &request(&b, 75.0), now).unwrap();
    assert_eq!(other.action, AutomationAction::AutoSave);
    assert_eq!(other.archive.as_ref().unwrap().archived, 1);

    let session = test.ctx().storage().active_session().unwrap().unwrap();
    assert_eq!(session.session_id, saved.session_id);
    assert_eq!(session.project.as_deref(), Some("api"));
    assert_eq!(session.save_points.len(), 2);
    assert_eq!(session.fragments_created, 3);
    assert_eq!(session.peak_context_percent, 80.0);
    assert_eq!(
        test.ctx()
            .storage()
            .stats(&Scope::Project("api".to_string()))
            .unwrap()
            .fragment_count,
        3
    );
}

#[test]
fn test_new_session_rearms_the_same_transcript() {
    let test = TestContext::new();
    let a = test.write_transcript("a", &first_conversation());
    let now = Utc::now();

    run_automation(test.ctx(), &request(&a, 75.0), now).unwrap();
    test.ctx().reset_session();

    let again = run_automation(test.ctx(), &request(&a, 71.0), now).unwrap();
    assert_eq!(again.action, AutomationAction::AutoSave);

    let archive = again.archive.unwrap();
    assert_eq!(archive.archived, 0);
    assert_eq!(archive.duplicates, 2);
    assert!(again.restoration.is_none());
    assert!(!again.recommend_clear);

    let session = test.ctx().storage().active_session().unwrap().unwrap();
    assert_eq!(session.save_points.len(), 1);
}

#[test]
fn test_guard_survives_a_new_invocation() {
    let mut test = TestContext::new();
    let a = test.write_transcript("a", &first_conversation());

    run_automation(test.ctx(), &request(&a, 75.0), Utc::now()).unwrap();
    test.commit();

    let state = test.ctx().state_store().load();
    assert!(state.has_saved_this_session);
    assert_eq!(state.last_transcript_path.as_ref(), Some(&a));

    let next = run_automation(test.ctx(), &request(&a, 85.0), Utc::now()).unwrap();
    assert_eq!(next.action, AutomationAction::None);
}

#[test]
fn test_auto_clear_escalates_past_the_guard() {
    let test = TestContext::with_config(|config| config.auto_clear_enabled = true);
    let a = test.write_transcript("a", &first_conversation());
    let now = Utc::now();

    run_automation(test.ctx(), &request(&a, 75.0), now).unwrap();
    let cleared = run_automation(test.ctx(), &request(&a, 92.0), now).unwrap();

    assert_eq!(cleared.action, AutomationAction::AutoClear);
    assert_eq!(cleared.archive.as_ref().unwrap().archived, 0);
    assert!(cleared.restoration.is_some());
    assert!(cleared.recommend_clear);

    let session = test.ctx().storage().active_session().unwrap().unwrap();
    assert_eq!(session.clear_count, 1);
}

#[test]
fn test_auto_clear_disabled_falls_back_to_guard() {
    let test = TestContext::new();
    let a = test.write_transcript("a", &first_conversation());
    let now = Utc::now();

    run_automation(test.ctx(), &request(&a, 75.0), now).unwrap();
    let high = run_automation(test.ctx(), &request(&a, 95.0), now).unwrap();

    assert_eq!(high.action, AutomationAction::None);
}

#[test]
fn test_context_percent_estimated_from_token_usage() {
    let test = TestContext::new();
    let transcript = TranscriptBuilder::new()
        .assistant_with_usage(
            "Configured the release pipeline to build artifacts once and promote them between stages.",
            150_000,
        );
    let path = test.write_transcript("usage", &transcript);

    let report = test
        .ctx()
        .automate(&AutomationRequest {
            transcript_path: path,
            context_percent: None,
            project: None,
            session_id: Some("usage-session".to_string()),
        })
        .unwrap();

    assert_eq!(report.context_percent, 75.0);
    assert_eq!(report.action, AutomationAction::AutoSave);
    assert_eq!(report.session_id, "usage-session");
}

#[test]
fn test_missing_transcript_leaves_state_untouched() {
    let test = TestContext::new();
    let missing = test.root().join("gone.jsonl");

    let result = run_automation(test.ctx(), &request(&missing, 75.0), Utc::now());

    assert!(result.is_err());
    assert!(!test.ctx().state_store().load().has_saved_this_session);
}

#[test]
fn test_failed_restoration_keeps_guard_armed() {
    let mut test = TestContext::new();
    let a = test.write_transcript("a", &first_conversation());

    let failing = test.open_with(QueryFailingEmbedder::new());
    assert!(failing.automate(&request(&a, 75.0)).is_err());
    drop(failing);
    test.rollback();

    assert!(!test.ctx().auto_save_state().has_saved_this_session);
    assert_eq!(test.ctx().storage().stats(&Scope::All).unwrap().fragment_count, 0);

    let retry = run_automation(test.ctx(), &request(&a, 75.0), Utc::now()).unwrap();
    assert_eq!(retry.action, AutomationAction::AutoSave);
    assert_eq!(retry.archive.as_ref().unwrap().archived, 2);
    test.commit();

    assert!(test.ctx().state_store().load().has_saved_this_session);
}

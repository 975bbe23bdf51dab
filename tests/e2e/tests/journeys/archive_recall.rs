//! Journey: archive a transcript, then recall it
//!
//! Covers the archive pipeline counts, idempotency across invocations,
//! transaction rollback and the hybrid query path.

use chrono::{Duration, Utc};
use recollect_core::{ArchiveTarget, Provenance, Scope};
use recollect_e2e_tests::{TestContext, TranscriptBuilder};

const MIGRATION_NOTE: &str =
    "Implemented the database migration runner because schema changes were applied by hand.";
const LOGIN_NOTE: &str =
    "Fixed the flaky login test by awaiting the session write before asserting on the cookie.";
const CACHE_NOTE: &str =
    "Replaced the ad-hoc cache with an LRU so memory stays bounded under sustained load.";

fn archive(test: &TestContext, name: &str, transcript: &TranscriptBuilder) -> recollect_core::ArchiveReport {
    let path = test.write_transcript(name, transcript);
    test.ctx()
        .archive(&path, &ArchiveTarget::default(), &mut |_| {})
        .expect("archive succeeds")
}

#[test]
fn test_archive_reports_kept_skipped_and_duplicate_chunks() {
    let test = TestContext::new();
    let transcript = TranscriptBuilder::new()
        .session("s-counts")
        .user("Can you wire up migrations for the database?")
        .assistant(MIGRATION_NOTE)
        .assistant("ok")
        .assistant(MIGRATION_NOTE)
        .garbage("{\"truncated");

    let report = archive(&test, "counts", &transcript);

    assert_eq!(report.archived, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.discarded.too_short, 1);
    assert_eq!(report.malformed_records, 1);
    assert_eq!(report.session_id.as_deref(), Some("s-counts"));

    let stored = test.ctx().storage().fetch(&report.fragment_ids[0]).unwrap().unwrap();
    assert_eq!(stored.content, MIGRATION_NOTE);
    assert_eq!(stored.source_session.as_deref(), Some("s-counts"));
}

#[test]
fn test_rearchiving_after_commit_adds_nothing() {
    let mut test = TestContext::new();
    let transcript = TranscriptBuilder::new()
        .assistant(MIGRATION_NOTE)
        .assistant(LOGIN_NOTE)
        .assistant(CACHE_NOTE);

    let first = archive(&test, "repeat", &transcript);
    assert_eq!(first.archived, 3);
    test.commit();

    let second = archive(&test, "repeat", &transcript);
    assert_eq!(second.archived, 0);
    assert_eq!(second.duplicates, 3);
    assert_eq!(
        test.ctx().storage().stats(&Scope::All).unwrap().fragment_count,
        3
    );
}

#[test]
fn test_uncommitted_archive_is_rolled_back() {
    let mut test = TestContext::new();
    let report = archive(&test, "rollback", &TranscriptBuilder::new().assistant(LOGIN_NOTE));
    assert_eq!(report.archived, 1);

    test.rollback();

    assert_eq!(
        test.ctx().storage().stats(&Scope::All).unwrap().fragment_count,
        0
    );
}

#[test]
fn test_search_ranks_matching_fragment_first() {
    let test = TestContext::new();
    archive(
        &test,
        "topics",
        &TranscriptBuilder::new()
            .assistant(LOGIN_NOTE)
            .assistant(MIGRATION_NOTE)
            .assistant(CACHE_NOTE),
    );

    let results = test
        .ctx()
        .search("database migration", &Scope::All, 3)
        .unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].fragment.content, MIGRATION_NOTE);
    assert_eq!(results[0].provenance, Provenance::Hybrid);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_recent_fragment_outranks_stale_one() {
    let test = TestContext::new();
    let now = Utc::now();
    archive(
        &test,
        "recency",
        &TranscriptBuilder::new()
            .assistant_at(
                "Updated the deploy release checklist because staging drifted from production.",
                now - Duration::days(30),
            )
            .assistant_at(
                "Updated the deploy release checklist because the canary step was missing.",
                now - Duration::hours(1),
            ),
    );

    let results = test
        .ctx()
        .search_at("deploy release checklist", &Scope::All, 2, now)
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].fragment.content.contains("canary"));
    assert!(results[1].score < results[1].fused_score);
}

#[test]
fn test_substring_fallback_when_keyword_index_disabled() {
    let test = TestContext::with_config(|config| config.keyword_index = false);
    archive(
        &test,
        "fallback",
        &TranscriptBuilder::new().assistant(LOGIN_NOTE).assistant(CACHE_NOTE),
    );

    let results = test.ctx().search("flaky login", &Scope::All, 5).unwrap();

    assert_eq!(results[0].fragment.content, LOGIN_NOTE);
    assert_eq!(results[0].provenance, Provenance::Hybrid);
}

#[test]
fn test_blank_query_returns_nothing() {
    let test = TestContext::new();
    archive(&test, "blank", &TranscriptBuilder::new().assistant(CACHE_NOTE));

    assert!(test.ctx().search("   ", &Scope::All, 5).unwrap().is_empty());
}

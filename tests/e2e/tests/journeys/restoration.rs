//! Journey: restoration context after archiving
//!
//! Token costs are `ceil(chars / 4)`; fixtures use exact character counts so
//! budgets can be asserted precisely.

use recollect_core::{ArchiveTarget, Scope};
use recollect_e2e_tests::mocks::sized_note;
use recollect_e2e_tests::{TestContext, TranscriptBuilder};

fn archive_notes(test: &TestContext, topics: &[&str], chars: usize) {
    let transcript = topics
        .iter()
        .fold(TranscriptBuilder::new(), |builder, topic| {
            builder.assistant(&sized_note(topic, chars))
        });
    let path = test.write_transcript("notes", &transcript);
    let report = test
        .ctx()
        .archive(&path, &ArchiveTarget::default(), &mut |_| {})
        .unwrap();
    assert_eq!(report.archived, topics.len());
}

#[test]
fn test_budget_truncates_the_last_fragment() {
    let test = TestContext::new();
    archive_notes(&test, &["parser", "scheduler", "exporter"], 400);

    let context = test.ctx().restore(&Scope::All, 5, 160).unwrap();

    assert!(context.has_content);
    assert_eq!(context.fragments.len(), 2);
    assert!(!context.fragments[0].truncated);
    assert_eq!(context.fragments[0].content.len(), 400);

    let cut = &context.fragments[1];
    assert!(cut.truncated);
    assert_eq!(cut.content.len(), 240);
    assert!(cut.content.ends_with("..."));

    assert_eq!(context.estimated_tokens, 160);
    assert_eq!(
        context.summary,
        "Restored 2 fragments from all projects (~160 tokens)."
    );
}

#[test]
fn test_fragment_that_fits_exactly_is_kept_whole() {
    let test = TestContext::new();
    archive_notes(&test, &["parser", "scheduler", "exporter"], 200);

    let context = test.ctx().restore(&Scope::All, 5, 100).unwrap();

    assert_eq!(context.fragments.len(), 2);
    assert!(context.fragments.iter().all(|f| !f.truncated));
    assert_eq!(context.estimated_tokens, 100);
}

#[test]
fn test_small_remainder_is_not_filled() {
    let test = TestContext::new();
    archive_notes(&test, &["parser", "scheduler"], 320);

    let context = test.ctx().restore(&Scope::All, 5, 100).unwrap();

    assert_eq!(context.fragments.len(), 1);
    assert_eq!(context.estimated_tokens, 80);
    assert!(!context.fragments[0].truncated);
}

#[test]
fn test_message_count_caps_fragments() {
    let test = TestContext::new();
    archive_notes(
        &test,
        &["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"],
        100,
    );

    let context = test.ctx().restore(&Scope::All, 3, 1000).unwrap();

    assert_eq!(context.fragments.len(), 3);
    assert_eq!(context.estimated_tokens, 75);
}

#[test]
fn test_empty_scope_reports_no_context() {
    let test = TestContext::new();
    archive_notes(&test, &["parser"], 200);

    let context = test
        .ctx()
        .restore(&Scope::Project("web".to_string()), 5, 1000)
        .unwrap();

    assert!(!context.has_content);
    assert!(context.fragments.is_empty());
    assert_eq!(context.estimated_tokens, 0);
    assert_eq!(context.summary, "No prior context found for web.");
}

#[test]
fn test_rendered_context_lists_every_fragment() {
    let test = TestContext::new();
    archive_notes(&test, &["parser", "scheduler"], 120);

    let context = test.ctx().restore(&Scope::All, 5, 1000).unwrap();
    let rendered = context.render();

    assert!(rendered.starts_with(&context.summary));
    assert!(rendered.contains("[1]"));
    assert!(rendered.contains("[2]"));
    assert!(rendered.contains("global"));
}

//! Journey: project partitions
//!
//! Fragments are filed under a project or globally; retrieval, statistics
//! and deletion honour the scope while deduplication stays store-wide.

use recollect_core::{ArchiveTarget, Scope};
use recollect_e2e_tests::{TestContext, TranscriptBuilder};

const API_NOTE: &str =
    "Added rate limiting to the api gateway because a single client saturated the workers.";
const WEB_NOTE: &str =
    "Fixed the frontend build by pinning the bundler since the minor release broke imports.";
const GLOBAL_NOTE: &str =
    "Decided to keep config files in JSON instead of TOML so the hook scripts can edit them.";

fn archive_into(test: &TestContext, name: &str, note: &str, project: Option<&str>) -> usize {
    let path = test.write_transcript(name, &TranscriptBuilder::new().assistant(note));
    let target = ArchiveTarget {
        project: project.map(str::to_string),
        session_id: None,
    };
    test.ctx()
        .archive(&path, &target, &mut |_| {})
        .unwrap()
        .archived
}

fn seeded() -> TestContext {
    let test = TestContext::new();
    assert_eq!(archive_into(&test, "api", API_NOTE, Some("api")), 1);
    assert_eq!(archive_into(&test, "web", WEB_NOTE, Some("web")), 1);
    assert_eq!(archive_into(&test, "global", GLOBAL_NOTE, None), 1);
    test
}

#[test]
fn test_search_respects_scope() {
    let test = seeded();
    let ctx = test.ctx();

    let api = ctx
        .search("workers gateway", &Scope::Project("api".to_string()), 10)
        .unwrap();
    assert_eq!(api.len(), 1);
    assert_eq!(api[0].fragment.project.as_deref(), Some("api"));

    let global = ctx.search("config files", &Scope::Global, 10).unwrap();
    assert_eq!(global.len(), 1);
    assert!(global[0].fragment.project.is_none());

    let all = ctx.search("release build", &Scope::All, 10).unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn test_stats_and_forget_by_project() {
    let test = seeded();
    let storage = test.ctx().storage();

    assert_eq!(storage.stats(&Scope::All).unwrap().fragment_count, 3);
    assert_eq!(
        storage
            .stats(&Scope::Project("web".to_string()))
            .unwrap()
            .fragment_count,
        1
    );

    assert_eq!(storage.delete_by_project(Some("web")).unwrap(), 1);
    assert_eq!(storage.stats(&Scope::All).unwrap().fragment_count, 2);
    assert_eq!(storage.list_recent(&Scope::Global, 10).unwrap().len(), 1);
}

#[test]
fn test_deduplication_spans_projects() {
    let test = seeded();
    let path = test.write_transcript("copy", &TranscriptBuilder::new().assistant(API_NOTE));

    let report = test
        .ctx()
        .archive(
            &path,
            &ArchiveTarget {
                project: Some("web".to_string()),
                session_id: None,
            },
            &mut |_| {},
        )
        .unwrap();

    assert_eq!(report.archived, 0);
    assert_eq!(report.duplicates, 1);
}

#[test]
fn test_scope_from_cli_project_names() {
    assert_eq!(Scope::from_project(None), Scope::All);
    assert_eq!(Scope::from_project(Some("global")), Scope::Global);
    assert_eq!(
        Scope::from_project(Some("api")),
        Scope::Project("api".to_string())
    );
}

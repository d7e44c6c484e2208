use smelter_api::NatureKind;
use smelter_core::config::AssemblyConfig;
use smelter_core::events::DiagnosticCategory;
use smelter_core::{Assembler, AssemblyReport, Event, EventBus, LanguageRegistry};
use std::path::Path;
use std::sync::{Arc, Mutex};

const MAIN_SQL: &str = "-- #include head --file include/header.sql\n-- #includeEnd head\nselect 1;\n";

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn seed_tree(root: &Path) {
    write(root, "main.sql", MAIN_SQL);
    write(root, "include/header.sql", "select 'header';\n");
    write(
        root,
        "queries/report.sql",
        "-- @resource.nature sql\n-- @route.path /reports/daily\n-- @route.caption Daily report\nselect 2;\n",
    );
    write(
        root,
        "docs/intro.md",
        "<!--\n---\nroute:\n  caption: Introduction\n  order: 1\n---\n-->\n# Intro\n",
    );
}

#[cfg(unix)]
fn seed_foundry(root: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let script = "#!/bin/sh\n# @resource.nature foundry\necho '# @resource.nature sql'\necho 'select 42;'\n";
    write(root, "gen.pre.sh", script);
    std::fs::set_permissions(root.join("gen.pre.sh"), std::fs::Permissions::from_mode(0o755))
        .unwrap();
}

async fn assemble(root: &Path, config: AssemblyConfig, events: EventBus) -> AssemblyReport {
    Assembler::builder(Arc::new(LanguageRegistry::seeded()), config)
        .fs_root(root)
        .events(events)
        .build()
        .unwrap()
        .run()
        .await
        .unwrap()
}

fn rel_paths(resources: &[smelter_api::Resource]) -> Vec<String> {
    resources
        .iter()
        .map(|r| r.rel_path.to_string_lossy().replace('\\', "/"))
        .collect()
}

#[cfg(unix)]
#[tokio::test]
async fn test_side_effects_are_seen_only_by_the_second_walk() {
    let dir = tempfile::tempdir().unwrap();
    seed_tree(dir.path());
    seed_foundry(dir.path());

    let report = assemble(dir.path(), AssemblyConfig::default(), EventBus::new()).await;
    assert!(report.is_clean(), "{:?}", report.diagnostics);
    assert!(!report.cancelled);

    let discovered = rel_paths(&report.discovered);
    let materialized = rel_paths(&report.materialized);
    assert!(!discovered.contains(&"gen.auto.sh".to_string()));
    assert!(materialized.contains(&"gen.auto.sh".to_string()));
    assert_eq!(materialized.len(), discovered.len() + 1);

    let generated = report
        .materialized
        .iter()
        .find(|r| r.rel_path == Path::new("gen.auto.sh"))
        .unwrap();
    assert_eq!(generated.nature_kind(), NatureKind::Sql);

    assert_eq!(report.foundries.len(), 1);
    assert_eq!(report.foundries[0].error, None);
    assert_eq!(report.directives.len(), 1);
    assert!(report.directives[0].changed);
    assert!(report.directives[0].written);
    let main = std::fs::read_to_string(dir.path().join("main.sql")).unwrap();
    assert!(main.contains("select 'header';"));
    assert!(main.ends_with("-- #includeEnd head\nselect 1;\n"));
}

#[tokio::test]
async fn test_classification_and_routes_feed_the_forest() {
    let dir = tempfile::tempdir().unwrap();
    seed_tree(dir.path());
    let report = assemble(dir.path(), AssemblyConfig::default(), EventBus::new()).await;

    let report_sql = report
        .discovered
        .iter()
        .find(|r| r.rel_path == Path::new("queries/report.sql"))
        .unwrap();
    assert_eq!(report_sql.nature_kind(), NatureKind::Sql);

    let intro = report
        .discovered
        .iter()
        .find(|r| r.rel_path == Path::new("docs/intro.md"))
        .unwrap();
    assert_eq!(intro.nature_kind(), NatureKind::Page);

    let daily = report.forest.get("/reports/daily").unwrap();
    assert_eq!(daily.caption(), "Daily report");
    assert!(report.forest.get("/reports").unwrap().is_virtual());
    let crumbs = report.forest.breadcrumbs("/docs/intro.md");
    assert_eq!(crumbs.last().unwrap().caption, "Introduction");
}

#[tokio::test]
async fn test_dry_run_leaves_the_tree_untouched() {
    let dir = tempfile::tempdir().unwrap();
    seed_tree(dir.path());
    let config = AssemblyConfig {
        dry_run: true,
        ..AssemblyConfig::default()
    };
    let report = assemble(dir.path(), config, EventBus::new()).await;

    assert_eq!(report.directives.len(), 1);
    assert!(report.directives[0].changed);
    assert!(!report.directives[0].written);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("main.sql")).unwrap(),
        MAIN_SQL
    );
    assert_eq!(
        rel_paths(&report.discovered),
        rel_paths(&report.materialized)
    );
}

#[tokio::test]
async fn test_events_follow_the_pipeline_order() {
    let dir = tempfile::tempdir().unwrap();
    seed_tree(dir.path());
    let names = Arc::new(Mutex::new(Vec::new()));
    let events = EventBus::new();
    let sink = names.clone();
    events.subscribe(Arc::new(move |event: &Event| {
        sink.lock().unwrap().push(event.name());
    }));

    assemble(dir.path(), AssemblyConfig::default(), events).await;
    let names = names.lock().unwrap();

    let states: Vec<usize> = names
        .iter()
        .enumerate()
        .filter(|(_, n)| **n == "state:mutated")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(states.len(), 3);
    assert_eq!(states[0], 0);
    assert_eq!(states[2], names.len() - 1);

    let directive = names
        .iter()
        .position(|n| *n == "directive:materialized")
        .unwrap();
    assert!(directive > states[0] && directive < states[1]);
    let encountered: Vec<usize> = names
        .iter()
        .enumerate()
        .filter(|(_, n)| **n == "resource:encountered")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(encountered.len(), 8);
    assert!(encountered[..4].iter().all(|i| *i < directive));
}

#[tokio::test]
async fn test_broken_annotations_do_not_stop_the_walk() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.sql", "-- @route.path /a\nselect 1;\n");
    write(dir.path(), "b.sql", "/*\n---\nresource: [unclosed\n---\n*/\n");
    write(dir.path(), "c.sql", "-- @resource.nature sql\n");
    let report = assemble(dir.path(), AssemblyConfig::default(), EventBus::new()).await;

    assert_eq!(report.discovered.len(), 3);
    let categories: Vec<DiagnosticCategory> = report
        .diagnostics
        .iter()
        .take(2)
        .map(|d| d.category)
        .collect();
    assert_eq!(
        categories,
        vec![DiagnosticCategory::Route, DiagnosticCategory::Annotation]
    );
    assert_eq!(report.discovered[2].nature_kind(), NatureKind::Sql);
}

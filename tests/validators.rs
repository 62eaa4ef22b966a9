use chrono::{DateTime, Duration, Utc};
use docpulse::core::config::ValidationConfig;
use docpulse::core::db::{self, Session};
use docpulse::core::registry;
use docpulse::core::store::Store;
use docpulse::core::time;
use docpulse::validators::adr::AdrValidator;
use docpulse::validators::debt::DebtAuditor;
use docpulse::validators::freshness::FreshnessChecker;
use docpulse::validators::snapshot::SnapshotValidator;
use docpulse::validators::{
    Finding, SourceTimes, StoreSnapshot, ValidationContext, Validator,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn project() -> (tempfile::TempDir, Store, Session) {
    let tmp = tempdir().unwrap();
    let store = Store::new(tmp.path());
    db::initialize_context_db(&store).unwrap();
    let session = Session::open(&store).unwrap();
    (tmp, store, session)
}

/// Fixed-instant provider: documents resolve by file name, sources by a
/// single instant per call.
struct FixedTimes {
    docs: HashMap<String, DateTime<Utc>>,
    source: Option<DateTime<Utc>>,
}

impl SourceTimes for FixedTimes {
    fn file_instant(&self, path: &Path) -> Option<DateTime<Utc>> {
        let name = path.file_name()?.to_str()?;
        self.docs.get(name).copied()
    }

    fn latest_source_instant(&self, _system_dir: &Path) -> Option<DateTime<Utc>> {
        self.source
    }
}

fn context(store: &Store, session: &Session, times: Arc<dyn SourceTimes>) -> ValidationContext {
    ValidationContext {
        store: store.clone(),
        snapshot: StoreSnapshot::load(session).unwrap(),
        config: ValidationConfig::default(),
        now: time::parse_timestamp("2026-08-07T12:00:00Z").unwrap(),
        times,
    }
}

fn no_times() -> Arc<dyn SourceTimes> {
    Arc::new(FixedTimes {
        docs: HashMap::new(),
        source: None,
    })
}

fn errors_with_code<'a>(findings: &'a [Finding], code: &str) -> Vec<&'a Finding> {
    findings.iter().filter(|f| f.code == code).collect()
}

// --- SnapshotValidator ---

#[test]
fn test_snapshot_missing_is_fixable_error() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();
    std::fs::remove_file(store.bundle_dir("src/a").join("snapshot.md")).unwrap();

    let ctx = context(&store, &session, no_times());
    let outcome = SnapshotValidator.validate(&ctx).unwrap();

    assert_eq!(outcome.errors.len(), 1);
    let finding = &outcome.errors[0];
    assert_eq!(finding.code, "missing_snapshot");
    assert!(finding.fixable());
    assert_eq!(finding.fix.as_ref().unwrap().fix_id, "missing_snapshot");
}

#[test]
fn test_snapshot_dependency_diff_both_directions() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();
    registry::create_system(&mut session, &store, "src/b", "B", None).unwrap();
    registry::create_system(&mut session, &store, "src/c", "C", None).unwrap();
    // Registry records a -> b; the snapshot declares c instead.
    registry::add_dependency(&mut session, "src/a", "src/b").unwrap();
    std::fs::write(
        store.bundle_dir("src/a").join("snapshot.md"),
        "## Dependencies\n\n| System | Notes |\n|--------|-------|\n| `src/c` | wrong |\n",
    )
    .unwrap();

    let ctx = context(&store, &session, no_times());
    let outcome = SnapshotValidator.validate(&ctx).unwrap();

    let unresolved = errors_with_code(&outcome.errors, "unresolved_dependency");
    assert_eq!(unresolved.len(), 2, "one per direction: {:?}", outcome.errors);
    assert!(unresolved.iter().any(|f| f.message.contains("src/c")));
    assert!(unresolved.iter().any(|f| f.message.contains("src/b")));
}

#[test]
fn test_snapshot_unregistered_declaration() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();
    std::fs::write(
        store.bundle_dir("src/a").join("snapshot.md"),
        "## Dependencies\n\n| System | Notes |\n|--------|-------|\n| `src/ghost` | gone |\n",
    )
    .unwrap();

    let ctx = context(&store, &session, no_times());
    let outcome = SnapshotValidator.validate(&ctx).unwrap();

    assert_eq!(errors_with_code(&outcome.errors, "unknown_dependency").len(), 1);
}

#[test]
fn test_snapshot_agreement_is_clean() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();
    registry::create_system(&mut session, &store, "src/b", "B", None).unwrap();
    registry::add_dependency(&mut session, "src/a", "src/b").unwrap();
    std::fs::write(
        store.bundle_dir("src/a").join("snapshot.md"),
        "## Dependencies\n\n| System | Notes |\n|--------|-------|\n| `src/b` | bus |\n",
    )
    .unwrap();

    let ctx = context(&store, &session, no_times());
    let outcome = SnapshotValidator.validate(&ctx).unwrap();
    assert!(outcome.errors.is_empty(), "unexpected: {:?}", outcome.errors);
}

// --- AdrValidator ---

#[test]
fn test_orphaned_adr_link_names_id_and_path() {
    let (_tmp, store, mut session) = project();
    docpulse::core::adr::create_adr(
        &mut session,
        &store,
        docpulse::core::adr::NewAdr {
            title: "Ghost decision",
            status: "accepted",
            links: vec![],
            tags: vec![],
            context: None,
            decision: None,
            consequences: None,
        },
    )
    .unwrap();
    // Simulate an external writer leaving a dangling link behind.
    session
        .conn()
        .execute(
            "INSERT INTO adr_systems (adr_id, system_path) VALUES ('ADR-001', 'src/systems/ghost')",
            [],
        )
        .unwrap();

    let ctx = context(&store, &session, no_times());
    let outcome = AdrValidator.validate(&ctx).unwrap();

    let orphans = errors_with_code(&outcome.errors, "orphaned_adr");
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].system, "ADR-001");
    assert!(orphans[0].message.contains("src/systems/ghost"));
}

#[test]
fn test_broken_file_reference() {
    let (_tmp, store, mut session) = project();
    let record = docpulse::core::adr::create_adr(
        &mut session,
        &store,
        docpulse::core::adr::NewAdr {
            title: "Vanishing",
            status: "accepted",
            links: vec![],
            tags: vec![],
            context: None,
            decision: None,
            consequences: None,
        },
    )
    .unwrap();
    std::fs::remove_file(store.root.join(&record.file_path)).unwrap();

    let ctx = context(&store, &session, no_times());
    let outcome = AdrValidator.validate(&ctx).unwrap();
    assert_eq!(errors_with_code(&outcome.errors, "broken_reference").len(), 1);
}

#[test]
fn test_supersession_asymmetry_detected() {
    let (_tmp, store, mut session) = project();
    for title in ["First", "Second"] {
        docpulse::core::adr::create_adr(
            &mut session,
            &store,
            docpulse::core::adr::NewAdr {
                title,
                status: "accepted",
                links: vec![],
                tags: vec![],
                context: None,
                decision: None,
                consequences: None,
            },
        )
        .unwrap();
    }
    // Half-wired chain, as an external editor might leave it.
    session
        .conn()
        .execute(
            "UPDATE adrs SET status = 'superseded', superseded_by = 'ADR-002' WHERE id = 'ADR-001'",
            [],
        )
        .unwrap();

    let ctx = context(&store, &session, no_times());
    let outcome = AdrValidator.validate(&ctx).unwrap();

    let chain = errors_with_code(&outcome.errors, "supersession");
    assert_eq!(chain.len(), 1);
    assert!(chain[0].message.contains("does not reference it back"));
}

#[test]
fn test_decision_index_desync() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();
    std::fs::write(
        store.bundle_dir("src/a").join("decisions.md"),
        "# A — Decisions\n\n| ID | Title | Status | Date |\n|----|-------|--------|------|\n| ADR-042 | Phantom | accepted | 2025-01-01 |\n",
    )
    .unwrap();

    let ctx = context(&store, &session, no_times());
    let outcome = AdrValidator.validate(&ctx).unwrap();

    let desync = errors_with_code(&outcome.errors, "index_desync");
    assert_eq!(desync.len(), 1);
    assert!(desync[0].message.contains("ADR-042"));
}

#[test]
fn test_decision_index_status_mismatch_is_warning() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();
    docpulse::core::adr::create_adr(
        &mut session,
        &store,
        docpulse::core::adr::NewAdr {
            title: "Indexed",
            status: "accepted",
            links: vec!["src/a"],
            tags: vec![],
            context: None,
            decision: None,
            consequences: None,
        },
    )
    .unwrap();
    std::fs::write(
        store.bundle_dir("src/a").join("decisions.md"),
        "# A — Decisions\n\n| ID | Title | Status | Date |\n|----|-------|--------|------|\n| ADR-001 | Indexed | proposed | 2025-01-01 |\n",
    )
    .unwrap();

    let ctx = context(&store, &session, no_times());
    let outcome = AdrValidator.validate(&ctx).unwrap();

    assert!(outcome.errors.iter().all(|f| f.code != "index_desync"));
    let mismatches: Vec<&Finding> = outcome
        .warnings
        .iter()
        .filter(|f| f.code == "index_desync")
        .collect();
    assert_eq!(mismatches.len(), 1);
    assert!(mismatches[0].message.contains("'proposed'"));
}

// --- DebtAuditor ---

fn write_debt(store: &Store, system: &str, active_rows: &str) {
    let content = format!(
        "# Debt\n\n## Active\n\n| ID | Description | Priority | Created |\n|----|-------------|----------|---------|\n{}\n## Resolved\n\n| ID | Description | Priority | Created | Resolved |\n|----|-------------|----------|---------|----------|\n",
        active_rows
    );
    std::fs::write(store.bundle_dir(system).join("debt.md"), content).unwrap();
}

#[test]
fn test_debt_high_priority_aging_is_warning() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();

    let ctx_now = time::parse_timestamp("2026-08-07T12:00:00Z").unwrap();
    let created = (ctx_now - Duration::days(31)).format("%Y-%m-%d").to_string();
    write_debt(&store, "src/a", &format!("| D-1 | Slow path | high | {} |\n", created));

    let ctx = context(&store, &session, no_times());
    let outcome = DebtAuditor.validate(&ctx).unwrap();

    let aging: Vec<&Finding> = outcome
        .warnings
        .iter()
        .filter(|f| f.code == "debt_aging")
        .collect();
    assert_eq!(aging.len(), 1);
    assert!(aging[0].message.contains("31 days"));
}

#[test]
fn test_debt_under_threshold_is_quiet() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();

    let ctx_now = time::parse_timestamp("2026-08-07T12:00:00Z").unwrap();
    let created = (ctx_now - Duration::days(29)).format("%Y-%m-%d").to_string();
    write_debt(&store, "src/a", &format!("| D-1 | Slow path | high | {} |\n", created));

    let ctx = context(&store, &session, no_times());
    let outcome = DebtAuditor.validate(&ctx).unwrap();
    assert!(outcome.warnings.iter().all(|f| f.code != "debt_aging"));
}

#[test]
fn test_debt_missing_fields_are_errors() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();
    write_debt(
        &store,
        "src/a",
        "| D-1 | No priority |  | 2025-01-01 |\n| D-2 | No date | high |  |\n",
    );

    let ctx = context(&store, &session, no_times());
    let outcome = DebtAuditor.validate(&ctx).unwrap();

    assert_eq!(errors_with_code(&outcome.errors, "debt_missing_priority").len(), 1);
    assert_eq!(errors_with_code(&outcome.errors, "debt_missing_created").len(), 1);
}

#[test]
fn test_debt_duplicate_id_across_tables_is_error() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();
    let content = "# Debt\n\n## Active\n\n| ID | Description | Priority | Created |\n|----|-------------|----------|---------|\n| D-1 | Lingers | low | 2026-08-01 |\n\n## Resolved\n\n| ID | Description | Priority | Created | Resolved |\n|----|-------------|----------|---------|----------|\n| D-1 | Lingers | low | 2026-08-01 | 2026-08-02 |\n";
    std::fs::write(store.bundle_dir("src/a").join("debt.md"), content).unwrap();

    let ctx = context(&store, &session, no_times());
    let outcome = DebtAuditor.validate(&ctx).unwrap();
    assert_eq!(errors_with_code(&outcome.errors, "duplicate_debt_id").len(), 1);
}

// --- FreshnessChecker ---

fn freshness_times(doc: DateTime<Utc>, source: DateTime<Utc>) -> Arc<dyn SourceTimes> {
    // Only snapshot.md resolves, so staleness counts are exact.
    let mut docs = HashMap::new();
    docs.insert("snapshot.md".to_string(), doc);
    Arc::new(FixedTimes {
        docs,
        source: Some(source),
    })
}

#[test]
fn test_freshness_past_threshold_is_one_warning() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();

    let doc = time::parse_timestamp("2026-01-01T00:00:00Z").unwrap();
    let source = doc + Duration::days(31);
    let ctx = context(&store, &session, freshness_times(doc, source));
    let outcome = FreshnessChecker.validate(&ctx).unwrap();

    let stale: Vec<&Finding> = outcome
        .warnings
        .iter()
        .filter(|f| f.code == "stale_documentation")
        .collect();
    assert_eq!(stale.len(), 1);
    assert!(stale[0].message.contains("31 days"));
}

#[test]
fn test_freshness_under_threshold_is_quiet() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();

    let doc = time::parse_timestamp("2026-01-01T00:00:00Z").unwrap();
    let source = doc + Duration::days(29);
    let ctx = context(&store, &session, freshness_times(doc, source));
    let outcome = FreshnessChecker.validate(&ctx).unwrap();

    assert!(outcome.warnings.iter().all(|f| f.code != "stale_documentation"));
}

#[test]
fn test_freshness_flags_missing_artifact() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();

    let ctx = context(&store, &session, no_times());
    let outcome = FreshnessChecker.validate(&ctx).unwrap();

    let stale: Vec<&Finding> = outcome
        .warnings
        .iter()
        .filter(|f| f.code == "stale_graph")
        .collect();
    assert_eq!(stale.len(), 1);
    assert!(stale[0].fixable());
}

#[test]
fn test_freshness_detects_generation_drift() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();

    // Artifact generated, then the registry moves past it.
    let artifact = docpulse::core::graph::generate_artifact(&session).unwrap();
    docpulse::core::graph::save_artifact(&artifact, &store.graph_path()).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(1100));
    registry::create_system(&mut session, &store, "src/b", "B", None).unwrap();

    let ctx = context(&store, &session, no_times());
    let outcome = FreshnessChecker.validate(&ctx).unwrap();
    assert!(outcome.warnings.iter().any(|f| f.code == "stale_graph"));
}

#[test]
fn test_freshness_current_artifact_is_quiet() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/a", "A", None).unwrap();

    let artifact = docpulse::core::graph::generate_artifact(&session).unwrap();
    docpulse::core::graph::save_artifact(&artifact, &store.graph_path()).unwrap();

    let ctx = context(&store, &session, no_times());
    let outcome = FreshnessChecker.validate(&ctx).unwrap();
    assert!(outcome.warnings.iter().all(|f| f.code != "stale_graph"));
}

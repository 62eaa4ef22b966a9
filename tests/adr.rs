use docpulse::core::adr::{self, NewAdr};
use docpulse::core::db::{self, Session};
use docpulse::core::error::DocPulseError;
use docpulse::core::registry;
use docpulse::core::store::Store;
use tempfile::tempdir;

fn project() -> (tempfile::TempDir, Store, Session) {
    let tmp = tempdir().unwrap();
    let store = Store::new(tmp.path());
    db::initialize_context_db(&store).unwrap();
    let session = Session::open(&store).unwrap();
    (tmp, store, session)
}

fn new_adr<'a>(title: &'a str, links: Vec<&'a str>) -> NewAdr<'a> {
    NewAdr {
        title,
        status: "accepted",
        links,
        tags: vec![],
        context: None,
        decision: None,
        consequences: None,
    }
}

#[test]
fn test_create_adr_allocates_sequential_ids() {
    let (_tmp, store, mut session) = project();

    let first = adr::create_adr(&mut session, &store, new_adr("Use SQLite", vec![])).unwrap();
    let second = adr::create_adr(&mut session, &store, new_adr("Use WAL mode", vec![])).unwrap();
    assert_eq!(first.id, "ADR-001");
    assert_eq!(second.id, "ADR-002");
}

#[test]
fn test_global_adr_lands_in_root_bundle() {
    let (_tmp, store, mut session) = project();

    let record = adr::create_adr(&mut session, &store, new_adr("Use SQLite", vec![])).unwrap();
    assert_eq!(record.file_path, ".pulse/adr/ADR-001-use-sqlite.md");

    let content = std::fs::read_to_string(store.root.join(&record.file_path)).unwrap();
    assert!(content.contains("# ADR-001: Use SQLite"));
    assert!(content.contains("**Status**: accepted"));
}

#[test]
fn test_linked_adr_lands_in_system_bundle() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/audio", "Audio", None).unwrap();

    let record = adr::create_adr(
        &mut session,
        &store,
        new_adr("Mixer redesign", vec!["src/audio"]),
    )
    .unwrap();
    assert_eq!(record.file_path, "src/audio/.pulse/adr/ADR-001-mixer-redesign.md");
    assert!(store.root.join(&record.file_path).is_file());

    let linked = adr::get_adrs_for_system(&session, "src/audio").unwrap();
    assert_eq!(linked.len(), 1);
}

#[test]
fn test_create_adr_unknown_link_leaves_no_partial_state() {
    let (_tmp, store, mut session) = project();

    let result = adr::create_adr(
        &mut session,
        &store,
        new_adr("Doomed", vec!["src/ghost"]),
    );
    assert!(matches!(result, Err(DocPulseError::NotFound(_))));

    // Neither the row nor the rendered file may survive.
    assert!(adr::list_adrs(&session, None).unwrap().is_empty());
    assert!(!store.root.join("src/ghost/.pulse/adr/ADR-001-doomed.md").exists());
}

#[test]
fn test_supersede_wires_symmetric_references() {
    let (_tmp, store, mut session) = project();
    adr::create_adr(&mut session, &store, new_adr("First take", vec![])).unwrap();
    adr::create_adr(&mut session, &store, new_adr("Second take", vec![])).unwrap();

    adr::supersede_adr(&mut session, "ADR-001", "ADR-002").unwrap();

    let old = adr::get_adr(&session, "ADR-001").unwrap().unwrap();
    let new = adr::get_adr(&session, "ADR-002").unwrap().unwrap();
    assert_eq!(old.status, "superseded");
    assert_eq!(old.superseded_by.as_deref(), Some("ADR-002"));
    assert_eq!(new.supersedes.as_deref(), Some("ADR-001"));
}

#[test]
fn test_supersede_rejects_self_and_unknown() {
    let (_tmp, store, mut session) = project();
    adr::create_adr(&mut session, &store, new_adr("Only one", vec![])).unwrap();

    assert!(matches!(
        adr::supersede_adr(&mut session, "ADR-001", "ADR-001"),
        Err(DocPulseError::ValidationError(_))
    ));
    assert!(matches!(
        adr::supersede_adr(&mut session, "ADR-001", "ADR-999"),
        Err(DocPulseError::NotFound(_))
    ));
}

#[test]
fn test_supersede_rejects_cycles() {
    let (_tmp, store, mut session) = project();
    adr::create_adr(&mut session, &store, new_adr("A", vec![])).unwrap();
    adr::create_adr(&mut session, &store, new_adr("B", vec![])).unwrap();

    adr::supersede_adr(&mut session, "ADR-001", "ADR-002").unwrap();
    let result = adr::supersede_adr(&mut session, "ADR-002", "ADR-001");
    assert!(matches!(result, Err(DocPulseError::CyclicDependency(_))));
}

#[test]
fn test_delete_adr_cascades_links_and_tags() {
    let (_tmp, store, mut session) = project();
    registry::create_system(&mut session, &store, "src/audio", "Audio", None).unwrap();
    adr::create_adr(&mut session, &store, new_adr("Tagged", vec!["src/audio"])).unwrap();
    adr::add_tag(&mut session, "ADR-001", "Storage").unwrap();

    assert!(adr::delete_adr(&mut session, "ADR-001").unwrap());

    let links: i64 = session
        .conn()
        .query_row("SELECT COUNT(*) FROM adr_systems", [], |row| row.get(0))
        .unwrap();
    let tags: i64 = session
        .conn()
        .query_row("SELECT COUNT(*) FROM adr_tags", [], |row| row.get(0))
        .unwrap();
    assert_eq!((links, tags), (0, 0));
}

#[test]
fn test_tags_normalize_to_lowercase() {
    let (_tmp, store, mut session) = project();
    adr::create_adr(&mut session, &store, new_adr("Tagged", vec![])).unwrap();

    adr::add_tag(&mut session, "ADR-001", "Storage").unwrap();
    assert_eq!(adr::get_tags(&session, "ADR-001").unwrap(), vec!["storage"]);

    assert!(adr::remove_tag(&mut session, "ADR-001", "STORAGE").unwrap());
    assert!(adr::get_tags(&session, "ADR-001").unwrap().is_empty());
}

#[test]
fn test_list_adrs_filters_by_status() {
    let (_tmp, store, mut session) = project();
    adr::create_adr(&mut session, &store, new_adr("A", vec![])).unwrap();
    adr::create_adr(
        &mut session,
        &store,
        NewAdr {
            status: "proposed",
            ..new_adr("B", vec![])
        },
    )
    .unwrap();

    assert_eq!(adr::list_adrs(&session, Some("accepted")).unwrap().len(), 1);
    assert_eq!(adr::list_adrs(&session, None).unwrap().len(), 2);
    assert!(adr::list_adrs(&session, Some("bogus")).is_err());
}

#[test]
fn test_unlink_returns_false_when_absent() {
    let (_tmp, store, mut session) = project();
    adr::create_adr(&mut session, &store, new_adr("A", vec![])).unwrap();
    assert!(!adr::unlink_adr_from_system(&mut session, "ADR-001", "src/ghost").unwrap());
}

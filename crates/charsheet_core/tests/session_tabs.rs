use charsheet_core::db::{open_db, open_db_in_memory};
use charsheet_core::{
    CloseOutcome, EngineConfig, FormSchema, GroupId, ImportFile, NewTabSeed, RelationKind,
    SessionError, SessionRepository, SheetSession, SqliteSessionRepository,
};
use serde_json::Value;
use std::path::Path;

fn memory_session() -> SheetSession<SqliteSessionRepository> {
    let repo = SqliteSessionRepository::new(open_db_in_memory().unwrap());
    SheetSession::open(repo, FormSchema::standard(), EngineConfig::default()).unwrap()
}

fn file_session(path: &Path) -> SheetSession<SqliteSessionRepository> {
    let repo = SqliteSessionRepository::new(open_db(path).unwrap());
    SheetSession::open(repo, FormSchema::standard(), EngineConfig::default()).unwrap()
}

#[test]
fn edits_in_one_tab_do_not_leak_into_another() {
    let mut session = memory_session();
    let first = session.active_id();
    session.editor_mut().set_identity("Name", "First");
    session.editor_mut().click_pip(GroupId::Skills, "Melee", 5);

    let second = session.create_tab(NewTabSeed::Blank).unwrap();
    assert!(session.materialize(second.token));
    session.editor_mut().set_identity("Name", "Second");

    let back = session.switch_tab(first).unwrap().unwrap();
    assert!(session.materialize(back));
    let doc = session.editor().read();
    assert_eq!(doc.identity_value("Name"), Some("First"));
    assert_eq!(doc.group(GroupId::Skills).unwrap().stat("Melee"), 5);

    let again = session.switch_tab(second.tab_id).unwrap().unwrap();
    assert!(session.materialize(again));
    let doc = session.editor().read();
    assert_eq!(doc.identity_value("Name"), Some("Second"));
    assert_eq!(doc.group(GroupId::Skills).unwrap().stat("Melee"), 0);
}

#[test]
fn closing_active_tab_activates_preceding_tab() {
    let mut session = memory_session();
    let first = session.active_id();
    let second = session.create_tab(NewTabSeed::Default).unwrap();
    session.materialize(second.token);
    let third = session.create_tab(NewTabSeed::Default).unwrap();
    session.materialize(third.token);

    let outcome = session.close_tab(third.tab_id).unwrap();
    let CloseOutcome::Closed { materialize: Some(token) } = outcome else {
        panic!("expected a materialization, got {outcome:?}");
    };
    assert_eq!(session.active_id(), second.tab_id);
    assert!(session.materialize(token));

    let outcome = session.close_tab(first).unwrap();
    assert_eq!(outcome, CloseOutcome::Closed { materialize: None });
    assert_eq!(session.tabs().len(), 1);
    assert_eq!(session.close_tab(second.tab_id).unwrap(), CloseOutcome::LastTab);
}

#[test]
fn import_tab_takes_title_from_identity_then_file_name() {
    let mut session = memory_session();
    let named = ImportFile::new("aria.json", r#"{"version": 2, "identity": {"Name": "Aria"}}"#);
    let unnamed = ImportFile::new("sheets/old-hero.json", r#"{"fields": []}"#);

    let first = session.import_tab(&named).unwrap();
    let second = session.import_tab(&unnamed).unwrap();

    let titles: Vec<String> = session.tabs().into_iter().map(|tab| tab.title).collect();
    assert_eq!(titles[1..], ["Aria".to_string(), "old-hero".to_string()]);
    assert_eq!(session.active_id(), second.tab_id);
    assert!(!session.materialize(first.token));
    assert!(session.materialize(second.token));
}

#[test]
fn broken_import_leaves_session_untouched() {
    let mut session = memory_session();
    let before = session.tabs();

    let err = session.import_tab(&ImportFile::new("x.json", "not json")).unwrap_err();

    assert!(matches!(err, SessionError::Import(_)));
    assert_eq!(session.tabs(), before);
}

#[test]
fn export_carries_relationships_of_the_active_tab() {
    let mut session = memory_session();
    let imported = session
        .import_relationships(
            &[ImportFile::new("mira.json", r#"{"identity": {"Name": "Mira"}}"#)],
            RelationKind::Family,
        )
        .unwrap();
    assert_eq!(imported, 1);
    let id = session.relationships().unwrap().entries(RelationKind::Family)[0].id;
    assert!(session.set_relationship_relation(id, "aunt").unwrap());
    assert!(session.select_relationship(RelationKind::Family, Some(id)).unwrap());

    let exported: Value = serde_json::from_str(&session.export_active().unwrap()).unwrap();

    assert_eq!(exported["version"], 2);
    assert_eq!(exported["relationships"]["family"][0]["name"], "Mira");
    assert_eq!(exported["relationships"]["family"][0]["relation"], "aunt");
    assert_eq!(exported["relationshipSelection"]["family"], id.to_string());

    // Re-importing the export restores relationships into the new tab.
    let raw = serde_json::to_string(&exported).unwrap();
    let reimport = session.import_tab(&ImportFile::new("character-sheet.json", raw)).unwrap();
    session.materialize(reimport.token);
    let registry = session.relationships().unwrap();
    assert_eq!(registry.selection(RelationKind::Family), Some(id));
}

#[test]
fn session_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.db");
    let (active, title) = {
        let mut session = file_session(&path);
        let tab = session.create_tab(NewTabSeed::Blank).unwrap();
        session.materialize(tab.token);
        session.editor_mut().set_identity("Name", "Kestrel");
        session.editor_mut().click_pip(GroupId::Priorities, "Faith", 3);
        session.rename_tab(tab.tab_id, "Kestrel").unwrap();
        session.save().unwrap();
        (tab.tab_id, "Kestrel".to_string())
    };

    let session = file_session(&path);

    assert_eq!(session.active_id(), active);
    let tabs = session.tabs();
    assert_eq!(tabs.len(), 2);
    assert_eq!(tabs[1].title, title);
    let doc = session.editor().read();
    assert_eq!(doc.identity_value("Name"), Some("Kestrel"));
    assert_eq!(doc.group(GroupId::Priorities).unwrap().stat("Faith"), 3);
    assert_eq!(doc.identity_value("Age"), Some(""));
}

#[test]
fn malformed_blob_starts_one_fresh_tab() {
    let repo = SqliteSessionRepository::new(open_db_in_memory().unwrap());
    let config = EngineConfig::default();
    repo.save_blob(&config.storage_key, "{ definitely not json").unwrap();

    let session = SheetSession::open(repo, FormSchema::standard(), config.clone()).unwrap();

    assert_eq!(session.tabs().len(), 1);
    assert_eq!(session.editor().read(), *session.editor().default_document());
    let stored = session.repository().load_blob(&config.storage_key).unwrap().unwrap();
    let stored: Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored["tabs"].as_array().unwrap().len(), 1);
}

//! FFI use-case API for the Flutter presentation layer.
//!
//! # Responsibility
//! - Expose the sheet session as sync, use-case-level calls via FRB.
//! - Serialize every call through one process-wide session slot.
//!
//! # Invariants
//! - Exported functions never panic across the FFI boundary.
//! - Failures are reported as messages inside envelopes, never as errors.
//! - The session opens lazily at the configured database path.

use charsheet_core::db::open_db;
use charsheet_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CloseOutcome, EditOutcome, EngineConfig, FormSchema, GroupControls, GroupId, ImportFile,
    MaterializeToken, NewTabSeed, RelationKind, RelationshipId, SheetEditor, SheetSession,
    SqliteSessionRepository, TabActivation, TabId, EXPORT_FILE_NAME,
};
use log::warn;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock, PoisonError};

const SESSION_DB_FILE_NAME: &str = "charsheet_session.sqlite3";
const DB_PATH_ENV: &str = "CHARSHEET_DB_PATH";

static SESSION_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static SESSION: Mutex<Option<SheetSession<SqliteSessionRepository>>> = Mutex::new(None);

type Session = SheetSession<SqliteSessionRepository>;

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Core crate version.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes core logging once per process.
///
/// Returns an empty string on success and the error message otherwise.
/// Repeating the same `level + log_dir` is a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Generic result envelope for sheet interactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetActionResponse {
    /// Whether the interaction changed state.
    pub ok: bool,
    /// Human-readable outcome for diagnostics/UI.
    pub message: String,
}

impl SheetActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Result envelope for calls that activate or close tabs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabActionResponse {
    pub ok: bool,
    /// Tab the call activated, if any.
    pub tab_id: Option<String>,
    /// Token to pass to `tab_materialize` at the next idle frame.
    pub materialize_token: Option<u64>,
    pub message: String,
}

impl TabActionResponse {
    fn activated(activation: TabActivation, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            tab_id: Some(activation.tab_id.to_string()),
            materialize_token: Some(activation.token.value()),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            tab_id: None,
            materialize_token: None,
            message: message.into(),
        }
    }
}

/// One row of the tab strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabItem {
    pub tab_id: String,
    pub title: String,
    pub active: bool,
}

/// Export payload handed to the platform save dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetExportResponse {
    pub ok: bool,
    pub file_name: String,
    /// Pretty JSON; empty on failure.
    pub json: String,
    pub message: String,
}

/// One already-read file offered for import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFileInput {
    pub file_name: String,
    pub contents: String,
}

/// Enable flags of one stat row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatControlItem {
    pub label: String,
    pub value: u8,
    /// One flag per pip, in pip order.
    pub pip_enabled: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitControlItem {
    pub label: String,
    pub checked: bool,
    pub enabled: bool,
}

/// Per-control enable/disable signals of one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetControlsResponse {
    pub ok: bool,
    /// `remaining/cap`, or points used when the group is unlimited.
    pub points_display: String,
    pub stats: Vec<StatControlItem>,
    pub traits: Vec<TraitControlItem>,
    pub message: String,
}

impl SheetControlsResponse {
    fn from_controls(controls: GroupControls) -> Self {
        Self {
            ok: true,
            points_display: controls.budget.display(),
            stats: controls
                .stats
                .into_iter()
                .map(|stat| StatControlItem {
                    label: stat.label,
                    value: stat.value,
                    pip_enabled: stat.enabled,
                })
                .collect(),
            traits: controls
                .traits
                .into_iter()
                .map(|flag| TraitControlItem {
                    label: flag.label,
                    checked: flag.checked,
                    enabled: flag.enabled,
                })
                .collect(),
            message: String::new(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            points_display: String::new(),
            stats: Vec::new(),
            traits: Vec::new(),
            message: message.into(),
        }
    }
}

/// One row of a relationship list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipItem {
    pub entry_id: String,
    pub name: String,
    pub relation: String,
    pub selected: bool,
}

/// Opens (or reopens) the session with optional engine config JSON.
///
/// An empty `config_json` uses the default caps and storage key.
#[flutter_rust_bridge::frb(sync)]
pub fn session_open(config_json: String) -> SheetActionResponse {
    let config = if config_json.trim().is_empty() {
        EngineConfig::default()
    } else {
        match EngineConfig::from_json_str(&config_json) {
            Ok(config) => config,
            Err(err) => return SheetActionResponse::failure(format!("session_open failed: {err}")),
        }
    };
    let mut slot = SESSION.lock().unwrap_or_else(PoisonError::into_inner);
    match open_session(config) {
        Ok(session) => {
            let tabs = session.tabs().len();
            *slot = Some(session);
            SheetActionResponse::success(format!("Session opened with {tabs} tab(s)."))
        }
        Err(err) => SheetActionResponse::failure(format!("session_open failed: {err}")),
    }
}

/// Full version-2 snapshot of the live sheet; empty string on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn sheet_document_json() -> String {
    with_session(|session| {
        let editor = session.editor();
        Ok(charsheet_core::to_snapshot(editor.document(), editor.schema()).to_string())
    })
    .unwrap_or_default()
}

/// Replaces the active sheet with a snapshot; empty JSON resets to default.
///
/// A pending tab materialization is redeemed first.
#[flutter_rust_bridge::frb(sync)]
pub fn sheet_apply_json(json: String) -> SheetActionResponse {
    let result = with_session(|session| {
        session
            .edit_active(|editor| {
                if json.trim().is_empty() {
                    editor.apply(None);
                    return Ok(());
                }
                let document = charsheet_core::parse_snapshot_str(&json, editor.schema(), editor.default_document())
                    .map_err(|err| err.to_string())?;
                editor.apply(Some(&document));
                Ok(())
            })
            .map_err(|err| err.to_string())?
    });
    match result {
        Ok(()) => SheetActionResponse::success("Sheet applied."),
        Err(err) => SheetActionResponse::failure(format!("sheet_apply_json failed: {err}")),
    }
}

/// Clicks pip `pip` (1-based) of `stat` in `group`.
#[flutter_rust_bridge::frb(sync)]
pub fn sheet_click_pip(group: String, stat: String, pip: u8) -> SheetActionResponse {
    edit_response("sheet_click_pip", &group, |editor, group| editor.click_pip(group, &stat, pip))
}

/// Flips one trait checkbox.
#[flutter_rust_bridge::frb(sync)]
pub fn sheet_toggle_trait(group: String, label: String) -> SheetActionResponse {
    edit_response("sheet_toggle_trait", &group, |editor, group| editor.toggle_trait(group, &label))
}

/// `remaining/cap` display of one group (points used when unlimited).
#[flutter_rust_bridge::frb(sync)]
pub fn sheet_points_remaining(group: String) -> String {
    let Some(group) = GroupId::parse(&group) else {
        return String::new();
    };
    with_session(|session| Ok(session.editor().remaining_display(group).unwrap_or_default()))
        .unwrap_or_default()
}

/// Enable flags for every pip and trait of `group`.
#[flutter_rust_bridge::frb(sync)]
pub fn sheet_controls(group: String) -> SheetControlsResponse {
    let Some(group_id) = GroupId::parse(&group) else {
        return SheetControlsResponse::failure(format!("sheet_controls failed: unknown group `{group}`"));
    };
    match with_session(|session| Ok(session.editor().controls(group_id))) {
        Ok(Some(controls)) => SheetControlsResponse::from_controls(controls),
        Ok(None) => SheetControlsResponse::failure(format!("sheet_controls failed: group `{group}` is not on this form")),
        Err(err) => SheetControlsResponse::failure(format!("sheet_controls failed: {err}")),
    }
}

/// Resets the active sheet to the default (or blank) document.
#[flutter_rust_bridge::frb(sync)]
pub fn sheet_reset(blank: bool) -> SheetActionResponse {
    let seed = if blank { NewTabSeed::Blank } else { NewTabSeed::Default };
    match with_session(|session| session.reset_active(seed).map_err(|err| err.to_string())) {
        Ok(()) => SheetActionResponse::success("Sheet reset."),
        Err(err) => SheetActionResponse::failure(format!("sheet_reset failed: {err}")),
    }
}

/// Tabs in strip order; empty on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn tab_list() -> Vec<TabItem> {
    with_session(|session| {
        Ok(session
            .tabs()
            .into_iter()
            .map(|tab| TabItem {
                tab_id: tab.id.to_string(),
                title: tab.title,
                active: tab.active,
            })
            .collect())
    })
    .unwrap_or_default()
}

/// Creates and activates a new tab.
#[flutter_rust_bridge::frb(sync)]
pub fn tab_create(blank: bool) -> TabActionResponse {
    let seed = if blank { NewTabSeed::Blank } else { NewTabSeed::Default };
    match with_session(|session| session.create_tab(seed).map_err(|err| err.to_string())) {
        Ok(activation) => TabActionResponse::activated(activation, "Tab created."),
        Err(err) => TabActionResponse::failure(format!("tab_create failed: {err}")),
    }
}

/// Points the session at `tab_id`; materialize with the returned token.
#[flutter_rust_bridge::frb(sync)]
pub fn tab_switch(tab_id: String) -> TabActionResponse {
    let Some(id) = parse_tab_id(&tab_id) else {
        return TabActionResponse::failure(format!("tab_switch failed: invalid tab id `{tab_id}`"));
    };
    match with_session(|session| session.switch_tab(id).map_err(|err| err.to_string())) {
        Ok(Some(token)) => TabActionResponse::activated(TabActivation { tab_id: id, token }, "Tab switched."),
        Ok(None) => TabActionResponse {
            ok: true,
            tab_id: Some(id.to_string()),
            materialize_token: None,
            message: "Nothing to switch.".to_string(),
        },
        Err(err) => TabActionResponse::failure(format!("tab_switch failed: {err}")),
    }
}

/// Redeems a materialization token; `false` for stale tokens.
#[flutter_rust_bridge::frb(sync)]
pub fn tab_materialize(token: u64) -> bool {
    with_session(|session| Ok(session.materialize(MaterializeToken::from_value(token)))).unwrap_or(false)
}

/// Closes one tab; the last tab is refused.
#[flutter_rust_bridge::frb(sync)]
pub fn tab_close(tab_id: String) -> TabActionResponse {
    let Some(id) = parse_tab_id(&tab_id) else {
        return TabActionResponse::failure(format!("tab_close failed: invalid tab id `{tab_id}`"));
    };
    let result = with_session(|session| {
        let outcome = session.close_tab(id).map_err(|err| err.to_string())?;
        Ok((outcome, session.active_id()))
    });
    match result {
        Ok((CloseOutcome::Closed { materialize }, active)) => TabActionResponse {
            ok: true,
            tab_id: Some(active.to_string()),
            materialize_token: materialize.map(MaterializeToken::value),
            message: "Tab closed.".to_string(),
        },
        Ok((CloseOutcome::LastTab, _)) => TabActionResponse::failure("The last tab cannot be closed."),
        Ok((CloseOutcome::NotFound, _)) => TabActionResponse::failure(format!("Unknown tab `{tab_id}`.")),
        Err(err) => TabActionResponse::failure(format!("tab_close failed: {err}")),
    }
}

/// Imports a sheet file into a new active tab.
#[flutter_rust_bridge::frb(sync)]
pub fn tab_import(file_name: String, contents: String) -> TabActionResponse {
    let file = ImportFile::new(file_name, contents);
    match with_session(|session| session.import_tab(&file).map_err(|err| err.to_string())) {
        Ok(activation) => TabActionResponse::activated(activation, "Sheet imported."),
        Err(err) => TabActionResponse::failure(format!("tab_import failed: {err}")),
    }
}

/// Commits and exports the active sheet with its relationships.
#[flutter_rust_bridge::frb(sync)]
pub fn sheet_export() -> SheetExportResponse {
    match with_session(|session| session.export_active().map_err(|err| err.to_string())) {
        Ok(json) => SheetExportResponse {
            ok: true,
            file_name: EXPORT_FILE_NAME.to_string(),
            json,
            message: "Sheet exported.".to_string(),
        },
        Err(err) => SheetExportResponse {
            ok: false,
            file_name: EXPORT_FILE_NAME.to_string(),
            json: String::new(),
            message: format!("sheet_export failed: {err}"),
        },
    }
}

/// Imports relationship references of `kind` into the active tab.
///
/// Unparseable files are skipped; the message reports how many were kept.
#[flutter_rust_bridge::frb(sync)]
pub fn relationship_import(kind: String, files: Vec<ImportFileInput>) -> SheetActionResponse {
    let Some(kind) = RelationKind::parse(&kind) else {
        return SheetActionResponse::failure(format!("relationship_import failed: unknown kind `{kind}`"));
    };
    let files: Vec<ImportFile> = files
        .into_iter()
        .map(|file| ImportFile::new(file.file_name, file.contents))
        .collect();
    let offered = files.len();
    match with_session(|session| session.import_relationships(&files, kind).map_err(|err| err.to_string())) {
        Ok(imported) => SheetActionResponse {
            ok: imported > 0,
            message: format!("Imported {imported} of {offered} file(s)."),
        },
        Err(err) => SheetActionResponse::failure(format!("relationship_import failed: {err}")),
    }
}

/// Entries of one relationship list of the active tab; empty on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn relationship_list(kind: String) -> Vec<RelationshipItem> {
    let Some(kind) = RelationKind::parse(&kind) else {
        return Vec::new();
    };
    with_session(|session| {
        let Some(registry) = session.relationships() else {
            return Ok(Vec::new());
        };
        let selected = registry.selection(kind);
        Ok(registry
            .entries(kind)
            .iter()
            .map(|entry| RelationshipItem {
                entry_id: entry.id.to_string(),
                name: entry.name.clone(),
                relation: entry.relation.clone(),
                selected: selected == Some(entry.id),
            })
            .collect())
    })
    .unwrap_or_default()
}

/// Selects one entry of `kind`; an empty `entry_id` clears the selection.
#[flutter_rust_bridge::frb(sync)]
pub fn relationship_select(kind: String, entry_id: String) -> SheetActionResponse {
    let Some(kind) = RelationKind::parse(&kind) else {
        return SheetActionResponse::failure(format!("relationship_select failed: unknown kind `{kind}`"));
    };
    let id = if entry_id.trim().is_empty() {
        None
    } else {
        match parse_entry_id(&entry_id) {
            Some(id) => Some(id),
            None => {
                return SheetActionResponse::failure(format!(
                    "relationship_select failed: invalid entry id `{entry_id}`"
                ))
            }
        }
    };
    registry_response("relationship_select", |session| session.select_relationship(kind, id))
}

/// Removes one entry of `kind` from the active tab.
#[flutter_rust_bridge::frb(sync)]
pub fn relationship_remove(kind: String, entry_id: String) -> SheetActionResponse {
    let Some(kind) = RelationKind::parse(&kind) else {
        return SheetActionResponse::failure(format!("relationship_remove failed: unknown kind `{kind}`"));
    };
    let Some(id) = parse_entry_id(&entry_id) else {
        return SheetActionResponse::failure(format!("relationship_remove failed: invalid entry id `{entry_id}`"));
    };
    registry_response("relationship_remove", |session| session.remove_relationship(kind, id))
}

/// Sets the free-text relation of a family entry.
#[flutter_rust_bridge::frb(sync)]
pub fn relationship_set_relation(entry_id: String, relation: String) -> SheetActionResponse {
    let Some(id) = parse_entry_id(&entry_id) else {
        return SheetActionResponse::failure(format!(
            "relationship_set_relation failed: invalid entry id `{entry_id}`"
        ));
    };
    registry_response("relationship_set_relation", |session| {
        session.set_relationship_relation(id, &relation)
    })
}

fn registry_response(
    operation: &str,
    update: impl FnOnce(&mut Session) -> charsheet_core::SessionResult<bool>,
) -> SheetActionResponse {
    match with_session(|session| update(session).map_err(|err| err.to_string())) {
        Ok(true) => SheetActionResponse::success("Updated."),
        Ok(false) => SheetActionResponse::failure("Unchanged."),
        Err(err) => SheetActionResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn edit_response(
    operation: &str,
    group: &str,
    edit: impl FnOnce(&mut SheetEditor, GroupId) -> EditOutcome,
) -> SheetActionResponse {
    let Some(group_id) = GroupId::parse(group) else {
        return SheetActionResponse::failure(format!("{operation} failed: unknown group `{group}`"));
    };
    let result = with_session(|session| {
        session
            .edit_active(|editor| edit(editor, group_id))
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(EditOutcome::Applied) => SheetActionResponse::success("Updated."),
        Ok(EditOutcome::Unchanged) => SheetActionResponse::failure("Unchanged."),
        Ok(EditOutcome::Rejected(reason)) => {
            SheetActionResponse::failure(format!("{operation} rejected: {reason:?}"))
        }
        Err(err) => SheetActionResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn parse_tab_id(raw: &str) -> Option<TabId> {
    TabId::parse_str(raw.trim()).ok()
}

fn parse_entry_id(raw: &str) -> Option<RelationshipId> {
    RelationshipId::parse_str(raw.trim()).ok()
}

fn resolve_session_db_path() -> PathBuf {
    SESSION_DB_PATH
        .get_or_init(|| {
            std::env::var(DB_PATH_ENV)
                .ok()
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(SESSION_DB_FILE_NAME))
        })
        .clone()
}

fn open_session(config: EngineConfig) -> Result<Session, String> {
    let db_path = resolve_session_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("session DB open failed: {err}"))?;
    SheetSession::open(SqliteSessionRepository::new(conn), FormSchema::standard(), config)
        .map_err(|err| err.to_string())
}

/// Runs `f` against the process-wide session, opening it on first use.
fn with_session<T>(f: impl FnOnce(&mut Session) -> Result<T, String>) -> Result<T, String> {
    let mut slot = SESSION.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
        *slot = Some(open_session(EngineConfig::default()).map_err(|err| {
            warn!("event=session_open module=ffi status=error error={err}");
            err
        })?);
    }
    match slot.as_mut() {
        Some(session) => f(session),
        None => Err("session unavailable".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, init_logging, ping, relationship_import, relationship_list,
        relationship_remove, relationship_select, relationship_set_relation, sheet_click_pip,
        sheet_controls, sheet_document_json, sheet_export, sheet_points_remaining, tab_close,
        tab_create, tab_list, tab_materialize, tab_switch, ImportFileInput, DB_PATH_ENV,
    };
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_bad_input() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
        assert!(!init_logging("verbose".to_string(), "/tmp/logs".to_string()).is_empty());
    }

    #[test]
    fn unknown_group_and_kind_are_reported() {
        let response = sheet_click_pip("luck".to_string(), "Strength".to_string(), 1);
        assert!(!response.ok);
        assert!(response.message.contains("unknown group"));
        assert!(sheet_points_remaining("luck".to_string()).is_empty());
        assert!(!relationship_import("rivals".to_string(), Vec::new()).ok);
        assert!(!tab_switch("not-a-uuid".to_string()).ok);
        assert!(!sheet_controls("luck".to_string()).ok);
        assert!(relationship_list("rivals".to_string()).is_empty());
        assert!(!relationship_remove("friends".to_string(), "not-a-uuid".to_string()).ok);
        assert!(!relationship_select("rivals".to_string(), String::new()).ok);
        assert!(!relationship_set_relation("not-a-uuid".to_string(), "aunt".to_string()).ok);
    }

    #[test]
    fn tab_flow_round_trips_through_the_session_slot() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        std::env::set_var(
            DB_PATH_ENV,
            std::env::temp_dir().join(format!("charsheet-ffi-{nanos}.sqlite3")),
        );

        let created = tab_create(true);
        assert!(created.ok, "{}", created.message);
        let tab_id = created.tab_id.expect("tab id");

        // Editing before the token is redeemed still targets the new blank tab.
        let click = sheet_click_pip("body".to_string(), "Strength".to_string(), 4);
        assert!(click.ok, "{}", click.message);
        assert!(!tab_materialize(created.materialize_token.expect("token")));
        assert_eq!(sheet_points_remaining("body".to_string()), "16/20");
        assert!(sheet_document_json().contains("\"Strength\":4"));

        let controls = sheet_controls("body".to_string());
        assert!(controls.ok, "{}", controls.message);
        assert_eq!(controls.points_display, "16/20");
        let strength = controls
            .stats
            .iter()
            .find(|stat| stat.label == "Strength")
            .expect("strength row");
        assert_eq!(strength.value, 4);
        assert!(strength.pip_enabled.iter().all(|enabled| *enabled));

        let imported = relationship_import(
            "friends".to_string(),
            vec![ImportFileInput {
                file_name: "pell.json".to_string(),
                contents: r#"{"identity": {"Name": "Pell"}}"#.to_string(),
            }],
        );
        assert!(imported.ok, "{}", imported.message);
        let friends = relationship_list("friends".to_string());
        assert_eq!(friends.len(), 1);
        let pell = friends[0].entry_id.clone();
        assert!(relationship_select("friends".to_string(), pell.clone()).ok);
        assert!(relationship_list("friends".to_string())[0].selected);
        // Relations only apply to family entries.
        assert!(!relationship_set_relation(pell.clone(), "cousin".to_string()).ok);

        let export = sheet_export();
        assert!(export.ok, "{}", export.message);
        assert_eq!(export.file_name, "character-sheet.json");
        assert!(export.json.contains("Pell"));
        assert!(relationship_remove("friends".to_string(), pell).ok);
        assert!(relationship_list("friends".to_string()).is_empty());

        assert!(tab_list().iter().any(|tab| tab.tab_id == tab_id && tab.active));
        let closed = tab_close(tab_id);
        assert!(closed.ok, "{}", closed.message);
        assert!(tab_materialize(closed.materialize_token.expect("token")));
    }
}

//! Multi-tab sheet session.
//!
//! # Responsibility
//! - Own the tab list, the active pointer and the live editor.
//! - Commit the live editor into its tab before the pointer moves.
//! - Defer materialization of the newly active tab behind a token.
//! - Persist the tab set through a `SessionRepository` after every change.
//!
//! # Invariants
//! - There is always at least one tab and `active_id` names one of them.
//! - At most one materialization is pending; a newer switch supersedes it.
//! - While a materialization is pending the editor still holds the previous
//!   tab's committed state and is committed nowhere.
//! - Unknown tab ids are no-ops.

use crate::codec::import::{parse_sheet, ImportFile};
use crate::codec::relationships::encode_registry;
use crate::codec::session_blob::{decode_session, encode_session, DEFAULT_TAB_TITLE};
use crate::codec::snapshot::to_snapshot;
use crate::codec::SnapshotError;
use crate::config::EngineConfig;
use crate::model::relationship::{RelationKind, RelationshipId};
use crate::model::schema::FormSchema;
use crate::model::tab::{Tab, TabDocument, TabId, TabSummary};
use crate::repo::session_repo::{RepoError, SessionRepository};
use crate::service::relationship_registry::RelationshipRegistry;
use crate::service::sheet_editor::SheetEditor;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Suggested file name for exported sheets.
pub const EXPORT_FILE_NAME: &str = "character-sheet.json";

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug)]
pub enum SessionError {
    Repo(RepoError),
    /// An imported file could not be parsed; session state is unchanged.
    Import(SnapshotError),
    Encode(serde_json::Error),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "session store failure: {err}"),
            Self::Import(err) => write!(f, "import failed: {err}"),
            Self::Encode(err) => write!(f, "export encoding failed: {err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Import(err) => Some(err),
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Handle for one deferred materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterializeToken(u64);

impl MaterializeToken {
    pub fn value(self) -> u64 {
        self.0
    }

    pub fn from_value(value: u64) -> Self {
        Self(value)
    }
}

/// Initial document of a newly created tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewTabSeed {
    #[default]
    Default,
    Blank,
}

/// Newly activated tab and the token that materializes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabActivation {
    pub tab_id: TabId,
    pub token: MaterializeToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// `materialize` is set when the active tab was closed.
    Closed { materialize: Option<MaterializeToken> },
    LastTab,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingMaterialize {
    token: MaterializeToken,
    tab_id: TabId,
}

/// Tabs, active pointer and live editor bound to one session store.
pub struct SheetSession<R: SessionRepository> {
    repo: R,
    config: EngineConfig,
    editor: SheetEditor,
    tabs: Vec<Tab>,
    active_id: TabId,
    pending: Option<PendingMaterialize>,
    next_token: u64,
}

impl<R: SessionRepository> SheetSession<R> {
    /// Restores the persisted session, or starts one default tab.
    ///
    /// The active tab is materialized immediately and the normalized blob is
    /// written back.
    pub fn open(repo: R, schema: Arc<FormSchema>, config: EngineConfig) -> SessionResult<Self> {
        let editor = SheetEditor::new(schema, config.caps.clone());
        let blob = match repo.load_blob(&config.storage_key)? {
            Some(raw) => decode_session(
                &raw,
                editor.schema(),
                editor.default_document(),
                config.relationship_cap,
            ),
            None => Default::default(),
        };

        let mut tabs = blob.tabs;
        if tabs.is_empty() {
            tabs.push(Tab::new(DEFAULT_TAB_TITLE, TabDocument::Unset, config.relationship_cap));
        }
        let active_id = blob.active_id.unwrap_or(tabs[0].id);

        let mut session = Self {
            repo,
            config,
            editor,
            tabs,
            active_id,
            pending: None,
            next_token: 0,
        };
        session.load_into_editor(active_id);
        session.persist()?;
        info!(
            "event=session_load module=session status=ok tabs={} active={}",
            session.tabs.len(),
            session.active_id
        );
        Ok(session)
    }

    pub fn editor(&self) -> &SheetEditor {
        &self.editor
    }

    /// Live editor; edits made while a materialization is pending are
    /// discarded when it is redeemed.
    pub fn editor_mut(&mut self) -> &mut SheetEditor {
        &mut self.editor
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn active_id(&self) -> TabId {
        self.active_id
    }

    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn tabs(&self) -> Vec<TabSummary> {
        self.tabs
            .iter()
            .map(|tab| TabSummary {
                id: tab.id,
                title: tab.title.clone(),
                active: tab.id == self.active_id,
            })
            .collect()
    }

    pub fn pending_token(&self) -> Option<MaterializeToken> {
        self.pending.map(|pending| pending.token)
    }

    /// Writes the live editor into the active tab.
    ///
    /// Returns `false` while a materialization is pending.
    pub fn commit_active(&mut self) -> bool {
        if self.pending.is_some() {
            return false;
        }
        let document = self.editor.read();
        let Some(tab) = self.active_tab_mut() else {
            return false;
        };
        tab.document = TabDocument::Committed(document);
        true
    }

    /// Commits and persists the active tab.
    pub fn save(&mut self) -> SessionResult<()> {
        self.commit_active();
        self.persist()
    }

    /// Runs `edit` on the active tab's sheet and saves it.
    ///
    /// A pending materialization is redeemed first, so the edit lands on the
    /// tab the pointer names rather than on the previous tab's leftovers.
    pub fn edit_active<T>(&mut self, edit: impl FnOnce(&mut SheetEditor) -> T) -> SessionResult<T> {
        self.materialize_pending();
        let outcome = edit(&mut self.editor);
        self.save()?;
        Ok(outcome)
    }

    /// Appends a new tab and makes it active.
    pub fn create_tab(&mut self, seed: NewTabSeed) -> SessionResult<TabActivation> {
        let document = match seed {
            NewTabSeed::Default => TabDocument::Committed(self.editor.default_document().clone()),
            NewTabSeed::Blank => TabDocument::Blank,
        };
        let tab = Tab::new(DEFAULT_TAB_TITLE, document, self.config.relationship_cap);
        self.push_and_activate(tab)
    }

    /// Commits the current tab and points at `id`.
    ///
    /// Returns the token to redeem at the next idle point, or `None` when
    /// `id` is unknown or already active with nothing pending.
    pub fn switch_tab(&mut self, id: TabId) -> SessionResult<Option<MaterializeToken>> {
        if self.tab(id).is_none() {
            warn!("event=tab_switch module=session status=ignored reason=unknown_tab tab={id}");
            return Ok(None);
        }
        if id == self.active_id && self.pending.is_none() {
            return Ok(None);
        }
        self.commit_active();
        self.active_id = id;
        let token = self.schedule(id);
        self.persist()?;
        info!(
            "event=tab_switch module=session status=ok tab={} token={}",
            id,
            token.value()
        );
        Ok(Some(token))
    }

    /// Loads the tab behind `token` into the editor.
    ///
    /// Stale (superseded) tokens return `false` and change nothing.
    pub fn materialize(&mut self, token: MaterializeToken) -> bool {
        match self.pending {
            Some(pending) if pending.token == token => {
                self.pending = None;
                self.load_into_editor(pending.tab_id);
                true
            }
            _ => {
                info!(
                    "event=tab_materialize module=session status=stale token={}",
                    token.value()
                );
                false
            }
        }
    }

    /// Redeems whatever materialization is pending.
    pub fn materialize_pending(&mut self) -> bool {
        match self.pending {
            Some(pending) => self.materialize(pending.token),
            None => false,
        }
    }

    /// Closes one tab; the last remaining tab cannot be closed.
    ///
    /// Closing the active tab activates the preceding tab (or the first).
    pub fn close_tab(&mut self, id: TabId) -> SessionResult<CloseOutcome> {
        let Some(index) = self.tabs.iter().position(|tab| tab.id == id) else {
            return Ok(CloseOutcome::NotFound);
        };
        if self.tabs.len() == 1 {
            return Ok(CloseOutcome::LastTab);
        }

        let materialize = if id == self.active_id {
            self.pending = None;
            self.tabs.remove(index);
            let next = self.tabs[index.saturating_sub(1)].id;
            self.active_id = next;
            Some(self.schedule(next))
        } else {
            self.commit_active();
            self.tabs.remove(index);
            None
        };
        self.persist()?;
        info!(
            "event=tab_close module=session status=ok tab={} remaining={}",
            id,
            self.tabs.len()
        );
        Ok(CloseOutcome::Closed { materialize })
    }

    /// Parses `file` into a new tab and switches to it.
    ///
    /// A parse failure leaves the session untouched.
    pub fn import_tab(&mut self, file: &ImportFile) -> SessionResult<TabActivation> {
        let imported = parse_sheet(
            file,
            self.editor.schema(),
            self.editor.default_document(),
            self.config.relationship_cap,
        )
        .map_err(|err| {
            warn!(
                "event=tab_import module=session status=error file={} error={}",
                file.file_name, err
            );
            SessionError::Import(err)
        })?;

        let mut tab = Tab::new(
            imported.title,
            TabDocument::Committed(imported.document),
            self.config.relationship_cap,
        );
        if let Some(relationships) = imported.relationships {
            tab.relationships = relationships;
        }
        self.push_and_activate(tab)
    }

    /// Commits and returns the active sheet as pretty export JSON.
    ///
    /// A pending materialization is redeemed first.
    pub fn export_active(&mut self) -> SessionResult<String> {
        self.materialize_pending();
        self.commit_active();
        let mut snapshot = to_snapshot(self.editor.document(), self.editor.schema());
        if let (Some(root), Some(tab)) = (snapshot.as_object_mut(), self.active_tab()) {
            let (relationships, selection) = encode_registry(&tab.relationships);
            root.insert("relationships".to_string(), relationships);
            root.insert("relationshipSelection".to_string(), selection);
        }
        self.persist()?;
        serde_json::to_string_pretty(&snapshot).map_err(SessionError::Encode)
    }

    /// Renames one tab; blank titles are refused.
    pub fn rename_tab(&mut self, id: TabId, title: &str) -> SessionResult<bool> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(false);
        }
        let Some(tab) = self.tabs.iter_mut().find(|tab| tab.id == id) else {
            return Ok(false);
        };
        tab.title = title.to_string();
        self.persist()?;
        Ok(true)
    }

    /// Resets the active sheet to the default or blank document.
    pub fn reset_active(&mut self, seed: NewTabSeed) -> SessionResult<()> {
        self.materialize_pending();
        match seed {
            NewTabSeed::Default => self.editor.reset_to_default(),
            NewTabSeed::Blank => self.editor.reset_to_blank(),
        }
        self.save()
    }

    /// Registry of the active tab.
    pub fn relationships(&self) -> Option<&RelationshipRegistry> {
        self.active_tab().map(|tab| &tab.relationships)
    }

    /// Imports relationship references into the active tab.
    pub fn import_relationships(&mut self, files: &[ImportFile], kind: RelationKind) -> SessionResult<usize> {
        let schema = Arc::clone(self.editor.schema());
        let imported = match self.active_tab_mut() {
            Some(tab) => tab.relationships.import_entries(files, kind, &schema),
            None => 0,
        };
        if imported > 0 {
            self.persist()?;
        }
        Ok(imported)
    }

    pub fn select_relationship(&mut self, kind: RelationKind, id: Option<RelationshipId>) -> SessionResult<bool> {
        self.update_relationships(|registry| registry.select(kind, id))
    }

    pub fn remove_relationship(&mut self, kind: RelationKind, id: RelationshipId) -> SessionResult<bool> {
        self.update_relationships(|registry| registry.remove(kind, id))
    }

    pub fn set_relationship_relation(&mut self, id: RelationshipId, relation: &str) -> SessionResult<bool> {
        self.update_relationships(|registry| registry.set_relation(id, relation))
    }

    pub fn reset_relationships(&mut self) -> SessionResult<()> {
        self.update_relationships(|registry| {
            registry.reset();
            true
        })?;
        Ok(())
    }

    /// Writes the tab set to the session store.
    pub fn persist(&self) -> SessionResult<()> {
        let blob = encode_session(
            &self.tabs,
            Some(self.active_id),
            self.editor.schema(),
            self.editor.default_document(),
        );
        let raw = blob.to_string();
        if let Err(err) = self.repo.save_blob(&self.config.storage_key, &raw) {
            warn!("event=session_save module=session status=error error={err}");
            return Err(err.into());
        }
        Ok(())
    }

    fn update_relationships(&mut self, apply: impl FnOnce(&mut RelationshipRegistry) -> bool) -> SessionResult<bool> {
        let changed = match self.active_tab_mut() {
            Some(tab) => apply(&mut tab.relationships),
            None => false,
        };
        if changed {
            self.persist()?;
        }
        Ok(changed)
    }

    fn push_and_activate(&mut self, tab: Tab) -> SessionResult<TabActivation> {
        self.commit_active();
        let tab_id = tab.id;
        self.tabs.push(tab);
        self.active_id = tab_id;
        let token = self.schedule(tab_id);
        self.persist()?;
        info!(
            "event=tab_open module=session status=ok tab={} tabs={}",
            tab_id,
            self.tabs.len()
        );
        Ok(TabActivation { tab_id, token })
    }

    fn schedule(&mut self, tab_id: TabId) -> MaterializeToken {
        self.next_token += 1;
        let token = MaterializeToken(self.next_token);
        self.pending = Some(PendingMaterialize { token, tab_id });
        token
    }

    /// Applies a tab's stored document to the editor, resolving markers.
    fn load_into_editor(&mut self, tab_id: TabId) {
        let Some(index) = self.tabs.iter().position(|tab| tab.id == tab_id) else {
            return;
        };
        match &self.tabs[index].document {
            TabDocument::Committed(document) => {
                let document = document.clone();
                self.editor.apply(Some(&document));
            }
            TabDocument::Blank => self.editor.reset_to_blank(),
            TabDocument::Unset => self.editor.reset_to_default(),
        }
        self.tabs[index].document = TabDocument::Committed(self.editor.read());
    }

    fn active_tab(&self) -> Option<&Tab> {
        self.tab(self.active_id)
    }

    fn active_tab_mut(&mut self) -> Option<&mut Tab> {
        let active_id = self.active_id;
        self.tabs.iter_mut().find(|tab| tab.id == active_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{CloseOutcome, NewTabSeed, SheetSession};
    use crate::config::EngineConfig;
    use crate::db::open_db_in_memory;
    use crate::model::schema::{FormSchema, GroupId};
    use crate::model::tab::TabDocument;
    use crate::repo::session_repo::SqliteSessionRepository;
    use crate::service::sheet_editor::EditOutcome;

    fn session() -> SheetSession<SqliteSessionRepository> {
        let repo = SqliteSessionRepository::new(open_db_in_memory().unwrap());
        SheetSession::open(repo, FormSchema::standard(), EngineConfig::default()).unwrap()
    }

    #[test]
    fn fresh_session_has_one_default_tab() {
        let session = session();
        let tabs = session.tabs();
        assert_eq!(tabs.len(), 1);
        assert!(tabs[0].active);
        assert_eq!(session.editor().read(), *session.editor().default_document());
    }

    #[test]
    fn newer_switch_supersedes_pending_token() {
        let mut session = session();
        let first = session.tabs()[0].id;
        let blank = session.create_tab(NewTabSeed::Blank).unwrap();
        let stale = session.switch_tab(first).unwrap().unwrap();
        let fresh = session.switch_tab(blank.tab_id).unwrap().unwrap();

        assert!(!session.materialize(stale));
        assert!(!session.materialize(blank.token));
        assert!(session.materialize(fresh));
        assert_eq!(session.editor().read(), *session.editor().blank_document());
    }

    #[test]
    fn editor_is_not_committed_while_materialization_is_pending() {
        let mut session = session();
        let first = session.active_id();
        let second = session.create_tab(NewTabSeed::Default).unwrap();
        // Editor still shows the first tab until the token is redeemed.
        session.editor_mut().click_pip(GroupId::Body, "Strength", 6);
        assert!(!session.commit_active());

        assert!(session.materialize(second.token));
        session.switch_tab(first).unwrap();
        assert!(session.materialize_pending());
        assert_eq!(session.editor().document().group(GroupId::Body).unwrap().stat("Strength"), 1);
    }

    #[test]
    fn edit_active_lands_in_the_newly_created_tab() {
        let mut session = session();
        let created = session.create_tab(NewTabSeed::Default).unwrap();

        let outcome = session
            .edit_active(|editor| editor.set_identity("Name", "Applied"))
            .unwrap();

        assert_eq!(outcome, EditOutcome::Applied);
        assert_eq!(session.pending_token(), None);
        assert!(!session.materialize(created.token));
        assert_eq!(session.editor().document().identity_value("Name"), Some("Applied"));
        let TabDocument::Committed(stored) = &session.tab(created.tab_id).unwrap().document else {
            panic!("created tab should be committed");
        };
        assert_eq!(stored.identity_value("Name"), Some("Applied"));
    }

    #[test]
    fn closing_last_tab_is_refused() {
        let mut session = session();
        let only = session.active_id();
        assert_eq!(session.close_tab(only).unwrap(), CloseOutcome::LastTab);
        assert_eq!(session.close_tab(uuid::Uuid::new_v4()).unwrap(), CloseOutcome::NotFound);
    }

    #[test]
    fn rename_refuses_blank_titles() {
        let mut session = session();
        let id = session.active_id();
        assert!(!session.rename_tab(id, "   ").unwrap());
        assert!(session.rename_tab(id, " Hero ").unwrap());
        assert_eq!(session.tabs()[0].title, "Hero");
    }
}

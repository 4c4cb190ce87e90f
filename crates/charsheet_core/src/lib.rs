//! Character sheet state and allocation engine.
//!
//! Owns the sheet document, points-budget rules, snapshot codecs and the
//! multi-tab session. Presentation layers talk to it through `charsheet_ffi`.

pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use codec::import::{ImportFile, ImportedSheet};
pub use codec::snapshot::{from_snapshot, parse_snapshot_str, to_diff_snapshot, to_snapshot};
pub use codec::{SnapshotError, SnapshotResult};
pub use config::{BudgetCaps, ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::document::{Document, GroupValues, Note, Portrait, PortraitError};
pub use model::dot_grid::DotGrid;
pub use model::relationship::{RelationKind, RelationshipEntry, RelationshipId};
pub use model::schema::{FormSchema, GroupDef, GroupId};
pub use model::tab::{Tab, TabDocument, TabId, TabSummary};
pub use repo::session_repo::{RepoError, RepoResult, SessionRepository, SqliteSessionRepository};
pub use service::budget::{BudgetEnforcer, GroupBudget, GroupControls};
pub use service::relationship_registry::RelationshipRegistry;
pub use service::session_service::{
    CloseOutcome, MaterializeToken, NewTabSeed, SessionError, SessionResult, SheetSession,
    TabActivation, EXPORT_FILE_NAME,
};
pub use service::sheet_editor::{EditOutcome, Rejection, SheetEditor, SheetEvent};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

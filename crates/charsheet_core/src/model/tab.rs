//! Session tab model.
//!
//! # Invariants
//! - A tab owns its document copy and relationship registry exclusively.
//! - `TabDocument::Blank` is resolved to a fresh blank document only when
//!   the tab is materialized.

use crate::model::document::Document;
use crate::service::relationship_registry::RelationshipRegistry;
use uuid::Uuid;

/// Stable identifier of one tab.
pub type TabId = Uuid;

/// Stored document slot of a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabDocument {
    /// Authoritative committed snapshot.
    Committed(Document),
    /// Materialize the canonical blank document on activation.
    Blank,
    /// No data yet; materialize the default document on activation.
    Unset,
}

/// One independently editable sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: TabId,
    pub title: String,
    pub document: TabDocument,
    pub relationships: RelationshipRegistry,
}

impl Tab {
    pub fn new(title: impl Into<String>, document: TabDocument, relationship_cap: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            document,
            relationships: RelationshipRegistry::new(relationship_cap),
        }
    }
}

/// Read-only tab projection for tab strips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSummary {
    pub id: TabId,
    pub title: String,
    pub active: bool,
}

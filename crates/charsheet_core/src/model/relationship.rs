//! Relationship entry model.
//!
//! # Invariants
//! - `id` is generated on import and never reused.
//! - `relation` is only meaningful for `RelationKind::Family`.

use crate::model::document::Portrait;
use serde::Serialize;
use uuid::Uuid;

/// Stable identifier of one relationship entry.
pub type RelationshipId = Uuid;

/// Relationship list kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelationKind {
    Family,
    Friends,
    Love,
    Hate,
}

impl RelationKind {
    pub const ALL: [RelationKind; 4] = [
        RelationKind::Family,
        RelationKind::Friends,
        RelationKind::Love,
        RelationKind::Hate,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::Friends => "friends",
            Self::Love => "love",
            Self::Hate => "hate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "family" => Some(Self::Family),
            "friends" => Some(Self::Friends),
            "love" => Some(Self::Love),
            "hate" => Some(Self::Hate),
            _ => None,
        }
    }
}

/// Lightweight cross-reference to another character sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipEntry {
    pub id: RelationshipId,
    pub name: String,
    pub portrait: Option<Portrait>,
    /// Free-text relation (e.g. "sister"); family entries only.
    pub relation: String,
    /// File the entry was imported from, kept for diagnostics.
    pub source_file: String,
    /// Import time in epoch milliseconds.
    pub added_at: i64,
}

impl RelationshipEntry {
    /// Creates an entry with a generated id.
    pub fn new(
        name: impl Into<String>,
        portrait: Option<Portrait>,
        source_file: impl Into<String>,
        added_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            portrait,
            relation: String::new(),
            source_file: source_file.into(),
            added_at,
        }
    }
}

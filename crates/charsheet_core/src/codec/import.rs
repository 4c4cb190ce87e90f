//! Imported file parsing: full sheets and relationship references.

use crate::codec::relationships::decode_registry;
use crate::codec::snapshot::{decode_portrait, from_snapshot};
use crate::codec::{SnapshotError, SnapshotResult};
use crate::model::document::Document;
use crate::model::relationship::RelationshipEntry;
use crate::model::schema::FormSchema;
use crate::service::relationship_registry::RelationshipRegistry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Title used when neither identity nor file name yields one.
pub const UNTITLED: &str = "Untitled";

static FILE_STEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:.*[/\\])?(.*?)(?:\.json)?$").expect("valid file stem regex"));

/// One file handed over by the presentation layer, already read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFile {
    pub file_name: String,
    pub contents: String,
}

impl ImportFile {
    pub fn new(file_name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
        }
    }
}

/// A full sheet parsed from an import file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSheet {
    pub title: String,
    pub document: Document,
    /// Present when the file was exported from a tabbed session.
    pub relationships: Option<RelationshipRegistry>,
}

/// File name without directories and `.json` extension.
pub fn title_from_file_name(file_name: &str) -> String {
    let stem = FILE_STEM_RE
        .captures(file_name.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or_default();
    if stem.is_empty() {
        UNTITLED.to_string()
    } else {
        stem.to_string()
    }
}

/// Parses a full sheet on top of `base` and derives its title.
pub fn parse_sheet(
    file: &ImportFile,
    schema: &FormSchema,
    base: &Document,
    relationship_cap: usize,
) -> SnapshotResult<ImportedSheet> {
    let value: Value = serde_json::from_str(&file.contents)?;
    let document = from_snapshot(&value, schema, base)?;
    // Only a name carried by the file counts; base placeholders do not.
    let title = from_snapshot(&value, schema, &Document::blank_for(schema))?
        .display_name(schema)
        .unwrap_or_else(|| title_from_file_name(&file.file_name));
    let relationships = value
        .get("relationships")
        .filter(|raw| raw.is_object())
        .map(|raw| decode_registry(Some(raw), value.get("relationshipSelection"), relationship_cap));
    Ok(ImportedSheet {
        title,
        document,
        relationships,
    })
}

/// Parses a relationship reference: only identity name and portrait are read.
pub fn parse_relationship(file: &ImportFile, schema: &FormSchema, added_at: i64) -> SnapshotResult<RelationshipEntry> {
    let value: Value = serde_json::from_str(&file.contents)?;
    let object = value.as_object().ok_or(SnapshotError::NotAnObject)?;
    let name = schema
        .name_label()
        .and_then(|label| object.get("identity")?.get(label)?.as_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| title_from_file_name(&file.file_name));
    let portrait = decode_portrait(object.get("portrait"));
    Ok(RelationshipEntry::new(name, portrait, file.file_name.clone(), added_at))
}

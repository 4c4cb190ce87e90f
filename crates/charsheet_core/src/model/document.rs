//! Character sheet document.
//!
//! # Responsibility
//! - Hold one sheet as plain data: identity, notes, portrait, groups.
//! - Build canonical default/blank documents from a `FormSchema`.
//!
//! # Invariants
//! - A `Document` built by this crate only carries schema labels.
//! - Stat values never exceed their pip counts after `normalize`.
//! - Budget caps are not enforced here; see `service::budget`.

use crate::model::schema::{FormSchema, GroupDef, GroupId, DOCUMENT_VERSION};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

static DATA_URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:[A-Za-z0-9.+/-]*(;[A-Za-z0-9=.+-]+)*(;base64)?,").expect("valid data uri regex")
});

// Same media-type alphabet as `DATA_URI_RE`.
static MIME_TYPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9.+/-]+$").expect("valid mime regex"));

/// Values of one allocation group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupValues {
    pub stats: BTreeMap<String, u8>,
    pub sliders: BTreeMap<String, u8>,
    pub traits: BTreeMap<String, bool>,
}

impl GroupValues {
    pub fn stat(&self, label: &str) -> u8 {
        self.stats.get(label).copied().unwrap_or(0)
    }

    pub fn trait_checked(&self, label: &str) -> bool {
        self.traits.get(label).copied().unwrap_or(false)
    }
}

/// One titled free-text note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub title: String,
    pub text: String,
}

impl Note {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// Embedded portrait image as a data URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Portrait(String);

/// Portrait input rejected before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortraitError {
    NotDataUri,
    EmptyMimeType,
    InvalidMimeType(String),
}

impl Display for PortraitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotDataUri => write!(f, "portrait must be a data URI"),
            Self::EmptyMimeType => write!(f, "portrait mime type must not be blank"),
            Self::InvalidMimeType(value) => write!(f, "portrait mime type `{value}` is not valid"),
        }
    }
}

impl Error for PortraitError {}

impl Portrait {
    /// Wraps an existing data URI.
    pub fn from_data_uri(value: impl Into<String>) -> Result<Self, PortraitError> {
        let value = value.into();
        if !DATA_URI_RE.is_match(value.trim_start()) {
            return Err(PortraitError::NotDataUri);
        }
        Ok(Self(value.trim_start().to_string()))
    }

    /// Embeds raw encoded image bytes (PNG, JPEG, ...) as base64.
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Result<Self, PortraitError> {
        let mime_type = mime_type.trim();
        if mime_type.is_empty() {
            return Err(PortraitError::EmptyMimeType);
        }
        if !MIME_TYPE_RE.is_match(mime_type) {
            return Err(PortraitError::InvalidMimeType(mime_type.to_string()));
        }
        Ok(Self(format!(
            "data:{mime_type};base64,{}",
            BASE64_STANDARD.encode(bytes)
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// One character sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub version: u32,
    pub identity: BTreeMap<String, String>,
    pub notes: Vec<Note>,
    pub portrait: Option<Portrait>,
    pub groups: BTreeMap<GroupId, GroupValues>,
}

impl Document {
    /// Builds the default document: placeholder identity, default stats,
    /// default notes, midpoint sliders, no portrait.
    pub fn default_for(schema: &FormSchema) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            identity: schema
                .identity
                .iter()
                .map(|field| (field.label.clone(), field.default.clone()))
                .collect(),
            notes: schema
                .default_notes
                .iter()
                .map(|title| Note::new(title.clone(), String::new()))
                .collect(),
            portrait: None,
            groups: schema
                .groups
                .iter()
                .map(|group| (group.id, group_values(group, true)))
                .collect(),
        }
    }

    /// Builds the blank document: empty identity, no notes, zero stats,
    /// unchecked traits, midpoint sliders, no portrait.
    pub fn blank_for(schema: &FormSchema) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            identity: schema
                .identity
                .iter()
                .map(|field| (field.label.clone(), String::new()))
                .collect(),
            notes: Vec::new(),
            portrait: None,
            groups: schema
                .groups
                .iter()
                .map(|group| (group.id, group_values(group, false)))
                .collect(),
        }
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupValues> {
        self.groups.get(&id)
    }

    pub fn identity_value(&self, label: &str) -> Option<&str> {
        self.identity.get(label).map(String::as_str)
    }

    /// Trimmed identity name, when the schema has a name field and it is set.
    pub fn display_name(&self, schema: &FormSchema) -> Option<String> {
        let label = schema.name_label()?;
        let name = self.identity.get(label)?.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    /// Projects this document onto `schema`.
    ///
    /// Unknown labels and note titles are dropped, missing labels are filled
    /// from `fallback`, stat values are clamped to pip counts, and slider
    /// values to their ranges.
    pub fn normalize(&mut self, schema: &FormSchema, fallback: &Document) {
        self.version = DOCUMENT_VERSION;

        let mut identity = BTreeMap::new();
        for field in &schema.identity {
            let value = self
                .identity
                .remove(&field.label)
                .or_else(|| fallback.identity.get(&field.label).cloned())
                .unwrap_or_default();
            identity.insert(field.label.clone(), value);
        }
        self.identity = identity;

        self.notes.retain(|note| schema.has_note_title(&note.title));

        let mut groups = BTreeMap::new();
        for def in &schema.groups {
            let mut current = self.groups.remove(&def.id).unwrap_or_default();
            let backup = fallback.groups.get(&def.id);
            let mut values = GroupValues::default();
            for stat in &def.stats {
                let value = current
                    .stats
                    .remove(&stat.label)
                    .or_else(|| backup.and_then(|group| group.stats.get(&stat.label).copied()))
                    .unwrap_or(0);
                values.stats.insert(stat.label.clone(), value.min(stat.pips));
            }
            for slider in &def.sliders {
                let key = slider.key();
                let value = current
                    .sliders
                    .remove(&key)
                    .or_else(|| backup.and_then(|group| group.sliders.get(&key).copied()))
                    .unwrap_or(slider.default);
                values.sliders.insert(key, slider.clamp(i64::from(value)));
            }
            for flag in &def.traits {
                let value = current
                    .traits
                    .remove(&flag.label)
                    .or_else(|| backup.and_then(|group| group.traits.get(&flag.label).copied()))
                    .unwrap_or(false);
                values.traits.insert(flag.label.clone(), value);
            }
            groups.insert(def.id, values);
        }
        self.groups = groups;
    }
}

fn group_values(def: &GroupDef, with_defaults: bool) -> GroupValues {
    GroupValues {
        stats: def
            .stats
            .iter()
            .map(|stat| {
                let value = if with_defaults { stat.default } else { 0 };
                (stat.label.clone(), value)
            })
            .collect(),
        sliders: def
            .sliders
            .iter()
            .map(|slider| (slider.key(), slider.default))
            .collect(),
        traits: def
            .traits
            .iter()
            .map(|flag| (flag.label.clone(), with_defaults && flag.default))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, Note, Portrait, PortraitError};
    use crate::model::schema::{FormSchema, GroupId};

    #[test]
    fn blank_keeps_slider_midpoints_and_clears_everything_else() {
        let schema = FormSchema::standard();
        let blank = Document::blank_for(&schema);
        assert!(blank.identity.values().all(String::is_empty));
        assert!(blank.notes.is_empty());
        let mind = blank.group(GroupId::Mind).expect("mind");
        assert!(mind.stats.values().all(|value| *value == 0));
        assert!(mind.sliders.values().all(|value| *value == 5));
        assert!(mind.traits.values().all(|value| !value));
    }

    #[test]
    fn default_document_carries_placeholders() {
        let schema = FormSchema::standard();
        let doc = Document::default_for(&schema);
        assert_eq!(doc.identity_value("Name"), Some("Unnamed Hero"));
        assert_eq!(doc.group(GroupId::Body).expect("body").stat("Strength"), 1);
        assert_eq!(doc.notes, vec![Note::new("Backstory", "")]);
    }

    #[test]
    fn normalize_drops_unknown_labels_and_clamps_values() {
        let schema = FormSchema::standard();
        let fallback = Document::default_for(&schema);
        let mut doc = Document::blank_for(&schema);
        doc.identity.insert("Favourite Color".to_string(), "red".to_string());
        doc.identity.remove("Age");
        doc.notes.push(Note::new("Shopping", "eggs"));
        let body = doc.groups.get_mut(&GroupId::Body).expect("body");
        body.stats.insert("Strength".to_string(), 42);
        body.stats.insert("Luck".to_string(), 3);

        doc.normalize(&schema, &fallback);

        assert!(!doc.identity.contains_key("Favourite Color"));
        assert_eq!(doc.identity_value("Age"), Some("30"));
        assert!(doc.notes.is_empty());
        let body = doc.group(GroupId::Body).expect("body");
        assert_eq!(body.stat("Strength"), 6);
        assert!(!body.stats.contains_key("Luck"));
    }

    #[test]
    fn portrait_from_bytes_embeds_base64() {
        let portrait = Portrait::from_bytes("image/png", &[1, 2, 3]).expect("portrait");
        assert_eq!(portrait.as_str(), "data:image/png;base64,AQID");
    }

    #[test]
    fn portrait_from_bytes_only_accepts_data_uri_mime_types() {
        let err = Portrait::from_bytes("image/x_icon", b"abc").unwrap_err();
        assert_eq!(err, PortraitError::InvalidMimeType("image/x_icon".to_string()));
        assert_eq!(Portrait::from_bytes("  ", b"abc").unwrap_err(), PortraitError::EmptyMimeType);

        let accepted = Portrait::from_bytes("image/svg+xml", b"abc").expect("portrait");
        assert_eq!(Portrait::from_data_uri(accepted.as_str()), Ok(accepted));
    }

    #[test]
    fn portrait_rejects_plain_urls() {
        let err = Portrait::from_data_uri("https://example.com/a.png").unwrap_err();
        assert_eq!(err, PortraitError::NotDataUri);
    }

    #[test]
    fn display_name_ignores_blank_names() {
        let schema = FormSchema::standard();
        let mut doc = Document::blank_for(&schema);
        assert_eq!(doc.display_name(&schema), None);
        doc.identity.insert("Name".to_string(), "  Aria ".to_string());
        assert_eq!(doc.display_name(&schema).as_deref(), Some("Aria"));
    }
}

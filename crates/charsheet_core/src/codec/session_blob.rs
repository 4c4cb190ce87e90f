//! Persisted tab session blob.
//!
//! Shape: `{activeId, tabs: [{id, title, data, relationships,
//! relationshipSelection}]}` where `data` is a committed snapshot diffed
//! against the default document, the string `"blank"` or `null`.
//!
//! Decoding never fails: a malformed tab becomes a fresh tab, a malformed
//! blob decodes to no tabs at all and the caller seeds one.

use crate::codec::relationships::{decode_registry, encode_registry};
use crate::codec::snapshot::{from_snapshot, to_diff_snapshot};
use crate::model::document::Document;
use crate::model::schema::FormSchema;
use crate::model::tab::{Tab, TabDocument, TabId};
use log::warn;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

/// Title of tabs created without a better name.
pub const DEFAULT_TAB_TITLE: &str = "New Sheet";

const BLANK_MARKER: &str = "blank";

/// Decoded session blob.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionBlob {
    pub active_id: Option<TabId>,
    pub tabs: Vec<Tab>,
}

/// Encodes tabs in order; `default_document` is the diff base.
pub fn encode_session(tabs: &[Tab], active_id: Option<TabId>, schema: &FormSchema, default_document: &Document) -> Value {
    let tabs: Vec<Value> = tabs
        .iter()
        .map(|tab| encode_tab(tab, schema, default_document))
        .collect();
    json!({
        "activeId": active_id.map(|id| id.to_string()),
        "tabs": tabs,
    })
}

/// Decodes a raw blob; `default_document` is the base for committed data.
pub fn decode_session(raw: &str, schema: &FormSchema, default_document: &Document, relationship_cap: usize) -> SessionBlob {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!("event=session_decode module=codec status=degraded reason=invalid_json error={err}");
            return SessionBlob::default();
        }
    };
    let Some(raw_tabs) = value.get("tabs").and_then(Value::as_array) else {
        warn!("event=session_decode module=codec status=degraded reason=missing_tabs");
        return SessionBlob::default();
    };

    let mut seen = HashSet::new();
    let mut tabs = Vec::with_capacity(raw_tabs.len());
    for raw_tab in raw_tabs {
        let mut tab = match raw_tab.as_object() {
            Some(object) => decode_tab(object, schema, default_document, relationship_cap),
            None => {
                warn!("event=session_decode module=codec status=degraded reason=malformed_tab");
                Tab::new(DEFAULT_TAB_TITLE, TabDocument::Unset, relationship_cap)
            }
        };
        if !seen.insert(tab.id) {
            tab.id = Uuid::new_v4();
            seen.insert(tab.id);
        }
        tabs.push(tab);
    }

    let active_id = value
        .get("activeId")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .filter(|id| tabs.iter().any(|tab| tab.id == *id));
    SessionBlob { active_id, tabs }
}

fn encode_tab(tab: &Tab, schema: &FormSchema, default_document: &Document) -> Value {
    let data = match &tab.document {
        TabDocument::Committed(doc) => to_diff_snapshot(doc, schema, default_document),
        TabDocument::Blank => json!(BLANK_MARKER),
        TabDocument::Unset => Value::Null,
    };
    let (relationships, selection) = encode_registry(&tab.relationships);
    json!({
        "id": tab.id.to_string(),
        "title": tab.title,
        "data": data,
        "relationships": relationships,
        "relationshipSelection": selection,
    })
}

fn decode_tab(object: &Map<String, Value>, schema: &FormSchema, default_document: &Document, relationship_cap: usize) -> Tab {
    let id = object
        .get("id")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .unwrap_or_else(Uuid::new_v4);
    let title = object
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(DEFAULT_TAB_TITLE)
        .to_string();
    let document = match object.get("data") {
        None | Some(Value::Null) => TabDocument::Unset,
        Some(Value::String(marker)) if marker == BLANK_MARKER => TabDocument::Blank,
        Some(data) => match from_snapshot(data, schema, default_document) {
            Ok(doc) => TabDocument::Committed(doc),
            Err(err) => {
                warn!("event=session_decode module=codec status=degraded reason=malformed_data tab={id} error={err}");
                TabDocument::Unset
            }
        },
    };
    let relationships = decode_registry(
        object.get("relationships"),
        object.get("relationshipSelection"),
        relationship_cap,
    );
    Tab {
        id,
        title,
        document,
        relationships,
    }
}

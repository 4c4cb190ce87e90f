//! Version-2 snapshot encoding and lenient decoding.
//!
//! Snapshot shape:
//! `{version, identity, notes: [{title, text}], portrait, body: {stats},
//! skills: {stats, traits}, ..., mind: {stats, sliders, traits}, ...}`

use crate::codec::legacy::{apply_legacy_fields, parse_legacy_fields};
use crate::codec::{SnapshotError, SnapshotResult};
use crate::model::document::{Document, Note, Portrait};
use crate::model::schema::{FormSchema, DOCUMENT_VERSION};
use log::warn;
use serde_json::{json, Map, Value};

/// Encodes every schema key of `doc`.
pub fn to_snapshot(doc: &Document, schema: &FormSchema) -> Value {
    encode(doc, schema, None)
}

/// Encodes only identity/stat/slider/trait keys that differ from `base`.
///
/// Notes and portrait are always written. Decoding against the same base
/// yields the full document again.
pub fn to_diff_snapshot(doc: &Document, schema: &FormSchema, base: &Document) -> Value {
    encode(doc, schema, Some(base))
}

/// Decodes `value` on top of `base`.
///
/// Accepts the structured shape, the legacy `{fields: [...]}` shape and the
/// relationship-only `{identity, portrait}` shape.
pub fn from_snapshot(value: &Value, schema: &FormSchema, base: &Document) -> SnapshotResult<Document> {
    let object = value.as_object().ok_or(SnapshotError::NotAnObject)?;
    let version = object.get("version").and_then(Value::as_i64);
    let legacy_fields = object.get("fields").and_then(Value::as_array);

    let mut doc = base.clone();
    match (version, legacy_fields) {
        (None, Some(fields)) | (Some(1), Some(fields)) => {
            let parsed = parse_legacy_fields(fields);
            apply_legacy_fields(&mut doc, schema, &parsed);
        }
        (Some(1), None) => {
            warn!("event=snapshot_parse module=codec status=degraded reason=v1_without_fields");
        }
        (None, None) | (Some(2), _) => decode_structured(object, schema, &mut doc),
        (Some(other), _) => return Err(SnapshotError::UnsupportedVersion(other)),
    }

    doc.portrait = decode_portrait(object.get("portrait"));
    doc.version = DOCUMENT_VERSION;
    Ok(doc)
}

/// Parses raw JSON text and decodes it on top of `base`.
pub fn parse_snapshot_str(raw: &str, schema: &FormSchema, base: &Document) -> SnapshotResult<Document> {
    let value: Value = serde_json::from_str(raw)?;
    from_snapshot(&value, schema, base)
}

/// Reads an optional data-URI portrait; anything else clears it.
pub fn decode_portrait(value: Option<&Value>) -> Option<Portrait> {
    value
        .and_then(Value::as_str)
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| Portrait::from_data_uri(raw).ok())
}

fn encode(doc: &Document, schema: &FormSchema, base: Option<&Document>) -> Value {
    let mut root = Map::new();
    root.insert("version".to_string(), json!(DOCUMENT_VERSION));

    let mut identity = Map::new();
    for field in &schema.identity {
        let value = doc.identity_value(&field.label).unwrap_or_default();
        let unchanged = base.is_some_and(|base| base.identity_value(&field.label).unwrap_or_default() == value);
        if !unchanged {
            identity.insert(field.label.clone(), json!(value));
        }
    }
    root.insert("identity".to_string(), Value::Object(identity));

    let notes: Vec<Value> = doc
        .notes
        .iter()
        .map(|note| json!({ "title": note.title, "text": note.text }))
        .collect();
    root.insert("notes".to_string(), Value::Array(notes));

    for def in &schema.groups {
        let values = doc.group(def.id).cloned().unwrap_or_default();
        let base_values = base.and_then(|base| base.group(def.id));
        let mut group = Map::new();

        let mut stats = Map::new();
        for stat in &def.stats {
            let value = values.stat(&stat.label);
            if base_values.is_some_and(|b| b.stat(&stat.label) == value) {
                continue;
            }
            stats.insert(stat.label.clone(), json!(value));
        }
        group.insert("stats".to_string(), Value::Object(stats));

        if !def.sliders.is_empty() {
            let mut sliders = Map::new();
            for slider in &def.sliders {
                let key = slider.key();
                let value = values.sliders.get(&key).copied().unwrap_or(slider.default);
                if base_values.is_some_and(|b| b.sliders.get(&key).copied().unwrap_or(slider.default) == value) {
                    continue;
                }
                sliders.insert(key, json!(value));
            }
            group.insert("sliders".to_string(), Value::Object(sliders));
        }

        if !def.traits.is_empty() {
            let mut traits = Map::new();
            for flag in &def.traits {
                let value = values.trait_checked(&flag.label);
                if base_values.is_some_and(|b| b.trait_checked(&flag.label) == value) {
                    continue;
                }
                traits.insert(flag.label.clone(), json!(value));
            }
            group.insert("traits".to_string(), Value::Object(traits));
        }

        root.insert(def.id.key().to_string(), Value::Object(group));
    }

    root.insert(
        "portrait".to_string(),
        doc.portrait
            .as_ref()
            .map_or(Value::Null, |portrait| json!(portrait.as_str())),
    );
    Value::Object(root)
}

fn decode_structured(object: &Map<String, Value>, schema: &FormSchema, doc: &mut Document) {
    if let Some(identity) = object.get("identity").and_then(Value::as_object) {
        for field in &schema.identity {
            if let Some(value) = identity.get(&field.label).and_then(scalar_text) {
                doc.identity.insert(field.label.clone(), value);
            }
        }
    }

    if let Some(notes) = object.get("notes").and_then(Value::as_array) {
        doc.notes = notes
            .iter()
            .filter_map(|entry| {
                let title = entry.get("title").and_then(Value::as_str)?;
                if !schema.has_note_title(title) {
                    return None;
                }
                let text = entry.get("text").and_then(Value::as_str).unwrap_or_default();
                Some(Note::new(title, text))
            })
            .collect();
    }

    for def in &schema.groups {
        let Some(group) = object.get(def.id.key()).and_then(Value::as_object) else {
            continue;
        };
        let values = doc.groups.entry(def.id).or_default();

        if let Some(stats) = group.get("stats").and_then(Value::as_object) {
            for stat in &def.stats {
                if let Some(raw) = stats.get(&stat.label).and_then(as_integer) {
                    let value = raw.clamp(0, i64::from(stat.pips));
                    values.stats.insert(stat.label.clone(), value as u8);
                }
            }
        }
        if let Some(sliders) = group.get("sliders").and_then(Value::as_object) {
            for slider in &def.sliders {
                let key = slider.key();
                if let Some(raw) = sliders.get(&key).and_then(as_integer) {
                    values.sliders.insert(key, slider.clamp(raw));
                }
            }
        }
        if let Some(traits) = group.get("traits").and_then(Value::as_object) {
            for flag in &def.traits {
                if let Some(checked) = traits.get(&flag.label).and_then(Value::as_bool) {
                    values.traits.insert(flag.label.clone(), checked);
                }
            }
        }
    }
}

/// Accepts strings and numbers as identity text.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Accepts integers, integral floats and numeric strings.
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.round() as i64)),
        Value::String(text) => text.trim().parse::<f64>().ok().map(|float| float.round() as i64),
        _ => None,
    }
}

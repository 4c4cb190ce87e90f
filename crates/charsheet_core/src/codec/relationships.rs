//! JSON form of relationship registries.
//!
//! `relationships`: `{family: [entry...], friends: [...], love: [...], hate: [...]}`
//! with entries `{id, name, portrait, relation, sourceFile, addedAt}`.
//! `relationshipSelection`: `{family: id|null, ...}`.

use crate::codec::snapshot::decode_portrait;
use crate::model::relationship::{RelationKind, RelationshipEntry, RelationshipId};
use crate::service::relationship_registry::RelationshipRegistry;
use log::warn;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Encodes `(relationships, relationshipSelection)`.
pub fn encode_registry(registry: &RelationshipRegistry) -> (Value, Value) {
    let mut lists = Map::new();
    let mut selection = Map::new();
    for kind in RelationKind::ALL {
        let entries = registry.entries(kind).iter().filter_map(encode_entry).collect();
        lists.insert(kind.key().to_string(), Value::Array(entries));
        selection.insert(
            kind.key().to_string(),
            registry
                .selection(kind)
                .map_or(Value::Null, |id| json!(id.to_string())),
        );
    }
    (Value::Object(lists), Value::Object(selection))
}

/// Decodes both maps defensively; malformed entries are dropped.
pub fn decode_registry(lists: Option<&Value>, selection: Option<&Value>, cap: usize) -> RelationshipRegistry {
    let mut decoded_lists = BTreeMap::new();
    let mut decoded_selection = BTreeMap::new();
    for kind in RelationKind::ALL {
        let entries: Vec<RelationshipEntry> = lists
            .and_then(|lists| lists.get(kind.key()))
            .and_then(Value::as_array)
            .map(|raw| raw.iter().filter_map(decode_entry).collect())
            .unwrap_or_default();
        decoded_lists.insert(kind, entries);

        if let Some(id) = selection
            .and_then(|selection| selection.get(kind.key()))
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
        {
            decoded_selection.insert(kind, id);
        }
    }
    RelationshipRegistry::restore(cap, decoded_lists, decoded_selection)
}

fn encode_entry(entry: &RelationshipEntry) -> Option<Value> {
    match serde_json::to_value(entry) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("event=relationship_encode module=codec status=error id={} error={err}", entry.id);
            None
        }
    }
}

fn decode_entry(raw: &Value) -> Option<RelationshipEntry> {
    let object = raw.as_object()?;
    let id: RelationshipId = match object.get("id").and_then(Value::as_str).map(Uuid::parse_str) {
        Some(Ok(id)) => id,
        _ => {
            warn!("event=relationship_decode module=codec status=degraded reason=invalid_id");
            Uuid::new_v4()
        }
    };
    let name = object.get("name").and_then(Value::as_str)?.to_string();
    Some(RelationshipEntry {
        id,
        name,
        portrait: decode_portrait(object.get("portrait")),
        relation: text(object, "relation"),
        source_file: text(object, "sourceFile"),
        added_at: object.get("addedAt").and_then(Value::as_i64).unwrap_or(0),
    })
}

fn text(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{decode_registry, encode_registry};
    use crate::model::relationship::{RelationKind, RelationshipEntry};
    use crate::service::relationship_registry::RelationshipRegistry;
    use serde_json::json;

    #[test]
    fn registry_survives_encode_decode() {
        let mut registry = RelationshipRegistry::new(10);
        let mut sister = RelationshipEntry::new("Ilse", None, "ilse.json", 11);
        sister.relation = "sister".to_string();
        let sister_id = sister.id;
        registry.insert(RelationKind::Family, sister);
        registry.insert(RelationKind::Hate, RelationshipEntry::new("Vorn", None, "vorn.json", 12));
        assert!(registry.select(RelationKind::Family, Some(sister_id)));

        let (lists, selection) = encode_registry(&registry);
        assert_eq!(lists["family"][0]["sourceFile"], "ilse.json");
        assert_eq!(lists["family"][0]["id"], sister_id.to_string());
        assert_eq!(lists["family"][0]["addedAt"], 11);
        assert!(lists["hate"][0]["portrait"].is_null());
        assert!(selection["love"].is_null());

        let decoded = decode_registry(Some(&lists), Some(&selection), 10);
        assert_eq!(decoded, registry);
    }

    #[test]
    fn malformed_entries_and_dangling_selection_are_dropped() {
        let lists = json!({"friends": [{"id": "x"}, 5, {"id": "not-a-uuid", "name": "Pell"}]});
        let selection = json!({"friends": "3d0f5f0e-0000-4000-8000-000000000000"});

        let decoded = decode_registry(Some(&lists), Some(&selection), 10);

        let friends = decoded.entries(RelationKind::Friends);
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].name, "Pell");
        assert_eq!(decoded.selection(RelationKind::Friends), None);
    }
}

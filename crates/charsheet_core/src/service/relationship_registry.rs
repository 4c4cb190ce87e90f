//! Per-tab registry of imported relationship references.
//!
//! # Responsibility
//! - Keep four independent lists (family, friends, love, hate).
//! - Track one nullable selection per kind.
//! - Import references from sheet files on a best-effort basis.
//!
//! # Invariants
//! - Each list holds at most `cap` entries; newest first.
//! - A selection always names an entry of its own kind.
//! - Operations on one kind never touch another kind's list or selection.

use crate::codec::import::{parse_relationship, ImportFile};
use crate::model::relationship::{RelationKind, RelationshipEntry, RelationshipId};
use crate::model::schema::FormSchema;
use log::{info, warn};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Relationship lists and selections owned by one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipRegistry {
    cap: usize,
    lists: BTreeMap<RelationKind, Vec<RelationshipEntry>>,
    selection: BTreeMap<RelationKind, RelationshipId>,
}

impl RelationshipRegistry {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            lists: BTreeMap::new(),
            selection: BTreeMap::new(),
        }
    }

    /// Rebuilds a registry from decoded parts, enforcing cap and selection
    /// invariants.
    pub fn restore(
        cap: usize,
        lists: BTreeMap<RelationKind, Vec<RelationshipEntry>>,
        selection: BTreeMap<RelationKind, RelationshipId>,
    ) -> Self {
        let mut registry = Self::new(cap);
        for (kind, mut entries) in lists {
            entries.truncate(cap);
            if !entries.is_empty() {
                registry.lists.insert(kind, entries);
            }
        }
        for (kind, id) in selection {
            if registry.contains(kind, id) {
                registry.selection.insert(kind, id);
            }
        }
        registry
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn entries(&self, kind: RelationKind) -> &[RelationshipEntry] {
        self.lists
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn selection(&self, kind: RelationKind) -> Option<RelationshipId> {
        self.selection.get(&kind).copied()
    }

    pub fn selected_entry(&self, kind: RelationKind) -> Option<&RelationshipEntry> {
        let id = self.selection(kind)?;
        self.entries(kind).iter().find(|entry| entry.id == id)
    }

    /// Prepends `entry`; the oldest entries beyond `cap` are dropped.
    pub fn insert(&mut self, kind: RelationKind, entry: RelationshipEntry) {
        let list = self.lists.entry(kind).or_default();
        list.insert(0, entry);
        if list.len() > self.cap {
            list.truncate(self.cap);
            if let Some(selected) = self.selection.get(&kind).copied() {
                if !list.iter().any(|entry| entry.id == selected) {
                    self.selection.remove(&kind);
                }
            }
        }
    }

    /// Imports one entry per parseable file; returns how many were added.
    ///
    /// Unparseable files are skipped and logged, never fatal to the batch.
    pub fn import_entries(&mut self, files: &[ImportFile], kind: RelationKind, schema: &FormSchema) -> usize {
        let added_at = now_epoch_ms();
        let mut imported = 0;
        for file in files {
            match parse_relationship(file, schema, added_at) {
                Ok(entry) => {
                    self.insert(kind, entry);
                    imported += 1;
                }
                Err(err) => {
                    warn!(
                        "event=relationship_import module=registry status=skipped kind={} file={} error={}",
                        kind.key(),
                        file.file_name,
                        err
                    );
                }
            }
        }
        info!(
            "event=relationship_import module=registry status=ok kind={} imported={} offered={}",
            kind.key(),
            imported,
            files.len()
        );
        imported
    }

    /// Removes one entry; clears the selection when it pointed at it.
    pub fn remove(&mut self, kind: RelationKind, id: RelationshipId) -> bool {
        let Some(list) = self.lists.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|entry| entry.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.lists.remove(&kind);
        }
        if removed && self.selection(kind) == Some(id) {
            self.selection.remove(&kind);
        }
        removed
    }

    /// Selects (or clears with `None`) the entry of one kind.
    ///
    /// Returns `false` and leaves the selection unchanged when `id` is not
    /// in that kind's list.
    pub fn select(&mut self, kind: RelationKind, id: Option<RelationshipId>) -> bool {
        match id {
            Some(id) if self.contains(kind, id) => {
                self.selection.insert(kind, id);
                true
            }
            Some(_) => false,
            None => {
                self.selection.remove(&kind);
                true
            }
        }
    }

    /// Edits the free-text relation of a family entry.
    pub fn set_relation(&mut self, id: RelationshipId, relation: impl Into<String>) -> bool {
        let Some(entry) = self
            .lists
            .get_mut(&RelationKind::Family)
            .and_then(|list| list.iter_mut().find(|entry| entry.id == id))
        else {
            return false;
        };
        entry.relation = relation.into();
        true
    }

    /// Drops every entry and selection.
    pub fn reset(&mut self) {
        self.lists.clear();
        self.selection.clear();
    }

    fn contains(&self, kind: RelationKind, id: RelationshipId) -> bool {
        self.entries(kind).iter().any(|entry| entry.id == id)
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::RelationshipRegistry;
    use crate::codec::import::ImportFile;
    use crate::model::relationship::{RelationKind, RelationshipEntry};
    use crate::model::schema::FormSchema;

    fn entry(name: &str) -> RelationshipEntry {
        RelationshipEntry::new(name, None, format!("{name}.json"), 0)
    }

    #[test]
    fn insert_prepends_and_drops_oldest_beyond_cap() {
        let mut registry = RelationshipRegistry::new(2);
        let first = entry("first");
        let first_id = first.id;
        registry.insert(RelationKind::Love, first);
        assert!(registry.select(RelationKind::Love, Some(first_id)));
        registry.insert(RelationKind::Love, entry("second"));
        registry.insert(RelationKind::Love, entry("third"));

        let names: Vec<&str> = registry
            .entries(RelationKind::Love)
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(names, vec!["third", "second"]);
        assert_eq!(registry.selection(RelationKind::Love), None);
    }

    #[test]
    fn selection_is_independent_per_kind() {
        let mut registry = RelationshipRegistry::new(5);
        let friend = entry("friend");
        let foe = entry("foe");
        let (friend_id, foe_id) = (friend.id, foe.id);
        registry.insert(RelationKind::Friends, friend);
        registry.insert(RelationKind::Hate, foe);

        assert!(registry.select(RelationKind::Friends, Some(friend_id)));
        assert!(registry.select(RelationKind::Hate, Some(foe_id)));
        assert!(!registry.select(RelationKind::Love, Some(friend_id)));
        assert!(registry.select(RelationKind::Hate, None));

        assert_eq!(registry.selection(RelationKind::Friends), Some(friend_id));
        assert_eq!(registry.selection(RelationKind::Hate), None);
    }

    #[test]
    fn relation_text_is_editable_for_family_only() {
        let mut registry = RelationshipRegistry::new(5);
        let father = entry("father");
        let rival = entry("rival");
        let (father_id, rival_id) = (father.id, rival.id);
        registry.insert(RelationKind::Family, father);
        registry.insert(RelationKind::Hate, rival);

        assert!(registry.set_relation(father_id, "father"));
        assert!(!registry.set_relation(rival_id, "nemesis"));
        assert_eq!(registry.entries(RelationKind::Family)[0].relation, "father");
    }

    #[test]
    fn import_skips_unparseable_files() {
        let schema = FormSchema::standard();
        let mut registry = RelationshipRegistry::new(5);
        let files = vec![
            ImportFile::new("ok.json", r#"{"identity": {"Name": "Ona"}}"#),
            ImportFile::new("broken.json", "{"),
            ImportFile::new("anon.json", "{}"),
        ];

        let imported = registry.import_entries(&files, RelationKind::Friends, &schema);

        assert_eq!(imported, 2);
        let names: Vec<&str> = registry
            .entries(RelationKind::Friends)
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(names, vec!["anon", "Ona"]);
        assert!(registry.entries(RelationKind::Family).is_empty());
    }

    #[test]
    fn remove_clears_matching_selection() {
        let mut registry = RelationshipRegistry::new(5);
        let target = entry("target");
        let id = target.id;
        registry.insert(RelationKind::Family, target);
        registry.select(RelationKind::Family, Some(id));

        assert!(registry.remove(RelationKind::Family, id));
        assert!(!registry.remove(RelationKind::Family, id));
        assert_eq!(registry.selection(RelationKind::Family), None);
    }
}

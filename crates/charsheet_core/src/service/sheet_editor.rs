//! Live editing surface for one sheet.
//!
//! # Responsibility
//! - Own the in-memory document the presentation layer binds to.
//! - Route every interaction through dot-grid and budget rules.
//! - Capture canonical default/blank documents once at construction.
//! - Notify listeners of every interaction.
//!
//! # Invariants
//! - `read()` never aliases internal storage.
//! - After any operation every stat is within its pips and every group is
//!   within its cap.
//! - `apply` replaces the whole state; nothing from the previous document
//!   survives unless the new document carries it.

use crate::codec::legacy::{apply_legacy_fields, LegacyField};
use crate::config::BudgetCaps;
use crate::model::document::{Document, GroupValues, Note, Portrait};
use crate::model::dot_grid::DotGrid;
use crate::model::schema::{FormSchema, GroupDef, GroupId};
use crate::service::budget::{BudgetEnforcer, GroupBudget, GroupControls};
use log::debug;
use std::sync::Arc;

/// Interaction notification delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetEvent {
    PipClicked {
        group: GroupId,
        stat: String,
        pip: u8,
        value: u8,
    },
    TraitToggled {
        group: GroupId,
        label: String,
        checked: bool,
    },
    SliderChanged {
        group: GroupId,
        key: String,
        value: u8,
    },
    IdentityChanged {
        label: String,
    },
    NotesChanged,
    PortraitChanged,
    DocumentApplied,
    GroupReset(GroupId),
}

/// Why an interaction did not change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnknownGroup,
    UnknownLabel,
    PipOutOfRange,
    OverBudget,
    UnknownNoteTitle,
    DuplicateNoteTitle,
    NoteIndexOutOfRange,
}

/// Result of one interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    Unchanged,
    Rejected(Rejection),
}

impl EditOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

pub type SheetListener = Box<dyn FnMut(&SheetEvent) + Send>;

/// In-memory sheet bound by the presentation layer.
pub struct SheetEditor {
    schema: Arc<FormSchema>,
    enforcer: BudgetEnforcer,
    default_document: Document,
    blank_document: Document,
    document: Document,
    listeners: Vec<SheetListener>,
}

impl SheetEditor {
    /// Creates an editor showing the default document.
    pub fn new(schema: Arc<FormSchema>, caps: BudgetCaps) -> Self {
        let enforcer = BudgetEnforcer::new(caps);
        let blank_document = Document::blank_for(&schema);
        let mut default_document = Document::default_for(&schema);
        for def in &schema.groups {
            if let Some(values) = default_document.groups.get_mut(&def.id) {
                enforcer.clamp_to_cap(def, values);
            }
        }
        let document = default_document.clone();
        Self {
            schema,
            enforcer,
            default_document,
            blank_document,
            document,
            listeners: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Arc<FormSchema> {
        &self.schema
    }

    pub fn caps(&self) -> &BudgetCaps {
        self.enforcer.caps()
    }

    /// Canonical default document captured at construction.
    pub fn default_document(&self) -> &Document {
        &self.default_document
    }

    /// Canonical blank document captured at construction.
    pub fn blank_document(&self) -> &Document {
        &self.blank_document
    }

    pub fn subscribe(&mut self, listener: SheetListener) {
        self.listeners.push(listener);
    }

    /// Independent copy of the current state.
    pub fn read(&self) -> Document {
        self.document.clone()
    }

    /// Borrowed view of the current state.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Replaces all state with `doc`, or with the default document on `None`.
    ///
    /// Keys missing from `doc` start cleared, values are clamped to pip
    /// counts and slider ranges, and over-budget groups are clamped.
    pub fn apply(&mut self, doc: Option<&Document>) {
        let mut next = match doc {
            Some(doc) => doc.clone(),
            None => self.default_document.clone(),
        };
        next.normalize(&self.schema, &self.blank_document);
        self.clamp_all(&mut next);
        self.document = next;
        debug!("event=sheet_apply module=editor status=ok");
        self.emit(SheetEvent::DocumentApplied);
    }

    /// Applies version-1 positional fields onto the current state.
    ///
    /// Returns the number of controls that accepted their entry.
    pub fn apply_legacy_fields(&mut self, fields: &[LegacyField]) -> usize {
        let mut next = self.document.clone();
        let applied = apply_legacy_fields(&mut next, &self.schema, fields);
        self.apply(Some(&next));
        applied
    }

    pub fn reset_to_default(&mut self) {
        self.apply(None);
    }

    pub fn reset_to_blank(&mut self) {
        let blank = self.blank_document.clone();
        self.apply(Some(&blank));
    }

    /// Clears stats and traits of one group by replaying toggle-off clicks.
    ///
    /// Sliders keep their values. Listeners see one event per cleared stat
    /// or trait, then `GroupReset`.
    pub fn reset_group(&mut self, group: GroupId) -> EditOutcome {
        let Some(def) = self.schema.group(group).cloned() else {
            return EditOutcome::Rejected(Rejection::UnknownGroup);
        };
        for stat in &def.stats {
            let value = self.group_values(group).stat(&stat.label);
            if value > 0 {
                self.click_pip(group, &stat.label, value);
            }
        }
        for flag in &def.traits {
            if self.group_values(group).trait_checked(&flag.label) {
                self.toggle_trait(group, &flag.label);
            }
        }
        self.emit(SheetEvent::GroupReset(group));
        EditOutcome::Applied
    }

    /// Clicks pip `pip` (1-based) of one stat.
    ///
    /// Increases that would exceed the group cap are refused.
    pub fn click_pip(&mut self, group: GroupId, stat: &str, pip: u8) -> EditOutcome {
        let (def, values) = match self.lookup(group) {
            Ok(found) => found,
            Err(rejection) => return EditOutcome::Rejected(rejection),
        };
        let Some(index) = def.stat_index(stat) else {
            return EditOutcome::Rejected(Rejection::UnknownLabel);
        };
        let mut grid = DotGrid::new(def.stats[index].pips, values.stat(stat));
        let Some(desired) = grid.value_after_click(pip) else {
            return EditOutcome::Rejected(Rejection::PipOutOfRange);
        };
        if !self.enforcer.permits_stat(def, values, stat, desired) {
            return EditOutcome::Rejected(Rejection::OverBudget);
        }
        let value = grid.click(pip);
        self.group_values_mut(group).stats.insert(stat.to_string(), value);
        self.emit(SheetEvent::PipClicked {
            group,
            stat: stat.to_string(),
            pip,
            value,
        });
        EditOutcome::Applied
    }

    /// Moves a stat to `value` through the minimal click sequence.
    pub fn set_stat(&mut self, group: GroupId, stat: &str, value: u8) -> EditOutcome {
        let (def, values) = match self.lookup(group) {
            Ok(found) => found,
            Err(rejection) => return EditOutcome::Rejected(rejection),
        };
        let Some(index) = def.stat_index(stat) else {
            return EditOutcome::Rejected(Rejection::UnknownLabel);
        };
        let clicks = DotGrid::new(def.stats[index].pips, values.stat(stat)).clicks_to(value);
        if clicks.is_empty() {
            return EditOutcome::Unchanged;
        }
        for pip in clicks {
            let outcome = self.click_pip(group, stat, pip);
            if !outcome.is_applied() {
                return outcome;
            }
        }
        EditOutcome::Applied
    }

    /// Flips one trait; checking a budgeted trait must fit the cap.
    pub fn toggle_trait(&mut self, group: GroupId, label: &str) -> EditOutcome {
        let (def, values) = match self.lookup(group) {
            Ok(found) => found,
            Err(rejection) => return EditOutcome::Rejected(rejection),
        };
        if def.trait_index(label).is_none() {
            return EditOutcome::Rejected(Rejection::UnknownLabel);
        }
        let checked = !values.trait_checked(label);
        if !self.enforcer.permits_trait(def, values, label, checked) {
            return EditOutcome::Rejected(Rejection::OverBudget);
        }
        self.group_values_mut(group).traits.insert(label.to_string(), checked);
        self.emit(SheetEvent::TraitToggled {
            group,
            label: label.to_string(),
            checked,
        });
        EditOutcome::Applied
    }

    /// Sets a slider, clamped into its range. Sliders are never budgeted.
    pub fn set_slider(&mut self, group: GroupId, key: &str, value: i64) -> EditOutcome {
        let (def, values) = match self.lookup(group) {
            Ok(found) => found,
            Err(rejection) => return EditOutcome::Rejected(rejection),
        };
        let Some(index) = def.slider_index(key) else {
            return EditOutcome::Rejected(Rejection::UnknownLabel);
        };
        let clamped = def.sliders[index].clamp(value);
        if values.sliders.get(key) == Some(&clamped) {
            return EditOutcome::Unchanged;
        }
        self.group_values_mut(group).sliders.insert(key.to_string(), clamped);
        self.emit(SheetEvent::SliderChanged {
            group,
            key: key.to_string(),
            value: clamped,
        });
        EditOutcome::Applied
    }

    pub fn set_identity(&mut self, label: &str, value: impl Into<String>) -> EditOutcome {
        if !self.schema.has_identity_label(label) {
            return EditOutcome::Rejected(Rejection::UnknownLabel);
        }
        self.document.identity.insert(label.to_string(), value.into());
        self.emit(SheetEvent::IdentityChanged {
            label: label.to_string(),
        });
        EditOutcome::Applied
    }

    /// Note titles not yet used by the current notes, in menu order.
    pub fn available_note_titles(&self) -> Vec<&str> {
        self.schema
            .note_titles
            .iter()
            .filter(|title| !self.document.notes.iter().any(|note| &note.title == *title))
            .map(String::as_str)
            .collect()
    }

    /// Appends an empty note; titles must be known and unused.
    pub fn add_note(&mut self, title: &str) -> EditOutcome {
        if !self.schema.has_note_title(title) {
            return EditOutcome::Rejected(Rejection::UnknownNoteTitle);
        }
        if self.document.notes.iter().any(|note| note.title == title) {
            return EditOutcome::Rejected(Rejection::DuplicateNoteTitle);
        }
        self.document.notes.push(Note::new(title, String::new()));
        self.emit(SheetEvent::NotesChanged);
        EditOutcome::Applied
    }

    pub fn set_note_text(&mut self, index: usize, text: impl Into<String>) -> EditOutcome {
        let Some(note) = self.document.notes.get_mut(index) else {
            return EditOutcome::Rejected(Rejection::NoteIndexOutOfRange);
        };
        note.text = text.into();
        self.emit(SheetEvent::NotesChanged);
        EditOutcome::Applied
    }

    pub fn remove_note(&mut self, index: usize) -> EditOutcome {
        if index >= self.document.notes.len() {
            return EditOutcome::Rejected(Rejection::NoteIndexOutOfRange);
        }
        self.document.notes.remove(index);
        self.emit(SheetEvent::NotesChanged);
        EditOutcome::Applied
    }

    /// Sets or clears the portrait; the last completed upload wins.
    pub fn set_portrait(&mut self, portrait: Option<Portrait>) {
        self.document.portrait = portrait;
        self.emit(SheetEvent::PortraitChanged);
    }

    pub fn clear_portrait(&mut self) {
        self.set_portrait(None);
    }

    pub fn budget(&self, group: GroupId) -> Option<GroupBudget> {
        let def = self.schema.group(group)?;
        Some(self.enforcer.budget(def, self.document.group(group)?))
    }

    /// Points left in `group`; `None` for unknown or unlimited groups.
    pub fn points_remaining(&self, group: GroupId) -> Option<u32> {
        self.budget(group)?.remaining()
    }

    /// `"remaining/cap"` display string of one group.
    pub fn remaining_display(&self, group: GroupId) -> Option<String> {
        self.budget(group).map(|budget| budget.display())
    }

    /// Enable flags for every control of one group.
    pub fn controls(&self, group: GroupId) -> Option<GroupControls> {
        let def = self.schema.group(group)?;
        Some(self.enforcer.controls(def, self.document.group(group)?))
    }

    fn lookup(&self, group: GroupId) -> Result<(&GroupDef, &GroupValues), Rejection> {
        let def = self.schema.group(group).ok_or(Rejection::UnknownGroup)?;
        let values = self.document.group(group).ok_or(Rejection::UnknownGroup)?;
        Ok((def, values))
    }

    fn group_values(&self, group: GroupId) -> GroupValues {
        self.document.group(group).cloned().unwrap_or_default()
    }

    fn group_values_mut(&mut self, group: GroupId) -> &mut GroupValues {
        self.document.groups.entry(group).or_default()
    }

    fn clamp_all(&self, doc: &mut Document) {
        for def in &self.schema.groups {
            if let Some(values) = doc.groups.get_mut(&def.id) {
                self.enforcer.clamp_to_cap(def, values);
            }
        }
    }

    fn emit(&mut self, event: SheetEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EditOutcome, Rejection, SheetEditor, SheetEvent};
    use crate::config::BudgetCaps;
    use crate::model::schema::{FormSchema, GroupId};
    use std::sync::{Arc, Mutex};

    fn editor() -> SheetEditor {
        SheetEditor::new(FormSchema::standard(), BudgetCaps::default())
    }

    #[test]
    fn read_returns_independent_copy() {
        let mut editor = editor();
        let before = editor.read();
        editor.set_identity("Name", "Changed");
        assert_eq!(before.identity_value("Name"), Some("Unnamed Hero"));
        assert_eq!(editor.read().identity_value("Name"), Some("Changed"));
    }

    #[test]
    fn unknown_labels_are_rejected() {
        let mut editor = editor();
        assert_eq!(
            editor.click_pip(GroupId::Body, "Luck", 1),
            EditOutcome::Rejected(Rejection::UnknownLabel)
        );
        assert_eq!(
            editor.set_identity("Nickname", "Ace"),
            EditOutcome::Rejected(Rejection::UnknownLabel)
        );
        assert_eq!(
            editor.click_pip(GroupId::Body, "Strength", 7),
            EditOutcome::Rejected(Rejection::PipOutOfRange)
        );
    }

    #[test]
    fn apply_clears_stale_pips() {
        let mut editor = editor();
        editor.reset_to_blank();
        assert!(editor.click_pip(GroupId::Skills, "Lore", 5).is_applied());
        let mut incoming = editor.blank_document().clone();
        incoming.groups.get_mut(&GroupId::Skills).unwrap().stats.remove("Lore");

        editor.apply(Some(&incoming));

        assert_eq!(editor.document().group(GroupId::Skills).unwrap().stat("Lore"), 0);
    }

    #[test]
    fn apply_clamps_over_budget_documents() {
        let mut editor = editor();
        let mut incoming = editor.blank_document().clone();
        for value in incoming.groups.get_mut(&GroupId::Body).unwrap().stats.values_mut() {
            *value = 6;
        }

        editor.apply(Some(&incoming));

        assert_eq!(editor.budget(GroupId::Body).unwrap().used, 20);
        assert_eq!(editor.remaining_display(GroupId::Body).as_deref(), Some("0/20"));
    }

    #[test]
    fn sliders_and_mind_traits_ignore_budget() {
        let mut editor = SheetEditor::new(
            FormSchema::standard(),
            BudgetCaps::unlimited().with_cap(GroupId::Mind, 0),
        );
        assert!(editor.toggle_trait(GroupId::Mind, "Curious").is_applied());
        assert!(editor.set_slider(GroupId::Mind, "Cautious / Reckless", 99).is_applied());
        assert_eq!(
            editor.click_pip(GroupId::Mind, "Memory", 1),
            EditOutcome::Rejected(Rejection::OverBudget)
        );
        let mind = editor.document().group(GroupId::Mind).unwrap();
        assert_eq!(mind.sliders["Cautious / Reckless"], 10);
    }

    #[test]
    fn budgeted_trait_is_refused_when_group_is_full() {
        let mut editor = SheetEditor::new(
            FormSchema::standard(),
            BudgetCaps::unlimited().with_cap(GroupId::Skills, 2),
        );
        editor.reset_to_blank();
        assert!(editor.click_pip(GroupId::Skills, "Lore", 2).is_applied());
        assert_eq!(
            editor.toggle_trait(GroupId::Skills, "Literate"),
            EditOutcome::Rejected(Rejection::OverBudget)
        );
        assert!(editor.click_pip(GroupId::Skills, "Lore", 1).is_applied());
        assert!(editor.toggle_trait(GroupId::Skills, "Literate").is_applied());
    }

    #[test]
    fn reset_group_replays_toggle_off_clicks_for_listeners() {
        let mut editor = editor();
        editor.reset_to_blank();
        editor.click_pip(GroupId::Skills, "Melee", 3);
        editor.toggle_trait(GroupId::Skills, "Ambidextrous");
        editor.set_slider(GroupId::Mind, "Logical / Emotional", 9);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        editor.subscribe(Box::new(move |event| sink.lock().unwrap().push(event.clone())));

        editor.reset_group(GroupId::Skills);

        let events = events.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            &[
                SheetEvent::PipClicked {
                    group: GroupId::Skills,
                    stat: "Melee".to_string(),
                    pip: 3,
                    value: 0
                },
                SheetEvent::TraitToggled {
                    group: GroupId::Skills,
                    label: "Ambidextrous".to_string(),
                    checked: false
                },
                SheetEvent::GroupReset(GroupId::Skills),
            ]
        );
        assert_eq!(editor.document().group(GroupId::Mind).unwrap().sliders["Logical / Emotional"], 9);
    }

    #[test]
    fn notes_refuse_duplicate_titles() {
        let mut editor = editor();
        assert_eq!(
            editor.add_note("Backstory"),
            EditOutcome::Rejected(Rejection::DuplicateNoteTitle)
        );
        assert!(editor.add_note("Goals").is_applied());
        assert!(!editor.available_note_titles().contains(&"Goals"));
        assert!(editor.set_note_text(1, "Find the tower").is_applied());
        assert!(editor.remove_note(0).is_applied());
        assert_eq!(editor.document().notes[0].title, "Goals");
    }

    #[test]
    fn set_stat_follows_click_semantics() {
        let mut editor = editor();
        editor.reset_to_blank();
        assert!(editor.set_stat(GroupId::Body, "Agility", 4).is_applied());
        assert_eq!(editor.set_stat(GroupId::Body, "Agility", 4), EditOutcome::Unchanged);
        assert!(editor.set_stat(GroupId::Body, "Agility", 0).is_applied());
        assert_eq!(editor.document().group(GroupId::Body).unwrap().stat("Agility"), 0);
    }
}

//! Version-1 positional `fields` array support.
//!
//! Version-1 files stored one `{t, v}` entry per interactive control in form
//! order, with `t == "c"` marking checkbox state. The version-1 form laid out
//! every group first (stat pips as checkboxes, then sliders on a 0..=100
//! scale, then traits), followed by the identity text inputs. File inputs
//! were never part of the array.
//!
//! # Invariants
//! - Entries map 1:1 onto controls by position.
//! - Extra entries are ignored; controls without an entry are untouched.
//! - An entry whose kind does not fit its control leaves the control as is.

use crate::codec::snapshot::as_integer;
use crate::model::document::Document;
use crate::model::schema::{FormSchema, GroupId};
use serde_json::Value;
use std::collections::BTreeMap;

/// Scale factor between legacy 0..=100 sliders and current 0..=10 sliders.
const LEGACY_SLIDER_SCALE: i64 = 10;

/// One interactive control of the version-1 form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyControl {
    /// Pip checkbox `pip` (1-based) of stat index `stat`.
    Pip { group: GroupId, stat: usize, pip: u8 },
    Slider { group: GroupId, slider: usize },
    Trait { group: GroupId, flag: usize },
    Identity(usize),
}

/// One decoded `{t, v}` entry.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyField {
    /// `t == "c"`: checkbox state.
    Checked(bool),
    /// Any other `t`: text or range value.
    Value(Value),
    /// Malformed entry; keeps its position but touches nothing.
    Skip,
}

/// Control list of `schema` in version-1 document order.
pub fn legacy_controls(schema: &FormSchema) -> Vec<LegacyControl> {
    let mut controls = Vec::new();
    for def in &schema.groups {
        for (stat, stat_def) in def.stats.iter().enumerate() {
            for pip in 1..=stat_def.pips {
                controls.push(LegacyControl::Pip {
                    group: def.id,
                    stat,
                    pip,
                });
            }
        }
        for slider in 0..def.sliders.len() {
            controls.push(LegacyControl::Slider {
                group: def.id,
                slider,
            });
        }
        for flag in 0..def.traits.len() {
            controls.push(LegacyControl::Trait { group: def.id, flag });
        }
    }
    for index in 0..schema.identity.len() {
        controls.push(LegacyControl::Identity(index));
    }
    controls
}

/// Decodes raw `fields` entries, keeping positions of malformed ones.
pub fn parse_legacy_fields(entries: &[Value]) -> Vec<LegacyField> {
    entries
        .iter()
        .map(|entry| {
            let Some(object) = entry.as_object() else {
                return LegacyField::Skip;
            };
            let value = object.get("v").cloned().unwrap_or(Value::Null);
            match object.get("t").and_then(Value::as_str) {
                Some("c") => LegacyField::Checked(truthy(&value)),
                Some(_) => LegacyField::Value(value),
                None => LegacyField::Skip,
            }
        })
        .collect()
}

/// Applies `fields` positionally onto `doc`; returns the number of controls
/// that accepted their entry.
pub fn apply_legacy_fields(doc: &mut Document, schema: &FormSchema, fields: &[LegacyField]) -> usize {
    let controls = legacy_controls(schema);
    let mut pip_states: BTreeMap<(GroupId, usize), Vec<bool>> = BTreeMap::new();
    let mut applied = 0;

    for (control, field) in controls.iter().zip(fields) {
        match (*control, field) {
            (LegacyControl::Pip { group, stat, pip }, LegacyField::Checked(checked)) => {
                let Some(def) = schema.group(group) else {
                    continue;
                };
                let stat_def = &def.stats[stat];
                let states = pip_states.entry((group, stat)).or_insert_with(|| {
                    let value = doc.group(group).map_or(0, |values| values.stat(&stat_def.label));
                    (1..=stat_def.pips).map(|index| index <= value).collect()
                });
                states[usize::from(pip - 1)] = *checked;
                applied += 1;
            }
            (LegacyControl::Slider { group, slider }, LegacyField::Value(raw)) => {
                let Some(def) = schema.group(group) else {
                    continue;
                };
                let Some(legacy) = as_integer(raw) else {
                    continue;
                };
                let slider_def = &def.sliders[slider];
                let scaled = (legacy + LEGACY_SLIDER_SCALE / 2).div_euclid(LEGACY_SLIDER_SCALE);
                doc.groups
                    .entry(group)
                    .or_default()
                    .sliders
                    .insert(slider_def.key(), slider_def.clamp(scaled));
                applied += 1;
            }
            (LegacyControl::Trait { group, flag }, LegacyField::Checked(checked)) => {
                let Some(def) = schema.group(group) else {
                    continue;
                };
                doc.groups
                    .entry(group)
                    .or_default()
                    .traits
                    .insert(def.traits[flag].label.clone(), *checked);
                applied += 1;
            }
            (LegacyControl::Identity(index), LegacyField::Value(raw)) => {
                let text = match raw {
                    Value::String(text) => text.clone(),
                    Value::Number(number) => number.to_string(),
                    _ => continue,
                };
                doc.identity.insert(schema.identity[index].label.clone(), text);
                applied += 1;
            }
            _ => {}
        }
    }

    // Progressive fill: a stat's value is its highest checked pip.
    for ((group, stat), states) in pip_states {
        let Some(def) = schema.group(group) else {
            continue;
        };
        let value = states.iter().rposition(|checked| *checked).map_or(0, |index| index + 1);
        doc.groups
            .entry(group)
            .or_default()
            .stats
            .insert(def.stats[stat].label.clone(), value as u8);
    }

    applied
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|float| float != 0.0),
        Value::String(text) => matches!(text.trim().to_ascii_lowercase().as_str(), "true" | "on" | "1" | "yes"),
        _ => false,
    }
}

//! Points-budget enforcement per allocation group.
//!
//! # Responsibility
//! - Compute consumption and remaining points of one group.
//! - Decide whether an increase (stat pip or budgeted trait) fits.
//! - Clamp externally applied over-budget groups back under the cap.
//!
//! # Invariants
//! - Decreases are always permitted, so a user can always comply.
//! - Mind/social sliders and traits never consume points.
//! - After `clamp_to_cap`, `points_used <= cap`.

use crate::config::BudgetCaps;
use crate::model::document::GroupValues;
use crate::model::schema::{GroupDef, GroupId};
use log::info;

/// Consumption summary of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupBudget {
    pub used: u32,
    /// `None` when the group is not budget-limited.
    pub cap: Option<u32>,
}

impl GroupBudget {
    /// `max(0, cap - used)`; `None` when unlimited.
    pub fn remaining(&self) -> Option<u32> {
        self.cap.map(|cap| cap.saturating_sub(self.used))
    }

    /// Display form `remaining/cap`, or `used` alone when unlimited.
    pub fn display(&self) -> String {
        match self.cap {
            Some(cap) => format!("{}/{}", cap.saturating_sub(self.used), cap),
            None => self.used.to_string(),
        }
    }
}

/// Enable flags for one stat's pips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatControls {
    pub label: String,
    pub value: u8,
    /// `enabled[i]` refers to pip `i + 1`.
    pub enabled: Vec<bool>,
}

/// Enable flag for one trait checkbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitControl {
    pub label: String,
    pub checked: bool,
    pub enabled: bool,
}

/// Control state of one group, as consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupControls {
    pub group: GroupId,
    pub budget: GroupBudget,
    pub stats: Vec<StatControls>,
    pub traits: Vec<TraitControl>,
}

/// Budget rules bound to a cap table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetEnforcer {
    caps: BudgetCaps,
}

impl BudgetEnforcer {
    pub fn new(caps: BudgetCaps) -> Self {
        Self { caps }
    }

    pub fn caps(&self) -> &BudgetCaps {
        &self.caps
    }

    /// Points consumed by stats plus, where the schema says so, checked traits.
    pub fn points_used(&self, def: &GroupDef, values: &GroupValues) -> u32 {
        let stats: u32 = def
            .stats
            .iter()
            .map(|stat| u32::from(values.stat(&stat.label)))
            .sum();
        let traits = if def.traits_consume_budget {
            def.traits
                .iter()
                .filter(|flag| values.trait_checked(&flag.label))
                .count() as u32
        } else {
            0
        };
        stats + traits
    }

    pub fn budget(&self, def: &GroupDef, values: &GroupValues) -> GroupBudget {
        GroupBudget {
            used: self.points_used(def, values),
            cap: self.caps.cap(def.id),
        }
    }

    /// Whether moving stat `label` from its current value to `desired` fits.
    ///
    /// Decreases always fit. Increases fit when
    /// `points_used - current + desired <= cap`.
    pub fn permits_stat(&self, def: &GroupDef, values: &GroupValues, label: &str, desired: u8) -> bool {
        let current = values.stat(label);
        if desired <= current {
            return true;
        }
        let Some(cap) = self.caps.cap(def.id) else {
            return true;
        };
        let other = self.points_used(def, values).saturating_sub(u32::from(current));
        other + u32::from(desired) <= cap
    }

    /// Whether setting trait `label` to `checked` fits.
    pub fn permits_trait(&self, def: &GroupDef, values: &GroupValues, label: &str, checked: bool) -> bool {
        let current = values.trait_checked(label);
        if !checked || current || !def.traits_consume_budget {
            return true;
        }
        match self.caps.cap(def.id) {
            Some(cap) => self.points_used(def, values) < cap,
            None => true,
        }
    }

    /// Clears points until the group fits its cap; returns points removed.
    ///
    /// Budgeted traits are unchecked last-to-first, then stats are reduced
    /// from the last stat backwards.
    pub fn clamp_to_cap(&self, def: &GroupDef, values: &mut GroupValues) -> u32 {
        let Some(cap) = self.caps.cap(def.id) else {
            return 0;
        };
        let used = self.points_used(def, values);
        if used <= cap {
            return 0;
        }
        let mut excess = used - cap;

        if def.traits_consume_budget {
            for flag in def.traits.iter().rev() {
                if excess == 0 {
                    break;
                }
                if let Some(checked) = values.traits.get_mut(&flag.label) {
                    if *checked {
                        *checked = false;
                        excess -= 1;
                    }
                }
            }
        }

        for stat in def.stats.iter().rev() {
            if excess == 0 {
                break;
            }
            if let Some(value) = values.stats.get_mut(&stat.label) {
                let cut = u32::from(*value).min(excess);
                *value -= cut as u8;
                excess -= cut;
            }
        }

        info!(
            "event=budget_clamp module=budget status=ok group={} used_before={} cap={}",
            def.id.key(),
            used,
            cap
        );
        used - cap - excess
    }

    /// Enable flags for every pip and trait of one group.
    ///
    /// A filled pip is always enabled; an unfilled pip is enabled when the
    /// increase to it fits. With cap 0 only filled pips stay enabled.
    pub fn controls(&self, def: &GroupDef, values: &GroupValues) -> GroupControls {
        let stats = def
            .stats
            .iter()
            .map(|stat| {
                let value = values.stat(&stat.label);
                let enabled = (1..=stat.pips)
                    .map(|pip| pip <= value || self.permits_stat(def, values, &stat.label, pip))
                    .collect();
                StatControls {
                    label: stat.label.clone(),
                    value,
                    enabled,
                }
            })
            .collect();
        let traits = def
            .traits
            .iter()
            .map(|flag| {
                let checked = values.trait_checked(&flag.label);
                TraitControl {
                    label: flag.label.clone(),
                    checked,
                    enabled: self.permits_trait(def, values, &flag.label, true),
                }
            })
            .collect();
        GroupControls {
            group: def.id,
            budget: self.budget(def, values),
            stats,
            traits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BudgetEnforcer;
    use crate::config::BudgetCaps;
    use crate::model::document::Document;
    use crate::model::schema::{FormSchema, GroupDef, GroupId};

    fn body_values(schema: &FormSchema) -> crate::model::document::GroupValues {
        Document::blank_for(schema)
            .groups
            .remove(&GroupId::Body)
            .expect("body")
    }

    #[test]
    fn increase_is_rejected_when_it_would_exceed_cap() {
        let schema = FormSchema::standard();
        let def = schema.group(GroupId::Body).expect("body");
        let enforcer = BudgetEnforcer::new(BudgetCaps::default());
        let mut values = body_values(&schema);
        values.stats.insert("Strength".to_string(), 6);
        values.stats.insert("Dexterity".to_string(), 6);
        values.stats.insert("Health".to_string(), 6);

        assert!(enforcer.permits_stat(def, &values, "Agility", 2));
        assert!(!enforcer.permits_stat(def, &values, "Agility", 3));
        assert!(enforcer.permits_stat(def, &values, "Strength", 1));
        assert_eq!(enforcer.budget(def, &values).display(), "2/20");
    }

    #[test]
    fn zero_cap_keeps_filled_pips_enabled() {
        let schema = FormSchema::standard();
        let def = schema.group(GroupId::Body).expect("body");
        let enforcer = BudgetEnforcer::new(BudgetCaps::unlimited().with_cap(GroupId::Body, 0));
        let mut values = body_values(&schema);
        values.stats.insert("Strength".to_string(), 2);

        let controls = enforcer.controls(def, &values);
        let strength = &controls.stats[0];
        assert_eq!(strength.enabled, vec![true, true, false, false, false, false]);
        assert!(controls.stats[1].enabled.iter().all(|enabled| !enabled));
        assert_eq!(controls.budget.remaining(), Some(0));
    }

    #[test]
    fn budgeted_traits_cost_one_point_and_free_traits_cost_nothing() {
        let schema = FormSchema::standard();
        let enforcer = BudgetEnforcer::new(BudgetCaps::default());
        let mut doc = Document::blank_for(&schema);

        let skills = schema.group(GroupId::Skills).expect("skills");
        let values = doc.groups.get_mut(&GroupId::Skills).expect("skills");
        values.traits.insert("Literate".to_string(), true);
        assert_eq!(enforcer.points_used(skills, values), 1);

        let mind = schema.group(GroupId::Mind).expect("mind");
        let values = doc.groups.get_mut(&GroupId::Mind).expect("mind");
        values.traits.insert("Curious".to_string(), true);
        values.sliders.insert("Logical / Emotional".to_string(), 10);
        assert_eq!(enforcer.points_used(mind, values), 0);
    }

    #[test]
    fn clamp_unchecks_traits_before_reducing_stats() {
        let def = GroupDef::new(GroupId::Skills)
            .stat("Lore", 5)
            .stat("Melee", 5)
            .trait_flag("Literate")
            .trait_flag("Ambidextrous");
        let enforcer = BudgetEnforcer::new(BudgetCaps::unlimited().with_cap(GroupId::Skills, 4));
        let mut values = crate::model::document::GroupValues::default();
        values.stats.insert("Lore".to_string(), 3);
        values.stats.insert("Melee".to_string(), 2);
        values.traits.insert("Literate".to_string(), true);
        values.traits.insert("Ambidextrous".to_string(), true);

        let removed = enforcer.clamp_to_cap(&def, &mut values);

        assert_eq!(removed, 3);
        assert!(!values.trait_checked("Literate"));
        assert!(!values.trait_checked("Ambidextrous"));
        assert_eq!(values.stat("Lore"), 3);
        assert_eq!(values.stat("Melee"), 1);
        assert_eq!(enforcer.points_used(&def, &values), 4);
    }

    #[test]
    fn unlimited_group_displays_points_used() {
        let schema = FormSchema::standard();
        let def = schema.group(GroupId::Body).expect("body");
        let enforcer = BudgetEnforcer::new(BudgetCaps::unlimited());
        let values = Document::default_for(&schema)
            .groups
            .remove(&GroupId::Body)
            .expect("body");
        assert_eq!(enforcer.budget(def, &values).display(), "6");
        assert!(enforcer.permits_stat(def, &values, "Strength", 6));
    }
}

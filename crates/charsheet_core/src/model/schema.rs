//! Fixed form schema shared by the editor and the snapshot builders.
//!
//! # Responsibility
//! - Enumerate identity labels, note titles, stats, sliders and traits.
//! - Carry per-label constants (pip counts, slider ranges, defaults).
//!
//! # Invariants
//! - Labels are a closed set; nothing outside the schema is ever stored.
//! - `StatDef::default <= StatDef::pips`.
//! - `SliderDef::min <= SliderDef::default <= SliderDef::max`.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Current structured document version.
pub const DOCUMENT_VERSION: u32 = 2;
/// Legacy positional `fields` array version.
pub const LEGACY_DOCUMENT_VERSION: u32 = 1;

static STANDARD_SCHEMA: Lazy<Arc<FormSchema>> = Lazy::new(|| Arc::new(build_standard()));

/// Allocation group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupId {
    Body,
    Skills,
    Priorities,
    Mind,
    Social,
}

impl GroupId {
    /// All groups in form order.
    pub const ALL: [GroupId; 5] = [
        GroupId::Body,
        GroupId::Skills,
        GroupId::Priorities,
        GroupId::Mind,
        GroupId::Social,
    ];

    /// Snapshot key of this group.
    pub fn key(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Skills => "skills",
            Self::Priorities => "priorities",
            Self::Mind => "mind",
            Self::Social => "social",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "body" => Some(Self::Body),
            "skills" => Some(Self::Skills),
            "priorities" => Some(Self::Priorities),
            "mind" => Some(Self::Mind),
            "social" => Some(Self::Social),
            _ => None,
        }
    }
}

/// One ordinal point-buy stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatDef {
    pub label: String,
    /// Number of pips rendered for this stat.
    pub pips: u8,
    /// Value used by the default (not blank) document.
    pub default: u8,
}

/// One bipolar slider, keyed as `"Left / Right"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliderDef {
    pub left: String,
    pub right: String,
    pub min: u8,
    pub max: u8,
    /// Midpoint kept by both default and blank documents.
    pub default: u8,
}

impl SliderDef {
    /// Snapshot key for this slider.
    pub fn key(&self) -> String {
        format!("{} / {}", self.left, self.right)
    }

    /// Clamps an arbitrary integer into the slider range.
    pub fn clamp(&self, value: i64) -> u8 {
        let clamped = value.clamp(i64::from(self.min), i64::from(self.max));
        u8::try_from(clamped).unwrap_or(self.default)
    }
}

/// One boolean trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitDef {
    pub label: String,
    pub default: bool,
}

/// Definition of one allocation group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDef {
    pub id: GroupId,
    pub stats: Vec<StatDef>,
    pub sliders: Vec<SliderDef>,
    pub traits: Vec<TraitDef>,
    /// Whether checked traits count against the group budget.
    ///
    /// Mind and social traits are free; every other group pays one point
    /// per checked trait.
    pub traits_consume_budget: bool,
}

impl GroupDef {
    /// Creates an empty group with the budget rule of its id.
    pub fn new(id: GroupId) -> Self {
        Self {
            id,
            stats: Vec::new(),
            sliders: Vec::new(),
            traits: Vec::new(),
            traits_consume_budget: !matches!(id, GroupId::Mind | GroupId::Social),
        }
    }

    pub fn stat(mut self, label: &str, pips: u8) -> Self {
        self.stats.push(StatDef {
            label: label.to_string(),
            pips,
            default: 0,
        });
        self
    }

    pub fn stat_with_default(mut self, label: &str, pips: u8, default: u8) -> Self {
        self.stats.push(StatDef {
            label: label.to_string(),
            pips,
            default: default.min(pips),
        });
        self
    }

    /// Adds a 0..=10 slider with midpoint 5.
    pub fn slider(mut self, left: &str, right: &str) -> Self {
        self.sliders.push(SliderDef {
            left: left.to_string(),
            right: right.to_string(),
            min: 0,
            max: 10,
            default: 5,
        });
        self
    }

    pub fn trait_flag(mut self, label: &str) -> Self {
        self.traits.push(TraitDef {
            label: label.to_string(),
            default: false,
        });
        self
    }

    pub fn stat_index(&self, label: &str) -> Option<usize> {
        self.stats.iter().position(|stat| stat.label == label)
    }

    pub fn slider_index(&self, key: &str) -> Option<usize> {
        self.sliders.iter().position(|slider| slider.key() == key)
    }

    pub fn trait_index(&self, label: &str) -> Option<usize> {
        self.traits.iter().position(|flag| flag.label == label)
    }
}

/// One identity text field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityFieldDef {
    pub label: String,
    /// Placeholder value of the default document.
    pub default: String,
}

/// Complete form definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSchema {
    pub identity: Vec<IdentityFieldDef>,
    /// Enumerated note titles in menu order.
    pub note_titles: Vec<String>,
    /// Titles of the (empty) notes present in the default document.
    pub default_notes: Vec<String>,
    /// Groups in form order.
    pub groups: Vec<GroupDef>,
}

impl FormSchema {
    /// Returns the shared built-in form.
    pub fn standard() -> Arc<FormSchema> {
        Arc::clone(&STANDARD_SCHEMA)
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupDef> {
        self.groups.iter().find(|group| group.id == id)
    }

    pub fn has_identity_label(&self, label: &str) -> bool {
        self.identity.iter().any(|field| field.label == label)
    }

    pub fn has_note_title(&self, title: &str) -> bool {
        self.note_titles.iter().any(|known| known == title)
    }

    /// Label of the identity field used for display names, if present.
    pub fn name_label(&self) -> Option<&str> {
        self.identity
            .iter()
            .find(|field| field.label.eq_ignore_ascii_case("name"))
            .map(|field| field.label.as_str())
    }
}

fn identity_field(label: &str, default: &str) -> IdentityFieldDef {
    IdentityFieldDef {
        label: label.to_string(),
        default: default.to_string(),
    }
}

fn build_standard() -> FormSchema {
    let body = GroupDef::new(GroupId::Body)
        .stat_with_default("Strength", 6, 1)
        .stat_with_default("Dexterity", 6, 1)
        .stat_with_default("Health", 6, 1)
        .stat_with_default("Agility", 6, 1)
        .stat_with_default("Endurance", 6, 1)
        .stat_with_default("Perception", 6, 1);

    let skills = GroupDef::new(GroupId::Skills)
        .stat("Athletics", 5)
        .stat("Stealth", 5)
        .stat("Melee", 5)
        .stat("Marksmanship", 5)
        .stat("Crafting", 5)
        .stat("Medicine", 5)
        .stat("Lore", 5)
        .stat("Survival", 5)
        .trait_flag("Literate")
        .trait_flag("Ambidextrous");

    let priorities = GroupDef::new(GroupId::Priorities)
        .stat("Wealth", 4)
        .stat("Status", 4)
        .stat("Knowledge", 4)
        .stat("Faith", 4)
        .stat("Family", 4);

    let mind = GroupDef::new(GroupId::Mind)
        .stat("Intellect", 5)
        .stat("Willpower", 5)
        .stat("Intuition", 5)
        .stat("Memory", 5)
        .slider("Logical", "Emotional")
        .slider("Cautious", "Reckless")
        .slider("Optimistic", "Pessimistic")
        .trait_flag("Curious")
        .trait_flag("Stubborn")
        .trait_flag("Honest");

    let social = GroupDef::new(GroupId::Social)
        .stat("Charm", 5)
        .stat("Empathy", 5)
        .stat("Deception", 5)
        .stat("Leadership", 5)
        .slider("Introvert", "Extrovert")
        .slider("Humble", "Proud")
        .slider("Forgiving", "Vengeful")
        .trait_flag("Loyal")
        .trait_flag("Jealous")
        .trait_flag("Generous");

    FormSchema {
        identity: vec![
            identity_field("Name", "Unnamed Hero"),
            identity_field("Age", "30"),
            identity_field("Gender", "Unspecified"),
            identity_field("Height", "170 cm"),
            identity_field("Weight", "70 kg"),
            identity_field("Occupation", "Wanderer"),
            identity_field("Origin", "Unknown"),
        ],
        note_titles: [
            "Backstory",
            "Appearance",
            "Personality",
            "Goals",
            "Fears",
            "Secrets",
        ]
        .into_iter()
        .map(str::to_string)
        .collect(),
        default_notes: vec!["Backstory".to_string()],
        groups: vec![body, skills, priorities, mind, social],
    }
}

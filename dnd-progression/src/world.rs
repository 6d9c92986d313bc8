//! D&D 5e vocabulary the progression engine reasons about.
//!
//! Rules content (class tables, spell lists) comes from the API. This module
//! only carries what the wizard predicates and hit point maths need for the
//! core classes and races: hit dice, when a class starts casting, which races
//! branch into subraces. Class tracks themselves are keyed by API slug.

use crate::dice::DieType;
use crate::hp::{apply_hp_delta, apply_temp_hp, HpDelta, HpOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A slug that doesn't match any known race or class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{slug}`")]
pub struct UnknownSlug {
    pub kind: &'static str,
    pub slug: String,
}

// ============================================================================
// Hit Points
// ============================================================================

/// Hit points tracking.
///
/// Fields are public for display and deserialization; changes should go
/// through [`HitPoints::apply_delta`] and [`HitPoints::grant_temporary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    #[serde(alias = "maximum")]
    pub max: i32,
    #[serde(default)]
    pub temporary: i32,
}

impl HitPoints {
    pub fn new(max: i32) -> Self {
        Self {
            current: max,
            max,
            temporary: 0,
        }
    }

    /// Apply damage (negative) or healing (positive).
    pub fn apply_delta(&mut self, delta: i32) -> HpOutcome {
        let outcome = apply_hp_delta(HpDelta {
            delta,
            current_hp: self.current,
            max_hp: self.max,
            temp_hp: self.temporary,
        });
        self.current = outcome.new_current_hp;
        self.temporary = outcome.new_temp_hp;
        outcome
    }

    /// Grant temporary hit points, keeping the larger pool.
    pub fn grant_temporary(&mut self, amount: i32) -> i32 {
        self.temporary = apply_temp_hp(amount, self.temporary);
        self.temporary
    }
}

// ============================================================================
// Classes
// ============================================================================

/// D&D 5e character classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterClass {
    Barbarian,
    Bard,
    Cleric,
    Druid,
    Fighter,
    Monk,
    Paladin,
    Ranger,
    Rogue,
    Sorcerer,
    Warlock,
    Wizard,
}

impl CharacterClass {
    pub fn hit_die(&self) -> DieType {
        match self {
            CharacterClass::Barbarian => DieType::D12,
            CharacterClass::Fighter | CharacterClass::Paladin | CharacterClass::Ranger => {
                DieType::D10
            }
            CharacterClass::Bard
            | CharacterClass::Cleric
            | CharacterClass::Druid
            | CharacterClass::Monk
            | CharacterClass::Rogue
            | CharacterClass::Warlock => DieType::D8,
            CharacterClass::Sorcerer | CharacterClass::Wizard => DieType::D6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CharacterClass::Barbarian => "Barbarian",
            CharacterClass::Bard => "Bard",
            CharacterClass::Cleric => "Cleric",
            CharacterClass::Druid => "Druid",
            CharacterClass::Fighter => "Fighter",
            CharacterClass::Monk => "Monk",
            CharacterClass::Paladin => "Paladin",
            CharacterClass::Ranger => "Ranger",
            CharacterClass::Rogue => "Rogue",
            CharacterClass::Sorcerer => "Sorcerer",
            CharacterClass::Warlock => "Warlock",
            CharacterClass::Wizard => "Wizard",
        }
    }

    /// API slug, e.g. `"fighter"`.
    pub fn slug(&self) -> &'static str {
        match self {
            CharacterClass::Barbarian => "barbarian",
            CharacterClass::Bard => "bard",
            CharacterClass::Cleric => "cleric",
            CharacterClass::Druid => "druid",
            CharacterClass::Fighter => "fighter",
            CharacterClass::Monk => "monk",
            CharacterClass::Paladin => "paladin",
            CharacterClass::Ranger => "ranger",
            CharacterClass::Rogue => "rogue",
            CharacterClass::Sorcerer => "sorcerer",
            CharacterClass::Warlock => "warlock",
            CharacterClass::Wizard => "wizard",
        }
    }

    /// Returns true if this class has spellcasting at level 1.
    pub fn is_spellcaster(&self) -> bool {
        matches!(
            self,
            CharacterClass::Bard
                | CharacterClass::Cleric
                | CharacterClass::Druid
                | CharacterClass::Sorcerer
                | CharacterClass::Warlock
                | CharacterClass::Wizard
        )
    }

    /// Whether the class casts spells at the given class level.
    ///
    /// Paladin and Ranger get spellcasting at level 2.
    pub fn casts_at(&self, level: u8) -> bool {
        match self {
            CharacterClass::Paladin | CharacterClass::Ranger => level >= 2,
            _ => self.is_spellcaster(),
        }
    }

    pub fn all() -> &'static [CharacterClass] {
        &[
            CharacterClass::Barbarian,
            CharacterClass::Bard,
            CharacterClass::Cleric,
            CharacterClass::Druid,
            CharacterClass::Fighter,
            CharacterClass::Monk,
            CharacterClass::Paladin,
            CharacterClass::Ranger,
            CharacterClass::Rogue,
            CharacterClass::Sorcerer,
            CharacterClass::Warlock,
            CharacterClass::Wizard,
        ]
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CharacterClass {
    type Err = UnknownSlug;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CharacterClass::all()
            .iter()
            .copied()
            .find(|c| c.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSlug {
                kind: "class",
                slug: s.to_string(),
            })
    }
}

/// Levels held in one class.
///
/// Keyed by the API's class slug, which is passed back unchanged. Classes
/// outside [`CharacterClass`] (artificer, homebrew, source-prefixed slugs)
/// work the same way; they just carry their hit die explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLevel {
    pub slug: String,
    pub level: u8,
    /// `None` until the class data has been seen.
    #[serde(default)]
    pub hit_die: Option<DieType>,
    #[serde(default)]
    pub subclass: Option<String>,
}

impl ClassLevel {
    /// A level in one of the core classes.
    pub fn new(class: CharacterClass, level: u8) -> Self {
        Self::with_slug(class.slug(), level, Some(class.hit_die()))
    }

    pub fn with_slug(slug: impl Into<String>, level: u8, hit_die: Option<DieType>) -> Self {
        Self {
            slug: slug.into(),
            level,
            hit_die,
            subclass: None,
        }
    }

    /// The core class behind the slug, if it is one.
    pub fn class(&self) -> Option<CharacterClass> {
        self.slug.parse().ok()
    }

    /// Whether this class track casts spells at its current level.
    ///
    /// Unknown classes report `false`; their spell steps follow pending
    /// spell choices instead.
    pub fn casts_spells(&self) -> bool {
        self.class().is_some_and(|c| c.casts_at(self.level))
    }
}

// ============================================================================
// Races
// ============================================================================

/// D&D 5e playable races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RaceType {
    Human,
    Elf,
    Dwarf,
    Halfling,
    HalfOrc,
    HalfElf,
    Tiefling,
    Gnome,
    Dragonborn,
}

impl RaceType {
    pub fn name(&self) -> &'static str {
        match self {
            RaceType::Human => "Human",
            RaceType::Elf => "Elf",
            RaceType::Dwarf => "Dwarf",
            RaceType::Halfling => "Halfling",
            RaceType::HalfOrc => "Half-Orc",
            RaceType::HalfElf => "Half-Elf",
            RaceType::Tiefling => "Tiefling",
            RaceType::Gnome => "Gnome",
            RaceType::Dragonborn => "Dragonborn",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            RaceType::Human => "human",
            RaceType::Elf => "elf",
            RaceType::Dwarf => "dwarf",
            RaceType::Halfling => "halfling",
            RaceType::HalfOrc => "half-orc",
            RaceType::HalfElf => "half-elf",
            RaceType::Tiefling => "tiefling",
            RaceType::Gnome => "gnome",
            RaceType::Dragonborn => "dragonborn",
        }
    }

    /// PHB subraces, by slug.
    pub fn subraces(&self) -> &'static [&'static str] {
        match self {
            RaceType::Elf => &["high-elf", "wood-elf", "drow"],
            RaceType::Dwarf => &["hill-dwarf", "mountain-dwarf"],
            RaceType::Halfling => &["lightfoot", "stout"],
            RaceType::Gnome => &["forest-gnome", "rock-gnome"],
            _ => &[],
        }
    }

    pub fn has_subraces(&self) -> bool {
        !self.subraces().is_empty()
    }

    pub fn all() -> &'static [RaceType] {
        &[
            RaceType::Human,
            RaceType::Elf,
            RaceType::Dwarf,
            RaceType::Halfling,
            RaceType::HalfOrc,
            RaceType::HalfElf,
            RaceType::Tiefling,
            RaceType::Gnome,
            RaceType::Dragonborn,
        ]
    }
}

impl fmt::Display for RaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for RaceType {
    type Err = UnknownSlug;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RaceType::all()
            .iter()
            .copied()
            .find(|r| r.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSlug {
                kind: "race",
                slug: s.to_string(),
            })
    }
}

//! Hit point arithmetic.
//!
//! Damage, healing and temporary hit points go through [`apply_hp_delta`]
//! and [`apply_temp_hp`]; level-up gains through [`hit_point_gain`]. All of
//! these are pure. [`persist_hp_change`] is the only function here that
//! talks to the API.

use crate::dice::DieType;
use crate::world::HitPoints;
use compendium_api::{CharacterApi, HitPointsUpdate};
use serde::{Deserialize, Serialize};

/// Input to [`apply_hp_delta`]. Negative `delta` is damage, positive is healing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpDelta {
    pub delta: i32,
    pub current_hp: i32,
    pub max_hp: i32,
    pub temp_hp: i32,
}

/// Output of [`apply_hp_delta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpOutcome {
    pub new_current_hp: i32,
    pub new_temp_hp: i32,
}

/// Apply damage or healing.
///
/// Temporary hit points absorb damage first. Healing is capped at `max_hp`
/// and never restores temporary hit points. Damage past zero is discarded.
/// Callers must pass `max_hp >= 0` and `temp_hp >= 0`.
pub fn apply_hp_delta(input: HpDelta) -> HpOutcome {
    let HpDelta {
        delta,
        current_hp,
        max_hp,
        temp_hp,
    } = input;

    if delta == 0 {
        return HpOutcome {
            new_current_hp: current_hp,
            new_temp_hp: temp_hp,
        };
    }

    if delta > 0 {
        return HpOutcome {
            new_current_hp: current_hp.saturating_add(delta).min(max_hp),
            new_temp_hp: temp_hp,
        };
    }

    let damage = delta.saturating_neg();
    let absorbed = temp_hp.min(damage);
    let remaining = damage - absorbed;

    HpOutcome {
        new_current_hp: current_hp.saturating_sub(remaining).max(0),
        new_temp_hp: temp_hp - absorbed,
    }
}

/// Temporary hit points don't stack: keep the larger pool.
pub fn apply_temp_hp(new_temp_hp: i32, current_temp_hp: i32) -> i32 {
    new_temp_hp.max(current_temp_hp)
}

// ============================================================================
// Level-up gains
// ============================================================================

/// How the hit die for a level was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HpRoll {
    /// Take the fixed average.
    Average,
    /// A die roll made by the player.
    Rolled(u8),
}

impl HpRoll {
    /// Selection id sent when resolving a hit point choice.
    pub fn selection(&self) -> &'static str {
        match self {
            HpRoll::Average => "average",
            HpRoll::Rolled(_) => "roll",
        }
    }
}

/// Hit points gained for one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpGain {
    pub method: HpRoll,
    pub die: DieType,
    pub die_value: u8,
    pub con_modifier: i8,
    /// `die_value + con_modifier`, minimum 1.
    pub total: i32,
}

/// Compute the hit point gain for one level of a class with the given die.
pub fn hit_point_gain(die: DieType, con_modifier: i8, roll: HpRoll) -> HpGain {
    let (method, die_value) = match roll {
        HpRoll::Average => (HpRoll::Average, die.average()),
        HpRoll::Rolled(value) => {
            let value = die.clamp_roll(value);
            (HpRoll::Rolled(value), value)
        }
    };

    HpGain {
        method,
        die,
        die_value,
        con_modifier,
        total: (i32::from(die_value) + i32::from(con_modifier)).max(1),
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// A change to a character's hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpChange {
    /// Damage (negative) or healing (positive).
    Delta(i32),
    /// A new temporary hit point grant.
    Temporary(i32),
}

/// Apply a change locally and PATCH the result to the API.
///
/// Returns the updated hit points; `hp` is left untouched if the request fails.
pub async fn persist_hp_change(
    api: &dyn CharacterApi,
    character_id: &str,
    hp: &HitPoints,
    change: HpChange,
) -> Result<HitPoints, compendium_api::Error> {
    let mut next = hp.clone();
    match change {
        HpChange::Delta(delta) => {
            next.apply_delta(delta);
        }
        HpChange::Temporary(amount) => {
            next.grant_temporary(amount);
        }
    }

    api.update_hit_points(
        character_id,
        &HitPointsUpdate {
            current: next.current,
            temporary: next.temporary,
        },
    )
    .await?;

    tracing::debug!(
        character_id,
        current = next.current,
        temporary = next.temporary,
        "hit points updated"
    );
    Ok(next)
}

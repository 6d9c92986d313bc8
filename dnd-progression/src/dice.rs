//! Hit dice.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Die sizes a class can use as its hit die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DieType {
    D6,
    D8,
    D10,
    D12,
}

impl DieType {
    pub fn sides(&self) -> u8 {
        match self {
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
        }
    }

    pub fn from_sides(sides: u8) -> Option<DieType> {
        match sides {
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            _ => None,
        }
    }

    /// The fixed "take average" value: `ceil((sides + 1) / 2)`.
    pub fn average(&self) -> u8 {
        (self.sides() + 2) / 2
    }

    /// Roll the die once.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> u8 {
        rng.gen_range(1..=self.sides())
    }

    /// Clamp an externally supplied roll into `1..=sides`.
    pub fn clamp_roll(&self, value: u8) -> u8 {
        value.clamp(1, self.sides())
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

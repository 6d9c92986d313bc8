//! D&D 5e character progression and choice resolution.
//!
//! This crate provides:
//! - Hit point arithmetic for damage, healing, temporary hit points and level-up gains
//! - A store for a character's pending choices, refreshed from the character API
//! - Staged multi-select over pending choices with batched saves
//! - Declarative wizard steps for character creation and level-up
//! - The level-up flow that ties these together
//!
//! # Quick Start
//!
//! ```ignore
//! use dnd_progression::{LevelUpWizard, PendingChoices, HpRoll};
//! use compendium_api::Compendium;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = Arc::new(Compendium::from_env()?);
//!     let choices = Arc::new(PendingChoices::new(api.clone()));
//!     let wizard = LevelUpWizard::new(api, choices);
//!
//!     wizard.open_wizard("42", "thorin-7f3a", classes, 3);
//!     wizard.level_up("fighter").await?;
//!     wizard.choose_hit_points(HpRoll::Average, 2).await?;
//!     Ok(())
//! }
//! ```

pub mod choices;
pub mod dice;
pub mod hp;
pub mod level_up;
pub mod selection;
pub mod testing;
pub mod wizard;
pub mod world;

// Primary public API
pub use choices::{all_required_complete, choices_by_type, ChoiceError, PendingChoices, PendingFlags};
pub use hp::{apply_hp_delta, apply_temp_hp, hit_point_gain, HpDelta, HpOutcome, HpRoll};
pub use level_up::{LevelUpError, LevelUpPhase, LevelUpWizard};
pub use selection::{ChoiceSelection, ExcludedOptions, NoRestrictions, OptionRule};
pub use testing::FakeCompendium;
pub use wizard::{builder_steps, level_up_steps, StepNavigator, StepRegistry};
pub use world::{CharacterClass, ClassLevel, HitPoints, RaceType};

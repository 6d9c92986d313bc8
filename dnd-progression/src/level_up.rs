//! Level-up orchestration.
//!
//! A [`LevelUpWizard`] holds one level-up session for one character:
//!
//! 1. [`open_wizard`](LevelUpWizard::open_wizard) starts a fresh session.
//! 2. [`level_up`](LevelUpWizard::level_up) commits the level in a class and
//!    refreshes the pending choices the level unlocked.
//! 3. The hit point, ASI and subclass choices are committed through
//!    [`choose_hit_points`](LevelUpWizard::choose_hit_points),
//!    [`choose_asi`](LevelUpWizard::choose_asi) and
//!    [`choose_subclass`](LevelUpWizard::choose_subclass). Everything else goes
//!    through a [`ChoiceSelection`](crate::selection::ChoiceSelection) over the
//!    shared [`PendingChoices`].
//!
//! Closing the wizard keeps the session so it can be resumed with
//! [`reopen_wizard`](LevelUpWizard::reopen_wizard); only
//! [`reset`](LevelUpWizard::reset) and `open_wizard` discard it.

use crate::choices::{ChoiceError, PendingChoices, PendingFlags};
use crate::dice::DieType;
use crate::hp::{hit_point_gain, HpGain, HpRoll};
use crate::wizard::LevelUpState;
use crate::world::{CharacterClass, ClassLevel};
use compendium_api::{
    CharacterApi, ChoiceType, LevelUpResult, ResolveChoiceRequest, SubclassRequest,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Errors from level-up operations.
#[derive(Debug, Error)]
pub enum LevelUpError {
    #[error("API error: {0}")]
    Api(#[from] compendium_api::Error),

    #[error(transparent)]
    Choice(#[from] ChoiceError),

    #[error("Level-up wizard is not open")]
    NotOpen,

    #[error("No level-up has been committed yet")]
    NoLevelUpResult,

    #[error("Unknown class: {0}")]
    UnknownClass(String),

    #[error("No hit die known for class: {0}")]
    UnknownHitDie(String),

    #[error("No pending hit point choice")]
    NoHitPointChoice,

    #[error("No pending ability score improvement")]
    NoAsiChoice,

    #[error("Level-up session changed while the request was in flight")]
    Superseded,
}

/// Where a level-up session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelUpPhase {
    Closed,
    /// Open, no level committed yet.
    SelectingClass,
    HitPoints,
    Choices,
    Complete,
}

#[derive(Debug, Clone, Default)]
struct LevelUpSession {
    open: bool,
    character_id: Option<String>,
    public_id: Option<String>,
    classes: Vec<ClassLevel>,
    total_level: u8,
    /// Fixed when the wizard opens.
    needs_class_selection: bool,
    selected_class: Option<String>,
    result: Option<LevelUpResult>,
    hp_gain: Option<HpGain>,
    /// The committed level granted an ASI, even once it is spent.
    grants_asi: bool,
    leveling: bool,
    /// Bumped whenever the session is replaced; in-flight requests from an
    /// older epoch are not applied.
    epoch: u64,
}

/// The level-up flow for one character at a time.
pub struct LevelUpWizard {
    api: Arc<dyn CharacterApi>,
    choices: Arc<PendingChoices>,
    session: Mutex<LevelUpSession>,
}

impl LevelUpWizard {
    pub fn new(api: Arc<dyn CharacterApi>, choices: Arc<PendingChoices>) -> Self {
        Self {
            api,
            choices,
            session: Mutex::new(LevelUpSession::default()),
        }
    }

    fn session(&self) -> MutexGuard<'_, LevelUpSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The pending choice store the wizard refreshes.
    pub fn choices(&self) -> &Arc<PendingChoices> {
        &self.choices
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start a new session, discarding any previous result.
    pub fn open_wizard(
        &self,
        character_id: &str,
        public_id: &str,
        classes: Vec<ClassLevel>,
        total_level: u8,
    ) {
        {
            let mut session = self.session();
            let epoch = session.epoch + 1;
            *session = LevelUpSession {
                open: true,
                character_id: Some(character_id.to_string()),
                public_id: Some(public_id.to_string()),
                needs_class_selection: classes.len() > 1 || total_level == 1,
                classes,
                total_level,
                epoch,
                ..LevelUpSession::default()
            };
        }
        if self.choices.character_id().as_deref() != Some(character_id) {
            self.choices.clear();
        }
        tracing::debug!(character_id, total_level, "level-up wizard opened");
    }

    /// Show a closed session again without resetting it.
    pub fn reopen_wizard(&self) -> Result<(), LevelUpError> {
        let mut session = self.session();
        if session.character_id.is_none() {
            return Err(LevelUpError::NotOpen);
        }
        session.open = true;
        tracing::debug!(character_id = ?session.character_id, "level-up wizard reopened");
        Ok(())
    }

    /// Hide the wizard. The session is kept.
    pub fn close_wizard(&self) {
        self.session().open = false;
    }

    /// Discard the session and the loaded choices.
    pub fn reset(&self) {
        {
            let mut session = self.session();
            let epoch = session.epoch + 1;
            *session = LevelUpSession {
                epoch,
                ..LevelUpSession::default()
            };
        }
        self.choices.clear();
        tracing::debug!("level-up session reset");
    }

    // ========================================================================
    // Commits
    // ========================================================================

    /// Commit a level in `class_slug`, then refresh pending choices.
    ///
    /// The slug goes to the API unchanged; the API decides whether the class
    /// exists. On failure the previous result is left as it was.
    pub async fn level_up(&self, class_slug: &str) -> Result<LevelUpResult, LevelUpError> {
        let class_slug = class_slug.trim();
        if class_slug.is_empty() {
            return Err(LevelUpError::UnknownClass(class_slug.to_string()));
        }

        let (character_id, public_id, epoch) = {
            let mut session = self.session();
            if !session.open {
                return Err(LevelUpError::NotOpen);
            }
            let (Some(character_id), Some(public_id)) =
                (session.character_id.clone(), session.public_id.clone())
            else {
                return Err(LevelUpError::NotOpen);
            };
            session.leveling = true;
            (character_id, public_id, session.epoch)
        };

        let response = self.api.level_up(&public_id, class_slug).await;

        let result = {
            let mut session = self.session();
            if session.epoch != epoch {
                tracing::warn!(
                    character_id = %character_id,
                    class_slug,
                    "discarding level-up result for a replaced session"
                );
                return Err(LevelUpError::Superseded);
            }
            session.leveling = false;
            let result = response?;

            let hit_die = result
                .hit_die
                .and_then(DieType::from_sides)
                .or_else(|| class_slug.parse::<CharacterClass>().ok().map(|c| c.hit_die()));
            match session.classes.iter_mut().find(|c| c.slug == class_slug) {
                Some(entry) => {
                    entry.level = result.class_level.unwrap_or(entry.level + 1);
                    entry.hit_die = entry.hit_die.or(hit_die);
                }
                None => session.classes.push(ClassLevel::with_slug(
                    class_slug,
                    result.class_level.unwrap_or(1),
                    hit_die,
                )),
            }
            session.total_level = if result.new_level > 0 {
                result.new_level
            } else {
                session.total_level.saturating_add(1)
            };
            session.selected_class = Some(class_slug.to_string());
            session.grants_asi = result.asi_pending;
            session.hp_gain = None;
            session.result = Some(result.clone());
            result
        };

        tracing::info!(
            character_id = %character_id,
            class_slug,
            new_level = result.new_level,
            hp_choice_pending = result.hp_choice_pending,
            asi_pending = result.asi_pending,
            "level-up committed"
        );

        self.choices.fetch_choices(&character_id, None).await;
        Ok(result)
    }

    /// Resolve the hit point choice for the committed level.
    pub async fn choose_hit_points(
        &self,
        roll: HpRoll,
        con_modifier: i8,
    ) -> Result<HpGain, LevelUpError> {
        let (die, epoch) = self.committed_hit_die()?;
        let choice = self
            .choices
            .first_of(ChoiceType::HitPoints)
            .ok_or(LevelUpError::NoHitPointChoice)?;

        let gain = hit_point_gain(die, con_modifier, roll);
        let mut request = ResolveChoiceRequest::new(vec![roll.selection().to_string()]);
        if let HpRoll::Rolled(value) = gain.method {
            request = request.with_roll_result(value);
        }
        self.choices.resolve_with(&choice.id, request).await?;

        let mut session = self.session();
        if session.epoch == epoch {
            if let Some(result) = session.result.as_mut() {
                result.hp_choice_pending = false;
            }
            session.hp_gain = Some(gain);
        }
        tracing::info!(
            die = %gain.die,
            die_value = gain.die_value,
            total = gain.total,
            "hit points chosen"
        );
        Ok(gain)
    }

    /// Roll the hit die for the committed class and resolve with the roll.
    pub async fn roll_hit_points(&self, con_modifier: i8) -> Result<HpGain, LevelUpError> {
        let (die, _) = self.committed_hit_die()?;
        let value = die.roll(&mut rand::thread_rng());
        self.choose_hit_points(HpRoll::Rolled(value), con_modifier)
            .await
    }

    /// Record the hit die for a class track, for classes whose die the API
    /// did not report.
    pub fn set_hit_die(&self, class_slug: &str, die: DieType) {
        let mut session = self.session();
        if let Some(entry) = session.classes.iter_mut().find(|c| c.slug == class_slug) {
            entry.hit_die = Some(die);
        }
    }

    /// Resolve the pending ASI-or-feat choice.
    pub async fn choose_asi(&self, selections: Vec<String>) -> Result<(), LevelUpError> {
        let (_, epoch) = self.committed_class()?;
        let choice = self
            .choices
            .first_of(ChoiceType::AsiOrFeat)
            .ok_or(LevelUpError::NoAsiChoice)?;

        self.choices.resolve_choice(&choice.id, selections).await?;

        let still_pending = self.choices.first_of(ChoiceType::AsiOrFeat).is_some();
        let mut session = self.session();
        if session.epoch == epoch && !still_pending {
            if let Some(result) = session.result.as_mut() {
                result.asi_pending = false;
            }
        }
        Ok(())
    }

    /// Pick a subclass for the class owning the pending subclass choice.
    ///
    /// Falls back to the class just levelled when the choice id carries no
    /// class.
    pub async fn choose_subclass(
        &self,
        subclass_slug: &str,
        variant_choices: Option<BTreeMap<String, String>>,
    ) -> Result<(), LevelUpError> {
        let (character_id, selected, epoch) = {
            let session = self.session();
            if !session.open {
                return Err(LevelUpError::NotOpen);
            }
            let character_id = session.character_id.clone().ok_or(LevelUpError::NotOpen)?;
            (character_id, session.selected_class.clone(), session.epoch)
        };

        let from_choice = self
            .choices
            .first_of(ChoiceType::Subclass)
            .and_then(|c| c.key().ok())
            .filter(|key| key.source == "class" && !key.source_id.is_empty())
            .map(|key| key.source_id);
        let class_slug = from_choice
            .or(selected)
            .ok_or(LevelUpError::NoLevelUpResult)?;

        let request = SubclassRequest {
            subclass_slug: subclass_slug.to_string(),
            variant_choices,
        };
        self.api
            .set_subclass(&character_id, &class_slug, &request)
            .await?;

        {
            let mut session = self.session();
            if session.epoch == epoch {
                if let Some(entry) = session.classes.iter_mut().find(|c| c.slug == class_slug) {
                    entry.subclass = Some(subclass_slug.to_string());
                }
            }
        }
        tracing::info!(
            character_id = %character_id,
            class_slug = %class_slug,
            subclass_slug,
            "subclass chosen"
        );

        self.choices.refresh().await;
        Ok(())
    }

    fn committed_class(&self) -> Result<(String, u64), LevelUpError> {
        let session = self.session();
        if !session.open {
            return Err(LevelUpError::NotOpen);
        }
        match (session.result.as_ref(), session.selected_class.as_ref()) {
            (Some(_), Some(class_slug)) => Ok((class_slug.clone(), session.epoch)),
            _ => Err(LevelUpError::NoLevelUpResult),
        }
    }

    fn committed_hit_die(&self) -> Result<(DieType, u64), LevelUpError> {
        let (class_slug, epoch) = self.committed_class()?;
        let die = self
            .session()
            .classes
            .iter()
            .find(|c| c.slug == class_slug)
            .and_then(|c| c.hit_die);
        die.map(|d| (d, epoch))
            .ok_or(LevelUpError::UnknownHitDie(class_slug))
    }

    // ========================================================================
    // Derived state
    // ========================================================================

    /// True for multiclassed characters and on the first level-up, where
    /// taking a second class first becomes possible.
    ///
    /// Decided when the wizard opens, so committing the level does not hide
    /// the class step.
    pub fn needs_class_selection(&self) -> bool {
        self.session().needs_class_selection
    }

    /// A level has been committed and neither its HP nor its ASI is outstanding.
    pub fn is_complete(&self) -> bool {
        self.session()
            .result
            .as_ref()
            .is_some_and(|r| !r.hp_choice_pending && !r.asi_pending)
    }

    pub fn phase(&self) -> LevelUpPhase {
        let (open, hp_pending, has_result) = {
            let session = self.session();
            (
                session.open,
                session.result.as_ref().is_some_and(|r| r.hp_choice_pending),
                session.result.is_some(),
            )
        };
        if !open {
            LevelUpPhase::Closed
        } else if !has_result {
            LevelUpPhase::SelectingClass
        } else if hp_pending {
            LevelUpPhase::HitPoints
        } else if self.is_complete() && self.choices.all_required_complete() {
            LevelUpPhase::Complete
        } else {
            LevelUpPhase::Choices
        }
    }

    fn flags(&self) -> PendingFlags {
        self.choices.flags()
    }

    pub fn has_subclass_choice(&self) -> bool {
        self.flags().subclass
    }

    pub fn has_spell_choices(&self) -> bool {
        self.flags().spells
    }

    /// Fighting style, expertise or optional feature.
    pub fn has_feature_choices(&self) -> bool {
        self.flags().features
    }

    pub fn has_language_choices(&self) -> bool {
        self.flags().languages
    }

    pub fn has_proficiency_choices(&self) -> bool {
        self.flags().proficiencies
    }

    /// Input for the level-up step predicates.
    pub fn step_state(&self) -> LevelUpState {
        LevelUpState {
            needs_class_selection: self.needs_class_selection(),
            grants_asi: self.session().grants_asi,
            pending: self.flags(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.session().open
    }

    pub fn is_leveling(&self) -> bool {
        self.session().leveling
    }

    pub fn character_id(&self) -> Option<String> {
        self.session().character_id.clone()
    }

    pub fn classes(&self) -> Vec<ClassLevel> {
        self.session().classes.clone()
    }

    pub fn total_level(&self) -> u8 {
        self.session().total_level
    }

    /// Slug of the class levelled in this session.
    pub fn selected_class(&self) -> Option<String> {
        self.session().selected_class.clone()
    }

    pub fn result(&self) -> Option<LevelUpResult> {
        self.session().result.clone()
    }

    pub fn hp_gain(&self) -> Option<HpGain> {
        self.session().hp_gain
    }
}

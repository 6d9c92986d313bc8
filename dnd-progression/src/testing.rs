//! Testing utilities for the progression engine.
//!
//! This module provides tools for integration testing:
//! - `FakeCompendium`, an in-memory `CharacterApi` that behaves like the server
//! - Builders for pending choices
//! - Assertion helpers for verifying choice state

use crate::choices::PendingChoices;
use async_trait::async_trait;
use compendium_api::{
    CharacterApi, ChoiceOption, ChoiceSource, ChoiceSummary, ChoiceType, Error, HitPointsUpdate,
    LevelUpResult, PendingChoice, PendingChoicesResponse, ResolveChoiceRequest, SubclassRequest,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

// ============================================================================
// Choice builders
// ============================================================================

/// A required pending choice.
///
/// Source and level are taken from the composite id when it parses;
/// `quantity - remaining` placeholder selections are marked as committed.
pub fn choice(id: &str, choice_type: ChoiceType, quantity: u32, remaining: u32) -> PendingChoice {
    let key = id.parse::<compendium_api::ChoiceKey>().ok();
    let source = match key.as_ref().map(|k| k.source.as_str()) {
        Some("race") => ChoiceSource::Race,
        Some("subrace") => ChoiceSource::Subrace,
        Some("background") => ChoiceSource::Background,
        Some("subclass") => ChoiceSource::Subclass,
        Some("feat") => ChoiceSource::Feat,
        _ => ChoiceSource::Class,
    };
    let committed = quantity.saturating_sub(remaining);

    PendingChoice {
        id: id.to_string(),
        choice_type,
        subtype: None,
        source,
        source_name: key
            .as_ref()
            .map(|k| k.source_id.clone())
            .unwrap_or_default(),
        level_granted: key.as_ref().map(|k| k.level).unwrap_or(1),
        required: true,
        quantity,
        remaining: remaining.min(quantity),
        selected: (0..committed).map(|i| format!("committed-{i}")).collect(),
        options: Vec::new(),
        options_endpoint: None,
        metadata: serde_json::Value::Null,
    }
}

/// A choice with inline options.
pub fn choice_with_options(
    id: &str,
    choice_type: ChoiceType,
    quantity: u32,
    options: &[&str],
) -> PendingChoice {
    let mut c = choice(id, choice_type, quantity, quantity);
    c.options = options
        .iter()
        .map(|o| ChoiceOption::new(*o, *o))
        .collect();
    c
}

/// The hit point choice a level-up creates.
pub fn hit_point_choice(class_slug: &str, level: u8) -> PendingChoice {
    let mut c = choice(
        &format!("hit_points:class:{class_slug}:{level}:hp"),
        ChoiceType::HitPoints,
        1,
        1,
    );
    c.options = vec![
        ChoiceOption::new("average", "Take Average"),
        ChoiceOption::new("roll", "Roll"),
    ];
    c
}

// ============================================================================
// Fake API
// ============================================================================

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    PendingChoices,
    ResolveChoice,
    UndoChoice,
    ChoiceOptions,
    LevelUp,
    SetSubclass,
    UpdateHitPoints,
}

/// What a scripted level-up unlocks.
#[derive(Debug, Clone)]
pub struct LevelUnlock {
    pub choices: Vec<PendingChoice>,
    pub asi_pending: bool,
    pub hp_choice_pending: bool,
    /// Hit die sides reported with the result.
    pub hit_die: Option<u8>,
}

impl LevelUnlock {
    /// A level-up that only asks for hit points.
    pub fn hit_points_only() -> Self {
        Self {
            choices: Vec::new(),
            asi_pending: false,
            hp_choice_pending: true,
            hit_die: None,
        }
    }

    pub fn with_hit_die(mut self, sides: u8) -> Self {
        self.hit_die = Some(sides);
        self
    }

    pub fn with_choice(mut self, choice: PendingChoice) -> Self {
        self.choices.push(choice);
        self
    }

    pub fn with_asi(mut self, choice: PendingChoice) -> Self {
        self.asi_pending = true;
        self.choices.push(choice);
        self
    }
}

#[derive(Debug, Default)]
struct FakeCharacter {
    public_id: String,
    level: u8,
    choices: Vec<PendingChoice>,
    level_ups: VecDeque<LevelUnlock>,
    /// Choices that appear once the keyed choice is fully resolved.
    unlocks: HashMap<String, Vec<PendingChoice>>,
    subclasses: HashMap<String, SubclassRequest>,
    hit_points: Option<HitPointsUpdate>,
    resolutions: Vec<(String, ResolveChoiceRequest)>,
}

#[derive(Debug, Default)]
struct FakeState {
    characters: HashMap<String, FakeCharacter>,
    options: HashMap<String, Vec<ChoiceOption>>,
    failures: HashMap<FakeOp, u32>,
    calls: Vec<FakeOp>,
}

/// An in-memory character API.
///
/// Resolving decrements `remaining` and drops exhausted choices, selection
/// counts above `remaining` are rejected with a 422, and level-ups add the
/// choices scripted with [`queue_level_up`](Self::queue_level_up).
#[derive(Debug, Default)]
pub struct FakeCompendium {
    state: Mutex<FakeState>,
}

impl FakeCompendium {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a character with its public id, level and current choices.
    pub fn with_character(
        self,
        character_id: &str,
        public_id: &str,
        level: u8,
        choices: Vec<PendingChoice>,
    ) -> Self {
        self.state().characters.insert(
            character_id.to_string(),
            FakeCharacter {
                public_id: public_id.to_string(),
                level,
                choices,
                ..FakeCharacter::default()
            },
        );
        self
    }

    /// Serve `options` from `endpoint`.
    pub fn with_options(self, endpoint: &str, options: Vec<ChoiceOption>) -> Self {
        self.state().options.insert(endpoint.to_string(), options);
        self
    }

    /// Script what the next level-up of a character unlocks.
    pub fn queue_level_up(&self, character_id: &str, unlock: LevelUnlock) {
        if let Some(character) = self.state().characters.get_mut(character_id) {
            character.level_ups.push_back(unlock);
        }
    }

    /// Add `choices` once `choice_id` is fully resolved.
    pub fn unlock_on_resolve(&self, character_id: &str, choice_id: &str, choices: Vec<PendingChoice>) {
        if let Some(character) = self.state().characters.get_mut(character_id) {
            character.unlocks.insert(choice_id.to_string(), choices);
        }
    }

    /// Make the next `times` calls of `op` fail with a 500.
    pub fn fail_next(&self, op: FakeOp, times: u32) {
        self.state().failures.insert(op, times);
    }

    /// Number of calls made for an operation.
    pub fn call_count(&self, op: FakeOp) -> usize {
        self.state().calls.iter().filter(|c| **c == op).count()
    }

    pub fn level(&self, character_id: &str) -> Option<u8> {
        self.state().characters.get(character_id).map(|c| c.level)
    }

    pub fn hit_points(&self, character_id: &str) -> Option<HitPointsUpdate> {
        self.state()
            .characters
            .get(character_id)
            .and_then(|c| c.hit_points)
    }

    pub fn subclass(&self, character_id: &str, class_slug: &str) -> Option<SubclassRequest> {
        self.state()
            .characters
            .get(character_id)
            .and_then(|c| c.subclasses.get(class_slug).cloned())
    }

    /// Every resolution the server accepted, in order.
    pub fn resolutions(&self, character_id: &str) -> Vec<(String, ResolveChoiceRequest)> {
        self.state()
            .characters
            .get(character_id)
            .map(|c| c.resolutions.clone())
            .unwrap_or_default()
    }

    /// Record the call and consume a scripted failure, if any.
    fn enter(&self, op: FakeOp) -> Result<MutexGuard<'_, FakeState>, Error> {
        let mut state = self.state();
        state.calls.push(op);
        if let Some(remaining) = state.failures.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::Api {
                    status: 500,
                    message: format!("scripted {op:?} failure"),
                });
            }
        }
        Ok(state)
    }
}

fn not_found(what: &str) -> Error {
    Error::Api {
        status: 404,
        message: format!("{what} not found"),
    }
}

fn unprocessable(message: String) -> Error {
    Error::Api {
        status: 422,
        message,
    }
}

fn summarize(choices: &[PendingChoice]) -> ChoiceSummary {
    let mut summary = ChoiceSummary {
        total_pending: choices.len() as u32,
        ..ChoiceSummary::default()
    };
    for c in choices {
        if c.required {
            summary.required_pending += 1;
        } else {
            summary.optional_pending += 1;
        }
        *summary
            .by_type
            .entry(c.choice_type.as_str().to_string())
            .or_default() += 1;
        *summary
            .by_source
            .entry(c.source.name().to_lowercase())
            .or_default() += 1;
    }
    summary
}

impl FakeCharacter {
    /// Apply selections, removing the choice and adding unlocks when exhausted.
    fn apply(&mut self, choice_id: &str, request: &ResolveChoiceRequest) -> Result<(), Error> {
        let index = self
            .choices
            .iter()
            .position(|c| c.id == choice_id)
            .ok_or_else(|| not_found(choice_id))?;

        let count = request.selections.len() as u32;
        let choice = &mut self.choices[index];
        if count == 0 || count > choice.remaining {
            return Err(unprocessable(format!(
                "expected 1..={} selections, got {count}",
                choice.remaining
            )));
        }
        if let Some(duplicate) = request.selections.iter().find(|s| choice.is_selected(s)) {
            return Err(unprocessable(format!("{duplicate} already selected")));
        }

        choice.selected.extend(request.selections.iter().cloned());
        choice.remaining -= count;
        self.resolutions
            .push((choice_id.to_string(), request.clone()));

        if choice.remaining == 0 {
            self.choices.remove(index);
            if let Some(unlocked) = self.unlocks.remove(choice_id) {
                self.choices.extend(unlocked);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CharacterApi for FakeCompendium {
    async fn pending_choices(
        &self,
        character_id: &str,
        choice_type: Option<ChoiceType>,
    ) -> Result<PendingChoicesResponse, Error> {
        let state = self.enter(FakeOp::PendingChoices)?;
        let character = state
            .characters
            .get(character_id)
            .ok_or_else(|| not_found(character_id))?;

        let choices: Vec<PendingChoice> = character
            .choices
            .iter()
            .filter(|c| choice_type.map_or(true, |t| c.choice_type == t))
            .cloned()
            .collect();
        let summary = summarize(&choices);
        Ok(PendingChoicesResponse { choices, summary })
    }

    async fn resolve_choice(
        &self,
        character_id: &str,
        choice_id: &str,
        request: &ResolveChoiceRequest,
    ) -> Result<(), Error> {
        let mut state = self.enter(FakeOp::ResolveChoice)?;
        state
            .characters
            .get_mut(character_id)
            .ok_or_else(|| not_found(character_id))?
            .apply(choice_id, request)
    }

    async fn undo_choice(
        &self,
        character_id: &str,
        choice_id: &str,
        selection: &str,
    ) -> Result<(), Error> {
        let mut state = self.enter(FakeOp::UndoChoice)?;
        let character = state
            .characters
            .get_mut(character_id)
            .ok_or_else(|| not_found(character_id))?;
        let choice = character
            .choices
            .iter_mut()
            .find(|c| c.id == choice_id)
            .ok_or_else(|| not_found(choice_id))?;

        let before = choice.selected.len();
        choice.selected.retain(|s| s != selection);
        if choice.selected.len() == before {
            return Err(not_found(selection));
        }
        choice.remaining += 1;
        Ok(())
    }

    async fn choice_options(&self, endpoint: &str) -> Result<Vec<ChoiceOption>, Error> {
        let state = self.enter(FakeOp::ChoiceOptions)?;
        state
            .options
            .get(endpoint)
            .cloned()
            .ok_or_else(|| not_found(endpoint))
    }

    async fn level_up(&self, public_id: &str, class_slug: &str) -> Result<LevelUpResult, Error> {
        let mut state = self.enter(FakeOp::LevelUp)?;
        let character = state
            .characters
            .values_mut()
            .find(|c| c.public_id == public_id)
            .ok_or_else(|| not_found(public_id))?;

        let unlock = character
            .level_ups
            .pop_front()
            .unwrap_or_else(LevelUnlock::hit_points_only);
        let previous_level = character.level;
        character.level += 1;

        if unlock.hp_choice_pending {
            character
                .choices
                .push(hit_point_choice(class_slug, character.level));
        }
        character.choices.extend(unlock.choices);

        Ok(LevelUpResult {
            previous_level,
            new_level: character.level,
            class_slug: Some(class_slug.to_string()),
            class_level: None,
            hit_die: unlock.hit_die,
            hp_increase: None,
            new_max_hp: None,
            features_gained: Vec::new(),
            spell_slots: Default::default(),
            asi_pending: unlock.asi_pending,
            hp_choice_pending: unlock.hp_choice_pending,
        })
    }

    async fn set_subclass(
        &self,
        character_id: &str,
        class_slug: &str,
        request: &SubclassRequest,
    ) -> Result<(), Error> {
        let mut state = self.enter(FakeOp::SetSubclass)?;
        let character = state
            .characters
            .get_mut(character_id)
            .ok_or_else(|| not_found(character_id))?;

        character
            .subclasses
            .insert(class_slug.to_string(), request.clone());

        let resolved: Vec<String> = character
            .choices
            .iter()
            .filter(|c| c.choice_type == ChoiceType::Subclass)
            .map(|c| c.id.clone())
            .collect();
        character
            .choices
            .retain(|c| c.choice_type != ChoiceType::Subclass);
        for id in resolved {
            if let Some(unlocked) = character.unlocks.remove(&id) {
                character.choices.extend(unlocked);
            }
        }
        Ok(())
    }

    async fn update_hit_points(
        &self,
        character_id: &str,
        update: &HitPointsUpdate,
    ) -> Result<(), Error> {
        let mut state = self.enter(FakeOp::UpdateHitPoints)?;
        state
            .characters
            .get_mut(character_id)
            .ok_or_else(|| not_found(character_id))?
            .hit_points = Some(*update);
        Ok(())
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert a choice is pending with the given remaining count.
#[track_caller]
pub fn assert_remaining(store: &PendingChoices, choice_id: &str, remaining: u32) {
    match store.choice(choice_id) {
        Some(c) => assert_eq!(
            c.remaining, remaining,
            "Expected {remaining} remaining on '{choice_id}', got {}",
            c.remaining
        ),
        None => panic!("Expected choice '{choice_id}' to be pending"),
    }
}

/// Assert a choice is no longer pending.
#[track_caller]
pub fn assert_resolved(store: &PendingChoices, choice_id: &str) {
    assert!(
        store.choice(choice_id).is_none(),
        "Expected choice '{choice_id}' to be resolved"
    );
}

//! Pending choice aggregation.
//!
//! [`PendingChoices`] owns the list of outstanding decisions for one
//! character. It never edits a choice locally: every resolve or undo is
//! followed by a full refetch that replaces the list, because resolving one
//! choice can add, remove or change others.
//!
//! Refreshes are read-only and swallow errors (the previous list stays
//! visible and [`PendingChoices::error`] is set). Mutations return their
//! errors to the caller.

use compendium_api::{
    CharacterApi, ChoiceOption, ChoiceSummary, ChoiceType, PendingChoice, ResolveChoiceRequest,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Errors from choice operations.
#[derive(Debug, Error)]
pub enum ChoiceError {
    #[error("API error: {0}")]
    Api(#[from] compendium_api::Error),

    #[error("No character loaded")]
    NoCharacter,

    #[error("Unknown choice: {0}")]
    UnknownChoice(String),
}

// ============================================================================
// Pure helpers
// ============================================================================

/// Pending choices partitioned by type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChoicesByType {
    pub proficiencies: Vec<PendingChoice>,
    pub languages: Vec<PendingChoice>,
    pub equipment: Vec<PendingChoice>,
    pub spells: Vec<PendingChoice>,
    /// At most one subclass choice is expected; the first wins.
    pub subclass: Option<PendingChoice>,
    pub asi_or_feat: Vec<PendingChoice>,
    pub optional_features: Vec<PendingChoice>,
    pub expertise: Vec<PendingChoice>,
    pub fighting_styles: Vec<PendingChoice>,
    pub hit_points: Vec<PendingChoice>,
}

/// Partition a flat choice list by type, preserving order within each group.
pub fn choices_by_type(choices: &[PendingChoice]) -> ChoicesByType {
    let mut grouped = ChoicesByType::default();
    for choice in choices {
        let bucket = match choice.choice_type {
            ChoiceType::Proficiency => &mut grouped.proficiencies,
            ChoiceType::Language => &mut grouped.languages,
            ChoiceType::Equipment => &mut grouped.equipment,
            ChoiceType::Spell => &mut grouped.spells,
            ChoiceType::Subclass => {
                if grouped.subclass.is_none() {
                    grouped.subclass = Some(choice.clone());
                }
                continue;
            }
            ChoiceType::AsiOrFeat => &mut grouped.asi_or_feat,
            ChoiceType::OptionalFeature => &mut grouped.optional_features,
            ChoiceType::Expertise => &mut grouped.expertise,
            ChoiceType::FightingStyle => &mut grouped.fighting_styles,
            ChoiceType::HitPoints => &mut grouped.hit_points,
        };
        bucket.push(choice.clone());
    }
    grouped
}

/// True iff every required choice has nothing remaining. Optional choices
/// never block; an empty list is complete.
pub fn all_required_complete(choices: &[PendingChoice]) -> bool {
    choices
        .iter()
        .filter(|c| c.required)
        .all(|c| c.remaining == 0)
}

/// "Is there a pending X choice" for every wizard-relevant X.
///
/// Both the level-up orchestrator and the wizard step predicates read these,
/// so they always agree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingFlags {
    pub subclass: bool,
    pub spells: bool,
    /// Fighting style, expertise or optional feature.
    pub features: bool,
    pub languages: bool,
    pub proficiencies: bool,
    pub equipment: bool,
    pub asi_or_feat: bool,
    pub hit_points: bool,
}

impl PendingFlags {
    /// Choice types grouped under [`PendingFlags::features`].
    pub const FEATURE_TYPES: [ChoiceType; 3] = [
        ChoiceType::FightingStyle,
        ChoiceType::Expertise,
        ChoiceType::OptionalFeature,
    ];

    pub fn from_choices(choices: &[PendingChoice]) -> Self {
        let has = |t: ChoiceType| choices.iter().any(|c| c.choice_type == t);
        Self {
            subclass: has(ChoiceType::Subclass),
            spells: has(ChoiceType::Spell),
            features: choices
                .iter()
                .any(|c| Self::FEATURE_TYPES.contains(&c.choice_type)),
            languages: has(ChoiceType::Language),
            proficiencies: has(ChoiceType::Proficiency),
            equipment: has(ChoiceType::Equipment),
            asi_or_feat: has(ChoiceType::AsiOrFeat),
            hit_points: has(ChoiceType::HitPoints),
        }
    }

    pub fn any(&self) -> bool {
        *self != Self::default()
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Default)]
struct ChoiceState {
    character_id: Option<String>,
    type_filter: Option<ChoiceType>,
    choices: Vec<PendingChoice>,
    summary: ChoiceSummary,
    /// Options fetched from `options_endpoint`, by choice id.
    loaded_options: HashMap<String, Vec<ChoiceOption>>,
    error: Option<String>,
    loading: bool,
    /// Bumped on every fetch; only the latest response is applied.
    request_seq: u64,
}

/// The pending choice set for one character.
pub struct PendingChoices {
    api: Arc<dyn CharacterApi>,
    state: Mutex<ChoiceState>,
}

impl PendingChoices {
    pub fn new(api: Arc<dyn CharacterApi>) -> Self {
        Self {
            api,
            state: Mutex::new(ChoiceState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChoiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the full choice set for a character, replacing the current one.
    ///
    /// On failure the previous set is kept and [`error`](Self::error) is set.
    /// A response that arrives after a newer fetch (or a switch to another
    /// character) started is discarded. Returns the set now held.
    pub async fn fetch_choices(
        &self,
        character_id: &str,
        type_filter: Option<ChoiceType>,
    ) -> Vec<PendingChoice> {
        let seq = {
            let mut state = self.state();
            if state.character_id.as_deref() != Some(character_id) {
                // Another character's choices must never show for this one.
                state.choices.clear();
                state.summary = ChoiceSummary::default();
                state.loaded_options.clear();
                state.character_id = Some(character_id.to_string());
            }
            state.type_filter = type_filter;
            state.request_seq += 1;
            state.loading = true;
            state.request_seq
        };

        let response = self.api.pending_choices(character_id, type_filter).await;

        let mut state = self.state();
        if state.request_seq != seq || state.character_id.as_deref() != Some(character_id) {
            tracing::warn!(character_id, "discarding stale pending choices response");
            return state.choices.clone();
        }

        state.loading = false;
        match response {
            Ok(response) => {
                state
                    .loaded_options
                    .retain(|id, _| response.choices.iter().any(|c| &c.id == id));
                state.choices = response.choices;
                state.summary = response.summary;
                state.error = None;
                tracing::debug!(
                    character_id,
                    count = state.choices.len(),
                    "pending choices loaded"
                );
            }
            Err(e) => {
                tracing::warn!(
                    character_id,
                    error = %e,
                    "failed to fetch pending choices; keeping previous set"
                );
                state.error = Some(e.to_string());
            }
        }
        state.choices.clone()
    }

    /// Refetch for the current character with the last type filter.
    pub async fn refresh(&self) -> Vec<PendingChoice> {
        let (character_id, type_filter) = {
            let state = self.state();
            (state.character_id.clone(), state.type_filter)
        };
        match character_id {
            Some(id) => self.fetch_choices(&id, type_filter).await,
            None => {
                tracing::debug!("refresh requested with no character loaded");
                Vec::new()
            }
        }
    }

    /// Commit selections for one choice, then refetch everything.
    pub async fn resolve_choice(
        &self,
        choice_id: &str,
        selections: Vec<String>,
    ) -> Result<(), ChoiceError> {
        self.resolve_with(choice_id, ResolveChoiceRequest::new(selections))
            .await
    }

    /// [`resolve_choice`](Self::resolve_choice) with a full request body.
    pub async fn resolve_with(
        &self,
        choice_id: &str,
        request: ResolveChoiceRequest,
    ) -> Result<(), ChoiceError> {
        self.commit(choice_id, &request).await?;
        self.refresh().await;
        Ok(())
    }

    /// Send a resolution without refreshing. Batch callers refresh once at the end.
    pub(crate) async fn commit(
        &self,
        choice_id: &str,
        request: &ResolveChoiceRequest,
    ) -> Result<(), ChoiceError> {
        let character_id = self.require_character()?;
        self.api
            .resolve_choice(&character_id, choice_id, request)
            .await?;
        tracing::info!(
            character_id = %character_id,
            choice_id,
            selections = request.selections.len(),
            "choice resolved"
        );
        Ok(())
    }

    /// Undo a single committed selection, then refetch everything.
    pub async fn undo_choice(&self, choice_id: &str, selection_id: &str) -> Result<(), ChoiceError> {
        let character_id = self.require_character()?;
        self.api
            .undo_choice(&character_id, choice_id, selection_id)
            .await?;
        tracing::info!(character_id = %character_id, choice_id, selection_id, "choice selection undone");
        self.refresh().await;
        Ok(())
    }

    /// Options for a choice, fetching them from `options_endpoint` if needed.
    pub async fn load_options(&self, choice_id: &str) -> Result<Vec<ChoiceOption>, ChoiceError> {
        let (character_id, endpoint) = {
            let state = self.state();
            let choice = state
                .choices
                .iter()
                .find(|c| c.id == choice_id)
                .ok_or_else(|| ChoiceError::UnknownChoice(choice_id.to_string()))?;

            if !choice.needs_option_fetch() {
                return Ok(choice.options.clone());
            }
            if let Some(options) = state.loaded_options.get(choice_id) {
                return Ok(options.clone());
            }
            (state.character_id.clone(), choice.options_endpoint.clone())
        };

        let Some(endpoint) = endpoint else {
            return Ok(Vec::new());
        };
        let options = self.api.choice_options(&endpoint).await?;

        let mut state = self.state();
        let still_current = state.character_id == character_id
            && state.choices.iter().any(|c| c.id == choice_id);
        if still_current {
            state
                .loaded_options
                .insert(choice_id.to_string(), options.clone());
        } else {
            tracing::debug!(choice_id, "dropping options for a choice no longer pending");
        }
        Ok(options)
    }

    /// A choice can be rendered once its options are known.
    pub fn is_ready(&self, choice_id: &str) -> bool {
        let state = self.state();
        state.choices.iter().any(|c| {
            c.id == choice_id
                && (!c.needs_option_fetch() || state.loaded_options.contains_key(choice_id))
        })
    }

    /// Inline or loaded options for a choice; empty if not yet loaded.
    pub fn options_for(&self, choice_id: &str) -> Vec<ChoiceOption> {
        let state = self.state();
        match state.choices.iter().find(|c| c.id == choice_id) {
            Some(choice) if !choice.options.is_empty() => choice.options.clone(),
            Some(_) => state
                .loaded_options
                .get(choice_id)
                .cloned()
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    pub fn choices(&self) -> Vec<PendingChoice> {
        self.state().choices.clone()
    }

    pub fn choice(&self, choice_id: &str) -> Option<PendingChoice> {
        self.state()
            .choices
            .iter()
            .find(|c| c.id == choice_id)
            .cloned()
    }

    /// First pending choice of a type.
    pub fn first_of(&self, choice_type: ChoiceType) -> Option<PendingChoice> {
        self.state()
            .choices
            .iter()
            .find(|c| c.choice_type == choice_type)
            .cloned()
    }

    pub fn summary(&self) -> ChoiceSummary {
        self.state().summary.clone()
    }

    pub fn by_type(&self) -> ChoicesByType {
        choices_by_type(&self.state().choices)
    }

    pub fn flags(&self) -> PendingFlags {
        PendingFlags::from_choices(&self.state().choices)
    }

    /// Server-confirmed completeness of the current set.
    pub fn all_required_complete(&self) -> bool {
        all_required_complete(&self.state().choices)
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn character_id(&self) -> Option<String> {
        self.state().character_id.clone()
    }

    /// Forget everything, including the character. In-flight fetches are discarded.
    pub fn clear(&self) {
        let mut state = self.state();
        let seq = state.request_seq;
        *state = ChoiceState {
            request_seq: seq + 1,
            ..ChoiceState::default()
        };
    }

    fn require_character(&self) -> Result<String, ChoiceError> {
        self.state()
            .character_id
            .clone()
            .ok_or(ChoiceError::NoCharacter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::choice;
    use async_trait::async_trait;
    use compendium_api::{
        ChoiceSource, HitPointsUpdate, LevelUpResult, MockCharacterApi, PendingChoicesResponse,
        SubclassRequest,
    };
    use mockall::Sequence;

    fn response(choices: Vec<PendingChoice>) -> PendingChoicesResponse {
        PendingChoicesResponse {
            choices,
            summary: ChoiceSummary::default(),
        }
    }

    fn proficiency(remaining: u32) -> PendingChoice {
        choice("proficiency:class:fighter:1:skills", ChoiceType::Proficiency, 4, remaining)
    }

    fn language() -> PendingChoice {
        let mut c = choice("language:race:human:1:extra", ChoiceType::Language, 1, 1);
        c.required = false;
        c.source = ChoiceSource::Race;
        c
    }

    #[test]
    fn test_all_required_complete_empty() {
        assert!(all_required_complete(&[]));
    }

    #[test]
    fn test_optional_choices_never_block() {
        let choices = vec![proficiency(2), language()];
        assert!(!all_required_complete(&choices));

        let choices = vec![proficiency(0), language()];
        assert!(all_required_complete(&choices));
    }

    #[test]
    fn test_choices_by_type() {
        let subclass = choice("subclass:class:fighter:3:archetype", ChoiceType::Subclass, 1, 1);
        let second = choice("subclass:class:wizard:2:tradition", ChoiceType::Subclass, 1, 1);
        let style = choice("fighting_style:class:fighter:1:style", ChoiceType::FightingStyle, 1, 1);
        let grouped = choices_by_type(&[
            proficiency(2),
            language(),
            subclass.clone(),
            second,
            style,
        ]);

        assert_eq!(grouped.proficiencies.len(), 1);
        assert_eq!(grouped.languages.len(), 1);
        assert_eq!(grouped.subclass, Some(subclass));
        assert_eq!(grouped.fighting_styles.len(), 1);
        assert!(grouped.spells.is_empty());
        assert!(grouped.optional_features.is_empty());
    }

    #[test]
    fn test_pending_flags_feature_group() {
        for t in PendingFlags::FEATURE_TYPES {
            let flags = PendingFlags::from_choices(&[choice("x:class:y:1:z", t, 1, 1)]);
            assert!(flags.features, "{t} should count as a feature choice");
            assert!(!flags.spells);
        }
        assert!(!PendingFlags::from_choices(&[]).any());
    }

    #[tokio::test]
    async fn test_fetch_replaces_set() {
        let mut api = MockCharacterApi::new();
        let mut seq = Sequence::new();
        api.expect_pending_choices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(response(vec![proficiency(2), language()])));
        api.expect_pending_choices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(response(vec![language()])));

        let store = PendingChoices::new(Arc::new(api));
        assert_eq!(store.fetch_choices("char-1", None).await.len(), 2);
        let after = store.fetch_choices("char-1", None).await;
        assert_eq!(after, vec![language()]);
        assert!(store.error().is_none());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_stale_set() {
        let mut api = MockCharacterApi::new();
        let mut seq = Sequence::new();
        api.expect_pending_choices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(response(vec![proficiency(2)])));
        api.expect_pending_choices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(compendium_api::Error::Network("timeout".to_string())));

        let store = PendingChoices::new(Arc::new(api));
        store.fetch_choices("char-1", None).await;
        let after = store.fetch_choices("char-1", None).await;

        assert_eq!(after, vec![proficiency(2)]);
        assert!(store.error().unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn test_switching_character_clears_previous_set() {
        let mut api = MockCharacterApi::new();
        api.expect_pending_choices()
            .withf(|id, _| id == "char-1")
            .returning(|_, _| Ok(response(vec![proficiency(2)])));
        api.expect_pending_choices()
            .withf(|id, _| id == "char-2")
            .returning(|_, _| Err(compendium_api::Error::Network("down".to_string())));

        let store = PendingChoices::new(Arc::new(api));
        store.fetch_choices("char-1", None).await;
        let after = store.fetch_choices("char-2", None).await;

        assert!(after.is_empty());
        assert_eq!(store.character_id().as_deref(), Some("char-2"));
    }

    #[tokio::test]
    async fn test_resolve_refetches() {
        let mut api = MockCharacterApi::new();
        let mut seq = Sequence::new();
        api.expect_pending_choices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(response(vec![proficiency(2), language()])));
        api.expect_resolve_choice()
            .withf(|character, choice, request| {
                character == "char-1"
                    && choice == "proficiency:class:fighter:1:skills"
                    && request.selections == vec!["stealth".to_string(), "arcana".to_string()]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        api.expect_pending_choices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(response(vec![language()])));

        let store = PendingChoices::new(Arc::new(api));
        store.fetch_choices("char-1", None).await;
        assert!(!store.all_required_complete());

        store
            .resolve_choice(
                "proficiency:class:fighter:1:skills",
                vec!["stealth".to_string(), "arcana".to_string()],
            )
            .await
            .unwrap();

        assert!(store.all_required_complete());
        assert_eq!(store.choices(), vec![language()]);
    }

    #[tokio::test]
    async fn test_resolve_failure_propagates_without_refetch() {
        let mut api = MockCharacterApi::new();
        api.expect_pending_choices()
            .times(1)
            .returning(|_, _| Ok(response(vec![proficiency(2)])));
        api.expect_resolve_choice().times(1).returning(|_, _, _| {
            Err(compendium_api::Error::Api {
                status: 422,
                message: "expected 2 selections".to_string(),
            })
        });

        let store = PendingChoices::new(Arc::new(api));
        store.fetch_choices("char-1", None).await;
        let result = store
            .resolve_choice("proficiency:class:fighter:1:skills", vec!["stealth".to_string()])
            .await;

        assert!(matches!(
            result,
            Err(ChoiceError::Api(compendium_api::Error::Api { status: 422, .. }))
        ));
        assert_eq!(store.choices(), vec![proficiency(2)]);
    }

    #[tokio::test]
    async fn test_resolve_without_character() {
        let store = PendingChoices::new(Arc::new(MockCharacterApi::new()));
        let result = store.resolve_choice("anything", Vec::new()).await;
        assert!(matches!(result, Err(ChoiceError::NoCharacter)));
    }

    #[tokio::test]
    async fn test_undo_refetches() {
        let mut api = MockCharacterApi::new();
        let mut seq = Sequence::new();
        api.expect_pending_choices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(response(vec![proficiency(0)])));
        api.expect_undo_choice()
            .withf(|_, choice, selection| {
                choice == "proficiency:class:fighter:1:skills" && selection == "stealth"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        api.expect_pending_choices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(response(vec![proficiency(1)])));

        let store = PendingChoices::new(Arc::new(api));
        store.fetch_choices("char-1", None).await;
        store
            .undo_choice("proficiency:class:fighter:1:skills", "stealth")
            .await
            .unwrap();
        assert_eq!(store.choices()[0].remaining, 1);
    }

    #[tokio::test]
    async fn test_options_endpoint_loads_once() {
        let mut cantrips = choice("spell:class:wizard:1:cantrips", ChoiceType::Spell, 3, 3);
        cantrips.options_endpoint = Some("/classes/wizard/spells?level=0".to_string());

        let mut api = MockCharacterApi::new();
        let listed = cantrips.clone();
        api.expect_pending_choices()
            .returning(move |_, _| Ok(response(vec![listed.clone()])));
        api.expect_choice_options()
            .withf(|endpoint| endpoint == "/classes/wizard/spells?level=0")
            .times(1)
            .returning(|_| {
                Ok(vec![
                    ChoiceOption::new("fire-bolt", "Fire Bolt"),
                    ChoiceOption::new("light", "Light"),
                ])
            });

        let store = PendingChoices::new(Arc::new(api));
        store.fetch_choices("char-1", None).await;

        assert!(!store.is_ready(&cantrips.id));
        assert!(store.options_for(&cantrips.id).is_empty());
        // Completeness only looks at `remaining`.
        assert!(!store.all_required_complete());

        assert_eq!(store.load_options(&cantrips.id).await.unwrap().len(), 2);
        assert!(store.is_ready(&cantrips.id));
        assert_eq!(store.load_options(&cantrips.id).await.unwrap().len(), 2);

        // Loaded options survive a refresh while the choice is still pending.
        store.refresh().await;
        assert!(store.is_ready(&cantrips.id));
    }

    #[tokio::test]
    async fn test_inline_options_ready_immediately() {
        let mut api = MockCharacterApi::new();
        let mut with_options = proficiency(2);
        with_options.options = vec![ChoiceOption::new("stealth", "Stealth")];
        let listed = with_options.clone();
        api.expect_pending_choices()
            .returning(move |_, _| Ok(response(vec![listed.clone()])));

        let store = PendingChoices::new(Arc::new(api));
        store.fetch_choices("char-1", None).await;
        assert!(store.is_ready(&with_options.id));
        assert_eq!(store.load_options(&with_options.id).await.unwrap().len(), 1);
        assert!(!store.is_ready("missing"));
    }

    /// Holds the first `char-a` fetch until released.
    struct GatedApi {
        gate: tokio::sync::Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl CharacterApi for GatedApi {
        async fn pending_choices(
            &self,
            character_id: &str,
            _choice_type: Option<ChoiceType>,
        ) -> Result<PendingChoicesResponse, compendium_api::Error> {
            if character_id == "char-a" {
                if let Some(gate) = self.gate.lock().await.take() {
                    let _ = gate.await;
                }
                return Ok(response(vec![proficiency(2)]));
            }
            Ok(response(vec![language()]))
        }

        async fn resolve_choice(
            &self,
            _: &str,
            _: &str,
            _: &ResolveChoiceRequest,
        ) -> Result<(), compendium_api::Error> {
            Ok(())
        }

        async fn undo_choice(&self, _: &str, _: &str, _: &str) -> Result<(), compendium_api::Error> {
            Ok(())
        }

        async fn choice_options(&self, _: &str) -> Result<Vec<ChoiceOption>, compendium_api::Error> {
            Ok(Vec::new())
        }

        async fn level_up(&self, _: &str, _: &str) -> Result<LevelUpResult, compendium_api::Error> {
            Err(compendium_api::Error::Network("unused".to_string()))
        }

        async fn set_subclass(
            &self,
            _: &str,
            _: &str,
            _: &SubclassRequest,
        ) -> Result<(), compendium_api::Error> {
            Ok(())
        }

        async fn update_hit_points(
            &self,
            _: &str,
            _: &HitPointsUpdate,
        ) -> Result<(), compendium_api::Error> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stale_response_discarded_after_character_switch() {
        let (release, gate) = tokio::sync::oneshot::channel();
        let store = PendingChoices::new(Arc::new(GatedApi {
            gate: tokio::sync::Mutex::new(Some(gate)),
        }));

        let (stale, _) = tokio::join!(store.fetch_choices("char-a", None), async {
            store.fetch_choices("char-b", None).await;
            let _ = release.send(());
        });

        assert_eq!(stale, vec![language()]);
        assert_eq!(store.choices(), vec![language()]);
        assert_eq!(store.character_id().as_deref(), Some("char-b"));
    }

    #[tokio::test]
    async fn test_clear_forgets_character() {
        let mut api = MockCharacterApi::new();
        api.expect_pending_choices()
            .returning(|_, _| Ok(response(vec![proficiency(2)])));
        let store = PendingChoices::new(Arc::new(api));
        store.fetch_choices("char-1", None).await;

        store.clear();
        assert!(store.choices().is_empty());
        assert!(store.character_id().is_none());
        assert!(store.refresh().await.is_empty());
    }
}

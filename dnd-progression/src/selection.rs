//! Staged selections for a wizard step.
//!
//! A [`ChoiceSelection`] sits between the [`PendingChoices`] store and a step
//! that lets the player tick several options before pressing continue. Picks
//! are staged locally and committed together by
//! [`ChoiceSelection::save_all_choices`].
//!
//! [`ChoiceSelection::all_complete`] only looks at staged state. The store's
//! [`PendingChoices::all_required_complete`] is the server's view; the two
//! agree once a save succeeds.

use crate::choices::{ChoiceError, PendingChoices};
use compendium_api::{ChoiceType, PendingChoice, ResolveChoiceRequest};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ============================================================================
// Option rules
// ============================================================================

/// Character-level restrictions on which options may be picked.
///
/// Implementations decide things like "this skill is already granted by the
/// background". They must be cheap; they run for every rendered option.
pub trait OptionRule: Send + Sync {
    fn is_excluded(&self, choice: &PendingChoice, option_id: &str) -> bool;
}

/// Every option is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRestrictions;

impl OptionRule for NoRestrictions {
    fn is_excluded(&self, _choice: &PendingChoice, _option_id: &str) -> bool {
        false
    }
}

/// Options the character already has, per choice type.
#[derive(Debug, Clone, Default)]
pub struct ExcludedOptions {
    by_type: HashMap<ChoiceType, HashSet<String>>,
}

impl ExcludedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude(mut self, choice_type: ChoiceType, option_id: impl Into<String>) -> Self {
        self.by_type
            .entry(choice_type)
            .or_default()
            .insert(option_id.into());
        self
    }
}

impl OptionRule for ExcludedOptions {
    fn is_excluded(&self, choice: &PendingChoice, option_id: &str) -> bool {
        self.by_type
            .get(&choice.choice_type)
            .is_some_and(|ids| ids.contains(option_id))
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Clears the saving flag when a save finishes, however it finishes.
struct SavingGuard<'a>(&'a AtomicBool);

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Staged selections over a working set of pending choices.
pub struct ChoiceSelection {
    choices: Arc<PendingChoices>,
    /// `None` means every pending choice is in the working set.
    working_types: Option<Vec<ChoiceType>>,
    rule: Arc<dyn OptionRule>,
    staged: Mutex<HashMap<String, Vec<String>>>,
    saving: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl ChoiceSelection {
    /// A controller over every pending choice.
    pub fn new(choices: Arc<PendingChoices>) -> Self {
        Self {
            choices,
            working_types: None,
            rule: Arc::new(NoRestrictions),
            staged: Mutex::new(HashMap::new()),
            saving: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    /// A controller over the pending choices of the given types.
    pub fn for_types(choices: Arc<PendingChoices>, types: &[ChoiceType]) -> Self {
        Self {
            working_types: Some(types.to_vec()),
            ..Self::new(choices)
        }
    }

    pub fn with_rule(mut self, rule: Arc<dyn OptionRule>) -> Self {
        self.rule = rule;
        self
    }

    fn staged(&self) -> MutexGuard<'_, HashMap<String, Vec<String>>> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_working_set(&self, choice: &PendingChoice) -> bool {
        self.working_types
            .as_ref()
            .map_or(true, |types| types.contains(&choice.choice_type))
    }

    /// Pending choices this controller covers, in store order.
    pub fn working_set(&self) -> Vec<PendingChoice> {
        self.choices
            .choices()
            .into_iter()
            .filter(|c| self.in_working_set(c))
            .collect()
    }

    fn working_choice(&self, choice_id: &str) -> Option<PendingChoice> {
        self.choices
            .choice(choice_id)
            .filter(|c| self.in_working_set(c))
    }

    fn count_for(&self, choice: &PendingChoice) -> u32 {
        let committed = choice.quantity.saturating_sub(choice.remaining);
        let staged = self.staged().get(&choice.id).map_or(0, Vec::len) as u32;
        committed + staged
    }

    /// Committed plus staged selections for a choice. Zero for unknown choices.
    pub fn get_selected_count(&self, choice_id: &str) -> u32 {
        self.working_choice(choice_id)
            .map_or(0, |choice| self.count_for(&choice))
    }

    pub fn is_option_selected(&self, choice_id: &str, option_id: &str) -> bool {
        let committed = self
            .working_choice(choice_id)
            .is_some_and(|c| c.is_selected(option_id));
        committed
            || self
                .staged()
                .get(choice_id)
                .is_some_and(|ids| ids.iter().any(|id| id == option_id))
    }

    /// True if picking `option_id` now would over-select the choice or the
    /// option rule rejects it. Already-selected options are never disabled.
    pub fn is_option_disabled(&self, choice_id: &str, option_id: &str) -> bool {
        let Some(choice) = self.working_choice(choice_id) else {
            return true;
        };
        if self.is_option_selected(choice_id, option_id) {
            return false;
        }
        self.count_for(&choice) >= choice.quantity || self.rule.is_excluded(&choice, option_id)
    }

    /// Stage or unstage an option. Returns whether anything changed.
    ///
    /// Committed selections are left alone; undoing those goes through
    /// [`PendingChoices::undo_choice`].
    pub fn handle_toggle(&self, choice_id: &str, option_id: &str) -> bool {
        let Some(choice) = self.working_choice(choice_id) else {
            tracing::debug!(choice_id, "toggle on a choice outside the working set");
            return false;
        };
        if choice.is_selected(option_id) {
            tracing::debug!(choice_id, option_id, "option already committed");
            return false;
        }

        let committed = choice.quantity.saturating_sub(choice.remaining);
        let mut staged = self.staged();
        let entry = staged.entry(choice.id.clone()).or_default();

        if let Some(pos) = entry.iter().position(|id| id == option_id) {
            entry.remove(pos);
            if entry.is_empty() {
                staged.remove(&choice.id);
            }
            return true;
        }

        if committed + entry.len() as u32 >= choice.quantity
            || self.rule.is_excluded(&choice, option_id)
        {
            if entry.is_empty() {
                staged.remove(&choice.id);
            }
            return false;
        }
        entry.push(option_id.to_string());
        true
    }

    /// True iff every choice in the working set has enough selections.
    /// An empty working set is complete.
    pub fn all_complete(&self) -> bool {
        self.working_set()
            .iter()
            .all(|c| self.count_for(c) >= c.quantity)
    }

    pub fn staged_for(&self, choice_id: &str) -> Vec<String> {
        self.staged().get(choice_id).cloned().unwrap_or_default()
    }

    pub fn clear_staged(&self) {
        self.staged().clear();
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    /// Error from the last save, if it failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Commit every staged selection, then refresh the store once.
    ///
    /// A call made while another save is running returns immediately. The
    /// batch stops at the first rejected choice; choices committed before it
    /// stay committed and show up in the refreshed set, and the rejected and
    /// remaining selections stay staged so the player can retry.
    pub async fn save_all_choices(&self) -> Result<(), ChoiceError> {
        if self
            .saving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("save already in progress; ignoring");
            return Ok(());
        }
        let _guard = SavingGuard(&self.saving);

        let batch: Vec<(String, Vec<String>)> = {
            let staged = self.staged();
            self.working_set()
                .into_iter()
                .filter_map(|c| {
                    staged
                        .get(&c.id)
                        .filter(|ids| !ids.is_empty())
                        .map(|ids| (c.id, ids.clone()))
                })
                .collect()
        };

        let mut result = Ok(());
        for (choice_id, selections) in batch {
            let request = ResolveChoiceRequest::new(selections);
            match self.choices.commit(&choice_id, &request).await {
                Ok(()) => {
                    // Picks staged while the request was in flight stay staged.
                    let mut staged = self.staged();
                    if let Some(entry) = staged.get_mut(&choice_id) {
                        entry.retain(|id| !request.selections.contains(id));
                        if entry.is_empty() {
                            staged.remove(&choice_id);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(choice_id = %choice_id, error = %e, "failed to save choice");
                    result = Err(e);
                    break;
                }
            }
        }

        self.choices.refresh().await;
        self.prune_staged();

        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) =
            result.as_ref().err().map(ToString::to_string);
        result
    }

    /// Reconcile staged selections with the refreshed store.
    ///
    /// Choices that are no longer pending lose their staged picks. For the
    /// rest, picks the server already has are dropped and the remainder is
    /// cut to what the choice still accepts.
    fn prune_staged(&self) {
        let pending: HashMap<String, PendingChoice> = self
            .choices
            .choices()
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();
        self.staged().retain(|id, ids| {
            let Some(choice) = pending.get(id) else {
                return false;
            };
            ids.retain(|option| !choice.is_selected(option));
            ids.truncate(choice.remaining as usize);
            !ids.is_empty()
        });
    }
}

//! Wizard steps for character creation and level-up.
//!
//! A [`StepRegistry`] is a fixed, ordered table of steps, each with a pure
//! visibility predicate over some state `S`. The *active* steps are the
//! registered steps whose predicate holds for the current state, in
//! registration order. The last registered step is terminal and always
//! visible, so the active sequence is never empty.
//!
//! [`StepNavigator`] tracks the current step by name and moves through the
//! active sequence. It never stores the state itself: callers pass it in, so
//! the same navigator always agrees with whatever state is current.
//!
//! ```ignore
//! let mut nav = StepNavigator::new(builder_steps(), &state);
//! nav.next_step(&state);
//! if !nav.go_to_step("subrace", &state) {
//!     // race has no subraces; still on the same step
//! }
//! ```

use crate::choices::PendingFlags;
use crate::world::{ClassLevel, RaceType};

/// One step in a wizard.
pub struct StepDescriptor<S> {
    /// Unique key, used for routing.
    pub name: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    visible: fn(&S) -> bool,
}

impl<S> StepDescriptor<S> {
    pub fn is_visible(&self, state: &S) -> bool {
        (self.visible)(state)
    }
}

impl<S> std::fmt::Debug for StepDescriptor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("name", &self.name)
            .field("label", &self.label)
            .finish()
    }
}

fn always<S>(_: &S) -> bool {
    true
}

// ============================================================================
// Registry
// ============================================================================

/// Ordered step table. Built with [`StepRegistry::builder`].
#[derive(Debug)]
pub struct StepRegistry<S> {
    steps: Vec<StepDescriptor<S>>,
}

/// Builder for [`StepRegistry`].
pub struct StepRegistryBuilder<S> {
    steps: Vec<StepDescriptor<S>>,
}

impl<S> StepRegistry<S> {
    pub fn builder() -> StepRegistryBuilder<S> {
        StepRegistryBuilder { steps: Vec::new() }
    }

    pub fn steps(&self) -> &[StepDescriptor<S>] {
        &self.steps
    }

    pub fn get(&self, name: &str) -> Option<&StepDescriptor<S>> {
        self.steps.iter().find(|s| s.name == name)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    /// The review/summary step.
    pub fn terminal(&self) -> &'static str {
        // `finish` always pushes the terminal step last.
        self.steps.last().map_or("", |s| s.name)
    }

    /// Names of the steps visible in `state`, in registration order.
    pub fn active_steps(&self, state: &S) -> Vec<&'static str> {
        self.steps
            .iter()
            .filter(|s| s.is_visible(state))
            .map(|s| s.name)
            .collect()
    }

    /// True iff `name` is a registered step that is visible in `state`.
    pub fn is_visible(&self, name: &str, state: &S) -> bool {
        self.get(name).is_some_and(|s| s.is_visible(state))
    }
}

impl<S> StepRegistryBuilder<S> {
    /// Register a step. A name registered twice keeps its first registration.
    pub fn step(
        mut self,
        name: &'static str,
        label: &'static str,
        icon: &'static str,
        visible: fn(&S) -> bool,
    ) -> Self {
        if name.is_empty() || self.steps.iter().any(|s| s.name == name) {
            tracing::warn!(step = name, "ignoring duplicate or empty step name");
            return self;
        }
        self.steps.push(StepDescriptor {
            name,
            label,
            icon,
            visible,
        });
        self
    }

    /// Register the terminal step and build the registry.
    pub fn finish(
        mut self,
        name: &'static str,
        label: &'static str,
        icon: &'static str,
    ) -> StepRegistry<S> {
        self.steps.retain(|s| s.name != name);
        self.steps.push(StepDescriptor {
            name,
            label,
            icon,
            visible: always::<S>,
        });
        StepRegistry { steps: self.steps }
    }
}

// ============================================================================
// Navigator
// ============================================================================

/// Current position in a wizard.
#[derive(Debug)]
pub struct StepNavigator<S> {
    registry: StepRegistry<S>,
    current: &'static str,
}

impl<S> StepNavigator<S> {
    /// Start at the first active step.
    pub fn new(registry: StepRegistry<S>, state: &S) -> Self {
        let current = registry
            .active_steps(state)
            .first()
            .copied()
            .unwrap_or_else(|| registry.terminal());
        Self { registry, current }
    }

    pub fn registry(&self) -> &StepRegistry<S> {
        &self.registry
    }

    pub fn active_steps(&self, state: &S) -> Vec<&'static str> {
        self.registry.active_steps(state)
    }

    /// The step last navigated to, whether or not it is still visible.
    pub fn current_name(&self) -> &'static str {
        self.current
    }

    /// The current step, or `None` if it stopped being visible.
    pub fn current_step(&self, state: &S) -> Option<&StepDescriptor<S>> {
        self.registry
            .get(self.current)
            .filter(|s| s.is_visible(state))
    }

    /// Index of the current step within the active sequence.
    pub fn current_step_index(&self, state: &S) -> Option<usize> {
        self.active_steps(state)
            .iter()
            .position(|name| *name == self.current)
    }

    pub fn is_step_accessible(&self, name: &str, state: &S) -> bool {
        self.registry.is_visible(name, state)
    }

    /// Move to the next active step. Returns whether the step changed.
    pub fn next_step(&mut self, state: &S) -> bool {
        let target = match self.registry.position(self.current) {
            Some(pos) => self.registry.steps[pos + 1..]
                .iter()
                .find(|s| s.is_visible(state))
                .map(|s| s.name),
            None => self.active_steps(state).first().copied(),
        };
        self.move_to(target)
    }

    /// Move to the previous active step. Returns whether the step changed.
    pub fn previous_step(&mut self, state: &S) -> bool {
        let target = self.registry.position(self.current).and_then(|pos| {
            self.registry.steps[..pos]
                .iter()
                .rev()
                .find(|s| s.is_visible(state))
                .map(|s| s.name)
        });
        self.move_to(target)
    }

    /// Jump to a step if it is accessible; otherwise stay put.
    pub fn go_to_step(&mut self, name: &str, state: &S) -> bool {
        let Some(step) = self.registry.get(name).filter(|s| s.is_visible(state)) else {
            tracing::debug!(step = name, current = self.current, "refusing inaccessible step");
            return false;
        };
        let target = step.name;
        self.move_to(Some(target))
    }

    /// If the current step is no longer visible, move back to the nearest
    /// visible step before it (or the first active step). Returns the step.
    pub fn ensure_accessible(&mut self, state: &S) -> &'static str {
        if self.current_step(state).is_none() {
            let from = self.current;
            if !self.previous_step(state) {
                let first = self.active_steps(state).first().copied();
                self.move_to(first);
            }
            tracing::debug!(from, to = self.current, "current step hidden; redirected");
        }
        self.current
    }

    pub fn is_first(&self, state: &S) -> bool {
        self.current_step_index(state) == Some(0)
    }

    pub fn is_last(&self, state: &S) -> bool {
        self.active_steps(state).last() == Some(&self.current)
    }

    /// Fraction of the active sequence reached, counting the current step.
    pub fn progress(&self, state: &S) -> f64 {
        let total = self.active_steps(state).len();
        match self.current_step_index(state) {
            Some(index) if total > 0 => (index + 1) as f64 / total as f64,
            _ => 0.0,
        }
    }

    fn move_to(&mut self, target: Option<&'static str>) -> bool {
        match target {
            Some(name) if name != self.current => {
                tracing::debug!(from = self.current, to = name, "wizard step changed");
                self.current = name;
                true
            }
            _ => false,
        }
    }
}

// ============================================================================
// Character builder
// ============================================================================

/// What the builder steps need to know about a character in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuilderState {
    pub race: Option<RaceType>,
    pub subrace: Option<String>,
    pub classes: Vec<ClassLevel>,
    pub pending: PendingFlags,
}

impl BuilderState {
    pub fn needs_subrace(&self) -> bool {
        self.race.is_some_and(|r| r.has_subraces())
    }

    pub fn is_caster(&self) -> bool {
        self.classes.iter().any(ClassLevel::casts_spells)
    }

    pub fn is_multiclass(&self) -> bool {
        self.classes.len() > 1
    }
}

/// Steps for building a new character.
pub fn builder_steps() -> StepRegistry<BuilderState> {
    StepRegistry::<BuilderState>::builder()
        .step("name", "Name", "pencil", always)
        .step("race", "Race", "users", always)
        .step("subrace", "Subrace", "git-branch", BuilderState::needs_subrace)
        .step("class", "Class", "shield", always)
        .step("abilities", "Abilities", "bar-chart", always)
        .step("background", "Background", "book-open", always)
        .step("proficiencies", "Proficiencies", "check-square", |s| {
            s.pending.proficiencies
        })
        .step("languages", "Languages", "message-circle", |s| s.pending.languages)
        .step("equipment", "Equipment", "package", always)
        .step("spells", "Spells", "zap", |s| s.is_caster() || s.pending.spells)
        .finish("review", "Review", "clipboard")
}

// ============================================================================
// Level-up
// ============================================================================

/// What the level-up steps need to know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelUpState {
    pub needs_class_selection: bool,
    /// The level-up granted an ASI, whether or not it has been spent yet.
    pub grants_asi: bool,
    pub pending: PendingFlags,
}

/// Steps for levelling up an existing character.
///
/// The hit point step is shown in every level-up.
pub fn level_up_steps() -> StepRegistry<LevelUpState> {
    StepRegistry::<LevelUpState>::builder()
        .step("class-selection", "Class", "shield", |s| s.needs_class_selection)
        .step("hit-points", "Hit Points", "heart", always)
        .step("subclass", "Subclass", "git-branch", |s| s.pending.subclass)
        .step("asi-feat", "Ability Score / Feat", "trending-up", |s| {
            s.grants_asi || s.pending.asi_or_feat
        })
        .step("feature-choices", "Features", "star", |s| s.pending.features)
        .step("spells", "Spells", "zap", |s| s.pending.spells)
        .step("languages", "Languages", "message-circle", |s| s.pending.languages)
        .step("proficiencies", "Proficiencies", "check-square", |s| {
            s.pending.proficiencies
        })
        .finish("summary", "Summary", "clipboard")
}

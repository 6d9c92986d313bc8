//! End-to-end level-up flows against the in-memory character API.
//!
//! These drive the orchestrator, the wizard navigator and the selection
//! controller together, the way a level-up modal does.

use compendium_api::{ChoiceType, PendingChoice};
use dnd_progression::testing::{
    assert_remaining, assert_resolved, choice, choice_with_options, FakeCompendium, FakeOp,
    LevelUnlock,
};
use dnd_progression::wizard::{level_up_steps, StepNavigator};
use dnd_progression::{
    ChoiceSelection, ClassLevel, CharacterClass, HpRoll, LevelUpPhase, LevelUpWizard,
    PendingChoices,
};
use std::sync::Arc;

fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fighting_style() -> PendingChoice {
    choice_with_options(
        "fighting_style:class:ranger:2:style",
        ChoiceType::FightingStyle,
        1,
        &["archery", "defense", "dueling"],
    )
}

fn ranger_spells() -> PendingChoice {
    choice_with_options(
        "spell:class:ranger:2:known",
        ChoiceType::Spell,
        2,
        &["hunters-mark", "cure-wounds", "goodberry"],
    )
}

struct Table {
    api: Arc<FakeCompendium>,
    choices: Arc<PendingChoices>,
    wizard: LevelUpWizard,
}

fn table(level: u8) -> Table {
    setup();
    let api = Arc::new(FakeCompendium::new().with_character("char-1", "pub-1", level, Vec::new()));
    let choices = Arc::new(PendingChoices::new(api.clone()));
    let wizard = LevelUpWizard::new(api.clone(), choices.clone());
    Table {
        api,
        choices,
        wizard,
    }
}

// =============================================================================
// SINGLE CLASS
// =============================================================================

#[tokio::test]
async fn test_ranger_two_full_flow() {
    let t = table(1);
    t.api.queue_level_up(
        "char-1",
        LevelUnlock::hit_points_only()
            .with_choice(fighting_style())
            .with_choice(ranger_spells()),
    );

    t.wizard.open_wizard(
        "char-1",
        "pub-1",
        vec![ClassLevel::new(CharacterClass::Ranger, 1)],
        1,
    );
    let mut nav = StepNavigator::new(level_up_steps(), &t.wizard.step_state());

    // Level 1 -> 2 is the first multiclass opportunity.
    assert_eq!(nav.current_name(), "class-selection");
    t.wizard.level_up("ranger").await.unwrap();

    let state = t.wizard.step_state();
    assert_eq!(
        nav.active_steps(&state),
        vec!["class-selection", "hit-points", "feature-choices", "spells", "summary"]
    );
    assert!(t.wizard.has_feature_choices());
    assert!(t.wizard.has_spell_choices());
    assert!(!t.wizard.has_subclass_choice());

    assert!(nav.next_step(&state));
    assert_eq!(nav.current_name(), "hit-points");
    let gain = t.wizard.choose_hit_points(HpRoll::Average, 2).await.unwrap();
    assert_eq!(gain.total, 8);
    assert!(t.wizard.is_complete());
    assert_eq!(t.wizard.phase(), LevelUpPhase::Choices);

    let state = t.wizard.step_state();
    assert!(nav.next_step(&state));
    assert_eq!(nav.current_name(), "feature-choices");

    let features = ChoiceSelection::for_types(
        t.choices.clone(),
        &[ChoiceType::FightingStyle, ChoiceType::Expertise, ChoiceType::OptionalFeature],
    );
    assert!(!features.all_complete());
    assert!(features.handle_toggle("fighting_style:class:ranger:2:style", "archery"));
    assert!(features.is_option_disabled("fighting_style:class:ranger:2:style", "defense"));
    features.save_all_choices().await.unwrap();
    assert_resolved(&t.choices, "fighting_style:class:ranger:2:style");

    // The feature step disappeared under us; moving on still works.
    let state = t.wizard.step_state();
    assert!(nav.current_step(&state).is_none());
    assert!(nav.next_step(&state));
    assert_eq!(nav.current_name(), "spells");

    let spells = ChoiceSelection::for_types(t.choices.clone(), &[ChoiceType::Spell]);
    spells.handle_toggle("spell:class:ranger:2:known", "hunters-mark");
    assert!(!spells.all_complete());
    spells.handle_toggle("spell:class:ranger:2:known", "goodberry");
    assert!(spells.all_complete());
    spells.save_all_choices().await.unwrap();

    assert!(t.choices.all_required_complete());
    assert_eq!(t.wizard.phase(), LevelUpPhase::Complete);

    let state = t.wizard.step_state();
    assert!(nav.next_step(&state));
    assert!(nav.is_last(&state));
    assert_eq!(t.api.level("char-1"), Some(2));
}

#[tokio::test]
async fn test_single_class_skips_class_selection() {
    let t = table(5);
    t.wizard.open_wizard(
        "char-1",
        "pub-1",
        vec![ClassLevel::new(CharacterClass::Fighter, 5)],
        5,
    );
    let state = t.wizard.step_state();
    let nav = StepNavigator::new(level_up_steps(), &state);

    assert!(!t.wizard.needs_class_selection());
    assert_eq!(nav.current_name(), "hit-points");
    assert!(!nav.is_step_accessible("class-selection", &state));
}

// =============================================================================
// MULTICLASS
// =============================================================================

#[tokio::test]
async fn test_multiclass_into_new_class() {
    let t = table(3);
    t.wizard.open_wizard(
        "char-1",
        "pub-1",
        vec![
            ClassLevel::new(CharacterClass::Fighter, 2),
            ClassLevel::new(CharacterClass::Wizard, 1),
        ],
        3,
    );
    assert!(t.wizard.needs_class_selection());

    t.wizard.level_up("rogue").await.unwrap();

    let classes = t.wizard.classes();
    assert_eq!(classes.len(), 3);
    assert_eq!(classes[2], ClassLevel::new(CharacterClass::Rogue, 1));
    assert_eq!(t.wizard.total_level(), 4);

    // Rogue uses a d8.
    let gain = t.wizard.choose_hit_points(HpRoll::Rolled(20), 0).await.unwrap();
    assert_eq!(gain.die_value, 8);
}

// =============================================================================
// SUBCLASS AND ASI
// =============================================================================

#[tokio::test]
async fn test_subclass_unlocks_features() {
    let t = table(2);
    let archetype = choice("subclass:class:fighter:3:archetype", ChoiceType::Subclass, 1, 1);
    t.api.queue_level_up("char-1", LevelUnlock::hit_points_only().with_choice(archetype));
    t.api.unlock_on_resolve(
        "char-1",
        "subclass:class:fighter:3:archetype",
        vec![choice(
            "optional_feature:subclass:battle-master:3:maneuvers",
            ChoiceType::OptionalFeature,
            3,
            3,
        )],
    );

    t.wizard.open_wizard(
        "char-1",
        "pub-1",
        vec![ClassLevel::new(CharacterClass::Fighter, 2)],
        2,
    );
    t.wizard.level_up("fighter").await.unwrap();
    t.wizard.choose_hit_points(HpRoll::Average, 1).await.unwrap();
    assert!(t.wizard.has_subclass_choice());
    assert!(!t.wizard.has_feature_choices());

    t.wizard
        .choose_subclass("battle-master", None)
        .await
        .unwrap();

    assert!(!t.wizard.has_subclass_choice());
    assert!(t.wizard.has_feature_choices());
    assert_remaining(&t.choices, "optional_feature:subclass:battle-master:3:maneuvers", 3);
    assert_eq!(
        t.wizard.classes()[0].subclass.as_deref(),
        Some("battle-master")
    );
}

#[tokio::test]
async fn test_asi_step_stays_after_spending() {
    let t = table(3);
    t.api.queue_level_up(
        "char-1",
        LevelUnlock::hit_points_only().with_asi(choice(
            "asi_or_feat:class:fighter:4:asi",
            ChoiceType::AsiOrFeat,
            2,
            2,
        )),
    );
    t.wizard.open_wizard(
        "char-1",
        "pub-1",
        vec![ClassLevel::new(CharacterClass::Fighter, 3)],
        3,
    );
    t.wizard.level_up("fighter").await.unwrap();
    let mut nav = StepNavigator::new(level_up_steps(), &t.wizard.step_state());

    assert!(nav.go_to_step("asi-feat", &t.wizard.step_state()));
    t.wizard.choose_hit_points(HpRoll::Average, 0).await.unwrap();
    assert!(!t.wizard.is_complete());

    t.wizard
        .choose_asi(vec!["str".to_string(), "con".to_string()])
        .await
        .unwrap();
    assert!(t.wizard.is_complete());
    assert!(nav.current_step(&t.wizard.step_state()).is_some());
}

// =============================================================================
// FAILURES AND RESUME
// =============================================================================

#[tokio::test]
async fn test_refresh_failure_keeps_choices_visible() {
    let t = table(1);
    t.api.queue_level_up("char-1", LevelUnlock::hit_points_only().with_choice(ranger_spells()));
    t.wizard.open_wizard(
        "char-1",
        "pub-1",
        vec![ClassLevel::new(CharacterClass::Ranger, 1)],
        1,
    );
    t.wizard.level_up("ranger").await.unwrap();
    assert_eq!(t.choices.choices().len(), 2);

    t.api.fail_next(FakeOp::PendingChoices, 1);
    t.choices.refresh().await;

    assert_eq!(t.choices.choices().len(), 2);
    assert!(t.choices.error().is_some());

    t.choices.refresh().await;
    assert!(t.choices.error().is_none());
}

#[tokio::test]
async fn test_rejected_hit_point_choice_surfaces() {
    let t = table(3);
    t.wizard.open_wizard(
        "char-1",
        "pub-1",
        vec![ClassLevel::new(CharacterClass::Fighter, 3)],
        3,
    );
    t.wizard.level_up("fighter").await.unwrap();

    t.api.fail_next(FakeOp::ResolveChoice, 1);
    assert!(t.wizard.choose_hit_points(HpRoll::Average, 0).await.is_err());
    assert_eq!(t.wizard.phase(), LevelUpPhase::HitPoints);
    assert!(t.wizard.hp_gain().is_none());

    // Retrying is a user action.
    t.wizard.choose_hit_points(HpRoll::Average, 0).await.unwrap();
    assert_eq!(t.wizard.phase(), LevelUpPhase::Complete);
}

#[tokio::test]
async fn test_close_and_reopen_resumes() {
    let t = table(1);
    t.api.queue_level_up("char-1", LevelUnlock::hit_points_only().with_choice(ranger_spells()));
    t.wizard.open_wizard(
        "char-1",
        "pub-1",
        vec![ClassLevel::new(CharacterClass::Ranger, 1)],
        1,
    );
    t.wizard.level_up("ranger").await.unwrap();
    t.wizard.choose_hit_points(HpRoll::Average, 0).await.unwrap();

    t.wizard.close_wizard();
    assert_eq!(t.wizard.phase(), LevelUpPhase::Closed);

    t.wizard.reopen_wizard().unwrap();
    assert_eq!(t.wizard.phase(), LevelUpPhase::Choices);
    assert!(t.wizard.has_spell_choices());
    assert_eq!(t.api.call_count(FakeOp::LevelUp), 1);
}

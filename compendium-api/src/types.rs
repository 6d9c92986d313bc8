//! Wire types for the character API.
//!
//! These mirror the JSON the server sends and accepts. They carry no
//! behaviour beyond small convenience accessors; orchestration lives in the
//! engine crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Choice vocabulary
// ============================================================================

/// The kind of decision a pending choice asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceType {
    Proficiency,
    Language,
    Equipment,
    Spell,
    Subclass,
    AsiOrFeat,
    OptionalFeature,
    Expertise,
    FightingStyle,
    HitPoints,
}

impl ChoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChoiceType::Proficiency => "proficiency",
            ChoiceType::Language => "language",
            ChoiceType::Equipment => "equipment",
            ChoiceType::Spell => "spell",
            ChoiceType::Subclass => "subclass",
            ChoiceType::AsiOrFeat => "asi_or_feat",
            ChoiceType::OptionalFeature => "optional_feature",
            ChoiceType::Expertise => "expertise",
            ChoiceType::FightingStyle => "fighting_style",
            ChoiceType::HitPoints => "hit_points",
        }
    }

    pub fn all() -> &'static [ChoiceType] {
        &[
            ChoiceType::Proficiency,
            ChoiceType::Language,
            ChoiceType::Equipment,
            ChoiceType::Spell,
            ChoiceType::Subclass,
            ChoiceType::AsiOrFeat,
            ChoiceType::OptionalFeature,
            ChoiceType::Expertise,
            ChoiceType::FightingStyle,
            ChoiceType::HitPoints,
        ]
    }
}

impl fmt::Display for ChoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A choice type string the API does not know about.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown choice type `{0}`")]
pub struct UnknownChoiceType(pub String);

impl FromStr for ChoiceType {
    type Err = UnknownChoiceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChoiceType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownChoiceType(s.to_string()))
    }
}

/// Which kind of grant produced a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceSource {
    Class,
    Subclass,
    Race,
    Subrace,
    Background,
    Feat,
    #[serde(other)]
    Other,
}

impl ChoiceSource {
    pub fn name(&self) -> &'static str {
        match self {
            ChoiceSource::Class => "Class",
            ChoiceSource::Subclass => "Subclass",
            ChoiceSource::Race => "Race",
            ChoiceSource::Subrace => "Subrace",
            ChoiceSource::Background => "Background",
            ChoiceSource::Feat => "Feat",
            ChoiceSource::Other => "Other",
        }
    }
}

// ============================================================================
// Pending choices
// ============================================================================

/// One outstanding decision a character must make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChoice {
    /// Composite key `type:source:sourceId:level:discriminator`.
    pub id: String,
    #[serde(rename = "type")]
    pub choice_type: ChoiceType,
    #[serde(default)]
    pub subtype: Option<String>,
    pub source: ChoiceSource,
    pub source_name: String,
    pub level_granted: u8,
    pub required: bool,
    pub quantity: u32,
    pub remaining: u32,
    #[serde(default)]
    pub selected: Vec<String>,
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    #[serde(default)]
    pub options_endpoint: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl PendingChoice {
    /// True once every expected selection has been committed.
    pub fn is_resolved(&self) -> bool {
        self.remaining == 0
    }

    /// Options are not inline and must be fetched from `options_endpoint`.
    pub fn needs_option_fetch(&self) -> bool {
        self.options.is_empty() && self.options_endpoint.is_some()
    }

    pub fn is_selected(&self, option_id: &str) -> bool {
        self.selected.iter().any(|s| s == option_id)
    }

    /// Parse the composite id into its parts.
    pub fn key(&self) -> Result<ChoiceKey, ChoiceKeyError> {
        self.id.parse()
    }
}

/// A candidate value for a choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ChoiceOption {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }
}

/// Counts the server reports alongside the choice list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceSummary {
    #[serde(default)]
    pub total_pending: u32,
    #[serde(default)]
    pub required_pending: u32,
    #[serde(default)]
    pub optional_pending: u32,
    #[serde(default)]
    pub by_type: BTreeMap<String, u32>,
    #[serde(default)]
    pub by_source: BTreeMap<String, u32>,
}

/// Body of `GET /characters/{id}/pending-choices`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingChoicesResponse {
    pub choices: Vec<PendingChoice>,
    #[serde(default)]
    pub summary: ChoiceSummary,
}

/// Body of `POST /characters/{id}/choices/{choiceId}/resolve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveChoiceRequest {
    pub selections: Vec<String>,
    /// Only sent for rolled hit point choices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_result: Option<u8>,
}

impl ResolveChoiceRequest {
    pub fn new(selections: Vec<String>) -> Self {
        Self {
            selections,
            roll_result: None,
        }
    }

    pub fn with_roll_result(mut self, roll: u8) -> Self {
        self.roll_result = Some(roll);
        self
    }
}

// ============================================================================
// Composite choice ids
// ============================================================================

/// The parts of a pending choice id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceKey {
    pub choice_type: ChoiceType,
    pub source: String,
    pub source_id: String,
    pub level: u8,
    pub discriminator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChoiceKeyError {
    #[error("choice id `{0}` does not have five segments")]
    Segments(String),

    #[error(transparent)]
    Type(#[from] UnknownChoiceType),

    #[error("invalid level `{0}` in choice id")]
    Level(String),
}

impl FromStr for ChoiceKey {
    type Err = ChoiceKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The discriminator is last so it may itself contain ':'.
        let parts: Vec<&str> = s.splitn(5, ':').collect();
        let [choice_type, source, source_id, level, discriminator] = parts[..] else {
            return Err(ChoiceKeyError::Segments(s.to_string()));
        };

        Ok(ChoiceKey {
            choice_type: choice_type.parse()?,
            source: source.to_string(),
            source_id: source_id.to_string(),
            level: level
                .parse()
                .map_err(|_| ChoiceKeyError::Level(level.to_string()))?,
            discriminator: discriminator.to_string(),
        })
    }
}

impl fmt::Display for ChoiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.choice_type, self.source, self.source_id, self.level, self.discriminator
        )
    }
}

// ============================================================================
// Level up, subclass, hit points
// ============================================================================

/// A feature granted by a level-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGained {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Result of `POST /characters/{publicId}/classes/{classSlug}/level-up`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelUpResult {
    #[serde(default)]
    pub previous_level: u8,
    #[serde(default)]
    pub new_level: u8,
    #[serde(default)]
    pub class_slug: Option<String>,
    #[serde(default)]
    pub class_level: Option<u8>,
    /// Sides of the levelled class's hit die, from the class data.
    #[serde(default)]
    pub hit_die: Option<u8>,
    #[serde(default)]
    pub hp_increase: Option<i32>,
    #[serde(default)]
    pub new_max_hp: Option<i32>,
    #[serde(default)]
    pub features_gained: Vec<FeatureGained>,
    #[serde(default)]
    pub spell_slots: BTreeMap<String, u8>,
    pub asi_pending: bool,
    pub hp_choice_pending: bool,
}

/// Body of `PUT /characters/{id}/classes/{classSlug}/subclass`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubclassRequest {
    pub subclass_slug: String,
    /// Only present for subclasses that branch further (e.g. terrain).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_choices: Option<BTreeMap<String, String>>,
}

impl SubclassRequest {
    pub fn new(subclass_slug: impl Into<String>) -> Self {
        Self {
            subclass_slug: subclass_slug.into(),
            variant_choices: None,
        }
    }

    pub fn with_variant(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variant_choices
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Body of `PATCH /characters/{id}/hit-points`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPointsUpdate {
    pub current: i32,
    pub temporary: i32,
}

/// `{ "data": ... }` wrapper used by several endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

/// Option endpoints answer either wrapped or bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OptionsPayload {
    Wrapped { data: Vec<ChoiceOption> },
    Bare(Vec<ChoiceOption>),
}

impl OptionsPayload {
    pub(crate) fn into_options(self) -> Vec<ChoiceOption> {
        match self {
            OptionsPayload::Wrapped { data } => data,
            OptionsPayload::Bare(options) => options,
        }
    }
}

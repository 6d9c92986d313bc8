//! Client for the compendium character API.
//!
//! This crate provides:
//! - Wire types for pending choices, level-ups and subclass selection
//! - The [`CharacterApi`] port the progression engine talks to
//! - [`Compendium`], a reqwest implementation of that port

mod config;
pub mod types;

pub use config::ClientConfig;
pub use types::{
    ChoiceKey, ChoiceKeyError, ChoiceOption, ChoiceSource, ChoiceSummary, ChoiceType,
    FeatureGained, HitPointsUpdate, LevelUpResult, PendingChoice, PendingChoicesResponse,
    ResolveChoiceRequest, SubclassRequest, UnknownChoiceType,
};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use types::{DataEnvelope, OptionsPayload};

/// Errors that can occur when talking to the character API.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API base URL not configured")]
    NoBaseUrl,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Operations the progression engine needs from the character API.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CharacterApi: Send + Sync {
    /// `GET /characters/{id}/pending-choices[?type=T]`
    async fn pending_choices(
        &self,
        character_id: &str,
        choice_type: Option<ChoiceType>,
    ) -> Result<PendingChoicesResponse, Error>;

    /// `POST /characters/{id}/choices/{choiceId}/resolve`
    async fn resolve_choice(
        &self,
        character_id: &str,
        choice_id: &str,
        request: &ResolveChoiceRequest,
    ) -> Result<(), Error>;

    /// `POST /characters/{id}/choices/{choiceId}/undo`
    async fn undo_choice(
        &self,
        character_id: &str,
        choice_id: &str,
        selection: &str,
    ) -> Result<(), Error>;

    /// `GET {options_endpoint}`
    async fn choice_options(&self, endpoint: &str) -> Result<Vec<ChoiceOption>, Error>;

    /// `POST /characters/{publicId}/classes/{classSlug}/level-up`
    async fn level_up(&self, public_id: &str, class_slug: &str) -> Result<LevelUpResult, Error>;

    /// `PUT /characters/{id}/classes/{classSlug}/subclass`
    async fn set_subclass(
        &self,
        character_id: &str,
        class_slug: &str,
        request: &SubclassRequest,
    ) -> Result<(), Error>;

    /// `PATCH /characters/{id}/hit-points`
    async fn update_hit_points(
        &self,
        character_id: &str,
        update: &HitPointsUpdate,
    ) -> Result<(), Error>;
}

/// Character API client.
#[derive(Clone)]
pub struct Compendium {
    client: reqwest::Client,
    config: ClientConfig,
}

impl Compendium {
    /// Create a client from a config.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .default_headers(Self::build_headers(&config)?)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create a client from `COMPENDIUM_API_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn build_headers(config: &ClientConfig) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| Error::Config(format!("Invalid API token: {e}")))?,
            );
        }
        Ok(headers)
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status, "character API returned an error");
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let response = self.execute(self.client.get(self.config.url(path))).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, Error> {
        self.execute(
            self.client
                .request(method, self.config.url(path))
                .json(body),
        )
        .await
    }
}

#[async_trait]
impl CharacterApi for Compendium {
    async fn pending_choices(
        &self,
        character_id: &str,
        choice_type: Option<ChoiceType>,
    ) -> Result<PendingChoicesResponse, Error> {
        let path = match choice_type {
            Some(t) => format!("characters/{character_id}/pending-choices?type={t}"),
            None => format!("characters/{character_id}/pending-choices"),
        };
        self.get_json(&path).await
    }

    async fn resolve_choice(
        &self,
        character_id: &str,
        choice_id: &str,
        request: &ResolveChoiceRequest,
    ) -> Result<(), Error> {
        self.send_json(
            reqwest::Method::POST,
            &format!("characters/{character_id}/choices/{choice_id}/resolve"),
            request,
        )
        .await?;
        Ok(())
    }

    async fn undo_choice(
        &self,
        character_id: &str,
        choice_id: &str,
        selection: &str,
    ) -> Result<(), Error> {
        self.send_json(
            reqwest::Method::POST,
            &format!("characters/{character_id}/choices/{choice_id}/undo"),
            &serde_json::json!({ "selection": selection }),
        )
        .await?;
        Ok(())
    }

    async fn choice_options(&self, endpoint: &str) -> Result<Vec<ChoiceOption>, Error> {
        let payload: OptionsPayload = self.get_json(endpoint).await?;
        Ok(payload.into_options())
    }

    async fn level_up(&self, public_id: &str, class_slug: &str) -> Result<LevelUpResult, Error> {
        let response = self
            .execute(self.client.post(
                self.config
                    .url(&format!("characters/{public_id}/classes/{class_slug}/level-up")),
            ))
            .await?;

        let envelope: DataEnvelope<LevelUpResult> = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;
        Ok(envelope.data)
    }

    async fn set_subclass(
        &self,
        character_id: &str,
        class_slug: &str,
        request: &SubclassRequest,
    ) -> Result<(), Error> {
        self.send_json(
            reqwest::Method::PUT,
            &format!("characters/{character_id}/classes/{class_slug}/subclass"),
            request,
        )
        .await?;
        Ok(())
    }

    async fn update_hit_points(
        &self,
        character_id: &str,
        update: &HitPointsUpdate,
    ) -> Result<(), Error> {
        self.send_json(
            reqwest::Method::PATCH,
            &format!("characters/{character_id}/hit-points"),
            update,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Compendium::new(ClientConfig::new("https://compendium.test/api"))
            .expect("client should build");
        assert_eq!(client.config().base_url, "https://compendium.test/api");
    }

    #[test]
    fn test_bad_token_is_config_error() {
        let config = ClientConfig::new("https://compendium.test").with_token("bad\ntoken");
        assert!(matches!(Compendium::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_error_display() {
        let err = Error::Api {
            status: 422,
            message: "selection count mismatch".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error (status 422): selection count mismatch"
        );
    }

    #[tokio::test]
    async fn test_mock_api_is_object_safe() {
        let mut mock = MockCharacterApi::new();
        mock.expect_level_up().returning(|_, _| {
            Ok(LevelUpResult {
                previous_level: 1,
                new_level: 2,
                class_slug: Some("fighter".to_string()),
                class_level: Some(2),
                hit_die: Some(10),
                hp_increase: None,
                new_max_hp: None,
                features_gained: Vec::new(),
                spell_slots: Default::default(),
                asi_pending: false,
                hp_choice_pending: true,
            })
        });

        let api: Box<dyn CharacterApi> = Box::new(mock);
        let result = api.level_up("pub-1", "fighter").await.unwrap();
        assert_eq!(result.new_level, 2);
        assert!(result.hp_choice_pending);
    }
}

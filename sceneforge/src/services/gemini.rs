//! Gemini-backed implementations of the analysis, image, composite, and
//! suggestion interfaces.

use crate::core::{ImagePayload, SceneAnalysis, Suggestion};
use crate::errors::ServiceError;
use crate::services::{
    expect_success, prompts, ImageGenerator, SceneAnalyzer, SceneCompositor, SuggestionProvider,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-pro";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

/// Client for the Gemini `generateContent` API.
///
/// One client serves the analysis model (structured JSON output) and the
/// image model (inline image output). Constructed from an explicit API key;
/// see [`crate::config::ServiceCredentials`] for sourcing keys from the
/// environment.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    analysis_model: String,
    image_model: String,
}

impl GeminiClient {
    /// Creates a client with the default endpoint and models.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    /// Overrides the API endpoint (for proxies and test servers).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the model names.
    #[must_use]
    pub fn with_models(
        mut self,
        analysis_model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Self {
        self.analysis_model = analysis_model.into();
        self.image_model = image_model.into();
        self
    }

    async fn generate_content(
        &self,
        model: &str,
        parts: Vec<Part>,
        response_mime_type: &str,
    ) -> Result<GenerateContentResponse, ServiceError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_mime_type: response_mime_type.to_string(),
            },
        };

        debug!(model, response_mime_type, "calling generateContent");
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = expect_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl SceneAnalyzer for GeminiClient {
    async fn analyze(&self, photo: &ImagePayload) -> Result<SceneAnalysis, ServiceError> {
        let parts = vec![Part::image(photo), Part::text(prompts::analysis_prompt())];
        let response = self
            .generate_content(&self.analysis_model, parts, "application/json")
            .await?;
        let text = first_text(&response)?;
        serde_json::from_str(&text)
            .map_err(|e| ServiceError::InvalidResponse(format!("analysis JSON: {e}")))
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(&self, prompt: &str) -> Result<ImagePayload, ServiceError> {
        let parts = vec![Part::text(prompt.to_string())];
        let response = self
            .generate_content(&self.image_model, parts, "image/png")
            .await?;
        last_inline_image(&response)
    }
}

#[async_trait]
impl SceneCompositor for GeminiClient {
    async fn composite(
        &self,
        images: &[ImagePayload],
        description: &str,
    ) -> Result<ImagePayload, ServiceError> {
        let mut parts: Vec<Part> = images.iter().map(Part::image).collect();
        parts.push(Part::text(prompts::composite_prompt(description)));
        let response = self
            .generate_content(&self.image_model, parts, "image/png")
            .await?;
        last_inline_image(&response)
    }
}

#[async_trait]
impl SuggestionProvider for GeminiClient {
    async fn suggestions(
        &self,
        photo: &ImagePayload,
        count: usize,
    ) -> Result<Vec<Suggestion>, ServiceError> {
        let parts = vec![
            Part::image(photo),
            Part::text(prompts::suggestions_prompt(count)),
        ];
        let response = self
            .generate_content(&self.analysis_model, parts, "application/json")
            .await?;
        let text = first_text(&response)?;
        let envelope: SuggestionsEnvelope = serde_json::from_str(&text)
            .map_err(|e| ServiceError::InvalidResponse(format!("suggestions JSON: {e}")))?;
        Ok(envelope.suggestions)
    }
}

/// Returns the first text part of the first candidate.
fn first_text(response: &GenerateContentResponse) -> Result<String, ServiceError> {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.iter().find_map(|p| p.text.clone()))
        .ok_or_else(|| ServiceError::InvalidResponse("no text part in response".to_string()))
}

/// Returns the last inline image part of the first candidate.
///
/// The image models may emit several drafts; the last one wins.
fn last_inline_image(response: &GenerateContentResponse) -> Result<ImagePayload, ServiceError> {
    let inline = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(|c| {
            c.parts
                .iter()
                .filter_map(|p| p.inline_data.as_ref())
                .filter(|d| d.mime_type.starts_with("image/"))
                .next_back()
        })
        .ok_or_else(|| ServiceError::InvalidResponse("no image data in response".to_string()))?;

    let data = STANDARD
        .decode(&inline.data)
        .map_err(|e| ServiceError::InvalidResponse(format!("image base64: {e}")))?;
    Ok(ImagePayload::new(data, inline.mime_type.clone()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }

    fn image(payload: &ImagePayload) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: payload.mime_type.clone(),
                data: STANDARD.encode(&payload.data),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct SuggestionsEnvelope {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

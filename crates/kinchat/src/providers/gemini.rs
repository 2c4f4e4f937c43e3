//! Gemini `generateContent` client for chat, image generation and analysis.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    ChatProvider, GeneratedImage, ImageProvider, InlineImage, ProviderError, ProviderResult,
    UpstreamReply, parse_error_message,
};
use crate::config::GeminiConfig;
use crate::models::{ChatTurn, Role};

const PROVIDER: &str = "gemini";

const ANALYZE_TEMPERATURE: f32 = 0.7;
const ANALYZE_MAX_OUTPUT_TOKENS: u32 = 2048;

// --- Request types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    fn image(image: &InlineImage) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: STANDARD.encode(&image.data),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String, // base64-encoded
}

// --- Response types ---

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// Parts of the first candidate.
    fn into_parts(self) -> Vec<Part> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default()
    }
}

fn joined_text(parts: &[Part]) -> String {
    parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("")
}

/// Single-shot client for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    image_model: String,
    analyze_model: String,
    chat_model: String,
}

impl GeminiProvider {
    pub fn new(config: &GeminiConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            image_model: config.image_model.clone(),
            analyze_model: config.analyze_model.clone(),
            chat_model: config.chat_model.clone(),
        }
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> ProviderResult<GenerateContentResponse> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured("Gemini"))?;

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        debug!(url = %url, "Calling Gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Network {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ProviderError::Network {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        if !status.is_success() {
            let message = parse_error_message(&body)
                .unwrap_or_else(|| format!("API error ({})", status.as_u16()));
            warn!(status = status.as_u16(), model, "Gemini rejected request: {}", message);
            return Err(ProviderError::Http {
                provider: PROVIDER,
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
            provider: PROVIDER,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate_image(
        &self,
        prompt: &str,
        source: Option<InlineImage>,
    ) -> ProviderResult<GeneratedImage> {
        let mut parts = vec![Part::text(prompt)];
        if let Some(source) = &source {
            parts.push(Part::image(source));
        }

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["TEXT", "IMAGE"]),
                ..GenerationConfig::default()
            }),
        };

        let parts = self
            .generate_content(&self.image_model, &request)
            .await?
            .into_parts();

        let Some(inline) = parts.iter().find_map(|p| p.inline_data.as_ref()) else {
            let text = joined_text(&parts);
            return Err(ProviderError::NoImage((!text.is_empty()).then_some(text)));
        };

        let data = STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|e| ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: format!("image data is not valid base64: {e}"),
            })?;

        Ok(GeneratedImage {
            image: InlineImage {
                mime_type: inline.mime_type.clone(),
                data,
            },
            model: self.image_model.clone(),
        })
    }

    async fn analyze_image(&self, prompt: &str, image: InlineImage) -> ProviderResult<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(prompt), Part::image(&image)],
            }],
            generation_config: Some(GenerationConfig {
                temperature: Some(ANALYZE_TEMPERATURE),
                max_output_tokens: Some(ANALYZE_MAX_OUTPUT_TOKENS),
                ..GenerationConfig::default()
            }),
        };

        let parts = self
            .generate_content(&self.analyze_model, &request)
            .await?
            .into_parts();

        let text = joined_text(&parts);
        if text.trim().is_empty() {
            return Err(ProviderError::NoText);
        }
        Ok(text)
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn chat(&self, turns: &[ChatTurn]) -> ProviderResult<UpstreamReply> {
        let contents = turns
            .iter()
            .map(|turn| Content {
                role: Some(
                    match turn.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    }
                    .to_string(),
                ),
                parts: vec![Part::text(&turn.content)],
            })
            .collect();

        let request = GenerateContentRequest {
            contents,
            generation_config: None,
        };

        let parts = self
            .generate_content(&self.chat_model, &request)
            .await?
            .into_parts();

        let text = joined_text(&parts);
        if text.is_empty() {
            return Err(ProviderError::NoText);
        }
        Ok(UpstreamReply::SingleShot(text))
    }
}

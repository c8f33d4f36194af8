//! Gemini `generateContent` client over reqwest

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{GenerateRequest, GenerativeModel, ModelError};
use crate::ModelConfig;

/// Harm categories relaxed to `BLOCK_NONE`
///
/// Cancellation walkthroughs ("how do I stop payments", "delete my account")
/// trip the default thresholds often enough to make the feature useless.
const RELAXED_HARM_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, config: &ModelConfig) -> Result<Self, ModelError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ModelError::MissingApiKey(config.api_key_env.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Build a client from the API key in `config.api_key_env`
    ///
    /// Returns `None` when the variable is unset or empty, or the HTTP client
    /// cannot be built.
    pub fn from_env(config: &ModelConfig) -> Option<Self> {
        let Ok(api_key) = std::env::var(&config.api_key_env) else {
            info!("{} not set, model client disabled", config.api_key_env);
            return None;
        };

        match Self::new(api_key, config) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("Model client disabled: {}", e);
                None
            }
        }
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, ModelError> {
        let body = GeminiRequest::from(request);

        debug!(model = %self.model, "Sending generateContent request");
        let resp = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::Decode(e.to_string()))?;

        parsed.into_text()
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

impl From<GenerateRequest> for GeminiRequest {
    fn from(request: GenerateRequest) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(request.prompt),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
                response_mime_type: request.response_mime_type,
            },
            safety_settings: RELAXED_HARM_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GeminiResponse {
    fn into_text(self) -> Result<String, ModelError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::Blocked(reason));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(ModelError::EmptyResponse)?;

        if let Some(reason) = candidate.finish_reason.as_deref()
            && reason != "STOP"
        {
            warn!("Model finished with reason {}", reason);
        }

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Path, http::HeaderMap, http::StatusCode, routing::post};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(endpoint: &str) -> ModelConfig {
        ModelConfig {
            endpoint: endpoint.to_string(),
            ..ModelConfig::default()
        }
    }

    #[test]
    fn request_body_matches_wire_format() {
        let request = GenerateRequest::json("prompt text", &ModelConfig::default());
        let body = serde_json::to_value(GeminiRequest::from(request)).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "prompt text");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(body["generationConfig"]["temperature"], 0.2);
        let safety = body["safetySettings"].as_array().unwrap();
        assert_eq!(safety.len(), 4);
        assert!(safety.iter().all(|s| s["threshold"] == "BLOCK_NONE"));
    }

    #[test]
    fn blank_api_key_is_rejected() {
        assert!(matches!(
            GeminiClient::new("  ", &ModelConfig::default()),
            Err(ModelError::MissingApiKey(_))
        ));
    }

    #[tokio::test]
    async fn generate_returns_concatenated_parts() {
        let seen: Arc<Mutex<Vec<(String, String, Value)>>> = Arc::default();
        let seen_in_handler = seen.clone();

        let router = Router::new().route(
            "/v1beta/models/:call",
            post(move |Path(call): Path<String>, headers: HeaderMap, Json(body): Json<Value>| {
                let seen = seen_in_handler.clone();
                async move {
                    let key = headers
                        .get("x-goog-api-key")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    seen.lock().unwrap().push((call, key, body));
                    Json(json!({
                        "candidates": [{
                            "content": {"role": "model", "parts": [
                                {"text": "{\"cancellation_url\": "},
                                {"text": "\"\"}"}
                            ]},
                            "finishReason": "STOP"
                        }]
                    }))
                }
            }),
        );
        let endpoint = serve(router).await;

        let client = GeminiClient::new("test-key", &config(&endpoint)).unwrap();
        let text = client
            .generate(GenerateRequest::json("hello", &ModelConfig::default()))
            .await
            .unwrap();

        assert_eq!(text, "{\"cancellation_url\": \"\"}");
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "gemini-2.0-flash:generateContent");
        assert_eq!(seen[0].1, "test-key");
        assert_eq!(seen[0].2["contents"][0]["parts"][0]["text"], "hello");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let router = Router::new().route(
            "/v1beta/models/:call",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "quota exceeded") }),
        );
        let endpoint = serve(router).await;

        let client = GeminiClient::new("test-key", &config(&endpoint)).unwrap();
        let err = client
            .generate(GenerateRequest::json("hello", &ModelConfig::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::Status { status: 429, .. }));
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let resp: GeminiResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert!(matches!(resp.into_text(), Err(ModelError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn missing_candidates_is_empty_response() {
        let resp: GeminiResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(matches!(resp.into_text(), Err(ModelError::EmptyResponse)));
    }
}

//! Gemini `generateContent` backend.

use super::{GenerationRequest, ServiceError, TextGenerator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Default public endpoint.
pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini API request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

/// Gemini API response body.
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
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP client for the Gemini text-generation API.
pub struct GeminiService {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl GeminiService {
    pub fn new(api_url: &str, api_key: &str, timeout_seconds: u64) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_url, model)
    }
}

fn build_body(request: &GenerationRequest) -> GenerateContentRequest<'_> {
    let structured = request.response_schema.is_some();
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![RequestPart {
                text: &request.prompt,
            }],
        }],
        generation_config: GenerationConfig {
            max_output_tokens: request.max_output_tokens,
            temperature: request.temperature,
            response_mime_type: structured.then_some("application/json"),
            response_schema: request.response_schema.clone(),
        },
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ServiceError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        Err(ServiceError::EmptyResponse)
    } else {
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiService {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        let url = self.endpoint(&request.model);
        debug!("POST {} ({} prompt chars)", url, request.prompt.len());

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Transport(format!("request timed out: {}", e))
                } else if e.is_connect() {
                    ServiceError::Transport(format!("cannot connect to {}: {}", self.api_url, e))
                } else {
                    ServiceError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Unavailable(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        extract_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Agent;

    fn request(schema: Option<Value>) -> GenerationRequest {
        GenerationRequest {
            agent: Agent::Synthesis,
            model: "gemini-2.5-flash".to_string(),
            prompt: "hello".to_string(),
            max_output_tokens: 4096,
            temperature: 0.2,
            response_schema: schema,
        }
    }

    #[test]
    fn test_plain_body_shape() {
        let req = request(None);
        let body = serde_json::to_value(build_body(&req)).unwrap();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4096);
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_structured_body_shape() {
        let req = request(Some(serde_json::json!({"type": "OBJECT"})));
        let body = serde_json::to_value(build_body(&req)).unwrap();

        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello, "},{"text":"world"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "Hello, world");
    }

    #[test]
    fn test_extract_text_empty() {
        let response: GenerateContentResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(extract_text(response), Err(ServiceError::EmptyResponse));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let service = GeminiService::new("https://example.test/", "key", 10).unwrap();
        assert_eq!(
            service.endpoint("gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}

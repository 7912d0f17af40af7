//! Model service boundary.
//!
//! [`TextGenerator`] is the single blocking-call seam to the external
//! text-generation service. [`ModelClient`] wraps it with the retry
//! policy and turns every failure into a [`ModelOutput::Failed`] value.

pub mod client;
pub mod gemini;
#[cfg(test)]
pub mod mock;

pub use client::{ModelClient, RetryPolicy};
pub use gemini::GeminiService;

use crate::models::Role;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Which pipeline agent a request belongs to. Used for tracing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Agent {
    Specialist(Role),
    Synthesis,
    PatientSummary,
    ActionSteps,
    Structurer,
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Agent::Specialist(role) => write!(f, "{}", role),
            Agent::Synthesis => write!(f, "MultidisciplinaryTeam"),
            Agent::PatientSummary => write!(f, "PatientSummary"),
            Agent::ActionSteps => write!(f, "ActionSteps"),
            Agent::Structurer => write!(f, "StructuredParser"),
        }
    }
}

/// One request to the model service.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub agent: Agent,
    pub model: String,
    pub prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Strict output schema; when present the service must answer with JSON.
    pub response_schema: Option<Value>,
}

/// Failure of a single call to the model service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("503 UNAVAILABLE: {0}")]
    Unavailable(String),

    #[error("model service rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode model response: {0}")]
    Decode(String),

    #[error("model returned no text")]
    EmptyResponse,
}

impl ServiceError {
    /// Only service-unavailable failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }
}

/// A text-generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError>;
}

/// Outcome of one adapter invocation. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Text(String),
    Failed(String),
}

impl ModelOutput {
    /// Text to hand downstream. Failures render as an `Error: ...` marker.
    pub fn into_text(self) -> String {
        match self {
            ModelOutput::Text(text) => text,
            ModelOutput::Failed(cause) => format!("Error: {}", cause),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ModelOutput::Text(text) => Some(text),
            ModelOutput::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ModelOutput::Failed(_))
    }
}

//! Retrying adapter over a [`TextGenerator`].

use super::{Agent, GenerationRequest, ModelOutput, TextGenerator};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How transient failures are retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed wait before each resubmission.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(15),
        }
    }
}

/// Shared, cheaply clonable handle to the model service.
#[derive(Clone)]
pub struct ModelClient {
    service: Arc<dyn TextGenerator>,
    model: String,
    max_output_tokens: u32,
    retry: RetryPolicy,
}

impl ModelClient {
    pub fn new(
        service: Arc<dyn TextGenerator>,
        model: impl Into<String>,
        max_output_tokens: u32,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            model: model.into(),
            max_output_tokens,
            retry,
        }
    }

    /// The model identifier requests are sent to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a free-text prompt.
    pub async fn invoke(&self, agent: Agent, prompt: String, temperature: f32) -> ModelOutput {
        let request = GenerationRequest {
            agent,
            model: self.model.clone(),
            prompt,
            max_output_tokens: self.max_output_tokens,
            temperature,
            response_schema: None,
        };
        self.send(request).await
    }

    /// Send a prompt whose answer must be JSON conforming to `schema`.
    pub async fn invoke_structured(
        &self,
        agent: Agent,
        model: &str,
        prompt: String,
        schema: Value,
    ) -> ModelOutput {
        let request = GenerationRequest {
            agent,
            model: model.to_string(),
            prompt,
            max_output_tokens: self.max_output_tokens,
            temperature: 0.0,
            response_schema: Some(schema),
        };
        self.send(request).await
    }

    async fn send(&self, request: GenerationRequest) -> ModelOutput {
        let agent = request.agent;
        let max_attempts = self.retry.max_attempts.max(1);
        info!("{} is running...", agent);

        for attempt in 1..=max_attempts {
            debug!(agent = %agent, attempt, "Sending model request");

            match self.service.generate(&request).await {
                Ok(text) => return ModelOutput::Text(text),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        agent = %agent,
                        attempt,
                        "Attempt failed ({}). Retrying in {}s",
                        e,
                        self.retry.delay.as_secs()
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => {
                    warn!(agent = %agent, attempt, "Model call failed: {}", e);
                    return ModelOutput::Failed(e.to_string());
                }
            }
        }

        ModelOutput::Failed("failed to generate content after all retries".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedService;
    use crate::llm::ServiceError;
    use crate::models::Role;

    fn client(service: Arc<ScriptedService>) -> ModelClient {
        ModelClient::new(
            service,
            "test-model",
            256,
            RetryPolicy {
                max_attempts: 3,
                delay: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let service = Arc::new(ScriptedService::new(|_| Ok("fine".to_string())));
        let output = client(service.clone())
            .invoke(Agent::Synthesis, "prompt".into(), 0.2)
            .await;

        assert_eq!(output, ModelOutput::Text("fine".to_string()));
        assert_eq!(service.calls(Agent::Synthesis), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_up_to_ceiling() {
        let service = Arc::new(ScriptedService::new(|_| {
            Err(ServiceError::Unavailable("model overloaded".into()))
        }));
        let agent = Agent::Specialist(Role::Cardiologist);
        let output = client(service.clone()).invoke(agent, "prompt".into(), 0.2).await;

        assert!(output.is_failed());
        assert!(output.into_text().contains("503 UNAVAILABLE"));
        assert_eq!(service.calls(agent), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_service_sleeps_between_attempts() {
        let service = Arc::new(ScriptedService::new(|_| {
            Err(ServiceError::Unavailable("model overloaded".into()))
        }));
        let client = ModelClient::new(service.clone(), "test-model", 256, RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let output = client.invoke(Agent::Synthesis, "prompt".into(), 0.2).await;
        let elapsed = started.elapsed();

        assert!(output.is_failed());
        assert_eq!(service.calls(Agent::Synthesis), 3);
        assert!(elapsed >= Duration::from_secs(30));
        assert!(elapsed < Duration::from_secs(45));
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let service = Arc::new(ScriptedService::failing_first(
            1,
            ServiceError::Unavailable("busy".into()),
            |_| Ok("recovered".to_string()),
        ));
        let output = client(service.clone())
            .invoke(Agent::PatientSummary, "prompt".into(), 0.4)
            .await;

        assert_eq!(output.as_text(), Some("recovered"));
        assert_eq!(service.calls(Agent::PatientSummary), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_never_retries() {
        let service = Arc::new(ScriptedService::new(|_| {
            Err(ServiceError::Rejected {
                status: 403,
                body: "API key not valid".into(),
            })
        }));
        let output = client(service.clone())
            .invoke(Agent::ActionSteps, "prompt".into(), 0.2)
            .await;

        assert!(output.is_failed());
        assert!(output.into_text().contains("403"));
        assert_eq!(service.calls(Agent::ActionSteps), 1);
    }

    #[tokio::test]
    async fn test_structured_request_carries_schema() {
        let service = Arc::new(ScriptedService::new(|request| {
            assert!(request.response_schema.is_some());
            assert_eq!(request.temperature, 0.0);
            assert_eq!(request.model, "lite-model");
            Ok("{}".to_string())
        }));
        let output = client(service)
            .invoke_structured(
                Agent::Structurer,
                "lite-model",
                "prompt".into(),
                serde_json::json!({"type": "OBJECT"}),
            )
            .await;

        assert_eq!(output.as_text(), Some("{}"));
    }
}

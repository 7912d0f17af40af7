//! Scripted in-memory model service for tests.

use super::{Agent, GenerationRequest, ServiceError, TextGenerator};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

type Responder = dyn Fn(&GenerationRequest) -> Result<String, ServiceError> + Send + Sync;

/// Answers every request through a closure and counts calls per agent.
pub struct ScriptedService {
    responder: Box<Responder>,
    fail_first: usize,
    failure: Option<ServiceError>,
    calls: Mutex<HashMap<Agent, usize>>,
    total: Mutex<usize>,
}

impl ScriptedService {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, ServiceError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            fail_first: 0,
            failure: None,
            calls: Mutex::new(HashMap::new()),
            total: Mutex::new(0),
        }
    }

    /// Fail the first `count` calls with `failure`, then defer to `responder`.
    pub fn failing_first<F>(count: usize, failure: ServiceError, responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, ServiceError> + Send + Sync + 'static,
    {
        Self {
            fail_first: count,
            failure: Some(failure),
            ..Self::new(responder)
        }
    }

    /// Number of calls made on behalf of `agent`.
    pub fn calls(&self, agent: Agent) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&agent)
            .copied()
            .unwrap_or(0)
    }

    /// Number of calls across all agents.
    pub fn total_calls(&self) -> usize {
        *self.total.lock().unwrap()
    }
}

#[async_trait]
impl TextGenerator for ScriptedService {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        *self.calls.lock().unwrap().entry(request.agent).or_insert(0) += 1;
        let seen = {
            let mut total = self.total.lock().unwrap();
            *total += 1;
            *total
        };

        if seen <= self.fail_first {
            if let Some(ref failure) = self.failure {
                return Err(failure.clone());
            }
        }

        (self.responder)(request)
    }
}

//! Specialist Runner: one concurrent model call per role.

use super::prompts::specialist_prompt;
use crate::classify::ErrorClassifier;
use crate::llm::{Agent, ModelClient, ModelOutput};
use crate::models::Role;
use crate::store::{ReportStore, Stage};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// The output of every specialist, exactly one per role.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialistReports {
    results: BTreeMap<Role, ModelOutput>,
}

impl SpecialistReports {
    /// Build from collected results. Roles with no result get a failure marker.
    pub fn from_results(results: impl IntoIterator<Item = (Role, ModelOutput)>) -> Self {
        let mut collected: BTreeMap<Role, ModelOutput> = results.into_iter().collect();
        for role in Role::ALL {
            collected.entry(role).or_insert_with(|| {
                ModelOutput::Failed(format!("{} report failed to generate", role))
            });
        }
        Self { results: collected }
    }

    pub fn get(&self, role: Role) -> &ModelOutput {
        // from_results fills every role
        &self.results[&role]
    }

    /// Text per role as handed downstream; failures render as error markers.
    pub fn texts(&self) -> Vec<(Role, String)> {
        Role::ALL
            .iter()
            .map(|role| (*role, self.get(*role).clone().into_text()))
            .collect()
    }

    /// Roles whose output is error-shaped.
    pub fn failed_roles(&self, classifier: &dyn ErrorClassifier) -> Vec<Role> {
        self.texts()
            .into_iter()
            .filter(|(_, text)| classifier.is_error_shaped(text))
            .map(|(role, _)| role)
            .collect()
    }
}

/// Runs the three specialists concurrently and waits for all of them.
pub struct SpecialistRunner {
    client: ModelClient,
    temperature: f32,
}

impl SpecialistRunner {
    pub fn new(client: ModelClient, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }

    /// Run every role over `document`. Never fails; failures are tagged per role.
    pub async fn run(&self, document: &str) -> SpecialistReports {
        let document: Arc<str> = Arc::from(document);

        let handles: Vec<_> = Role::ALL
            .into_iter()
            .map(|role| {
                let client = self.client.clone();
                let document = Arc::clone(&document);
                let temperature = self.temperature;

                tokio::spawn(async move {
                    let prompt = specialist_prompt(role, &document);
                    let output = client
                        .invoke(Agent::Specialist(role), prompt, temperature)
                        .await;
                    debug!(role = %role, failed = output.is_failed(), "Specialist finished");
                    (role, output)
                })
            })
            .collect();

        let joined = join_all(handles).await;

        let results = joined
            .into_iter()
            .zip(Role::ALL)
            .map(|(joined, role)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(role = %role, "Specialist task panicked: {}", e);
                    (
                        role,
                        ModelOutput::Failed(format!("exception during {} run: {}", role, e)),
                    )
                }
            });

        SpecialistReports::from_results(results)
    }
}

/// Persist every usable specialist report for `key`.
pub fn persist_reports(
    store: &ReportStore,
    key: &str,
    reports: &SpecialistReports,
    classifier: &dyn ErrorClassifier,
) {
    for role in Role::ALL {
        let Some(text) = reports.get(role).as_text() else {
            continue;
        };
        if classifier.is_error_shaped(text) {
            continue;
        }
        if let Err(e) = store.save_artifact(key, Stage::Specialist(role), text) {
            warn!("Could not save {} report: {:#}", role, e);
        }
    }
}

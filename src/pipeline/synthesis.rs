//! Synthesis Stage: merge the specialist reports into one integrated report.

use super::prompts::synthesis_prompt;
use super::specialists::SpecialistReports;
use crate::llm::{Agent, ModelClient, ModelOutput};

pub struct SynthesisStage {
    client: ModelClient,
    temperature: f32,
}

impl SynthesisStage {
    pub fn new(client: ModelClient, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }

    /// One model call over all three reports, role-labeled and verbatim.
    pub async fn synthesize(&self, reports: &SpecialistReports) -> ModelOutput {
        let texts = reports.texts();
        let labeled: Vec<_> = texts.iter().map(|(role, text)| (*role, text.as_str())).collect();

        self.client
            .invoke(Agent::Synthesis, synthesis_prompt(&labeled), self.temperature)
            .await
    }
}

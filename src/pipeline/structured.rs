//! Structured extraction of the merged report into a fixed JSON schema.

use super::prompts::structured_prompt;
use super::specialists::SpecialistReports;
use crate::llm::{Agent, ModelClient, ModelOutput};
use crate::models::StructuredReport;
use serde_json::{json, Value};
use tracing::warn;

/// Response schema for `{final_diagnosis: [{name, reason}], treatment_plan}`.
pub fn report_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "final_diagnosis": {
                "type": "ARRAY",
                "description": "The top 3 prioritized diagnoses, each with a name and a brief supporting reason.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": {"type": "STRING", "description": "The disease or condition name."},
                        "reason": {"type": "STRING", "description": "Supporting reason from the specialist reports."}
                    },
                    "required": ["name", "reason"]
                }
            },
            "treatment_plan": {
                "type": "STRING",
                "description": "The integrated treatment and management plan as a multi-line bulleted string."
            }
        },
        "required": ["final_diagnosis", "treatment_plan"]
    })
}

pub struct StructuredExtractor {
    client: ModelClient,
    model: String,
}

impl StructuredExtractor {
    pub fn new(client: ModelClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Returns `None` when the call fails or the JSON does not match the schema.
    pub async fn extract(
        &self,
        merged_report: &str,
        reports: &SpecialistReports,
    ) -> Option<StructuredReport> {
        let texts = reports.texts();
        let labeled: Vec<_> = texts.iter().map(|(role, text)| (*role, text.as_str())).collect();

        let output = self
            .client
            .invoke_structured(
                Agent::Structurer,
                &self.model,
                structured_prompt(merged_report, &labeled),
                report_schema(),
            )
            .await;

        match output {
            ModelOutput::Text(raw) => match serde_json::from_str(&raw) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Failed to decode structured report: {}. Raw output: {}", e, raw);
                    None
                }
            },
            ModelOutput::Failed(cause) => {
                warn!("Structured extraction failed: {}", cause);
                None
            }
        }
    }
}

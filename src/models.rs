//! Data models for the analysis pipeline.
//!
//! This module contains the core data structures shared by the pipeline
//! stages, the result cache and the report renderer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One of the three fixed specialist roles run over every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Cardiovascular system (heart, vessels, blood pressure)
    Cardiologist,
    /// Mental and behavioral health
    Psychologist,
    /// Respiratory system (lungs, airways)
    Pulmonologist,
}

impl Role {
    /// All roles, in the order they are presented to the synthesis prompt.
    pub const ALL: [Role; 3] = [Role::Cardiologist, Role::Psychologist, Role::Pulmonologist];

    /// Lowercase identifier used in artifact file names.
    pub fn slug(&self) -> &'static str {
        match self {
            Role::Cardiologist => "cardiologist",
            Role::Psychologist => "psychologist",
            Role::Pulmonologist => "pulmonologist",
        }
    }

    /// The clinical area the role focuses on.
    pub fn focus(&self) -> &'static str {
        match self {
            Role::Cardiologist => "the cardiovascular system (heart, blood vessels, blood pressure)",
            Role::Psychologist => {
                "mental and behavioral health (stress, anxiety, mood, cognition)"
            }
            Role::Pulmonologist => "the respiratory system (lungs, airways, breathing)",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Cardiologist => write!(f, "Cardiologist"),
            Role::Psychologist => write!(f, "Psychologist"),
            Role::Pulmonologist => write!(f, "Pulmonologist"),
        }
    }
}

/// A single prioritized diagnosis from the structured extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// The disease or condition name.
    pub name: String,
    /// Supporting reason drawn from the specialist reports.
    pub reason: String,
}

/// Machine-readable view of the merged report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredReport {
    /// Prioritized list of likely diagnoses.
    pub final_diagnosis: Vec<Diagnosis>,
    /// Integrated treatment and management plan.
    pub treatment_plan: String,
}

/// Immediate and follow-up action items derived from the merged report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionSteps {
    /// Steps to take right away (at most 3).
    pub immediate: Vec<String>,
    /// Longer-term steps (at most 5).
    pub followup: Vec<String>,
}

/// The complete result of one pipeline run.
///
/// This is both the value handed back to the caller and the cache entry
/// persisted per document key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    /// Canonical key of the input document.
    pub document_key: String,
    /// Model identifier used for the run.
    pub model: String,
    /// When the payload was produced.
    pub generated_at: DateTime<Utc>,
    /// Path to the persisted patient summary artifact.
    pub patient_summary_path: PathBuf,
    /// Path to the persisted merged report artifact.
    pub internal_report_path: PathBuf,
    /// The merged multidisciplinary report.
    pub merged_report_text: String,
    /// Simplified patient-facing summary.
    pub patient_summary_text: String,
    /// Immediate action steps.
    pub immediate_steps: Vec<String>,
    /// Follow-up action steps.
    pub followup_steps: Vec<String>,
    /// Cardiologist output.
    pub cardiology_text: String,
    /// Psychologist output.
    pub psychology_text: String,
    /// Pulmonologist output.
    pub pulmonology_text: String,
    /// Structured extraction of the merged report, when enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<StructuredReport>,
}

impl ResultPayload {
    /// Returns the specialist text for a role.
    pub fn specialist_text(&self, role: Role) -> &str {
        match role {
            Role::Cardiologist => &self.cardiology_text,
            Role::Psychologist => &self.psychology_text,
            Role::Pulmonologist => &self.pulmonology_text,
        }
    }
}

//! Derived-Views Stage: patient summary and action-step lists.
//!
//! Action steps come back as loosely formatted bullets. They are split into
//! two buckets by scanning for section markers ("immediate", "follow") and
//! bullet prefixes. This is best-effort segmentation, not a strict parser.

use super::prompts::{action_steps_prompt, patient_summary_prompt};
use crate::llm::{Agent, ModelClient, ModelOutput};
use crate::models::ActionSteps;

/// Maximum number of immediate steps kept.
pub const MAX_IMMEDIATE_STEPS: usize = 3;

/// Maximum number of follow-up steps kept.
pub const MAX_FOLLOWUP_STEPS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Immediate,
    FollowUp,
}

/// Strip a leading bullet marker (`-`, `*`, `•`, `1.`, `2)`), if any.
fn strip_bullet(line: &str) -> Option<&str> {
    let line = line.trim();

    for prefix in ["- ", "* ", "• ", "-", "*", "•"] {
        if let Some(rest) = line.strip_prefix(prefix) {
            // "**Heading**" is emphasis, "---" is a divider
            if prefix == "*" && rest.starts_with('*') {
                return None;
            }
            if rest.trim_start_matches(['-', '*', '•', ' ']).is_empty() && !rest.is_empty() {
                return None;
            }
            return Some(rest.trim());
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return Some(rest.trim());
        }
    }

    None
}

/// Split a bulleted response into immediate and follow-up steps.
///
/// Keeps the original order, removes bullet markers, keeps at most
/// [`MAX_IMMEDIATE_STEPS`] immediate and [`MAX_FOLLOWUP_STEPS`] follow-up steps.
pub fn parse_action_steps(text: &str) -> ActionSteps {
    let mut steps = ActionSteps::default();
    let mut section = None;

    for line in text.lines() {
        match strip_bullet(line) {
            Some(item) if !item.is_empty() => match section {
                Some(Section::Immediate) => steps.immediate.push(item.to_string()),
                Some(Section::FollowUp) => steps.followup.push(item.to_string()),
                None => {}
            },
            Some(_) => {}
            None => {
                let lowered = line.to_lowercase();
                if lowered.contains("immediate") {
                    section = Some(Section::Immediate);
                } else if lowered.contains("follow") {
                    section = Some(Section::FollowUp);
                }
            }
        }
    }

    steps.immediate.truncate(MAX_IMMEDIATE_STEPS);
    steps.followup.truncate(MAX_FOLLOWUP_STEPS);
    steps
}

/// Fill an empty follow-up list from the summary's 4th-6th bullet lines.
pub fn backfill_followup(steps: &mut ActionSteps, patient_summary: &str) {
    if !steps.followup.is_empty() {
        return;
    }

    steps.followup = patient_summary
        .lines()
        .filter_map(strip_bullet)
        .filter(|item| !item.is_empty())
        .skip(3)
        .take(3)
        .map(String::from)
        .collect();
}

/// Render steps in the layout [`parse_action_steps`] reads back.
pub fn format_action_steps(steps: &ActionSteps) -> String {
    let mut out = String::from("Immediate Steps:\n");
    for step in &steps.immediate {
        out.push_str(&format!("- {}\n", step));
    }
    out.push_str("Follow-up Steps:\n");
    for step in &steps.followup {
        out.push_str(&format!("- {}\n", step));
    }
    out
}

pub struct DerivedViewsStage {
    client: ModelClient,
    summary_temperature: f32,
    steps_temperature: f32,
}

impl DerivedViewsStage {
    pub fn new(client: ModelClient, summary_temperature: f32, steps_temperature: f32) -> Self {
        Self {
            client,
            summary_temperature,
            steps_temperature,
        }
    }

    pub async fn patient_summary(&self, merged_report: &str) -> ModelOutput {
        self.client
            .invoke(
                Agent::PatientSummary,
                patient_summary_prompt(merged_report),
                self.summary_temperature,
            )
            .await
    }

    /// Ask for action steps and segment them. A failed call yields empty lists.
    pub async fn action_steps(&self, merged_report: &str) -> ActionSteps {
        let output = self
            .client
            .invoke(
                Agent::ActionSteps,
                action_steps_prompt(merged_report),
                self.steps_temperature,
            )
            .await;

        match output {
            ModelOutput::Text(text) => parse_action_steps(&text),
            ModelOutput::Failed(_) => ActionSteps::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedService;
    use crate::llm::{RetryPolicy, ServiceError};
    use std::sync::Arc;
    use std::time::Duration;

    fn stage(service: Arc<ScriptedService>) -> DerivedViewsStage {
        let client = ModelClient::new(
            service,
            "m",
            256,
            RetryPolicy {
                max_attempts: 3,
                delay: Duration::ZERO,
            },
        );
        DerivedViewsStage::new(client, 0.4, 0.2)
    }

    #[test]
    fn test_failed_action_step_call_yields_empty_lists() {
        let service = Arc::new(ScriptedService::new(|_| {
            Err(ServiceError::Rejected {
                status: 401,
                body: "unauthenticated".into(),
            })
        }));

        let steps = tokio_test::block_on(stage(service.clone()).action_steps("merged"));

        assert_eq!(steps, ActionSteps::default());
        assert_eq!(service.calls(Agent::ActionSteps), 1);
    }

    #[test]
    fn test_patient_summary_uses_narrative_temperature() {
        let service = Arc::new(ScriptedService::new(|req| {
            assert_eq!(req.temperature, 0.4);
            Ok("You are doing well.".to_string())
        }));

        let output = tokio_test::block_on(stage(service).patient_summary("merged"));

        assert_eq!(output.as_text(), Some("You are doing well."));
    }

    #[test]
    fn test_parse_six_bullets() {
        let text = "Immediate Steps:\n\
                    - Schedule an ECG\n\
                    - Start a symptom diary\n\
                    - Avoid caffeine\n\
                    Follow-up Steps:\n\
                    - Repeat blood tests\n\
                    - Review with cardiology\n\
                    - Begin CBT sessions\n";

        let steps = parse_action_steps(text);

        assert_eq!(
            steps.immediate,
            vec!["Schedule an ECG", "Start a symptom diary", "Avoid caffeine"]
        );
        assert_eq!(
            steps.followup,
            vec!["Repeat blood tests", "Review with cardiology", "Begin CBT sessions"]
        );
    }

    #[test]
    fn test_parse_mixed_markers_and_truncation() {
        let text = "**Immediate actions**\n\
                    1. One\n\
                    2) Two\n\
                    * Three\n\
                    • Four\n\
                    \n\
                    **Follow-up plan**\n\
                    - a\n- b\n- c\n- d\n- e\n- f\n";

        let steps = parse_action_steps(text);

        assert_eq!(steps.immediate, vec!["One", "Two", "Three"]);
        assert_eq!(steps.followup, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_bullet_mentioning_follow_stays_in_section() {
        let text = "Immediate:\n- Follow a low-sodium diet\n- Rest\n";
        let steps = parse_action_steps(text);
        assert_eq!(steps.immediate, vec!["Follow a low-sodium diet", "Rest"]);
        assert!(steps.followup.is_empty());
    }

    #[test]
    fn test_divider_lines_are_not_steps() {
        let text = "Immediate Steps:\n- Book an ECG\n---\n* * *\nFollow-up Steps:\n- Holter\n";
        let steps = parse_action_steps(text);
        assert_eq!(steps.immediate, vec!["Book an ECG"]);
        assert_eq!(steps.followup, vec!["Holter"]);
    }

    #[test]
    fn test_bullets_before_any_marker_are_ignored() {
        let steps = parse_action_steps("- stray\n- bullets\n");
        assert!(steps.immediate.is_empty());
        assert!(steps.followup.is_empty());
    }

    #[test]
    fn test_backfill_followup_from_summary() {
        let summary = "Here is what we found.\n\
                       - one\n- two\n- three\n- four\n- five\n- six\n- seven\n";
        let mut steps = ActionSteps {
            immediate: vec!["x".to_string()],
            followup: vec![],
        };

        backfill_followup(&mut steps, summary);

        assert_eq!(steps.followup, vec!["four", "five", "six"]);
    }

    #[test]
    fn test_backfill_keeps_existing_followup() {
        let mut steps = ActionSteps {
            immediate: vec![],
            followup: vec!["keep".to_string()],
        };
        backfill_followup(&mut steps, "- a\n- b\n- c\n- d\n");
        assert_eq!(steps.followup, vec!["keep"]);
    }

    #[test]
    fn test_format_round_trips_through_parser() {
        let steps = ActionSteps {
            immediate: vec!["a".into(), "b".into(), "c".into()],
            followup: vec!["d".into(), "e".into(), "f".into()],
        };
        assert_eq!(parse_action_steps(&format_action_steps(&steps)), steps);
    }
}

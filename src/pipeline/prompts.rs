//! Prompt builders for each pipeline agent.

use crate::models::Role;

/// Prompt for one specialist reading the raw document.
pub fn specialist_prompt(role: Role, document: &str) -> String {
    let focus_tests = match role {
        Role::Cardiologist => "cardiac tests (e.g. ECG, echocardiogram, Holter monitor)",
        Role::Psychologist => {
            "psychological assessments or therapy referrals (e.g. validated anxiety scales, CBT)"
        }
        Role::Pulmonologist => {
            "lung function tests or imaging (e.g. spirometry, chest X-ray)"
        }
    };

    format!(
        r#"Act as an expert {role}. Analyze the medical report below, focusing ONLY on {focus}.

1. Assess for signs of primary conditions in your area, and for risks linked to the patient's main complaints.
2. Give a provisional assessment and name the potential issues.
3. List 3 specific next diagnostic steps, such as {tests}.

Medical Report:
{document}
"#,
        role = role,
        focus = role.focus(),
        tests = focus_tests,
        document = document
    )
}

/// Prompt for the multidisciplinary synthesis over all specialist reports.
pub fn synthesis_prompt(reports: &[(Role, &str)]) -> String {
    let mut prompt = String::from(
        r#"Act as a Multidisciplinary Team of healthcare professionals. You receive the reports of the specialists below.

Review ALL reports and write one integrated final report:
1. Final Diagnosis: 3 possible health issues, prioritized by likelihood, each with a brief reason referencing the specialist reports.
2. Integrated Treatment Plan: a detailed, bulleted plan combining medication, therapy and lifestyle recommendations from all specialists.

Return only the final diagnosis list followed by the integrated treatment plan.

"#,
    );

    for (role, text) in reports {
        prompt.push_str(&format!("{} Report:\n{}\n\n", role, text));
    }

    prompt
}

/// Prompt for the plain-language patient summary.
pub fn patient_summary_prompt(merged_report: &str) -> String {
    format!(
        r#"Rewrite the clinical team report below for the patient, in plain, calm language without medical jargon.
Start with a short paragraph explaining what the team found, then list the key points as bullet lines starting with "- ".

Team Report:
{}
"#,
        merged_report
    )
}

/// Prompt for the categorized action-item list.
pub fn action_steps_prompt(merged_report: &str) -> String {
    format!(
        r#"From the clinical team report below, list concrete next steps for the patient.
Use exactly this layout:

Immediate Steps:
- (3 steps to take now)
Follow-up Steps:
- (3 to 5 steps for the coming weeks)

Team Report:
{}
"#,
        merged_report
    )
}

/// Prompt for the structured JSON extraction of the merged report.
pub fn structured_prompt(merged_report: &str, reports: &[(Role, &str)]) -> String {
    let mut prompt = format!(
        r#"Extract the final diagnosis and the integrated treatment plan from the multidisciplinary report below, strictly following the provided JSON schema.

MULTIDISCIPLINARY REPORT:
---
{}
---

Specialist reports, for context only (do not copy them into the output):
"#,
        merged_report
    );

    for (role, text) in reports {
        prompt.push_str(&format!("- {}: {}\n", role, text));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specialist_prompt_embeds_document() {
        let prompt = specialist_prompt(Role::Pulmonologist, "Shortness of breath on exertion.");
        assert!(prompt.contains("expert Pulmonologist"));
        assert!(prompt.contains("respiratory system"));
        assert!(prompt.contains("Shortness of breath on exertion."));
    }

    #[test]
    fn test_synthesis_prompt_labels_every_role() {
        let prompt = synthesis_prompt(&[
            (Role::Cardiologist, "heart ok"),
            (Role::Psychologist, "anxious"),
            (Role::Pulmonologist, "lungs clear"),
        ]);
        assert!(prompt.contains("Cardiologist Report:\nheart ok"));
        assert!(prompt.contains("Psychologist Report:\nanxious"));
        assert!(prompt.contains("Pulmonologist Report:\nlungs clear"));
    }

    #[test]
    fn test_action_steps_prompt_has_section_markers() {
        let prompt = action_steps_prompt("plan");
        assert!(prompt.contains("Immediate Steps:"));
        assert!(prompt.contains("Follow-up Steps:"));
    }
}

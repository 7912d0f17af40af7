//! Markdown and JSON rendering of a pipeline result.

use crate::models::{ResultPayload, Role, StructuredReport};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(payload: &ResultPayload) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Consilium Report\n\n");

    output.push_str(&generate_metadata_section(payload));
    output.push_str(&generate_summary_section(&payload.patient_summary_text));
    output.push_str(&generate_steps_section(
        &payload.immediate_steps,
        &payload.followup_steps,
    ));

    if let Some(ref structured) = payload.structured {
        output.push_str(&generate_structured_section(structured));
    }

    output.push_str("## Integrated Report\n\n");
    output.push_str(payload.merged_report_text.trim());
    output.push_str("\n\n");

    output.push_str(&generate_specialist_section(payload));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(payload: &ResultPayload) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Document:** {}\n", payload.document_key));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        payload.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", payload.model));
    section.push_str(&format!(
        "- **Patient Summary:** `{}`\n",
        payload.patient_summary_path.display()
    ));
    section.push_str(&format!(
        "- **Internal Report:** `{}`\n",
        payload.internal_report_path.display()
    ));
    section.push('\n');

    section
}

fn generate_summary_section(summary: &str) -> String {
    format!("## Patient Summary\n\n{}\n\n", summary.trim())
}

/// Generate the action steps section. Empty lists are omitted.
fn generate_steps_section(immediate: &[String], followup: &[String]) -> String {
    if immediate.is_empty() && followup.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Next Steps\n\n");

    for (title, steps) in [("Immediate", immediate), ("Follow-up", followup)] {
        if steps.is_empty() {
            continue;
        }
        section.push_str(&format!("### {}\n\n", title));
        for (i, step) in steps.iter().enumerate() {
            section.push_str(&format!("{}. {}\n", i + 1, step));
        }
        section.push('\n');
    }

    section
}

fn generate_structured_section(structured: &StructuredReport) -> String {
    let mut section = String::new();

    section.push_str("## Final Diagnosis\n\n");
    section.push_str("| # | Condition | Reason |\n");
    section.push_str("|:---:|:---|:---|\n");
    for (i, diagnosis) in structured.final_diagnosis.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            i + 1,
            diagnosis.name,
            diagnosis.reason.replace('\n', " ")
        ));
    }
    section.push_str("\n### Treatment Plan\n\n");
    section.push_str(structured.treatment_plan.trim());
    section.push_str("\n\n");

    section
}

fn generate_specialist_section(payload: &ResultPayload) -> String {
    let mut section = String::new();

    section.push_str("## Specialist Reports\n\n");
    for role in Role::ALL {
        section.push_str(&format!("<details>\n<summary>{}</summary>\n\n", role));
        section.push_str(payload.specialist_text(role).trim());
        section.push_str("\n\n</details>\n\n");
    }

    section
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(
        "*Generated by Consilium. This report is not a substitute for professional medical advice.*\n",
    );

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(payload: &ResultPayload) -> Result<String> {
    serde_json::to_string_pretty(payload).map_err(Into::into)
}

//! Document loading and artifact persistence.
//!
//! Every artifact is a plain text file named `<key>_<stage>.txt` under the
//! results directory, whose first line names the agent that produced it.

pub mod cache;

pub use cache::ResultCache;

use crate::models::Role;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Document extensions stripped when deriving a document key.
pub const DOCUMENT_EXTENSIONS: [&str; 5] = ["txt", "md", "pdf", "doc", "docx"];

/// Derive the canonical cache/artifact key for an input document.
///
/// The key is the file name with one known document extension removed.
/// Two documents with the same base name map to the same key.
pub fn document_key(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some((stem, ext)) = name.rsplit_once('.') {
        let ext = ext.to_lowercase();
        if !stem.is_empty() && DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            return stem.to_string();
        }
    }
    name
}

/// A persisted stage output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Specialist(Role),
    InternalReport,
    PatientSummary,
    ActionSteps,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Specialist(Role::Cardiologist),
        Stage::Specialist(Role::Psychologist),
        Stage::Specialist(Role::Pulmonologist),
        Stage::InternalReport,
        Stage::PatientSummary,
        Stage::ActionSteps,
    ];

    /// File-name suffix for the stage.
    pub fn file_suffix(&self) -> String {
        match self {
            Stage::Specialist(role) => format!("{}_report", role.slug()),
            Stage::InternalReport => "internal_report".to_string(),
            Stage::PatientSummary => "patient_summary".to_string(),
            Stage::ActionSteps => "action_steps".to_string(),
        }
    }

    /// Header line written at the top of the artifact.
    pub fn header(&self) -> String {
        match self {
            Stage::Specialist(role) => format!("--- {} Report ---", role),
            Stage::InternalReport => "--- Multidisciplinary Team Report ---".to_string(),
            Stage::PatientSummary => "--- Patient Summary ---".to_string(),
            Stage::ActionSteps => "--- Action Steps ---".to_string(),
        }
    }

    pub fn file_name(&self, key: &str) -> String {
        format!("{}_{}.txt", key, self.file_suffix())
    }

    /// Split an artifact file name into its document key and stage.
    pub fn parse_file_name(name: &str) -> Option<(String, Stage)> {
        let stem = name.strip_suffix(".txt")?;
        Stage::ALL.iter().find_map(|stage| {
            let key = stem.strip_suffix(&format!("_{}", stage.file_suffix()))?;
            (!key.is_empty()).then(|| (key.to_string(), *stage))
        })
    }
}

/// Remove the header line written by [`ReportStore::save_artifact`].
pub fn strip_header(content: &str) -> String {
    match content.split_once('\n') {
        Some((first, rest)) if first.starts_with("--- ") && first.ends_with(" ---") => {
            rest.trim_start_matches('\n').to_string()
        }
        _ => content.to_string(),
    }
}

/// Reads input documents and writes stage artifacts.
#[derive(Debug, Clone)]
pub struct ReportStore {
    results_dir: PathBuf,
}

impl ReportStore {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    /// Read a document's text content.
    pub fn load_document(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read document: {}", path.display()))
    }

    /// Path an artifact for `key` and `stage` is written to.
    pub fn artifact_path(&self, key: &str, stage: Stage) -> PathBuf {
        self.results_dir.join(stage.file_name(key))
    }

    /// Write a stage artifact, prefixed with its header line.
    pub fn save_artifact(&self, key: &str, stage: Stage, content: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.results_dir).with_context(|| {
            format!(
                "Failed to create results directory: {}",
                self.results_dir.display()
            )
        })?;

        let path = self.artifact_path(key, stage);
        let body = format!("{}\n\n{}", stage.header(), content);
        fs::write(&path, body)
            .with_context(|| format!("Failed to write artifact: {}", path.display()))?;

        debug!("Saved {}", path.display());
        Ok(path)
    }

    /// Write an arbitrary file (e.g. JSON) next to the artifacts.
    pub fn save_raw(&self, file_name: &str, content: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.results_dir).with_context(|| {
            format!(
                "Failed to create results directory: {}",
                self.results_dir.display()
            )
        })?;

        let path = self.results_dir.join(file_name);
        fs::write(&path, content)
            .with_context(|| format!("Failed to write file: {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_document_key_strips_known_extensions() {
        assert_eq!(
            document_key(Path::new("uploads/Medical Report - Laura Garcia.txt")),
            "Medical Report - Laura Garcia"
        );
        assert_eq!(document_key(Path::new("case.DOCX")), "case");
        assert_eq!(document_key(Path::new("/tmp/case.report.pdf")), "case.report");
    }

    #[test]
    fn test_document_key_keeps_unknown_extensions() {
        assert_eq!(document_key(Path::new("notes.csv")), "notes.csv");
        assert_eq!(document_key(Path::new("README")), "README");
        assert_eq!(document_key(Path::new(".txt")), ".txt");
    }

    #[test]
    fn test_stage_file_names_round_trip() {
        for stage in Stage::ALL {
            let name = stage.file_name("patient_a");
            assert_eq!(
                Stage::parse_file_name(&name),
                Some(("patient_a".to_string(), stage))
            );
        }
        assert_eq!(Stage::parse_file_name("patient_a_other.txt"), None);
        assert_eq!(Stage::parse_file_name("_patient_summary.txt"), None);
    }

    #[test]
    fn test_save_artifact_writes_header() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path().join("results"));

        let path = store
            .save_artifact(
                "case",
                Stage::Specialist(Role::Cardiologist),
                "Sinus rhythm.",
            )
            .unwrap();

        assert!(path.ends_with("case_cardiologist_report.txt"));
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("--- Cardiologist Report ---\n\n"));
        assert_eq!(strip_header(&written), "Sinus rhythm.");
    }

    #[test]
    fn test_load_missing_document() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path());
        assert!(store.load_document(&dir.path().join("absent.txt")).is_err());
    }

    #[test]
    fn test_strip_header_without_header() {
        assert_eq!(strip_header("plain text\nmore"), "plain text\nmore");
    }
}

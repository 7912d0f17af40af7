//! Last-known-good result cache.
//!
//! One JSON file per document key under the cache directory. Entries are
//! only written for runs whose patient-facing output passed the error
//! check, and can be rebuilt from the text artifacts in the results
//! directory after a crash.

use super::{strip_header, Stage};
use crate::classify::ErrorClassifier;
use crate::models::{ResultPayload, Role};
use crate::pipeline::derived::{backfill_followup, parse_action_steps};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Model label recorded on entries rebuilt from artifacts.
const RECONCILED_MODEL: &str = "reconciled";

/// File-system backed store of full result payloads.
#[derive(Debug, Clone)]
pub struct ResultCache {
    cache_dir: PathBuf,
}

impl ResultCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Whether an entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entry_path(key).is_file()
    }

    /// Persist `payload` under `key`, replacing any previous entry.
    pub fn save(&self, key: &str, payload: &ResultPayload) -> Result<PathBuf> {
        fs::create_dir_all(&self.cache_dir).with_context(|| {
            format!(
                "Failed to create cache directory: {}",
                self.cache_dir.display()
            )
        })?;

        let path = self.entry_path(key);
        let json = serde_json::to_string_pretty(payload)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write cache entry: {}", path.display()))?;

        debug!("Cached result for '{}' at {}", key, path.display());
        Ok(path)
    }

    /// Load the entry for `key`.
    ///
    /// Returns `Ok(None)` if there is no entry, `Err` if it exists but can't be read.
    pub fn load(&self, key: &str) -> Result<Option<ResultPayload>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache entry: {}", path.display()))?;
        let payload = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cache entry: {}", path.display()))?;

        Ok(Some(payload))
    }

    /// Rebuild missing cache entries from artifacts in `results_dir`.
    ///
    /// Artifacts are grouped by document key. A group becomes an entry only
    /// if it has both a merged report and a patient summary that pass the
    /// classifier. Existing entries are left untouched. Returns the number
    /// of entries written.
    pub fn reconcile(&self, results_dir: &Path, classifier: &dyn ErrorClassifier) -> Result<usize> {
        let mut groups: BTreeMap<String, BTreeMap<Stage, PathBuf>> = BTreeMap::new();

        for entry in WalkDir::new(results_dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if let Some((key, stage)) = Stage::parse_file_name(&name) {
                groups
                    .entry(key)
                    .or_default()
                    .insert(stage, entry.path().to_path_buf());
            }
        }

        let mut written = 0;
        for (key, artifacts) in groups {
            if self.contains(&key) {
                debug!("Cache entry for '{}' already present", key);
                continue;
            }

            match rebuild_entry(&key, &artifacts, classifier) {
                Ok(Some(payload)) => {
                    self.save(&key, &payload)?;
                    info!("Rebuilt cache entry for '{}'", key);
                    written += 1;
                }
                Ok(None) => debug!("Artifacts for '{}' are incomplete or degraded", key),
                Err(e) => warn!("Skipping '{}': {:#}", key, e),
            }
        }

        Ok(written)
    }
}

fn read_artifact(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read artifact: {}", path.display()))?;
    Ok(strip_header(&content))
}

fn rebuild_entry(
    key: &str,
    artifacts: &BTreeMap<Stage, PathBuf>,
    classifier: &dyn ErrorClassifier,
) -> Result<Option<ResultPayload>> {
    let (Some(internal_path), Some(summary_path)) = (
        artifacts.get(&Stage::InternalReport),
        artifacts.get(&Stage::PatientSummary),
    ) else {
        return Ok(None);
    };

    let merged = read_artifact(internal_path)?;
    let summary = read_artifact(summary_path)?;
    if classifier.is_error_shaped(&merged) || classifier.is_error_shaped(&summary) {
        return Ok(None);
    }

    let mut steps = match artifacts.get(&Stage::ActionSteps) {
        Some(path) => parse_action_steps(&read_artifact(path)?),
        None => Default::default(),
    };
    backfill_followup(&mut steps, &summary);

    let specialist = |role: Role| -> Result<String> {
        match artifacts.get(&Stage::Specialist(role)) {
            Some(path) => read_artifact(path),
            None => Ok(String::new()),
        }
    };

    let generated_at: DateTime<Utc> = fs::metadata(summary_path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    Ok(Some(ResultPayload {
        document_key: key.to_string(),
        model: RECONCILED_MODEL.to_string(),
        generated_at,
        patient_summary_path: summary_path.clone(),
        internal_report_path: internal_path.clone(),
        merged_report_text: merged,
        patient_summary_text: summary,
        immediate_steps: steps.immediate,
        followup_steps: steps.followup,
        cardiology_text: specialist(Role::Cardiologist)?,
        psychology_text: specialist(Role::Psychologist)?,
        pulmonology_text: specialist(Role::Pulmonologist)?,
        structured: None,
    }))
}

//! Multi-agent analysis pipeline.
//!
//! document -> specialists (3 concurrent calls) -> synthesis -> derived views
//! -> cache write. Any stage whose output is error-shaped falls back to the
//! last cached result for the same document key.

pub mod derived;
pub mod prompts;
pub mod specialists;
pub mod structured;
pub mod synthesis;

use crate::classify::ErrorClassifier;
use crate::llm::ModelClient;
use crate::models::{ResultPayload, Role};
use crate::store::{document_key, ReportStore, ResultCache, Stage};
use anyhow::Result;
use chrono::Utc;
use derived::{backfill_followup, format_action_steps, DerivedViewsStage};
use specialists::{persist_reports, SpecialistRunner};
use std::path::Path;
use std::sync::Arc;
use structured::StructuredExtractor;
use synthesis::SynthesisStage;
use tracing::{error, info, warn};

/// Everything a pipeline run talks to, constructed by the caller.
#[derive(Clone)]
pub struct PipelineContext {
    pub client: ModelClient,
    pub store: ReportStore,
    pub cache: ResultCache,
    pub classifier: Arc<dyn ErrorClassifier>,
}

/// Tunables for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Temperature for specialist, synthesis and action-step calls.
    pub extraction_temperature: f32,
    /// Temperature for the patient summary.
    pub narrative_temperature: f32,
    /// Model for structured extraction; `None` disables the stage.
    pub structured_model: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            extraction_temperature: 0.2,
            narrative_temperature: 0.4,
            structured_model: None,
        }
    }
}

pub struct AnalysisPipeline {
    ctx: PipelineContext,
    specialists: SpecialistRunner,
    synthesis: SynthesisStage,
    derived: DerivedViewsStage,
    structured: Option<StructuredExtractor>,
}

impl AnalysisPipeline {
    pub fn new(ctx: PipelineContext, settings: PipelineSettings) -> Self {
        let client = ctx.client.clone();
        Self {
            specialists: SpecialistRunner::new(client.clone(), settings.extraction_temperature),
            synthesis: SynthesisStage::new(client.clone(), settings.extraction_temperature),
            derived: DerivedViewsStage::new(
                client.clone(),
                settings.narrative_temperature,
                settings.extraction_temperature,
            ),
            structured: settings
                .structured_model
                .map(|model| StructuredExtractor::new(client, model)),
            ctx,
        }
    }

    /// Run the full pipeline for one document.
    ///
    /// Returns `None` only when no fresh result could be produced and no
    /// usable cached result exists (or the document could not be read).
    pub async fn run(&self, document_path: &Path) -> Option<ResultPayload> {
        match self.execute(document_path).await {
            Ok(result) => result,
            Err(e) => {
                error!("Pipeline failed: {:#}", e);
                None
            }
        }
    }

    async fn execute(&self, document_path: &Path) -> Result<Option<ResultPayload>> {
        let classifier = self.ctx.classifier.as_ref();

        let document = match self.ctx.store.load_document(document_path) {
            Ok(document) => document,
            Err(e) => {
                warn!("{:#}", e);
                return Ok(None);
            }
        };
        let key = document_key(document_path);
        info!("Analyzing '{}' ({} chars)", key, document.len());

        // Step 1: specialists
        let reports = self.specialists.run(&document).await;
        persist_reports(&self.ctx.store, &key, &reports, classifier);

        let failed = reports.failed_roles(classifier);
        if !failed.is_empty() {
            warn!("Specialist reports failed: {:?}", failed);
            if let Some(cached) = self.cached_result(&key) {
                info!("Serving cached result for '{}'", key);
                return Ok(Some(cached));
            }
            info!("No usable cached result; continuing with degraded synthesis");
        }

        // Step 2: synthesis
        let merged = self.synthesis.synthesize(&reports).await.into_text();
        if classifier.is_error_shaped(&merged) {
            warn!("Synthesis output is error-shaped");
            return Ok(self.cached_result(&key));
        }
        let internal_report_path =
            self.ctx
                .store
                .save_artifact(&key, Stage::InternalReport, &merged)?;

        // Step 3: derived views
        let summary = self.derived.patient_summary(&merged).await.into_text();
        let mut steps = self.derived.action_steps(&merged).await;
        backfill_followup(&mut steps, &summary);

        let summary_usable = !classifier.is_error_shaped(&summary);
        if !summary_usable {
            warn!("Patient summary is error-shaped");
            if let Some(cached) = self.cached_result(&key) {
                info!("Serving cached result for '{}'", key);
                return Ok(Some(cached));
            }
        }

        let patient_summary_path =
            self.ctx
                .store
                .save_artifact(&key, Stage::PatientSummary, &summary)?;
        if let Err(e) =
            self.ctx
                .store
                .save_artifact(&key, Stage::ActionSteps, &format_action_steps(&steps))
        {
            warn!("Could not save action steps: {:#}", e);
        }

        // Step 4: optional structured extraction
        let structured = match self.structured {
            Some(ref extractor) => extractor.extract(&merged, &reports).await,
            None => None,
        };
        if let Some(ref report) = structured {
            let saved = serde_json::to_string_pretty(report)
                .map_err(anyhow::Error::from)
                .and_then(|json| {
                    self.ctx
                        .store
                        .save_raw(&format!("{}_structured.json", key), &json)
                });
            if let Err(e) = saved {
                warn!("Could not save structured report: {:#}", e);
            }
        }

        let text = |role: Role| reports.get(role).clone().into_text();
        let payload = ResultPayload {
            document_key: key.clone(),
            model: self.ctx.client.model().to_string(),
            generated_at: Utc::now(),
            patient_summary_path,
            internal_report_path,
            merged_report_text: merged,
            patient_summary_text: summary,
            immediate_steps: steps.immediate,
            followup_steps: steps.followup,
            cardiology_text: text(Role::Cardiologist),
            psychology_text: text(Role::Psychologist),
            pulmonology_text: text(Role::Pulmonologist),
            structured,
        };

        // Step 5: cache only fully successful results
        if summary_usable && failed.is_empty() {
            if let Err(e) = self.ctx.cache.save(&key, &payload) {
                warn!("Could not cache result: {:#}", e);
            }
        } else {
            warn!("Not caching degraded result for '{}'", key);
        }

        Ok(Some(payload))
    }

    /// A cached payload for `key` whose texts pass the classifier.
    fn cached_result(&self, key: &str) -> Option<ResultPayload> {
        let classifier = self.ctx.classifier.as_ref();
        match self.ctx.cache.load(key) {
            Ok(Some(payload))
                if !classifier.is_error_shaped(&payload.patient_summary_text)
                    && !classifier.is_error_shaped(&payload.merged_report_text) =>
            {
                Some(payload)
            }
            Ok(Some(_)) => {
                warn!("Cached result for '{}' is degraded; ignoring it", key);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Cache lookup failed: {:#}", e);
                None
            }
        }
    }
}

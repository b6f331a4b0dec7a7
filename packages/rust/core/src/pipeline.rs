//! End-to-end run: config → request → gateway → extract → validate.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use harvest_gateway::LlmGateway;
use harvest_shared::{HeritageSite, Result};

use crate::extract::{Candidate, extract_candidate};
use crate::request::{RequestConfig, build_request};
use crate::validate::{ValidationOptions, ValidationReport, validate_candidate};

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Prompt and model settings.
    pub request: RequestConfig,
    /// Schema enforced on the answer.
    pub validation: ValidationOptions,
}

/// Candidate and validation report for one raw answer.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub candidate: Candidate,
    pub report: ValidationReport,
}

impl Extraction {
    /// Validated records, possibly empty.
    pub fn sites(&self) -> &[HeritageSite] {
        &self.report.sites
    }
}

/// Result of a run that reached the model.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The model's literal answer.
    pub raw_text: String,
    /// What the extractor and validator made of it.
    pub extraction: Extraction,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn sites(&self) -> &[HeritageSite] {
        self.extraction.sites()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new stage.
    fn phase(&self, name: &str);
    /// Called when the run completes.
    fn done(&self, outcome: &RunOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _outcome: &RunOutcome) {}
}

/// Extract and validate a raw answer. Never fails.
pub fn process_raw_text(raw: &str, opts: &ValidationOptions) -> Extraction {
    let candidate = extract_candidate(raw);
    if !candidate.span_found {
        debug!("no bracket span found, validating whole text");
    }
    debug!(candidate = %candidate.text, "extracted candidate");

    let report = validate_candidate(&candidate.text, opts);
    Extraction { candidate, report }
}

/// Run the full pipeline.
///
/// 1. Build the request
/// 2. Send it through the gateway (the only stage that can fail)
/// 3. Extract the candidate span
/// 4. Validate records
#[instrument(skip_all, fields(subject = config.request.subject.as_deref().unwrap_or("-"), model = %config.request.model))]
pub async fn run(
    config: &RunConfig,
    gateway: &dyn LlmGateway,
    progress: &dyn ProgressReporter,
) -> Result<RunOutcome> {
    let start = Instant::now();

    progress.phase("Building request");
    let request = build_request(&config.request);

    progress.phase("Waiting for model answer");
    let raw_text = gateway.send(&request).await?;
    debug!(raw = %raw_text, "raw answer");

    progress.phase("Extracting records");
    let extraction = process_raw_text(&raw_text, &config.validation);

    let outcome = RunOutcome {
        raw_text,
        extraction,
        elapsed: start.elapsed(),
    };

    info!(
        accepted = outcome.sites().len(),
        rejected = outcome.extraction.report.rejections.len(),
        parse_failed = outcome.extraction.report.parse_error.is_some(),
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "run complete"
    );

    progress.done(&outcome);
    Ok(outcome)
}

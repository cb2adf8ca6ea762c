//! Comprehensive analysis worker: extract technology signals from free-text
//! research notes via the AI adapter, score them through the tech-risk
//! profile, and persist the outcome on the job record. One pass, no retry;
//! a failed job is retriggered by posting a new analysis.

use tracing::{info, warn};

use crate::ai::DynExtractor;
use crate::engine;
use crate::jobs::{CancelToken, JobStore};
use crate::profile::ProfileHandle;
use std::sync::Arc;

/// Profile the comprehensive flow scores against.
pub const ANALYSIS_PROFILE: &str = "tech_risk";

pub async fn run_analysis(
    jobs: Arc<JobStore>,
    profiles: ProfileHandle,
    extractor: DynExtractor,
    job_id: String,
    notes: String,
    token: CancelToken,
) {
    // First checkpoint: a job cancelled before the worker ran never starts.
    if !jobs.mark_analyzing(&job_id) {
        return;
    }

    let Some(profile) = profiles.profile(ANALYSIS_PROFILE) else {
        jobs.fail(&job_id, "scoring profile 'tech_risk' is not configured");
        return;
    };
    let factor_names: Vec<String> = profile.factor_names().map(str::to_string).collect();

    let extraction = match extractor.extract(&notes, &factor_names).await {
        Ok(e) => e,
        Err(err) => {
            warn!(job = %job_id, provider = extractor.provider_name(), error = %err, "signal extraction failed");
            jobs.fail(&job_id, &err.to_string());
            metrics::counter!("dealscope_analyses_total", "outcome" => "failed").increment(1);
            return;
        }
    };

    // Second checkpoint: cancellation during the provider call already marked
    // the record failed; drop the work.
    if token.is_cancelled() {
        return;
    }

    match engine::score_with_profile(&profile, &extraction.signals, None) {
        Ok(report) => {
            info!(job = %job_id, score = report.score, band = %report.band, "analysis completed");
            jobs.complete(&job_id, report);
            metrics::counter!("dealscope_analyses_total", "outcome" => "completed").increment(1);
        }
        Err(err) => {
            jobs.fail(&job_id, &err.to_string());
            metrics::counter!("dealscope_analyses_total", "outcome" => "failed").increment(1);
        }
    }
}

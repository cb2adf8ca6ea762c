//! HTTP surface: scoring endpoints, the analysis job lifecycle, debug views,
//! and admin reload. Handlers stay thin: authenticate, validate, call the
//! pure engine, serialize.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::ai::DynExtractor;
use crate::analysis;
use crate::config::AppConfig;
use crate::engine;
use crate::error::ApiError;
use crate::history::{anon_ref, History};
use crate::jobs::{CancelError, JobRecord, JobStatus, JobStore};
use crate::metrics::record_score;
use crate::profile::{ProfileHandle, ProfileSet};

#[derive(Clone)]
pub struct AppState {
    pub profiles: ProfileHandle,
    pub history: Arc<History>,
    pub jobs: Arc<JobStore>,
    pub extractor: DynExtractor,
    pub api_key: Option<String>,
}

impl AppState {
    /// Wire up state from config: profiles from disk (seed fallback), the AI
    /// extractor from its own config file.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let set = ProfileSet::load_or_seed(&config.profiles_path)?;
        let profiles = ProfileHandle::new(set, config.profiles_path.clone());
        let ai_cfg = crate::config::ai::AiConfig::load_or_default(&config.ai_config_path);
        Ok(Self {
            profiles,
            history: Arc::new(History::with_capacity(2000)),
            jobs: Arc::new(JobStore::new()),
            extractor: crate::ai::build_extractor(&ai_cfg),
            api_key: config.api_key.clone(),
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/score/{profile}", post(score))
        .route("/analyses", post(start_analysis))
        .route("/analyses/preview", post(preview_analysis))
        .route("/analyses/{id}", get(get_analysis))
        .route("/analyses/{id}/cancel", post(cancel_analysis))
        .route("/debug/profile", get(debug_profile))
        .route("/debug/history", get(debug_history))
        .route("/debug/last-score", get(debug_last_score))
        .route("/admin/reload-profiles", get(admin_reload_profiles))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// API-key gate. Unset key = open instance (local dev); set key = every
/// mutating or admin request must present it in `x-api-key`.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = &state.api_key else {
        return Ok(());
    };
    let presented = headers
        .get("x-api-key")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    if presented == expected {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

// ------------------------------------------------------------
// Scoring
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub factors: BTreeMap<String, f64>,
    /// Per-request weight overrides; negative values clamp to zero.
    #[serde(default)]
    pub weights: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub success: bool,
    pub profile: String,
    pub score: f64,
    pub band: String,
    pub factors: BTreeMap<String, f64>,
    pub recommendations: Vec<String>,
    pub calculated_at: DateTime<Utc>,
}

async fn score(
    State(state): State<AppState>,
    Path(profile_name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, ApiError> {
    authorize(&state, &headers)?;

    if body.factors.is_empty() {
        return Err(ApiError::Validation(
            "factors must contain at least one entry".to_string(),
        ));
    }

    let profile = state
        .profiles
        .profile(&profile_name)
        .ok_or_else(|| ApiError::NotFound(format!("profile '{profile_name}'")))?;

    let report = engine::score_with_profile(&profile, &body.factors, body.weights.as_ref())?;

    state.history.push(&report, body.company_id.as_deref());
    record_score(&profile_name);
    let company_ref = body.company_id.as_deref().map(anon_ref).unwrap_or_default();
    info!(
        profile = %profile_name,
        company = %company_ref,
        score = report.score,
        band = %report.band,
        "score computed"
    );

    Ok(Json(ScoreResponse {
        success: true,
        profile: report.profile,
        score: report.score,
        band: report.band,
        factors: report.factors,
        recommendations: report.recommendations,
        calculated_at: report.calculated_at,
    }))
}

// ------------------------------------------------------------
// Analysis jobs
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub company_id: String,
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisAccepted {
    pub success: bool,
    pub analysis_id: String,
    pub status: JobStatus,
}

async fn start_analysis(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AnalysisRequest>,
) -> Result<(StatusCode, Json<AnalysisAccepted>), ApiError> {
    authorize(&state, &headers)?;

    if body.company_id.trim().is_empty() {
        return Err(ApiError::Validation("company_id must not be empty".to_string()));
    }
    if body.notes.trim().is_empty() {
        return Err(ApiError::Validation("notes must not be empty".to_string()));
    }

    let (record, token) = state.jobs.create(&body.company_id);
    info!(job = %record.id, company = %anon_ref(&body.company_id), "analysis queued");

    tokio::spawn(analysis::run_analysis(
        state.jobs.clone(),
        state.profiles.clone(),
        state.extractor.clone(),
        record.id.clone(),
        body.notes,
        token,
    ));

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalysisAccepted {
            success: true,
            analysis_id: record.id,
            status: record.status,
        }),
    ))
}

/// Synchronous variant of the comprehensive flow: extract and score inline,
/// translating provider failures straight to 429/503. No job record.
async fn preview_analysis(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AnalysisRequest>,
) -> Result<Json<ScoreResponse>, ApiError> {
    authorize(&state, &headers)?;

    if body.company_id.trim().is_empty() {
        return Err(ApiError::Validation("company_id must not be empty".to_string()));
    }
    if body.notes.trim().is_empty() {
        return Err(ApiError::Validation("notes must not be empty".to_string()));
    }

    let profile = state
        .profiles
        .profile(analysis::ANALYSIS_PROFILE)
        .ok_or_else(|| ApiError::NotFound(format!("profile '{}'", analysis::ANALYSIS_PROFILE)))?;
    let factor_names: Vec<String> = profile.factor_names().map(str::to_string).collect();

    let extraction = state.extractor.extract(&body.notes, &factor_names).await?;
    let report = engine::score_with_profile(&profile, &extraction.signals, None)?;

    state.history.push(&report, Some(&body.company_id));
    record_score(analysis::ANALYSIS_PROFILE);

    Ok(Json(ScoreResponse {
        success: true,
        profile: report.profile,
        score: report.score,
        band: report.band,
        factors: report.factors,
        recommendations: report.recommendations,
        calculated_at: report.calculated_at,
    }))
}

#[derive(Debug, Serialize)]
pub struct AnalysisView {
    pub success: bool,
    #[serde(flatten)]
    pub record: JobRecord,
}

async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AnalysisView>, ApiError> {
    authorize(&state, &headers)?;
    let record = state
        .jobs
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("analysis '{id}'")))?;
    Ok(Json(AnalysisView {
        success: true,
        record,
    }))
}

async fn cancel_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AnalysisView>, ApiError> {
    authorize(&state, &headers)?;
    match state.jobs.cancel(&id) {
        Ok(record) => Ok(Json(AnalysisView {
            success: true,
            record,
        })),
        Err(CancelError::NotFound) => Err(ApiError::NotFound(format!("analysis '{id}'"))),
        Err(CancelError::AlreadyFinished(status)) => Err(ApiError::Conflict(format!(
            "analysis already finished ({status:?})"
        ))),
    }
}

// ------------------------------------------------------------
// Debug & admin
// ------------------------------------------------------------

async fn debug_profile(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    match q.get("name") {
        Some(name) => {
            let profile = state
                .profiles
                .profile(name)
                .ok_or_else(|| ApiError::NotFound(format!("profile '{name}'")))?;
            Ok(Json(json!({ "profile": profile })))
        }
        None => Ok(Json(json!({ "profiles": state.profiles.names() }))),
    }
}

async fn debug_history(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "entries": state.history.snapshot_last_n(10) }))
}

async fn debug_last_score(State(state): State<AppState>) -> Json<Value> {
    let last = state.history.snapshot_last_n(1).pop();
    Json(json!({ "last": last }))
}

async fn admin_reload_profiles(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<String, ApiError> {
    authorize(&state, &headers)?;
    let n = state.profiles.reload()?;
    metrics::gauge!("dealscope_profiles_loaded").set(n as f64);
    Ok(format!("reloaded ({n} profiles)"))
}

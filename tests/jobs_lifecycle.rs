// tests/jobs_lifecycle.rs
//
// End-to-end lifecycle of background analyses through the HTTP surface:
// pending → analyzing → completed, cancellation, and the conflict on
// cancelling a finished job.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _;

use dealscope::ai::{DailyLimit, DisabledExtractor, Extraction, ExtractorError, MockExtractor, SignalExtractor};
use dealscope::api::{create_router, AppState};
use dealscope::history::History;
use dealscope::jobs::JobStore;
use dealscope::profile::{ProfileHandle, ProfileSet};

/// Extractor that stalls long enough for a cancel to land first.
struct SlowExtractor;

#[async_trait]
impl SignalExtractor for SlowExtractor {
    async fn extract(
        &self,
        notes: &str,
        factors: &[String],
    ) -> Result<Extraction, ExtractorError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        MockExtractor.extract(notes, factors).await
    }

    fn provider_name(&self) -> &'static str {
        "slow-mock"
    }
}

fn test_router(extractor: Arc<dyn SignalExtractor>) -> Router {
    create_router(AppState {
        profiles: ProfileHandle::new(
            ProfileSet::default_seed(),
            PathBuf::from("config/profiles.toml"),
        ),
        history: Arc::new(History::with_capacity(100)),
        jobs: Arc::new(JobStore::new()),
        extractor,
        api_key: None,
    })
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), 256 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn start_analysis(app: &Router) -> String {
    let payload = json!({
        "company_id": "acme-corp",
        "notes": "Monolith on an EOL runtime; shared admin credentials; single rack."
    });
    let req = Request::builder()
        .method("POST")
        .uri("/analyses")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let v = read_json(resp).await;
    assert_eq!(v["status"], json!("pending"));
    v["analysis_id"].as_str().unwrap().to_string()
}

async fn get_analysis(app: &Router, id: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(format!("/analyses/{id}"))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    (status, read_json(resp).await)
}

async fn cancel(app: &Router, id: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("POST")
        .uri(format!("/analyses/{id}/cancel"))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    (status, read_json(resp).await)
}

/// Poll until the job reaches a terminal status (completed/failed).
async fn wait_terminal(app: &Router, id: &str) -> Json {
    for _ in 0..100 {
        let (status, v) = get_analysis(app, id).await;
        assert_eq!(status, StatusCode::OK);
        let s = v["status"].as_str().unwrap();
        if s == "completed" || s == "failed" {
            return v;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("analysis {id} never reached a terminal status");
}

#[tokio::test]
async fn analysis_completes_and_carries_a_tech_risk_report() {
    let app = test_router(Arc::new(MockExtractor));
    let id = start_analysis(&app).await;

    let v = wait_terminal(&app, &id).await;
    assert_eq!(v["status"], json!("completed"));
    let result = &v["result"];
    assert_eq!(result["profile"], json!("tech_risk"));
    let score = result["score"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&score));
    assert!(result["band"].is_string());
}

#[tokio::test]
async fn analysis_can_be_cancelled_while_running() {
    let app = test_router(Arc::new(SlowExtractor));
    let id = start_analysis(&app).await;

    // Give the worker a moment to pick the job up, then cancel mid-extract.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let (status, v) = cancel(&app, &id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], json!("failed"));
    assert_eq!(v["error"], json!("cancelled by caller"));

    // The record stays failed and never grows a result.
    let (_, v) = get_analysis(&app, &id).await;
    assert_eq!(v["status"], json!("failed"));
    assert!(v.get("result").is_none() || v["result"].is_null());
}

#[tokio::test]
async fn cancelling_a_finished_analysis_is_a_conflict() {
    let app = test_router(Arc::new(MockExtractor));
    let id = start_analysis(&app).await;
    wait_terminal(&app, &id).await;

    let (status, v) = cancel(&app, &id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(v["kind"], json!("conflict"));
}

#[tokio::test]
async fn unknown_analysis_id_is_404() {
    let app = test_router(Arc::new(MockExtractor));
    let (status, v) = get_analysis(&app, "deadbeefdeadbeef").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["kind"], json!("not_found"));
}

fn preview_request() -> Request<Body> {
    let payload = json!({
        "company_id": "acme-corp",
        "notes": "Self-hosted monolith, no CI, one sysadmin."
    });
    Request::builder()
        .method("POST")
        .uri("/analyses/preview")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn preview_scores_inline() {
    let app = test_router(Arc::new(MockExtractor));
    let resp = app.oneshot(preview_request()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["success"], json!(true));
    assert_eq!(v["profile"], json!("tech_risk"));
    assert!(v["band"].is_string());
}

#[tokio::test]
async fn preview_rejects_empty_company_id() {
    let app = test_router(Arc::new(MockExtractor));
    let payload = json!({ "company_id": "  ", "notes": "legacy stack" });
    let req = Request::builder()
        .method("POST")
        .uri("/analyses/preview")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = read_json(resp).await;
    assert!(v["error"].as_str().unwrap().contains("company_id"));
}

#[tokio::test]
async fn preview_translates_disabled_provider_to_503() {
    let app = test_router(Arc::new(DisabledExtractor));
    let resp = app.oneshot(preview_request()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let v = read_json(resp).await;
    assert_eq!(v["kind"], json!("upstream"));
}

#[tokio::test]
async fn preview_translates_exhausted_budget_to_429() {
    // A zero daily budget rate-limits the very first call.
    let app = test_router(Arc::new(DailyLimit::new(MockExtractor, 0)));
    let resp = app.oneshot(preview_request()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let v = read_json(resp).await;
    assert_eq!(v["kind"], json!("rate_limited"));
}

#[tokio::test]
async fn empty_notes_are_rejected_at_the_boundary() {
    let app = test_router(Arc::new(MockExtractor));
    let payload = json!({ "company_id": "acme-corp", "notes": "  " });
    let req = Request::builder()
        .method("POST")
        .uri("/analyses")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

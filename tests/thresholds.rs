// tests/thresholds.rs
//
// Boundary tests for band assignment via the public /score endpoints.
// Uniform factor values make the composite equal to the value regardless of
// the weight split, so these drive the classifier to exact boundaries.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _;

use dealscope::ai::MockExtractor;
use dealscope::api::{create_router, AppState};
use dealscope::history::History;
use dealscope::jobs::JobStore;
use dealscope::profile::{ProfileHandle, ProfileSet};

fn test_router() -> Router {
    create_router(AppState {
        profiles: ProfileHandle::new(
            ProfileSet::default_seed(),
            PathBuf::from("config/profiles.toml"),
        ),
        history: Arc::new(History::with_capacity(100)),
        jobs: Arc::new(JobStore::new()),
        extractor: Arc::new(MockExtractor),
        api_key: None,
    })
}

async fn score_ma(value: f64) -> (f64, String) {
    let payload = json!({
        "factors": {
            "financial": value,
            "strategic": value,
            "operational": value,
            "market": value,
            "risk": value
        }
    });
    let req = Request::builder()
        .method("POST")
        .uri("/score/ma_likelihood")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let resp = test_router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 256 * 1024).await.unwrap();
    let v: Json = serde_json::from_slice(&bytes).unwrap();
    (
        v["score"].as_f64().unwrap(),
        v["band"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn ma_boundary_76_belongs_to_very_high() {
    let (score, band) = score_ma(76.0).await;
    assert!((score - 76.0).abs() < 1e-9);
    assert_eq!(band, "Very High");
}

#[tokio::test]
async fn ma_just_below_76_is_high() {
    let (score, band) = score_ma(75.9).await;
    assert!((score - 75.9).abs() < 1e-9);
    assert_eq!(band, "High");
}

#[tokio::test]
async fn ma_boundary_51_belongs_to_high() {
    let (_, band) = score_ma(51.0).await;
    assert_eq!(band, "High");
}

#[tokio::test]
async fn ma_25_is_low() {
    let (_, band) = score_ma(25.0).await;
    assert_eq!(band, "Low");
}

#[tokio::test]
async fn ma_26_is_medium() {
    let (_, band) = score_ma(26.0).await;
    assert_eq!(band, "Medium");
}

#[tokio::test]
async fn bands_never_regress_as_score_climbs() {
    // Severity ordering for the M&A table, floor first.
    let order = ["Low", "Medium", "High", "Very High"];
    let rank = |band: &str| order.iter().position(|b| *b == band).unwrap();

    let mut prev = 0usize;
    for v in [0.0, 10.0, 25.0, 26.0, 40.0, 51.0, 60.0, 76.0, 90.0, 100.0] {
        let (_, band) = score_ma(v).await;
        let r = rank(&band);
        assert!(r >= prev, "band regressed at score {v}: {band}");
        prev = r;
    }
}

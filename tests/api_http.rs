// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /score/{profile} (happy path, validation, auth, 404)
// - GET /debug/profile

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use dealscope::ai::MockExtractor;
use dealscope::api::{create_router, AppState};
use dealscope::history::History;
use dealscope::jobs::JobStore;
use dealscope::profile::{ProfileHandle, ProfileSet};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn test_state(api_key: Option<&str>) -> AppState {
    AppState {
        profiles: ProfileHandle::new(
            ProfileSet::default_seed(),
            PathBuf::from("config/profiles.toml"),
        ),
        history: Arc::new(History::with_capacity(100)),
        jobs: Arc::new(JobStore::new()),
        extractor: Arc::new(MockExtractor),
        api_key: api_key.map(str::to_string),
    }
}

fn test_router() -> Router {
    create_router(test_state(None))
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json body")
}

fn post_json(uri: &str, payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build request")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router();

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "ok");
}

#[tokio::test]
async fn api_score_bant_documented_example() {
    let app = test_router();

    let payload = json!({
        "company_id": "acme-corp",
        "factors": { "budget": 80, "authority": 60, "need": 90, "timeline": 40 }
    });
    let resp = app
        .oneshot(post_json("/score/bant", &payload))
        .await
        .expect("oneshot /score/bant");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    assert_eq!(v["success"], json!(true));
    assert_eq!(v["profile"], json!("bant"));
    let score = v["score"].as_f64().expect("score");
    assert!((score - 67.5).abs() < 1e-9, "expected 67.5, got {score}");
    assert_eq!(v["band"], json!("Promising"));
    assert!(v["recommendations"].is_array());
    assert!(v["calculated_at"].is_string());
    // timeline sits below 50, so its next-action shows up
    let recs = v["recommendations"].as_array().unwrap();
    assert!(recs.iter().any(|r| r.as_str().unwrap().contains("timeline")));
}

#[tokio::test]
async fn api_score_unknown_factor_is_400_with_suggestion() {
    let app = test_router();

    let payload = json!({ "factors": { "budgett": 50 } });
    let resp = app
        .oneshot(post_json("/score/bant", &payload))
        .await
        .expect("oneshot");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let v = read_json(resp).await;
    assert_eq!(v["success"], json!(false));
    assert_eq!(v["kind"], json!("validation"));
    assert!(v["error"].as_str().unwrap().contains("did you mean 'budget'"));
}

#[tokio::test]
async fn api_score_empty_factors_is_400() {
    let app = test_router();

    let payload = json!({ "factors": {} });
    let resp = app
        .oneshot(post_json("/score/bant", &payload))
        .await
        .expect("oneshot");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_score_unknown_profile_is_404() {
    let app = test_router();

    let payload = json!({ "factors": { "budget": 50 } });
    let resp = app
        .oneshot(post_json("/score/nope", &payload))
        .await
        .expect("oneshot");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let v = read_json(resp).await;
    assert_eq!(v["kind"], json!("not_found"));
}

#[tokio::test]
async fn api_score_requires_api_key_when_configured() {
    let payload = json!({ "factors": { "budget": 50 } });

    // Missing key → 401
    let app = create_router(test_state(Some("sekrit")));
    let resp = app
        .oneshot(post_json("/score/bant", &payload))
        .await
        .expect("oneshot");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Correct key → 200
    let app = create_router(test_state(Some("sekrit")));
    let req = Request::builder()
        .method("POST")
        .uri("/score/bant")
        .header("content-type", "application/json")
        .header("x-api-key", "sekrit")
        .body(Body::from(payload.to_string()))
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_weight_overrides_change_the_score() {
    let app = test_router();

    let payload = json!({
        "factors": { "budget": 100, "authority": 0, "need": 0, "timeline": 0 },
        "weights": { "budget": 3.0 }
    });
    let resp = app
        .oneshot(post_json("/score/bant", &payload))
        .await
        .expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    // (100*3) / (3+1+1+1) = 50
    assert!((v["score"].as_f64().unwrap() - 50.0).abs() < 1e-9);
}

#[tokio::test]
async fn api_all_zero_weight_overrides_is_400_with_detail() {
    let app = test_router();

    let payload = json!({
        "factors": { "budget": 80, "authority": 60, "need": 90, "timeline": 40 },
        "weights": { "budget": 0, "authority": 0, "need": 0, "timeline": 0 }
    });
    let resp = app
        .oneshot(post_json("/score/bant", &payload))
        .await
        .expect("oneshot");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let v = read_json(resp).await;
    assert_eq!(v["kind"], json!("validation"));
    assert!(v["error"].as_str().unwrap().contains("total weight is zero"));
}

#[tokio::test]
async fn api_debug_profile_lists_the_call_sites() {
    let app = test_router();

    let req = Request::builder()
        .method("GET")
        .uri("/debug/profile")
        .body(Body::empty())
        .expect("build GET /debug/profile");
    let resp = app.oneshot(req).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    let names: Vec<&str> = v["profiles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n.as_str().unwrap())
        .collect();
    for expected in ["bant", "tech_risk", "ma_likelihood"] {
        assert!(names.contains(&expected), "missing profile {expected}");
    }
}

#[tokio::test]
async fn api_history_records_recent_scores() {
    let state = test_state(None);
    let app = create_router(state);

    let payload = json!({
        "company_id": "acme-corp",
        "factors": { "budget": 80, "authority": 60, "need": 90, "timeline": 40 }
    });
    let resp = app
        .clone()
        .oneshot(post_json("/score/bant", &payload))
        .await
        .expect("oneshot score");
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder()
        .method("GET")
        .uri("/debug/last-score")
        .body(Body::empty())
        .expect("build GET /debug/last-score");
    let resp = app.oneshot(req).await.expect("oneshot last-score");
    let v = read_json(resp).await;
    let last = &v["last"];
    assert_eq!(last["profile"], json!("bant"));
    assert!((last["score"].as_f64().unwrap() - 67.5).abs() < 1e-9);
    // company id is stored hashed, never raw
    assert_ne!(last["company_ref"], json!("acme-corp"));
}

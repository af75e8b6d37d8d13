// =============================================================================
// REST API Endpoints — Axum 0.8
// =============================================================================
//
// All endpoints live under `/api/v1/`. Reads are public; the dashboard shows
// nothing secret. Changing the classification thresholds requires a valid
// Bearer token checked via the `AuthBearer` extractor.
//
// CORS is configured permissively; the dashboard is usually opened from a
// separate static origin.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::regime::RegimeThresholds;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/regime", get(regime))
        .route("/api/v1/history", get(history))
        // ── Thresholds (POST authenticated) ─────────────────────────
        .route("/api/v1/thresholds", get(get_thresholds).post(set_thresholds))
        // ── WebSocket ───────────────────────────────────────────────
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ──────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    phase: crate::types::CyclePhase,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        phase: state.phase(),
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Dashboard reads
// =============================================================================

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

async fn regime(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.current_view() {
        Some(view) => Json(view).into_response(),
        None => Json(serde_json::json!({
            "regime": null,
            "message": "No regime data available yet",
        }))
        .into_response(),
    }
}

async fn history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.chart())
}

// =============================================================================
// Thresholds
// =============================================================================

async fn get_thresholds(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.thresholds())
}

#[derive(Deserialize)]
struct ThresholdUpdate {
    #[serde(default)]
    bull_threshold: Option<f64>,
    #[serde(default)]
    volatility_threshold: Option<f64>,
}

async fn set_thresholds(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(update): Json<ThresholdUpdate>,
) -> impl IntoResponse {
    let current = state.thresholds();
    let requested = RegimeThresholds {
        bull_threshold: update.bull_threshold.unwrap_or(current.bull_threshold),
        volatility_threshold: update
            .volatility_threshold
            .unwrap_or(current.volatility_threshold),
    };

    let previous = match state.update_thresholds(requested) {
        Ok(previous) => previous,
        Err(e) => {
            warn!(error = %e, "Rejected threshold update");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    // Persisting is best-effort: the new values are already live.
    let config = state.runtime_config.read().clone();
    let saved = match config.save(&state.config_path) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Failed to persist threshold update");
            false
        }
    };

    info!(
        old_bull = previous.bull_threshold,
        new_bull = requested.bull_threshold,
        old_vol = previous.volatility_threshold,
        new_vol = requested.volatility_threshold,
        saved,
        "Thresholds changed via API"
    );

    Json(serde_json::json!({
        "status": "ok",
        "previous": previous,
        "thresholds": requested,
        "saved": saved,
    }))
    .into_response()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::tests::test_state;
    use crate::app_state::DisplaySurface;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn call(state: Arc<AppState>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = router(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 1 << 20).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    fn post_thresholds(token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::post("/api/v1/thresholds")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let state = Arc::new(test_state(10));
        let (status, body) = call(state, Request::get("/api/v1/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["phase"], "FETCHING");
    }

    #[tokio::test]
    async fn regime_before_first_cycle_is_null() {
        let state = Arc::new(test_state(10));
        let (status, body) = call(state, Request::get("/api/v1/regime").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["regime"].is_null());
    }

    #[tokio::test]
    async fn state_carries_errors_and_thresholds() {
        let state = Arc::new(test_state(10));
        state.report_error("boom".into(), Some("DATA_UNAVAILABLE".into()));
        let (_, body) = call(state, Request::get("/api/v1/state").body(Body::empty()).unwrap()).await;
        assert_eq!(body["recent_errors"][0]["code"], "DATA_UNAVAILABLE");
        assert_eq!(body["thresholds"]["bull_threshold"], 1.05);
        assert_eq!(body["instrument"], "NIFTYBEES.NS");
    }

    #[tokio::test]
    async fn threshold_update_requires_token() {
        let state = Arc::new(test_state(10));
        let (status, _) = call(state.clone(), post_thresholds(None, r#"{"bull_threshold":1.07}"#)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(state.clone(), post_thresholds(Some("wrong"), r#"{"bull_threshold":1.07}"#)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(state.thresholds(), RegimeThresholds::default());
    }

    #[tokio::test]
    async fn threshold_update_rejects_out_of_range() {
        let state = Arc::new(test_state(10));
        let (status, body) = call(
            state.clone(),
            post_thresholds(Some("admin-secret"), r#"{"volatility_threshold":0.2}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert_eq!(state.thresholds(), RegimeThresholds::default());
    }

    #[tokio::test]
    async fn threshold_update_applies_partial_body() {
        let state = Arc::new(test_state(10));
        let (status, body) = call(
            state.clone(),
            post_thresholds(Some("admin-secret"), r#"{"bull_threshold":1.08}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["thresholds"]["bull_threshold"], 1.08);
        assert_eq!(body["previous"]["bull_threshold"], 1.05);

        let t = state.thresholds();
        assert!((t.bull_threshold - 1.08).abs() < f64::EPSILON);
        assert!((t.volatility_threshold - 0.03).abs() < f64::EPSILON);
    }
}

//! HTTP surface. Grounded on the teacher's `factory::server`/`factory::api`
//! router shape and the streaming pattern in
//! `dashflow-langserve::handler::stream_handler`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::adapters::DiscoveryStore;
use crate::errors::{ApiError, EngineError};
use crate::orchestrator::Orchestrator;
use crate::state::{DiscoveryState, Mode};

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn DiscoveryStore>,
}

pub type SharedState = Arc<AppState>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::SessionAlreadyRunning(_)) => StatusCode::CONFLICT,
            ApiError::Engine(EngineError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Engine(_) | ApiError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Deserialize)]
pub struct DiscoveryRequest {
    pub query: String,
    #[serde(default)]
    pub disciplines: Option<Vec<String>>,
    #[serde(default)]
    pub mode: Option<Mode>,
}

impl DiscoveryRequest {
    fn into_state(self) -> Result<DiscoveryState, ApiError> {
        if self.query.trim().is_empty() {
            return Err(ApiError::BadRequest("query must not be empty".to_string()));
        }
        let disciplines = self.disciplines.unwrap_or_else(|| {
            crate::state::DEFAULT_DISCIPLINES
                .iter()
                .map(|s| s.to_string())
                .collect()
        });
        Ok(DiscoveryState::new(self.query, disciplines, self.mode))
    }
}

#[derive(Deserialize)]
pub struct DiscoveryListQuery {
    pub tier: Option<String>,
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/discovery/stream", post(stream_handler))
        .route("/api/discovery/explore", post(explore_handler))
        .route("/api/discovery/discoveries", get(discoveries_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn explore_handler(
    State(state): State<SharedState>,
    Json(request): Json<DiscoveryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let initial = request.into_state()?;
    let session_id = Uuid::new_v4().to_string();
    let final_state = state.orchestrator.invoke(initial, &session_id).await?;
    Ok(Json(serde_json::json!({
        "session_id": session_id,
        "synthesis": final_state.synthesis,
        "confidence_tier": final_state.confidence_tier,
        "quality_score": final_state.quality_score,
        "quality_issues": final_state.quality_issues,
        "verses_count": final_state.verses_count(),
        "science_findings_count": final_state.science_findings_count(),
        "humanities_findings_count": final_state.humanities_findings_count(),
        "discovery_id": final_state.discovery_id,
    })))
}

async fn stream_handler(
    State(state): State<SharedState>,
    Json(request): Json<DiscoveryRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let initial = request.into_state()?;
    let session_id = Uuid::new_v4().to_string();
    let events = state.orchestrator.stream(initial, session_id)?;

    let sse_stream = events.map(|event| {
        Ok(Event::default()
            .event(event.name)
            .json_data(event.payload)
            .unwrap_or_else(|_| Event::default().event("error").data("{\"error\":\"encoding\"}")))
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default().interval(Duration::from_secs(15))))
}

async fn discoveries_handler(
    State(state): State<SharedState>,
    Query(params): Query<DiscoveryListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let records = state.store.list(params.tier.as_deref()).await.map_err(EngineError::from)?;
    Ok(Json(serde_json::json!({ "discoveries": records })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{InMemoryDiscoveryStore, MockCorpusSearch, MockLlm};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let store: Arc<dyn DiscoveryStore> = Arc::new(InMemoryDiscoveryStore::default());
        Arc::new(AppState {
            orchestrator: Arc::new(Orchestrator::new(
                Arc::new(MockCorpusSearch),
                None,
                Arc::new(MockLlm),
                store.clone(),
                10,
            )),
            store,
        })
    }

    #[tokio::test]
    async fn health_endpoint_returns_healthy() {
        let app = build_router(test_state());
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn explore_rejects_empty_query() {
        let app = build_router(test_state());
        let req = Request::builder()
            .method("POST")
            .uri("/api/discovery/explore")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::json!({ "query": "" }).to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn explore_returns_terminal_summary() {
        let app = build_router(test_state());
        let req = Request::builder()
            .method("POST")
            .uri("/api/discovery/explore")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "query": "الماء في القرآن" }).to_string(),
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["synthesis"].is_string());
    }

    #[tokio::test]
    async fn discoveries_listing_returns_empty_array_when_none_saved() {
        let app = build_router(test_state());
        let req = Request::builder()
            .uri("/api/discovery/discoveries")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["discoveries"].as_array().unwrap().len(), 0);
    }
}

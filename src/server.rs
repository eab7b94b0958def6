use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::error::SuggestError;
use crate::llm_manager::LLMManager;
use crate::suggest::{SuggestRequest, SuggestResponse, Suggester};

#[derive(Clone)]
pub struct AppState {
    pub suggester: Arc<Suggester>,
}

impl AppState {
    pub fn from_config(config: Arc<Config>) -> Self {
        let manager = Arc::new(LLMManager::new(config));
        Self {
            suggester: Arc::new(Suggester::new(manager)),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<Value>,
}

/// JSON error reply for the suggestion endpoint.
#[derive(Debug)]
pub struct ApiError(SuggestError);

impl From<SuggestError> for ApiError {
    fn from(err: SuggestError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.0.to_string(),
            detail: self.0.detail().cloned(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_handler))
        .route("/api/suggest", post(suggest_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: Arc<Config>) -> anyhow::Result<()> {
    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Suggestion endpoint listening on http://{}", address);

    let app = create_router(AppState::from_config(config));
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check_handler() -> &'static str {
    "OK"
}

async fn suggest_handler(
    State(state): State<AppState>,
    payload: Result<Json<SuggestRequest>, JsonRejection>,
) -> Result<Json<SuggestResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected suggestion request: {}", rejection.body_text());
        SuggestError::validation("invalid request body")
    })?;

    let tasks = state.suggester.suggest(&request).await?;
    Ok(Json(SuggestResponse { tasks }))
}

//! Router, handlers, and error mapping for the HTTP API.
//!
//! Processing outcomes always come back as HTTP 200 with a `status`
//! field (`success`/`partial`/`failed`); non-200 codes are reserved for
//! malformed requests and transport-level problems.

use applykit::{
    validate_url, ApplyError, ProcessRequest, Processor, ResultStore, StoredResultSummary,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<Processor>,
    pub store: ResultStore,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/validate-url", post(validate_url_handler))
        .route("/extract-info", post(extract_info))
        .route("/extract-questions", post(extract_questions))
        .route("/generate-answers", post(generate_answers))
        .route("/process", post(process))
        .route("/results", get(list_results))
        .route("/results/:name", get(get_result))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// API-facing error with an explicit status code and, for LLM failures,
/// the call's correlation id.
struct ApiError {
    status: StatusCode,
    message: String,
    request_id: Option<String>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            request_id: None,
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            request_id: None,
        }
    }
}

impl From<ApplyError> for ApiError {
    fn from(err: ApplyError) -> Self {
        let status = match &err {
            ApplyError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            ApplyError::Scrape(_) => StatusCode::BAD_GATEWAY,
            ApplyError::LlmTransient { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
            request_id: err.request_id().map(|id| id.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({"error": self.message});
        if let Some(id) = self.request_id {
            body["request_id"] = json!(id);
        }
        (self.status, Json(body)).into_response()
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "applykit-server",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Deserialize)]
struct UrlBody {
    url: String,
}

#[derive(Serialize)]
struct ValidateResponse {
    url: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Validation never fails the request; the verdict is the payload.
async fn validate_url_handler(Json(body): Json<UrlBody>) -> Json<ValidateResponse> {
    match validate_url(&body.url) {
        Ok(parsed) => Json(ValidateResponse {
            url: parsed.to_string(),
            valid: true,
            error: None,
        }),
        Err(e) => Json(ValidateResponse {
            url: body.url,
            valid: false,
            error: Some(e.to_string()),
        }),
    }
}

#[derive(Deserialize)]
struct ExtractBody {
    url: String,
    #[serde(default = "default_app_name", alias = "name")]
    app_name: String,
}

fn default_app_name() -> String {
    "application".to_string()
}

async fn extract_info(
    State(state): State<AppState>,
    Json(body): Json<ExtractBody>,
) -> Result<Json<Value>, ApiError> {
    let info = state.processor.extract_info(&body.url, &body.app_name).await?;
    Ok(Json(json!({"url": body.url, "application_info": info})))
}

async fn extract_questions(
    State(state): State<AppState>,
    Json(body): Json<ExtractBody>,
) -> Result<Json<Value>, ApiError> {
    let questions = state
        .processor
        .extract_questions(&body.url, &body.app_name)
        .await?;
    Ok(Json(json!({"url": body.url, "questions": questions})))
}

#[derive(Deserialize)]
struct GenerateAnswersBody {
    #[serde(default = "default_app_name", alias = "name")]
    app_name: String,
    #[serde(default)]
    application_info: Value,
    questions: Vec<applykit::Question>,
}

async fn generate_answers(
    State(state): State<AppState>,
    Json(body): Json<GenerateAnswersBody>,
) -> Result<Json<Value>, ApiError> {
    if body.questions.is_empty() {
        return Err(ApiError::bad_request("questions must not be empty"));
    }
    let answers = state
        .processor
        .generate_answers(&body.app_name, &body.application_info, &body.questions)
        .await?;
    Ok(Json(json!({"name": body.app_name, "answers": answers})))
}

#[derive(Deserialize)]
struct ProcessBody {
    #[serde(default = "default_app_name", alias = "name")]
    app_name: String,
    info_url: String,
    form_url: String,
}

/// Full pipeline. Always 200; failures are reported in `status` and
/// `errors` so a batch driver can keep going.
async fn process(
    State(state): State<AppState>,
    Json(body): Json<ProcessBody>,
) -> Result<Json<applykit::ProcessingResult>, ApiError> {
    if body.app_name.trim().is_empty() {
        return Err(ApiError::bad_request("app_name must not be empty"));
    }
    info!(app = %body.app_name, "processing via API");
    let result = state
        .processor
        .process(&ProcessRequest {
            app_name: body.app_name,
            info_url: body.info_url,
            form_url: body.form_url,
        })
        .await;
    Ok(Json(result))
}

async fn list_results(
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredResultSummary>>, ApiError> {
    Ok(Json(state.store.list()?))
}

async fn get_result(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<applykit::ProcessingResult>, ApiError> {
    match state.store.load(&name)? {
        Some(result) => Ok(Json(result)),
        None => Err(ApiError::not_found(format!("no results for {name}"))),
    }
}

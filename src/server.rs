use crate::events::ModelKind;
use crate::translator::{TranslateError, Translator};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

/// Health endpoint path.
pub const HEALTH_PATH: &str = "/health";
/// Model listing endpoint path.
pub const MODELS_PATH: &str = "/models";
/// Translation endpoint path.
pub const TRANSLATE_PATH: &str = "/translate";

pub const SERVICE_NAME: &str = "DeepSeek Translation API";

#[derive(Clone)]
pub struct AppState {
    pub translator: Translator,
}

impl AppState {
    pub fn new(translator: Translator) -> Self {
        Self { translator }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TranslateRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TranslateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Outer `None` omits the field, `Some(None)` renders `null`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranslateResponse {
    fn failure(error: impl Into<String>, model: Option<ModelKind>) -> Self {
        Self {
            success: false,
            content: None,
            reasoning: None,
            model: model.map(|m| m.api_id().to_string()),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: ModelKind,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub models: Vec<ModelInfo>,
}

/// Build the full router: translation, health and model listing, with
/// cross-origin requests allowed from anywhere.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(MODELS_PATH, get(list_models))
        .route(TRANSLATE_PATH, post(translate))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr().context("Failed to read bound address")?;

    tracing::info!(%local, "translation server listening");
    println!("Translate endpoint: http://{local}{TRANSLATE_PATH}");
    println!("Health check:       http://{local}{HEALTH_PATH}");
    println!("Model list:         http://{local}{MODELS_PATH}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("translation server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
    })
}

async fn list_models() -> Json<ModelList> {
    let models = ModelKind::iter()
        .map(|kind| ModelInfo {
            id: kind,
            name: kind.display_name(),
            description: kind.description(),
        })
        .collect();
    Json(ModelList { models })
}

async fn translate(
    State(st): State<AppState>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Json<TranslateResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "rejected translate request body");
            return Json(TranslateResponse::failure(format!("服务器错误: {}", rejection.body_text()), None));
        }
    };

    let model = ModelKind::from_request(request.model.as_deref());
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("translate", %request_id, model = model.api_id());

    let text = request.text.unwrap_or_default();
    let outcome = st
        .translator
        .translate(&text, request.prompt.as_deref(), model)
        .instrument(span)
        .await;

    let response = match outcome {
        Ok(translation) => TranslateResponse {
            success: true,
            content: Some(translation.content),
            reasoning: Some(translation.reasoning),
            model: Some(translation.model.api_id().to_string()),
            error: None,
        },
        Err(TranslateError::MissingText) => TranslateResponse::failure(TranslateError::MissingText.to_string(), None),
        Err(TranslateError::Upstream(e)) => {
            tracing::warn!(%request_id, error = %e, "translation failed");
            TranslateResponse::failure(e.to_string(), Some(model))
        }
    };
    Json(response)
}

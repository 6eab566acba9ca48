use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use comms_kernel::{CommsKernel, CommsKernelBuilder, StatusSnapshot};
use comms_protocol::CoreError;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

mod openapi;

use crate::openapi::{openapi_spec, scalar_docs_html};

#[derive(Debug, Parser)]
#[command(name = "comms-api")]
#[command(about = "Admin API for the communication-module event core")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:8790")]
    listen: SocketAddr,
    /// Initialize the system at startup instead of waiting for the first
    /// POST /admin/system/initialize.
    #[arg(long)]
    initialize_on_start: bool,
}

#[derive(Clone)]
struct AppState {
    kernel: CommsKernel,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "message": self.message })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
struct ActionResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct ComponentResponse {
    success: bool,
    component: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let kernel = CommsKernelBuilder::new().build();
    if cli.initialize_on_start && !kernel.initialize_system().await {
        tracing::warn!("system came up degraded; check component status");
    }

    let state = AppState {
        kernel: kernel.clone(),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(listen = %cli.listen, "comms-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    kernel.shutdown().await;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(docs))
        .route("/admin/system/initialize", post(initialize_system))
        .route("/admin/system/reinitialize", post(reinitialize_system))
        .route(
            "/admin/system/reinitialize/{component}",
            post(reinitialize_component),
        )
        .route("/admin/system/status", get(system_status))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "comms-api"
    }))
}

async fn openapi_json() -> Json<serde_json::Value> {
    Json(openapi_spec())
}

async fn docs() -> Html<String> {
    Html(scalar_docs_html("/openapi.json"))
}

async fn initialize_system(State(state): State<AppState>) -> ApiResult<Json<ActionResponse>> {
    if state.kernel.initialize_system().await {
        Ok(Json(ActionResponse {
            success: true,
            message: "system initialized".to_owned(),
        }))
    } else {
        Err(ApiError::internal(
            "one or more components failed to initialize",
        ))
    }
}

async fn reinitialize_system(State(state): State<AppState>) -> ApiResult<Json<ActionResponse>> {
    if state.kernel.force_reinitialize().await {
        Ok(Json(ActionResponse {
            success: true,
            message: "system reinitialized".to_owned(),
        }))
    } else {
        Err(ApiError::internal(
            "one or more components failed to reinitialize",
        ))
    }
}

async fn reinitialize_component(
    Path(component): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<ComponentResponse>> {
    match state.kernel.reinitialize_component(&component).await {
        Ok(true) => Ok(Json(ComponentResponse {
            success: true,
            component,
        })),
        Ok(false) => Err(ApiError::internal(format!(
            "component {component} failed to reinitialize"
        ))),
        Err(CoreError::UnknownComponent(name)) => {
            Err(ApiError::bad_request(format!("unknown component: {name}")))
        }
        Err(other) => Err(ApiError::internal(other)),
    }
}

async fn system_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.kernel.status())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}

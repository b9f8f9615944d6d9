//! # HTTP surface
//!
//! The axum router and its handlers. Handlers translate between HTTP and
//! the core pipeline: upload -> compile -> registry, then per request
//! registry -> resolve -> invoke -> JSON out. The only state they share is
//! the schema registry (plus the injected compiler and the staging
//! directory path).

use crate::error::ApiError;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use porta_core::compiler::SchemaCompiler;
use porta_core::invoke::{CallRequest, Invoker, deadline_for};
use porta_core::registry::{SchemaRegistry, ServiceEntry};
use serde::Deserialize;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const UI_PAGE: &str = include_str!("ui.html");

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SchemaRegistry>,
    pub compiler: Arc<dyn SchemaCompiler>,
    pub staging_dir: PathBuf,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ui_page))
        .route("/load-proto", post(load_proto))
        .route("/add-import", post(add_import))
        .route("/services", get(list_services))
        .route("/grpc-call", post(grpc_call))
        .route("/grpc-stream", post(grpc_stream))
        .with_state(state)
}

async fn ui_page() -> Html<&'static str> {
    Html(UI_PAGE)
}

/// `POST /load-proto`: multipart upload of one `.proto` source file.
///
/// The file is staged on disk, compiled with the configured import roots,
/// and the resulting descriptor set replaces the active schema. Any failure
/// along the way leaves the previous schema untouched.
async fn load_proto(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadInput(e.to_string()))?
    {
        if field.name() == Some("proto") {
            let file_name = field
                .file_name()
                .map(str::to_owned)
                .unwrap_or_else(|| "upload.proto".to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadInput(e.to_string()))?;
            upload = Some((file_name, data));
            break;
        }
    }
    let Some((file_name, data)) = upload else {
        return Err(ApiError::BadInput("No file uploaded".to_string()));
    };

    tokio::fs::create_dir_all(&state.staging_dir)
        .await
        .map_err(|_| ApiError::Internal("Could not create upload dir".to_string()))?;

    // Keep only the final path component; uploads must not escape staging.
    let file_name = Path::new(&file_name)
        .file_name()
        .map(|n| n.to_owned())
        .ok_or_else(|| ApiError::BadInput("Invalid file name".to_string()))?;
    let saved_path = state.staging_dir.join(file_name);
    tokio::fs::write(&saved_path, &data)
        .await
        .map_err(|_| ApiError::Internal("Could not save file".to_string()))?;

    // protoc blocks; keep it off the async workers.
    let compiler = Arc::clone(&state.compiler);
    let roots = state.registry.import_roots();
    let source = saved_path.clone();
    let blob = tokio::task::spawn_blocking(move || compiler.compile(&source, &roots))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    state.registry.replace_schema(&blob)?;
    tracing::info!(path = %saved_path.display(), bytes = blob.len(), "proto uploaded and compiled");
    Ok(Json(
        serde_json::json!({ "message": "Proto uploaded and compiled successfully" }),
    ))
}

#[derive(Debug, Deserialize)]
struct AddImportRequest {
    path: String,
}

/// `POST /add-import`: appends a schema import root.
async fn add_import(
    State(state): State<AppState>,
    body: Result<Json<AddImportRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::BadInput("Invalid JSON".to_string()))?;
    let paths = state.registry.add_import_root(req.path)?;
    tracing::info!(roots = paths.len(), "import path added");
    Ok(Json(
        serde_json::json!({ "message": "Import path added", "paths": paths }),
    ))
}

/// `GET /services`: the services and methods of the active schema.
async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceEntry>> {
    Json(state.registry.list_services())
}

/// `POST /grpc-call`: one unary exchange, response relayed as JSON.
async fn grpc_call(
    State(state): State<AppState>,
    body: Result<Json<CallRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::BadInput("Invalid JSON".to_string()))?;
    let (deadline, timeout) = deadline_for(req.timeout_sec)?;
    let method = state.registry.resolve(&req.service, &req.method)?;

    let mut invoker = Invoker::connect(&req.target, deadline).await?;
    let response = invoker.unary(&method, req.message, deadline, timeout).await?;
    tracing::debug!(service = %req.service, method = %req.method, "unary call completed");
    Ok(Json(response))
}

/// `POST /grpc-stream`: one server-streaming exchange, relayed as
/// newline-delimited JSON.
///
/// Each relay chunk is one HTTP chunk, so hyper flushes every message as it
/// arrives and TCP backpressure flows through to the gRPC stream. When the
/// browser disconnects, the relay is dropped and the call cancelled.
async fn grpc_stream(
    State(state): State<AppState>,
    body: Result<Json<CallRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::BadInput("Invalid JSON".to_string()))?;
    let (deadline, timeout) = deadline_for(req.timeout_sec)?;
    let method = state.registry.resolve(&req.service, &req.method)?;

    let mut invoker = Invoker::connect(&req.target, deadline).await?;
    let relay = invoker
        .server_stream(&method, req.message, deadline, timeout)
        .await?;
    tracing::debug!(service = %req.service, method = %req.method, "stream opened");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(relay.map(Ok::<_, Infallible>)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

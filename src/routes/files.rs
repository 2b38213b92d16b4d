//! File routes
//!
//! Endpoints (prefix configurable, `files` by default):
//! - GET    /files/:filename           - Download a file
//! - GET    /files/:filename/size      - File size
//! - GET    /files/:filename/info      - Per-chunk metadata
//! - DELETE /files/:filename           - Remove a file
//! - POST   /files                     - Upload, named by the multipart file name
//! - POST   /files/:filename           - Upload under an explicit name
//! - POST   /files/chunk/:filename     - Upload one fragment
//! - POST   /files/assemble/:filename  - Merge fragments
//!
//! `chunk` and `assemble` are static segments, so they win over
//! `/:filename/...`. Files literally named `chunk` or `assemble` still reach
//! their size and info endpoints through `GET /files/{chunk,assemble}/{size,info}`.

use std::collections::HashMap;

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::service::{
    AssembleOutcome, ChunkInfoOutcome, ReadOutcome, RemoveOutcome, SizeOutcome, WriteOutcome,
};
use crate::state::AppState;
use crate::throttle::{Throttle, ThrottleParams};

/// Multipart field holding the file bytes
const FILE_FIELD: &str = "file";

/// Create the files router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(upload))
        .route(
            "/:filename",
            get(read_file).post(upload_named).delete(remove_file),
        )
        .route("/:filename/size", get(get_size))
        .route("/:filename/info", get(chunk_info))
        .route("/chunk/:filename", get(chunk_subresource).post(upload_chunk))
        .route("/assemble/:filename", get(assemble_subresource).post(assemble))
}

// ============================================================================
// Queries
// ============================================================================

/// Query options on whole-file uploads
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    /// Milliseconds to hold the response, and the pause between slices
    pub wait: Option<u64>,

    #[serde(rename = "chunkSize")]
    pub chunk_size: Option<usize>,

    /// Answer with an HTML page posting the result to the parent window
    #[serde(rename = "_postmessage")]
    pub postmessage: Option<String>,

    #[serde(rename = "_postmessageid")]
    pub postmessage_id: Option<String>,
}

impl UploadQuery {
    fn throttle(&self) -> Throttle {
        Throttle::from_params(&ThrottleParams {
            wait: self.wait,
            chunk_size: self.chunk_size,
        })
    }

    fn wants_postmessage(&self) -> bool {
        self.postmessage
            .as_deref()
            .is_some_and(|value| !value.is_empty() && value != "0" && value != "false")
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /files/:filename/size
async fn get_size(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    let outcome = state.files().get_size(&filename).await;
    let status = outcome.status_code();

    match outcome {
        SizeOutcome::Found { size } => (status, Json(json!({ "fileSize": size }))).into_response(),
        SizeOutcome::NotFound => (status, Json(json!({}))).into_response(),
    }
}

/// GET /files/:filename
async fn read_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let outcome = state.files().read_file(&filename).await?;
    let status = outcome.status_code();

    let (name, bytes) = match outcome {
        ReadOutcome::Found { name, bytes } => (name, bytes),
        ReadOutcome::NotFound => return Ok((status, Json(json!({}))).into_response()),
    };

    let size = bytes.len();
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment;filename={}", urlencoding::encode(&name)),
        )
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// GET /files/:filename/info
async fn chunk_info(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let outcome = state.files().list_chunk_info(&filename).await?;
    let status = outcome.status_code();

    Ok(match outcome {
        ChunkInfoOutcome::Found(chunks) => (status, Json(chunks)).into_response(),
        ChunkInfoOutcome::NotFound => (status, Json(json!({}))).into_response(),
    })
}

/// GET /files/chunk/:endpoint
async fn chunk_subresource(
    state: State<AppState>,
    Path(endpoint): Path<String>,
) -> Result<Response> {
    reserved_subresource(state, "chunk", &endpoint).await
}

/// GET /files/assemble/:endpoint
async fn assemble_subresource(
    state: State<AppState>,
    Path(endpoint): Path<String>,
) -> Result<Response> {
    reserved_subresource(state, "assemble", &endpoint).await
}

/// Size and info for a file whose name collides with a static route segment
async fn reserved_subresource(
    state: State<AppState>,
    filename: &str,
    endpoint: &str,
) -> Result<Response> {
    let filename = Path(filename.to_string());
    match endpoint {
        "size" => Ok(get_size(state, filename).await),
        "info" => chunk_info(state, filename).await,
        _ => Ok((StatusCode::NOT_FOUND, Json(json!({}))).into_response()),
    }
}

/// DELETE /files/:filename
async fn remove_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let outcome = state.files().remove_file(&filename).await?;
    let status = outcome.status_code();

    if outcome == RemoveOutcome::Removed {
        tracing::info!(filename = %filename, "File removed");
    }
    Ok((status, Json(json!({}))).into_response())
}

/// POST /files
async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Response> {
    save_file(&state, &query, multipart, None).await
}

/// POST /files/:filename
async fn upload_named(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Response> {
    save_file(&state, &query, multipart, Some(filename)).await
}

/// POST /files/chunk/:filename
///
/// Multipart body with the chunk index field and the `file` part, in any order.
async fn upload_chunk(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    mut multipart: Multipart,
) -> Result<Response> {
    let index_field = state.config().upload.chunk_number_field.as_str();

    let mut chunk_number: Option<String> = None;
    let mut data: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(name) if name == index_field => chunk_number = Some(field.text().await?),
            Some(FILE_FIELD) => data = Some(field.bytes().await?),
            _ => {}
        }
    }

    let chunk_number = chunk_number
        .ok_or_else(|| AppError::BadRequest(format!("Missing {} field", index_field)))?;
    let chunk_index = parse_size(&chunk_number)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid chunk number: {}", chunk_number)))?;
    let data = data.ok_or_else(|| AppError::BadRequest(format!("Missing {} field", FILE_FIELD)))?;

    let outcome = state.files().write_chunk(&filename, data, chunk_index).await?;
    Ok((outcome.status_code(), Json(json!({}))).into_response())
}

/// POST /files/assemble/:filename
///
/// Accepts the declared total size as JSON or as a urlencoded form.
async fn assemble(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response> {
    let size_field = state.config().upload.total_size_field.clone();
    let fields = read_body_fields(request).await?;

    let total = fields
        .get(&size_field)
        .ok_or_else(|| AppError::BadRequest(format!("Missing {} field", size_field)))?;
    let total = parse_size(total)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid total size: {}", total)))?;

    let outcome = state.files().assemble_chunks(&filename, total).await?;
    let status = outcome.status_code();

    Ok(match outcome {
        AssembleOutcome::Assembled { size } => (status, Json(json!({ "fileSize": size }))),
        AssembleOutcome::SizeMismatch { requested, computed } => (
            status,
            Json(json!({ "requestedSize": requested, "computedSize": computed })),
        ),
        AssembleOutcome::NotFound => (status, Json(json!({}))),
    }
    .into_response())
}

// ============================================================================
// Helpers
// ============================================================================

/// Store the `file` part of a whole-file upload
async fn save_file(
    state: &AppState,
    query: &UploadQuery,
    mut multipart: Multipart,
    name: Option<String>,
) -> Result<Response> {
    let throttle = query.throttle();

    let mut stored: Option<WriteOutcome> = None;
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = name
            .clone()
            .or_else(|| field.file_name().map(str::to_string))
            .filter(|filename| !filename.is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing file name".to_string()))?;

        tracing::trace!(filename = %filename, throttled = !throttle.is_passthrough(), "Saving file");

        let outcome = match &state.config().upload.upload_dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                let path = dir.join(Uuid::new_v4().to_string());
                let mut file = tokio::fs::File::create(&path).await?;

                let written = match throttle.ingest(&mut field, &mut file).await {
                    Ok(written) => written,
                    Err(e) => {
                        drop(file);
                        if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                            tracing::warn!(
                                path = %path.display(),
                                error = %cleanup,
                                "Failed to delete partial upload"
                            );
                        }
                        return Err(e);
                    }
                };
                state.files().write_file(&filename, path, Some(written)).await
            }
            None => {
                let mut buffer = Vec::new();
                throttle.ingest(&mut field, &mut buffer).await?;
                state.files().write_file(&filename, buffer, None).await
            }
        };

        stored = Some(outcome);
        break;
    }

    let outcome =
        stored.ok_or_else(|| AppError::BadRequest(format!("Missing {} field", FILE_FIELD)))?;

    if query.wait.is_some_and(|wait| wait > 0) {
        throttle.pause().await;
    }

    let mut data = json!({});
    if query.wants_postmessage() {
        if let Some(id) = &query.postmessage_id {
            data["_postmessageid"] = Value::String(id.clone());
        }
        let page = format!(
            "<!DOCTYPE html><script>parent.postMessage(JSON.stringify({}), '*');</script>",
            data
        );
        return Ok((outcome.status_code(), Html(page)).into_response());
    }

    Ok((outcome.status_code(), Json(data)).into_response())
}

/// Collect flat fields from a JSON or urlencoded body
async fn read_body_fields(request: Request) -> Result<HashMap<String, String>> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));

    if is_json {
        let Json(map) = Json::<HashMap<String, Value>>::from_request(request, &())
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        return Ok(map
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect());
    }

    let Form(map) = Form::<HashMap<String, String>>::from_request(request, &())
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(map)
}

/// Parse a non-negative integer, tolerating surrounding whitespace
fn parse_size(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

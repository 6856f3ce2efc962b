//! HTTP API server.
//!
//! The full upload/transcribe/analyze/chat surface. All routes except
//! `/health` require a bearer token from `[auth]` in the config.

use crate::auth::AuthenticatedUser;
use crate::chat::ChatMessage;
use crate::cli::Output;
use crate::config::{AuthSettings, Settings};
use crate::error::InnsiktError;
use crate::orchestrator::Orchestrator;
use crate::store::{StepStatus, TranscriptionRecord};
use crate::upload::ChunkMeta;
use axum::extract::{DefaultBodyLimit, FromRef, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    settings: Settings,
}

impl FromRef<Arc<AppState>> for AuthSettings {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.settings.auth.clone()
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = Arc::new(Orchestrator::new(settings.clone())?);

    let resumed = orchestrator.resume_interrupted()?;
    if resumed > 0 {
        Output::info(&format!(
            "Resuming {} interrupted transcription(s)",
            resumed
        ));
    }
    let _sweeper = orchestrator.spawn_sweeper();

    if settings.auth.keys.is_empty() {
        Output::warning("No API keys configured ([auth] keys); every request will be rejected.");
    }
    if !crate::openai::is_api_key_configured() {
        Output::warning("OPENAI_API_KEY is not set; transcription and analysis will fail.");
    }

    let state = Arc::new(AppState {
        orchestrator,
        settings: settings.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Chunks plus multipart framing must fit in the request body.
    let body_limit = (settings.upload.max_chunk_bytes as usize) + 1024 * 1024;

    let app = Router::new()
        .route("/health", get(health))
        .route("/uploads/{session_id}/chunks", post(upload_chunk))
        .route("/uploads/{session_id}/finalize", post(finalize_upload))
        .route("/records", post(create_record).get(list_records))
        .route("/records/from-url", post(create_record_from_url))
        .route("/records/{id}", get(get_record))
        .route("/records/{id}/transcribe", post(transcribe))
        .route("/records/{id}/summarize", post(summarize))
        .route("/records/{id}/analyze", post(analyze))
        .route("/records/{id}/chat", post(chat))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Innsikt API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Upload chunk", "POST /uploads/:session_id/chunks");
    Output::kv("Finalize upload", "POST /uploads/:session_id/finalize");
    Output::kv("Create record", "POST /records");
    Output::kv("Create from URL", "POST /records/from-url");
    Output::kv("List records", "GET  /records");
    Output::kv("Get record", "GET  /records/:id");
    Output::kv("Transcribe", "POST /records/:id/transcribe");
    Output::kv("Summarize", "POST /records/:id/summarize");
    Output::kv("Analyze", "POST /records/:id/analyze");
    Output::kv("Chat", "POST /records/:id/chat");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Error mapping ===

/// Wraps pipeline errors into `{success: false, error}` JSON responses.
struct ApiError(InnsiktError);

impl From<InnsiktError> for ApiError {
    fn from(e: InnsiktError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InnsiktError::Auth(_) => StatusCode::UNAUTHORIZED,
            InnsiktError::Forbidden(_) => StatusCode::FORBIDDEN,
            InnsiktError::NotFound(_) => StatusCode::NOT_FOUND,
            InnsiktError::InvalidInput(_) | InnsiktError::MissingChunks(_) => {
                StatusCode::BAD_REQUEST
            }
            InnsiktError::Conflict(_) => StatusCode::CONFLICT,
            InnsiktError::OpenAI(_) | InnsiktError::Http(_) => {
                if self.0.is_timeout() {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// === Request/Response Types ===

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

/// Record payload returned by the API.
///
/// Analysis is only included once its step completed; partial analysis data
/// is never exposed.
#[derive(Serialize)]
struct RecordDto {
    id: Uuid,
    file_name: String,
    mime_type: String,
    media_bytes: u64,
    status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript_error: Option<String>,
    transcribed_slices: u32,
    total_slices: u32,
    summary_status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary_error: Option<String>,
    analysis_status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis_error: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<TranscriptionRecord> for RecordDto {
    fn from(record: TranscriptionRecord) -> Self {
        let analysis = if record.analysis_status == StepStatus::Completed {
            record
                .analysis_json
                .as_deref()
                .and_then(|json| serde_json::from_str(json).ok())
        } else {
            None
        };

        Self {
            id: record.id,
            file_name: record.file_name,
            mime_type: record.mime_type,
            media_bytes: record.media_bytes,
            status: record.status,
            transcript_text: record.transcript_text,
            transcript_error: record.transcript_error,
            transcribed_slices: record.transcribed_slices,
            total_slices: record.total_slices,
            summary_status: record.summary_status,
            summary_text: record.summary_text,
            summary_error: record.summary_error,
            analysis_status: record.analysis_status,
            analysis,
            analysis_error: record.analysis_error,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Serialize)]
struct ChunkResponse {
    success: bool,
    session_id: String,
    chunk_index: u32,
    received_count: u32,
    total_chunks: u32,
}

#[derive(Deserialize)]
struct FinalizeRequest {
    total_chunks: u32,
}

#[derive(Serialize)]
struct RecordResponse {
    success: bool,
    record: RecordDto,
}

#[derive(Deserialize)]
struct CreateFromUrlRequest {
    source_url: String,
    #[serde(default)]
    file_name: Option<String>,
}

#[derive(Serialize)]
struct RecordListResponse {
    success: bool,
    records: Vec<RecordDto>,
    total: usize,
}

#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatResponse {
    success: bool,
    reply: String,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<ChunkResponse>> {
    let mut chunk_index: Option<u32> = None;
    let mut total_chunks: Option<u32> = None;
    let mut meta = ChunkMeta::default();
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| InnsiktError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "chunk_index" => {
                let text = field.text().await.map_err(bad_field)?;
                chunk_index = Some(parse_field("chunk_index", &text)?);
            }
            "total_chunks" => {
                let text = field.text().await.map_err(bad_field)?;
                total_chunks = Some(parse_field("total_chunks", &text)?);
            }
            "file_name" => {
                meta.file_name = Some(field.text().await.map_err(bad_field)?);
            }
            "mime_type" => {
                meta.mime_type = Some(field.text().await.map_err(bad_field)?);
            }
            "chunk" => {
                if meta.file_name.is_none() {
                    meta.file_name = field.file_name().map(str::to_string);
                }
                bytes = Some(field.bytes().await.map_err(bad_field)?.to_vec());
            }
            other => {
                return Err(
                    InnsiktError::InvalidInput(format!("Unexpected field: {}", other)).into(),
                );
            }
        }
    }

    let chunk_index =
        chunk_index.ok_or_else(|| InnsiktError::InvalidInput("Missing chunk_index".into()))?;
    let total_chunks =
        total_chunks.ok_or_else(|| InnsiktError::InvalidInput("Missing total_chunks".into()))?;
    let bytes = bytes.ok_or_else(|| InnsiktError::InvalidInput("Missing chunk field".into()))?;

    let receipt = state
        .orchestrator
        .receive_chunk(&owner, &session_id, chunk_index, total_chunks, meta, &bytes)
        .await?;

    Ok(Json(ChunkResponse {
        success: true,
        session_id: receipt.session_id,
        chunk_index: receipt.chunk_index,
        received_count: receipt.received_count,
        total_chunks: receipt.total_chunks,
    }))
}

async fn finalize_upload(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(session_id): Path<String>,
    Json(req): Json<FinalizeRequest>,
) -> ApiResult<Json<RecordResponse>> {
    let record = state
        .orchestrator
        .finalize_upload(&owner, &session_id, req.total_chunks)
        .await?;

    Ok(Json(RecordResponse {
        success: true,
        record: record.into(),
    }))
}

async fn create_record(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner): AuthenticatedUser,
    mut multipart: Multipart,
) -> ApiResult<Json<RecordResponse>> {
    let mut file_name: Option<String> = None;
    let mut mime_type: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| InnsiktError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file_name" => file_name = Some(field.text().await.map_err(bad_field)?),
            "mime_type" => mime_type = Some(field.text().await.map_err(bad_field)?),
            "file" => {
                if file_name.is_none() {
                    file_name = field.file_name().map(str::to_string);
                }
                if mime_type.is_none() {
                    mime_type = field.content_type().map(str::to_string);
                }
                bytes = Some(field.bytes().await.map_err(bad_field)?.to_vec());
            }
            other => {
                return Err(
                    InnsiktError::InvalidInput(format!("Unexpected field: {}", other)).into(),
                );
            }
        }
    }

    let bytes = bytes.ok_or_else(|| InnsiktError::InvalidInput("Missing file field".into()))?;
    let file_name = file_name.unwrap_or_else(|| "upload.bin".to_string());
    let mime_type = mime_type.unwrap_or_else(|| "application/octet-stream".to_string());

    let record = state
        .orchestrator
        .create_record(&owner, &file_name, &mime_type, &bytes)
        .await?;

    Ok(Json(RecordResponse {
        success: true,
        record: record.into(),
    }))
}

async fn create_record_from_url(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Json(req): Json<CreateFromUrlRequest>,
) -> ApiResult<Json<RecordResponse>> {
    let record = state
        .orchestrator
        .create_record_from_url(&owner, &req.source_url, req.file_name.as_deref())
        .await?;

    Ok(Json(RecordResponse {
        success: true,
        record: record.into(),
    }))
}

async fn list_records(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner): AuthenticatedUser,
) -> ApiResult<Json<RecordListResponse>> {
    let records = state.orchestrator.list_records(&owner)?;

    Ok(Json(RecordListResponse {
        success: true,
        total: records.len(),
        records: records.into_iter().map(RecordDto::from).collect(),
    }))
}

async fn get_record(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordResponse>> {
    let id = parse_record_id(&id)?;
    let record = state.orchestrator.get_record(&owner, id)?;

    Ok(Json(RecordResponse {
        success: true,
        record: record.into(),
    }))
}

async fn transcribe(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordResponse>> {
    let id = parse_record_id(&id)?;
    let record = state.orchestrator.transcribe(&owner, id).await?;

    Ok(Json(RecordResponse {
        success: true,
        record: record.into(),
    }))
}

async fn summarize(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordResponse>> {
    let id = parse_record_id(&id)?;
    state.orchestrator.summarize(&owner, id).await?;

    let record = state.orchestrator.get_record(&owner, id)?;
    Ok(Json(RecordResponse {
        success: true,
        record: record.into(),
    }))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordResponse>> {
    let id = parse_record_id(&id)?;
    state.orchestrator.analyze(&owner, id).await?;

    let record = state.orchestrator.get_record(&owner, id)?;
    Ok(Json(RecordResponse {
        success: true,
        record: record.into(),
    }))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(owner): AuthenticatedUser,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let id = parse_record_id(&id)?;
    let reply = state.orchestrator.chat(&owner, id, &req.messages).await?;

    Ok(Json(ChatResponse {
        success: true,
        reply,
    }))
}

// === Helpers ===

fn parse_record_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| InnsiktError::InvalidInput(format!("Invalid record id: {}", raw)).into())
}

fn parse_field(name: &str, raw: &str) -> Result<u32, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| InnsiktError::InvalidInput(format!("Invalid {}: {}", name, raw)).into())
}

fn bad_field(e: axum::extract::multipart::MultipartError) -> InnsiktError {
    InnsiktError::InvalidInput(format!("Malformed multipart field: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_record() -> TranscriptionRecord {
        let mut record = TranscriptionRecord::new(
            "alice".to_string(),
            "call.mp3".to_string(),
            "audio/mpeg".to_string(),
            "/data/media/x.mp3".to_string(),
            450,
        );
        record.analysis_json = Some(r#"{"sentiment":"negative","topics":["exports"]}"#.to_string());
        record
    }

    #[test]
    fn test_dto_omits_analysis_until_completed() {
        let record = completed_record(); // analysis_status still pending
        let dto = RecordDto::from(record);
        assert!(dto.analysis.is_none());
    }

    #[test]
    fn test_dto_exposes_completed_analysis() {
        let mut record = completed_record();
        record.analysis_status = StepStatus::Completed;

        let dto = RecordDto::from(record);
        let analysis = dto.analysis.expect("analysis should be exposed");
        assert_eq!(analysis["sentiment"], "negative");
    }

    #[test]
    fn test_parse_record_id() {
        assert!(parse_record_id(&Uuid::new_v4().to_string()).is_ok());
        assert!(parse_record_id("not-a-uuid").is_err());
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (InnsiktError::Auth("x".into()), StatusCode::UNAUTHORIZED),
            (InnsiktError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (InnsiktError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (InnsiktError::MissingChunks(vec![1]), StatusCode::BAD_REQUEST),
            (InnsiktError::Conflict("x".into()), StatusCode::CONFLICT),
            (InnsiktError::OpenAI("boom".into()), StatusCode::BAD_GATEWAY),
            (
                InnsiktError::OpenAI("request timed out".into()),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                InnsiktError::RecordStore("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            let response = ApiError(error).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}

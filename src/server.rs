//! HTTP surface: the page, the session API, previews, and one-shot captioning.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::asset::{
    ImageAsset, SelectedFile, ValidationError, MAX_IMAGE_BYTES, MAX_PROMPT_BYTES,
};
use crate::caption::{CaptionBackend, CaptionResult, ErrorKind};
use crate::gemini::UNKNOWN_ERROR_MESSAGE;
use crate::page;
use crate::preview::PreviewStore;
use crate::session::{CaptionJob, SessionState, SessionView};

pub struct AppState {
    session: Mutex<SessionState>,
    previews: PreviewStore,
    backend: Arc<dyn CaptionBackend>,
    default_prompt: String,
}

impl AppState {
    pub fn new(backend: Arc<dyn CaptionBackend>, default_prompt: impl Into<String>) -> Arc<Self> {
        let default_prompt = default_prompt.into();
        Arc::new(Self {
            session: Mutex::new(SessionState::new(default_prompt.clone())),
            previews: PreviewStore::new(),
            backend,
            default_prompt,
        })
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    /// Never held across an `.await`.
    pub fn session(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(page::index))
        .route("/api/session", get(get_session).delete(reset_session))
        .route(
            "/api/session/asset",
            post(select_asset).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/session/prompt", put(edit_prompt))
        .route("/api/session/generate", post(generate))
        .route(
            "/api/caption",
            post(caption_once).layer(DefaultBodyLimit::disable()),
        )
        .route("/preview/:id", get(preview))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    Multipart(MultipartError),
    MissingImage,
    Busy(SessionView),
    Caption { kind: ErrorKind, detail: String },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub error: String,
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Multipart(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Caption {
            kind: ErrorKind::Validation,
            detail: e.to_string(),
        }
    }
}

fn error_body(status: StatusCode, kind: ErrorKind, error: String) -> Response {
    (status, Json(ErrorBody { kind, error })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Multipart(e) => error_body(e.status(), ErrorKind::Validation, e.body_text()),
            ApiError::MissingImage => error_body(
                StatusCode::BAD_REQUEST,
                ErrorKind::Validation,
                "Missing `image` field in upload.".to_string(),
            ),
            ApiError::Busy(view) => (StatusCode::CONFLICT, Json(view)).into_response(),
            ApiError::Caption { kind, detail } => {
                let status = match kind {
                    ErrorKind::Validation | ErrorKind::Encoding => StatusCode::BAD_REQUEST,
                    ErrorKind::Credential | ErrorKind::Transport | ErrorKind::Unknown => {
                        StatusCode::BAD_GATEWAY
                    }
                };
                error_body(status, kind, detail)
            }
        }
    }
}

#[derive(Debug, Default)]
struct Upload {
    file: Option<SelectedFile>,
    prompt: Option<String>,
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let file = read_capped(field).await?;
                let oversized = file.size_bytes > MAX_IMAGE_BYTES;
                upload.file = Some(file);
                if oversized {
                    // The rest of the body is never read.
                    break;
                }
            }
            Some("prompt") => upload.prompt = Some(read_prompt(field).await?),
            _ => {}
        }
    }

    Ok(upload)
}

/// Read a file field, giving up once it crosses the size ceiling.
async fn read_capped(mut field: Field<'_>) -> Result<SelectedFile, MultipartError> {
    let file_name = field.file_name().map(str::to_string);
    let declared_type = field.content_type().map(str::to_string);

    let mut buf = BytesMut::new();
    let mut size_bytes = 0u64;
    while let Some(chunk) = field.chunk().await? {
        size_bytes += chunk.len() as u64;
        if size_bytes > MAX_IMAGE_BYTES {
            break;
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(SelectedFile {
        file_name,
        declared_type,
        bytes: buf.freeze(),
        size_bytes,
    })
}

/// Read a text field, rejecting it once it crosses [`MAX_PROMPT_BYTES`].
async fn read_prompt(mut field: Field<'_>) -> Result<String, ApiError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        if buf.len() + chunk.len() > MAX_PROMPT_BYTES {
            return Err(ValidationError::PromptTooLong {
                max_bytes: MAX_PROMPT_BYTES,
            }
            .into());
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    Json(state.session().view())
}

async fn reset_session(State(state): State<Arc<AppState>>) -> Result<Json<SessionView>, ApiError> {
    let mut session = state.session();
    if session.is_loading() {
        return Err(ApiError::Busy(session.view()));
    }
    session.reset();
    Ok(Json(session.view()))
}

async fn select_asset(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<SessionView>, ApiError> {
    let file = read_upload(&mut multipart)
        .await?
        .file
        .ok_or(ApiError::MissingImage)?;

    let mut session = state.session();
    if session.is_loading() {
        return Err(ApiError::Busy(session.view()));
    }
    if let Err(e) = session.select_asset(file, &state.previews) {
        tracing::debug!(error = %e, "selection rejected; reported in session view");
    }
    Ok(Json(session.view()))
}

#[derive(Debug, Deserialize)]
struct PromptBody {
    prompt: String,
}

async fn edit_prompt(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PromptBody>,
) -> Json<SessionView> {
    let mut session = state.session();
    session.edit_prompt(body.prompt);
    Json(session.view())
}

async fn generate(State(state): State<Arc<AppState>>) -> Result<Json<SessionView>, ApiError> {
    let job = {
        let mut session = state.session();
        match session.begin_generate() {
            Ok(job) => job,
            Err(ValidationError::InFlight) => return Err(ApiError::Busy(session.view())),
            Err(_) => return Ok(Json(session.view())),
        }
    };

    // Detached so the session leaves `Loading` even if the client goes away.
    let task_state = state.clone();
    let task = tokio::spawn(async move {
        let result = job.run(task_state.backend.as_ref()).await;
        let mut session = task_state.session();
        session.finish_generate(result);
        session.view()
    });

    match task.await {
        Ok(view) => Ok(Json(view)),
        Err(e) => {
            tracing::error!(error = %e, "caption task failed");
            let mut session = state.session();
            session.finish_generate(CaptionResult::failure(
                ErrorKind::Unknown,
                UNKNOWN_ERROR_MESSAGE,
            ));
            Ok(Json(session.view()))
        }
    }
}

async fn preview(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match state.previews.get(&id) {
        Some((media_type, bytes)) => {
            ([(header::CONTENT_TYPE, media_type.as_str())], bytes).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CaptionResponse {
    pub caption: String,
    pub model: String,
    pub processing_time_ms: u128,
}

/// Stateless upload-and-caption in a single request.
async fn caption_once(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<CaptionResponse>, ApiError> {
    let start = Instant::now();

    let upload = read_upload(&mut multipart).await?;
    let file = upload.file.ok_or(ApiError::MissingImage)?;
    let asset = ImageAsset::select(file)?;
    let prompt = upload
        .prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| state.default_prompt.clone());

    match CaptionJob::new(asset, prompt).run(state.backend.as_ref()).await {
        CaptionResult::Success { text } => Ok(Json(CaptionResponse {
            caption: text,
            model: state.backend.model().to_string(),
            processing_time_ms: start.elapsed().as_millis(),
        })),
        CaptionResult::Failure { reason, detail } => Err(ApiError::Caption {
            kind: reason,
            detail,
        }),
    }
}

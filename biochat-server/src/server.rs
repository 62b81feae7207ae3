use std::{future::Future, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
};
use biochat_rag::{
    ChatSession, Notice, RagConfig, RagError, RagPipeline, UploadedFile,
    gemini::{GeminiCompletionModel, GeminiEmbeddingProvider},
};
use serde_json::json;
use tokio::{net::TcpListener, sync::Mutex};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    protocol::{
        AskRequest, AskResponse, ErrorBody, HistoryEntry, HistoryResponse, LoadResponse,
        SessionCreateResponse, SourceRequest, StatsResponse,
    },
    session::SessionManager,
};

/// Shown when neither `GOOGLE_API_KEY` nor `GEMINI_API_KEY` is set.
pub const MISSING_KEY_MESSAGE: &str =
    "GOOGLE_API_KEY not found. Check your .env file or environment.";

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub pipeline: Arc<RagPipeline>,
}

impl AppState {
    pub fn new(pipeline: RagPipeline) -> Self {
        Self { sessions: SessionManager::default(), pipeline: Arc::new(pipeline) }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub docs_dir: PathBuf,
    pub index_dir: PathBuf,
    pub chat_model: String,
    pub embedding_model: String,
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            docs_dir: PathBuf::from("./docs"),
            index_dir: PathBuf::from("."),
            chat_model: "gemini-1.5-flash".to_string(),
            embedding_model: "models/embedding-001".to_string(),
            api_key: String::new(),
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Fails when no API key is available or `BIOCHAT_PORT` is not a port number.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = var("GOOGLE_API_KEY")
            .or_else(|| var("GEMINI_API_KEY"))
            .ok_or_else(|| anyhow::anyhow!(MISSING_KEY_MESSAGE))?;

        let defaults = Self::default();
        let port = match var("BIOCHAT_PORT") {
            Some(port) => port.parse::<u16>().with_context(|| format!("invalid BIOCHAT_PORT '{port}'"))?,
            None => defaults.port,
        };

        Ok(Self {
            host: var("BIOCHAT_HOST").unwrap_or(defaults.host),
            port,
            docs_dir: var("BIOCHAT_DOCS_DIR").map(PathBuf::from).unwrap_or(defaults.docs_dir),
            index_dir: var("BIOCHAT_INDEX_DIR").map(PathBuf::from).unwrap_or(defaults.index_dir),
            chat_model: var("BIOCHAT_CHAT_MODEL").unwrap_or(defaults.chat_model),
            embedding_model: var("BIOCHAT_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            api_key,
        })
    }
}

/// Wire the Gemini models and the configured folders into a pipeline.
pub fn build_pipeline(config: &ServerConfig) -> anyhow::Result<RagPipeline> {
    let rag_config = RagConfig::default();
    let embedder = GeminiEmbeddingProvider::new(&config.api_key, config.embedding_model.as_str())?;
    let model = GeminiCompletionModel::new(&config.api_key, config.chat_model.as_str())?
        .with_temperature(rag_config.temperature)
        .with_max_retries(rag_config.max_retries);

    let pipeline = RagPipeline::builder()
        .config(rag_config)
        .embedding_provider(Arc::new(embedder))
        .completion_model(Arc::new(model))
        .local_folder(&config.docs_dir)
        .index_root(&config.index_dir)
        .build()?;
    Ok(pipeline)
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/session", post(create_session))
        .route("/api/session/{session_id}", delete(end_session))
        .route("/api/session/{session_id}/upload", post(upload).delete(clear_uploads))
        .route("/api/session/{session_id}/source", post(select_source))
        .route("/api/session/{session_id}/ask", post(ask))
        .route("/api/session/{session_id}/history", get(history).delete(clear_history))
        .route("/api/session/{session_id}/stats", get(stats))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config)?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for biochat server")?;

    let listener = TcpListener::bind(addr).await?;
    info!(
        docs_dir = %config.docs_dir.display(),
        chat_model = %config.chat_model,
        embedding_model = %config.embedding_model,
        "biochat listening on http://{}",
        addr
    );
    serve(listener, AppState::new(pipeline), shutdown_signal()).await
}

/// Serve until `shutdown` resolves, then end every session so that upload
/// directories are removed before returning.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let sessions = state.sessions.clone();
    axum::serve(listener, app_router(state)).with_graceful_shutdown(shutdown).await?;
    let closed = sessions.close_all().await;
    info!(sessions = closed, "biochat stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            error!(error = %e, "cannot listen for ctrl-c, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}

/// Errors returned by the JSON API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("session not found")]
    SessionNotFound,

    #[error("no documents loaded: upload PDF files or enable the local folder first")]
    NoWorkspace,

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Rag(#[from] RagError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound => StatusCode::NOT_FOUND,
            ApiError::NoWorkspace => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rag(RagError::InputUnavailable(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Rag(e) if e.is_remote() => StatusCode::BAD_GATEWAY,
            ApiError::Rag(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        let message = self.to_string();
        let body = ErrorBody { notices: vec![Notice::error(message.clone())], error: message };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn find_session(state: &AppState, session_id: &str) -> Result<Arc<Mutex<ChatSession>>, ApiError> {
    state.sessions.get(session_id).await.ok_or(ApiError::SessionNotFound)
}

async fn index() -> impl IntoResponse {
    Html(include_str!("../ui/index.html"))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"biochat"}))
}

async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session_id = state.sessions.create_session().await;
    info!(session_id = %session_id, "session created");
    Json(SessionCreateResponse { session_id })
}

async fn end_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(&session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound)
    }
}

fn load_response(state: &AppState, session: &ChatSession, notices: Vec<Notice>) -> Json<LoadResponse> {
    let stats = session.workspace().map(|workspace| state.pipeline.stats(workspace));
    Json(LoadResponse { loaded: stats.is_some(), notices, stats })
}

async fn upload(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<LoadResponse> {
    let session = find_session(&state, &session_id).await?;

    let mut uploads = Vec::new();
    while let Some(field) =
        multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
        uploads.push(UploadedFile { name, bytes: bytes.to_vec() });
    }
    if uploads.is_empty() {
        return Err(ApiError::BadRequest("no files in upload".to_string()));
    }
    info!(session_id = %session_id, files = uploads.len(), "received upload");

    let mut session = session.lock().await;
    let notices = session.upload(&state.pipeline, uploads).await?;
    Ok(load_response(&state, &session, notices))
}

async fn clear_uploads(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<LoadResponse> {
    let session = find_session(&state, &session_id).await?;
    let mut session = session.lock().await;
    let notices = session.clear_uploads(&state.pipeline).await?;
    Ok(load_response(&state, &session, notices))
}

async fn select_source(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<SourceRequest>,
) -> ApiResult<LoadResponse> {
    let session = find_session(&state, &session_id).await?;
    let mut session = session.lock().await;
    let notices = session.set_local_folder(&state.pipeline, request.use_local_folder).await?;
    Ok(load_response(&state, &session, notices))
}

async fn ask(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> ApiResult<AskResponse> {
    let session = find_session(&state, &session_id).await?;
    let mut session = session.lock().await;

    if request.question.trim().is_empty() {
        return Ok(Json(AskResponse { answered: false, entry: None }));
    }
    if session.workspace().is_none() {
        return Err(ApiError::NoWorkspace);
    }

    let entry = session.ask(&state.pipeline, &request.question).await?;
    Ok(Json(AskResponse {
        answered: entry.is_some(),
        entry: entry.as_ref().map(HistoryEntry::from),
    }))
}

async fn history(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<HistoryResponse> {
    let session = find_session(&state, &session_id).await?;
    let session = session.lock().await;
    let entries = session.transcript().list().map(HistoryEntry::from).collect();
    Ok(Json(HistoryResponse { entries }))
}

async fn clear_history(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<HistoryResponse> {
    let session = find_session(&state, &session_id).await?;
    session.lock().await.clear_history();
    Ok(Json(HistoryResponse { entries: Vec::new() }))
}

async fn stats(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<StatsResponse> {
    let session = find_session(&state, &session_id).await?;
    let session = session.lock().await;
    let stats = session.workspace().map(|workspace| state.pipeline.stats(workspace));
    Ok(Json(StatsResponse { stats }))
}

//! HTTP surface: the JSON download endpoints plus static file serving.
//!
//! Every fetch runs on the blocking pool and is translated into the JSON
//! envelope exactly once, in [`ApiError`] or [`json_response`]. Any other
//! method or path falls through to [`serve_static`], which mimics a plain
//! static file server rooted at the working directory.

use std::{
    any::Any,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mime_guess::MimeGuess;
use serde::Serialize;
use serde_json::Value;
use tokio::{fs::File, task};
use tokio_util::io::ReaderStream;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    config::{LIBRARY_URL_PREFIX, ServerConfig},
    direct::{DirectFetcher, DirectOutcome},
    error::{FetchError, FetchResult},
    extract::{ExtractionFetcher, Extractor},
    library::{AssetEntry, Library},
};

const INDEX_FILE: &str = "index.html";

#[derive(Clone)]
pub struct AppState {
    direct: Arc<DirectFetcher>,
    extraction: Arc<ExtractionFetcher>,
    library: Library,
    static_root: Arc<PathBuf>,
}

impl AppState {
    pub fn new(config: &ServerConfig, extractor: Arc<dyn Extractor>) -> Self {
        let library = Library::new(&config.library_dir);
        Self {
            direct: Arc::new(DirectFetcher::new(library.clone(), &config.user_agent)),
            extraction: Arc::new(ExtractionFetcher::new(library.clone(), extractor)),
            library,
            static_root: Arc::new(config.static_root.clone()),
        }
    }
}

/// Body of both POST endpoints. `url` is trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
}

impl DownloadRequest {
    pub fn from_body(body: &[u8]) -> FetchResult<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|err| FetchError::InvalidBody(format!("invalid JSON body: {err}")))?;
        let object = value
            .as_object()
            .ok_or_else(|| FetchError::InvalidBody("request body must be a JSON object".into()))?;
        let url = match object.get("url") {
            None => "",
            Some(Value::String(url)) => url.trim(),
            Some(_) => return Err(FetchError::InvalidBody("url must be a string".into())),
        };
        if url.is_empty() {
            return Err(FetchError::MissingUrl);
        }
        Ok(Self {
            url: url.to_string(),
        })
    }
}

/// `{"ok": ..., ...payload}`
#[derive(Debug, Serialize)]
struct Envelope<T> {
    ok: bool,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Serialize)]
struct LibraryListing {
    assets: Vec<AssetEntry>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        Self::new(err.status(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "ok": false,
            "error": self.message,
        });
        json_response(self.status, &body)
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Serializes `payload` with an explicit `Content-Length`.
fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Response {
    match serde_json::to_vec(payload) {
        Ok(bytes) => {
            let length = bytes.len();
            let mut response = (status, bytes).into_response();
            let headers = response.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
            response
        }
        Err(err) => {
            error!(error = %err, "failed to serialize response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/extract", post(extract_media).fallback(serve_static))
        .route("/api/fetch", post(fetch_direct).fallback(serve_static))
        .route("/api/library", get(list_library).fallback(serve_static))
        .fallback(serve_static)
        .layer(DefaultBodyLimit::disable())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn extract_media(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request = DownloadRequest::from_body(&body)?;
    info!(url = %request.url, "extract requested");
    let fetcher = state.extraction.clone();
    let extracted = run_blocking(move || fetcher.fetch(&request.url)).await?;
    Ok(json_response(
        StatusCode::OK,
        &Envelope {
            ok: true,
            body: extracted,
        },
    ))
}

async fn fetch_direct(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request = DownloadRequest::from_body(&body)?;
    info!(url = %request.url, "direct fetch requested");
    let fetcher = state.direct.clone();
    let response = match run_blocking(move || fetcher.fetch(&request.url)).await? {
        DirectOutcome::Stored(asset) => json_response(
            StatusCode::OK,
            &Envelope {
                ok: true,
                body: asset,
            },
        ),
        DirectOutcome::NotVideo(not_video) => json_response(
            StatusCode::OK,
            &Envelope {
                ok: false,
                body: not_video,
            },
        ),
    };
    Ok(response)
}

async fn list_library(State(state): State<AppState>) -> ApiResult<Response> {
    let library = state.library.clone();
    let assets = run_blocking(move || library.list().map_err(FetchError::from)).await?;
    Ok(json_response(
        StatusCode::OK,
        &Envelope {
            ok: true,
            body: LibraryListing { assets },
        },
    ))
}

async fn run_blocking<T, F>(job: F) -> ApiResult<T>
where
    F: FnOnce() -> FetchResult<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(job)
        .await
        .map_err(|err| ApiError::internal(format!("task join error: {err}")))?
        .map_err(|err| {
            warn!(error = %err, "request failed");
            ApiError::from(err)
        })
}

async fn serve_static(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> ApiResult<Response> {
    if method != Method::GET && method != Method::HEAD {
        return Err(ApiError::new(
            StatusCode::NOT_IMPLEMENTED,
            format!("unsupported method ('{method}')"),
        ));
    }

    let decoded =
        urlencoding::decode(uri.path()).map_err(|_| ApiError::not_found("file not found"))?;
    let path = match decoded.strip_prefix(LIBRARY_URL_PREFIX) {
        Some(rest) => safe_join(state.library.dir(), rest),
        None => safe_join(&state.static_root, &decoded),
    }
    .ok_or_else(|| ApiError::not_found("file not found"))?;

    stream_file(path, method == Method::HEAD).await
}

/// Joins a URL path below `root`, refusing anything that could climb out.
pub fn safe_join(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in relative.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => return None,
        }
    }
    Some(path)
}

async fn stream_file(mut path: PathBuf, head_only: bool) -> ApiResult<Response> {
    let mut metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    if metadata.is_dir() {
        path.push(INDEX_FILE);
        metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|_| ApiError::not_found("file not found"))?;
    }
    if !metadata.is_file() {
        return Err(ApiError::not_found("file not found"));
    }

    let mime = MimeGuess::from_path(&path).first_or_octet_stream();
    let body = if head_only {
        Body::empty()
    } else {
        let file = File::open(&path)
            .await
            .map_err(|_| ApiError::not_found("file not found"))?;
        Body::from_stream(ReaderStream::new(file))
    };

    Response::builder()
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CONTENT_LENGTH, metadata.len())
        .body(body)
        .map_err(|err| ApiError::internal(err.to_string()))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "handler panicked".to_string()
    };
    error!(panic = %detail, "request handler panicked");
    ApiError::internal(detail).into_response()
}

//! Read API over the catalog.
//!
//! | Route | Response |
//! |---|---|
//! | `GET /api/photos?page=&limit=` | one page of the catalog as [`PhotosResponse`] |
//! | `GET /api/photos/{filename}` | original photo bytes from the photos root |
//! | `GET /api/derivatives/{filename}` | compressed derivative or thumbnail bytes |
//! | `GET /healthz` | `ok` |
//!
//! Listing never fails on bad query input: `page` and `limit` are clamped.
//! File routes accept a single plain filename; anything that would resolve
//! outside the served directory is refused with 403.

use crate::catalog::{CatalogStore, StoreError};
use crate::config::AppConfig;
use crate::pagination::PageQuery;
use crate::types::{ErrorBody, PhotosResponse};
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Served files never change under the same name.
pub const CACHE_CONTROL: &str = "public, max-age=31536000";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("path escapes served directory: {0}")]
    PathTraversal(String),
    #[error("catalog unavailable: {0}")]
    Storage(#[from] StoreError),
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("task failed: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PathTraversal(_) => StatusCode::FORBIDDEN,
            ApiError::Storage(_) | ApiError::Io { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message. Internal detail stays in the log.
    pub fn public_message(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "Photo not found",
            ApiError::PathTraversal(_) => "Access denied",
            ApiError::Storage(_) | ApiError::Internal(_) => "Failed to read photo catalog",
            ApiError::Io { .. } => "Failed to read photo",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            debug!(error = %self, "request rejected");
        }
        let body = ErrorBody {
            status_code: status.as_u16(),
            status_message: self.public_message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CatalogStore>,
    /// Directory original photos are served from.
    pub photos_root: PathBuf,
    /// Directory compressed derivatives are served from.
    pub derivatives_root: PathBuf,
    pub default_limit: i64,
}

impl AppState {
    pub fn from_config(config: &AppConfig, source: &Path, store: Arc<CatalogStore>) -> Self {
        Self {
            store,
            photos_root: config.photos_root(source),
            derivatives_root: config.output_dir(source),
            default_limit: i64::from(config.server.default_limit),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/photos", get(list_photos))
        .route("/api/photos/:filename", get(photo_file))
        .route("/api/derivatives/:filename", get(derivative_file))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_photos(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<PhotosResponse>, ApiError> {
    let query = PageQuery::from_params(
        params.get("page").map(String::as_str),
        params.get("limit").map(String::as_str),
        state.default_limit,
    );
    // Snapshots may reload the artifact from disk.
    let store = Arc::clone(&state.store);
    let page = tokio::task::spawn_blocking(move || store.get_page(query.page, query.limit))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    debug!(page = page.page, limit = page.limit, items = page.items.len(), "page served");
    Ok(Json(PhotosResponse::from(page)))
}

async fn photo_file(
    State(state): State<AppState>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Response, ApiError> {
    serve_file(&state.photos_root, &filename).await
}

async fn derivative_file(
    State(state): State<AppState>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Response, ApiError> {
    serve_file(&state.derivatives_root, &filename).await
}

async fn serve_file(root: &Path, filename: &str) -> Result<Response, ApiError> {
    let path = resolve_within(root, filename).await?;
    let bytes = tokio::fs::read(&path).await.map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ApiError::NotFound(filename.to_string()),
        _ => ApiError::Io {
            path: path.clone(),
            source,
        },
    })?;

    let mut response = bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type(filename)),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL),
    );
    Ok(response)
}

/// Resolve `filename` under `root`, refusing anything that lands outside it.
///
/// The name must be a single normal path component. After that lexical check
/// the target is canonicalized so a symlink pointing out of `root` is refused
/// as well.
async fn resolve_within(root: &Path, filename: &str) -> Result<PathBuf, ApiError> {
    if !is_plain_filename(filename) {
        return Err(ApiError::PathTraversal(filename.to_string()));
    }
    let not_found = |_| ApiError::NotFound(filename.to_string());
    let root = tokio::fs::canonicalize(root).await.map_err(not_found)?;
    let target = tokio::fs::canonicalize(root.join(filename))
        .await
        .map_err(not_found)?;
    if !target.starts_with(&root) {
        return Err(ApiError::PathTraversal(filename.to_string()));
    }
    Ok(target)
}

fn is_plain_filename(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// MIME type by file extension.
pub fn content_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types() {
        assert_eq!(content_type("a.JPG"), "image/jpeg");
        assert_eq!(content_type("a.jpeg"), "image/jpeg");
        assert_eq!(content_type("a.png"), "image/png");
        assert_eq!(content_type("a.gif"), "image/gif");
        assert_eq!(content_type("a.webp"), "image/webp");
        assert_eq!(content_type("a.bmp"), "image/bmp");
        assert_eq!(content_type("a.tiff"), "application/octet-stream");
        assert_eq!(content_type("README"), "application/octet-stream");
    }

    #[test]
    fn plain_filenames() {
        assert!(is_plain_filename("a.jpg"));
        assert!(is_plain_filename(".hidden.jpg"));
        assert!(!is_plain_filename(""));
        assert!(!is_plain_filename(".."));
        assert!(!is_plain_filename("."));
        assert!(!is_plain_filename("../secret.jpg"));
        assert!(!is_plain_filename("nested/a.jpg"));
        assert!(!is_plain_filename("..\\windows.jpg"));
        assert!(!is_plain_filename("/etc/passwd"));
    }

    #[test]
    fn error_statuses_and_messages() {
        let cases = [
            (ApiError::NotFound("x".into()), 404, "Photo not found"),
            (ApiError::PathTraversal("x".into()), 403, "Access denied"),
            (
                ApiError::Storage(StoreError::Empty),
                500,
                "Failed to read photo catalog",
            ),
        ];
        for (err, status, message) in cases {
            assert_eq!(err.status().as_u16(), status);
            assert_eq!(err.public_message(), message);
        }
    }

    #[tokio::test]
    async fn symlink_out_of_root_is_refused() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("photos");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(tmp.path().join("secret.jpg"), b"s").unwrap();
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(tmp.path().join("secret.jpg"), root.join("link.jpg"))
                .unwrap();
            let result = resolve_within(&root, "link.jpg").await;
            assert!(matches!(result, Err(ApiError::PathTraversal(_))));
        }
        assert!(matches!(
            resolve_within(&root, "missing.jpg").await,
            Err(ApiError::NotFound(_))
        ));
    }
}

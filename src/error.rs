//! Error taxonomy for the fetch endpoints.

use axum::http::StatusCode;
use thiserror::Error;

pub type FetchResult<T> = std::result::Result<T, FetchError>;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("missing url")]
    MissingUrl,

    #[error("{0}")]
    InvalidBody(String),

    #[error("yt-dlp not installed")]
    ExtractorUnavailable,

    #[error("downloaded file not found")]
    NotFoundAfterDownload,

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// HTTP status the error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingUrl => StatusCode::BAD_REQUEST,
            Self::ExtractorUnavailable => StatusCode::NOT_IMPLEMENTED,
            Self::InvalidBody(_)
            | Self::NotFoundAfterDownload
            | Self::Upstream(_)
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

//! Plain HTTP downloads for URLs that already point at video bytes.

use std::io::Read;

use serde::Serialize;
use tracing::{debug, info};

use crate::{
    error::{FetchError, FetchResult},
    library::{Library, StoredAsset},
    naming::{guess_ext, is_video, unique_name},
};

/// Result of a direct fetch that reached the upstream server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectOutcome {
    /// The body was video content and now lives in the library.
    Stored(StoredAsset),
    /// The upstream answered with something other than video; nothing was written.
    NotVideo(NotVideo),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotVideo {
    #[serde(rename = "type")]
    pub content_type: String,
}

pub struct DirectFetcher {
    library: Library,
    agent: ureq::Agent,
    user_agent: String,
}

impl DirectFetcher {
    pub fn new(library: Library, user_agent: impl Into<String>) -> Self {
        Self {
            library,
            agent: ureq::AgentBuilder::new().build(),
            user_agent: user_agent.into(),
        }
    }

    /// Downloads `url` and keeps the body only when it is a video payload.
    ///
    /// Blocks for the whole transfer; there is no timeout and no retry.
    pub fn fetch(&self, url: &str) -> FetchResult<DirectOutcome> {
        let request = self.agent.get(url).set("User-Agent", &self.user_agent);
        let url_path = request
            .request_url()
            .map(|parsed| parsed.path().to_string())
            .unwrap_or_default();

        let response = request.call().map_err(describe_error)?;
        let content_type = response.header("Content-Type").unwrap_or("").to_string();

        if !is_video(&content_type) {
            info!(url, content_type = %content_type, "skipping non-video response");
            return Ok(DirectOutcome::NotVideo(NotVideo { content_type }));
        }

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|err| FetchError::upstream(err.to_string()))?;

        let name = unique_name(&guess_ext(&content_type, &url_path));
        let path = self.library.store(&name, &body)?;
        debug!(path = %path.display(), "stored direct download");
        info!(url, name = %name, size = body.len(), "fetched video");

        Ok(DirectOutcome::Stored(StoredAsset {
            path: Library::public_path(&name),
            size: body.len() as u64,
            mime: content_type,
        }))
    }
}

fn describe_error(err: ureq::Error) -> FetchError {
    match err {
        ureq::Error::Status(code, response) => {
            FetchError::upstream(format!("HTTP Error {}: {}", code, response.status_text()))
        }
        ureq::Error::Transport(transport) => FetchError::upstream(transport.to_string()),
    }
}

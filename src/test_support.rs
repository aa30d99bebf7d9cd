//! Shared fixtures for unit tests.

use std::{
    fs,
    net::SocketAddr,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use axum::Router;

use crate::{
    error::{FetchError, FetchResult},
    extract::{Extraction, Extractor},
};

/// Serves `router` on an ephemeral localhost port for the rest of the test.
pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Scripted [`Extractor`] that writes a canned file instead of downloading.
#[derive(Default)]
pub struct FakeExtractor {
    unavailable: bool,
    writes: Option<(String, Vec<u8>)>,
    reported: Option<String>,
    title: Option<String>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn writing(name: &str, bytes: &[u8]) -> Self {
        Self {
            writes: Some((name.to_string(), bytes.to_vec())),
            reported: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn reporting_only(name: &str) -> Self {
        Self {
            reported: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn reporting(mut self, name: &str) -> Self {
        self.reported = Some(name.to_string());
        self
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Extractor for FakeExtractor {
    fn available(&self) -> bool {
        !self.unavailable
    }

    fn extract(&self, _url: &str, library_dir: &Path) -> FetchResult<Extraction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(FetchError::upstream(message.clone()));
        }
        if let Some((name, bytes)) = &self.writes {
            fs::write(library_dir.join(name), bytes)?;
        }
        let reported = self.reported.as_deref().unwrap_or("missing.mp4");
        Ok(Extraction {
            filename: library_dir.join(reported),
            title: self.title.clone(),
        })
    }
}

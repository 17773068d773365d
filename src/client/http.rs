//! Blocking HTTP page fetcher.

use super::{ClientError, PageFetcher};
use crate::types::PhotosResponse;
use std::time::Duration;
use tracing::debug;

/// Fetches pages from `GET {base_url}/api/photos`.
pub struct HttpFetcher {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn photos_url(&self) -> String {
        format!("{}/api/photos", self.base_url)
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch_page(&mut self, page: i64, limit: i64) -> Result<PhotosResponse, ClientError> {
        let response = self
            .agent
            .get(&self.photos_url())
            .query("page", &page.to_string())
            .query("limit", &limit.to_string())
            .call()
            .map_err(classify)?;
        response.into_json().map_err(|e| {
            debug!(error = %e, "malformed photos response");
            ClientError::Network
        })
    }
}

fn classify(error: ureq::Error) -> ClientError {
    match error {
        ureq::Error::Status(status, _) => ClientError::from_status(status),
        ureq::Error::Transport(t) => {
            debug!(error = %t, "transport error");
            ClientError::Network
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let fetcher = HttpFetcher::new("http://localhost:3000/");
        assert_eq!(fetcher.photos_url(), "http://localhost:3000/api/photos");
    }

    #[test]
    fn unreachable_server_is_network_error() {
        let mut fetcher = HttpFetcher::new("http://127.0.0.1:9");
        assert_eq!(fetcher.fetch_page(1, 24), Err(ClientError::Network));
    }
}

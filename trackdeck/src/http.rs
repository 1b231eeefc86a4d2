//! HTTP client abstraction for testability.
//!
//! Style documents, sprites, glyphs and tiles are all fetched through
//! [`AsyncHttpClient`], so the style loader and the diagnostics probe can be
//! exercised against an in-memory client.

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::BoxFuture;

/// Errors from an HTTP GET.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HttpError {
    #[error("timeout")]
    Timeout,

    #[error("{0}")]
    Network(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

/// A completed response. Non-2xx statuses are not errors at this level.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for async HTTP GET operations.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    fn get(&self, url: &str) -> BoxFuture<'_, Result<HttpResponse, HttpError>>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with a per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("trackdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl AsyncHttpClient for ReqwestClient {
    fn get(&self, url: &str) -> BoxFuture<'_, Result<HttpResponse, HttpError>> {
        let request = self.client.get(url);
        Box::pin(async move {
            let response = request.send().await.map_err(map_reqwest_error)?;
            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(map_reqwest_error)?;
            Ok(HttpResponse { status, body })
        })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> HttpError {
    if error.is_timeout() {
        HttpError::Timeout
    } else {
        HttpError::Network(error.to_string())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    /// In-memory client keyed by exact URL. Unknown URLs answer 404.
    #[derive(Default)]
    pub struct MockHttpClient {
        responses: Mutex<HashMap<String, Result<HttpResponse, HttpError>>>,
        hanging: Mutex<HashSet<String>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(self, url: &str, body: impl Into<Bytes>) -> Self {
            self.responses
                .lock()
                .insert(url.to_string(), Ok(HttpResponse::ok(body)));
            self
        }

        pub fn with_status(self, url: &str, status: u16) -> Self {
            self.responses.lock().insert(
                url.to_string(),
                Ok(HttpResponse {
                    status,
                    body: Bytes::new(),
                }),
            );
            self
        }

        pub fn with_error(self, url: &str, error: HttpError) -> Self {
            self.responses.lock().insert(url.to_string(), Err(error));
            self
        }

        /// Requests for `url` never complete.
        pub fn with_hang(self, url: &str) -> Self {
            self.hanging.lock().insert(url.to_string());
            self
        }
    }

    impl AsyncHttpClient for MockHttpClient {
        fn get(&self, url: &str) -> BoxFuture<'_, Result<HttpResponse, HttpError>> {
            self.requests.lock().push(url.to_string());
            if self.hanging.lock().contains(url) {
                return Box::pin(std::future::pending());
            }
            let response = self.responses.lock().get(url).cloned().unwrap_or(Ok(
                HttpResponse {
                    status: 404,
                    body: Bytes::new(),
                },
            ));
            Box::pin(async move { response })
        }
    }

    #[tokio::test]
    async fn test_mock_client_success() {
        let mock = MockHttpClient::new().with("http://example.com/a", vec![1u8, 2, 3]);
        let response = mock.get("http://example.com/a").await.unwrap();
        assert!(response.is_success());
        assert_eq!(response.body.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_mock_client_unknown_url_is_404() {
        let mock = MockHttpClient::new();
        let response = mock.get("http://example.com/missing").await.unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
        assert_eq!(mock.requests.lock().len(), 1);
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(HttpError::Timeout.to_string(), "timeout");
    }
}

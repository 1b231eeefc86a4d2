//! Pull path: one-shot snapshot requests.

use reqwest::Client;
use tracing::debug;

use super::{FeedConfig, FeedError, FeedResult};
use crate::credential::Credential;
use crate::model::{FeedMode, TrackerSnapshot};
use crate::BoxFuture;

/// Something that can be asked for the current snapshot.
pub trait SnapshotSource: Send + Sync {
    /// Fetch the current snapshot for `mode`.
    fn fetch(&self, mode: FeedMode) -> BoxFuture<'_, FeedResult<TrackerSnapshot>>;
}

/// Pulls snapshots from `GET <base>/snapshot`.
///
/// The credential, when present, is sent as a bearer token.
pub struct HttpSnapshotSource {
    client: Client,
    config: FeedConfig,
    credential: Option<Credential>,
}

impl HttpSnapshotSource {
    pub fn new(config: FeedConfig, credential: Option<Credential>) -> FeedResult<Self> {
        // Validate the endpoint up front so a bad base URL fails at startup.
        config.snapshot_url(config.mode)?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("trackdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FeedError::Request(e.to_string()))?;

        Ok(Self {
            client,
            config,
            credential,
        })
    }
}

impl SnapshotSource for HttpSnapshotSource {
    fn fetch(&self, mode: FeedMode) -> BoxFuture<'_, FeedResult<TrackerSnapshot>> {
        Box::pin(async move {
            let url = self.config.snapshot_url(mode)?;
            let mut request = self.client.get(url.clone());
            if let Some(credential) = &self.credential {
                request = request.bearer_auth(credential.expose());
            }

            let response = request.send().await.map_err(map_request_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(FeedError::HttpStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            let body = response.bytes().await.map_err(map_request_error)?;
            let snapshot = TrackerSnapshot::from_json(&body)?;
            debug!(
                mode = %mode,
                points = snapshot.points.len(),
                "Fetched snapshot"
            );
            Ok(snapshot)
        })
    }
}

fn map_request_error(error: reqwest::Error) -> FeedError {
    if error.is_timeout() {
        FeedError::Timeout
    } else {
        FeedError::Request(error.to_string())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted source: each fetch pops the next `(delay, result)` pair, or
    /// returns `fallback` once the script is exhausted.
    pub struct MockSnapshotSource {
        script: Mutex<VecDeque<(Duration, FeedResult<TrackerSnapshot>)>>,
        fallback: FeedResult<TrackerSnapshot>,
        pub calls: AtomicUsize,
    }

    impl MockSnapshotSource {
        pub fn new(fallback: FeedResult<TrackerSnapshot>) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn then(self, delay: Duration, result: FeedResult<TrackerSnapshot>) -> Self {
            self.script.lock().push_back((delay, result));
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SnapshotSource for MockSnapshotSource {
        fn fetch(&self, _mode: FeedMode) -> BoxFuture<'_, FeedResult<TrackerSnapshot>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay, result) = self
                .script
                .lock()
                .pop_front()
                .unwrap_or((Duration::ZERO, self.fallback.clone()));
            Box::pin(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            })
        }
    }

    #[test]
    fn test_rejects_bad_endpoint_at_construction() {
        let result = HttpSnapshotSource::new(FeedConfig::new("gopher://x"), None);
        assert!(matches!(result, Err(FeedError::InvalidEndpoint(_))));
    }

    #[tokio::test]
    async fn test_mock_source_follows_script() {
        let source = MockSnapshotSource::new(Err(FeedError::Timeout))
            .then(Duration::ZERO, Ok(TrackerSnapshot::default().with_warning("x")));

        let first = source.fetch(FeedMode::Combined).await.unwrap();
        assert_eq!(first.warnings, vec!["x".to_string()]);
        assert_eq!(
            source.fetch(FeedMode::Combined).await,
            Err(FeedError::Timeout)
        );
        assert_eq!(source.call_count(), 2);
    }
}

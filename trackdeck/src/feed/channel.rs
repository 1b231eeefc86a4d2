//! Push path: a long-lived channel delivering whole snapshots.

use futures::stream::BoxStream;
use futures::{future, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use super::{FeedConfig, FeedError, FeedResult};
use crate::credential::Credential;
use crate::model::{FeedMode, TrackerSnapshot};
use crate::BoxFuture;

/// Inbound snapshots from an open push channel.
///
/// An `Err` item or the end of the stream means the channel is gone.
pub type SnapshotStream = BoxStream<'static, FeedResult<TrackerSnapshot>>;

/// Opens push channels.
pub trait PushConnector: Send + Sync {
    /// Open one channel for `mode`.
    fn connect(&self, mode: FeedMode) -> BoxFuture<'_, FeedResult<SnapshotStream>>;
}

/// WebSocket push channel at `ws(s)://<base>/stream`.
pub struct WebSocketConnector {
    config: FeedConfig,
    credential: Option<Credential>,
}

impl WebSocketConnector {
    pub fn new(config: FeedConfig, credential: Option<Credential>) -> Self {
        Self { config, credential }
    }
}

impl PushConnector for WebSocketConnector {
    fn connect(&self, mode: FeedMode) -> BoxFuture<'_, FeedResult<SnapshotStream>> {
        Box::pin(async move {
            let url = self.config.stream_url(mode, self.credential.as_ref())?;
            let host = url.host_str().unwrap_or_default().to_string();

            let (socket, response) = tokio::time::timeout(
                self.config.request_timeout,
                tokio_tungstenite::connect_async(url.as_str()),
            )
            .await
            .map_err(|_| FeedError::Timeout)?
            .map_err(|e| FeedError::Channel(e.to_string()))?;

            info!(
                host = %host,
                mode = %mode,
                status = response.status().as_u16(),
                "Push channel open"
            );

            Ok(socket.filter_map(|message| future::ready(decode_message(message))).boxed())
        })
    }
}

/// Turn one WebSocket frame into a stream item.
///
/// Control frames other than close are skipped. Malformed payloads surface
/// as errors, which end the channel.
fn decode_message(
    message: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<FeedResult<TrackerSnapshot>> {
    match message {
        Ok(Message::Text(text)) => Some(TrackerSnapshot::from_json(text.as_bytes()).map_err(Into::into)),
        Ok(Message::Binary(data)) => Some(TrackerSnapshot::from_json(&data).map_err(Into::into)),
        Ok(Message::Close(frame)) => {
            debug!(frame = ?frame, "Push channel close frame");
            Some(Err(FeedError::ChannelClosed))
        }
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => None,
        Err(e) => Some(Err(FeedError::Channel(e.to_string()))),
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use futures::channel::mpsc;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Connector handing out in-memory channels.
    ///
    /// Each `connect` consumes the next scripted outcome; an exhausted script
    /// fails with a channel error. Tests push snapshots through the returned
    /// senders.
    #[derive(Default)]
    pub struct MockPushConnector {
        script: Mutex<VecDeque<FeedResult<mpsc::UnboundedReceiver<FeedResult<TrackerSnapshot>>>>>,
        pub connects: AtomicUsize,
    }

    impl MockPushConnector {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script a successful connection and return its sender.
        pub fn accept(&self) -> mpsc::UnboundedSender<FeedResult<TrackerSnapshot>> {
            let (tx, rx) = mpsc::unbounded();
            self.script.lock().push_back(Ok(rx));
            tx
        }

        pub fn refuse(&self, error: FeedError) {
            self.script.lock().push_back(Err(error));
        }

        pub fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    impl PushConnector for MockPushConnector {
        fn connect(&self, _mode: FeedMode) -> BoxFuture<'_, FeedResult<SnapshotStream>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(FeedError::Channel("connection refused".to_string())));
            Box::pin(async move { next.map(|rx| rx.boxed()) })
        }
    }

    #[test]
    fn test_decode_text_frame() {
        let frame = Message::Text(
            r#"{"count":1,"warnings":[],"points":[{"id":"a","kind":"flight","lat":40,"lon":-70}]}"#
                .into(),
        );
        let snapshot = decode_message(Ok(frame)).unwrap().unwrap();
        assert_eq!(snapshot.points[0].id, "a");
    }

    #[test]
    fn test_decode_binary_frame() {
        let frame = Message::Binary(br#"{"count":0,"warnings":["no data"],"points":[]}"#.to_vec());
        let snapshot = decode_message(Ok(frame)).unwrap().unwrap();
        assert_eq!(snapshot.warnings, vec!["no data".to_string()]);
    }

    #[test]
    fn test_control_frames_are_skipped() {
        assert!(decode_message(Ok(Message::Ping(Vec::new()))).is_none());
        assert!(decode_message(Ok(Message::Pong(Vec::new()))).is_none());
    }

    #[test]
    fn test_malformed_and_close_end_the_channel() {
        assert!(matches!(
            decode_message(Ok(Message::Text("{oops".into()))),
            Some(Err(FeedError::Malformed(_)))
        ));
        assert!(matches!(
            decode_message(Ok(Message::Close(None))),
            Some(Err(FeedError::ChannelClosed))
        ));
    }

    #[tokio::test]
    async fn test_mock_connector_delivers() {
        let connector = MockPushConnector::new();
        let tx = connector.accept();
        let mut stream = connector.connect(FeedMode::Combined).await.unwrap();
        tx.unbounded_send(Ok(TrackerSnapshot::default())).unwrap();
        assert!(stream.next().await.unwrap().is_ok());
        drop(tx);
        assert!(stream.next().await.is_none());
        assert!(connector.connect(FeedMode::Combined).await.is_err());
        assert_eq!(connector.connect_count(), 2);
    }
}

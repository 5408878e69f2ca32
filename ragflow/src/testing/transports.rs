//! In-memory transports for controller tests.

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::adapter::BackendEvent;
use crate::errors::TransportError;
use crate::transport::{EventStream, RunRequest, StreamTransport};

#[derive(Debug)]
enum Script {
    Stream {
        items: Vec<Result<BackendEvent, TransportError>>,
        hang: bool,
    },
    OpenError(TransportError),
    StalledOpen,
}

/// A transport that replays queued scripts, one per `open` call.
///
/// Opening more runs than were scripted fails with a connect error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<RunRequest>>,
}

impl ScriptedTransport {
    /// Creates a transport with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a run that yields `events` and then ends.
    #[must_use]
    pub fn with_run(self, events: impl IntoIterator<Item = BackendEvent>) -> Self {
        self.push(Script::Stream {
            items: events.into_iter().map(Ok).collect(),
            hang: false,
        })
    }

    /// Queues a run that yields `events` and then never produces anything.
    #[must_use]
    pub fn with_hanging_run(self, events: impl IntoIterator<Item = BackendEvent>) -> Self {
        self.push(Script::Stream {
            items: events.into_iter().map(Ok).collect(),
            hang: true,
        })
    }

    /// Queues a run that yields `items` as they are, errors included, and then ends.
    #[must_use]
    pub fn with_items(
        self,
        items: impl IntoIterator<Item = Result<BackendEvent, TransportError>>,
    ) -> Self {
        self.push(Script::Stream {
            items: items.into_iter().collect(),
            hang: false,
        })
    }

    /// Queues a run that yields `events` and then breaks with `error`.
    #[must_use]
    pub fn with_broken_run(
        self,
        events: impl IntoIterator<Item = BackendEvent>,
        error: TransportError,
    ) -> Self {
        let mut items: Vec<_> = events.into_iter().map(Ok).collect();
        items.push(Err(error));
        self.push(Script::Stream { items, hang: false })
    }

    /// Queues a run whose request cannot be issued.
    #[must_use]
    pub fn with_open_error(self, error: TransportError) -> Self {
        self.push(Script::OpenError(error))
    }

    /// Queues a run whose `open` call never returns.
    #[must_use]
    pub fn with_stalled_open(self) -> Self {
        self.push(Script::StalledOpen)
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().clone()
    }

    /// Number of `open` calls so far.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn push(self, script: Script) -> Self {
        self.scripts.lock().push_back(script);
        self
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn open(&self, request: RunRequest) -> Result<EventStream, TransportError> {
        self.requests.lock().push(request);
        let script = self
            .scripts
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::Connect("no scripted run left".to_string()))?;

        match script {
            Script::OpenError(error) => Err(error),
            Script::StalledOpen => futures::future::pending().await,
            Script::Stream { items, hang: false } => Ok(stream::iter(items).boxed()),
            Script::Stream { items, hang: true } => {
                Ok(stream::iter(items).chain(stream::pending()).boxed())
            }
        }
    }
}

/// Feeds events into one stream opened by a [`ChannelTransport`].
#[derive(Debug, Clone)]
pub struct StreamSender {
    request: RunRequest,
    tx: mpsc::UnboundedSender<Result<BackendEvent, TransportError>>,
}

impl StreamSender {
    /// The request that opened this stream.
    #[must_use]
    pub fn request(&self) -> &RunRequest {
        &self.request
    }

    /// Sends an event. Returns false once the consumer dropped the stream.
    pub fn send(&self, event: BackendEvent) -> bool {
        self.tx.unbounded_send(Ok(event)).is_ok()
    }

    /// Breaks the stream with a transport error.
    pub fn fail(&self, error: TransportError) -> bool {
        self.tx.unbounded_send(Err(error)).is_ok()
    }

    /// Ends the stream without a terminal event.
    pub fn close(&self) {
        self.tx.close_channel();
    }

    /// Returns true once the consumer dropped the stream.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A transport whose streams are fed by the test, one channel per `open`.
#[derive(Debug)]
pub struct ChannelTransport {
    opened_tx: tokio::sync::mpsc::UnboundedSender<StreamSender>,
    opened_rx: tokio::sync::Mutex<tokio::sync::mpsc::UnboundedReceiver<StreamSender>>,
}

impl Default for ChannelTransport {
    fn default() -> Self {
        let (opened_tx, opened_rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            opened_tx,
            opened_rx: tokio::sync::Mutex::new(opened_rx),
        }
    }
}

impl ChannelTransport {
    /// Creates a transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the next stream to be opened.
    pub async fn next_stream(&self) -> Option<StreamSender> {
        self.opened_rx.lock().await.recv().await
    }
}

#[async_trait]
impl StreamTransport for ChannelTransport {
    async fn open(&self, request: RunRequest) -> Result<EventStream, TransportError> {
        let (tx, rx) = mpsc::unbounded();
        self.opened_tx
            .send(StreamSender { request, tx })
            .map_err(|_| TransportError::Closed)?;
        Ok(rx.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::RunId;
    use crate::testing::run_config;

    fn request() -> RunRequest {
        RunRequest::new(RunId::new(), "q", run_config(&[]))
    }

    #[tokio::test]
    async fn test_scripted_transport_replays_in_order() {
        let transport = ScriptedTransport::new()
            .with_run([BackendEvent::chunk("a"), BackendEvent::Done])
            .with_open_error(TransportError::Status {
                status: 503,
                body: "busy".to_string(),
            });

        let events: Vec<_> = transport.open(request()).await.unwrap().collect().await;
        assert_eq!(events.len(), 2);

        let err = transport.open(request()).await.err().unwrap();
        assert!(matches!(err, TransportError::Status { status: 503, .. }));

        assert!(transport.open(request()).await.is_err());
        assert_eq!(transport.open_count(), 3);
    }

    #[tokio::test]
    async fn test_channel_transport_detects_dropped_stream() {
        let transport = ChannelTransport::new();
        let mut stream = transport.open(request()).await.unwrap();
        let sender = transport.next_stream().await.unwrap();

        assert!(sender.send(BackendEvent::chunk("x")));
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            BackendEvent::chunk("x")
        );

        drop(stream);
        assert!(sender.is_closed());
        assert!(!sender.send(BackendEvent::Done));
    }
}

//! HTTP transport: POST the run request, read the response as SSE.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::ACCEPT;
use std::collections::VecDeque;
use tracing::{debug, warn};

use super::{EventStream, RunRequest, SseDecoder, StreamTransport};
use crate::config::SseTransportConfig;
use crate::errors::TransportError;

/// Streams backend events over HTTP Server-Sent-Events.
///
/// Dropping the returned stream drops the response body, which closes the
/// connection.
#[derive(Debug, Clone)]
pub struct HttpSseTransport {
    client: reqwest::Client,
    config: SseTransportConfig,
}

impl HttpSseTransport {
    /// Creates a transport for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] if the HTTP client cannot be built.
    pub fn new(config: SseTransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Gets the transport configuration.
    #[must_use]
    pub fn config(&self) -> &SseTransportConfig {
        &self.config
    }
}

#[async_trait]
impl StreamTransport for HttpSseTransport {
    async fn open(&self, request: RunRequest) -> Result<EventStream, TransportError> {
        let endpoint = self.config.endpoint();
        debug!(run_id = %request.run_id, endpoint = %endpoint, "Opening event stream");

        let mut builder = self
            .client
            .post(&endpoint)
            .header(ACCEPT, "text/event-stream")
            .json(&request.body());
        for (key, value) in &self.config.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Backend rejected run request");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = Box::pin(response.bytes_stream());
        let events = stream::unfold(
            (bytes, SseDecoder::new(), VecDeque::new(), false),
            |(mut bytes, mut decoder, mut pending, mut done)| async move {
                loop {
                    if let Some(item) = pending.pop_front() {
                        return Some((item, (bytes, decoder, pending, done)));
                    }
                    if done {
                        return None;
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                        Some(Err(e)) => {
                            done = true;
                            pending.push_back(Err(TransportError::Stream(e.to_string())));
                        }
                        None => {
                            done = true;
                            pending.extend(decoder.finish());
                        }
                    }
                }
            },
        );
        Ok(events.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_keeps_config() {
        let config = SseTransportConfig::new("http://localhost:9")
            .with_header("authorization", "Bearer token");
        let transport = HttpSseTransport::new(config.clone()).unwrap();
        assert_eq!(transport.config(), &config);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_connect_error() {
        let config = SseTransportConfig::new("http://127.0.0.1:9");
        let transport = HttpSseTransport::new(config).unwrap();
        let request = RunRequest::new(
            crate::controller::RunId::new(),
            "q",
            crate::testing::run_config(&[]),
        );

        let err = transport.open(request).await.err().unwrap();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}

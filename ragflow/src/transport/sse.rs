//! Incremental Server-Sent-Events decoding.

use tracing::trace;

use crate::adapter::BackendEvent;
use crate::errors::TransportError;

const DONE_SENTINEL: &str = "[DONE]";

/// Decodes an SSE byte stream into backend events.
///
/// Bytes may arrive split anywhere, including inside a line or a UTF-8
/// sequence. Each frame's `data:` lines are joined and parsed as one JSON
/// event; a frame's `event:` name stands in for a missing `"type"` field.
/// A `data: [DONE]` frame decodes to [`BackendEvent::Done`].
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no line break.
    scanned: usize,
    data: Vec<String>,
    event_name: Option<String>,
}

impl SseDecoder {
    /// Creates a decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds bytes and returns every event they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<BackendEvent, TransportError>> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buffer[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            let line = strip_cr(&self.buffer[start..end]).to_vec();
            self.line(line, &mut out);
            start = end + 1;
            from = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        out
    }

    /// Flushes a trailing line and frame at end of stream.
    pub fn finish(&mut self) -> Vec<Result<BackendEvent, TransportError>> {
        let mut out = Vec::new();
        self.scanned = 0;
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            let line = strip_cr(&line).to_vec();
            self.line(line, &mut out);
        }
        self.dispatch(&mut out);
        out
    }

    fn line(&mut self, line: Vec<u8>, out: &mut Vec<Result<BackendEvent, TransportError>>) {
        let line = match String::from_utf8(line) {
            Ok(line) => line,
            Err(e) => {
                out.push(Err(TransportError::Decode(format!("invalid UTF-8: {e}"))));
                return;
            }
        };

        if line.is_empty() {
            self.dispatch(out);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event_name = Some(value.to_string()),
            other => trace!(field = other, "Ignoring SSE field"),
        }
    }

    fn dispatch(&mut self, out: &mut Vec<Result<BackendEvent, TransportError>>) {
        let event_name = self.event_name.take();
        if self.data.is_empty() {
            return;
        }
        let payload = std::mem::take(&mut self.data).join("\n");
        if payload.trim() == DONE_SENTINEL {
            out.push(Ok(BackendEvent::Done));
            return;
        }
        out.push(decode_event(&payload, event_name));
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn decode_event(payload: &str, event_name: Option<String>) -> Result<BackendEvent, TransportError> {
    let mut value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| TransportError::Decode(format!("{e}: {payload}")))?;

    if let (Some(object), Some(name)) = (value.as_object_mut(), event_name) {
        if !object.contains_key("type") && name != "message" {
            object.insert("type".to_string(), serde_json::Value::String(name));
        }
    }

    serde_json::from_value(value).map_err(|e| TransportError::Decode(format!("{e}: {payload}")))
}

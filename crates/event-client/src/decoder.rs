//! Incremental `text/event-stream` decoder.
//!
//! Chunks arrive at arbitrary byte boundaries, so bytes are buffered until a
//! blank line completes a frame. Only complete frames are turned into text.

use crate::error::ClientError;
use shared_types::BusEvent;
use serde_json::Value;

/// One decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A frame made only of `:` comment lines (heartbeats).
    Comment(String),
    /// A frame with at least one `data` line.
    Message {
        event: Option<String>,
        id: Option<String>,
        data: String,
    },
}

/// Largest incomplete frame held before the stream is treated as broken.
pub const DEFAULT_MAX_PENDING: usize = 1024 * 1024;

/// Buffers raw bytes and yields complete frames.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a frame end.
    scanned: usize,
    max_pending: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that fails once more than `max_pending` bytes wait for a frame end.
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_pending,
        }
    }

    /// Feed a chunk; returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, ClientError> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(end) = find_frame_end(&self.buffer, self.scanned.max(consumed)) {
            let text = std::str::from_utf8(&self.buffer[consumed..end])
                .map_err(|e| ClientError::Decode(format!("frame is not utf-8: {e}")))?;
            if let Some(frame) = parse_frame(text) {
                frames.push(frame);
            }
            consumed = end + 2;
        }
        self.buffer.drain(..consumed);
        // A trailing '\n' may be the first half of the next separator.
        self.scanned = self.buffer.len().saturating_sub(1);

        if self.buffer.len() > self.max_pending {
            return Err(ClientError::Decode(format!(
                "no frame end within {} bytes",
                self.max_pending
            )));
        }
        Ok(frames)
    }

    /// Bytes held back waiting for the end of a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Index of the next `\n\n` at or after `from`.
fn find_frame_end(buffer: &[u8], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .windows(2)
        .position(|w| w == b"\n\n")
        .map(|at| from + at)
}

fn parse_frame(text: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut id = None;
    let mut data: Option<String> = None;
    let mut comment: Option<String> = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix(':') {
            comment.get_or_insert_with(|| rest.trim_start().to_string());
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => match data.as_mut() {
                Some(buf) => {
                    buf.push('\n');
                    buf.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            "event" => event = Some(value.to_string()),
            "id" => id = Some(value.to_string()),
            _ => {}
        }
    }

    match data {
        Some(data) => Some(SseFrame::Message { event, id, data }),
        None => comment.map(SseFrame::Comment),
    }
}

/// Decode a frame payload: one event object, or an array of them.
pub fn decode_events(data: &str) -> Result<Vec<BusEvent>, ClientError> {
    let value: Value =
        serde_json::from_str(data).map_err(|e| ClientError::Decode(e.to_string()))?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(|e| ClientError::Decode(e.to_string())))
            .collect(),
        other => serde_json::from_value(other)
            .map(|event| vec![event])
            .map_err(|e| ClientError::Decode(e.to_string())),
    }
}

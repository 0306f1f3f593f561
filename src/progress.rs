//! Progress stream decoding.
//!
//! The service pushes one server-sent event per status change on
//! `GET /progress/<client_id>`. Each event's data is a JSON object
//! `{"message": "..."}`. Messages are best-effort telemetry: they can be late,
//! duplicated or missing entirely, and the outcome of a job never depends on
//! them.

use std::pin::Pin;
use std::sync::LazyLock;
use std::task::{Context, Poll};

use futures::Stream;
use futures::stream::BoxStream;
use regex::Regex;
use serde::Deserialize;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").expect("valid regex"));

const DOWNLOAD_MARKER: &str = "[download]";
const COMPLETE_MARKER: &str = "100%";

/// A decoded progress message.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// Transfer is underway at the given percentage.
    Downloading(f64),
    /// Transfer finished; the server is post-processing and sending the file.
    Processing,
    /// Any other status text, already truncated for display.
    Status(String),
}

impl ProgressUpdate {
    /// Classifies a raw status message.
    ///
    /// `100%` anywhere wins over a percentage token, and a parsed percentage
    /// of 100 or more (`100.0%`) counts as complete too, so the final
    /// `[download]` line is reported as [`ProgressUpdate::Processing`].
    #[must_use]
    pub fn from_message(message: &str, max_chars: usize) -> Self {
        if message.contains(COMPLETE_MARKER) {
            return Self::Processing;
        }
        if message.contains(DOWNLOAD_MARKER) {
            if let Some(pct) = PERCENT_RE
                .captures(message)
                .and_then(|c| c[1].parse::<f64>().ok())
            {
                return if pct >= 100.0 {
                    Self::Processing
                } else {
                    Self::Downloading(pct)
                };
            }
        }
        Self::Status(truncate_chars(message, max_chars))
    }
}

/// Truncates `s` to at most `max` characters, respecting char boundaries.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[derive(Deserialize)]
struct ProgressMessage {
    #[serde(default)]
    message: Option<String>,
}

/// Decodes the data field of one event.
///
/// Malformed JSON and messages without text are dropped.
#[must_use]
pub fn decode_event_data(data: &str, max_chars: usize) -> Option<ProgressUpdate> {
    match serde_json::from_str::<ProgressMessage>(data) {
        Ok(ProgressMessage {
            message: Some(message),
        }) if !message.is_empty() => Some(ProgressUpdate::from_message(&message, max_chars)),
        Ok(_) => None,
        Err(e) => {
            log::debug!("Dropping undecodable progress event: {e}");
            None
        }
    }
}

/// Incremental decoder for the `text/event-stream` framing.
///
/// Bytes are fed in as they arrive; complete events come out as the joined
/// contents of their `data:` lines.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the data of every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // Comments (":...") and other fields (event, id, retry) are ignored.
        }

        events
    }
}

/// A subscription to one job's progress messages.
///
/// The stream ends when the server closes the channel or on the first
/// transport error; it is never reopened. Dropping it closes the underlying
/// connection.
pub struct ProgressStream {
    inner: BoxStream<'static, ProgressUpdate>,
}

impl ProgressStream {
    /// Wraps any stream of updates.
    #[must_use]
    pub fn new(inner: BoxStream<'static, ProgressUpdate>) -> Self {
        Self { inner }
    }

    /// A stream that never yields anything.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Box::pin(futures::stream::empty()))
    }
}

impl Stream for ProgressStream {
    type Item = ProgressUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ProgressStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStream").finish_non_exhaustive()
    }
}

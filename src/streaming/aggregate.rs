//! Chat-completion stream aggregation
//!
//! Collapses an SSE body of `data: <json>` frames into the concatenated text
//! of `choices[0].delta.content` / `choices[0].delta.reasoning_content`.
//! The body is read line by line and every `data:` line is one frame, blank
//! separator or not. The stream ends at `data: [DONE]` or when the body ends.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::error::{ImageGenError, Result};

/// SSE `data` payload that ends the stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Field prefix of a frame line; other SSE fields are ignored.
pub const DATA_PREFIX: &str = "data:";

/// What a single `data:` payload contributes to the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// End-of-stream marker.
    Done,
    /// Text fragment to append.
    Delta(String),
    /// Explicit error frame; aborts the stream.
    Error(String),
    /// Nothing to collect (empty delta, keep-alive, malformed frame).
    Skip,
}

/// Classify one `data:` payload.
pub fn classify_frame(payload: &str) -> StreamFrame {
    let data = payload.trim();
    if data.is_empty() {
        return StreamFrame::Skip;
    }
    if data == DONE_MARKER {
        return StreamFrame::Done;
    }

    match serde_json::from_str::<Value>(data) {
        Ok(chunk) => {
            if let Some(error) = chunk.get("error") {
                return StreamFrame::Error(error.to_string());
            }
            let delta = chunk
                .get("choices")
                .and_then(Value::as_array)
                .and_then(|choices| choices.first())
                .and_then(|choice| choice.get("delta"));
            let Some(delta) = delta else {
                return StreamFrame::Skip;
            };

            let mut text = String::new();
            for key in ["content", "reasoning_content"] {
                if let Some(fragment) = delta.get(key).and_then(Value::as_str) {
                    text.push_str(fragment);
                }
            }
            if text.is_empty() {
                StreamFrame::Skip
            } else {
                StreamFrame::Delta(text)
            }
        }
        Err(e) => match recover_error_frame(data) {
            Some(error) => StreamFrame::Error(error),
            None => {
                tracing::debug!(
                    target: "pixelrelay::stream",
                    err = %e,
                    "skipping non-JSON frame: {}",
                    truncate(data, 100)
                );
                StreamFrame::Skip
            }
        },
    }
}

/// Best-effort recovery of an error payload from a frame that is not valid JSON.
///
/// Only frames that textually contain `error` are considered. The outermost
/// `{...}` slice is re-parsed; an `error` field in it is returned. This may
/// miss oddly formatted error frames and may match benign text, so it is kept
/// separate from the aggregation loop.
pub fn recover_error_frame(raw: &str) -> Option<String> {
    if !raw.contains("error") {
        return None;
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: Value = serde_json::from_str(&raw[start..=end]).ok()?;
    value.get("error").map(Value::to_string)
}

/// Aggregate an SSE byte stream into the concatenated delta text.
///
/// Transport errors are returned unchanged so the caller can classify them
/// for retry; an error frame aborts with [`ImageGenError::StreamError`] and
/// no partial content.
pub async fn aggregate_sse_text<S, B>(byte_stream: S) -> Result<String>
where
    S: Stream<Item = Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    let byte_stream = byte_stream.map(|chunk| {
        chunk
            .map(|bytes| Bytes::copy_from_slice(bytes.as_ref()))
            .map_err(std::io::Error::other)
    });
    let mut lines = FramedRead::new(StreamReader::new(byte_stream), LinesCodec::new());
    let mut collected = String::new();

    while let Some(line) = lines.next().await {
        let line = line.map_err(line_error)?;
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            continue;
        };
        match classify_frame(payload) {
            StreamFrame::Done => return Ok(collected),
            StreamFrame::Delta(text) => collected.push_str(&text),
            StreamFrame::Error(error) => {
                return Err(ImageGenError::StreamError(error));
            }
            StreamFrame::Skip => {}
        }
    }

    Ok(collected)
}

/// Transport errors come back out of the reader as they went in.
fn line_error(err: LinesCodecError) -> ImageGenError {
    match err {
        LinesCodecError::Io(io) => {
            let message = io.to_string();
            match io.into_inner().map(|inner| inner.downcast::<ImageGenError>()) {
                Some(Ok(original)) => *original,
                _ => ImageGenError::StreamError(format!("SSE read error: {message}")),
            }
        }
        LinesCodecError::MaxLineLengthExceeded => {
            ImageGenError::StreamError("SSE line too long".into())
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

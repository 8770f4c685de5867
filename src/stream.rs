//! Stream frame decoder: turn a chunked response body into protocol events.
//!
//! ## Wire grammar
//!
//! The backend speaks a small subset of Server-Sent Events:
//!
//! ```text
//! data: first line of a chunk       ┐
//! data: second line of the chunk    ├─ one frame → Content("first…\nsecond…")
//!                                   ┘  (blank line terminates the frame)
//! data: No API key configured.      ┐
//! event: error                      ├─ Error("No API key configured.")
//!                                   ┘
//! event: done                       ┐
//! data: [DONE]                      ├─ Sentinel
//!                                   ┘
//! ```
//!
//! ## Why buffer bytes instead of text?
//!
//! Network chunks split wherever TCP pleases, including in the middle of a
//! multi-byte UTF-8 sequence. Buffering raw bytes and decoding only complete
//! frames means a split character is reassembled before decoding, and a
//! genuinely invalid sequence is reported once, against the frame it lives in.

use crate::error::ExplainError;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, trace};

const FRAME_DELIMITER: &[u8] = b"\n\n";
const DATA_PREFIX: &str = "data: ";
const ERROR_MARKER: &str = "event: error";
const SENTINEL: &str = "[DONE]";

/// One decoded unit of the response stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum ProtocolEvent {
    /// Text to append to the active answer.
    Content(String),
    /// Server-reported failure; terminates the request.
    Error(String),
    /// Explicit end-of-content marker. Carries no text.
    Sentinel,
}

/// Incremental frame decoder with a carry-over buffer.
///
/// Feed chunks with [`push`](Self::push) and drain complete frames with
/// [`next_event`](Self::next_event). Whatever follows the last blank line
/// stays buffered until more bytes arrive.
///
/// Consumed frames are only cut off the buffer on the next `push`, and the
/// delimiter search resumes where the previous one stopped, so each byte is
/// scanned and moved a bounded number of times.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Start of the first unconsumed frame.
    start: usize,
    /// Where the next delimiter search begins; never before `start`.
    scan: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk to the carry-over buffer.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.scan -= self.start;
            self.start = 0;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// Number of bytes held back as an incomplete frame.
    pub fn pending(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Pop the next event from the complete frames buffered so far.
    ///
    /// Frames without data lines are skipped. Returns `None` once only an
    /// incomplete frame (or nothing) remains.
    pub fn next_event(&mut self) -> Option<Result<ProtocolEvent, ExplainError>> {
        loop {
            let Some(offset) = find_delimiter(&self.buf[self.scan..]) else {
                // A delimiter may straddle the next chunk boundary.
                self.scan = self
                    .buf
                    .len()
                    .saturating_sub(FRAME_DELIMITER.len() - 1)
                    .max(self.start);
                return None;
            };
            let end = self.scan + offset;
            let frame_start = self.start;
            self.start = end + FRAME_DELIMITER.len();
            self.scan = self.start;

            let text = match std::str::from_utf8(&self.buf[frame_start..end]) {
                Ok(text) => text,
                Err(e) => {
                    return Some(Err(ExplainError::StreamDecode {
                        detail: format!("invalid UTF-8 in frame: {e}"),
                    }))
                }
            };
            trace!("frame: {:?}", text);
            if let Some(event) = parse_frame(text) {
                return Some(Ok(event));
            }
        }
    }

    /// Consume the decoder at end of stream, returning how many bytes of an
    /// unterminated trailing frame were dropped.
    pub fn finish(self) -> usize {
        self.pending()
    }
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(FRAME_DELIMITER.len())
        .position(|w| w == FRAME_DELIMITER)
}

/// Classify a single complete frame (without its terminating blank line).
///
/// Returns `None` for frames that carry no data lines.
pub fn parse_frame(frame: &str) -> Option<ProtocolEvent> {
    let mut is_error = false;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in frame.split('\n') {
        if line == ERROR_MARKER {
            is_error = true;
        } else if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
            data_lines.push(rest);
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    let payload = data_lines.join("\n");
    if payload == SENTINEL {
        Some(ProtocolEvent::Sentinel)
    } else if is_error {
        Some(ProtocolEvent::Error(payload))
    } else {
        Some(ProtocolEvent::Content(payload))
    }
}

/// A boxed stream of decoded events.
pub type EventStream<'a> = Pin<Box<dyn Stream<Item = Result<ProtocolEvent, ExplainError>> + Send + 'a>>;

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: FrameDecoder,
    idle: Option<Duration>,
    finished: bool,
}

/// Lazily decode a response body into [`ProtocolEvent`]s.
///
/// Each call starts a fresh decoder; a stream cannot be resumed midway. The
/// sequence ends after the body ends or after the first error item (a
/// transport failure while reading a chunk, or an undecodable frame).
pub fn decode_stream<'a, S, B, E>(body: S) -> EventStream<'a>
where
    S: Stream<Item = Result<B, E>> + Send + 'a,
    B: AsRef<[u8]> + Send + 'a,
    E: Display + Send + 'a,
{
    decode_stream_with_idle(body, None)
}

/// [`decode_stream`] with a bound on the silence between two body chunks.
///
/// The timer restarts on every chunk, including chunks that only carry
/// keep-alive frames or part of a long frame. Running out of it yields a
/// [`ExplainError::Transport`] item and ends the sequence.
pub fn decode_stream_with_idle<'a, S, B, E>(body: S, idle: Option<Duration>) -> EventStream<'a>
where
    S: Stream<Item = Result<B, E>> + Send + 'a,
    B: AsRef<[u8]> + Send + 'a,
    E: Display + Send + 'a,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: FrameDecoder::new(),
        idle,
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        if st.finished {
            return None;
        }
        loop {
            if let Some(item) = st.decoder.next_event() {
                if item.is_err() {
                    st.finished = true;
                }
                return Some((item, st));
            }

            let next = match st.idle {
                Some(idle) => match tokio::time::timeout(idle, st.body.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        st.finished = true;
                        let err = ExplainError::Transport {
                            detail: format!("no data for {idle:?}"),
                        };
                        return Some((Err(err), st));
                    }
                },
                None => st.body.next().await,
            };

            match next {
                Some(Ok(chunk)) => {
                    let bytes = chunk.as_ref();
                    debug!("received chunk of {} bytes", bytes.len());
                    st.decoder.push(bytes);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    let err = ExplainError::Transport {
                        detail: format!("reading response body: {e}"),
                    };
                    return Some((Err(err), st));
                }
                None => {
                    let dropped = std::mem::take(&mut st.decoder).finish();
                    if dropped > 0 {
                        debug!("discarding {} bytes of unterminated trailing frame", dropped);
                    }
                    return None;
                }
            }
        }
    }))
}

use crate::error::CommonRequestError;
use async_stream::try_stream;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream::BoxStream};
use log::{debug, trace, warn};
use serde_json::Value;

/// Payload that marks the producer-side end of a reply
pub const DONE_SENTINEL: &str = "[DONE]";

/// Prefix carried by every meaningful record line
pub const DATA_PREFIX: &str = "data: ";

/// One logical line of the relay stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record<'a> {
    /// `:`-prefixed heartbeat or comment
    Comment,
    /// Empty or whitespace-only line
    Blank,
    /// Anything without the `data: ` prefix (`event:`, `id:`, noise)
    Ignored,
    /// `data: [DONE]`
    Done,
    /// Trimmed payload of a `data: ` line
    Data(&'a str),
}

impl<'a> Record<'a> {
    /// Classify a line taken from the pending buffer, without its `\n`.
    pub fn classify(line: &'a str) -> Self {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.starts_with(':') {
            return Record::Comment;
        }
        if line.trim().is_empty() {
            return Record::Blank;
        }

        let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
            return Record::Ignored;
        };

        match rest.trim() {
            DONE_SENTINEL => Record::Done,
            payload => Record::Data(payload),
        }
    }
}

/// Decoder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Accumulating bytes; pending may hold a partial line
    AwaitingLine,
    /// `[DONE]` seen or end-of-stream reached
    Done,
}

/// Holds back a multi-byte UTF-8 sequence split across chunk boundaries.
#[derive(Debug, Default)]
struct Utf8Carry {
    /// Leading bytes of a sequence still waiting for its continuation
    tail: Vec<u8>,
}

impl Utf8Carry {
    /// Append the decodable part of `tail + chunk` to `out`
    fn decode_into(&mut self, chunk: &[u8], out: &mut String) {
        let mut bytes = std::mem::take(&mut self.tail);
        bytes.extend_from_slice(chunk);

        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete sequence at the end, wait for the next chunk
                            self.tail = after.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Bytes held back
    fn len(&self) -> usize {
        self.tail.len()
    }

    /// Drop the held-back bytes
    fn clear(&mut self) {
        self.tail.clear();
    }
}

/// Incremental decoder turning relay byte chunks into text deltas.
///
/// Lines are cut at `\n` from the front of a pending buffer. A `data: ` line
/// whose JSON does not parse is assumed to be truncated: it is pushed back to
/// the front of the buffer and line extraction stops until the next chunk.
/// A line that is malformed rather than truncated therefore blocks every later
/// line until the stream ends; [`ChunkDecoder::with_pending_limit`] turns that
/// into an error instead.
#[derive(Debug)]
pub struct ChunkDecoder {
    /// Decoded text not yet consumed as a line
    pending: String,
    /// Split UTF-8 sequence carried into the next chunk
    utf8: Utf8Carry,
    /// Lifecycle state
    state: DecoderState,
    /// Most bytes allowed behind a pushed-back line
    pending_limit: Option<usize>,
    /// The last chunk stopped on a line that failed to parse
    held_back: bool,
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkDecoder {
    /// Decoder without a pending limit, waiting for the first line
    pub fn new() -> Self {
        Self {
            pending: String::new(),
            utf8: Utf8Carry::default(),
            state: DecoderState::AwaitingLine,
            pending_limit: None,
            held_back: false,
        }
    }

    /// Decoder that fails once more than `limit` bytes are stuck behind a
    /// `data: ` line that failed to parse.
    ///
    /// Lines that are merely still arriving are never counted, so the result
    /// does not depend on how the input is split into chunks.
    pub fn with_pending_limit(limit: usize) -> Self {
        Self {
            pending_limit: Some(limit),
            ..Self::new()
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Whether `[DONE]` or end-of-stream has been reached
    pub fn is_done(&self) -> bool {
        self.state == DecoderState::Done
    }

    /// Text received but not yet consumed as a complete line
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Feed one chunk and collect the deltas it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, CommonRequestError> {
        let mut deltas = Vec::new();
        self.feed_into(chunk, &mut deltas)?;
        Ok(deltas)
    }

    /// Like [`ChunkDecoder::feed`], but deltas decoded before an error are kept in `out`.
    pub fn feed_into(
        &mut self,
        chunk: &[u8],
        out: &mut Vec<String>,
    ) -> Result<(), CommonRequestError> {
        if self.is_done() {
            trace!("Discarding {} bytes received after end of reply", chunk.len());
            return Ok(());
        }

        self.held_back = false;
        self.utf8.decode_into(chunk, &mut self.pending);

        while let Some(newline) = self.pending.find('\n') {
            let raw: String = self.pending.drain(..=newline).collect();
            let line = &raw[..newline];
            let line = line.strip_suffix('\r').unwrap_or(line);

            match Record::classify(line) {
                Record::Comment | Record::Blank => {}
                Record::Ignored => trace!("Skipping non-data line: {line}"),
                Record::Done => {
                    debug!("Reply complete");
                    self.state = DecoderState::Done;
                    self.pending.clear();
                    self.utf8.clear();
                    break;
                }
                Record::Data(payload) => match serde_json::from_str::<Value>(payload) {
                    Ok(json) => {
                        if let Some(text) = delta_content(&json) {
                            out.push(text.to_string());
                        }
                    }
                    Err(err) => {
                        warn!("Holding back data line that failed to parse ({err}), waiting for more input");
                        let mut restored = String::with_capacity(line.len() + 1 + self.pending.len());
                        restored.push_str(line);
                        restored.push('\n');
                        restored.push_str(&self.pending);
                        self.pending = restored;
                        self.held_back = true;
                        break;
                    }
                },
            }
        }

        // Once a line is held back nothing behind it is consumed, so the
        // blocked text only grows and the check fires at the same input
        // regardless of chunking.
        if let (Some(limit), true) = (self.pending_limit, self.held_back) {
            let pending = self.pending.len();
            if pending > limit {
                self.finish();
                return Err(CommonRequestError::PendingOverflow { pending, limit });
            }
        }

        Ok(())
    }

    /// Signal end-of-stream. Returns how many unconsumed bytes were dropped.
    pub fn finish(&mut self) -> usize {
        let discarded = self.pending.len() + self.utf8.len();
        self.pending.clear();
        self.utf8.clear();
        self.state = DecoderState::Done;
        self.held_back = false;
        discarded
    }
}

/// `choices[0].delta.content`, when it is a non-empty string
fn delta_content(json: &Value) -> Option<&str> {
    json.pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}

/// Drive a [`ChunkDecoder`] over a byte stream, yielding text deltas.
///
/// Each chunk is fully drained before the next one is awaited. After `[DONE]`
/// the remaining chunks are read and dropped until the stream ends.
pub fn decode_deltas<S, E>(
    byte_stream: S,
    mut decoder: ChunkDecoder,
) -> BoxStream<'static, Result<String, CommonRequestError>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<CommonRequestError> + Send + 'static,
{
    Box::pin(try_stream! {
        let mut byte_stream = Box::pin(byte_stream);
        let mut deltas = Vec::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = chunk_result.map_err(Into::<CommonRequestError>::into)?;
            let fed = decoder.feed_into(&chunk, &mut deltas);

            for delta in std::mem::take(&mut deltas) {
                yield delta;
            }
            fed?;
        }

        let discarded = decoder.finish();
        if discarded > 0 {
            debug!("Stream ended with {discarded} bytes of unterminated input, discarding");
        }
    })
}

/// Decode the body of a successful relay response
pub fn decode_response(
    response: reqwest::Response,
    decoder: ChunkDecoder,
) -> BoxStream<'static, Result<String, CommonRequestError>> {
    decode_deltas(response.bytes_stream(), decoder)
}

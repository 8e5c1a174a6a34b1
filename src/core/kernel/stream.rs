use crate::core::errors::PipelineError;
use crate::core::types::StreamState;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Callbacks of a streaming call.
///
/// `on_chunk` may fire any number of times, in byte-arrival order. Exactly one
/// of `on_complete` / `on_error` fires afterwards, exactly once.
pub trait StreamHandler: Send {
    fn on_chunk(&mut self, chunk: String);
    fn on_complete(&mut self);
    fn on_error(&mut self, error: PipelineError);
}

/// Incremental UTF-8 decoder.
///
/// A multi-byte character split across two reads is held back until the rest
/// arrives; invalid sequences are an error rather than replacement characters.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `carry + bytes` as forms complete characters
    pub fn decode(&mut self, bytes: &[u8]) -> Result<String, PipelineError> {
        self.carry.extend_from_slice(bytes);

        match std::str::from_utf8(&self.carry) {
            Ok(text) => {
                let text = text.to_string();
                self.carry.clear();
                Ok(text)
            }
            Err(e) if e.error_len().is_none() => {
                // incomplete trailing sequence; keep it for the next read
                let valid = e.valid_up_to();
                let tail = self.carry.split_off(valid);
                let head = std::mem::replace(&mut self.carry, tail);
                String::from_utf8(head)
                    .map_err(|e| PipelineError::Decode(format!("Invalid UTF-8: {}", e)))
            }
            Err(e) => {
                self.carry.clear();
                Err(PipelineError::Decode(format!("Invalid UTF-8: {}", e)))
            }
        }
    }

    /// Close the decoder; leftover bytes mean the stream ended mid-character
    pub fn finish(&mut self) -> Result<(), PipelineError> {
        if self.carry.is_empty() {
            Ok(())
        } else {
            let pending = self.carry.len();
            self.carry.clear();
            Err(PipelineError::Decode(format!(
                "Stream ended inside a multi-byte character ({} dangling bytes)",
                pending
            )))
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.carry.is_empty()
    }
}

/// Drives one streaming call from `Connecting` to a terminal state.
#[derive(Debug)]
pub struct StreamReader {
    state: StreamState,
    decoder: Utf8Decoder,
    chunks: usize,
}

impl Default for StreamReader {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReader {
    pub fn new() -> Self {
        Self {
            state: StreamState::Idle,
            decoder: Utf8Decoder::new(),
            chunks: 0,
        }
    }

    pub const fn state(&self) -> StreamState {
        self.state
    }

    fn transition(&mut self, next: StreamState) {
        debug!(from = %self.state, to = %next, chunks = self.chunks, "stream state");
        self.state = next;
    }

    /// Mark the start of the connection phase
    pub fn connecting(&mut self) {
        self.transition(StreamState::Connecting);
    }

    /// End the call before any body was read (connect failure or cancel)
    pub fn abort<H: StreamHandler + ?Sized>(
        &mut self,
        error: PipelineError,
        handler: &mut H,
    ) -> StreamState {
        self.finish_with_error(error, handler)
    }

    fn finish_with_error<H: StreamHandler + ?Sized>(
        &mut self,
        error: PipelineError,
        handler: &mut H,
    ) -> StreamState {
        let next = if error.is_cancellation() {
            StreamState::Cancelled
        } else {
            StreamState::Failed
        };
        self.transition(next);
        handler.on_error(error);
        next
    }

    /// Pull the body until it ends, fails, or `cancel` fires.
    ///
    /// Cancellation is checked before every read and wins over a ready chunk.
    #[instrument(skip_all)]
    pub async fn run<S, H>(
        &mut self,
        mut body: S,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> StreamState
    where
        S: Stream<Item = Result<bytes::Bytes, PipelineError>> + Unpin,
        H: StreamHandler + ?Sized,
    {
        self.transition(StreamState::Streaming);

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return self.finish_with_error(PipelineError::Cancelled, handler);
                }
                next = body.next() => next,
            };

            match next {
                Some(Ok(bytes)) => match self.decoder.decode(&bytes) {
                    Ok(text) if text.is_empty() => {}
                    Ok(text) => {
                        self.chunks += 1;
                        handler.on_chunk(text);
                    }
                    Err(e) => return self.finish_with_error(e, handler),
                },
                Some(Err(e)) => return self.finish_with_error(e, handler),
                None => {
                    if let Err(e) = self.decoder.finish() {
                        return self.finish_with_error(e, handler);
                    }
                    self.transition(StreamState::Completed);
                    handler.on_complete();
                    return StreamState::Completed;
                }
            }
        }
    }
}

/// Event form of the [`StreamHandler`] callbacks.
#[derive(Debug)]
pub enum StreamEvent {
    Chunk(String),
    Complete,
    Error(PipelineError),
}

/// Handler that forwards callbacks into an mpsc channel, for callers that
/// prefer to pull events as a sequence.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: StreamEvent) {
        // receiver gone means nobody is listening any more
        let _ = self.tx.send(event);
    }
}

impl StreamHandler for ChannelHandler {
    fn on_chunk(&mut self, chunk: String) {
        self.send(StreamEvent::Chunk(chunk));
    }

    fn on_complete(&mut self) {
        self.send(StreamEvent::Complete);
    }

    fn on_error(&mut self, error: PipelineError) {
        self.send(StreamEvent::Error(error));
    }
}

//! Chat Chunk Streaming
//!
//! Provider-agnostic chunk types and the channel-backed stream that carries
//! them. Every provider's `chat` operation produces a `ChatStream`: a finite,
//! non-restartable sequence of `Text` chunks terminated by a single `Done`
//! chunk.
//!
//! The stream is a bounded producer/consumer channel: the provider task
//! pushes chunks, the caller pulls one at a time with `next()`. There is no
//! cancellation token — dropping the `ChatStream` closes the channel and the
//! producer observes the send failure on its next push.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Channel capacity for chat streams. Producing suspends once the consumer
/// falls this many chunks behind.
const CHAT_CHANNEL_CAPACITY: usize = 64;

/// A single chunk of a streamed chat response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatChunk {
    /// Text content delta from the model
    Text { content: String },

    /// Terminal chunk. No further chunks follow.
    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
}

impl ChatChunk {
    /// Create a text chunk
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Create a terminal chunk
    pub fn done(stop_reason: Option<String>) -> Self {
        Self::Done { stop_reason }
    }

    /// Whether this is the terminal chunk
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// Producer half of a chat stream, held by the provider task.
pub struct ChatStreamSender {
    tx: mpsc::Sender<ChatChunk>,
}

impl ChatStreamSender {
    /// Push a text chunk. Returns false if the consumer has gone away.
    pub async fn text(&self, content: impl Into<String>) -> bool {
        self.tx.send(ChatChunk::text(content)).await.is_ok()
    }

    /// Push the terminal chunk, consuming the sender so nothing can follow it.
    pub async fn done(self, stop_reason: Option<String>) -> bool {
        self.tx.send(ChatChunk::done(stop_reason)).await.is_ok()
    }
}

/// Consumer half of a chat stream.
///
/// Finite and non-restartable: once `Done` has been yielded (or the producer
/// has gone away), `next()` returns `None` forever. Consumption is
/// single-threaded cooperative — the caller pulls one chunk at a time and
/// producing the next chunk may suspend on network I/O.
pub struct ChatStream {
    rx: mpsc::Receiver<ChatChunk>,
    finished: bool,
}

impl ChatStream {
    /// Pull the next chunk. Returns `None` after the terminal `Done` chunk
    /// has been yielded, or if the producer dropped without sending one.
    pub async fn next(&mut self) -> Option<ChatChunk> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(chunk) => {
                if chunk.is_done() {
                    self.finished = true;
                }
                Some(chunk)
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// Drain the stream to completion and concatenate all text content.
    pub async fn collect_text(mut self) -> String {
        let mut out = String::new();
        while let Some(chunk) = self.next().await {
            if let ChatChunk::Text { content } = chunk {
                out.push_str(&content);
            }
        }
        out
    }
}

/// Create a connected chat stream pair.
pub fn chat_channel() -> (ChatStreamSender, ChatStream) {
    let (tx, rx) = mpsc::channel(CHAT_CHANNEL_CAPACITY);
    (
        ChatStreamSender { tx },
        ChatStream {
            rx,
            finished: false,
        },
    )
}

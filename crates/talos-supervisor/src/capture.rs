//! Console output capture for the function process.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::warn;

/// Ordered, generation-stamped line buffer shared between a capture task and
/// its readers.
///
/// Appends, resets, and snapshots all take the same lock, so a reset for a
/// new invocation and a late line from the previous one cannot interleave
/// mid-operation: a captured line lands either in the old generation or the
/// new one, never in between.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    inner: Arc<RwLock<BufferInner>>,
}

#[derive(Debug, Default)]
struct BufferInner {
    generation: u64,
    lines: Vec<String>,
}

impl LogBuffer {
    /// Create an empty buffer at generation 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one captured line to the current generation.
    pub fn append(&self, line: impl Into<String>) {
        self.inner.write().lines.push(line.into());
    }

    /// Discard all captured lines and start a new generation.
    ///
    /// Returns the new generation number.
    pub fn reset(&self) -> u64 {
        let mut inner = self.inner.write();
        inner.lines.clear();
        inner.generation += 1;
        inner.generation
    }

    /// Snapshot the current generation and its ordered lines.
    pub fn snapshot(&self) -> LogSnapshot {
        let inner = self.inner.read();
        LogSnapshot {
            generation: inner.generation,
            lines: inner.lines.clone(),
        }
    }

    /// The current generation number.
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }
}

/// A point-in-time view of a [`LogBuffer`].
///
/// The generation identifies which invocation's output the lines belong to;
/// comparing generations across reads tells a caller whether a reset
/// happened in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSnapshot {
    /// Generation the lines were captured under.
    pub generation: u64,
    /// Captured lines, in stream order.
    pub lines: Vec<String>,
}

/// Read a child process stream line by line into `buffer` until end of
/// stream.
///
/// Lines are split on line-feed boundaries; a trailing partial line at end
/// of stream is appended as a final entry.
pub(crate) async fn capture_lines<R>(stream: R, buffer: LogBuffer)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => buffer.append(line),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "error reading function process stream");
                break;
            }
        }
    }
}

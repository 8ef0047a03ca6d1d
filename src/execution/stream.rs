//! Pull-based decoder for newline-delimited tool output.

use super::StreamEvent;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 8 * 1024;

/// One decoded line of tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRecord {
    /// A recognised stream-json message.
    Event(StreamEvent),
    /// A line that is not stream-json, such as plain diagnostics.
    Raw(String),
}

/// Yields one [`StreamRecord`] per complete line read from `reader`.
///
/// Bytes after the last newline stay buffered until more data arrives; at
/// end of input any remaining partial line is emitted as a final record.
/// Blank lines are skipped.
#[derive(Debug)]
pub struct EventStream<R> {
    reader: R,
    buffer: Vec<u8>,
    finished: bool,
}

impl<R: AsyncRead + Unpin> EventStream<R> {
    /// Wraps `reader`.
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Returns the next record, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised by the underlying reader.
    pub async fn next_record(&mut self) -> io::Result<Option<StreamRecord>> {
        loop {
            if let Some(idx) = self.buffer.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = self.buffer.drain(..=idx).collect();
                if let Some(record) = decode_line(&line_bytes) {
                    return Ok(Some(record));
                }
                continue;
            }
            if self.finished {
                let rest = std::mem::take(&mut self.buffer);
                if rest.is_empty() {
                    return Ok(None);
                }
                if let Some(record) = decode_line(&rest) {
                    return Ok(Some(record));
                }
                continue;
            }
            self.buffer.reserve(READ_CHUNK);
            let read = self.reader.read_buf(&mut self.buffer).await?;
            if read == 0 {
                self.finished = true;
            }
        }
    }
}

fn decode_line(bytes: &[u8]) -> Option<StreamRecord> {
    let text = String::from_utf8_lossy(bytes);
    let line = text.trim();
    if line.is_empty() {
        return None;
    }
    Some(StreamEvent::parse(line).map_or_else(
        || StreamRecord::Raw(line.to_owned()),
        StreamRecord::Event,
    ))
}

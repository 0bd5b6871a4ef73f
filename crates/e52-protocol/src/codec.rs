//! Line assembly for the raw UART stream.
//!
//! The module terminates its output with `\r\n`, but bytes arrive in
//! arbitrary chunks. [`LineAssembler`] accumulates chunks and yields complete,
//! decoded, trimmed lines. Decoding is best-effort: invalid UTF-8 sequences
//! are replaced rather than treated as fatal, so a corrupt byte on the air
//! never stalls the stream.

use bytes::BytesMut;

/// Initial buffer capacity; module lines are short.
pub const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Accumulates raw UART bytes and produces decoded text lines.
#[derive(Debug, Default)]
pub struct LineAssembler {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl LineAssembler {
    /// Create a new line assembler.
    pub fn new() -> Self {
        LineAssembler {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next complete line from the buffer.
    ///
    /// Returns `Some(line)` with the decoded, trimmed text of the next line
    /// terminated by `\r` or `\n`, or `None` if no complete line is buffered.
    /// Lines that are empty after trimming are skipped.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let end = self.buffer.iter().position(|&b| b == b'\r' || b == b'\n')?;

            let line_data = self.buffer.split_to(end);
            let line = String::from_utf8_lossy(&line_data).trim().to_string();

            // Skip the newline character(s).
            while !self.buffer.is_empty()
                && (self.buffer[0] == b'\r' || self.buffer[0] == b'\n')
            {
                let _ = self.buffer.split_to(1);
            }

            if !line.is_empty() {
                return Some(line);
            }
        }
    }

    /// Get the number of buffered bytes (a trailing partial line).
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

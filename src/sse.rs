//! Server-Sent Events splitting for streamed backend responses.
//!
//! Handles buffering of incomplete lines across network chunks; turning a
//! `data:` payload into an event is left to an [`SseEventParser`].

use bytes::Bytes;

/// Backend-specific interpretation of one SSE `data:` payload.
pub trait SseEventParser: Send + Sync {
    type Event;

    fn parse_data(&self, data: &str) -> Self::Event;

    /// Whether the payload marks the end of the stream.
    fn is_done(&self, data: &str) -> bool {
        data == "[DONE]"
    }
}

pub struct SseParser<P: SseEventParser> {
    buffer: String,
    pending: Vec<u8>,
    parser: P,
}

impl<P: SseEventParser> SseParser<P> {
    pub fn new(parser: P) -> Self {
        Self {
            buffer: String::new(),
            pending: Vec::new(),
            parser,
        }
    }

    /// Feed a chunk of bytes and return one entry per complete `data:` event.
    ///
    /// A multi-byte character split across chunks is held back until the rest
    /// of it arrives.
    pub fn parse_chunk(&mut self, bytes: &Bytes) -> Vec<P::Event> {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                self.buffer.push_str(text);
                self.pending.clear();
            }
            Err(e) => {
                let valid = e.valid_up_to();
                self.buffer
                    .push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                self.pending.drain(..valid);
                if e.error_len().is_some() {
                    // invalid, not truncated
                    self.pending.clear();
                }
            }
        }

        let mut results = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim().to_string();
            self.buffer.drain(..=newline_pos);
            results.extend(self.parse_line(&line));
        }
        results
    }

    /// Process whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Vec<P::Event> {
        let line = std::mem::take(&mut self.buffer);
        self.parse_line(line.trim()).into_iter().collect()
    }

    fn parse_line(&self, line: &str) -> Option<P::Event> {
        let data = line.strip_prefix("data:")?.trim_start();
        if self.parser.is_done(data) {
            return None;
        }
        Some(self.parser.parse_data(data))
    }
}

//! Incremental decoder for OpenAI-style Server-Sent Events streams.
//!
//! The body arrives as arbitrary byte chunks. Chunks are decoded to UTF-8
//! without splitting multi-byte sequences, buffered until a newline, and
//! each complete `data: ` line is parsed as a chat-completion chunk.

use log::warn;
use serde::Deserialize;

const DATA_PREFIX: &str = "data: ";
const DONE_LINE: &str = "data: [DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A non-empty `choices[0].delta.content` fragment.
    Delta(String),
    /// The `data: [DONE]` terminator.
    Done,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending_bytes: Vec<u8>,
    /// Text after the last newline.
    line_buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk and return the events from every line it
    /// completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let text = self.decode(chunk);
        self.line_buffer.push_str(&text);

        let mut events = Vec::new();
        while let Some(newline_pos) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=newline_pos).collect();
            if let Some(event) = parse_line(&line[..newline_pos]) {
                events.push(event);
            }
        }
        events
    }

    /// Flush at end of stream: invalid trailing bytes become U+FFFD and an
    /// unterminated last line is parsed as if it were complete.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if !self.pending_bytes.is_empty() {
            let rest = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.pending_bytes.clear();
            self.line_buffer.push_str(&rest);
        }

        let line = std::mem::take(&mut self.line_buffer);
        parse_line(&line).into_iter().collect()
    }

    fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending_bytes.extend_from_slice(chunk);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending_bytes.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending_bytes[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending_bytes.drain(..valid + len);
                        }
                        None => {
                            // Incomplete sequence; wait for the next chunk.
                            self.pending_bytes.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }
}

/// Interpret one complete line. Anything that is not a `data: ` line with
/// usable content yields `None`.
pub fn parse_line(line: &str) -> Option<SseEvent> {
    let line = line.strip_suffix('\r').unwrap_or(line);

    if line == DONE_LINE {
        return Some(SseEvent::Done);
    }

    let payload = line.strip_prefix(DATA_PREFIX)?;
    if payload.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<CompletionChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map(SseEvent::Delta),
        Err(e) => {
            warn!("[llm-client] Failed to parse SSE data: {} ({})", line, e);
            None
        }
    }
}

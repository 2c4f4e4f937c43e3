//! Incremental decoder for the chat stream.
//!
//! Network chunks can split frames, lines and even UTF-8 sequences anywhere,
//! so bytes are buffered until a complete frame (terminated by a blank line)
//! is available. LF, CRLF and bare CR line endings are accepted, even when a
//! CRLF pair is split across chunks. Lines other than `data:` are ignored.

use crate::relay::sse::{DONE_MARKER, TextFrame};

use super::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Done,
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending_bytes: Vec<u8>,
    buffer: String,
    /// Last character seen was a CR, so a leading LF belongs to it.
    after_cr: bool,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the end-of-stream marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one network chunk and return the frames it completed.
    /// Nothing is returned after the end-of-stream marker.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, ClientError> {
        if self.done {
            return Ok(Vec::new());
        }

        self.pending_bytes.extend_from_slice(chunk);
        let valid_up_to = match std::str::from_utf8(&self.pending_bytes) {
            Ok(_) => self.pending_bytes.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(err) => {
                return Err(ClientError::Decode(format!("stream is not valid UTF-8: {err}")));
            }
        };
        let decoded: Vec<u8> = self.pending_bytes.drain(..valid_up_to).collect();
        self.append_normalized(&String::from_utf8_lossy(&decoded));

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_block(&block)? {
                let is_done = frame == Frame::Done;
                frames.push(frame);
                if is_done {
                    self.done = true;
                    self.buffer.clear();
                    break;
                }
            }
        }

        Ok(frames)
    }

    /// Append text with every line ending rewritten to LF.
    fn append_normalized(&mut self, text: &str) {
        for ch in text.chars() {
            match ch {
                '\n' if self.after_cr => {}
                '\r' => self.buffer.push('\n'),
                other => self.buffer.push(other),
            }
            self.after_cr = ch == '\r';
        }
    }

    /// Call once the response body ends. Fails unless the marker was seen.
    pub fn finish(&self) -> Result<(), ClientError> {
        if self.done {
            Ok(())
        } else {
            Err(ClientError::StreamClosed)
        }
    }
}

fn parse_block(block: &str) -> Result<Option<Frame>, ClientError> {
    let mut data_lines = Vec::new();
    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if data_lines.is_empty() {
        return Ok(None);
    }

    let data = data_lines.join("\n");
    if data == DONE_MARKER {
        return Ok(Some(Frame::Done));
    }

    let frame: TextFrame = serde_json::from_str(&data)
        .map_err(|e| ClientError::Decode(format!("malformed frame {data:?}: {e}")))?;
    Ok(Some(Frame::Text(frame.text)))
}

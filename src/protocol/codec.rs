// ============================================================================
// Wire Codec
// JSON frames delimited by newline or NUL
// ============================================================================

use super::messages::{Request, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },
}

pub fn decode_request(frame: &[u8]) -> Result<Request, ProtocolError> {
    Ok(serde_json::from_slice(frame)?)
}

/// Serialized response followed by the `\n` terminator
pub fn encode_response(response: &Response) -> Result<Vec<u8>, ProtocolError> {
    let mut bytes = serde_json::to_vec(response)?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn is_terminator(byte: &u8) -> bool {
    matches!(byte, b'\n' | b'\0')
}

/// Incremental splitter for a byte stream of request frames
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_frame_len: usize,
    /// Set after an oversized frame was reported but before its terminator
    /// arrived; bytes are dropped until then
    discarding: bool,
}

impl FrameDecoder {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_len,
            discarding: false,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete frame, terminator stripped. Blank frames are skipped.
    ///
    /// An oversized frame is reported once and dropped up to and including
    /// its terminator, even when the rest of it arrives in later chunks, so
    /// decoding resumes at the following frame.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        loop {
            let Some(end) = self.buffer.iter().position(is_terminator) else {
                if self.discarding {
                    self.buffer.clear();
                } else if self.buffer.len() > self.max_frame_len {
                    self.buffer.clear();
                    self.discarding = true;
                    return Err(ProtocolError::FrameTooLarge {
                        limit: self.max_frame_len,
                    });
                }
                return Ok(None);
            };

            let mut frame: Vec<u8> = self.buffer.drain(..=end).collect();
            frame.pop();

            if self.discarding {
                self.discarding = false;
                continue;
            }

            if frame.len() > self.max_frame_len {
                return Err(ProtocolError::FrameTooLarge {
                    limit: self.max_frame_len,
                });
            }
            if frame.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(frame));
        }
    }

    /// Unterminated trailing bytes, for when the peer closes mid-frame
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        let rest = std::mem::take(&mut self.buffer);
        if std::mem::take(&mut self.discarding) || rest.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(rest)
        }
    }
}

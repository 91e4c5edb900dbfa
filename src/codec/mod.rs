// src/codec/mod.rs
// Framing codec: envelopes <-> bytes on the executor's stdio streams

mod content_length;
mod newline;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::Envelope;

/// Failure to recover one frame from the stream.
///
/// Each error covers exactly one frame; the decoder has already discarded the
/// offending bytes, so later frames are unaffected.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed JSON in frame ({len} bytes): {source}")]
    Json {
        len: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid frame header: {0}")]
    InvalidHeader(String),

    #[error("frame header has no Content-Length")]
    MissingContentLength,

    /// Declared or observed size is over the limit; the frame is skipped
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
}

/// Largest frame body accepted from the executor unless configured otherwise
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Wire discipline used on one channel. The two are never mixed on a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// One JSON document per `\n`-terminated line
    #[default]
    Newline,
    /// LSP-style `Content-Length: <n>\r\n\r\n<body>`
    ContentLength,
}

impl Framing {
    /// Serialize an envelope into one complete frame
    pub fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, serde_json::Error> {
        let body = serde_json::to_vec(envelope)?;
        Ok(match self {
            Framing::Newline => newline::encode(body),
            Framing::ContentLength => content_length::encode(body),
        })
    }

    /// Fresh decoder with its own buffer and the default frame limit
    pub fn decoder(&self) -> FrameDecoder {
        FrameDecoder::new(*self, DEFAULT_MAX_FRAME_BYTES)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Framing::Newline => "newline",
            Framing::ContentLength => "content-length",
        }
    }
}

/// Incremental decoder holding partially received frames across chunks.
///
/// Buffered bytes never grow much past `max_frame_bytes`: an oversized frame
/// is reported once and then discarded until the next frame boundary.
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    buf: Vec<u8>,
    limits: Limits,
}

/// Size limit plus the skip state left behind by an oversized frame
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    pub(crate) max_frame_bytes: usize,
    pub(crate) discarding: bool,
}

impl FrameDecoder {
    pub fn new(framing: Framing, max_frame_bytes: usize) -> Self {
        Self {
            framing,
            buf: Vec::new(),
            limits: Limits {
                max_frame_bytes,
                discarding: false,
            },
        }
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Append a chunk and extract every complete frame, in stream order
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<Envelope, DecodeError>> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let consumed = match self.framing {
            Framing::Newline => newline::extract(&self.buf, &mut self.limits, &mut frames),
            Framing::ContentLength => {
                content_length::extract(&self.buf, &mut self.limits, &mut frames)
            }
        };
        self.buf.drain(..consumed);
        frames
    }
}

/// Parse one frame body into an envelope
fn decode_body(body: &[u8]) -> Result<Envelope, DecodeError> {
    serde_json::from_slice(body).map_err(|source| DecodeError::Json {
        len: body.len(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok_frames(results: Vec<Result<Envelope, DecodeError>>) -> Vec<Envelope> {
        results.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_framing_parses_from_config_strings() {
        let newline: Framing = serde_json::from_value(json!("newline")).unwrap();
        let lsp: Framing = serde_json::from_value(json!("content-length")).unwrap();
        assert_eq!(newline, Framing::Newline);
        assert_eq!(lsp, Framing::ContentLength);
        assert_eq!(Framing::default(), Framing::Newline);
    }

    #[test]
    fn test_newline_encode_appends_terminator() {
        let env = Envelope::response(json!({"ok": true}), "1");
        let bytes = Framing::Newline.encode(&env).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[test]
    fn test_content_length_header_counts_bytes_not_chars() {
        let env = Envelope::response(json!({"city": "Ciudad Juárez"}), "1");
        let bytes = Framing::ContentLength.encode(&env).unwrap();
        let body = serde_json::to_vec(&env).unwrap();
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        assert!(bytes.starts_with(header.as_bytes()));
        assert_eq!(bytes.len(), header.len() + body.len());
    }

    #[test]
    fn test_decoder_round_trips_both_disciplines() {
        let first = Envelope::request("tools/call", json!({"name": "test"}), "a");
        let second = Envelope::response(json!({"content": []}), "a");

        for framing in [Framing::Newline, Framing::ContentLength] {
            let mut stream = framing.encode(&first).unwrap();
            stream.extend(framing.encode(&second).unwrap());

            let mut decoder = framing.decoder();
            let frames = ok_frames(decoder.feed(&stream));
            assert_eq!(frames, vec![first.clone(), second.clone()], "{:?}", framing);
            assert_eq!(decoder.buffered(), 0);
        }
    }

    #[test]
    fn test_partial_frame_is_retained() {
        let env = Envelope::response(json!({"value": 42}), "x");
        for framing in [Framing::Newline, Framing::ContentLength] {
            let bytes = framing.encode(&env).unwrap();
            let (head, tail) = bytes.split_at(bytes.len() / 2);

            let mut decoder = framing.decoder();
            assert!(decoder.feed(head).is_empty());
            assert_eq!(decoder.buffered(), head.len());
            assert_eq!(ok_frames(decoder.feed(tail)), vec![env.clone()]);
        }
    }

    #[test]
    fn test_oversized_frame_skipped_then_stream_resumes() {
        let after = Envelope::response(json!({"n": 1}), "after");
        for framing in [Framing::Newline, Framing::ContentLength] {
            let mut decoder = FrameDecoder::new(framing, 64);
            let oversized = match framing {
                Framing::Newline => {
                    let mut line = vec![b'x'; 100];
                    line.push(b'\n');
                    line
                }
                Framing::ContentLength => b"Content-Length: 1000000000\r\n\r\n{}".to_vec(),
            };

            let mut frames = decoder.feed(&oversized);
            frames.extend(decoder.feed(&framing.encode(&after).unwrap()));

            assert_eq!(frames.len(), 2, "{:?}", framing);
            assert!(matches!(frames[0], Err(DecodeError::FrameTooLarge { max: 64, .. })));
            assert_eq!(frames[1].as_ref().unwrap(), &after);
            assert_eq!(decoder.buffered(), 0);
        }
    }

    #[test]
    fn test_unterminated_line_does_not_grow_buffer() {
        let mut decoder = FrameDecoder::new(Framing::Newline, 32);
        let first = decoder.feed(&[b'x'; 40]);
        assert!(matches!(first[0], Err(DecodeError::FrameTooLarge { len: 40, max: 32 })));
        assert_eq!(decoder.buffered(), 0);

        // Still inside the oversized line: dropped silently
        assert!(decoder.feed(&[b'y'; 40]).is_empty());
        assert_eq!(decoder.buffered(), 0);

        let frames = decoder.feed(b"zz\n{\"id\":\"1\"}\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap().id(), Some("1"));
    }

    #[test]
    fn test_non_object_json_is_a_decode_error() {
        let mut decoder = Framing::Newline.decoder();
        let frames = decoder.feed(b"42\n");
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], Err(DecodeError::Json { .. })));
    }
}

// src/codec/content_length.rs
// LSP-style Content-Length header framing

use super::{DecodeError, Limits, decode_body};
use crate::protocol::Envelope;

const HEADER_END: &[u8] = b"\r\n\r\n";
const LENGTH_HEADER: &[u8] = b"content-length";
/// Header block size after which a missing terminator is treated as garbage
const MAX_HEADER_BYTES: usize = 8 * 1024;

pub(super) fn encode(body: Vec<u8>) -> Vec<u8> {
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    let mut frame = Vec::with_capacity(header.len() + body.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend(body);
    frame
}

/// Pull every complete frame out of `buf`; returns bytes consumed.
///
/// A frame is complete once its header terminator and `n` body bytes are
/// buffered. Several frames in one chunk are extracted in order. A length
/// over the limit is reported, and everything up to the next
/// `Content-Length` header is skipped.
pub(super) fn extract(
    buf: &[u8],
    limits: &mut Limits,
    frames: &mut Vec<Result<Envelope, DecodeError>>,
) -> usize {
    let max = limits.max_frame_bytes;
    let mut consumed = 0;

    loop {
        if limits.discarding {
            let rest = &buf[consumed..];
            match find_length_header(rest) {
                Some(offset) => {
                    consumed += offset;
                    limits.discarding = false;
                }
                None => {
                    // keep a tail that might be the start of the next header
                    consumed += rest.len().saturating_sub(LENGTH_HEADER.len() - 1);
                    break;
                }
            }
        }

        // stray line breaks between frames
        while matches!(buf.get(consumed), Some(b'\r' | b'\n')) {
            consumed += 1;
        }

        let rest = &buf[consumed..];
        let Some(header_len) = find(rest, HEADER_END) else {
            if rest.len() > MAX_HEADER_BYTES {
                frames.push(Err(DecodeError::FrameTooLarge {
                    len: rest.len(),
                    max: MAX_HEADER_BYTES,
                }));
                consumed += rest.len() - (LENGTH_HEADER.len() - 1);
                limits.discarding = true;
                continue;
            }
            break;
        };
        let body_start = header_len + HEADER_END.len();

        let length = match parse_header(&rest[..header_len]) {
            Ok(length) => length,
            Err(e) => {
                // drop the bad header and resync on the next one
                frames.push(Err(e));
                consumed += body_start;
                continue;
            }
        };

        let frame_end = match body_start.checked_add(length) {
            Some(end) if length <= max => end,
            _ => {
                frames.push(Err(DecodeError::FrameTooLarge { len: length, max }));
                consumed += body_start;
                limits.discarding = true;
                continue;
            }
        };

        if rest.len() < frame_end {
            break;
        }

        frames.push(decode_body(&rest[body_start..frame_end]));
        consumed += frame_end;
    }

    consumed
}

/// Extract the Content-Length value; other headers are ignored
fn parse_header(header: &[u8]) -> Result<usize, DecodeError> {
    let text = std::str::from_utf8(header)
        .map_err(|_| DecodeError::InvalidHeader("header is not UTF-8".into()))?;

    let mut length = None;
    for line in text.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            return Err(DecodeError::InvalidHeader(format!("malformed header line {:?}", line)));
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            let parsed = value
                .trim()
                .parse::<usize>()
                .map_err(|_| DecodeError::InvalidHeader(format!("bad Content-Length {:?}", value.trim())))?;
            length = Some(parsed);
        }
    }

    length.ok_or(DecodeError::MissingContentLength)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Start of the next `Content-Length` header name, any case
fn find_length_header(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(LENGTH_HEADER.len())
        .position(|w| w.eq_ignore_ascii_case(LENGTH_HEADER))
}

// src/codec/newline.rs
// Newline-delimited JSON framing

use super::{DecodeError, Limits, decode_body};
use crate::protocol::Envelope;

pub(super) fn encode(mut body: Vec<u8>) -> Vec<u8> {
    body.push(b'\n');
    body
}

/// Pull every complete line out of `buf`; returns bytes consumed.
///
/// The trailing partial line (if any) is left for the next chunk, unless it
/// is already over the limit. Then it is reported and the rest of that line
/// is dropped as it arrives.
pub(super) fn extract(
    buf: &[u8],
    limits: &mut Limits,
    frames: &mut Vec<Result<Envelope, DecodeError>>,
) -> usize {
    let max = limits.max_frame_bytes;
    let mut consumed = 0;

    loop {
        let rest = &buf[consumed..];
        let newline = rest.iter().position(|b| *b == b'\n');

        if limits.discarding {
            match newline {
                Some(offset) => {
                    consumed += offset + 1;
                    limits.discarding = false;
                    continue;
                }
                None => return buf.len(),
            }
        }

        let Some(offset) = newline else {
            if rest.len() > max {
                frames.push(Err(DecodeError::FrameTooLarge { len: rest.len(), max }));
                limits.discarding = true;
                return buf.len();
            }
            break;
        };

        let line = rest[..offset].trim_ascii();
        consumed += offset + 1;

        if line.is_empty() {
            continue;
        }
        if line.len() > max {
            frames.push(Err(DecodeError::FrameTooLarge { len: line.len(), max }));
            continue;
        }
        frames.push(decode_body(line));
    }

    consumed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &[u8]) -> (Vec<Result<Envelope, DecodeError>>, usize) {
        let mut limits = Limits {
            max_frame_bytes: 1024,
            discarding: false,
        };
        let mut frames = Vec::new();
        let consumed = extract(input, &mut limits, &mut frames);
        (frames, consumed)
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let (frames, consumed) = run(b"\n  \n{\"id\":\"1\"}\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(consumed, 17);
    }

    #[test]
    fn test_crlf_line_endings_accepted() {
        let (frames, _) = run(b"{\"id\":\"1\"}\r\n");
        assert_eq!(frames[0].as_ref().unwrap().id(), Some("1"));
    }

    #[test]
    fn test_bad_line_does_not_block_next_line() {
        let (frames, consumed) = run(b"{not json\n{\"id\":\"2\"}\n{\"id\":");
        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_err());
        assert_eq!(frames[1].as_ref().unwrap().id(), Some("2"));
        // trailing partial line stays unconsumed
        assert_eq!(consumed, 21);
    }

    #[test]
    fn test_long_complete_line_is_rejected_alone() {
        let mut input = vec![b'{'; 2000];
        input.extend_from_slice(b"\n{\"id\":\"3\"}\n");
        let (frames, consumed) = run(&input);
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Err(DecodeError::FrameTooLarge { len: 2000, max: 1024 })));
        assert_eq!(frames[1].as_ref().unwrap().id(), Some("3"));
        assert_eq!(consumed, input.len());
    }
}

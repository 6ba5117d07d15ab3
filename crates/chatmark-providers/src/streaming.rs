//! Shared utilities for streaming response parsing.
//!
//! Helpers used by providers that read a chunked HTTP body and turn it into
//! [`CompletionChunk`]s.

use crate::{CompletionChunk, Usage};

// ─────────────────────────────────────────────────────────────────────────────
// UTF-8 Streaming
// ─────────────────────────────────────────────────────────────────────────────

/// Try to decode bytes as UTF-8, handling incomplete sequences at the end.
/// Returns the decoded string and leaves any incomplete bytes in the buffer.
///
/// Bytes that can never become valid UTF-8 are replaced with U+FFFD rather
/// than stalling the stream.
pub fn decode_utf8_streaming(byte_buffer: &mut Vec<u8>) -> Option<String> {
    match std::str::from_utf8(byte_buffer) {
        Ok(s) => {
            let result = s.to_string();
            byte_buffer.clear();
            Some(result)
        }
        Err(e) => {
            let valid_up_to = e.valid_up_to();
            match e.error_len() {
                // Truncated sequence at the end: keep it for the next chunk
                None if valid_up_to == 0 => None,
                None => {
                    let valid: Vec<u8> = byte_buffer.drain(..valid_up_to).collect();
                    Some(String::from_utf8_lossy(&valid).into_owned())
                }
                // Invalid bytes in the middle
                Some(bad_len) => {
                    let consumed: Vec<u8> = byte_buffer.drain(..valid_up_to + bad_len).collect();
                    Some(String::from_utf8_lossy(&consumed).into_owned())
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion Chunk Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Create a final completion chunk with usage and stop reason.
pub fn make_final_chunk(usage: Option<Usage>, stop_reason: Option<String>) -> CompletionChunk {
    CompletionChunk {
        content: String::new(),
        finished: true,
        usage,
        stop_reason,
    }
}

/// Create a text content chunk (not finished).
pub fn make_text_chunk(content: String) -> CompletionChunk {
    CompletionChunk {
        content,
        finished: false,
        usage: None,
        stop_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_complete_buffer() {
        let mut buf = "héllo".as_bytes().to_vec();
        assert_eq!(decode_utf8_streaming(&mut buf), Some("héllo".to_string()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_split_multibyte_char() {
        let bytes = "aé".as_bytes();
        // 'é' is two bytes; hold back the second one
        let mut buf = bytes[..2].to_vec();
        assert_eq!(decode_utf8_streaming(&mut buf), Some("a".to_string()));
        assert_eq!(buf, vec![bytes[1]]);

        buf.push(bytes[2]);
        assert_eq!(decode_utf8_streaming(&mut buf), Some("é".to_string()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_waits_for_more_bytes() {
        let mut buf = vec![0xE2, 0x82];
        assert_eq!(decode_utf8_streaming(&mut buf), None);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_decode_replaces_invalid_bytes() {
        let mut buf = vec![b'a', 0xFF, b'b'];
        assert_eq!(decode_utf8_streaming(&mut buf), Some("a\u{FFFD}".to_string()));
        assert_eq!(decode_utf8_streaming(&mut buf), Some("b".to_string()));
    }

    #[test]
    fn test_chunk_helpers() {
        let text = make_text_chunk("hi".to_string());
        assert!(!text.finished);
        assert_eq!(text.content, "hi");

        let last = make_final_chunk(None, Some("end_turn".to_string()));
        assert!(last.finished);
        assert!(last.content.is_empty());
        assert_eq!(last.stop_reason.as_deref(), Some("end_turn"));
    }
}

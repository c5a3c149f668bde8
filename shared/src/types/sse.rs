// shared/src/types/sse.rs
// SSE wire framing: encoding on the server, incremental decoding on subscribers.

use bytes::Bytes;
use thiserror::Error;

use crate::types::event::RealtimeEvent;

/// A sink write failed because the remote end is gone.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum SinkError {
    #[error("client disconnected")]
    Disconnected,
}

/// Encode an event as a single SSE frame: `data: <json>\n\n`.
pub fn encode_frame(event: &RealtimeEvent) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_string(event)?;
    Ok(Bytes::from(format!("data: {}\n\n", json)))
}

/// Same framing for an arbitrary JSON value.
pub fn encode_json_frame(value: &serde_json::Value) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    Ok(Bytes::from(format!("data: {}\n\n", json)))
}

// ---------------------------------------------------------------------------
// SseDecoder
// ---------------------------------------------------------------------------

/// Incremental decoder for an `text/event-stream` body.
///
/// Bytes arrive in arbitrary chunks; complete messages are returned once the
/// blank line terminating them has been seen. Multiple `data:` lines in one
/// message are joined with `\n`. `event:`, `id:`, `retry:` and comment lines
/// are ignored since every message on this channel is a JSON `RealtimeEvent`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every message it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if line.is_empty() {
                if !self.data.is_empty() {
                    messages.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }

            let line = String::from_utf8_lossy(&line);
            if let Some(rest) = line.strip_prefix("data:") {
                self.data
                    .push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
        }

        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_frame_has_sse_framing() {
        let event = RealtimeEvent::notification("hi", None);
        let frame = encode_frame(&event).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: {"));
        assert!(text.ends_with("}\n\n"));
        assert_eq!(text.matches('\n').count(), 2);
    }

    #[test]
    fn json_frame_is_one_line() {
        let frame = encode_json_frame(&serde_json::json!({"type": "test_event", "data": {"a": "x\ny"}}))
            .unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: {"));
        assert_eq!(text.matches('\n').count(), 2);
    }

    #[test]
    fn decoder_reassembles_split_frames() {
        let event = RealtimeEvent::notification("split", None);
        let frame = encode_frame(&event).unwrap();
        let (a, b) = frame.split_at(7);

        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(a).is_empty());
        let messages = decoder.feed(b);
        assert_eq!(messages.len(), 1);

        let back: RealtimeEvent = serde_json::from_str(&messages[0]).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn decoder_handles_several_frames_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let messages = decoder.feed(b"data: 1\n\ndata: 2\n\ndata: 3");
        assert_eq!(messages, vec!["1", "2"]);
        assert_eq!(decoder.feed(b"\n\n"), vec!["3"]);
    }

    #[test]
    fn decoder_accepts_crlf_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let messages = decoder.feed(b"data: {\"a\":\r\ndata: 1}\r\n\r\n");
        assert_eq!(messages, vec!["{\"a\":\n1}"]);
    }

    #[test]
    fn decoder_ignores_comments_and_named_fields() {
        let mut decoder = SseDecoder::new();
        let messages = decoder.feed(b": ping\n\nevent: x\nid: 7\ndata:payload\n\n");
        assert_eq!(messages, vec!["payload"]);
    }

    #[test]
    fn decoder_keeps_multibyte_characters_split_across_chunks() {
        let frame = "data: café\n\n".as_bytes();
        let cut = frame.len() - 3;
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(&frame[..cut]).is_empty());
        assert_eq!(decoder.feed(&frame[cut..]), vec!["café"]);
    }
}

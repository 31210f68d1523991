use tracing::warn;

use crate::payload::StreamChunk;

const DONE_SENTINEL: &str = "[DONE]";

/// One decoded server-sent event frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Incremental assistant text.
    Delta(String),
    /// End-of-stream sentinel; nothing follows.
    Done,
}

/// Incremental decoder for SSE chat-completion streams.
///
/// Fed bytes may split a frame anywhere, including inside the `[DONE]`
/// sentinel or inside a multi-byte UTF-8 scalar. The buffer stays raw bytes
/// and only complete lines are decoded to text, so no boundary can corrupt a
/// scalar or hide a sentinel.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl FrameDecoder {
    /// Feed arbitrary bytes into the decoder and drain complete frames.
    ///
    /// Frames come out in strict arrival order. Once [`StreamFrame::Done`]
    /// has been reported, further input is ignored.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }

        self.buffer.extend_from_slice(bytes);

        while let Some(split) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(0..split + 1).collect();
            let line = String::from_utf8_lossy(&line[..split]);

            match decode_line(line.trim_end_matches('\r')) {
                Some(StreamFrame::Done) => {
                    self.finished = true;
                    self.buffer.clear();
                    frames.push(StreamFrame::Done);
                    return frames;
                }
                Some(frame) => frames.push(frame),
                None => {}
            }
        }

        frames
    }

    /// Decode a complete SSE payload string in one shot.
    pub fn decode_all(input: &str) -> Vec<StreamFrame> {
        let mut decoder = Self::default();
        decoder.feed(input.as_bytes())
    }

    /// True once the `[DONE]` sentinel has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn has_partial_line(&self) -> bool {
        !self.buffer.is_empty()
    }
}

fn decode_line(line: &str) -> Option<StreamFrame> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == DONE_SENTINEL {
        return Some(StreamFrame::Done);
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk.delta_content().map(StreamFrame::Delta),
        Err(error) => {
            warn!("skipping malformed stream chunk: {error}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameDecoder, StreamFrame};

    #[test]
    fn decode_frames_incrementally() {
        let mut decoder = FrameDecoder::default();
        let mut frames = Vec::new();

        frames.extend(decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n"));
        assert_eq!(frames, vec![StreamFrame::Delta("Hi".to_string())]);

        frames.extend(decoder.feed(b"data: [DONE]\n"));
        assert_eq!(frames.last(), Some(&StreamFrame::Done));
        assert!(decoder.is_finished());
        assert!(!decoder.has_partial_line());
    }

    #[test]
    fn incomplete_trailing_line_is_retained_not_decoded() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder
            .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"pending\"")
            .is_empty());
        assert!(decoder.has_partial_line());
    }
}

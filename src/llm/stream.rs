//! Incremental parsing of server-sent `data:` lines.
//!
//! Network chunks do not respect line boundaries, so bytes are buffered
//! until a newline arrives and only complete lines are parsed.

use serde_json::Value;

/// End-of-stream marker sent by OpenAI-compatible servers.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Extract the incremental content from a single SSE line.
///
/// Returns `None` for non-`data:` lines, the sentinel, unparsable JSON and
/// chunks without a content delta.
pub fn parse_data_line(line: &str) -> Option<String> {
    let data = line.trim().strip_prefix("data:")?.trim();

    if data.is_empty() || data == DONE_SENTINEL {
        return None;
    }

    let chunk: Value = serde_json::from_str(data).ok()?;
    chunk["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|content| !content.is_empty())
        .map(str::to_string)
}

/// Reassembles lines split across chunk boundaries.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw chunk; returns the content deltas of every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut deltas = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(delta) = parse_data_line(&String::from_utf8_lossy(&line)) {
                deltas.push(delta);
            }
        }
        deltas
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        parse_data_line(&String::from_utf8_lossy(&line))
    }
}

/// Decodes a byte stream into text without splitting multibyte characters.
///
/// Incomplete trailing bytes are held back until the next chunk completes
/// them. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw chunk; returns the longest text it completes.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut text = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    text.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    let prefix = std::str::from_utf8(&self.pending[..valid_up_to]);
                    text.push_str(prefix.unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + bad);
                        }
                        None => {
                            self.pending.drain(..valid_up_to);
                            break;
                        }
                    }
                }
            }
        }
        text
    }

    /// Flush bytes left over at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Grader answer text rebuilt from raw stream chunks, released line by line.
#[derive(Debug, Default)]
pub struct GraderTranscript {
    lines: SseLineBuffer,
    partial: String,
}

impl GraderTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw chunk; returns every answer line it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        for delta in self.lines.push(chunk.as_bytes()) {
            self.partial.push_str(&delta);
        }

        let mut complete = Vec::new();
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            complete.push(line.trim_end().to_string());
        }
        complete
    }

    /// End of one answer; returns the unterminated last line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if let Some(delta) = self.lines.finish() {
            self.partial.push_str(&delta);
        }
        let rest = std::mem::take(&mut self.partial);
        let rest = rest.trim_end();
        (!rest.is_empty()).then(|| rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_line(content: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    #[test]
    fn test_parse_data_line() {
        assert_eq!(
            parse_data_line(delta_line("hello").trim()),
            Some("hello".to_string())
        );
        assert_eq!(parse_data_line("data: [DONE]"), None);
        assert_eq!(parse_data_line("data: {not json"), None);
        assert_eq!(parse_data_line(": keep-alive"), None);
        assert_eq!(
            parse_data_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            None
        );
    }

    #[test]
    fn test_buffer_joins_lines_split_across_chunks() {
        let stream = format!("{}{}data: [DONE]\n", delta_line("Final "), delta_line("score: 4"));
        let bytes = stream.as_bytes();
        let mut buffer = SseLineBuffer::new();

        let mut answer = String::new();
        for chunk in bytes.chunks(7) {
            for delta in buffer.push(chunk) {
                answer.push_str(&delta);
            }
        }
        assert!(buffer.finish().is_none());
        assert_eq!(answer, "Final score: 4");
    }

    #[test]
    fn test_buffer_keeps_multibyte_characters_intact() {
        let stream = delta_line("最终得分：5");
        let bytes = stream.as_bytes();
        let mut buffer = SseLineBuffer::new();

        let mut answer = String::new();
        for chunk in bytes.chunks(3) {
            answer.extend(buffer.push(chunk));
        }
        assert_eq!(answer, "最终得分：5");
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut buffer = SseLineBuffer::new();
        let line = delta_line("tail");
        assert!(buffer.push(line.trim_end().as_bytes()).is_empty());
        assert_eq!(buffer.finish(), Some("tail".to_string()));
    }

    #[test]
    fn test_decoder_holds_split_cjk_character() {
        let body = delta_line("最终得分：5");
        let bytes = body.as_bytes();
        let split = body.find('最').unwrap() + 1;

        let mut decoder = Utf8ChunkDecoder::new();
        let first = decoder.push(&bytes[..split]);
        let second = decoder.push(&bytes[split..]);

        assert!(!first.contains('\u{FFFD}'));
        assert!(!second.contains('\u{FFFD}'));
        assert!(second.starts_with("最终得分"));
        assert_eq!(format!("{first}{second}"), body);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_decoder_byte_by_byte() {
        let text = "相关性 Final score: 4";
        let mut decoder = Utf8ChunkDecoder::new();
        let mut out = String::new();
        for byte in text.as_bytes() {
            out.push_str(&decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(out, text);
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes_and_flushes_tail() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.push(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");

        // First two bytes of a three-byte character, never completed.
        assert_eq!(decoder.push(&"最".as_bytes()[..2]), "");
        assert_eq!(decoder.finish(), Some("\u{FFFD}".to_string()));
    }

    #[test]
    fn test_transcript_releases_complete_lines() {
        let stream = format!(
            "{}{}{}data: [DONE]\n",
            delta_line("Sources are offi"),
            delta_line("cial.\n最终得分"),
            delta_line("：4")
        );

        let mut transcript = GraderTranscript::new();
        let mut decoder = Utf8ChunkDecoder::new();
        let mut lines = Vec::new();
        for chunk in stream.as_bytes().chunks(5) {
            lines.extend(transcript.push(&decoder.push(chunk)));
        }
        assert_eq!(lines, vec!["Sources are official.".to_string()]);
        assert_eq!(transcript.finish(), Some("最终得分：4".to_string()));
        assert!(transcript.finish().is_none());
    }
}

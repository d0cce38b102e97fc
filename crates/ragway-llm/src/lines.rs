//! Incremental line splitting for streamed responses.
//!
//! Network chunks arrive at arbitrary boundaries, including inside a
//! multi-byte character or a `data: ` payload. The assembler buffers raw
//! bytes and releases complete lines only. Lines can grow to any size (a
//! single delta payload may exceed 1 MiB); a single trailing `\r` is
//! stripped so CRLF streams behave like LF streams.

pub struct LineAssembler {
    buf: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(8 * 1024),
        }
    }

    /// Feed one network chunk; returns every line completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop(); // the newline itself
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Unterminated remainder at end of stream, if any.
    pub fn finish(self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.buf).into_owned())
        }
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_complete_lines() {
        let mut a = LineAssembler::new();
        let lines = a.push(b"data: one\ndata: two\n");
        assert_eq!(lines, vec!["data: one", "data: two"]);
        assert!(a.finish().is_none());
    }

    #[test]
    fn holds_partial_line_across_chunks() {
        let mut a = LineAssembler::new();
        assert!(a.push(b"data: par").is_empty());
        let lines = a.push(b"tial\n");
        assert_eq!(lines, vec!["data: partial"]);
    }

    #[test]
    fn strips_single_carriage_return() {
        let mut a = LineAssembler::new();
        let lines = a.push(b"data: x\r\n\r\n");
        assert_eq!(lines, vec!["data: x", ""]);
    }

    #[test]
    fn preserves_data_prefix_and_empty_payload() {
        let mut a = LineAssembler::new();
        let lines = a.push(b"data:\ndata: [DONE]\n");
        assert_eq!(lines, vec!["data:", "data: [DONE]"]);
    }

    #[test]
    fn survives_split_multibyte_character() {
        let text = "data: héllo\n".as_bytes();
        let (first, second) = text.split_at(8); // splits the é
        let mut a = LineAssembler::new();
        assert!(a.push(first).is_empty());
        let lines = a.push(second);
        assert_eq!(lines, vec!["data: héllo"]);
    }

    #[test]
    fn finish_returns_unterminated_tail() {
        let mut a = LineAssembler::new();
        a.push(b"data: no newline");
        assert_eq!(a.finish().as_deref(), Some("data: no newline"));
    }

    #[test]
    fn accepts_lines_beyond_a_mebibyte() {
        let payload = "x".repeat(1024 * 1024 + 17);
        let mut a = LineAssembler::new();
        a.push(format!("data: {payload}").as_bytes());
        let lines = a.push(b"\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 6 + 1024 * 1024 + 17);
    }
}

//! Streaming citation-marker rewriting.
//!
//! Provider citation markers can be split across streamed chunks. The
//! scanner keeps a rolling buffer: each delta is appended, every complete
//! marker occurrence is replaced with a sequential bracket number
//! (assigned the first time that exact marker string is seen), and a
//! dangling opening delimiter at the buffer's tail holds back only the
//! incomplete remainder. State lives in this struct, threaded through the
//! stream transformation, so concurrent streams never share scan state.

use once_cell::sync::Lazy;
use regex::Regex;

/// Provider-specific marker syntax.
///
/// Different provider families use different marker glyphs; the scanner
/// itself is syntax-agnostic.
pub trait MarkerSyntax: Send + Sync {
    /// Matches one complete marker occurrence.
    fn pattern(&self) -> &Regex;
    fn open_delimiter(&self) -> &str;
    fn close_delimiter(&self) -> &str;
}

static AGENT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new("【[^【】]*】").expect("marker pattern"));

/// The agent-service glyph pairing, e.g. `【3:0†source】`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AgentMarkerSyntax;

impl MarkerSyntax for AgentMarkerSyntax {
    fn pattern(&self) -> &Regex {
        &AGENT_MARKER
    }

    fn open_delimiter(&self) -> &str {
        "【"
    }

    fn close_delimiter(&self) -> &str {
        "】"
    }
}

/// Rolling scan state for one stream.
#[derive(Debug, Default)]
pub struct CitationScanState {
    buffer: String,
    /// Insertion-ordered marker strings; a marker's number is its index
    /// plus the offset plus one.
    assigned: Vec<String>,
    /// Numbering continues after citations recorded by earlier stages.
    offset: usize,
}

impl CitationScanState {
    pub fn new(offset: usize) -> Self {
        Self {
            buffer: String::new(),
            assigned: Vec::new(),
            offset,
        }
    }

    /// Number assigned to a marker, allocating on first sight.
    pub fn number_for(&mut self, marker: &str) -> usize {
        if let Some(idx) = self.assigned.iter().position(|m| m == marker) {
            return self.offset + idx + 1;
        }
        self.assigned.push(marker.to_string());
        self.offset + self.assigned.len()
    }

    /// Markers in assignment order.
    pub fn markers(&self) -> &[String] {
        &self.assigned
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Feed one delta; returns the text safe to emit now.
    pub fn push(&mut self, syntax: &dyn MarkerSyntax, delta: &str) -> String {
        self.buffer.push_str(delta);
        let replaced = self.replace_complete(syntax);

        // A trailing open delimiter without its close is an incomplete
        // marker: hold it back, emit everything before it.
        if let Some(pos) = replaced.rfind(syntax.open_delimiter()) {
            if !replaced[pos..].contains(syntax.close_delimiter()) {
                self.buffer = replaced[pos..].to_string();
                return replaced[..pos].to_string();
            }
        }

        replaced
    }

    /// Emit whatever is still buffered at stream completion.
    pub fn flush(&mut self, syntax: &dyn MarkerSyntax) -> String {
        self.replace_complete(syntax)
    }

    fn replace_complete(&mut self, syntax: &dyn MarkerSyntax) -> String {
        let buffer = std::mem::take(&mut self.buffer);
        let mut out = String::with_capacity(buffer.len());
        let mut last = 0;
        for m in syntax.pattern().find_iter(&buffer) {
            out.push_str(&buffer[last..m.start()]);
            let number = self.number_for(m.as_str());
            out.push_str(&format!("[{number}]"));
            last = m.end();
        }
        out.push_str(&buffer[last..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(chunks: &[&str]) -> String {
        let syntax = AgentMarkerSyntax;
        let mut state = CitationScanState::new(0);
        let mut out = String::new();
        for chunk in chunks {
            out.push_str(&state.push(&syntax, chunk));
        }
        out.push_str(&state.flush(&syntax));
        out
    }

    #[test]
    fn whole_marker_in_one_chunk() {
        assert_eq!(scan_all(&["see 【3:0†source】 here"]), "see [1] here");
    }

    #[test]
    fn marker_split_across_chunks_is_idempotent() {
        let text = "intro 【3:0†source】 middle 【4:1†other】 end";
        let whole = scan_all(&[text]);

        // Every split position must produce the same output as one chunk.
        let byte_indices: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        for &split in &byte_indices {
            let split_output = scan_all(&[&text[..split], &text[split..]]);
            assert_eq!(split_output, whole, "split at byte {split}");
        }
    }

    #[test]
    fn repeated_marker_keeps_its_number() {
        let out = scan_all(&["【a†1】 and 【b†2】 then 【a†1】 again"]);
        assert_eq!(out, "[1] and [2] then [1] again");
    }

    #[test]
    fn distinct_markers_never_collide() {
        let mut state = CitationScanState::new(0);
        let first = state.number_for("【a】");
        let second = state.number_for("【b】");
        assert_ne!(first, second);
        assert_eq!(state.number_for("【a】"), first);
    }

    #[test]
    fn numbering_continues_from_offset() {
        let syntax = AgentMarkerSyntax;
        let mut state = CitationScanState::new(3);
        let out = state.push(&syntax, "【x†y】");
        assert_eq!(out, "[4]");
    }

    #[test]
    fn dangling_open_delimiter_is_held_back() {
        let syntax = AgentMarkerSyntax;
        let mut state = CitationScanState::new(0);
        let out = state.push(&syntax, "text before 【3:0");
        assert_eq!(out, "text before ");
        let out = state.push(&syntax, "†source】 after");
        assert_eq!(out, "[1] after");
    }

    #[test]
    fn flush_emits_incomplete_tail_verbatim() {
        let syntax = AgentMarkerSyntax;
        let mut state = CitationScanState::new(0);
        let _ = state.push(&syntax, "truncated 【3:0");
        assert_eq!(state.flush(&syntax), "【3:0");
    }
}

use super::section::{OutputSection, SectionId};
use crate::ansi::{self, ParsedSpan};
use crate::types::SectionType;
use std::ops::Range;

/// Byte range of one complete line inside a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineRef {
    chunk: usize,
    start: usize,
    end: usize,
    section: SectionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    pub spans: Vec<ParsedSpan>,
}

impl RenderedLine {
    pub fn empty() -> Self {
        Self {
            spans: vec![ParsedSpan::plain("")],
        }
    }

    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }
}

/// Append-only store for one block's output.
///
/// Completed lines are never copied out of the chunk they arrived in; the
/// line index only records byte ranges. Styling is resolved when a line is
/// read, so appends cost O(payload) regardless of how much history exists.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    chunks: Vec<String>,
    line_index: Vec<LineRef>,
    pending_text: String,
    sections: Vec<OutputSection>,
    bytes: usize,
    version: u64,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_output(&mut self, payload: &str) -> bool {
        self.append_text(payload, SectionType::Output)
    }

    /// Append raw output under `section_type`. Returns `false` for a no-op.
    pub fn append_text(&mut self, payload: &str, section_type: SectionType) -> bool {
        if payload.is_empty() {
            return false;
        }
        let normalized = normalize_line_endings(payload);
        if normalized.is_empty() {
            return false;
        }

        if self.active_section_type() != Some(section_type) {
            self.flush_pending_line();
            self.open_section(section_type);
        }

        self.bytes += payload.len();
        match normalized.rfind('\n') {
            None => self.pending_text.push_str(&normalized),
            Some(last_newline) => {
                let mut chunk = std::mem::take(&mut self.pending_text);
                chunk.push_str(&normalized[..=last_newline]);
                self.pending_text = normalized[last_newline + 1..].to_string();
                self.push_chunk(chunk);
            }
        }
        self.version += 1;
        true
    }

    pub fn line(&self, index: usize) -> RenderedLine {
        match self.line_text(index) {
            Some(text) => RenderedLine {
                spans: ansi::parse(text),
            },
            None => RenderedLine::empty(),
        }
    }

    pub fn lines(&self, start: usize, end: usize) -> Vec<RenderedLine> {
        let end = end.min(self.line_count());
        (start..end).map(|index| self.line(index)).collect()
    }

    /// Raw text of a line, escapes included. The pending partial line is
    /// addressable at `complete_line_count()`.
    pub fn line_text(&self, index: usize) -> Option<&str> {
        if let Some(line) = self.line_index.get(index) {
            return self
                .chunks
                .get(line.chunk)
                .and_then(|chunk| chunk.get(line.start..line.end));
        }
        if index == self.line_index.len() && !self.pending_text.is_empty() {
            return Some(&self.pending_text);
        }
        None
    }

    pub fn line_section(&self, index: usize) -> Option<SectionId> {
        if let Some(line) = self.line_index.get(index) {
            return Some(line.section);
        }
        if index == self.line_index.len() && !self.pending_text.is_empty() {
            return self.sections.last().map(|section| section.id);
        }
        None
    }

    pub fn sections(&self) -> &[OutputSection] {
        &self.sections
    }

    pub fn section(&self, id: SectionId) -> Option<&OutputSection> {
        self.sections.get(id)
    }

    /// Line range of a section, counting the pending line for the active one.
    pub fn section_line_range(&self, id: SectionId) -> Option<Range<usize>> {
        let section = self.sections.get(id)?;
        let is_active = id + 1 == self.sections.len();
        let end = if is_active && !self.pending_text.is_empty() {
            section.end_line + 1
        } else {
            section.end_line
        };
        Some(section.start_line..end)
    }

    pub fn lines_for_section(&self, id: SectionId) -> Vec<RenderedLine> {
        match self.section_line_range(id) {
            Some(range) => range.map(|index| self.line(index)).collect(),
            None => Vec::new(),
        }
    }

    pub fn toggle_section_collapse(&mut self, id: SectionId) -> bool {
        let Some(section) = self.sections.get_mut(id) else {
            return false;
        };
        section.collapsed = !section.collapsed;
        self.version += 1;
        true
    }

    /// Returns `true` when the flag actually changed.
    pub fn set_section_collapsed(&mut self, id: SectionId, collapsed: bool) -> bool {
        let Some(section) = self.sections.get_mut(id) else {
            return false;
        };
        if section.collapsed == collapsed {
            return false;
        }
        section.collapsed = collapsed;
        self.version += 1;
        true
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn line_count(&self) -> usize {
        self.line_index.len() + usize::from(!self.pending_text.is_empty())
    }

    pub fn complete_line_count(&self) -> usize {
        self.line_index.len()
    }

    pub fn pending_text(&self) -> &str {
        &self.pending_text
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_empty(&self) -> bool {
        self.line_count() == 0
    }

    pub fn all_text(&self) -> String {
        let mut out = String::with_capacity(self.bytes);
        for index in 0..self.line_index.len() {
            if index > 0 {
                out.push('\n');
            }
            out.push_str(self.line_text(index).unwrap_or_default());
        }
        if !self.pending_text.is_empty() {
            if !self.line_index.is_empty() {
                out.push('\n');
            }
            out.push_str(&self.pending_text);
        }
        out
    }

    fn active_section_type(&self) -> Option<SectionType> {
        self.sections.last().map(|section| section.section_type)
    }

    fn open_section(&mut self, section_type: SectionType) {
        let id = self.sections.len();
        self.sections
            .push(OutputSection::open(id, section_type, self.line_index.len()));
    }

    /// Terminate the partial line so it stays with the section it was written in.
    fn flush_pending_line(&mut self) {
        if self.pending_text.is_empty() {
            return;
        }
        let mut chunk = std::mem::take(&mut self.pending_text);
        chunk.push('\n');
        self.push_chunk(chunk);
    }

    /// `chunk` must end with `\n`.
    fn push_chunk(&mut self, chunk: String) {
        let chunk_index = self.chunks.len();
        let section = self.sections.len().saturating_sub(1);
        let mut start = 0;
        for (newline, _) in chunk.match_indices('\n') {
            self.line_index.push(LineRef {
                chunk: chunk_index,
                start,
                end: newline,
                section,
            });
            start = newline + 1;
        }
        self.chunks.push(chunk);
        if let Some(active) = self.sections.last_mut() {
            active.end_line = self.line_index.len();
        }
    }
}

fn normalize_line_endings(payload: &str) -> String {
    if !payload.contains('\r') {
        return payload.to_string();
    }
    payload.replace("\r\n", "\n").replace('\r', "")
}

use crate::types::SectionType;

pub type SectionId = usize;

/// Half-open `[start_line, end_line)` run of lines sharing one section type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSection {
    pub id: SectionId,
    pub section_type: SectionType,
    pub start_line: usize,
    pub end_line: usize,
    pub collapsed: bool,
}

impl OutputSection {
    pub(super) fn open(id: SectionId, section_type: SectionType, start_line: usize) -> Self {
        Self {
            id,
            section_type,
            start_line,
            end_line: start_line,
            collapsed: section_type.collapsed_by_default(),
        }
    }

    /// Number of complete lines recorded in the section.
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line
    }

    pub fn contains(&self, line: usize) -> bool {
        (self.start_line..self.end_line).contains(&line)
    }
}

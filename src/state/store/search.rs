use super::state::BlockStore;
use crate::ansi;
use crate::types::BlockId;
use crate::util::truncate_to_display_width;
use aho_corasick::AhoCorasick;

pub const MAX_SEARCH_RESULTS: usize = 200;
pub const MAX_SEARCH_LINES_PER_BLOCK: usize = 1_500;
const PREVIEW_MAX_WIDTH: usize = 160;
const BLANK_LINE_PREVIEW: &str = "(blank line)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMatch {
    Command,
    Output { line_index: usize, preview: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub block_id: BlockId,
    pub matched: SearchMatch,
}

/// Case-insensitive substring matcher. ASCII queries run through an
/// ASCII-folding automaton; anything else falls back to Unicode lowercasing.
enum Matcher {
    Ascii(AhoCorasick),
    Unicode(String),
}

impl Matcher {
    fn new(query: &str) -> Option<Self> {
        if query.is_empty() {
            return None;
        }
        if query.is_ascii() {
            return AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .build([query])
                .ok()
                .map(Matcher::Ascii);
        }
        Some(Matcher::Unicode(query.to_lowercase()))
    }

    fn is_match(&self, haystack: &str) -> bool {
        match self {
            Matcher::Ascii(automaton) => automaton.is_match(haystack),
            Matcher::Unicode(needle) => haystack.to_lowercase().contains(needle.as_str()),
        }
    }
}

impl BlockStore {
    /// Matches over command text and the leading lines of each block's
    /// output, in block order. Truncated at [`MAX_SEARCH_RESULTS`]; a full
    /// result list says nothing about what lies beyond it.
    pub fn search_results(&self, query: &str) -> Vec<SearchResult> {
        let Some(matcher) = Matcher::new(query) else {
            return Vec::new();
        };

        let mut results = Vec::new();
        for block in self.blocks() {
            if matcher.is_match(&block.command_text) {
                results.push(SearchResult {
                    block_id: block.id,
                    matched: SearchMatch::Command,
                });
                if results.len() >= MAX_SEARCH_RESULTS {
                    return results;
                }
            }

            let output = block.output();
            let scanned = output.line_count().min(MAX_SEARCH_LINES_PER_BLOCK);
            for line_index in 0..scanned {
                let Some(raw) = output.line_text(line_index) else {
                    continue;
                };
                let text = ansi::strip(raw);
                if !matcher.is_match(&text) {
                    continue;
                }
                results.push(SearchResult {
                    block_id: block.id,
                    matched: SearchMatch::Output {
                        line_index,
                        preview: preview(&text),
                    },
                });
                if results.len() >= MAX_SEARCH_RESULTS {
                    return results;
                }
            }
        }
        results
    }

    pub fn current_search_results(&self) -> Vec<SearchResult> {
        self.search_results(&self.search_query)
    }
}

fn preview(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return BLANK_LINE_PREVIEW.to_string();
    }
    truncate_to_display_width(trimmed, PREVIEW_MAX_WIDTH)
}

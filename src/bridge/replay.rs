use super::decode::Utf8ChunkDecoder;
use crate::runtime::snapshot::SessionSnapshotManager;
use crate::types::TerminalEvent;
use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Incremental decoder for JSON-lines event recordings. Input may be split
/// anywhere, including inside a UTF-8 character.
#[derive(Default)]
pub struct EventLineParser {
    decoder: Utf8ChunkDecoder,
    buffer: String,
    line_number: usize,
    skipped: usize,
}

impl EventLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<TerminalEvent> {
        let text = self.decoder.decode(chunk);
        self.buffer.push_str(&text);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(end) = self.buffer[start..].find('\n') {
            let line_end = start + end;
            let line = self.buffer[start..line_end].to_string();
            if let Some(event) = self.parse_line(&line) {
                events.push(event);
            }
            start = line_end + 1;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        events
    }

    /// Parse whatever is left once the input has ended.
    pub fn flush(&mut self) -> Vec<TerminalEvent> {
        let tail = self.decoder.finish();
        self.buffer.push_str(&tail);
        let rest = std::mem::take(&mut self.buffer);
        self.parse_line(&rest).into_iter().collect()
    }

    /// Lines that were neither blank, comments, nor valid events.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn parse_line(&mut self, line: &str) -> Option<TerminalEvent> {
        self.line_number += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        match serde_json::from_str::<TerminalEvent>(trimmed) {
            Ok(event) => Some(event),
            Err(err) => {
                self.skipped += 1;
                warn!(line = self.line_number, error = %err, "skipping malformed event line");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub skipped: usize,
    pub frames: usize,
}

/// Feed a recorded session into the live session of `manager`, flushing one
/// frame per read.
pub async fn replay_file(path: &Path, manager: &mut SessionSnapshotManager) -> Result<ReplaySummary> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open replay file {}", path.display()))?;
    let mut reads = ReaderStream::new(file);
    let mut parser = EventLineParser::new();
    let mut summary = ReplaySummary::default();

    while let Some(chunk) = reads.next().await {
        let chunk = chunk.with_context(|| format!("failed to read {}", path.display()))?;
        summary.events += dispatch_all(manager, parser.process(&chunk));
        if !manager.session_mut().run_frame().is_empty() {
            summary.frames += 1;
        }
    }
    summary.events += dispatch_all(manager, parser.flush());
    if !manager.session_mut().run_frame().is_empty() {
        summary.frames += 1;
    }

    summary.skipped = parser.skipped();
    debug!(?summary, path = %path.display(), "replay finished");
    Ok(summary)
}

fn dispatch_all(manager: &mut SessionSnapshotManager, events: Vec<TerminalEvent>) -> usize {
    let count = events.len();
    for event in events {
        manager.session_mut().dispatch(event);
    }
    count
}

use crate::buffer::OutputBuffer;
use crate::types::{BlockId, BlockSource, Millis};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockStatus {
    Queued,
    Running { started_at: Millis },
    Finished { exit_code: i32, ended_at: Millis },
    Cancelled { reason: String, ended_at: Millis },
}

impl BlockStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BlockStatus::Finished { .. } | BlockStatus::Cancelled { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            BlockStatus::Queued => "queued",
            BlockStatus::Running { .. } => "running",
            BlockStatus::Finished { exit_code: 0, .. } => "ok",
            BlockStatus::Finished { .. } => "failed",
            BlockStatus::Cancelled { .. } => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockMetrics {
    pub bytes_received: usize,
    pub line_count: usize,
    pub duration_ms: Option<u64>,
}

/// One command or AI turn: its input, lifecycle and output.
#[derive(Debug, Clone)]
pub struct CommandBlock {
    pub id: BlockId,
    pub command_text: String,
    pub source: BlockSource,
    pub status: BlockStatus,
    pub cwd_label: String,
    pub host_label: String,
    pub metrics: BlockMetrics,
    pub is_collapsed: bool,
    pub(crate) output: OutputBuffer,
}

impl CommandBlock {
    pub fn new(
        id: BlockId,
        command_text: String,
        source: BlockSource,
        host_label: String,
        cwd_label: String,
    ) -> Self {
        Self {
            id,
            command_text,
            source,
            status: BlockStatus::Queued,
            cwd_label,
            host_label,
            metrics: BlockMetrics::default(),
            is_collapsed: false,
            output: OutputBuffer::new(),
        }
    }

    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, BlockStatus::Running { .. })
    }

    pub(crate) fn start(&mut self, started_at: Millis) -> bool {
        if self.status != BlockStatus::Queued {
            return false;
        }
        self.status = BlockStatus::Running { started_at };
        true
    }

    pub(crate) fn finish(&mut self, exit_code: i32, ended_at: Millis) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.metrics.duration_ms = self.elapsed_until(ended_at);
        self.status = BlockStatus::Finished {
            exit_code,
            ended_at,
        };
        true
    }

    pub(crate) fn cancel(&mut self, reason: String, ended_at: Millis) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.metrics.duration_ms = self.elapsed_until(ended_at);
        self.status = BlockStatus::Cancelled { reason, ended_at };
        true
    }

    /// Only a block that actually ran has a duration.
    fn elapsed_until(&self, ended_at: Millis) -> Option<u64> {
        match self.status {
            BlockStatus::Running { started_at } => Some(ended_at.saturating_sub(started_at)),
            _ => None,
        }
    }

    /// Escape-free copy of the whole output, for clipboard and export.
    pub fn plain_text(&self) -> String {
        crate::ansi::strip(&self.output.all_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> CommandBlock {
        CommandBlock::new(
            1,
            "ls".to_string(),
            BlockSource::User,
            "local".to_string(),
            "~".to_string(),
        )
    }

    #[test]
    fn test_finished_block_records_duration_from_start() {
        let mut block = block();
        assert!(block.start(1_000));
        assert!(block.finish(0, 1_250));
        assert_eq!(block.metrics.duration_ms, Some(250));
        assert_eq!(block.status.label(), "ok");
    }

    #[test]
    fn test_block_ended_without_start_has_no_duration() {
        let mut block = block();
        assert!(block.finish(127, 2_000));
        assert_eq!(block.metrics.duration_ms, None);
        assert_eq!(block.status.label(), "failed");
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut block = block();
        block.start(10);
        block.cancel("interrupted".to_string(), 20);
        assert!(!block.start(30));
        assert!(!block.finish(0, 40));
        assert!(!block.cancel("again".to_string(), 50));
        assert_eq!(
            block.status,
            BlockStatus::Cancelled {
                reason: "interrupted".to_string(),
                ended_at: 20
            }
        );
        assert_eq!(block.metrics.duration_ms, Some(10));
    }

    #[test]
    fn test_start_only_from_queued() {
        let mut block = block();
        assert!(block.start(5));
        assert!(!block.start(6));
        assert_eq!(block.status, BlockStatus::Running { started_at: 5 });
    }

    #[test]
    fn test_plain_text_strips_escapes() {
        let mut block = block();
        block.output.append_output("\x1b[1mhi\x1b[0m\nthere");
        assert_eq!(block.plain_text(), "hi\nthere");
    }
}

use super::super::block::CommandBlock;
use super::state::{AiError, BlockStore, Selection};
use crate::pipeline::FlushTarget;
use crate::types::{BlockId, SectionType, TerminalEvent};
use tracing::debug;

/// Where a `BlockOutputChunk` should be queued. The payload itself stays in
/// the event so the reducer never copies output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRoute {
    pub block_id: BlockId,
    pub section_type: SectionType,
}

impl BlockStore {
    /// Apply one event. Events naming a block this store does not know are
    /// ignored: output and lifecycle updates can legitimately outlive a block.
    pub fn reduce(&mut self, event: &TerminalEvent) -> Option<OutputRoute> {
        match event {
            TerminalEvent::UserSubmittedCommand { .. } => {
                self.follow_mode = true;
            }
            TerminalEvent::BlockCreated {
                block_id,
                command_text,
                source,
            } => self.create_block(*block_id, command_text, *source),
            TerminalEvent::BlockStarted {
                block_id,
                started_at,
            } => {
                if !self.with_block(*block_id, |block| block.start(*started_at)) {
                    debug!(block_id, "ignoring start for unknown or started block");
                }
            }
            TerminalEvent::BlockOutputChunk {
                block_id,
                section_type,
                ..
            } => {
                if self.blocks.contains_key(block_id) {
                    return Some(OutputRoute {
                        block_id: *block_id,
                        section_type: section_type.unwrap_or_default(),
                    });
                }
                debug!(block_id, "ignoring output for unknown block");
            }
            TerminalEvent::BlockEnded {
                block_id,
                exit_code,
                ended_at,
            } => {
                if !self.with_block(*block_id, |block| block.finish(*exit_code, *ended_at)) {
                    debug!(block_id, "ignoring end for unknown or finished block");
                }
            }
            TerminalEvent::BlockCancelled {
                block_id,
                reason,
                ended_at,
            } => {
                if !self.with_block(*block_id, |block| block.cancel(reason.clone(), *ended_at)) {
                    debug!(block_id, "ignoring cancel for unknown or finished block");
                }
            }
            TerminalEvent::UserScrolled => {
                self.follow_mode = false;
            }
            TerminalEvent::UserSelectedBlock { block_id } => match block_id {
                None => self.selection = Selection::None,
                Some(id) if self.blocks.contains_key(id) => {
                    self.selection = Selection::Block { block_id: *id };
                }
                Some(id) => debug!(block_id = id, "ignoring selection of unknown block"),
            },
            TerminalEvent::UserToggledFollowMode { on } => {
                self.follow_mode = *on;
            }
            TerminalEvent::UserToggledSearch { open } => {
                self.search_open = *open;
                if !open {
                    self.search_query.clear();
                }
            }
            TerminalEvent::AiThinkingStarted { query_id } => {
                self.ai.is_thinking = true;
                self.ai.current_query_id = Some(query_id.clone());
                self.ai.last_error = None;
            }
            TerminalEvent::AiThinkingEnded => {
                self.ai.is_thinking = false;
                self.ai.current_query_id = None;
            }
            TerminalEvent::AiErrorOccurred {
                message,
                suggestion,
                ..
            } => {
                self.ai.is_thinking = false;
                self.ai.last_error = Some(AiError {
                    message: message.clone(),
                    suggestion: suggestion.clone(),
                });
            }
        }
        None
    }

    fn create_block(
        &mut self,
        block_id: BlockId,
        command_text: &str,
        source: crate::types::BlockSource,
    ) {
        if self.blocks.contains_key(&block_id) {
            debug!(block_id, "ignoring duplicate block creation");
            return;
        }
        let block = CommandBlock::new(
            block_id,
            command_text.to_string(),
            source,
            self.host_label.clone(),
            self.cwd_label.clone(),
        );
        self.blocks.insert(block_id, block);
        self.block_order.push(block_id);
        self.next_block_id = self.next_block_id.max(block_id.saturating_add(1));
    }

    fn with_block(&mut self, block_id: BlockId, apply: impl FnOnce(&mut CommandBlock) -> bool) -> bool {
        self.blocks.get_mut(&block_id).is_some_and(apply)
    }
}

impl FlushTarget for BlockStore {
    fn append_text(&mut self, block_id: BlockId, payload: &str, section_type: SectionType) -> bool {
        let Some(block) = self.blocks.get_mut(&block_id) else {
            return false;
        };
        block.output.append_text(payload, section_type);
        true
    }

    fn on_flush(&mut self, block_id: BlockId, appended: &str) {
        if let Some(block) = self.blocks.get_mut(&block_id) {
            block.metrics.bytes_received += appended.len();
            block.metrics.line_count = block.output.line_count();
        }
    }
}

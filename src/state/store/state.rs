use super::super::block::CommandBlock;
use super::super::snapshot::TerminalStateSnapshot;
use crate::buffer::SectionId;
use crate::types::{BlockId, Millis};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    Block {
        block_id: BlockId,
    },
}

impl Selection {
    pub fn block_id(&self) -> Option<BlockId> {
        match self {
            Selection::None => None,
            Selection::Block { block_id } => Some(*block_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiError {
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiState {
    pub is_thinking: bool,
    pub current_query_id: Option<String>,
    pub last_error: Option<AiError>,
}

/// Authoritative terminal state for one session timeline.
///
/// Structural changes arrive through [`BlockStore::reduce`]; output arrives
/// through the pipeline's [`crate::pipeline::FlushTarget`] implementation.
#[derive(Debug, Clone)]
pub struct BlockStore {
    pub(super) blocks: HashMap<BlockId, CommandBlock>,
    pub(super) block_order: Vec<BlockId>,
    pub(super) selection: Selection,
    pub(super) follow_mode: bool,
    pub(super) search_open: bool,
    pub(super) search_query: String,
    pub(super) next_block_id: BlockId,
    pub(super) ai: AiState,
    pub(super) host_label: String,
    pub(super) cwd_label: String,
}

impl Default for BlockStore {
    fn default() -> Self {
        Self {
            blocks: HashMap::new(),
            block_order: Vec::new(),
            selection: Selection::None,
            follow_mode: true,
            search_open: false,
            search_query: String::new(),
            next_block_id: 1,
            ai: AiState::default(),
            host_label: String::new(),
            cwd_label: String::new(),
        }
    }
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_labels(host_label: impl Into<String>, cwd_label: impl Into<String>) -> Self {
        let mut store = Self::default();
        store.set_labels(host_label, cwd_label);
        store
    }

    /// Labels stamped onto blocks created from now on.
    pub fn set_labels(&mut self, host_label: impl Into<String>, cwd_label: impl Into<String>) {
        self.host_label = host_label.into();
        self.cwd_label = cwd_label.into();
    }

    pub fn host_label(&self) -> &str {
        &self.host_label
    }

    pub fn cwd_label(&self) -> &str {
        &self.cwd_label
    }

    pub fn blocks(&self) -> Vec<&CommandBlock> {
        self.block_order
            .iter()
            .filter_map(|id| self.blocks.get(id))
            .collect()
    }

    pub fn block(&self, block_id: BlockId) -> Option<&CommandBlock> {
        self.blocks.get(&block_id)
    }

    pub fn block_order(&self) -> &[BlockId] {
        &self.block_order
    }

    pub fn len(&self) -> usize {
        self.block_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block_order.is_empty()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn is_following(&self) -> bool {
        self.follow_mode
    }

    pub fn is_search_open(&self) -> bool {
        self.search_open
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn is_ai_thinking(&self) -> bool {
        self.ai.is_thinking
    }

    pub fn ai_error(&self) -> Option<&AiError> {
        self.ai.last_error.as_ref()
    }

    pub fn current_query_id(&self) -> Option<&str> {
        self.ai.current_query_id.as_deref()
    }

    pub fn ai_state(&self) -> &AiState {
        &self.ai
    }

    /// The id the next block will get. Does not reserve it.
    pub fn next_block_id(&self) -> BlockId {
        self.next_block_id
    }

    /// Reserve an id for a block the caller is about to announce.
    pub fn allocate_block_id(&mut self) -> BlockId {
        let id = self.next_block_id;
        self.next_block_id += 1;
        id
    }

    pub fn running_block_ids(&self) -> Vec<BlockId> {
        self.blocks()
            .into_iter()
            .filter(|block| block.is_running())
            .map(|block| block.id)
            .collect()
    }

    /// Blocks that have not reached a terminal status yet, queued ones
    /// included.
    pub fn unfinished_block_ids(&self) -> Vec<BlockId> {
        self.blocks()
            .into_iter()
            .filter(|block| !block.status.is_terminal())
            .map(|block| block.id)
            .collect()
    }

    /// Neighbour of the selected block in display order, for keyboard
    /// navigation. With nothing selected, moving forward lands on the first
    /// block and moving back on the last.
    pub fn adjacent_block(&self, delta: isize) -> Option<BlockId> {
        if self.block_order.is_empty() {
            return None;
        }
        let last = self.block_order.len() - 1;
        let current = self
            .selection
            .block_id()
            .and_then(|id| self.block_order.iter().position(|candidate| *candidate == id));
        let target = match current {
            None if delta < 0 => last,
            None => 0,
            Some(position) => position.saturating_add_signed(delta).min(last),
        };
        self.block_order.get(target).copied()
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn toggle_block_collapsed(&mut self, block_id: BlockId) -> bool {
        let Some(block) = self.blocks.get_mut(&block_id) else {
            return false;
        };
        block.is_collapsed = !block.is_collapsed;
        true
    }

    pub fn toggle_section_collapsed(&mut self, block_id: BlockId, section_id: SectionId) -> bool {
        self.blocks
            .get_mut(&block_id)
            .is_some_and(|block| block.output.toggle_section_collapse(section_id))
    }

    pub fn set_section_collapsed(
        &mut self,
        block_id: BlockId,
        section_id: SectionId,
        collapsed: bool,
    ) -> bool {
        self.blocks
            .get_mut(&block_id)
            .is_some_and(|block| block.output.set_section_collapsed(section_id, collapsed))
    }

    /// Drop every block and reset view state. Host and cwd labels survive.
    pub fn clear(&mut self) {
        let host_label = std::mem::take(&mut self.host_label);
        let cwd_label = std::mem::take(&mut self.cwd_label);
        *self = Self::with_labels(host_label, cwd_label);
    }

    pub fn snapshot(&self, system_id: impl Into<String>, created_at: Millis) -> TerminalStateSnapshot {
        TerminalStateSnapshot {
            system_id: system_id.into(),
            blocks: self.blocks.clone(),
            block_order: self.block_order.clone(),
            selection: self.selection,
            follow_mode: self.follow_mode,
            search_open: self.search_open,
            search_query: self.search_query.clone(),
            next_block_id: self.next_block_id,
            ai: self.ai.clone(),
            host_label: self.host_label.clone(),
            cwd_label: self.cwd_label.clone(),
            created_at,
        }
    }

    pub fn restore(&mut self, snapshot: &TerminalStateSnapshot) {
        *self = Self {
            blocks: snapshot.blocks.clone(),
            block_order: snapshot.block_order.clone(),
            selection: snapshot.selection,
            follow_mode: snapshot.follow_mode,
            search_open: snapshot.search_open,
            search_query: snapshot.search_query.clone(),
            next_block_id: snapshot.next_block_id,
            ai: snapshot.ai.clone(),
            host_label: snapshot.host_label.clone(),
            cwd_label: snapshot.cwd_label.clone(),
        };
    }
}

use super::block::CommandBlock;
use super::store::{AiState, Selection};
use crate::types::{BlockId, Millis};
use std::collections::HashMap;

/// Parked copy of a whole block store.
///
/// Owns its data outright: it is built by cloning the live store and restored
/// by cloning back, so neither side can observe later mutation of the other.
#[derive(Debug, Clone)]
pub struct TerminalStateSnapshot {
    pub system_id: String,
    pub blocks: HashMap<BlockId, CommandBlock>,
    pub block_order: Vec<BlockId>,
    pub selection: Selection,
    pub follow_mode: bool,
    pub search_open: bool,
    pub search_query: String,
    pub next_block_id: BlockId,
    pub ai: AiState,
    pub host_label: String,
    pub cwd_label: String,
    pub created_at: Millis,
}

impl TerminalStateSnapshot {
    pub fn block_count(&self) -> usize {
        self.block_order.len()
    }
}

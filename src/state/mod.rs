mod block;
mod snapshot;
mod store;

pub use block::{BlockMetrics, BlockStatus, CommandBlock};
pub use snapshot::TerminalStateSnapshot;
pub use store::{
    AiError, AiState, BlockStore, OutputRoute, SearchMatch, SearchResult, Selection,
    MAX_SEARCH_LINES_PER_BLOCK, MAX_SEARCH_RESULTS,
};

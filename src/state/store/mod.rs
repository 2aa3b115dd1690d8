mod reducer;
mod search;
mod state;


pub use reducer::OutputRoute;
pub use search::{SearchMatch, SearchResult, MAX_SEARCH_LINES_PER_BLOCK, MAX_SEARCH_RESULTS};
pub use state::{AiError, AiState, BlockStore, Selection};

mod event;

pub use event::{BlockId, BlockSource, Millis, SectionType, TerminalEvent};

pub mod decode;
pub mod replay;
pub mod shell;

pub use decode::Utf8ChunkDecoder;
pub use replay::{replay_file, EventLineParser, ReplaySummary};
pub use shell::{BridgeMessage, ShellBridge};

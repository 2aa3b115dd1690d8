mod append;
mod scheduler;

pub use append::{AppendPipeline, FlushReport, FlushTarget};
pub use scheduler::{FrameScheduler, FrameTick, ManualScheduler, TokioFrameScheduler};

//! Block-structured terminal engine: ANSI interpretation, per-block output
//! buffers, frame-batched appends, an event-sourced block store with
//! per-system snapshots, and the shell bridge and TUI that host them.

pub mod ansi;
pub mod bridge;
pub mod buffer;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod types;
pub mod ui;
pub mod util;

#[cfg(test)]
mod test_support;

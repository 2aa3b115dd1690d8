use super::scheduler::FrameScheduler;
use crate::types::{BlockId, SectionType};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Receiver of a pipeline flush, normally the block store that owns the
/// output buffers.
pub trait FlushTarget {
    /// Apply one coalesced run of same-section output. Returns `false` when
    /// the block no longer exists.
    fn append_text(&mut self, block_id: BlockId, payload: &str, section_type: SectionType)
        -> bool;

    /// Called once per block per flush with everything appended to it.
    fn on_flush(&mut self, block_id: BlockId, appended: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub block_id: BlockId,
    pub groups: usize,
    pub appended_bytes: usize,
}

#[derive(Debug, Clone)]
struct QueuedChunk {
    payload: String,
    section_type: SectionType,
}

/// Coalesces bursts of output into one buffer mutation per block per frame.
pub struct AppendPipeline {
    queues: Vec<(BlockId, Vec<QueuedChunk>)>,
    positions: HashMap<BlockId, usize>,
    flush_scheduled: bool,
    scheduler: Box<dyn FrameScheduler>,
}

impl AppendPipeline {
    pub fn new(scheduler: Box<dyn FrameScheduler>) -> Self {
        Self {
            queues: Vec::new(),
            positions: HashMap::new(),
            flush_scheduled: false,
            scheduler,
        }
    }

    pub fn enqueue(
        &mut self,
        block_id: BlockId,
        payload: impl Into<String>,
        section_type: SectionType,
    ) {
        let payload = payload.into();
        if payload.is_empty() {
            return;
        }

        let chunk = QueuedChunk {
            payload,
            section_type,
        };
        match self.positions.get(&block_id) {
            Some(&position) => self.queues[position].1.push(chunk),
            None => {
                self.positions.insert(block_id, self.queues.len());
                self.queues.push((block_id, vec![chunk]));
            }
        }

        if !self.flush_scheduled {
            self.flush_scheduled = true;
            self.scheduler.schedule();
        }
    }

    pub fn is_flush_scheduled(&self) -> bool {
        self.flush_scheduled
    }

    pub fn queued_blocks(&self) -> usize {
        self.queues.len()
    }

    /// Apply everything queued since the last frame, in enqueue order.
    pub fn flush<T: FlushTarget + ?Sized>(&mut self, target: &mut T) -> Vec<FlushReport> {
        self.flush_scheduled = false;
        self.positions.clear();
        let queues = std::mem::take(&mut self.queues);

        let mut reports = Vec::with_capacity(queues.len());
        for (block_id, chunks) in queues {
            let groups = coalesce(chunks);
            let mut appended = String::new();
            let mut applied = 0usize;
            for group in &groups {
                if !target.append_text(block_id, &group.payload, group.section_type) {
                    break;
                }
                appended.push_str(&group.payload);
                applied += 1;
            }

            if applied == 0 {
                debug!(block_id, "dropping queued output for unknown block");
                continue;
            }

            target.on_flush(block_id, &appended);
            trace!(block_id, groups = applied, bytes = appended.len(), "flushed output");
            reports.push(FlushReport {
                block_id,
                groups: applied,
                appended_bytes: appended.len(),
            });
        }
        reports
    }

    /// Drop queued output and any pending frame without touching a buffer.
    pub fn clear(&mut self) {
        if self.flush_scheduled {
            self.scheduler.cancel();
        }
        self.flush_scheduled = false;
        self.queues.clear();
        self.positions.clear();
    }
}

/// Merge consecutive chunks that share a section type, keeping order.
fn coalesce(chunks: Vec<QueuedChunk>) -> Vec<QueuedChunk> {
    let mut groups: Vec<QueuedChunk> = Vec::new();
    for chunk in chunks {
        if let Some(last) = groups.last_mut() {
            if last.section_type == chunk.section_type {
                last.payload.push_str(&chunk.payload);
                continue;
            }
        }
        groups.push(chunk);
    }
    groups
}

use super::bus::{EventBus, SubscriptionId};
use crate::pipeline::{AppendPipeline, FlushReport, FrameScheduler};
use crate::state::BlockStore;
use crate::types::{BlockId, TerminalEvent};

/// One terminal timeline: the authoritative store, the append pipeline that
/// feeds its buffers and the bus that observers listen on.
pub struct TerminalSession {
    store: BlockStore,
    pipeline: AppendPipeline,
    bus: EventBus,
}

impl TerminalSession {
    pub fn new(scheduler: Box<dyn FrameScheduler>) -> Self {
        Self {
            store: BlockStore::new(),
            pipeline: AppendPipeline::new(scheduler),
            bus: EventBus::new(),
        }
    }

    pub fn with_labels(
        scheduler: Box<dyn FrameScheduler>,
        host_label: impl Into<String>,
        cwd_label: impl Into<String>,
    ) -> Self {
        let mut session = Self::new(scheduler);
        session.store.set_labels(host_label, cwd_label);
        session
    }

    /// Reduce, notify subscribers, then queue any output the event carries.
    pub fn dispatch(&mut self, event: TerminalEvent) {
        let route = self.store.reduce(&event);
        self.bus.publish(&event);

        let Some(route) = route else {
            return;
        };
        if let TerminalEvent::BlockOutputChunk { payload, .. } = event {
            self.pipeline
                .enqueue(route.block_id, payload, route.section_type);
        }
    }

    /// Apply everything the pipeline has queued. Hosts call this when their
    /// frame scheduler fires.
    pub fn run_frame(&mut self) -> Vec<FlushReport> {
        self.pipeline.flush(&mut self.store)
    }

    /// Drop queued output first so nothing lands in the emptied store.
    pub fn clear(&mut self) {
        self.pipeline.clear();
        self.store.clear();
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn FnMut(&TerminalEvent)>) -> SubscriptionId {
        self.bus.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn allocate_block_id(&mut self) -> BlockId {
        self.store.allocate_block_id()
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// View-only actions (collapse, search text) that are not events.
    pub fn store_mut(&mut self) -> &mut BlockStore {
        &mut self.store
    }

    pub fn pipeline(&self) -> &AppendPipeline {
        &self.pipeline
    }

    pub(crate) fn pipeline_mut(&mut self) -> &mut AppendPipeline {
        &mut self.pipeline
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

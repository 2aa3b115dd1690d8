use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Deferred "run a frame soon" request.
///
/// The pipeline never calls back into the scheduler's owner itself; the host
/// observes the request (a channel message, a flag) and calls
/// `TerminalSession::run_frame` when the frame is due.
pub trait FrameScheduler {
    fn schedule(&mut self);
    fn cancel(&mut self);
}

/// Scheduler for tests and headless hosts that drive frames by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    pending: Rc<Cell<bool>>,
    scheduled: Rc<Cell<usize>>,
    cancelled: Rc<Cell<usize>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    /// Consume the outstanding request, if any.
    pub fn take_pending(&self) -> bool {
        self.pending.replace(false)
    }

    pub fn schedule_count(&self) -> usize {
        self.scheduled.get()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancelled.get()
    }
}

impl FrameScheduler for ManualScheduler {
    fn schedule(&mut self) {
        self.pending.set(true);
        self.scheduled.set(self.scheduled.get() + 1);
    }

    fn cancel(&mut self) {
        self.pending.set(false);
        self.cancelled.set(self.cancelled.get() + 1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick;

/// Frame timer on the tokio runtime: each request sleeps one frame interval
/// and then sends a [`FrameTick`] to the host loop.
pub struct TokioFrameScheduler {
    interval: Duration,
    frame_tx: mpsc::UnboundedSender<FrameTick>,
    pending: Option<CancellationToken>,
}

impl TokioFrameScheduler {
    pub fn new(interval: Duration) -> (Self, mpsc::UnboundedReceiver<FrameTick>) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            interval,
            frame_tx,
            pending: None,
        };
        (scheduler, frame_rx)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FrameScheduler for TokioFrameScheduler {
    fn schedule(&mut self) {
        self.cancel();

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // No runtime to sleep on: the next rendering opportunity is now.
            let _ = self.frame_tx.send(FrameTick);
            return;
        };

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let frame_tx = self.frame_tx.clone();
        let interval = self.interval;
        handle.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(interval) => {
                    let _ = frame_tx.send(FrameTick);
                }
            }
        });
        self.pending = Some(token);
    }

    fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

impl Drop for TokioFrameScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_scheduler_shares_state_between_clones() {
        let observer = ManualScheduler::new();
        let mut scheduler = observer.clone();
        scheduler.schedule();
        assert!(observer.is_pending());
        assert_eq!(observer.schedule_count(), 1);
        scheduler.cancel();
        assert!(!observer.is_pending());
        assert_eq!(observer.cancel_count(), 1);
    }

    #[tokio::test]
    async fn test_tokio_scheduler_delivers_one_tick() {
        let (mut scheduler, mut frame_rx) = TokioFrameScheduler::new(Duration::from_millis(1));
        scheduler.schedule();
        let tick = tokio::time::timeout(Duration::from_secs(2), frame_rx.recv())
            .await
            .expect("frame tick before timeout");
        assert_eq!(tick, Some(FrameTick));
    }

    #[tokio::test]
    async fn test_tokio_scheduler_cancel_suppresses_tick() {
        let (mut scheduler, mut frame_rx) = TokioFrameScheduler::new(Duration::from_millis(20));
        scheduler.schedule();
        scheduler.cancel();
        let outcome = tokio::time::timeout(Duration::from_millis(80), frame_rx.recv()).await;
        assert!(outcome.is_err(), "cancelled frame must not tick");
    }

    #[test]
    fn test_tokio_scheduler_without_runtime_ticks_immediately() {
        let (mut scheduler, mut frame_rx) = TokioFrameScheduler::new(Duration::from_millis(16));
        scheduler.schedule();
        assert_eq!(frame_rx.try_recv().ok(), Some(FrameTick));
    }
}

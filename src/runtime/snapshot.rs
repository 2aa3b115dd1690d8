use super::session::TerminalSession;
use crate::state::TerminalStateSnapshot;
use crate::util::now_millis;
use std::collections::HashMap;
use tracing::{debug, info};

/// Keeps one live session and parks the state of every other system the user
/// has visited, so switching back resumes where they left off.
pub struct SessionSnapshotManager {
    session: TerminalSession,
    active_system: Option<String>,
    snapshots: HashMap<String, TerminalStateSnapshot>,
    local_label: String,
}

impl SessionSnapshotManager {
    pub fn new(session: TerminalSession) -> Self {
        let local_label = session.store().host_label().to_string();
        Self {
            session,
            active_system: None,
            snapshots: HashMap::new(),
            local_label,
        }
    }

    /// Start with `system_id` already active.
    pub fn with_active_system(session: TerminalSession, system_id: Option<&str>) -> Self {
        let mut manager = Self::new(session);
        manager.active_system = system_id.map(str::to_string);
        if let Some(system_id) = system_id {
            manager.relabel(system_id);
        }
        manager
    }

    /// Park the live state under the active system and bring up `target`.
    /// Returns `false` when `target` is already active.
    pub fn switch_to_system(&mut self, target: Option<&str>) -> bool {
        if self.active_system.as_deref() == target {
            return false;
        }

        // Queued output belongs to the outgoing timeline.
        self.session.pipeline_mut().clear();

        if let Some(current) = self.active_system.take() {
            let snapshot = self.session.store().snapshot(current.clone(), now_millis());
            debug!(system = %current, blocks = snapshot.block_count(), "parked session");
            self.snapshots.insert(current, snapshot);
        }

        self.session.store_mut().clear();
        match target {
            Some(system_id) => {
                match self.snapshots.get(system_id) {
                    Some(snapshot) => {
                        self.session.store_mut().restore(snapshot);
                        info!(system = %system_id, blocks = snapshot.block_count(), "resumed session");
                    }
                    None => {
                        info!(system = %system_id, "started empty session");
                    }
                }
                self.relabel(system_id);
            }
            None => {
                let cwd = self.session.store().cwd_label().to_string();
                let local = self.local_label.clone();
                self.session.store_mut().set_labels(local, cwd);
            }
        }
        self.active_system = target.map(str::to_string);
        true
    }

    pub fn has_snapshot(&self, system_id: &str) -> bool {
        self.snapshots.contains_key(system_id)
    }

    pub fn clear_snapshot(&mut self, system_id: &str) -> bool {
        self.snapshots.remove(system_id).is_some()
    }

    pub fn clear_all_snapshots(&mut self) {
        self.snapshots.clear();
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn active_system(&self) -> Option<&str> {
        self.active_system.as_deref()
    }

    pub fn session(&self) -> &TerminalSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut TerminalSession {
        &mut self.session
    }

    fn relabel(&mut self, system_id: &str) {
        let cwd = self.session.store().cwd_label().to_string();
        self.session.store_mut().set_labels(system_id, cwd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ManualScheduler;
    use crate::types::{BlockSource, TerminalEvent};

    fn manager() -> (SessionSnapshotManager, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        let session = TerminalSession::with_labels(Box::new(scheduler.clone()), "local", "~");
        (SessionSnapshotManager::new(session), scheduler)
    }

    fn run(manager: &mut SessionSnapshotManager, block_id: u64, output: &str) {
        let session = manager.session_mut();
        session.dispatch(TerminalEvent::BlockCreated {
            block_id,
            command_text: format!("cmd {block_id}"),
            source: BlockSource::User,
        });
        session.dispatch(TerminalEvent::BlockOutputChunk {
            block_id,
            payload: output.to_string(),
            section_type: None,
        });
        session.run_frame();
    }

    #[test]
    fn test_switching_to_active_system_is_noop() {
        let (mut manager, scheduler) = manager();
        assert!(!manager.switch_to_system(None));
        assert!(manager.switch_to_system(Some("sys-1")));
        assert!(!manager.switch_to_system(Some("sys-1")));
        assert_eq!(manager.active_system(), Some("sys-1"));
        assert_eq!(scheduler.cancel_count(), 0);
    }

    #[test]
    fn test_local_timeline_is_not_parked() {
        let (mut manager, _) = manager();
        run(&mut manager, 1, "local\n");
        manager.switch_to_system(Some("sys-1"));
        assert!(manager.session().store().is_empty());
        manager.switch_to_system(None);
        assert!(manager.session().store().is_empty());
        assert_eq!(manager.session().store().host_label(), "local");
        assert_eq!(manager.snapshot_count(), 1);
    }

    #[test]
    fn test_pending_output_is_dropped_on_switch() {
        let (mut manager, scheduler) = manager();
        manager.switch_to_system(Some("sys-1"));
        run(&mut manager, 1, "kept\n");
        manager.session_mut().dispatch(TerminalEvent::BlockOutputChunk {
            block_id: 1,
            payload: "late\n".to_string(),
            section_type: None,
        });
        manager.switch_to_system(Some("sys-2"));
        assert_eq!(scheduler.cancel_count(), 1);
        assert!(manager.session_mut().run_frame().is_empty());

        manager.switch_to_system(Some("sys-1"));
        let block = manager.session().store().block(1).unwrap();
        assert_eq!(block.output().all_text(), "kept");
    }

    #[test]
    fn test_labels_follow_active_system() {
        let (mut manager, _) = manager();
        manager.switch_to_system(Some("db-1"));
        run(&mut manager, 1, "x\n");
        assert_eq!(manager.session().store().block(1).unwrap().host_label, "db-1");
    }

    #[test]
    fn test_clear_snapshot_forgets_timeline() {
        let (mut manager, _) = manager();
        manager.switch_to_system(Some("a"));
        run(&mut manager, 1, "a\n");
        manager.switch_to_system(Some("b"));
        assert!(manager.has_snapshot("a"));
        assert!(manager.clear_snapshot("a"));
        assert!(!manager.clear_snapshot("a"));
        manager.switch_to_system(Some("a"));
        assert!(manager.session().store().is_empty());

        manager.clear_all_snapshots();
        assert!(!manager.has_snapshot("b"));
    }
}

use super::frontend::{FrontendAdapter, ScrollAction, UserInputEvent};
use super::session::TerminalSession;
use super::snapshot::SessionSnapshotManager;
use crate::bridge::{BridgeMessage, ShellBridge};
use crate::config::Config;
use crate::pipeline::{FrameTick, TokioFrameScheduler};
use crate::types::{BlockSource, TerminalEvent};
use crate::util::now_millis;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

const UI_TICK: Duration = Duration::from_millis(16);
const SWITCH_CANCEL_REASON: &str = "system switched";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostCommand {
    Host(String),
    Local,
    Search(String),
    CloseSearch,
    Clear,
    Quit,
}

impl HostCommand {
    /// Parse the text after the leading `:`.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (name, argument) = match input.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (input, ""),
        };
        match (name, argument) {
            ("host", host) if !host.is_empty() => Some(HostCommand::Host(host.to_string())),
            ("local", "") => Some(HostCommand::Local),
            ("search", query) => Some(HostCommand::Search(query.to_string())),
            ("close", "") => Some(HostCommand::CloseSearch),
            ("clear", "") => Some(HostCommand::Clear),
            ("quit" | "q", "") => Some(HostCommand::Quit),
            _ => None,
        }
    }
}

/// Host loop: routes bridge events and user input into the live session and
/// flushes output when the frame scheduler fires.
pub struct Runtime {
    manager: SessionSnapshotManager,
    bridge: ShellBridge,
    bridge_rx: mpsc::UnboundedReceiver<BridgeMessage>,
    frame_rx: mpsc::UnboundedReceiver<FrameTick>,
    local_system: String,
    scroll_offset: usize,
    notice: Option<String>,
    quit_requested: bool,
}

impl Runtime {
    pub fn new(config: &Config) -> Self {
        let (scheduler, frame_rx) = TokioFrameScheduler::new(config.frame_interval());
        let session =
            TerminalSession::with_labels(Box::new(scheduler), config.host.clone(), config.cwd_label());
        let manager = SessionSnapshotManager::with_active_system(session, Some(config.host.as_str()));
        let (bridge, bridge_rx) = ShellBridge::new(config);
        Self {
            manager,
            bridge,
            bridge_rx,
            frame_rx,
            local_system: config.host.clone(),
            scroll_offset: 0,
            notice: None,
            quit_requested: false,
        }
    }

    pub async fn run<F: FrontendAdapter>(&mut self, frontend: &mut F) {
        let mut ui_tick = tokio::time::interval(UI_TICK);
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(system = ?self.manager.active_system(), "runtime started");

        loop {
            tokio::select! {
                Some(message) = self.bridge_rx.recv() => self.on_bridge_message(message),
                Some(FrameTick) = self.frame_rx.recv() => self.run_frame(),
                _ = ui_tick.tick() => {
                    while let Some(input) = frontend.poll_user_input(self) {
                        self.handle_input(input);
                    }
                    if self.quit_requested || frontend.should_quit() {
                        break;
                    }
                    frontend.render(self);
                    self.scroll_offset = self.scroll_offset.min(frontend.max_scroll());
                }
            }
        }

        let cancelled = self.bridge.cancel_all();
        info!(cancelled, "runtime stopped");
    }

    pub fn manager(&self) -> &SessionSnapshotManager {
        &self.manager
    }

    pub fn session(&self) -> &TerminalSession {
        self.manager.session()
    }

    /// Lines scrolled up from the bottom of the block list.
    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn handle_input(&mut self, input: UserInputEvent) {
        match input {
            UserInputEvent::Submit(text) => self.submit(text),
            UserInputEvent::Interrupt => self.interrupt(),
            UserInputEvent::Scroll(action) => self.scroll(action),
            UserInputEvent::SelectBlock(delta) => {
                let target = self.session().store().adjacent_block(delta);
                if target.is_some() {
                    self.dispatch(TerminalEvent::UserSelectedBlock { block_id: target });
                }
            }
            UserInputEvent::ToggleBlockCollapse => {
                if let Some(block_id) = self.session().store().selection().block_id() {
                    self.manager
                        .session_mut()
                        .store_mut()
                        .toggle_block_collapsed(block_id);
                }
            }
            UserInputEvent::ToggleOutputCollapse => self.toggle_output_sections(),
            UserInputEvent::ToggleSearch => {
                let open = !self.session().store().is_search_open();
                self.dispatch(TerminalEvent::UserToggledSearch { open });
            }
        }
    }

    pub fn on_bridge_message(&mut self, message: BridgeMessage) {
        if message.generation != self.bridge.generation() {
            trace!(generation = message.generation, "dropping event from previous system");
            return;
        }
        if let TerminalEvent::BlockEnded { block_id, .. }
        | TerminalEvent::BlockCancelled { block_id, .. } = &message.event
        {
            self.bridge.finished(*block_id);
        }
        self.dispatch(message.event);
    }

    pub fn run_frame(&mut self) {
        let reports = self.manager.session_mut().run_frame();
        trace!(blocks = reports.len(), "frame");
    }

    fn dispatch(&mut self, event: TerminalEvent) {
        self.manager.session_mut().dispatch(event);
    }

    fn submit(&mut self, text: String) {
        self.notice = None;
        if let Some(command) = text.strip_prefix(':') {
            match HostCommand::parse(command) {
                Some(command) => self.run_host_command(command),
                None => self.notice = Some(format!("unknown command: {text}")),
            }
            return;
        }

        if self.session().store().is_search_open() {
            self.manager.session_mut().store_mut().set_search_query(text);
            return;
        }

        self.dispatch(TerminalEvent::UserSubmittedCommand {
            text: text.clone(),
            source: BlockSource::User,
            context_block_ids: None,
        });
        let block_id = self.manager.session_mut().allocate_block_id();
        self.dispatch(TerminalEvent::BlockCreated {
            block_id,
            command_text: text.clone(),
            source: BlockSource::User,
        });
        self.scroll_offset = 0;
        self.bridge.run(block_id, &text, self.manager.active_system());
    }

    fn run_host_command(&mut self, command: HostCommand) {
        debug!(?command, "host command");
        match command {
            HostCommand::Host(system) => self.switch_system(&system),
            HostCommand::Local => {
                let local = self.local_system.clone();
                self.switch_system(&local);
            }
            HostCommand::Search(query) => {
                self.dispatch(TerminalEvent::UserToggledSearch { open: true });
                self.manager.session_mut().store_mut().set_search_query(query);
            }
            HostCommand::CloseSearch => {
                self.dispatch(TerminalEvent::UserToggledSearch { open: false });
            }
            HostCommand::Clear => {
                self.bridge.advance_generation();
                self.manager.session_mut().clear();
                self.scroll_offset = 0;
            }
            HostCommand::Quit => self.quit_requested = true,
        }
    }

    /// Unfinished blocks are closed out before the timeline is parked; their
    /// processes are killed and any late output is dropped by generation.
    fn switch_system(&mut self, system: &str) {
        if self.manager.active_system() == Some(system) {
            return;
        }
        let unfinished = self.session().store().unfinished_block_ids();
        for block_id in unfinished {
            self.dispatch(TerminalEvent::BlockCancelled {
                block_id,
                reason: SWITCH_CANCEL_REASON.to_string(),
                ended_at: now_millis(),
            });
        }
        self.bridge.advance_generation();
        self.manager.switch_to_system(Some(system));
        self.scroll_offset = 0;
        self.notice = Some(format!("switched to {system}"));
    }

    /// A block still waiting for its process counts as running here.
    fn interrupt(&mut self) {
        let unfinished = self.session().store().unfinished_block_ids();
        if unfinished.is_empty() {
            self.quit_requested = true;
            return;
        }
        for block_id in unfinished {
            self.bridge.cancel(block_id);
        }
    }

    fn scroll(&mut self, action: ScrollAction) {
        let following = self.session().store().is_following();
        match action {
            ScrollAction::LineUp | ScrollAction::PageUp(_) | ScrollAction::Home => {
                let lines = match action {
                    ScrollAction::PageUp(lines) => lines,
                    ScrollAction::Home => usize::MAX / 2,
                    _ => 1,
                };
                self.scroll_offset = self.scroll_offset.saturating_add(lines);
                if following {
                    self.dispatch(TerminalEvent::UserScrolled);
                }
            }
            ScrollAction::LineDown | ScrollAction::PageDown(_) => {
                let lines = match action {
                    ScrollAction::PageDown(lines) => lines,
                    _ => 1,
                };
                self.scroll_offset = self.scroll_offset.saturating_sub(lines);
                if self.scroll_offset == 0 && !following {
                    self.dispatch(TerminalEvent::UserToggledFollowMode { on: true });
                }
            }
            ScrollAction::End => {
                self.scroll_offset = 0;
                if !following {
                    self.dispatch(TerminalEvent::UserToggledFollowMode { on: true });
                }
            }
        }
    }

    /// Expand every output section of the selected block, or collapse them
    /// all when they are already expanded.
    fn toggle_output_sections(&mut self) {
        let Some(block_id) = self.session().store().selection().block_id() else {
            return;
        };
        let Some(block) = self.session().store().block(block_id) else {
            return;
        };
        let output_sections: Vec<(usize, bool)> = block
            .output()
            .sections()
            .iter()
            .filter(|section| section.section_type.collapsed_by_default())
            .map(|section| (section.id, section.collapsed))
            .collect();
        let collapse = output_sections.iter().all(|(_, collapsed)| !collapsed);
        let store = self.manager.session_mut().store_mut();
        for (section_id, _) in output_sections {
            store.set_section_collapsed(block_id, section_id, collapse);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BlockStatus;
    use std::path::PathBuf;

    fn config() -> Config {
        Config {
            shell: "/bin/sh".to_string(),
            ssh_program: "ssh".to_string(),
            host: "local".to_string(),
            frame_interval_ms: 4,
            log_path: None,
            log_filter: "info".to_string(),
            working_dir: PathBuf::from("/"),
        }
    }

    async fn drain_until_idle(runtime: &mut Runtime) {
        for _ in 0..500 {
            if runtime.bridge.running_count() == 0
                && runtime.session().store().unfinished_block_ids().is_empty()
            {
                break;
            }
            tokio::select! {
                Some(message) = runtime.bridge_rx.recv() => runtime.on_bridge_message(message),
                _ = tokio::time::sleep(Duration::from_millis(20)) => {}
            }
        }
        while let Ok(message) = runtime.bridge_rx.try_recv() {
            runtime.on_bridge_message(message);
        }
        runtime.run_frame();
    }

    #[test]
    fn test_host_command_parsing() {
        assert_eq!(
            HostCommand::parse("host  db-1 "),
            Some(HostCommand::Host("db-1".to_string()))
        );
        assert_eq!(HostCommand::parse("host"), None);
        assert_eq!(HostCommand::parse("local"), Some(HostCommand::Local));
        assert_eq!(
            HostCommand::parse("search disk full"),
            Some(HostCommand::Search("disk full".to_string()))
        );
        assert_eq!(HostCommand::parse("q"), Some(HostCommand::Quit));
        assert_eq!(HostCommand::parse("quit now"), None);
        assert_eq!(HostCommand::parse("reboot"), None);
    }

    #[tokio::test]
    async fn test_submitted_command_becomes_finished_block() {
        let mut runtime = Runtime::new(&config());
        runtime.handle_input(UserInputEvent::Submit("echo hi".to_string()));
        drain_until_idle(&mut runtime).await;

        let store = runtime.session().store();
        assert_eq!(store.len(), 1);
        let block = store.block(1).unwrap();
        assert_eq!(block.command_text, "echo hi");
        assert_eq!(block.host_label, "local");
        assert_eq!(block.status.label(), "ok");
        assert_eq!(block.output().all_text(), "$ echo hi\nhi");
    }

    #[tokio::test]
    async fn test_interrupt_without_running_blocks_quits() {
        let mut runtime = Runtime::new(&config());
        runtime.handle_input(UserInputEvent::Interrupt);
        assert!(runtime.quit_requested());
    }

    #[tokio::test]
    async fn test_switching_systems_parks_and_restores_blocks() {
        let mut runtime = Runtime::new(&config());
        runtime.handle_input(UserInputEvent::Submit("echo local".to_string()));
        drain_until_idle(&mut runtime).await;

        runtime.handle_input(UserInputEvent::Submit(":host sys-2".to_string()));
        assert_eq!(runtime.manager().active_system(), Some("sys-2"));
        assert!(runtime.session().store().is_empty());
        assert_eq!(runtime.notice(), Some("switched to sys-2"));

        runtime.handle_input(UserInputEvent::Submit(":local".to_string()));
        assert_eq!(runtime.manager().active_system(), Some("local"));
        assert_eq!(runtime.session().store().len(), 1);
    }

    #[tokio::test]
    async fn test_switch_before_start_cancels_queued_block() {
        let mut runtime = Runtime::new(&config());
        runtime.handle_input(UserInputEvent::Submit("sleep 1".to_string()));
        assert_eq!(
            runtime.session().store().block(1).map(|block| block.status.clone()),
            Some(BlockStatus::Queued)
        );

        runtime.handle_input(UserInputEvent::Submit(":host other".to_string()));
        drain_until_idle(&mut runtime).await;
        runtime.handle_input(UserInputEvent::Submit(":local".to_string()));
        drain_until_idle(&mut runtime).await;

        let block = runtime.session().store().block(1).unwrap();
        assert!(block.status.is_terminal());
        assert!(matches!(
            &block.status,
            BlockStatus::Cancelled { reason, .. } if reason == SWITCH_CANCEL_REASON
        ));
        assert_eq!(block.metrics.duration_ms, None);
    }

    #[tokio::test]
    async fn test_interrupt_cancels_block_that_has_not_started() {
        let mut runtime = Runtime::new(&config());
        runtime.handle_input(UserInputEvent::Submit("sleep 5".to_string()));
        runtime.handle_input(UserInputEvent::Interrupt);
        assert!(!runtime.quit_requested());

        drain_until_idle(&mut runtime).await;
        let block = runtime.session().store().block(1).unwrap();
        assert!(matches!(block.status, BlockStatus::Cancelled { .. }));
        assert!(!runtime.quit_requested());
    }

    #[tokio::test]
    async fn test_scrolling_drives_follow_mode() {
        let mut runtime = Runtime::new(&config());
        runtime.handle_input(UserInputEvent::Scroll(ScrollAction::PageUp(10)));
        assert!(!runtime.session().store().is_following());
        assert_eq!(runtime.scroll_offset(), 10);
        runtime.handle_input(UserInputEvent::Scroll(ScrollAction::PageDown(4)));
        assert!(!runtime.session().store().is_following());
        runtime.handle_input(UserInputEvent::Scroll(ScrollAction::End));
        assert!(runtime.session().store().is_following());
        assert_eq!(runtime.scroll_offset(), 0);
    }

    #[tokio::test]
    async fn test_search_mode_submits_queries() {
        let mut runtime = Runtime::new(&config());
        runtime.handle_input(UserInputEvent::ToggleSearch);
        runtime.handle_input(UserInputEvent::Submit("needle".to_string()));
        let store = runtime.session().store();
        assert!(store.is_search_open());
        assert_eq!(store.search_query(), "needle");
        assert!(store.is_empty());

        runtime.handle_input(UserInputEvent::Submit(":close".to_string()));
        assert!(!runtime.session().store().is_search_open());
    }

    #[tokio::test]
    async fn test_unknown_host_command_sets_notice() {
        let mut runtime = Runtime::new(&config());
        runtime.handle_input(UserInputEvent::Submit(":bogus".to_string()));
        assert_eq!(runtime.notice(), Some("unknown command: :bogus"));
    }

    #[tokio::test]
    async fn test_selection_and_collapse() {
        let mut runtime = Runtime::new(&config());
        runtime.handle_input(UserInputEvent::Submit("printf 'a\\nb\\n'".to_string()));
        drain_until_idle(&mut runtime).await;
        runtime.handle_input(UserInputEvent::SelectBlock(1));
        assert_eq!(runtime.session().store().selection().block_id(), Some(1));

        runtime.handle_input(UserInputEvent::ToggleBlockCollapse);
        assert!(runtime.session().store().block(1).unwrap().is_collapsed);

        runtime.handle_input(UserInputEvent::ToggleOutputCollapse);
        let block = runtime.session().store().block(1).unwrap();
        let output = block
            .output()
            .sections()
            .iter()
            .find(|section| section.section_type.collapsed_by_default())
            .unwrap();
        assert!(!output.collapsed);
    }

    struct ScriptedFrontend {
        inputs: std::collections::VecDeque<UserInputEvent>,
        renders: usize,
    }

    impl FrontendAdapter for ScriptedFrontend {
        fn poll_user_input(&mut self, _runtime: &Runtime) -> Option<UserInputEvent> {
            self.inputs.pop_front()
        }

        fn render(&mut self, _runtime: &Runtime) {
            self.renders += 1;
        }

        fn should_quit(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_quit_command() {
        let mut runtime = Runtime::new(&config());
        let mut frontend = ScriptedFrontend {
            inputs: vec![
                UserInputEvent::Submit(":search x".to_string()),
                UserInputEvent::Submit(":quit".to_string()),
            ]
            .into(),
            renders: 0,
        };
        tokio::time::timeout(Duration::from_secs(5), runtime.run(&mut frontend))
            .await
            .expect("runtime exits");
        assert!(runtime.quit_requested());
        assert_eq!(runtime.session().store().search_query(), "x");
        assert_eq!(frontend.renders, 0);
    }
}

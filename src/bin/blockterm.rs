use anyhow::{bail, Result};
use blockterm::bridge::replay_file;
use blockterm::config::Config;
use blockterm::pipeline::ManualScheduler;
use blockterm::runtime::{FrontendAdapter, Runtime, SessionSnapshotManager, TerminalSession, UserInputEvent};
use blockterm::terminal::TerminalGuard;
use blockterm::ui::editor::CommandLine;
use blockterm::ui::layout::split_screen;
use blockterm::ui::render::{
    render_block_viewport, render_input, render_lines, render_status_line, search_lines,
    ViewStamp,
};
use blockterm::util::now_millis;
use blockterm::{logging, state::BlockStore};
use crossterm::event::{self, Event};
use ratatui::widgets::Clear;
use std::path::PathBuf;
use std::time::Duration;

enum Mode {
    Interactive,
    Replay(PathBuf),
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Mode> {
    let mut args = args.into_iter();
    match args.next().as_deref() {
        None => Ok(Mode::Interactive),
        Some("--replay") => match args.next() {
            Some(path) => Ok(Mode::Replay(PathBuf::from(path))),
            None => bail!("--replay needs a JSON-lines file"),
        },
        Some(other) => bail!("unexpected argument '{other}' (usage: blockterm [--replay <file.jsonl>])"),
    }
}

/// Inputs of the last drawn frame.
#[derive(PartialEq)]
struct FrameKey {
    view: ViewStamp,
    status: String,
    scroll: usize,
    input: String,
    cursor: usize,
}

struct TuiFrontend {
    guard: TerminalGuard,
    line: CommandLine,
    quit: bool,
    max_scroll: usize,
    last_frame: Option<FrameKey>,
}

impl TuiFrontend {
    fn new() -> Result<Self> {
        let guard = TerminalGuard::enter()?;
        Self::drain_startup_events();
        Ok(Self {
            guard,
            line: CommandLine::new(),
            quit: false,
            max_scroll: 0,
            last_frame: None,
        })
    }

    /// Discard input that was typed or pasted before the screen was ready.
    fn drain_startup_events() {
        for _ in 0..1024 {
            match event::poll(Duration::ZERO) {
                Ok(true) => {
                    if event::read().is_err() {
                        break;
                    }
                }
                Ok(false) | Err(_) => break,
            }
        }
    }
}

fn status_text(runtime: &Runtime) -> String {
    let store = runtime.session().store();
    let mut parts = vec![
        format!("host:{}", runtime.manager().active_system().unwrap_or("-")),
        format!("blocks:{}", store.len()),
    ];
    let running = store.running_block_ids().len();
    if running > 0 {
        parts.push(format!("running:{running}"));
    }
    parts.push(if store.is_following() {
        "view:following".to_string()
    } else {
        format!("view:scrolled+{}", runtime.scroll_offset())
    });
    if store.is_search_open() {
        parts.push("search:open".to_string());
    }
    if store.is_ai_thinking() {
        parts.push("ai:thinking".to_string());
    }
    if let Some(error) = store.ai_error() {
        parts.push(format!("ai-error:{}", error.message));
    }
    if let Some(notice) = runtime.notice() {
        parts.push(notice.to_string());
    }
    parts.join(" ")
}

impl FrontendAdapter for TuiFrontend {
    fn poll_user_input(&mut self, _runtime: &Runtime) -> Option<UserInputEvent> {
        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(_) => {
                    self.quit = true;
                    return None;
                }
            }
            let Ok(ev) = event::read() else {
                self.quit = true;
                return None;
            };
            if matches!(ev, Event::Resize(..)) {
                self.last_frame = None;
            }
            if let Some(input) = self.line.apply_event(ev) {
                return Some(input);
            }
        }
    }

    fn render(&mut self, runtime: &Runtime) {
        let store = runtime.session().store();
        let scroll = if store.is_following() {
            0
        } else {
            runtime.scroll_offset()
        };
        let key = FrameKey {
            view: ViewStamp::capture(store),
            status: status_text(runtime),
            scroll,
            input: self.line.buffer().to_string(),
            cursor: self.line.cursor(),
        };
        // Running blocks tick their header timer every frame.
        if !key.view.has_running_block() && self.last_frame.as_ref() == Some(&key) {
            return;
        }

        let search = store.is_search_open().then(|| search_lines(store));
        let now = now_millis();
        let mut max_scroll = 0;
        let _ = self.guard.terminal_mut().draw(|frame| {
            let area = frame.area();
            frame.render_widget(Clear, area);
            let panes = split_screen(area);
            render_status_line(frame, panes.status, &key.status);
            max_scroll = match search {
                Some(lines) => render_lines(frame, panes.blocks, lines, scroll),
                None => render_block_viewport(frame, panes.blocks, store, now, scroll),
            };
            render_input(frame, panes.input, &key.input, key.cursor);
        });
        self.max_scroll = max_scroll;
        self.last_frame = Some(key);
    }

    fn should_quit(&self) -> bool {
        self.quit
    }

    fn max_scroll(&self) -> usize {
        self.max_scroll
    }
}

fn print_blocks(store: &BlockStore) {
    for block in store.blocks() {
        println!("#{} [{}] {}", block.id, block.status.label(), block.command_text);
        let text = block.plain_text();
        if !text.is_empty() {
            println!("{text}");
        }
    }
}

async fn replay(config: &Config, path: PathBuf) -> Result<()> {
    let session = TerminalSession::with_labels(
        Box::new(ManualScheduler::new()),
        config.host.clone(),
        config.cwd_label(),
    );
    let mut manager = SessionSnapshotManager::with_active_system(session, Some(config.host.as_str()));
    let summary = replay_file(&path, &mut manager).await?;
    print_blocks(manager.session().store());
    eprintln!(
        "replayed {} events ({} skipped lines)",
        summary.events, summary.skipped
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let mode = parse_args(std::env::args().skip(1))?;
    let config = Config::load()?;
    config.validate()?;
    logging::init(&config)?;

    match mode {
        Mode::Replay(path) => replay(&config, path).await,
        Mode::Interactive => {
            let mut runtime = Runtime::new(&config);
            let mut frontend = TuiFrontend::new()?;
            runtime.run(&mut frontend).await;
            Ok(())
        }
    }
}

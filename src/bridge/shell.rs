use super::decode::Utf8ChunkDecoder;
use crate::config::Config;
use crate::types::{BlockId, SectionType, TerminalEvent};
use crate::util::now_millis;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Exit code reported when the command could not be started at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;
const CANCEL_REASON: &str = "interrupted";

/// An event from a command task, stamped with the bridge generation it was
/// started under. Messages from an older generation belong to a system the
/// user has since switched away from.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeMessage {
    pub generation: u64,
    pub event: TerminalEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pipe {
    Stdout,
    Stderr,
}

/// Runs block commands as child processes and reports their lifecycle as
/// terminal events.
pub struct ShellBridge {
    shell: String,
    ssh_program: String,
    local_system: String,
    working_dir: PathBuf,
    event_tx: mpsc::UnboundedSender<BridgeMessage>,
    running: HashMap<BlockId, CancellationToken>,
    generation: u64,
}

impl ShellBridge {
    pub fn new(config: &Config) -> (Self, mpsc::UnboundedReceiver<BridgeMessage>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let bridge = Self {
            shell: config.shell.clone(),
            ssh_program: config.ssh_program.clone(),
            local_system: config.host.clone(),
            working_dir: config.working_dir.clone(),
            event_tx,
            running: HashMap::new(),
            generation: 0,
        };
        (bridge, event_rx)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancel everything in flight and start a new generation.
    pub fn advance_generation(&mut self) -> u64 {
        self.cancel_all();
        self.generation += 1;
        self.generation
    }

    /// Start `command_text` for an already-created block on `system`. Must be
    /// called from within a tokio runtime.
    pub fn run(&mut self, block_id: BlockId, command_text: &str, system: Option<&str>) {
        let command = self.command_for(command_text, system);
        let cancel = CancellationToken::new();
        self.running.insert(block_id, cancel.clone());
        let sender = EventSender {
            generation: self.generation,
            block_id,
            tx: self.event_tx.clone(),
        };
        info!(block_id, system = system.unwrap_or(self.local_system.as_str()), "running command");
        tokio::spawn(run_command(
            command_text.to_string(),
            command,
            cancel,
            sender,
        ));
    }

    pub fn cancel(&mut self, block_id: BlockId) -> bool {
        match self.running.remove(&block_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.running.len();
        for (_, token) in self.running.drain() {
            token.cancel();
        }
        count
    }

    /// Forget a block whose task has reported a terminal event.
    pub fn finished(&mut self, block_id: BlockId) {
        self.running.remove(&block_id);
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    fn command_for(&self, command_text: &str, system: Option<&str>) -> Command {
        let remote = system.filter(|system| *system != self.local_system);
        let mut command = match remote {
            Some(host) => {
                let mut command = Command::new(&self.ssh_program);
                command.arg("-T").arg(host).arg("--").arg(command_text);
                command
            }
            None => {
                let mut command = Command::new(&self.shell);
                command.arg("-c").arg(command_text);
                command.current_dir(&self.working_dir);
                command
            }
        };
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl Drop for ShellBridge {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

struct EventSender {
    generation: u64,
    block_id: BlockId,
    tx: mpsc::UnboundedSender<BridgeMessage>,
}

impl EventSender {
    fn send(&self, event: TerminalEvent) {
        let _ = self.tx.send(BridgeMessage {
            generation: self.generation,
            event,
        });
    }

    fn output(&self, payload: String, section_type: SectionType) {
        if payload.is_empty() {
            return;
        }
        self.send(TerminalEvent::BlockOutputChunk {
            block_id: self.block_id,
            payload,
            section_type: Some(section_type),
        });
    }

    fn ended(&self, exit_code: i32) {
        self.send(TerminalEvent::BlockEnded {
            block_id: self.block_id,
            exit_code,
            ended_at: now_millis(),
        });
    }

    fn cancelled(&self) {
        self.send(TerminalEvent::BlockCancelled {
            block_id: self.block_id,
            reason: CANCEL_REASON.to_string(),
            ended_at: now_millis(),
        });
    }
}

async fn run_command(
    command_text: String,
    mut command: Command,
    cancel: CancellationToken,
    sender: EventSender,
) {
    let block_id = sender.block_id;
    sender.send(TerminalEvent::BlockStarted {
        block_id,
        started_at: now_millis(),
    });
    sender.output(format!("$ {command_text}\n"), SectionType::Command);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(block_id, error = %err, "failed to spawn command");
            sender.output(format!("failed to start: {err}\n"), SectionType::Output);
            sender.ended(SPAWN_FAILURE_EXIT_CODE);
            return;
        }
    };

    let mut output = stream::select(
        pipe_stream(child.stdout.take(), Pipe::Stdout),
        pipe_stream(child.stderr.take(), Pipe::Stderr),
    );
    let mut stdout_decoder = Utf8ChunkDecoder::new();
    let mut stderr_decoder = Utf8ChunkDecoder::new();

    let interrupted = loop {
        tokio::select! {
            _ = cancel.cancelled() => break true,
            item = output.next() => match item {
                Some((pipe, Ok(bytes))) => {
                    let decoder = match pipe {
                        Pipe::Stdout => &mut stdout_decoder,
                        Pipe::Stderr => &mut stderr_decoder,
                    };
                    sender.output(decoder.decode(&bytes), SectionType::Output);
                }
                Some((pipe, Err(err))) => {
                    debug!(block_id, ?pipe, error = %err, "output pipe failed");
                }
                None => break false,
            },
        }
    };

    sender.output(stdout_decoder.finish(), SectionType::Output);
    sender.output(stderr_decoder.finish(), SectionType::Output);

    if interrupted {
        kill(&mut child, block_id).await;
        sender.cancelled();
        return;
    }

    tokio::select! {
        _ = cancel.cancelled() => {
            kill(&mut child, block_id).await;
            sender.cancelled();
        }
        status = child.wait() => match status {
            Ok(status) => {
                let exit_code = status.code().unwrap_or(-1);
                debug!(block_id, exit_code, "command finished");
                sender.ended(exit_code);
            }
            Err(err) => {
                warn!(block_id, error = %err, "failed to wait for command");
                sender.ended(-1);
            }
        },
    }
}

fn pipe_stream<R>(reader: Option<R>, pipe: Pipe) -> BoxStream<'static, (Pipe, io::Result<Bytes>)>
where
    R: AsyncRead + Send + 'static,
{
    match reader {
        Some(reader) => ReaderStream::new(reader)
            .map(move |item| (pipe, item))
            .boxed(),
        None => stream::empty().boxed(),
    }
}

async fn kill(child: &mut Child, block_id: BlockId) {
    if let Err(err) = child.kill().await {
        debug!(block_id, error = %err, "failed to kill command");
    }
}

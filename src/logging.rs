use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_PATH: &str = "/tmp/blockterm.log";

/// Install the global `tracing` subscriber. Call once, before the TUI takes
/// over the screen.
pub fn init(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .with_context(|| format!("invalid BLOCKTERM_LOG filter '{}'", config.log_filter))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true);

    match resolve_log_path(config, std::io::stderr().is_terminal()) {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|err| anyhow!("failed to install log subscriber: {err}"))
        }
        None => builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|err| anyhow!("failed to install log subscriber: {err}")),
    }
}

/// Explicit path first; otherwise keep logs off a screen the TUI owns.
fn resolve_log_path(config: &Config, stderr_is_terminal: bool) -> Option<PathBuf> {
    config.log_path.clone().or_else(|| {
        if stderr_is_terminal {
            Some(PathBuf::from(DEFAULT_LOG_PATH))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(log_path: Option<PathBuf>) -> Config {
        Config {
            shell: "/bin/sh".to_string(),
            ssh_program: "ssh".to_string(),
            host: "local".to_string(),
            frame_interval_ms: 16,
            log_path,
            log_filter: "info".to_string(),
            working_dir: PathBuf::from("/"),
        }
    }

    #[test]
    fn test_resolve_log_path_prefers_configured_path() {
        let config = config(Some(PathBuf::from("/tmp/custom.log")));
        assert_eq!(
            resolve_log_path(&config, true),
            Some(PathBuf::from("/tmp/custom.log"))
        );
        assert_eq!(
            resolve_log_path(&config, false),
            Some(PathBuf::from("/tmp/custom.log"))
        );
    }

    #[test]
    fn test_resolve_log_path_defaults_only_for_terminals() {
        let config = config(None);
        assert_eq!(
            resolve_log_path(&config, true),
            Some(PathBuf::from(DEFAULT_LOG_PATH))
        );
        assert_eq!(resolve_log_path(&config, false), None);
    }
}

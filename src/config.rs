use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;
const MIN_FRAME_INTERVAL_MS: u64 = 4;
const MAX_FRAME_INTERVAL_MS: u64 = 250;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub shell: String,
    pub ssh_program: String,
    /// System id of the machine blockterm runs on. Commands for any other
    /// system go over ssh.
    pub host: String,
    pub frame_interval_ms: u64,
    pub log_path: Option<PathBuf>,
    pub log_filter: String,
    pub working_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let shell = non_empty_var("BLOCKTERM_SHELL")
            .or_else(|| non_empty_var("SHELL"))
            .unwrap_or_else(|| "/bin/sh".to_string());
        let ssh_program = non_empty_var("BLOCKTERM_SSH").unwrap_or_else(|| "ssh".to_string());
        let host = std::env::var("BLOCKTERM_HOST").unwrap_or_else(|_| "local".to_string());
        let frame_interval_ms = std::env::var("BLOCKTERM_FRAME_INTERVAL_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|v| v.clamp(MIN_FRAME_INTERVAL_MS, MAX_FRAME_INTERVAL_MS))
            .unwrap_or(DEFAULT_FRAME_INTERVAL_MS);
        let log_path = non_empty_var("BLOCKTERM_LOG_PATH").map(PathBuf::from);
        let log_filter = non_empty_var("BLOCKTERM_LOG").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            shell,
            ssh_program,
            host,
            frame_interval_ms,
            log_path,
            log_filter,
            working_dir: std::env::current_dir()?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.shell.trim().is_empty() {
            bail!("BLOCKTERM_SHELL must name a shell program");
        }
        if self.host.trim().is_empty() {
            bail!("BLOCKTERM_HOST must not be empty");
        }
        if self.ssh_program.trim().is_empty() {
            bail!("BLOCKTERM_SSH must name an ssh program");
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Short form of the working directory for block headers.
    pub fn cwd_label(&self) -> String {
        let home = std::env::var("HOME").ok().filter(|h| !h.is_empty());
        match home {
            Some(home) => match self.working_dir.strip_prefix(&home) {
                Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
                Ok(rest) => format!("~/{}", rest.display()),
                Err(_) => self.working_dir.display().to_string(),
            },
            None => self.working_dir.display().to_string(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 5] = [
        "BLOCKTERM_SHELL",
        "BLOCKTERM_SSH",
        "BLOCKTERM_HOST",
        "BLOCKTERM_FRAME_INTERVAL_MS",
        "BLOCKTERM_LOG",
    ];

    fn clear_vars() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_load_defaults() {
        let _env_lock = crate::test_support::env_guard();
        clear_vars();
        let config = Config::load().expect("load config");
        assert_eq!(config.host, "local");
        assert_eq!(config.ssh_program, "ssh");
        assert_eq!(config.frame_interval_ms, DEFAULT_FRAME_INTERVAL_MS);
        assert_eq!(config.log_filter, "info");
        assert!(!config.shell.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frame_interval_is_clamped() {
        let _env_lock = crate::test_support::env_guard();
        clear_vars();
        std::env::set_var("BLOCKTERM_FRAME_INTERVAL_MS", "1");
        assert_eq!(Config::load().expect("load").frame_interval_ms, 4);
        std::env::set_var("BLOCKTERM_FRAME_INTERVAL_MS", "10000");
        assert_eq!(Config::load().expect("load").frame_interval_ms, 250);
        std::env::set_var("BLOCKTERM_FRAME_INTERVAL_MS", "soon");
        assert_eq!(Config::load().expect("load").frame_interval_ms, 16);
        clear_vars();
    }

    #[test]
    fn test_shell_override_wins_over_login_shell() {
        let _env_lock = crate::test_support::env_guard();
        clear_vars();
        std::env::set_var("BLOCKTERM_SHELL", "/usr/bin/zsh");
        assert_eq!(Config::load().expect("load").shell, "/usr/bin/zsh");
        clear_vars();
    }

    #[test]
    fn test_empty_host_is_rejected() {
        let _env_lock = crate::test_support::env_guard();
        clear_vars();
        std::env::set_var("BLOCKTERM_HOST", "  ");
        let config = Config::load().expect("load");
        assert!(config.validate().is_err());
        clear_vars();
    }
}

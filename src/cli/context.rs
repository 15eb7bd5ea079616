//! CLI Context for dependency injection and shared state
//!
//! Centralizes the settings and socket location every handler needs, and
//! sets up logging for the mode the process runs in.

use crate::config::ConfigManager;
use crate::daemon::{create_socket_path, pid_file_path};
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Set when the daemon process was re-spawned by `daemon start --detach`
pub const DETACHED_ENV: &str = "APNSD_DETACHED";

/// Where log output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// Producer and control commands: warnings only unless verbose
    Client,
    /// Daemon attached to a terminal
    Foreground,
    /// Daemon without a terminal: the configured log file if any
    Detached,
}

/// CLI execution context containing shared dependencies and configuration
#[derive(Clone)]
pub struct CliContext {
    pub config_path: Option<PathBuf>,
    pub verbose: bool,
    pub config_manager: Arc<ConfigManager>,
}

impl CliContext {
    /// Read the settings file if there is one. Commands other than
    /// `daemon start` can run on defaults.
    pub fn new(config_path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let config_manager = Arc::new(ConfigManager::load_or_default(config_path.clone())?);

        Ok(Self {
            config_path,
            verbose,
            config_manager,
        })
    }

    /// Context for `init`: the existing settings file may be the thing
    /// being repaired, so it is not parsed.
    pub fn without_settings(config_path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let config_manager = Arc::new(ConfigManager::defaults(config_path.clone())?);

        Ok(Self {
            config_path,
            verbose,
            config_manager,
        })
    }

    pub fn is_detached() -> bool {
        std::env::var_os(DETACHED_ENV).is_some()
    }

    pub fn socket_path(&self) -> Result<PathBuf> {
        create_socket_path(self.config_manager.config().daemon.socket_path.as_deref())
    }

    /// (pid_file, socket_path)
    pub fn daemon_paths(&self) -> Result<(PathBuf, PathBuf)> {
        let socket_path = self.socket_path()?;
        Ok((pid_file_path(&socket_path), socket_path))
    }

    /// Initialize logging. The returned guard flushes the log file and must
    /// live as long as the process.
    pub fn init_logging(&self, mode: LogMode) -> Result<Option<WorkerGuard>> {
        let daemon_config = &self.config_manager.config().daemon;
        let log_level = match (self.verbose, mode) {
            (true, _) => "debug",
            (false, LogMode::Client) => "warn",
            (false, _) => daemon_config.log_level.as_str(),
        };
        let env_filter = EnvFilter::from_default_env()
            .add_directive(log_level.parse().unwrap_or_else(|_| tracing::Level::INFO.into()));

        let guard = match (&daemon_config.log_path, mode) {
            (Some(log_path), LogMode::Detached) => {
                let (directory, file_name) = split_log_path(log_path);
                std::fs::create_dir_all(directory).context("Failed to create log directory")?;

                let file_appender = tracing_appender::rolling::daily(directory, file_name);
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                tracing_subscriber::fmt()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_env_filter(env_filter)
                    .init();
                Some(guard)
            }
            _ => {
                tracing_subscriber::fmt()
                    .with_writer(std::io::stdout)
                    .with_env_filter(env_filter)
                    .init();
                None
            }
        };

        tracing::debug!("Settings file: {}", self.config_manager.config_path().display());
        Ok(guard)
    }
}

fn split_log_path(log_path: &Path) -> (&Path, &OsStr) {
    let directory = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = log_path.file_name().unwrap_or_else(|| OsStr::new("apnsd.log"));
    (directory, file_name)
}

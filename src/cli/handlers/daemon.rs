//! Daemon management handler
//!
//! This module handles the daemon start, stop and status commands.

use super::super::context::DETACHED_ENV;
use super::super::{CliContext, DaemonAction};
use crate::config::ConfigManager;
use crate::daemon::{is_process_running, ApnsDaemon, DaemonResponse};
use crate::errors::AppError;
use crate::shared::ipc::convenience::{get_daemon_status, ping_daemon, shutdown_daemon};
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Handler for daemon operations
pub struct DaemonHandler<'a> {
    context: &'a CliContext,
}

impl<'a> DaemonHandler<'a> {
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    pub async fn handle_daemon(&self, action: DaemonAction) -> Result<()> {
        match action {
            DaemonAction::Start { detach } => {
                if detach {
                    self.start_daemon_detached().await
                } else {
                    self.start_daemon_foreground().await
                }
            }
            DaemonAction::Stop => self.handle_daemon_stop().await,
            DaemonAction::Status => self.handle_daemon_status().await,
        }
    }

    pub async fn handle_daemon_stop(&self) -> Result<()> {
        let (pid_file, socket_path) = self.context.daemon_paths()?;

        let Some(pid) = self.check_daemon_process(&pid_file)? else {
            println!("Daemon is not running");
            return Ok(());
        };

        match shutdown_daemon(&socket_path).await {
            Ok(_) => {
                info!("Daemon stop signal sent via IPC");
            }
            Err(e) => {
                error!("Failed to send IPC shutdown signal: {:#}", e);
                info!("Sending SIGTERM to daemon process {}", pid);
                terminate(pid)?;
            }
        }

        let start_time = Instant::now();
        while start_time.elapsed() < Duration::from_secs(10) {
            if !is_process_running(pid) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        if is_process_running(pid) {
            println!("Warning: Daemon may still be running after stop signal");
        } else {
            println!("Daemon stopped successfully");
            if pid_file.exists() {
                let _ = std::fs::remove_file(&pid_file);
            }
        }
        Ok(())
    }

    pub async fn handle_daemon_status(&self) -> Result<()> {
        let (pid_file, socket_path) = self.context.daemon_paths()?;

        let Some(pid) = self.check_daemon_process(&pid_file)? else {
            println!("Daemon is not running");
            return Ok(());
        };

        match query_status(&socket_path).await {
            Ok(DaemonResponse::Status {
                queue_size,
                capacity,
                connection_state,
                uptime_secs,
            }) => {
                println!("Daemon is running (PID: {})", pid);
                println!("  Queue: {}/{}", queue_size, capacity);
                println!("  Gateway: {}", connection_state);
                println!("  Uptime: {} seconds", uptime_secs);
            }
            Ok(other) => {
                println!("Daemon is running (PID: {}) - Unexpected status response: {:?}", pid, other);
            }
            Err(e) => {
                println!("Daemon is running (PID: {}) - IPC communication failed: {:#}", pid, e);
            }
        }
        Ok(())
    }

    /// Re-spawn this executable as a session leader with no terminal
    async fn start_daemon_detached(&self) -> Result<()> {
        let (pid_file, _) = self.context.daemon_paths()?;
        if let Some(pid) = self.check_daemon_process(&pid_file)? {
            bail!("Daemon is already running with PID: {}. Stop it first with 'apnsd daemon stop'", pid);
        }

        println!("Starting daemon in detached mode...");

        let current_exe = std::env::current_exe().context("Failed to get current executable path")?;
        let mut command = process::Command::new(&current_exe);
        if let Some(config_path) = &self.context.config_path {
            command.arg("--config").arg(config_path);
        }
        if self.context.verbose {
            command.arg("--verbose");
        }

        let child = command
            .arg("daemon")
            .arg("start")
            .env(DETACHED_ENV, "1")
            .stdin(process::Stdio::null())
            .stdout(process::Stdio::null())
            .stderr(process::Stdio::null())
            .spawn()
            .context("Failed to spawn daemon process")?;

        let pid = child.id();
        // A settings or certificate problem makes the child exit right away
        ensure_still_running(child, Duration::from_millis(500)).await?;

        println!("Daemon started successfully with PID: {}", pid);
        Ok(())
    }

    async fn start_daemon_foreground(&self) -> Result<()> {
        let is_detached = CliContext::is_detached();
        let (pid_file, socket_path) = self.context.daemon_paths()?;

        // The parent already checked before re-spawning us
        if !is_detached {
            if let Some(pid) = self.check_daemon_process(&pid_file)? {
                bail!("Daemon is already running with PID: {}. Stop it first with 'apnsd daemon stop'", pid);
            }
        }

        // Settings are strict here, unlike the client commands
        let config = ConfigManager::load(self.context.config_path.clone()).map_err(log_startup_error)?;
        let daemon = ApnsDaemon::from_config(&config).map_err(log_startup_error)?;

        if is_detached {
            #[cfg(unix)]
            unsafe {
                if libc::setsid() == -1 {
                    bail!("Failed to create new session");
                }
            }
        } else {
            println!("Starting daemon in foreground...");
        }

        std::fs::write(&pid_file, process::id().to_string()).context("Failed to write PID file")?;
        let _pid_guard = scopeguard::guard(pid_file, |pid_file| {
            if pid_file.exists() {
                let _ = std::fs::remove_file(&pid_file);
            }
            debug!("PID file removed");
        });

        info!(
            "Daemon started with PID: {} (gateway {}, {} protocol)",
            process::id(),
            config.gateway_endpoint(),
            config.config().gateway.protocol
        );

        daemon.run(&socket_path).await?;
        Ok(())
    }

    /// Check daemon process status and clean up stale files
    fn check_daemon_process(&self, pid_file: &Path) -> Result<Option<u32>> {
        if !pid_file.exists() {
            return Ok(None);
        }

        let pid_str = std::fs::read_to_string(pid_file).context("Failed to read PID file")?;
        match pid_str.trim().parse::<u32>() {
            Ok(pid) if is_process_running(pid) => Ok(Some(pid)),
            _ => {
                if let Err(e) = std::fs::remove_file(pid_file) {
                    warn!("Failed to remove stale PID file: {}", e);
                }
                Ok(None)
            }
        }
    }
}

/// Give a freshly spawned daemon `grace` to fail before reporting success.
async fn ensure_still_running(mut child: process::Child, grace: Duration) -> Result<()> {
    tokio::time::sleep(grace).await;
    if let Some(exit_status) = child.try_wait()? {
        bail!("Daemon process exited immediately: {}", exit_status);
    }
    Ok(())
}

/// Ping first so a process that holds the PID but not the socket is reported
/// as unresponsive rather than as a failed status query.
async fn query_status(socket_path: &Path) -> Result<DaemonResponse> {
    match ping_daemon(socket_path).await.context("Daemon is not answering on its socket")? {
        DaemonResponse::Ok => get_daemon_status(socket_path).await,
        other => bail!("Unexpected ping response: {:?}", other),
    }
}

fn terminate(pid: u32) -> Result<()> {
    let pid = libc::pid_t::try_from(pid).context("Invalid PID")?;
    if unsafe { libc::kill(pid, libc::SIGTERM) } == -1 {
        return Err(std::io::Error::last_os_error()).context("Failed to signal daemon process");
    }
    Ok(())
}

/// A detached daemon has no terminal, so startup failures must reach the log
fn log_startup_error(err: AppError) -> AppError {
    if err.is_fatal() {
        error!(category = err.category(), "Refusing to start: {}", err);
    } else {
        error!(category = err.category(), "Daemon startup failed: {}", err);
    }
    err
}

super::traits::impl_context_handler!(DaemonHandler<'a>);

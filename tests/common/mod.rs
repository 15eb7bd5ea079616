//! Common test utilities and helpers
//!
//! Reusable builders for running the `apnsd` binary against an isolated
//! settings file and socket.

#![allow(dead_code)]

use apnsd::config::Config;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test command builder for the apnsd CLI
pub struct TestCommand {
    cmd: Command,
}

impl TestCommand {
    pub fn new() -> Self {
        let mut cmd = Command::cargo_bin("apnsd").expect("Failed to find apnsd binary");
        cmd.env_remove("APNSD_CONFIG").env_remove("APNSD_DETACHED");
        Self { cmd }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.cmd.arg(arg.as_ref());
        }
        self
    }

    pub fn arg<S: AsRef<str>>(mut self, arg: S) -> Self {
        self.cmd.arg(arg.as_ref());
        self
    }

    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.cmd.env(key.as_ref(), val.as_ref());
        self
    }

    pub fn expect_success(mut self) -> TestAssertion {
        let assert = self.cmd.assert().success();
        TestAssertion { assert }
    }

    /// Execute and expect the given non-zero exit code
    pub fn expect_exit_code(mut self, code: i32) -> TestAssertion {
        let assert = self.cmd.assert().failure().code(code);
        TestAssertion { assert }
    }
}

impl Default for TestCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// Test assertion wrapper with convenient methods
pub struct TestAssertion {
    assert: assert_cmd::assert::Assert,
}

impl TestAssertion {
    pub fn stdout_contains<S: AsRef<str>>(self, text: S) -> Self {
        let assert = self.assert.stdout(predicate::str::contains(text.as_ref()));
        Self { assert }
    }

    pub fn stderr_contains<S: AsRef<str>>(self, text: S) -> Self {
        let assert = self.assert.stderr(predicate::str::contains(text.as_ref()));
        Self { assert }
    }

    pub fn stdout_is_empty(self) -> Self {
        let assert = self.assert.stdout(predicate::str::is_empty());
        Self { assert }
    }

    pub fn done(self) -> assert_cmd::assert::Assert {
        self.assert
    }
}

/// Isolated settings file and socket location
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub config_path: PathBuf,
    pub socket_path: PathBuf,
}

impl TestEnvironment {
    /// Write a settings file whose socket lives in a fresh temporary directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("apnsd.toml");
        let socket_path = temp_dir.path().join("apnsd.sock");

        let mut config = Config::default();
        config.daemon.socket_path = Some(socket_path.clone());
        config.tls.root_cert_file = temp_dir.path().join("ca.pem");
        config.tls.local_cert_file = temp_dir.path().join("cert.pem");
        config.tls.private_key_file = temp_dir.path().join("key.pem");
        std::fs::write(&config_path, toml::to_string_pretty(&config).expect("serialize settings"))
            .expect("Failed to write settings file");

        Self {
            temp_dir,
            config_path,
            socket_path,
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a command configured for this environment
    pub fn command(&self) -> TestCommand {
        TestCommand::new()
            .arg("--config")
            .arg(self.config_path.to_string_lossy().as_ref())
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Base64 of `payload`, as the push command expects it
pub fn encode_payload(payload: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(payload)
}

pub fn device_hex(byte: u8) -> String {
    hex::encode([byte; 32])
}

//! Common test utilities for godeps-cache integration tests
//!
//! Every helper works inside its own temporary directory and points the
//! binary at it through environment variables, so tests never touch the
//! user's real cache or settings.

// Allow dead code because these utilities are used across different test files
// and not all utilities are used in every test file
#![allow(dead_code)]

use anyhow::{Context, Result};
use godeps_cache::cache::GlobalCache;
use godeps_cache::config::CacheSettings;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Path of the compiled `godeps-cache` binary.
pub fn binary() -> &'static str {
    env!("CARGO_BIN_EXE_godeps-cache")
}

/// An isolated machine: a build tool home, a cache root and a scratch directory.
pub struct TestHost {
    _temp_dir: TempDir, // Keep alive for RAII cleanup
    home_dir: PathBuf,
    cache_dir: PathBuf,
    work_dir: PathBuf,
}

impl TestHost {
    /// Create the host directories. The cache root itself is not created.
    pub fn new() -> Result<Self> {
        godeps_cache::test_utils::init_test_logging(None);
        let temp_dir = TempDir::new()?;
        let home_dir = temp_dir.path().join("gradle-home");
        let cache_dir = temp_dir.path().join("go-cache");
        let work_dir = temp_dir.path().join("work");

        fs::create_dir_all(&home_dir)?;
        fs::create_dir_all(&work_dir)?;

        Ok(Self {
            _temp_dir: temp_dir,
            home_dir,
            cache_dir,
            work_dir,
        })
    }

    /// The build tool home, where the default settings file lives.
    pub fn home_path(&self) -> &Path {
        &self.home_dir
    }

    /// The cache root used by every command of this host.
    pub fn cache_path(&self) -> &Path {
        &self.cache_dir
    }

    /// Scratch directory for test commands.
    pub fn work_path(&self) -> &Path {
        &self.work_dir
    }

    /// A library handle on this host's cache root.
    pub fn cache(&self) -> GlobalCache {
        GlobalCache::with_dir(self.cache_dir.clone())
    }

    /// A library handle with explicit settings.
    pub fn cache_with(&self, settings: &CacheSettings) -> GlobalCache {
        GlobalCache::with_settings(self.cache_dir.clone(), settings)
    }

    /// Write `godeps-cache.toml` into the build tool home.
    pub fn write_settings(&self, content: &str) -> Result<()> {
        let path = self.home_dir.join("godeps-cache.toml");
        fs::write(&path, content)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    /// A `godeps-cache` command bound to this host.
    pub fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(binary());
        cmd.args(args)
            .current_dir(&self.work_dir)
            .env("GODEPS_CACHE_DIR", &self.cache_dir)
            .env("GRADLE_USER_HOME", &self.home_dir)
            .env("WORK_DIR", &self.work_dir)
            .env("NO_COLOR", "1")
            .env_remove("GODEPS_CACHE_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run `godeps-cache` to completion.
    pub fn run_cli(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.command(args).output().context("Failed to run godeps-cache")?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }

    /// Start `godeps-cache` in the background.
    pub fn spawn_cli(&self, args: &[&str]) -> Result<Child> {
        self.command(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn godeps-cache")
    }
}

/// Command output helper
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Assert the command succeeded
    pub fn assert_success(&self) -> &Self {
        assert!(
            self.success,
            "Command failed with code {:?}\nStderr: {}",
            self.code, self.stderr
        );
        self
    }

    /// Assert the command failed
    pub fn assert_failure(&self) -> &Self {
        assert!(!self.success, "Command unexpectedly succeeded\nStdout: {}", self.stdout);
        self
    }

    /// Assert stdout contains the given text
    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Expected stdout to contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    /// Assert stderr contains the given text
    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Expected stderr to contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}

/// Wait until `path` exists, failing after `timeout`.
pub fn wait_for_file(path: &Path, timeout: Duration) -> Result<()> {
    let start = Instant::now();
    while !path.exists() {
        anyhow::ensure!(start.elapsed() < timeout, "Timed out waiting for {}", path.display());
        std::thread::sleep(Duration::from_millis(20));
    }
    Ok(())
}

//! Command-line interface for the global dependency cache.
//!
//! `godeps-cache` exposes the cache to shell-driven build hosts and to people
//! inspecting the cache by hand. Every command works on the same cache root a
//! build would use, under the same locks.
//!
//! # Commands
//!
//! - `init` - Create and verify the cache root
//! - `path` - Print where a package or binary lives in the cache
//! - `status` - Report whether a dependency must be refreshed
//! - `mark` - Record a dependency as up to date
//! - `exec` - Run a command while holding a dependency's lock
//!
//! # Global Options
//!
//! - `--verbose` - Enable debug logging on stderr
//! - `--quiet` - Only log errors and suppress informational output
//! - `--config <FILE>` - Settings file to use instead of the default
//! - `--cache-dir <DIR>` - Cache root, overriding every other source
//!
//! `RUST_LOG` takes precedence over `--verbose` and `--quiet` for logging.
//!
//! # Examples
//!
//! ```bash
//! godeps-cache init
//! godeps-cache path github.com/x/y
//! godeps-cache status github.com/x/y v1.2.0 --json
//! godeps-cache exec github.com/x/y v1.2.0 --if-stale --record -- ./fetch.sh
//! ```

mod exec;
mod init;
mod mark;
mod path;
mod status;


use crate::cache::GlobalCache;
use crate::config::CacheSettings;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Runtime settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Suppress informational output
    pub quiet: bool,
    /// Settings file override
    pub config_path: Option<PathBuf>,
    /// Cache root override
    pub cache_dir: Option<PathBuf>,
}

impl CliConfig {
    /// Open the cache these settings point at.
    ///
    /// `--cache-dir` wins over `GODEPS_CACHE_DIR`, which wins over the
    /// settings file and the build tool home.
    pub async fn open_cache(&self) -> Result<GlobalCache> {
        let settings = CacheSettings::load_with_optional(self.config_path.clone()).await?;
        match &self.cache_dir {
            Some(dir) => Ok(GlobalCache::with_settings(dir.clone(), &settings)),
            None => GlobalCache::from_settings(&settings),
        }
    }

    /// Install the stderr log subscriber. Later calls are no-ops.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_filter));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .try_init();
    }
}

/// Maintain the global dependency cache shared by Go builds.
#[derive(Parser)]
#[command(
    name = "godeps-cache",
    about = "Inspect and maintain the global Go dependency cache",
    version,
    long_about = "godeps-cache manages the machine-wide cache of Go dependency sources and \
                  binaries shared by concurrent builds, including per-dependency locks and \
                  staleness markers."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Settings file to load instead of `<build tool home>/godeps-cache.toml`
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Cache root to use, overriding `GODEPS_CACHE_DIR` and the settings file
    #[arg(long, global = true, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the cache root and verify it is writable
    Init(init::InitCommand),

    /// Print the cache location of a package or binary
    Path(path::PathCommand),

    /// Report whether a dependency must be refreshed
    Status(status::StatusCommand),

    /// Record a dependency's fingerprint as cached
    Mark(mark::MarkCommand),

    /// Run a command while holding a dependency's cache lock
    Exec(exec::ExecCommand),
}

impl Cli {
    /// Run the selected command with configuration from the global flags.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    /// Translate the global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_filter = if self.verbose {
            "godeps_cache=debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };

        CliConfig {
            log_filter: log_filter.to_string(),
            quiet: self.quiet,
            config_path: self.config.clone(),
            cache_dir: self.cache_dir.clone(),
        }
    }

    /// Run the selected command with an explicit configuration.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let cache = config.open_cache().await?;

        match self.command {
            Commands::Init(cmd) => cmd.execute(&cache, &config).await,
            Commands::Path(cmd) => cmd.execute(&cache),
            Commands::Status(cmd) => cmd.execute(&cache).await,
            Commands::Mark(cmd) => cmd.execute(&cache, &config).await,
            Commands::Exec(cmd) => cmd.execute(&cache, &config).await,
        }
    }
}

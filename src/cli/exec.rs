//! Run an external command under a dependency's cache lock.
//!
//! This is how shell-driven build hosts serialize their fetch step with every
//! other build on the machine:
//!
//! ```bash
//! godeps-cache exec github.com/x/y v1.2.0 --if-stale --record -- \
//!     sh -c 'git clone --branch v1.2.0 https://github.com/x/y "$GODEPS_CACHE_PACKAGE_DIR"'
//! ```
//!
//! The command sees `GODEPS_CACHE_PACKAGE_DIR` (the dependency's directory under
//! `gopath/`) and `GODEPS_CACHE_FINGERPRINT` in its environment.

use crate::cache::GlobalCache;
use crate::cli::CliConfig;
use crate::constants::{EXEC_FINGERPRINT_ENV, EXEC_PACKAGE_DIR_ENV};
use crate::core::Dependency;
use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Args)]
pub struct ExecCommand {
    /// Import path of the dependency
    import_path: String,

    /// Resolved version or commit the build wants
    fingerprint: String,

    /// Skip the command when the cached copy is already up to date
    #[arg(long)]
    if_stale: bool,

    /// Record the dependency as up to date when the command succeeds
    #[arg(long)]
    record: bool,

    /// Command and arguments to run
    #[arg(last = true, required = true, value_name = "COMMAND")]
    command: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum ExecOutcome {
    Skipped,
    Ran,
}

impl ExecCommand {
    pub async fn execute(self, cache: &GlobalCache, config: &CliConfig) -> Result<()> {
        let dependency = Dependency::new(self.import_path.clone(), self.fingerprint.clone());
        let package_dir = cache.resolve_package_path(dependency.import_path())?;
        cache.ensure_cache_root_ready().await?;

        let outcome = cache
            .run_with_lock(&dependency, || async {
                if self.if_stale && !cache.current_dependency_is_out_of_date().await? {
                    info!(dependency = %dependency, "Cache entry up to date, skipping command");
                    return Ok(ExecOutcome::Skipped);
                }

                let (program, args) = self
                    .command
                    .split_first()
                    .context("No command given to exec")?;
                debug!(dependency = %dependency, program = %program, "Running command under cache lock");

                let status = Command::new(program)
                    .args(args)
                    .env(EXEC_PACKAGE_DIR_ENV, &package_dir)
                    .env(EXEC_FINGERPRINT_ENV, dependency.fingerprint())
                    .status()
                    .await
                    .with_context(|| format!("Failed to start command '{program}'"))?;

                if !status.success() {
                    bail!("Command '{}' failed with {status}", self.command.join(" "));
                }

                if self.record {
                    cache.update_current_dependency_lock().await?;
                }
                Ok(ExecOutcome::Ran)
            })
            .await?;

        if !config.quiet && outcome == ExecOutcome::Skipped {
            eprintln!("{} {} is up to date", "✓".green(), dependency);
        }
        Ok(())
    }
}

//! Create and verify the cache root.

use crate::cache::GlobalCache;
use crate::cli::CliConfig;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Create the cache root, its `gopath` and `binary` subtrees and the
/// bookkeeping directories, then verify they are writable.
///
/// Safe to run any number of times, including concurrently with builds.
#[derive(Args)]
pub struct InitCommand {}

impl InitCommand {
    pub async fn execute(self, cache: &GlobalCache, config: &CliConfig) -> Result<()> {
        cache.ensure_cache_root_ready().await?;

        if !config.quiet {
            println!("{} {}", "✓ Cache ready at".green(), cache.cache_root().display());
        }
        Ok(())
    }
}

use crate::cache::GlobalCache;
use crate::cli::CliConfig;
use crate::core::Dependency;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Record a dependency's fingerprint as the cached state of its slot.
///
/// Takes the slot lock for the write, so it waits for any build currently
/// refreshing the same dependency.
#[derive(Args)]
pub struct MarkCommand {
    /// Import path of the dependency
    import_path: String,

    /// Resolved version or commit now present in the cache
    fingerprint: String,
}

impl MarkCommand {
    pub async fn execute(self, cache: &GlobalCache, config: &CliConfig) -> Result<()> {
        let dependency = Dependency::new(self.import_path, self.fingerprint);
        cache.ensure_cache_root_ready().await?;
        cache.record_up_to_date(&dependency).await?;

        if !config.quiet {
            println!("{} {}", "✓ Recorded".green(), dependency);
        }
        Ok(())
    }
}

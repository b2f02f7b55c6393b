use crate::cache::GlobalCache;
use anyhow::Result;
use clap::Args;

/// Print where an import path (or, with `--binary`, a binary) lives in the
/// cache. Nothing is created.
#[derive(Args)]
pub struct PathCommand {
    /// Import path such as `github.com/x/y`, or a relative binary path with `--binary`
    identifier: String,

    /// Resolve under the `binary` subtree instead of `gopath`
    #[arg(long)]
    binary: bool,
}

impl PathCommand {
    pub fn execute(self, cache: &GlobalCache) -> Result<()> {
        let path = if self.binary {
            cache.resolve_binary_path(&self.identifier)?
        } else {
            cache.resolve_package_path(&self.identifier)?
        };
        println!("{}", path.display());
        Ok(())
    }
}

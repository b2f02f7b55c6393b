//! Report the staleness of one dependency.

use crate::cache::GlobalCache;
use crate::cache::staleness::{StalenessMarker, Verdict};
use crate::core::Dependency;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Compare a dependency's fingerprint with the cached marker.
///
/// Read-only: no lock is taken, so the answer can be outdated by the time it
/// is printed if a build is refreshing the same dependency.
#[derive(Args)]
pub struct StatusCommand {
    /// Import path of the dependency
    import_path: String,

    /// Resolved version or commit the build wants
    fingerprint: String,

    /// Emit machine-readable JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    import_path: String,
    fingerprint: String,
    stale: bool,
    reason: Verdict,
    package_path: PathBuf,
    marker: Option<StalenessMarker>,
}

impl StatusCommand {
    pub async fn execute(self, cache: &GlobalCache) -> Result<()> {
        let dependency = Dependency::new(self.import_path, self.fingerprint);
        let package_path = cache.resolve_package_path(dependency.import_path())?;
        let verdict = cache.verdict(&dependency).await?;
        let marker = match verdict {
            Verdict::MarkerUnreadable => None,
            _ => cache.marker(dependency.import_path()).await?,
        };

        let report = StatusReport {
            import_path: dependency.import_path().to_string(),
            fingerprint: dependency.fingerprint().to_string(),
            stale: verdict.is_stale(),
            reason: verdict,
            package_path,
            marker,
        };

        if self.json {
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialize status report")?;
            println!("{json}");
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &StatusReport) {
    let state = if report.stale {
        "stale".yellow().bold()
    } else {
        "up to date".green().bold()
    };
    println!("{}@{}: {} ({})", report.import_path, report.fingerprint, state, report.reason.describe());
    println!("  {} {}", "path:".dimmed(), report.package_path.display());

    match &report.marker {
        Some(marker) => println!(
            "  {} {} recorded {}",
            "cached:".dimmed(),
            marker.fingerprint,
            marker.updated_at.to_rfc3339()
        ),
        None => println!("  {} none", "cached:".dimmed()),
    }
}

//! `harvest`: download everything behind a Google Drive, Dropbox or Imgur link.
//!
//! Files land under `<destination>/<id-path>` with a JSON sidecar next to each
//! one. Running the same command again only fetches what is still missing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use harvester::{Credentials, DispatchPolicy, FileOutcome, HarvestConfig, Harvester};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Parser)]
#[command(name = "harvest")]
#[command(about = "Download files and folders shared on Google Drive, Dropbox and Imgur")]
struct Cli {
    /// Link to a file, folder or album
    #[arg(long)]
    url: String,

    /// Directory downloads are placed under
    #[arg(long, default_value = "downloads")]
    destination: PathBuf,

    /// Only report what would be downloaded
    #[arg(long, default_value_t = false)]
    dry: bool,

    /// Number of files downloaded at the same time
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Retries for transient network failures
    #[arg(long, default_value_t = 0)]
    retries: usize,

    /// Stop at the first provider that recognises the link but fails
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    debug: bool,
}

impl Cli {
    fn config(&self) -> Result<HarvestConfig> {
        let policy = if self.strict {
            DispatchPolicy::StopOnFailure
        } else {
            DispatchPolicy::FallThrough
        };

        HarvestConfig::builder()
            .destination(&self.destination)
            .dry_run(self.dry)
            .max_concurrent_downloads(self.concurrency)
            .max_retries(self.retries)
            .retry_delay(Duration::from_secs(1), Duration::from_secs(30))
            .dispatch_policy(policy)
            .build()
            .context("invalid command line options")
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { DEFAULT_LOG_LEVEL };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = cli.config()?;
    let harvester = Harvester::new(config, Credentials::from_env())?;

    let report = harvester
        .run(&cli.url)
        .await
        .with_context(|| format!("could not resolve {}", cli.url))?;

    for outcome in report.failures() {
        if let FileOutcome::Failed { path, error } = outcome {
            warn!("Not downloaded: {} ({})", path.display(), error);
        }
    }
    info!(
        "{} downloaded ({} bytes), {} already present, {} failed{}",
        report.metrics.downloaded,
        report.metrics.total_bytes,
        report.metrics.skipped,
        report.metrics.failed,
        if cli.dry {
            format!(", {} planned", report.metrics.dry_run)
        } else {
            String::new()
        }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["harvest", "--url", "https://imgur.com/a/abc"]).unwrap();

        assert_eq!(cli.destination, PathBuf::from("downloads"));
        assert!(!cli.dry);
        let config = cli.config().unwrap();
        assert_eq!(config.max_concurrent_downloads, 1);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.dispatch_policy, DispatchPolicy::FallThrough);
    }

    #[test]
    fn test_url_is_required() {
        assert!(Cli::try_parse_from(["harvest", "--dry"]).is_err());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let cli = Cli::try_parse_from([
            "harvest",
            "--url",
            "https://imgur.com/a/abc",
            "--concurrency",
            "0",
        ])
        .unwrap();
        assert!(cli.config().is_err());
    }
}

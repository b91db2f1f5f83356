//! Download orchestrator
//!
//! [`Harvester`] ties the registry, the shared HTTP client and the per-file
//! pipeline together: resolve one URL, then process every resolved file.

use futures::{StreamExt, stream};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::downloader::{
    batch::{DownloadMetrics, DownloadMetricsSnapshot, FileOutcome, process_file},
    config::{Credentials, Endpoints, HarvestConfig},
    core::{HttpClient, ResolvedFile, Result, files},
    registry::ResolverRegistry,
};

/// A resolved file together with where it would land
#[derive(Debug, Clone)]
pub struct PlannedFile {
    pub file: ResolvedFile,
    pub id_path: PathBuf,
    pub name_path: PathBuf,
    /// Something already occupies `id_path`
    pub exists: bool,
}

/// Result of processing one batch of files
#[derive(Debug)]
pub struct RunReport {
    /// One outcome per unique file, in resolution order
    pub outcomes: Vec<FileOutcome>,
    /// Counters for this batch only
    pub metrics: DownloadMetricsSnapshot,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_failure())
    }
}

/// Resolves links and downloads what they point at
pub struct Harvester {
    registry: ResolverRegistry,
    http: HttpClient,
    config: HarvestConfig,
    metrics: Arc<DownloadMetrics>,
}

impl Harvester {
    /// Harvester with the default providers talking to the public APIs
    pub fn new(config: HarvestConfig, credentials: Credentials) -> Result<Self> {
        Self::with_endpoints(config, credentials, Endpoints::default())
    }

    /// Harvester with the default providers talking to the given endpoints
    pub fn with_endpoints(
        config: HarvestConfig,
        credentials: Credentials,
        endpoints: Endpoints,
    ) -> Result<Self> {
        let http = HttpClient::from_config(&config)?;
        let registry = ResolverRegistry::with_default_providers(http.clone(), &credentials, &endpoints);
        Ok(Self::assemble(registry, http, config))
    }

    /// Harvester around a caller-built registry
    pub fn with_registry(registry: ResolverRegistry, config: HarvestConfig) -> Result<Self> {
        let http = HttpClient::from_config(&config)?;
        Ok(Self::assemble(registry, http, config))
    }

    fn assemble(registry: ResolverRegistry, http: HttpClient, config: HarvestConfig) -> Self {
        let registry = registry.with_policy(config.dispatch_policy);
        Self {
            registry,
            http,
            config,
            metrics: Arc::new(DownloadMetrics::default()),
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Counters accumulated over every batch this harvester processed
    pub fn metrics(&self) -> DownloadMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Resolve a URL into files without downloading anything
    pub async fn resolve(&self, url: &str) -> Result<Vec<ResolvedFile>> {
        self.registry.dispatch(url).await
    }

    /// Resolve a URL and report where each file would go
    pub async fn plan(&self, url: &str) -> Result<Vec<PlannedFile>> {
        let resolved = self.resolve(url).await?;
        let mut planned = Vec::with_capacity(resolved.len());
        for file in resolved {
            let id_path = file.id_path(&self.config.destination);
            let exists = files::destination_exists(&id_path).await?;
            planned.push(PlannedFile {
                name_path: file.name_path(&self.config.destination),
                id_path,
                exists,
                file,
            });
        }
        Ok(planned)
    }

    /// Process already resolved files
    ///
    /// Files sharing an ID-path are processed once. Up to
    /// `max_concurrent_downloads` transfers run at a time; outcomes keep the
    /// input order.
    pub async fn download_all(&self, resolved: Vec<ResolvedFile>) -> RunReport {
        let before = self.metrics.snapshot();

        let mut seen = HashSet::new();
        let unique: Vec<ResolvedFile> = resolved
            .into_iter()
            .filter(|file| {
                let fresh = seen.insert(file.id_path(&self.config.destination));
                if !fresh {
                    debug!("Ignoring duplicate entry for {}", file.id);
                }
                fresh
            })
            .collect();

        let outcomes: Vec<FileOutcome> = stream::iter(unique)
            .map(|file| process_file(&self.http, &self.config, &self.metrics, file))
            .buffered(self.config.max_concurrent_downloads.max(1))
            .collect()
            .await;

        let metrics = self.metrics.snapshot().since(&before);
        if metrics.failed > 0 {
            warn!("{} file(s) failed to download", metrics.failed);
        }
        info!(
            "Finished: {} downloaded, {} skipped, {} failed, {} dry-run",
            metrics.downloaded, metrics.skipped, metrics.failed, metrics.dry_run
        );

        RunReport { outcomes, metrics }
    }

    /// Resolve a URL and download everything it points at
    ///
    /// Fails only when the URL cannot be resolved. Per-file failures are
    /// reported in the returned [`RunReport`].
    pub async fn run(&self, url: &str) -> Result<RunReport> {
        let resolved = self.resolve(url).await?;
        if resolved.is_empty() {
            info!("Nothing to download for {}", url);
        }
        Ok(self.download_all(resolved).await)
    }
}

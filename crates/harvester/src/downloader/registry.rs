//! Resolver registry: the provider dispatcher
//!
//! The registry holds resolvers in a fixed priority order and hands a URL to
//! each in turn until one of them produces a result. It knows nothing about
//! provider internals; everything goes through [`SourceResolver`].

use async_trait::async_trait;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::downloader::{
    backends::{DriveResolver, DropboxResolver, ImgurResolver},
    config::{Credentials, DispatchPolicy, Endpoints},
    core::{HarvestError, HttpClient, ProviderAttempt, ResolvedFile, Result},
};

/// Capability every provider implements
///
/// `resolve` returns [`HarvestError::Declined`] when the URL is not for this
/// provider, an empty list when the remote resource does not exist, and any
/// other error when the provider recognised the URL but could not expand it.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Human readable provider name, used in logs and errors
    fn name(&self) -> &'static str;

    async fn resolve(&self, url: &str) -> Result<Vec<ResolvedFile>>;
}

/// Ordered collection of resolvers
pub struct ResolverRegistry {
    resolvers: Vec<Box<dyn SourceResolver>>,
    policy: DispatchPolicy,
}

impl ResolverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
            policy: DispatchPolicy::default(),
        }
    }

    /// Registry with Google Drive, Dropbox and Imgur, in that order
    pub fn with_default_providers(
        http: HttpClient,
        credentials: &Credentials,
        endpoints: &Endpoints,
    ) -> Self {
        Self::new()
            .register(DriveResolver::new(http.clone(), credentials, endpoints))
            .register(DropboxResolver::new(http.clone(), credentials, endpoints))
            .register(ImgurResolver::new(http, credentials, endpoints))
    }

    /// Append a resolver; earlier registrations are tried first
    pub fn register<R: SourceResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    /// Resolve a URL with the first provider that accepts it
    ///
    /// Providers after the first success are never invoked. When every
    /// provider declines (or fails, under [`DispatchPolicy::FallThrough`])
    /// the result is [`HarvestError::InvalidUrl`] naming the URL.
    pub async fn dispatch(&self, url: &str) -> Result<Vec<ResolvedFile>> {
        let mut attempts = Vec::new();

        for resolver in &self.resolvers {
            let provider = resolver.name();
            let result = resolver
                .resolve(url)
                .instrument(info_span!("resolve", provider = provider))
                .await;

            match result {
                Ok(files) => {
                    info!("{} resolved {} into {} file(s)", provider, url, files.len());
                    return Ok(files);
                }
                Err(error) if error.is_decline() => {
                    debug!("{} declined {}", provider, url);
                }
                Err(error) => {
                    warn!("{} failed to resolve {}: {}", provider, url, error);
                    if self.policy == DispatchPolicy::StopOnFailure {
                        return Err(error);
                    }
                    attempts.push(ProviderAttempt {
                        provider,
                        error: error.to_string(),
                    });
                }
            }
        }

        Err(HarvestError::InvalidUrl {
            url: url.to_string(),
            attempts,
        })
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

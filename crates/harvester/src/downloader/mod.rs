//! Downloader module
//!
//! This module contains everything between a user supplied link and the files
//! on disk: the shared data model, the provider resolvers, the dispatcher that
//! picks a resolver, and the orchestrator that writes files idempotently.
//!
//! The call chain flows as follows:
//!
//! Harvester (pipeline.rs)
//! ↓
//! ResolverRegistry (registry.rs)
//! ↓
//! DriveResolver / DropboxResolver / ImgurResolver (backends/*)
//! ↓
//! batch::process_file (batch.rs)
//! ↓
//! Core types (core/*)

pub mod backends;
pub mod batch;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod registry;

// Re-export main types for convenience
pub use backends::{DriveResolver, DropboxResolver, ImgurResolver};
pub use batch::{DownloadMetrics, DownloadMetricsSnapshot, FileOutcome};
pub use config::{Credentials, DispatchPolicy, Endpoints, HarvestConfig, HarvestConfigBuilder};
pub use core::{
    FileId, FileOperation, FileSource, HarvestError, HttpClient, IdPathPair, ProviderAttempt,
    ResolvedFile, Result, SourceMethod,
};
pub use pipeline::{Harvester, PlannedFile, RunReport};
pub use registry::{ResolverRegistry, SourceResolver};

//! Harvester Library
//!
//! This library resolves a single cloud-storage link (a file, a folder or an
//! album) into a flat list of downloadable files and downloads each of them
//! to local storage exactly once.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use harvester::{Credentials, HarvestConfig, Harvester};
//!
//! # async fn example() -> harvester::Result<()> {
//! let config = HarvestConfig::builder()
//!     .destination("downloads")
//!     .build()?;
//!
//! // Provider secrets come from GOOGLE_API_KEY, DROPBOX_ACCESS_TOKEN and IMGUR_CLIENT_ID
//! let harvester = Harvester::new(config, Credentials::from_env())?;
//!
//! let report = harvester
//!     .run("https://drive.google.com/drive/folders/0B1234567890abcdefghij")
//!     .await?;
//! println!("{} downloaded, {} skipped", report.metrics.downloaded, report.metrics.skipped);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Multiple providers**: Google Drive folders and files, Dropbox shared links, Imgur albums and assets
//! - **Folder hierarchy**: every file remembers the chain of folders it was found under
//! - **Idempotent downloads**: files already on disk are skipped, nothing is ever overwritten
//! - **Sidecar metadata**: a JSON record is written next to every downloaded file
//! - **Retry logic**: opt-in exponential backoff for transient network failures

pub mod downloader;

// Re-export commonly used types for convenience
pub use downloader::{
    Credentials, DispatchPolicy, Endpoints, FileId, FileOutcome, FileSource, HarvestConfig,
    HarvestError, Harvester, IdPathPair, ResolvedFile, ResolverRegistry, Result, RunReport,
    SourceMethod, SourceResolver,
};

//! Core types used throughout the downloader system
//!
//! This module contains the fundamental types that all other modules depend on.
//! A resolver produces [`ResolvedFile`]s, the orchestrator consumes them.

pub mod error;
pub mod files;
pub mod http;
pub mod paths;
pub mod walk;

// Re-export main types for convenience
pub use error::{FileOperation, HarvestError, ProviderAttempt, Result};
pub use http::HttpClient;
pub use walk::{ContainerExpander, Folder, WalkItem};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Provider-native identifier of a file or container
///
/// Some providers hand out opaque strings, others numbers. Both are
/// stringified the same way whenever they become a path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileId {
    Number(u64),
    Text(String),
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileId::Number(id) => write!(f, "{}", id),
            FileId::Text(id) => f.write_str(id),
        }
    }
}

impl From<u64> for FileId {
    fn from(id: u64) -> Self {
        FileId::Number(id)
    }
}

impl From<String> for FileId {
    fn from(id: String) -> Self {
        FileId::Text(id)
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        FileId::Text(id.to_string())
    }
}

/// One level of a folder hierarchy: the container's id and its display name
///
/// Serialized as a two element array, `[id, name]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdPathPair(pub FileId, pub String);

impl IdPathPair {
    pub fn new<I: Into<FileId>, S: Into<String>>(id: I, name: S) -> Self {
        Self(id.into(), name.into())
    }

    pub fn id(&self) -> &FileId {
        &self.0
    }

    pub fn name(&self) -> &str {
        &self.1
    }
}

/// HTTP method used to fetch a file's bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceMethod {
    Get,
    Post,
}

/// Self-contained description of how to fetch a file's bytes
///
/// Nothing downstream of resolution needs provider knowledge: the method,
/// URL and headers are everything the transfer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSource {
    pub method: SourceMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl FileSource {
    pub fn get<S: Into<String>>(url: S) -> Self {
        Self {
            method: SourceMethod::Get,
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn post<S: Into<String>>(url: S) -> Self {
        Self {
            method: SourceMethod::Post,
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Build the request for this source on the given client
    pub fn to_request(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        let mut request = match self.method {
            SourceMethod::Get => client.get(&self.url),
            SourceMethod::Post => client.post(&self.url),
        };
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        request
    }
}

/// A single downloadable file produced by a resolver
///
/// This is the unit of work that flows from the resolvers to the
/// orchestrator. It is built once during traversal and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFile {
    pub filename: String,
    pub id: FileId,
    /// Containers the file lives under, root first, excluding the file itself
    #[serde(rename = "idPathPairs")]
    pub ancestor_chain: Vec<IdPathPair>,
    pub source: FileSource,
}

impl ResolvedFile {
    /// Create a top-level file (empty ancestor chain)
    pub fn new<I: Into<FileId>, S: Into<String>>(id: I, filename: S, source: FileSource) -> Self {
        Self {
            filename: filename.into(),
            id: id.into(),
            ancestor_chain: Vec::new(),
            source,
        }
    }

    /// Place the file under the given chain of containers
    pub fn with_ancestors(mut self, ancestor_chain: Vec<IdPathPair>) -> Self {
        self.ancestor_chain = ancestor_chain;
        self
    }

    /// Destination built from ids only, used for the "already downloaded" check
    pub fn id_path<P: AsRef<Path>>(&self, base: P) -> PathBuf {
        paths::id_path(self, base.as_ref())
    }

    /// Human readable destination built from container and file names
    pub fn name_path<P: AsRef<Path>>(&self, base: P) -> PathBuf {
        paths::name_path(self, base.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_display() {
        assert_eq!(FileId::from(42u64).to_string(), "42");
        assert_eq!(FileId::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_sidecar_shape_matches_record() {
        let file = ResolvedFile::new("f1", "a.png", FileSource::get("https://example.com/a.png"))
            .with_ancestors(vec![IdPathPair::new(7u64, "Photos")]);

        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["id"], "f1");
        assert_eq!(value["idPathPairs"], serde_json::json!([[7, "Photos"]]));
        assert_eq!(value["source"]["method"], "GET");
        assert!(value["source"].get("headers").is_none());

        let back: ResolvedFile = serde_json::from_value(value).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn test_post_source_carries_headers() {
        let source = FileSource::post("https://example.com/get")
            .with_header("Authorization", "Bearer t");
        let client = reqwest::Client::new();
        let request = source.to_request(&client).build().unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.headers()["Authorization"], "Bearer t");
    }
}

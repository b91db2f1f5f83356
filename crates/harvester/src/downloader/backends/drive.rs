//! Google Drive resolver
//!
//! Drive links carry an opaque id. The root is classified with a metadata
//! request; folders are walked container by container, each listing followed
//! through its page tokens before any subfolder is expanded.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::downloader::{
    config::{Credentials, Endpoints, GOOGLE_API_KEY, require_secret},
    core::{
        ContainerExpander, FileSource, Folder, HarvestError, HttpClient, IdPathPair,
        ResolvedFile, Result, WalkItem,
        http::{ensure_success, read_json},
        walk::walk,
    },
    registry::SourceResolver,
};

pub const GOOGLE_DRIVE_FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const PAGE_SIZE: &str = "1000";

static DRIVE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https?://drive\.google\.com/(?:open\?id=|drive/(?:mobile/)?folders/|file/d/)(?P<id>[0-9A-Za-z_-]+)",
    )
    .expect("Google Drive URL pattern is valid")
});

/// Drive file resource, as returned by `files.get` and `files.list`
#[derive(Debug, Clone, Deserialize)]
struct FileMetadata {
    id: String,
    name: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

impl FileMetadata {
    fn is_folder(&self) -> bool {
        self.mime_type == GOOGLE_DRIVE_FOLDER_MIME_TYPE
    }
}

#[derive(Debug, Deserialize)]
struct FileMetadataList {
    #[serde(default)]
    files: Vec<FileMetadata>,
    #[serde(rename = "nextPageToken", default)]
    next_page_token: Option<String>,
}

/// Google Drive resolver
pub struct DriveResolver {
    http: HttpClient,
    api_key: Option<String>,
    api_base: String,
}

impl DriveResolver {
    pub fn new(http: HttpClient, credentials: &Credentials, endpoints: &Endpoints) -> Self {
        Self {
            http,
            api_key: credentials.google_api_key.clone(),
            api_base: endpoints.google_apis.clone(),
        }
    }

    /// Extract the file or folder id from a Drive link
    pub fn extract_id(url: &str) -> Option<&str> {
        DRIVE_URL
            .captures(url)
            .and_then(|captures| captures.name("id"))
            .map(|id| id.as_str())
    }

    fn file(&self, api_key: &str, id: &str, name: &str, ancestors: Vec<IdPathPair>) -> ResolvedFile {
        let url = format!(
            "{}/drive/v3/files/{}?alt=media&key={}",
            self.api_base, id, api_key
        );
        ResolvedFile::new(id, name, FileSource::get(url)).with_ancestors(ancestors)
    }

    /// Fetch a single resource's metadata; `None` when Drive answers 404
    async fn fetch_metadata(&self, api_key: &str, id: &str) -> Result<Option<FileMetadata>> {
        let url = format!("{}/drive/v3/files/{}", self.api_base, id);
        let response = self
            .http
            .send(&url, |client| client.get(&url).query(&[("key", api_key)]))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response, &url)?;
        read_json(response, &url).await.map(Some)
    }

    /// List every child of a folder, following page tokens until exhausted
    async fn list_children(&self, api_key: &str, folder_id: &str) -> Result<Vec<FileMetadata>> {
        let url = format!("{}/drive/v3/files", self.api_base);
        let query = format!("'{}' in parents", folder_id);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let response = self
                .http
                .send(&url, |client| {
                    let mut request = client.get(&url).query(&[
                        ("q", query.as_str()),
                        ("pageSize", PAGE_SIZE),
                        ("key", api_key),
                    ]);
                    if let Some(token) = &page_token {
                        request = request.query(&[("pageToken", token.as_str())]);
                    }
                    request
                })
                .await?;
            let response = ensure_success(response, &url)?;
            let page: FileMetadataList = read_json(response, &url).await?;

            debug!("Folder {} page returned {} entries", folder_id, page.files.len());
            files.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(files)
    }
}

/// One resolution's view of the resolver, with the credential already checked
struct DriveWalk<'a> {
    resolver: &'a DriveResolver,
    api_key: &'a str,
}

#[async_trait]
impl<'a> ContainerExpander for DriveWalk<'a> {
    type Container = Folder;

    async fn expand(&self, folder: Folder) -> Result<Vec<WalkItem<Folder>>> {
        let folder_id = folder.id.to_string();
        let children = self.resolver.list_children(self.api_key, &folder_id).await?;

        Ok(children
            .into_iter()
            .map(|child| {
                if child.is_folder() {
                    WalkItem::Container(folder.subfolder(child.id, child.name))
                } else {
                    WalkItem::Leaf(self.resolver.file(
                        self.api_key,
                        &child.id,
                        &child.name,
                        folder.child_chain(),
                    ))
                }
            })
            .collect())
    }
}

#[async_trait]
impl SourceResolver for DriveResolver {
    fn name(&self) -> &'static str {
        "Google Drive"
    }

    async fn resolve(&self, url: &str) -> Result<Vec<ResolvedFile>> {
        let id = Self::extract_id(url).ok_or_else(|| HarvestError::declined(self.name(), url))?;
        let api_key = require_secret(self.api_key.as_deref(), GOOGLE_API_KEY)?;

        let Some(metadata) = self.fetch_metadata(api_key, id).await? else {
            warn!("Page not found: {}", url);
            return Ok(Vec::new());
        };

        if !metadata.is_folder() {
            return Ok(vec![self.file(api_key, id, &metadata.name, Vec::new())]);
        }

        let walker = DriveWalk {
            resolver: self,
            api_key,
        };
        walk(&walker, Folder::root(id, metadata.name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_id_from_supported_links() {
        let cases = [
            ("https://drive.google.com/open?id=1AbC_d-E", "1AbC_d-E"),
            ("https://drive.google.com/drive/folders/0BxYz123", "0BxYz123"),
            ("http://drive.google.com/drive/mobile/folders/abc?usp=sharing", "abc"),
            ("https://drive.google.com/file/d/1fileID/view", "1fileID"),
        ];
        for (url, expected) in cases {
            assert_eq!(DriveResolver::extract_id(url), Some(expected), "{}", url);
        }
    }

    #[test]
    fn test_extract_id_rejects_other_links() {
        for url in [
            "https://docs.google.com/document/d/abc",
            "https://www.dropbox.com/s/abcdefghijklmno/file.txt",
            "https://drive.google.com/drive/my-drive",
            "not a url",
        ] {
            assert_eq!(DriveResolver::extract_id(url), None, "{}", url);
        }
    }

    #[tokio::test]
    async fn test_declines_without_network() {
        let http = HttpClient::from_config(&Default::default()).unwrap();
        let resolver = DriveResolver::new(http, &Credentials::default(), &Endpoints::all("http://127.0.0.1:9"));

        let error = resolver.resolve("https://imgur.com/a/xyz").await.unwrap_err();
        assert!(error.is_decline());
    }

    #[tokio::test]
    async fn test_missing_key_is_a_configuration_error() {
        let http = HttpClient::from_config(&Default::default()).unwrap();
        let resolver = DriveResolver::new(http, &Credentials::default(), &Endpoints::all("http://127.0.0.1:9"));

        let error = resolver
            .resolve("https://drive.google.com/file/d/abc/view")
            .await
            .unwrap_err();
        assert!(matches!(error, HarvestError::Configuration { .. }));
    }

    #[test]
    fn test_leaf_source_is_media_get() {
        let http = HttpClient::from_config(&Default::default()).unwrap();
        let credentials = Credentials {
            google_api_key: Some("k".to_string()),
            ..Default::default()
        };
        let resolver = DriveResolver::new(http, &credentials, &Endpoints::default());

        let file = resolver.file("k", "abc", "a.png", vec![]);
        assert_eq!(
            file.source,
            FileSource::get("https://www.googleapis.com/drive/v3/files/abc?alt=media&key=k")
        );
    }
}

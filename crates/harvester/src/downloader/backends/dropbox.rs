//! Dropbox shared-link resolver
//!
//! A shared link is classified with `get_shared_link_metadata`. Folder
//! listings are path addressed relative to the shared link, so the listing
//! path is rebuilt from the names in the ancestor chain (the shared folder
//! itself is the root and contributes no segment). Listings page with a
//! cursor and a `has_more` flag.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::fmt::Write;
use tracing::{debug, warn};

use crate::downloader::{
    config::{Credentials, DROPBOX_ACCESS_TOKEN, Endpoints, require_secret},
    core::{
        ContainerExpander, FileSource, Folder, HarvestError, HttpClient, IdPathPair,
        ResolvedFile, Result, WalkItem,
        http::{ensure_success, read_json},
        walk::walk,
    },
    registry::SourceResolver,
};

pub const DROPBOX_API_ARG: &str = "Dropbox-API-Arg";

static SHARED_LINK_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https?://(?:www\.)?dropbox\.com/(?:sh?/[0-9A-Za-z]{15}/.+|scl/f[io]/[0-9A-Za-z]+(?:/.*)?)",
    )
    .expect("Dropbox URL pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum EntryTag {
    File,
    Folder,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct SharedLinkMetadata {
    #[serde(rename = ".tag")]
    tag: EntryTag,
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = ".tag")]
    tag: EntryTag,
    #[serde(default)]
    id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ListFolderResult {
    #[serde(default)]
    entries: Vec<Entry>,
    cursor: String,
    has_more: bool,
}

/// Strip Dropbox's `id:` prefix from an entry id
pub fn format_id(id: &str) -> String {
    id.trim().trim_start_matches("id:").trim().to_string()
}

/// Listing path for a folder whose full chain (root included) is given
///
/// The root shared folder maps to the empty path; every level below it adds
/// `/<name>`.
pub fn relative_path(chain: &[IdPathPair]) -> String {
    chain
        .iter()
        .skip(1)
        .fold(String::new(), |mut path, pair| {
            path.push('/');
            path.push_str(pair.name());
            path
        })
}

/// Serialize a JSON value for an HTTP header, escaping non-ASCII characters
///
/// Header values must be ASCII; Dropbox accepts `\uXXXX` escapes inside the
/// `Dropbox-API-Arg` JSON.
pub fn header_safe_json(value: &serde_json::Value) -> String {
    let raw = value.to_string();
    let mut escaped = String::with_capacity(raw.len());
    let mut units = [0u16; 2];
    for c in raw.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(escaped, "\\u{:04x}", unit);
            }
        }
    }
    escaped
}

/// Dropbox shared-link resolver
pub struct DropboxResolver {
    http: HttpClient,
    access_token: Option<String>,
    api_base: String,
    content_base: String,
}

impl DropboxResolver {
    pub fn new(http: HttpClient, credentials: &Credentials, endpoints: &Endpoints) -> Self {
        Self {
            http,
            access_token: credentials.dropbox_access_token.clone(),
            api_base: endpoints.dropbox_api.clone(),
            content_base: endpoints.dropbox_content.clone(),
        }
    }

    pub fn is_shared_link(url: &str) -> bool {
        SHARED_LINK_URL.is_match(url)
    }

    /// Leaf file whose bytes come from `get_shared_link_file`
    fn file(
        &self,
        token: &str,
        shared_link: &str,
        id: String,
        name: &str,
        ancestors: Vec<IdPathPair>,
        path: Option<String>,
    ) -> ResolvedFile {
        let arg = match path {
            Some(path) => json!({ "path": path, "url": shared_link }),
            None => json!({ "url": shared_link }),
        };
        let source = FileSource::post(format!(
            "{}/2/sharing/get_shared_link_file",
            self.content_base
        ))
        .with_header("Authorization", format!("Bearer {}", token))
        .with_header(DROPBOX_API_ARG, header_safe_json(&arg));

        ResolvedFile::new(id, name, source).with_ancestors(ancestors)
    }

    async fn rpc(&self, token: &str, endpoint: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.api_base, endpoint);
        self.http
            .send(&url, |client| client.post(&url).bearer_auth(token).json(&body))
            .await
    }

    /// Classify the shared link; `None` when Dropbox answers 409
    async fn fetch_metadata(&self, token: &str, shared_link: &str) -> Result<Option<SharedLinkMetadata>> {
        let endpoint = "/2/sharing/get_shared_link_metadata";
        let response = self.rpc(token, endpoint, json!({ "url": shared_link })).await?;

        if response.status() == StatusCode::CONFLICT {
            return Ok(None);
        }
        let url = format!("{}{}", self.api_base, endpoint);
        let response = ensure_success(response, &url)?;
        read_json(response, &url).await.map(Some)
    }

    /// List a folder inside the shared link, following the cursor while `has_more`
    async fn list_folder(&self, token: &str, shared_link: &str, path: &str) -> Result<Vec<Entry>> {
        let list_endpoint = "/2/files/list_folder";
        let continue_endpoint = "/2/files/list_folder/continue";

        let body = json!({ "path": path, "shared_link": { "url": shared_link } });
        let response = self.rpc(token, list_endpoint, body).await?;
        let url = format!("{}{}", self.api_base, list_endpoint);
        let mut page: ListFolderResult = read_json(ensure_success(response, &url)?, &url).await?;
        let mut entries = std::mem::take(&mut page.entries);

        while page.has_more {
            let body = json!({ "cursor": page.cursor });
            let response = self.rpc(token, continue_endpoint, body).await?;
            let url = format!("{}{}", self.api_base, continue_endpoint);
            page = read_json(ensure_success(response, &url)?, &url).await?;
            entries.append(&mut page.entries);
        }

        debug!("Listed {} entries under '{}'", entries.len(), path);
        Ok(entries)
    }
}

struct DropboxWalk<'a> {
    resolver: &'a DropboxResolver,
    token: &'a str,
    shared_link: &'a str,
}

#[async_trait]
impl<'a> ContainerExpander for DropboxWalk<'a> {
    type Container = Folder;

    async fn expand(&self, folder: Folder) -> Result<Vec<WalkItem<Folder>>> {
        let chain = folder.child_chain();
        let path = relative_path(&chain);
        let entries = self
            .resolver
            .list_folder(self.token, self.shared_link, &path)
            .await?;

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(raw_id) = entry.id.as_deref() else {
                debug!("Skipping entry without id: {}", entry.name);
                continue;
            };
            let id = format_id(raw_id);

            match entry.tag {
                EntryTag::File => items.push(WalkItem::Leaf(self.resolver.file(
                    self.token,
                    self.shared_link,
                    id,
                    &entry.name,
                    chain.clone(),
                    Some(format!("{}/{}", path, entry.name)),
                ))),
                EntryTag::Folder => items.push(WalkItem::Container(folder.subfolder(id, entry.name))),
                EntryTag::Other => debug!("Skipping unsupported entry: {}", entry.name),
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl SourceResolver for DropboxResolver {
    fn name(&self) -> &'static str {
        "Dropbox"
    }

    async fn resolve(&self, url: &str) -> Result<Vec<ResolvedFile>> {
        if !Self::is_shared_link(url) {
            return Err(HarvestError::declined(self.name(), url));
        }
        let token = require_secret(self.access_token.as_deref(), DROPBOX_ACCESS_TOKEN)?;

        let Some(metadata) = self.fetch_metadata(token, url).await? else {
            warn!("Page not found: {}", url);
            return Ok(Vec::new());
        };
        let id = format_id(&metadata.id);

        match metadata.tag {
            EntryTag::File => Ok(vec![self.file(token, url, id, &metadata.name, Vec::new(), None)]),
            EntryTag::Folder => {
                let walker = DropboxWalk {
                    resolver: self,
                    token,
                    shared_link: url,
                };
                walk(&walker, Folder::root(id, metadata.name)).await
            }
            EntryTag::Other => Err(HarvestError::Unresolvable {
                url: url.to_string(),
                reason: "shared link is neither a file nor a folder".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_link_shapes() {
        assert!(DropboxResolver::is_shared_link("https://www.dropbox.com/s/abcdefghijklmno/a.png?dl=0"));
        assert!(DropboxResolver::is_shared_link("https://dropbox.com/sh/abcdefghijklmno/AAA"));
        assert!(DropboxResolver::is_shared_link("https://www.dropbox.com/scl/fo/k3j4h5/AAB?rlkey=x"));
        assert!(!DropboxResolver::is_shared_link("https://www.dropbox.com/s/short/a.png"));
        assert!(!DropboxResolver::is_shared_link("https://www.dropbox.com/home"));
        assert!(!DropboxResolver::is_shared_link("https://drive.google.com/file/d/abc"));
    }

    #[test]
    fn test_format_id_strips_prefix() {
        assert_eq!(format_id("id:a4ayc_80_OEAAAAAAAAAXw"), "a4ayc_80_OEAAAAAAAAAXw");
        assert_eq!(format_id(" id:abc "), "abc");
        assert_eq!(format_id("plain"), "plain");
    }

    #[test]
    fn test_relative_path_skips_shared_root() {
        assert_eq!(relative_path(&[IdPathPair::new("r", "Shared")]), "");
        assert_eq!(
            relative_path(&[
                IdPathPair::new("r", "Shared"),
                IdPathPair::new("a", "Photos"),
                IdPathPair::new("b", "2024"),
            ]),
            "/Photos/2024"
        );
    }

    #[test]
    fn test_header_value_is_ascii_json() {
        let value = json!({ "path": "/Fotos/été 🌞.png", "url": "https://x" });
        let header = header_safe_json(&value);

        assert!(header.is_ascii());
        assert!(header.contains("\\u00e9t\\u00e9"));
        assert!(header.contains("\\ud83c\\udf1e"));
        let parsed: serde_json::Value = serde_json::from_str(&header).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn test_single_file_source_omits_path() {
        let http = HttpClient::from_config(&Default::default()).unwrap();
        let resolver = DropboxResolver::new(http, &Credentials::default(), &Endpoints::default());
        let link = "https://www.dropbox.com/s/abcdefghijklmno/a.png";

        let file = resolver.file("t", link, "abc".to_string(), "a.png", vec![], None);

        assert_eq!(file.source.url, "https://content.dropboxapi.com/2/sharing/get_shared_link_file");
        assert_eq!(file.source.headers["Authorization"], "Bearer t");
        assert_eq!(
            file.source.headers[DROPBOX_API_ARG],
            format!("{{\"url\":\"{}\"}}", link)
        );
    }
}

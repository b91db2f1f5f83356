//! Imgur resolver
//!
//! Two link shapes are supported. Direct asset links on `i.imgur.com` resolve
//! to one file derived from the URL path alone, without any request. Album
//! and gallery links are read with one album request; every image becomes a
//! file one level below the album.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::downloader::{
    config::{Credentials, Endpoints, IMGUR_CLIENT_ID, require_secret},
    core::{
        FileSource, HarvestError, HttpClient, IdPathPair, ResolvedFile, Result,
        http::{ensure_success, read_json},
    },
    registry::SourceResolver,
};

pub const IMGUR_ASSET_HOST: &str = "i.imgur.com";

static ALBUM_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:www\.|m\.)?imgur\.com/(?:a|gallery)/(?P<id>[0-9A-Za-z]+)")
        .expect("Imgur album URL pattern is valid")
});

#[derive(Debug, Deserialize)]
struct AlbumInfo {
    data: Album,
}

#[derive(Debug, Deserialize)]
struct Album {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    link: String,
}

/// File for a direct asset link: basename is the filename, its stem the id
pub fn asset_file(link: &str, ancestors: Vec<IdPathPair>) -> Result<ResolvedFile> {
    let parsed = url::Url::parse(link).map_err(|source| HarvestError::MalformedUrl {
        url: link.to_string(),
        source,
    })?;
    let filename = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| HarvestError::Unresolvable {
            url: link.to_string(),
            reason: "asset link has no file name".to_string(),
        })?;
    let id = Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename);

    Ok(ResolvedFile::new(id, filename, FileSource::get(link)).with_ancestors(ancestors))
}

/// Imgur album and asset resolver
pub struct ImgurResolver {
    http: HttpClient,
    client_id: Option<String>,
    api_base: String,
}

impl ImgurResolver {
    pub fn new(http: HttpClient, credentials: &Credentials, endpoints: &Endpoints) -> Self {
        Self {
            http,
            client_id: credentials.imgur_client_id.clone(),
            api_base: endpoints.imgur_api.clone(),
        }
    }

    /// Extract the album id from an album or gallery link
    pub fn extract_album_id(url: &str) -> Option<&str> {
        ALBUM_URL
            .captures(url)
            .and_then(|captures| captures.name("id"))
            .map(|id| id.as_str())
    }

    async fn resolve_album(&self, url: &str, album_id: &str) -> Result<Vec<ResolvedFile>> {
        let client_id = require_secret(self.client_id.as_deref(), IMGUR_CLIENT_ID)?;
        let api_url = format!("{}/3/album/{}", self.api_base, album_id);

        let response = self
            .http
            .send(&api_url, |client| {
                client
                    .get(&api_url)
                    .header("Authorization", format!("Client-ID {}", client_id))
            })
            .await?;
        let response = ensure_success(response, &api_url)?;
        let info: AlbumInfo = read_json(response, &api_url).await?;

        let title = info
            .data
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| album_id.to_string());
        let chain = vec![IdPathPair::new(album_id, title)];
        debug!("Album {} has {} image(s)", url, info.data.images.len());

        info.data
            .images
            .iter()
            .map(|image| asset_file(&image.link, chain.clone()))
            .collect()
    }
}

#[async_trait]
impl SourceResolver for ImgurResolver {
    fn name(&self) -> &'static str {
        "Imgur"
    }

    async fn resolve(&self, url: &str) -> Result<Vec<ResolvedFile>> {
        let Ok(parsed) = url::Url::parse(url) else {
            return Err(HarvestError::declined(self.name(), url));
        };

        if parsed.host_str() == Some(IMGUR_ASSET_HOST) {
            debug!("Direct asset link, no lookup needed: {}", url);
            return Ok(vec![asset_file(url, Vec::new())?]);
        }

        match Self::extract_album_id(url) {
            Some(album_id) => self.resolve_album(url, album_id).await,
            None => Err(HarvestError::declined(self.name(), url)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_file_from_url_path() {
        let file = asset_file("https://i.imgur.com/AbC123x.jpg", vec![]).unwrap();
        assert_eq!(file.id.to_string(), "AbC123x");
        assert_eq!(file.filename, "AbC123x.jpg");
        assert!(file.ancestor_chain.is_empty());
        assert_eq!(file.source, FileSource::get("https://i.imgur.com/AbC123x.jpg"));
    }

    #[test]
    fn test_asset_file_ignores_query() {
        let file = asset_file("https://i.imgur.com/xyz.gifv?maxwidth=100", vec![]).unwrap();
        assert_eq!(file.filename, "xyz.gifv");
        assert_eq!(file.id.to_string(), "xyz");
    }

    #[test]
    fn test_asset_without_name_is_unresolvable() {
        let error = asset_file("https://i.imgur.com/", vec![]).unwrap_err();
        assert!(matches!(error, HarvestError::Unresolvable { .. }));
    }

    #[test]
    fn test_album_id_extraction() {
        assert_eq!(ImgurResolver::extract_album_id("https://imgur.com/a/Xy12z"), Some("Xy12z"));
        assert_eq!(ImgurResolver::extract_album_id("http://imgur.com/gallery/Q9"), Some("Q9"));
        assert_eq!(ImgurResolver::extract_album_id("https://imgur.com/user/someone"), None);
        assert_eq!(ImgurResolver::extract_album_id("https://i.imgur.com/a/b.png"), None);
    }
}

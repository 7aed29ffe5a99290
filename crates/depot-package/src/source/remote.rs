//! HTTP package catalog
//!
//! A catalog is a base URL serving:
//! - `index.json`: array of catalog entries (descriptor fields plus optional `sha256`)
//! - `packages/<full_name>.pkg`: package archives

use super::{CatalogQuery, FetchError, RemoteCatalog};
use crate::archive;
use crate::dependency::Dependency;
use crate::descriptor::PackageDescriptor;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// One entry of a catalog index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub descriptor: PackageDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Parsed index: well-formed entries and the raw entries that failed to parse
#[derive(Debug, Default)]
struct Index {
    entries: Vec<CatalogEntry>,
    rejected: Vec<(Option<String>, String)>,
}

impl Index {
    fn parse(body: &str) -> Result<Self, String> {
        let raw: Vec<serde_json::Value> =
            serde_json::from_str(body).map_err(|e| format!("malformed index: {}", e))?;

        let mut index = Index::default();
        for value in raw {
            let name = value
                .get("name")
                .and_then(|n| n.as_str())
                .map(str::to_string);
            match serde_json::from_value::<CatalogEntry>(value) {
                Ok(mut entry) => {
                    entry.descriptor = entry.descriptor.normalized();
                    index.entries.push(entry);
                }
                Err(e) => index.rejected.push((name, e.to_string())),
            }
        }
        Ok(index)
    }
}

/// Catalog served over HTTP, index fetched once per instance
#[derive(Debug)]
pub struct HttpCatalog {
    base: String,
    client: Client,
    index: OnceCell<Index>,
}

impl HttpCatalog {
    pub fn new(base: impl Into<String>) -> Result<Self, FetchError> {
        let base = base.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Transport {
                uri: base.clone(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            base,
            client,
            index: OnceCell::new(),
        })
    }

    fn index(&self) -> Result<&Index, FetchError> {
        if let Some(index) = self.index.get() {
            return Ok(index);
        }

        let url = format!("{}/index.json", self.base);
        info!("Fetching catalog index from {}", url);
        let body = self.get(&url)?;
        let body = String::from_utf8(body).map_err(|e| FetchError::Transport {
            uri: url.clone(),
            message: format!("index is not UTF-8: {}", e),
        })?;
        let index = Index::parse(&body).map_err(|message| FetchError::Transport {
            uri: url.clone(),
            message,
        })?;
        debug!("Catalog {} lists {} packages", self.base, index.entries.len());

        Ok(self.index.get_or_init(|| index))
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let transport = |message: String| FetchError::Transport {
            uri: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(transport(format!("HTTP {}", response.status())));
        }

        let bytes = response.bytes().map_err(|e| transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn checksum_for(&self, descriptor: &PackageDescriptor) -> Option<&str> {
        self.index
            .get()?
            .entries
            .iter()
            .find(|entry| entry.descriptor == *descriptor)
            .and_then(|entry| entry.sha256.as_deref())
    }
}

impl RemoteCatalog for HttpCatalog {
    fn uri(&self) -> &str {
        &self.base
    }

    fn query(&self, dependency: &Dependency) -> Result<CatalogQuery, FetchError> {
        let index = self.index()?;

        let found = index
            .entries
            .iter()
            .map(|entry| &entry.descriptor)
            .filter(|d| dependency.matches_descriptor(d) && d.platform.matches_current())
            .cloned()
            .collect();

        let errors = index
            .rejected
            .iter()
            .filter(|(name, _)| name.as_deref() == Some(dependency.name.as_str()))
            .map(|(_, message)| FetchError::InvalidEntry {
                uri: self.base.clone(),
                message: message.clone(),
            })
            .collect();

        Ok(CatalogQuery { found, errors })
    }

    fn download(
        &self,
        descriptor: &PackageDescriptor,
        cache_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let file_name = archive::file_name(descriptor);
        let url = format!("{}/packages/{}", self.base, file_name);
        let dest = cache_dir.join("cache").join(&file_name);

        let io_error = |e: std::io::Error| FetchError::Io {
            path: dest.clone(),
            message: e.to_string(),
        };

        info!("Downloading {}", url);
        let bytes = self.get(&url)?;

        if let Some(expected) = self.checksum_for(descriptor) {
            let actual = format!("{:x}", Sha256::digest(&bytes));
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(FetchError::ChecksumMismatch {
                    package: descriptor.full_name(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(&dest, &bytes).map_err(io_error)?;

        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    #[test]
    fn test_index_parse_separates_rejected_entries() {
        let body = r#"[
            {"name": "widget", "version": "1.0.0", "sha256": "abc"},
            {"name": "widget", "version": "not-a-version"},
            {"name": "gear", "version": "2.1.0",
             "dependencies": [{"name": "widget", "requirement": ">=1.0"}]}
        ]"#;

        let index = Index::parse(body).unwrap();
        assert_eq!(index.entries.len(), 2);
        assert_eq!(index.entries[0].sha256.as_deref(), Some("abc"));
        assert_eq!(index.entries[1].descriptor.version, Version::new(2, 1, 0));
        assert_eq!(index.rejected.len(), 1);
        assert_eq!(index.rejected[0].0.as_deref(), Some("widget"));
    }

    #[test]
    fn test_index_parse_rejects_path_escapes() {
        let body = r#"[
            {"name": "../../victim", "version": "1.0.0"},
            {"name": "widget", "version": "1.0.0", "executables": ["../widget"]},
            {"name": "gear", "version": "1.0.0", "executables": ["gear"]}
        ]"#;

        let index = Index::parse(body).unwrap();
        assert_eq!(index.entries.len(), 1);
        assert_eq!(index.entries[0].descriptor.name, "gear");
        assert_eq!(index.rejected.len(), 2);
        assert!(index.rejected[0].1.contains("is not a valid file name"));
        assert_eq!(index.rejected[1].0.as_deref(), Some("widget"));
    }

    #[test]
    fn test_index_parse_rejects_non_array() {
        assert!(Index::parse("{\"name\": \"widget\"}").is_err());
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let catalog = HttpCatalog::new("https://packages.example.com/").unwrap();
        assert_eq!(catalog.uri(), "https://packages.example.com");
    }

    #[test]
    fn test_unreachable_catalog_is_transport_failure() {
        let catalog = HttpCatalog::new("http://127.0.0.1:9").unwrap();
        let err = catalog.query(&Dependency::any("widget")).unwrap_err();
        assert!(err.is_transport());
    }
}

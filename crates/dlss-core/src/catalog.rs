use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::SwapConfig;

/// One downloadable build of the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: String,
    #[serde(default)]
    pub additional_label: String,
    pub md5_hash: String,
    pub download_url: String,
}

impl VersionRecord {
    /// Version string with the additional label appended when there is one.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.additional_label.is_empty() {
            self.version.clone()
        } else {
            format!("{} {}", self.version, self.additional_label)
        }
    }
}

#[derive(Deserialize)]
struct RawCatalog {
    #[serde(default)]
    stable: Option<Vec<VersionRecord>>,
}

/// Ordered, non-empty list of records from the stable channel.
///
/// Records stay in the order the catalog lists them; the last one is the
/// newest build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    records: Vec<VersionRecord>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to fetch version catalog from {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("version catalog request to {url} failed with HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to read version catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse version catalog: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("version catalog has no 'stable' channel")]
    MissingChannel,
    #[error("version catalog lists no versions")]
    Empty,
}

impl Catalog {
    /// Build a catalog from records already in chronological order.
    ///
    /// # Errors
    /// Returns [`CatalogError::Empty`] when `records` is empty.
    pub fn new(records: Vec<VersionRecord>) -> Result<Self, CatalogError> {
        if records.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { records })
    }

    #[must_use]
    pub fn records(&self) -> &[VersionRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn latest(&self) -> &VersionRecord {
        // `new` rejects empty record lists.
        &self.records[self.records.len() - 1]
    }

    #[must_use]
    pub fn find_by_version(&self, version: &str) -> Option<&VersionRecord> {
        self.records.iter().find(|record| record.version == version)
    }

    #[must_use]
    pub fn find_by_hash(&self, md5_hash: &str) -> Option<&VersionRecord> {
        self.records
            .iter()
            .find(|record| record.md5_hash.eq_ignore_ascii_case(md5_hash))
    }

    /// Name the catalog build whose hash matches an installed file's MD5.
    #[must_use]
    pub fn identify(&self, file_md5: &str) -> Option<&VersionRecord> {
        self.find_by_hash(file_md5)
    }
}

/// Parse the raw catalog document and select the stable channel.
///
/// # Errors
/// Returns an error if the document is not valid JSON, has no `stable` key,
/// or the channel is empty.
pub fn parse_catalog(data: &[u8]) -> Result<Catalog, CatalogError> {
    let raw: RawCatalog = serde_json::from_slice(data).map_err(CatalogError::Parse)?;
    let records = raw.stable.ok_or(CatalogError::MissingChannel)?;
    debug!("Parsed {} stable catalog records", records.len());
    Catalog::new(records)
}

/// Fetch and parse the catalog named by `config.catalog_url`.
///
/// HTTP(S) locations are requested once with `client`; anything else is read
/// as a local file.
///
/// # Errors
/// Returns an error when the catalog cannot be retrieved or parsed.
pub async fn fetch_catalog(
    client: &reqwest::Client,
    config: &SwapConfig,
) -> Result<Catalog, CatalogError> {
    let url = config.catalog_url.as_str();

    let data = if crate::is_remote(url) {
        info!("Fetching version catalog from {url}");
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|source| CatalogError::Request {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CatalogError::HttpStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|source| CatalogError::Request {
                url: url.to_string(),
                source,
            })?
            .to_vec()
    } else {
        info!("Reading version catalog from {url}");
        tokio::fs::read(url)
            .await
            .map_err(|source| CatalogError::Io {
                path: url.to_string(),
                source,
            })?
    };

    parse_catalog(&data)
}

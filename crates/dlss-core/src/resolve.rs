use std::fmt;
use std::str::FromStr;

use log::debug;
use thiserror::Error;

use crate::catalog::{Catalog, VersionRecord};

/// Sentinel request naming the newest catalog entry.
pub const LATEST: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    Latest,
    /// A version string, or an MD5 hash when no version matches.
    Exact(String),
}

impl FromStr for VersionRequest {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<&str> for VersionRequest {
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case(LATEST) {
            Self::Latest
        } else {
            Self::Exact(trimmed.to_string())
        }
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST),
            Self::Exact(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Could not find given DLSS version: {request}. Use --list-versions to list versions.")]
    NotFound { request: String },
}

/// Pick the record a request refers to.
///
/// Version strings are matched before hashes, and the first record in catalog
/// order wins when several share a version string.
///
/// # Errors
/// Returns [`ResolveError::NotFound`] when neither a version nor a hash
/// matches.
pub fn resolve<'a>(
    catalog: &'a Catalog,
    request: &VersionRequest,
) -> Result<&'a VersionRecord, ResolveError> {
    let query = match request {
        VersionRequest::Latest => return Ok(catalog.latest()),
        VersionRequest::Exact(query) => query,
    };

    if let Some(record) = catalog.find_by_version(query) {
        debug!("Resolved '{query}' by version string");
        return Ok(record);
    }

    if let Some(record) = catalog.find_by_hash(query) {
        debug!("Resolved '{query}' by MD5 hash to {}", record.version);
        return Ok(record);
    }

    Err(ResolveError::NotFound {
        request: query.clone(),
    })
}

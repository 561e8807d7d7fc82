//! Core logic for locating, fetching and swapping the DLSS library.
//!
//! This crate holds everything that does not belong to the command line:
//! - Catalog retrieval and parsing of the `stable` channel.
//! - Resolution of "latest", version strings and MD5 hashes to a record.
//! - Archive download and payload extraction.
//! - Recursive file lookup inside a game directory.
//! - The backup/replace/restore state transitions on disk.

mod catalog;
mod config;
mod fetch;
mod resolve;
pub mod scanner;
mod swap;

/// Catalog model and fetch helpers.
pub use catalog::{Catalog, CatalogError, VersionRecord, fetch_catalog, parse_catalog};
/// Tool-wide configuration passed into every component.
pub use config::{DEFAULT_CATALOG_URL, DLSS_FILE_NAME, SwapConfig};
/// Archive download and extraction.
pub use fetch::{FetchError, FetchProgress, extract_payload, fetch_payload, md5_hex};
/// Version request parsing and lookup.
pub use resolve::{LATEST, ResolveError, VersionRequest, resolve};
/// Filesystem swap engine.
pub use swap::{Installation, RestoreOutcome, SwapEngine, SwapError, SwapOutcome};

/// Returns true when `location` should be fetched over HTTP rather than read
/// from the local filesystem.
pub(crate) fn is_remote(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

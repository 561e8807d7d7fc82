use std::path::PathBuf;

use thiserror::Error;

/// Everything that can end an invocation; `main` turns it into a message and
/// a failure exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to print help: {0}")]
    Help(#[source] std::io::Error),
    #[error("{} is not an existing directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to load settings from {}: {details}", path.display())]
    Settings { path: PathBuf, details: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error(transparent)]
    Catalog(#[from] dlss_core::CatalogError),
    #[error(transparent)]
    Resolve(#[from] dlss_core::ResolveError),
    #[error(transparent)]
    Fetch(#[from] dlss_core::FetchError),
    #[error(transparent)]
    Swap(#[from] dlss_core::SwapError),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

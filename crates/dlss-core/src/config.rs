use std::time::Duration;

pub const DLSS_FILE_NAME: &str = "nvngx_dlss.dll";
pub const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/beeradmoore/dlss-archive/main/dlss_records.json";

const DEFAULT_BACKUP_SUFFIX: &str = ".backup";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DOWNLOAD_CHUNK_SIZE: usize = 4096;

/// Names and locations every component works against.
///
/// Defaults match the public DLSS archive; tests override the catalog URL
/// with a local file and shrink the chunk size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapConfig {
    pub active_file_name: String,
    pub backup_suffix: String,
    pub catalog_url: String,
    pub archive_entry_name: String,
    pub verify_checksum: bool,
    pub http_timeout_secs: u64,
    pub download_chunk_size: usize,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            active_file_name: DLSS_FILE_NAME.to_string(),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            archive_entry_name: DLSS_FILE_NAME.to_string(),
            verify_checksum: true,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            download_chunk_size: DEFAULT_DOWNLOAD_CHUNK_SIZE,
        }
    }
}

impl SwapConfig {
    #[must_use]
    pub fn backup_file_name(&self) -> String {
        format!("{}{}", self.active_file_name, self.backup_suffix)
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Build the HTTP client used for both the catalog and archive downloads.
    ///
    /// # Errors
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout())
            .user_agent(format!("dlss-swapper/{}", env!("CARGO_PKG_VERSION")))
            .build()
    }
}

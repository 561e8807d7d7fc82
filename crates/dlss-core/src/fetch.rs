use std::io::{Cursor, Read};

use log::{debug, info};
use md5::{Digest, Md5};
use thiserror::Error;
use tokio::io::AsyncReadExt;

use crate::SwapConfig;
use crate::catalog::VersionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub downloaded: u64,
    /// Zero when the server did not announce a length.
    pub total: u64,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to download {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} failed with HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("download of {url} was interrupted after {downloaded} of {expected} bytes")]
    Truncated {
        url: String,
        downloaded: u64,
        expected: u64,
    },
    #[error("failed to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("downloaded file was not a valid archive: {0}")]
    InvalidArchive(#[source] zip::result::ZipError),
    #[error("expected file {entry} missing from archive")]
    PayloadNotFound { entry: String },
    #[error("failed to extract {entry} from archive: {source}")]
    Extract {
        entry: String,
        #[source]
        source: std::io::Error,
    },
    #[error("checksum mismatch for {entry}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        entry: String,
        expected: String,
        actual: String,
    },
}

/// Lowercase hex MD5 of `data`, the format catalog hashes use.
#[must_use]
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}

/// Download the archive for `record`, extract the library and verify it.
///
/// Nothing is written to disk; the caller receives the payload only once it
/// is complete and verified.
///
/// # Errors
/// Returns an error if the transfer fails, the bytes are not a zip archive,
/// the archive lacks the expected entry, or the checksum does not match.
pub async fn fetch_payload(
    client: &reqwest::Client,
    config: &SwapConfig,
    record: &VersionRecord,
    mut on_progress: impl FnMut(FetchProgress),
) -> Result<Vec<u8>, FetchError> {
    let archive = if crate::is_remote(&record.download_url) {
        download(client, config, &record.download_url, &mut on_progress).await?
    } else {
        read_local(config, &record.download_url, &mut on_progress).await?
    };
    info!("Download complete: {} bytes", archive.len());

    let payload = extract_payload(&archive, &config.archive_entry_name)?;

    if config.verify_checksum {
        verify_checksum(&payload, &config.archive_entry_name, &record.md5_hash)?;
        debug!("Checksum verified for {}", record.version);
    }

    Ok(payload)
}

/// Pull the single named entry out of an in-memory zip archive.
///
/// # Errors
/// Returns [`FetchError::InvalidArchive`] for bytes that are not a zip
/// container and [`FetchError::PayloadNotFound`] when the entry is absent.
pub fn extract_payload(archive: &[u8], entry_name: &str) -> Result<Vec<u8>, FetchError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(archive)).map_err(FetchError::InvalidArchive)?;

    let mut entry = archive.by_name(entry_name).map_err(|error| match error {
        zip::result::ZipError::FileNotFound => FetchError::PayloadNotFound {
            entry: entry_name.to_string(),
        },
        other => FetchError::InvalidArchive(other),
    })?;

    let mut payload = Vec::new();
    entry
        .read_to_end(&mut payload)
        .map_err(|source| FetchError::Extract {
            entry: entry_name.to_string(),
            source,
        })?;

    debug!("Extracted {entry_name}: {} bytes", payload.len());
    Ok(payload)
}

fn verify_checksum(payload: &[u8], entry: &str, expected: &str) -> Result<(), FetchError> {
    let actual = md5_hex(payload);
    if actual.eq_ignore_ascii_case(expected) {
        return Ok(());
    }

    Err(FetchError::ChecksumMismatch {
        entry: entry.to_string(),
        expected: expected.to_ascii_lowercase(),
        actual,
    })
}

/// Emits progress once per `chunk_size` bytes and once at the end.
struct ProgressThrottle {
    chunk_size: u64,
    last_reported: u64,
}

impl ProgressThrottle {
    fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1) as u64,
            last_reported: 0,
        }
    }

    fn update(&mut self, progress: FetchProgress, on_progress: &mut impl FnMut(FetchProgress)) {
        if progress.downloaded - self.last_reported >= self.chunk_size {
            self.last_reported = progress.downloaded;
            on_progress(progress);
        }
    }

    fn finish(&mut self, progress: FetchProgress, on_progress: &mut impl FnMut(FetchProgress)) {
        if progress.downloaded != self.last_reported || progress.downloaded == 0 {
            self.last_reported = progress.downloaded;
            on_progress(progress);
        }
    }
}

async fn download(
    client: &reqwest::Client,
    config: &SwapConfig,
    url: &str,
    on_progress: &mut impl FnMut(FetchProgress),
) -> Result<Vec<u8>, FetchError> {
    use futures_util::StreamExt;

    info!("Downloading {url}");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let total = response.content_length().unwrap_or(0);
    let mut data = Vec::with_capacity(usize::try_from(total).unwrap_or(0));
    let mut throttle = ProgressThrottle::new(config.download_chunk_size);

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let downloaded = data.len() as u64;
        let chunk = chunk.map_err(|source| {
            // hyper reports a body shorter than Content-Length as a body error
            if total > 0 && downloaded < total {
                FetchError::Truncated {
                    url: url.to_string(),
                    downloaded,
                    expected: total,
                }
            } else {
                FetchError::Request {
                    url: url.to_string(),
                    source,
                }
            }
        })?;
        data.extend_from_slice(&chunk);
        throttle.update(
            FetchProgress {
                downloaded: data.len() as u64,
                total,
            },
            on_progress,
        );
    }

    throttle.finish(
        FetchProgress {
            downloaded: data.len() as u64,
            total,
        },
        on_progress,
    );
    Ok(data)
}

async fn read_local(
    config: &SwapConfig,
    path: &str,
    on_progress: &mut impl FnMut(FetchProgress),
) -> Result<Vec<u8>, FetchError> {
    let io_error = |source| FetchError::Io {
        location: path.to_string(),
        source,
    };

    info!("Reading archive from {path}");
    let mut file = tokio::fs::File::open(path).await.map_err(io_error)?;
    let total = file.metadata().await.map_err(io_error)?.len();

    let mut data = Vec::with_capacity(usize::try_from(total).unwrap_or(0));
    let mut buffer = vec![0_u8; config.download_chunk_size.max(1)];
    let mut throttle = ProgressThrottle::new(config.download_chunk_size);

    loop {
        let read = file.read(&mut buffer).await.map_err(io_error)?;
        if read == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..read]);
        throttle.update(
            FetchProgress {
                downloaded: data.len() as u64,
                total,
            },
            on_progress,
        );
    }

    throttle.finish(
        FetchProgress {
            downloaded: data.len() as u64,
            total,
        },
        on_progress,
    );
    Ok(data)
}

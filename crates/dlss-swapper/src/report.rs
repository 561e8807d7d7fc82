use std::fmt::{self, Write as _};
use std::io::Write as _;
use std::path::Path;

use dlss_core::{Catalog, FetchProgress, Installation, md5_hex};

use crate::error::CliError;

pub fn version_list(catalog: &Catalog) -> String {
    let mut out = String::from("Available DLSS versions:\n");
    for record in catalog.records() {
        let _ = writeln!(out, "\t{} : {}", record.display_name(), record.md5_hash);
    }
    out
}

/// Name the build stored at `path` by looking its hash up in the catalog.
pub fn describe_file(path: &Path, catalog: Option<&Catalog>) -> Result<String, CliError> {
    let contents = std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let hash = md5_hex(&contents);

    Ok(match catalog.and_then(|catalog| catalog.identify(&hash)) {
        Some(record) => record.display_name(),
        None => format!("unknown build (md5 {hash})"),
    })
}

/// Versions found in a game directory at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationReport {
    pub game_name: String,
    pub active: Option<String>,
    pub backup: Option<String>,
}

impl InstallationReport {
    pub fn build(
        installation: &Installation,
        catalog: Option<&Catalog>,
    ) -> Result<Self, CliError> {
        let describe =
            |path: Option<&Path>| path.map(|path| describe_file(path, catalog)).transpose();

        Ok(Self {
            game_name: installation.game_name(),
            active: describe(installation.active.as_deref())?,
            backup: describe(installation.backup.as_deref())?,
        })
    }

    fn active_label(&self) -> &str {
        self.active.as_deref().unwrap_or("(none)")
    }
}

impl fmt::Display for InstallationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(backup) = &self.backup {
            writeln!(f, "{} has a backup DLSS {backup}", self.game_name)?;
        }
        match &self.active {
            Some(active) => write!(f, "{} uses DLSS {active}", self.game_name),
            None => write!(f, "{} has no DLSS dll", self.game_name),
        }
    }
}

/// Before/after summary printed once a swap or restore has completed.
pub fn change_summary(before: &InstallationReport, after: &InstallationReport) -> String {
    let name = &after.game_name;
    let mut out = String::new();
    if let Some(backup) = &after.backup {
        let _ = writeln!(out, "{name} has DLSS {backup} backed up.");
    }
    let _ = writeln!(out, "{name} was using DLSS {}", before.active_label());
    let _ = write!(out, "{name} now uses DLSS {}", after.active_label());
    out
}

/// Single-line download progress on stderr.
#[derive(Default)]
pub struct ProgressLine {
    printed: bool,
}

impl ProgressLine {
    pub fn update(&mut self, progress: FetchProgress) {
        let line = progress_text(progress);
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r{line}");
        let _ = stderr.flush();
        self.printed = true;
    }

    pub fn finish(self) {
        if self.printed {
            eprintln!();
        }
    }
}

fn progress_text(progress: FetchProgress) -> String {
    if progress.total == 0 {
        return format!("Downloaded {} KiB", progress.downloaded / 1024);
    }
    let percent = progress.downloaded.saturating_mul(100) / progress.total;
    format!(
        "Downloaded {} / {} KiB ({percent}%)",
        progress.downloaded / 1024,
        progress.total / 1024
    )
}

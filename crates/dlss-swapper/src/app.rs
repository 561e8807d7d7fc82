use std::path::{Path, PathBuf};

use dlss_core::{
    Catalog, SwapConfig, SwapEngine, VersionRecord, VersionRequest, fetch_catalog, fetch_payload,
    resolve,
};
use log::{info, warn};

use crate::cli::Operation;
use crate::error::CliError;
use crate::report::{self, InstallationReport, ProgressLine};

/// Run one operation to completion.
pub async fn execute(config: &SwapConfig, operation: Operation) -> Result<(), CliError> {
    let client = config.http_client().map_err(CliError::HttpClient)?;

    match operation {
        Operation::ListVersions => {
            let catalog = fetch_catalog(&client, config).await?;
            print!("{}", report::version_list(&catalog));
            Ok(())
        }
        Operation::Download {
            request,
            output_dir,
        } => download(&client, config, &request, output_dir).await,
        Operation::Swap { request, game_dir } => swap(&client, config, &request, &game_dir).await,
        Operation::Restore { game_dir } => restore(&client, config, &game_dir).await,
        Operation::Info { game_dir } => show_info(&client, config, &game_dir).await,
    }
}

async fn download(
    client: &reqwest::Client,
    config: &SwapConfig,
    request: &VersionRequest,
    output_dir: Option<PathBuf>,
) -> Result<(), CliError> {
    let catalog = fetch_catalog(client, config).await?;
    let (record, payload) = download_payload(client, config, &catalog, request).await?;

    let dir = output_dir.unwrap_or_else(|| PathBuf::from("."));
    let path = dir.join(&config.active_file_name);
    println!("Writing DLSS {} to {}", record.version, dir.display());
    std::fs::write(&path, &payload).map_err(|source| CliError::Write {
        path: path.clone(),
        source,
    })?;
    info!("Wrote {} bytes to {}", payload.len(), path.display());
    Ok(())
}

async fn swap(
    client: &reqwest::Client,
    config: &SwapConfig,
    request: &VersionRequest,
    game_dir: &Path,
) -> Result<(), CliError> {
    let engine = SwapEngine::new(config);
    let installation = engine.inspect(game_dir)?;
    warn_about_duplicates(&installation);

    // Fail before downloading anything if there is nothing to replace.
    if installation.active.is_none() {
        return Err(dlss_core::SwapError::ActiveFileNotFound {
            file: config.active_file_name.clone(),
            game_dir: game_dir.to_path_buf(),
        }
        .into());
    }

    let catalog = fetch_catalog(client, config).await?;
    let before = InstallationReport::build(&installation, Some(&catalog))?;
    let (_, payload) = download_payload(client, config, &catalog, request).await?;

    let outcome = engine.swap(game_dir, &payload)?;
    if outcome.backup_created {
        println!("Backed up original to {}", outcome.backup_path.display());
    }
    println!("done.");

    let after = InstallationReport::build(&engine.inspect(game_dir)?, Some(&catalog))?;
    println!("{}", report::change_summary(&before, &after));
    Ok(())
}

async fn restore(
    client: &reqwest::Client,
    config: &SwapConfig,
    game_dir: &Path,
) -> Result<(), CliError> {
    let engine = SwapEngine::new(config);
    let installation = engine.inspect(game_dir)?;
    let catalog = catalog_for_labels(client, config).await;
    let before = InstallationReport::build(&installation, catalog.as_ref())?;

    print!("Restoring... ");
    let outcome = engine.restore(game_dir)?;
    println!("done.");
    info!("Restored from {}", outcome.backup_path.display());

    let after = InstallationReport::build(&engine.inspect(game_dir)?, catalog.as_ref())?;
    println!("{}", report::change_summary(&before, &after));
    Ok(())
}

async fn show_info(
    client: &reqwest::Client,
    config: &SwapConfig,
    game_dir: &Path,
) -> Result<(), CliError> {
    let installation = SwapEngine::new(config).inspect(game_dir)?;
    warn_about_duplicates(&installation);
    let catalog = catalog_for_labels(client, config).await;

    println!(
        "{}",
        InstallationReport::build(&installation, catalog.as_ref())?
    );
    Ok(())
}

/// Resolve `request`, then download and extract its payload.
async fn download_payload(
    client: &reqwest::Client,
    config: &SwapConfig,
    catalog: &Catalog,
    request: &VersionRequest,
) -> Result<(VersionRecord, Vec<u8>), CliError> {
    let record = resolve(catalog, request)?;
    if let VersionRequest::Exact(_) = request {
        println!("Found {} version", record.version);
    }

    println!("Downloading DLSS...");
    println!("Version: {}", record.display_name());
    println!("MD5 Hash: {}", record.md5_hash);

    let mut progress = ProgressLine::default();
    let payload = fetch_payload(client, config, record, |update| progress.update(update)).await;
    progress.finish();

    Ok((record.clone(), payload?))
}

/// The catalog is only used to name installed builds here, so a failure to
/// load it is reported and the report falls back to hashes.
async fn catalog_for_labels(client: &reqwest::Client, config: &SwapConfig) -> Option<Catalog> {
    match fetch_catalog(client, config).await {
        Ok(catalog) => Some(catalog),
        Err(error) => {
            warn!("Version catalog unavailable: {error}");
            eprintln!("warning: {error}; versions are shown by hash");
            None
        }
    }
}

fn warn_about_duplicates(installation: &dlss_core::Installation) {
    if installation.other_actives.is_empty() {
        return;
    }
    let Some(active) = &installation.active else {
        return;
    };

    eprintln!(
        "warning: several DLSS dlls found; using {}. Also found:",
        active.display()
    );
    for path in &installation.other_actives {
        eprintln!("\t{}", path.display());
    }
    warn!(
        "{} duplicate dll(s) under {}",
        installation.other_actives.len(),
        installation.game_dir.display()
    );
}

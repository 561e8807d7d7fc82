use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, info, warn};
use thiserror::Error;

use crate::SwapConfig;
use crate::scanner::{self, ScanError};

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("{file} was not found in {}", game_dir.display())]
    ActiveFileNotFound { file: String, game_dir: PathBuf },
    #[error("could not find backup file {file} in {}", game_dir.display())]
    BackupNotFound { file: String, game_dir: PathBuf },
    #[error("another swap is in progress for {}", .0.display())]
    Locked(PathBuf),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SwapError {
    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    pub active_path: PathBuf,
    pub backup_path: PathBuf,
    /// False when an earlier backup was kept as-is.
    pub backup_created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub active_path: PathBuf,
    pub backup_path: PathBuf,
}

/// Where the library and its backup currently live inside a game directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub game_dir: PathBuf,
    pub active: Option<PathBuf>,
    pub backup: Option<PathBuf>,
    /// Active-named files other than `active`; non-empty means the scan was
    /// ambiguous.
    pub other_actives: Vec<PathBuf>,
}

impl Installation {
    /// Final component of the game directory, used as a display name.
    #[must_use]
    pub fn game_name(&self) -> String {
        self.game_dir.file_name().map_or_else(
            || self.game_dir.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }
}

/// Backup-then-replace and restore operations on a game directory.
///
/// A backup, once written, is never replaced: it always holds the library as
/// it was before the first swap.
pub struct SwapEngine<'a> {
    config: &'a SwapConfig,
}

impl<'a> SwapEngine<'a> {
    #[must_use]
    pub fn new(config: &'a SwapConfig) -> Self {
        Self { config }
    }

    /// Locate the active library and backup without touching either.
    ///
    /// # Errors
    /// Returns an error if `game_dir` is not a directory.
    pub fn inspect(&self, game_dir: &Path) -> Result<Installation, SwapError> {
        let mut actives = scanner::find_all_by_name(game_dir, &self.config.active_file_name)?;
        let active = actives.pop();
        let backup = scanner::find_by_name(game_dir, &self.config.backup_file_name())?;

        Ok(Installation {
            game_dir: game_dir.to_path_buf(),
            active,
            backup,
            other_actives: actives,
        })
    }

    /// Replace the active library under `game_dir` with `payload`.
    ///
    /// The current library is copied to a sibling backup first unless a
    /// backup already exists.
    ///
    /// # Errors
    /// Returns an error if no active library exists, another swap holds the
    /// lock, or any read/write fails. A failed final write is not rolled
    /// back.
    pub fn swap(&self, game_dir: &Path, payload: &[u8]) -> Result<SwapOutcome, SwapError> {
        let active_path = scanner::find_by_name(game_dir, &self.config.active_file_name)?
            .ok_or_else(|| SwapError::ActiveFileNotFound {
                file: self.config.active_file_name.clone(),
                game_dir: game_dir.to_path_buf(),
            })?;
        let backup_path = self.backup_path_for(&active_path);

        let _lock = SwapLock::acquire(&active_path)?;

        let backup_created = if backup_path.exists() {
            info!("Keeping existing backup at {}", backup_path.display());
            false
        } else {
            copy_via_temp(&active_path, &backup_path)?;
            info!(
                "Backed up {} to {}",
                active_path.display(),
                backup_path.display()
            );
            true
        };

        std::fs::write(&active_path, payload)
            .map_err(|error| SwapError::io("failed to write new library to", &active_path, error))?;
        info!("Wrote {} bytes to {}", payload.len(), active_path.display());

        Ok(SwapOutcome {
            active_path,
            backup_path,
            backup_created,
        })
    }

    /// Copy the backup's contents over the active library next to it.
    ///
    /// The backup stays in place, so restoring twice is harmless.
    ///
    /// # Errors
    /// Returns an error if no backup exists, another swap holds the lock, or
    /// any read/write fails.
    pub fn restore(&self, game_dir: &Path) -> Result<RestoreOutcome, SwapError> {
        let backup_file_name = self.config.backup_file_name();
        let backup_path = scanner::find_by_name(game_dir, &backup_file_name)?.ok_or_else(|| {
            SwapError::BackupNotFound {
                file: backup_file_name.clone(),
                game_dir: game_dir.to_path_buf(),
            }
        })?;
        let active_path = self.active_path_for(&backup_path);

        let contents = std::fs::read(&backup_path)
            .map_err(|error| SwapError::io("failed to read backup", &backup_path, error))?;

        let _lock = SwapLock::acquire(&active_path)?;
        std::fs::write(&active_path, &contents)
            .map_err(|error| SwapError::io("failed to restore library to", &active_path, error))?;
        info!(
            "Restored {} from {}",
            active_path.display(),
            backup_path.display()
        );

        Ok(RestoreOutcome {
            active_path,
            backup_path,
        })
    }

    fn backup_path_for(&self, active_path: &Path) -> PathBuf {
        with_file_name_suffix(active_path, &self.config.backup_suffix)
    }

    fn active_path_for(&self, backup_path: &Path) -> PathBuf {
        let stripped = backup_path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(self.config.backup_suffix.as_str()))
            .unwrap_or(&self.config.active_file_name)
            .to_string();
        backup_path.with_file_name(stripped)
    }
}

fn with_file_name_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Copy `src` to `dest` through a temporary sibling so `dest` only appears
/// once it is complete.
fn copy_via_temp(src: &Path, dest: &Path) -> Result<(), SwapError> {
    let tmp = with_file_name_suffix(dest, ".tmp");
    std::fs::copy(src, &tmp)
        .map_err(|error| SwapError::io("failed to copy library to", &tmp, error))?;

    if let Err(error) = std::fs::rename(&tmp, dest) {
        if let Err(cleanup) = std::fs::remove_file(&tmp) {
            warn!("Failed to remove {}: {cleanup}", tmp.display());
        }
        return Err(SwapError::io("failed to move backup into place at", dest, error));
    }
    Ok(())
}

/// Advisory lock held on a `.lock` sibling of the active library while it
/// is being rewritten. The lock file itself stays on disk; closing the handle
/// releases the lock.
struct SwapLock {
    _file: File,
}

impl SwapLock {
    fn acquire(active_path: &Path) -> Result<Self, SwapError> {
        let path = with_file_name_suffix(active_path, ".lock");
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|error| SwapError::io("failed to open lock file", &path, error))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(SwapError::Locked(active_path.to_path_buf()));
            }
            Err(error) => {
                return Err(SwapError::io("failed to lock", &path, error));
            }
        }

        debug!("Acquired swap lock {}", path.display());
        Ok(Self { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const ORIGINAL: &[u8] = b"original dll";

    fn game_with_active(root: &Path) -> PathBuf {
        let bin = root.join("bin").join("x64");
        fs::create_dir_all(&bin).expect("game dirs should be created");
        let active = bin.join("nvngx_dlss.dll");
        fs::write(&active, ORIGINAL).expect("active dll should be written");
        active
    }

    #[test]
    fn swap_creates_backup_with_pre_swap_bytes() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let active = game_with_active(temp.path());
        let config = SwapConfig::default();
        let engine = SwapEngine::new(&config);

        let outcome = engine.swap(temp.path(), b"new dll").expect("swap should succeed");

        assert!(outcome.backup_created);
        assert_eq!(outcome.active_path, active);
        assert_eq!(
            outcome.backup_path,
            active.with_file_name("nvngx_dlss.dll.backup")
        );
        assert_eq!(fs::read(&active).expect("active readable"), b"new dll");
        assert_eq!(fs::read(&outcome.backup_path).expect("backup readable"), ORIGINAL);
    }

    #[test]
    fn second_swap_keeps_first_backup() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let active = game_with_active(temp.path());
        let config = SwapConfig::default();
        let engine = SwapEngine::new(&config);

        let first = engine.swap(temp.path(), b"p1").expect("first swap");
        let backup_after_first = fs::read(&first.backup_path).expect("backup readable");

        let second = engine.swap(temp.path(), b"p2").expect("second swap");
        assert!(!second.backup_created);
        assert_eq!(fs::read(&second.backup_path).expect("backup readable"), backup_after_first);
        assert_eq!(backup_after_first, ORIGINAL);
        assert_eq!(fs::read(&active).expect("active readable"), b"p2");
    }

    #[test]
    fn swap_without_active_file_fails_and_creates_nothing() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        fs::write(temp.path().join("game.exe"), b"exe").expect("exe should be written");
        let config = SwapConfig::default();

        let result = SwapEngine::new(&config).swap(temp.path(), b"new");

        assert!(matches!(result, Err(SwapError::ActiveFileNotFound { .. })));
        let entries: Vec<_> = fs::read_dir(temp.path())
            .expect("dir readable")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("game.exe")]);
    }

    #[test]
    fn swap_leaves_no_temp_files() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let active = game_with_active(temp.path());
        let config = SwapConfig::default();

        SwapEngine::new(&config)
            .swap(temp.path(), b"new")
            .expect("swap should succeed");

        let mut names: Vec<String> = fs::read_dir(active.parent().expect("parent"))
            .expect("dir readable")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            ["nvngx_dlss.dll", "nvngx_dlss.dll.backup", "nvngx_dlss.dll.lock"]
        );
    }

    #[test]
    fn swap_fails_while_lock_is_held() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let active = game_with_active(temp.path());
        let config = SwapConfig::default();

        let held = SwapLock::acquire(&active).expect("lock should be acquired");
        let result = SwapEngine::new(&config).swap(temp.path(), b"new");
        drop(held);

        assert!(matches!(result, Err(SwapError::Locked(_))));
        assert_eq!(fs::read(&active).expect("active readable"), ORIGINAL);
    }

    #[test]
    fn lock_file_outlives_the_operation_and_can_be_relocked() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let active = game_with_active(temp.path());
        let config = SwapConfig::default();
        let engine = SwapEngine::new(&config);

        engine.swap(temp.path(), b"new").expect("swap should succeed");
        let lock_path = with_file_name_suffix(&active, ".lock");
        assert!(lock_path.is_file());

        let held = SwapLock::acquire(&active).expect("released lock should be reacquired");
        assert!(matches!(
            engine.restore(temp.path()),
            Err(SwapError::Locked(_))
        ));
        drop(held);

        engine.restore(temp.path()).expect("restore should succeed once unlocked");
        assert_eq!(fs::read(&active).expect("active readable"), ORIGINAL);
        assert!(lock_path.is_file());
    }

    #[test]
    fn restore_round_trips_original_bytes() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let active = game_with_active(temp.path());
        let config = SwapConfig::default();
        let engine = SwapEngine::new(&config);

        let swapped = engine.swap(temp.path(), b"new dll").expect("swap should succeed");
        let restored = engine.restore(temp.path()).expect("restore should succeed");

        assert_eq!(restored.active_path, active);
        assert_eq!(restored.backup_path, swapped.backup_path);
        assert_eq!(fs::read(&active).expect("active readable"), ORIGINAL);
        assert_eq!(fs::read(&restored.backup_path).expect("backup kept"), ORIGINAL);
    }

    #[test]
    fn restore_twice_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let active = game_with_active(temp.path());
        let config = SwapConfig::default();
        let engine = SwapEngine::new(&config);
        engine.swap(temp.path(), b"new dll").expect("swap should succeed");

        engine.restore(temp.path()).expect("first restore");
        let after_first = fs::read(&active).expect("active readable");
        engine.restore(temp.path()).expect("second restore");

        assert_eq!(fs::read(&active).expect("active readable"), after_first);
    }

    #[test]
    fn restore_recreates_deleted_active_file() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let active = game_with_active(temp.path());
        let config = SwapConfig::default();
        let engine = SwapEngine::new(&config);
        engine.swap(temp.path(), b"new dll").expect("swap should succeed");
        fs::remove_file(&active).expect("active should be removable");

        engine.restore(temp.path()).expect("restore should succeed");
        assert_eq!(fs::read(&active).expect("active readable"), ORIGINAL);
    }

    #[test]
    fn restore_without_backup_fails() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let active = game_with_active(temp.path());
        let config = SwapConfig::default();

        let result = SwapEngine::new(&config).restore(temp.path());

        assert!(matches!(result, Err(SwapError::BackupNotFound { .. })));
        assert_eq!(fs::read(&active).expect("active readable"), ORIGINAL);
    }

    #[test]
    fn custom_names_are_honoured() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let active = temp.path().join("libxess.dll");
        fs::write(&active, ORIGINAL).expect("active should be written");
        let config = SwapConfig {
            active_file_name: "libxess.dll".to_string(),
            backup_suffix: ".orig".to_string(),
            ..SwapConfig::default()
        };
        let engine = SwapEngine::new(&config);

        let outcome = engine.swap(temp.path(), b"new").expect("swap should succeed");
        assert_eq!(outcome.backup_path, temp.path().join("libxess.dll.orig"));

        engine.restore(temp.path()).expect("restore should succeed");
        assert_eq!(fs::read(&active).expect("active readable"), ORIGINAL);
    }

    #[test]
    fn inspect_reports_active_backup_and_duplicates() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let game = temp.path().join("Cyberpunk 2077");
        let active = game_with_active(&game);
        let plugin_dir = game.join("a_plugins");
        fs::create_dir_all(&plugin_dir).expect("plugin dir should be created");
        fs::write(plugin_dir.join("nvngx_dlss.dll"), b"other").expect("duplicate written");
        let config = SwapConfig::default();
        let engine = SwapEngine::new(&config);

        let before = engine.inspect(&game).expect("inspect should succeed");
        assert_eq!(before.game_name(), "Cyberpunk 2077");
        assert_eq!(before.active.as_deref(), Some(active.as_path()));
        assert_eq!(before.backup, None);
        assert_eq!(before.other_actives, vec![plugin_dir.join("nvngx_dlss.dll")]);

        engine.swap(&game, b"new").expect("swap should succeed");
        let after = engine.inspect(&game).expect("inspect should succeed");
        assert_eq!(
            after.backup,
            Some(active.with_file_name("nvngx_dlss.dll.backup"))
        );
    }
}

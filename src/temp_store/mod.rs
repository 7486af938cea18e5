//! Scratch files for outputs the caller did not name.
//!
//! Every allocated file is tracked and removed by [`TempStore::reclaim_all`], on
//! drop, and (when installed) on an interrupt, termination or hangup signal.

pub mod error;
#[cfg(unix)]
mod signal;

#[cfg(unix)]
pub(crate) use signal::install_signal_cleanup;

use crate::temp_store::error::TempStoreError;
use log::{debug, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Prefix of every scratch file name.
pub const TEMP_PREFIX: &str = "cdoRs";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
pub struct TempStore {
    dir: PathBuf,
    allocated: Mutex<Vec<PathBuf>>,
    keep: bool,
}

impl TempStore {
    /// Creates a store in `dir`, creating the directory if it does not exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, TempStoreError> {
        let dir = dir.into();
        ensure_dir_exists(&dir)?;
        Ok(Self {
            dir,
            allocated: Mutex::new(Vec::new()),
            keep: false,
        })
    }

    pub fn in_system_temp() -> Result<Self, TempStoreError> {
        Self::new(std::env::temp_dir())
    }

    /// Never delete allocated files. Useful when inspecting intermediate results.
    pub fn keep_files(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn allocated(&self) -> std::sync::MutexGuard<'_, Vec<PathBuf>> {
        self.allocated
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn allocate(&self) -> Result<PathBuf, TempStoreError> {
        self.allocate_with_suffix("")
    }

    /// Allocates a fresh path. The file is created empty so the name stays reserved.
    pub fn allocate_with_suffix(&self, suffix: &str) -> Result<PathBuf, TempStoreError> {
        let prefix = format!(
            "{}{}_{}_",
            TEMP_PREFIX,
            std::process::id(),
            SEQUENCE.fetch_add(1, Ordering::Relaxed)
        );
        let (_, path) = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(suffix)
            .tempfile_in(&self.dir)
            .map_err(|e| TempStoreError::Allocation(self.dir.clone(), e))?
            .keep()
            .map_err(|e| TempStoreError::Allocation(self.dir.clone(), e.error))?;
        self.allocated().push(path.clone());
        debug!("Allocated scratch file {:?}", path);
        Ok(path)
    }

    /// Takes ownership of files the tool created next to an allocated path.
    pub fn track(&self, paths: impl IntoIterator<Item = PathBuf>) {
        let mut allocated = self.allocated();
        for path in paths {
            if !allocated.contains(&path) {
                allocated.push(path);
            }
        }
    }

    pub fn allocated_paths(&self) -> Vec<PathBuf> {
        self.allocated().clone()
    }

    pub fn owns(&self, path: &Path) -> bool {
        self.allocated().iter().any(|p| p == path)
    }

    /// Deletes every tracked file that still exists. Safe to call repeatedly.
    pub fn reclaim_all(&self) -> Result<usize, TempStoreError> {
        if self.keep {
            return Ok(0);
        }
        let paths: Vec<PathBuf> = std::mem::take(&mut *self.allocated());
        let mut removed = 0;
        let mut failed = Vec::new();
        let mut first_error = None;
        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Could not delete scratch file {:?}: {}", path, e);
                    failed.push(path.clone());
                    first_error.get_or_insert(TempStoreError::Deletion(path, e));
                }
            }
        }
        // Failed paths stay tracked so a later call or the drop can retry them.
        self.track(failed);
        if removed > 0 {
            debug!("Reclaimed {} scratch files in {:?}", removed, self.dir);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Deletes every file in the directory that carries the scratch prefix and
    /// belongs to the current user, including leftovers from earlier sessions.
    pub fn sweep_directory(&self) -> Result<usize, TempStoreError> {
        let entries =
            std::fs::read_dir(&self.dir).map_err(|e| TempStoreError::DirRead(self.dir.clone(), e))?;
        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() || !owned_by_current_user(&metadata) {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Could not delete {:?}: {}", entry.path(), e),
            }
        }
        self.allocated().retain(|p| p.exists());
        info!("Swept {} scratch files from {:?}", removed, self.dir);
        Ok(removed)
    }
}

impl Drop for TempStore {
    fn drop(&mut self) {
        if let Err(e) = self.reclaim_all() {
            warn!("Scratch cleanup incomplete: {}", e);
        }
    }
}

#[cfg(unix)]
fn owned_by_current_user(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    metadata.uid() == nix::unistd::getuid().as_raw()
}

#[cfg(not(unix))]
fn owned_by_current_user(_metadata: &std::fs::Metadata) -> bool {
    true
}

fn ensure_dir_exists(path: &Path) -> Result<(), TempStoreError> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(TempStoreError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating temp directory: {}", path.display());
            std::fs::create_dir_all(path).map_err(|e| TempStoreError::DirCreation(path.to_path_buf(), e))
        }
        Err(e) => Err(TempStoreError::DirCreation(path.to_path_buf(), e)),
    }
}

/// Registers `store` for cleanup on SIGINT, SIGTERM and SIGHUP.
#[cfg(not(unix))]
pub(crate) fn install_signal_cleanup(_store: &std::sync::Arc<TempStore>) {
    debug!("Signal cleanup is only available on unix; scratch files are removed on drop");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_allocations_are_unique_and_reclaimed() -> Result<(), TempStoreError> {
        let dir = tempdir().unwrap();
        let store = TempStore::new(dir.path())?;
        let first = store.allocate()?;
        let second = store.allocate()?;

        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
        assert!(first.file_name().unwrap().to_string_lossy().starts_with(TEMP_PREFIX));

        assert_eq!(store.reclaim_all()?, 2);
        assert!(!first.exists() && !second.exists());
        assert_eq!(store.reclaim_all()?, 0);
        Ok(())
    }

    #[test]
    fn test_failed_deletions_stay_tracked() -> Result<(), TempStoreError> {
        let dir = tempdir().unwrap();
        let store = TempStore::new(dir.path())?;
        let stuck = dir.path().join(format!("{}_stuck", TEMP_PREFIX));
        std::fs::create_dir(&stuck).unwrap();
        store.track([stuck.clone()]);
        let plain = store.allocate()?;

        assert!(matches!(
            store.reclaim_all(),
            Err(TempStoreError::Deletion(path, _)) if path == stuck
        ));
        assert!(!plain.exists());
        assert_eq!(store.allocated_paths(), vec![stuck.clone()]);

        std::fs::remove_dir(&stuck).unwrap();
        std::fs::write(&stuck, b"").unwrap();
        assert_eq!(store.reclaim_all()?, 1);
        assert!(!stuck.exists());
        assert!(store.allocated_paths().is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_directory_is_created() -> Result<(), TempStoreError> {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = TempStore::new(&nested)?;
        assert!(nested.is_dir());
        assert!(store.allocate_with_suffix(".nc")?.to_string_lossy().ends_with(".nc"));
        Ok(())
    }

    #[test]
    fn test_file_in_place_of_directory_is_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            TempStore::new(&file),
            Err(TempStoreError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_drop_reclaims_unless_kept() -> Result<(), TempStoreError> {
        let dir = tempdir().unwrap();
        let path = {
            let store = TempStore::new(dir.path())?;
            store.allocate()?
        };
        assert!(!path.exists());

        let kept = {
            let store = TempStore::new(dir.path())?.keep_files(true);
            store.allocate()?
        };
        assert!(kept.exists());
        Ok(())
    }

    #[test]
    fn test_sweep_removes_foreign_leftovers_only() -> Result<(), TempStoreError> {
        let dir = tempdir().unwrap();
        let leftover = dir.path().join(format!("{}999_0_old", TEMP_PREFIX));
        let unrelated = dir.path().join("keep-me.nc");
        std::fs::write(&leftover, b"").unwrap();
        std::fs::write(&unrelated, b"").unwrap();

        let store = TempStore::new(dir.path())?;
        let own = store.allocate()?;
        assert_eq!(store.sweep_directory()?, 2);
        assert!(!leftover.exists() && !own.exists());
        assert!(unrelated.exists());
        Ok(())
    }
}

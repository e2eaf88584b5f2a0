//! Flash filesystem seam for the plaintext configuration document.
//!
//! The appliance keeps its configuration as one small file on a flash
//! filesystem that must be mounted before use. [`ConfigFs`] captures
//! exactly the operations the manager needs: mount, whole-file read, and
//! atomic whole-file replace. [`MemoryConfigFs`] backs tests (including
//! mount-failure simulation); [`DirConfigFs`] maps the document into a
//! host directory for bench tooling.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

/// Filesystem operations backing the configuration document.
pub trait ConfigFs {
    /// Mounts the filesystem. Idempotent; called at the start of every
    /// load and save.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Mount`] when the filesystem is
    /// unavailable.
    fn mount(&mut self) -> ConfigResult<()>;

    /// Reads an entire file, or `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for failures other than absence.
    fn read(&mut self, path: &str) -> ConfigResult<Option<Vec<u8>>>;

    /// Atomically replaces a file's contents.
    ///
    /// Readers observe either the previous content or the new content,
    /// never a partial write.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement cannot be completed; the
    /// previous content is then still in place.
    fn write_atomic(&mut self, path: &str, data: &[u8]) -> ConfigResult<()>;
}

// =============================================================================
// MemoryConfigFs
// =============================================================================

/// In-memory filesystem used by tests.
///
/// Mount availability can be toggled to simulate a damaged flash
/// partition, and a write counter supports exactly-once assertions on
/// the migration path.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigFs {
    files: HashMap<String, Vec<u8>>,
    mount_failure: Option<String>,
    write_count: usize,
}

impl MemoryConfigFs {
    /// Creates an empty, mountable filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, builder style.
    #[must_use]
    pub fn with_file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_string(), data.into());
        self
    }

    /// Makes every subsequent mount fail with `reason`.
    pub fn fail_mounts(&mut self, reason: &str) {
        self.mount_failure = Some(reason.to_string());
    }

    /// Returns a file's contents, if present.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Returns how many writes have been performed.
    #[must_use]
    pub const fn write_count(&self) -> usize {
        self.write_count
    }
}

impl ConfigFs for MemoryConfigFs {
    fn mount(&mut self) -> ConfigResult<()> {
        self.mount_failure
            .as_ref()
            .map_or(Ok(()), |reason| Err(ConfigError::Mount(reason.clone())))
    }

    fn read(&mut self, path: &str) -> ConfigResult<Option<Vec<u8>>> {
        Ok(self.files.get(path).cloned())
    }

    fn write_atomic(&mut self, path: &str, data: &[u8]) -> ConfigResult<()> {
        self.files.insert(path.to_string(), data.to_vec());
        self.write_count += 1;
        Ok(())
    }
}

// =============================================================================
// DirConfigFs
// =============================================================================

/// Host directory implementation of [`ConfigFs`].
///
/// Document paths keep the appliance convention of a leading slash
/// (`"/config.json"`); the leading slash is stripped and the remainder
/// resolved inside the root directory, creating intermediate
/// directories on write.
///
/// Writes follow the write-to-temp-then-rename pattern: the data goes to
/// a temporary file in the same directory, is synced, and is renamed
/// over the target, so a crash leaves either the old or the new
/// document.
#[derive(Debug, Clone)]
pub struct DirConfigFs {
    root: PathBuf,
}

impl DirConfigFs {
    /// Creates a filesystem rooted at `root`.
    ///
    /// The directory is created on the first mount, not here.
    #[must_use]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    /// Temporary file used during an atomic write. Only the final path
    /// component is dotted, so the temp file sits next to the target and
    /// the rename stays on one filesystem.
    fn temp_path(target: &Path) -> PathBuf {
        let name = target.file_name().map_or_else(
            || String::from(".tmp"),
            |name| format!(".{}.tmp", name.to_string_lossy()),
        );
        target.with_file_name(name)
    }

    #[cfg(unix)]
    fn sync_dir(dir: &Path) -> ConfigResult<()> {
        // Make the rename itself durable.
        File::open(dir)
            .and_then(|handle| handle.sync_all())
            .map_err(|e| ConfigError::io(format!("syncing directory '{}'", dir.display()), e))
    }

    #[cfg(not(unix))]
    fn sync_dir(_dir: &Path) -> ConfigResult<()> {
        Ok(())
    }
}

impl ConfigFs for DirConfigFs {
    fn mount(&mut self) -> ConfigResult<()> {
        fs::create_dir_all(&self.root)
            .map_err(|e| ConfigError::Mount(format!("cannot create '{}': {e}", self.root.display())))
    }

    fn read(&mut self, path: &str) -> ConfigResult<Option<Vec<u8>>> {
        let full = self.resolve(path);
        match fs::read(&full) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::io(
                format!("reading '{}'", full.display()),
                e,
            )),
        }
    }

    fn write_atomic(&mut self, path: &str, data: &[u8]) -> ConfigResult<()> {
        let full = self.resolve(path);
        let temp = Self::temp_path(&full);
        let dir = full.parent().unwrap_or(&self.root);

        fs::create_dir_all(dir)
            .map_err(|e| ConfigError::io(format!("creating '{}'", dir.display()), e))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp)
            .map_err(|e| ConfigError::io(format!("creating '{}'", temp.display()), e))?;
        file.write_all(data)
            .map_err(|e| ConfigError::io(format!("writing '{}'", temp.display()), e))?;
        file.sync_all()
            .map_err(|e| ConfigError::io(format!("syncing '{}'", temp.display()), e))?;
        drop(file);

        fs::rename(&temp, &full).map_err(|e| {
            let _ = fs::remove_file(&temp);
            ConfigError::io(
                format!("renaming '{}' to '{}'", temp.display(), full.display()),
                e,
            )
        })?;

        Self::sync_dir(dir)
    }
}

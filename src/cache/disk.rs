//! Disk Store Module
//!
//! Owns the cache file lifecycle: the base directory, per-entry directories,
//! partial files being written, finalizing them into place, and removing
//! files for purged entries.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs as async_fs;
use tokio::fs::File as AsyncFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::cache::{DiskEntry, PurgeReason, Purged};
use crate::error::{CacheError, Result};

/// Directory below the base directory holding files still being written.
/// Hosts starting with `.` never map to a key, so it cannot collide.
pub const PARTIAL_DIR: &str = ".partial";

// == Disk Store ==
#[derive(Debug)]
pub struct DiskStore {
    base_dir: PathBuf,
    next_partial: AtomicU64,
}

impl DiskStore {
    // == Constructors ==
    /// Creates a fresh, uniquely named base directory inside `parent`.
    ///
    /// The directory outlives the store; removing it is up to the operator.
    pub fn create_temp(parent: &Path, prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(parent)
            .map_err(|source| CacheError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        Self::open(dir.keep())
    }

    /// Uses `base_dir` as the cache root, creating it if needed.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        let partial_dir = base_dir.join(PARTIAL_DIR);

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(&partial_dir)
            .map_err(|source| CacheError::CreateDir {
                path: partial_dir,
                source,
            })?;

        Ok(Self {
            base_dir,
            next_partial: AtomicU64::new(0),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn next_partial(&self) -> (u64, PathBuf) {
        let id = self.next_partial.fetch_add(1, Ordering::Relaxed);
        (id, self.base_dir.join(PARTIAL_DIR).join(format!("{:016x}", id)))
    }

    // == Open For Write ==
    /// Prepares a cache file that will end up at `target`.
    ///
    /// Creates the parent directories of `target` and an exclusive,
    /// owner-only partial file. Nothing appears at `target` until
    /// [`DiskStore::finalize`] succeeds.
    pub async fn open_for_write(&self, target: &Path) -> Result<CacheFile> {
        if let Some(parent) = target.parent() {
            create_private_dir(parent)
                .await
                .map_err(|source| CacheError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let (id, partial) = self.next_partial();
        let mut options = async_fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            options.mode(0o600);
        }
        let file = options
            .open(&partial)
            .await
            .map_err(|source| CacheError::Open {
                path: target.to_path_buf(),
                source,
            })?;

        debug!(path = %target.display(), "opened cache file");
        Ok(CacheFile {
            file,
            id,
            partial,
            target: target.to_path_buf(),
            written: 0,
            poisoned: false,
        })
    }

    // == Finalize ==
    /// Closes a cache file and moves it into place.
    ///
    /// On any failure the partial file is removed and no entry is produced.
    pub async fn finalize(&self, file: CacheFile) -> Result<DiskEntry> {
        let CacheFile {
            file,
            id,
            partial,
            target,
            poisoned,
            ..
        } = file;

        if poisoned {
            drop(file);
            self.discard(&partial).await;
            return Err(CacheError::Abandoned(target));
        }

        let size_bytes = match close(file).await {
            Ok(size) => size,
            Err(source) => {
                self.discard(&partial).await;
                return Err(CacheError::Finalize {
                    path: target,
                    source,
                });
            }
        };

        if let Err(source) = async_fs::rename(&partial, &target).await {
            self.discard(&partial).await;
            return Err(CacheError::Finalize {
                path: target,
                source,
            });
        }

        Ok(DiskEntry::new(target, size_bytes).with_generation(id))
    }

    // == Purge ==
    /// Deals with the file behind an entry that left the index.
    ///
    /// A replaced entry shares its path with the entry that replaced it, so
    /// its file is kept. Removal failures are logged and otherwise ignored.
    pub async fn purge(&self, purged: &Purged) {
        let path = purged.entry.path();
        match purged.reason {
            PurgeReason::Replaced => {
                debug!(path = %path.display(), "cache entry replaced in place");
            }
            PurgeReason::Evicted => match async_fs::remove_file(path).await {
                Ok(()) => debug!(
                    path = %path.display(),
                    size = purged.entry.size_bytes,
                    "evicted cache entry"
                ),
                Err(err) => warn!("Failed to remove {} from cache: {}", path.display(), err),
            },
        }
    }

    /// Drops a cache file that never received a body.
    pub async fn abandon(&self, file: CacheFile) {
        debug!(path = %file.target().display(), "abandoning unused cache file");
        let CacheFile { file, partial, .. } = file;
        drop(file);
        self.discard(&partial).await;
    }

    /// Best-effort removal of a file that will never be indexed.
    pub async fn discard(&self, path: &Path) {
        if let Err(err) = async_fs::remove_file(path).await {
            warn!("Failed to discard cache file {}: {}", path.display(), err);
        }
    }
}

async fn create_private_dir(path: &Path) -> io::Result<()> {
    let mut builder = async_fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        builder.mode(0o700);
    }
    builder.create(path).await
}

async fn close(mut file: AsyncFile) -> io::Result<u64> {
    file.flush().await?;
    let size = file.metadata().await?.len();
    Ok(size)
}

// == Cache File ==
/// A cache file being written. Obtained from [`DiskStore::open_for_write`]
/// and handed back to [`DiskStore::finalize`].
///
/// A failed write poisons the file: later writes are skipped and finalize
/// throws it away.
#[derive(Debug)]
pub struct CacheFile {
    file: AsyncFile,
    id: u64,
    partial: PathBuf,
    target: PathBuf,
    written: u64,
    poisoned: bool,
}

impl CacheFile {
    pub async fn write(&mut self, chunk: &[u8]) {
        if self.poisoned {
            return;
        }
        if let Err(source) = self.file.write_all(chunk).await {
            let err = CacheError::Write {
                path: self.target.clone(),
                source,
            };
            warn!("{}", err);
            self.poisoned = true;
            return;
        }
        self.written += chunk.len() as u64;
    }

    /// Marks the file as unusable; finalize will discard it.
    pub fn poison(&mut self) {
        self.poisoned = true;
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Final location of the file.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

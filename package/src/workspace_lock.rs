//! An advisory, process-exclusive lock over a workspace, so two `dlang`
//! invocations against the same workspace never race on the cache or the
//! lock file.

use std::fs::File;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;

use crate::error::Error;

const LOCK_DIR: &str = ".dlang";
const LOCK_FILE: &str = ".lock";

/// A held advisory lock; releases automatically when dropped.
pub struct WorkspaceLock {
    _file: File,
    path: PathBuf,
}

impl WorkspaceLock {
    /// Acquire the lock for the workspace rooted at `workspace_dir`,
    /// failing immediately (rather than blocking) if another process holds
    /// it.
    pub fn acquire(workspace_dir: impl AsRef<Path>) -> Result<Self, Error> {
        let dir = workspace_dir.as_ref().join(LOCK_DIR);
        std::fs::create_dir_all(&dir).map_err(|source| Error::CacheIoError {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(LOCK_FILE);
        let file = File::create(&path).map_err(|source| Error::CacheIoError {
            path: path.clone(),
            source,
        })?;
        match file.try_lock_exclusive() {
            Ok(true) => Ok(WorkspaceLock { _file: file, path }),
            Ok(false) => Err(Error::WorkspaceLockHeld { path }),
            Err(source) => Err(Error::CacheIoError { path, source }),
        }
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self._file);
    }
}

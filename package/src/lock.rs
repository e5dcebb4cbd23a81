//! The workspace lock file (`model.lock`): a flat, resolved snapshot of
//! every dependency actually installed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const LOCK_FILE_NAME: &str = "model.lock";
const SCHEMA_VERSION: &str = "1";

/// One resolved, pinned dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedDependency {
    pub source: String,
    pub reference: String,
    #[serde(rename = "refType")]
    pub ref_type: String,
    /// The tarball URL that was actually fetched.
    pub resolved: String,
    pub commit: String,
    pub integrity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockRaw {
    version: String,
    #[serde(default)]
    dependencies: BTreeMap<String, LockedDependency>,
}

/// An in-memory, normalized representation of `model.lock`.
#[derive(Debug, Clone)]
pub struct LockFile {
    pub path: PathBuf,
    pub dependencies: BTreeMap<String, LockedDependency>,
}

impl LockFile {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        LockFile {
            path: path.into(),
            dependencies: BTreeMap::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let text = std::fs::read_to_string(&path).map_err(|e| Error::LockInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Self::parse(&text, path)
    }

    pub fn load_or_empty(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::empty(path.to_path_buf()))
        }
    }

    fn parse(text: &str, path: PathBuf) -> Result<Self, Error> {
        let raw: LockRaw = serde_json::from_str(text).map_err(|e| Error::LockInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if raw.version != SCHEMA_VERSION {
            return Err(Error::LockInvalid {
                path,
                reason: format!(
                    "unsupported lock schema version '{}' (expected '{SCHEMA_VERSION}')",
                    raw.version
                ),
            });
        }
        Ok(LockFile {
            path,
            dependencies: raw.dependencies,
        })
    }

    /// Serialize to the canonical on-disk form: pretty JSON, `\n` newlines,
    /// dependencies in `BTreeMap` (lexicographic) order so diffs stay
    /// minimal across runs that change nothing (invariant 4).
    pub fn to_json_string(&self) -> Result<String, Error> {
        let raw = LockRaw {
            version: SCHEMA_VERSION.to_owned(),
            dependencies: self.dependencies.clone(),
        };
        let mut text = serde_json::to_string_pretty(&raw).map_err(|e| Error::LockInvalid {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        text.push('\n');
        Ok(text)
    }

    pub fn save(&self) -> Result<(), Error> {
        let text = self.to_json_string()?;
        crate::cache::atomic_write(&self.path, text.as_bytes()).map_err(|source| {
            Error::CacheIoError {
                path: self.path.clone(),
                source,
            }
        })
    }
}

//! The error taxonomy for the workspace dependency manager.
//!
//! Every fallible operation in this crate returns [`Error`]. Variants carry
//! enough context (package name, URL, path) to render a useful message
//! without the caller having to reach back into the operation that produced
//! them.

use std::path::PathBuf;

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no workspace manifest found (looked for model.yaml from {} upward)", start.display())]
    ManifestNotFound { start: PathBuf },

    #[error("invalid manifest at {}: {reason}", path.display())]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("invalid lock file at {}: {reason}", path.display())]
    LockInvalid { path: PathBuf, reason: String },

    #[error("invalid package specifier '{spec}': {reason}")]
    SpecInvalid { spec: String, reason: String },

    #[error("network error while fetching {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("rate limited by host while fetching {url}{}", retry_after.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited { url: String, retry_after: Option<u64> },

    #[error("authentication failed for {host}")]
    AuthError { host: String },

    #[error("package '{owner}/{repo}' not found at ref '{reference}'")]
    NotFound {
        owner: String,
        repo: String,
        reference: String,
    },

    #[error(
        "integrity mismatch for {owner}/{repo}: expected {expected}, got {actual}"
    )]
    IntegrityMismatch {
        owner: String,
        repo: String,
        expected: String,
        actual: String,
    },

    #[error("cache I/O error at {}: {source}", path.display())]
    CacheIoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("another dlang operation is already running in this workspace (lock held at {})", path.display())]
    WorkspaceLockHeld { path: PathBuf },

    #[error("package '{name}' already exists. Use 'dlang update' to change version.")]
    AlreadyExists { name: String },

    #[error("package '{name}' is not a dependency of this workspace")]
    NotADependency { name: String },

    #[error("manifest at {} has drifted from the lock file (--frozen-lock): {reason}", path.display())]
    FrozenLockViolation { path: PathBuf, reason: String },

    #[error("one or more packages failed to install")]
    InstallFailed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The process exit code this error should map to (see §6 of the spec).
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ManifestNotFound { .. } => 2,
            Error::NetworkError { .. } | Error::RateLimited { .. } | Error::AuthError { .. } => 10,
            _ => 1,
        }
    }
}

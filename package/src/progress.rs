//! Progress reporting bus.
//!
//! The installer emits [`ProgressEvent`]s as it works; any number of
//! subscribers can drain them from an [`tokio::sync::mpsc`] channel. This
//! module knows nothing about how events are rendered — that's the CLI's
//! job (a progress bar, `--json` lines, or nothing at all).

use crate::spec::Name;

/// One step of work: installing/resolving a single dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A package's resolve/fetch has started.
    Started { name: Name },
    /// A ref was resolved to a commit.
    Resolved { name: Name, commit: String },
    /// Bytes have been downloaded for a package (cumulative within the
    /// fetch of this one package).
    Downloading { name: Name, bytes: u64, total: Option<u64> },
    /// A package was served entirely from cache; no network activity.
    CacheHit { name: Name },
    /// A package finished installing successfully.
    Finished { name: Name },
    /// A package failed to install.
    Failed { name: Name, message: String },
    /// The whole operation has completed.
    Done,
}

pub type ProgressSender = tokio::sync::mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>;

/// Create a connected sender/receiver pair for one installer run.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// A sender that silently drops every event, for callers that don't care
/// about progress (library use, tests). Every `send` on it fails, which
/// every caller in this crate already treats as a no-op.
pub fn sink() -> ProgressSender {
    let (tx, _rx) = channel();
    tx
}

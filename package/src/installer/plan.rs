//! Classification of each manifest dependency into an install action.

use std::collections::BTreeSet;

use crate::error::Error;
use crate::lock::{LockFile, LockedDependency};
use crate::manifest::ManifestFile;
use crate::spec::Name;

/// What needs to happen for a single manifest dependency during `install`.
#[derive(Debug, Clone)]
pub enum Action {
    /// The lock already has an up-to-date entry; only ensure it's present
    /// in the cache (re-fetching by commit if it was evicted).
    Reuse {
        alias: String,
        name: Name,
        locked: LockedDependency,
    },
    /// The manifest's ref differs from (or is absent from) the lock;
    /// resolve it fresh.
    Resolve {
        alias: String,
        name: Name,
        reference: String,
        entry: Option<String>,
    },
}

impl Action {
    pub fn alias(&self) -> &str {
        match self {
            Action::Reuse { alias, .. } => alias,
            Action::Resolve { alias, .. } => alias,
        }
    }
}

/// Build the list of actions for `install`, and the set of lock aliases
/// that are no longer in the manifest and should be dropped.
///
/// When `frozen` is set, any dependency that would require resolving
/// (rather than reusing the lock verbatim) is an error instead: the lock
/// must already match the manifest exactly (invariant: `--frozen-lock`
/// never touches the network or the lock file).
pub fn build_plan(
    manifest: &ManifestFile,
    lock: &LockFile,
    frozen: bool,
) -> Result<(Vec<Action>, BTreeSet<String>), Error> {
    let mut actions = Vec::new();

    for (alias, dep) in &manifest.dependencies {
        let name = dep.resolved_name(alias).map_err(|reason| Error::ManifestInvalid {
            path: manifest.path.clone(),
            reason,
        })?;
        match lock.dependencies.get(alias) {
            Some(locked) if locked.source == name.to_string() && locked.reference == dep.reference => {
                actions.push(Action::Reuse {
                    alias: alias.clone(),
                    name,
                    locked: locked.clone(),
                });
            }
            _ if frozen => {
                return Err(Error::FrozenLockViolation {
                    path: lock.path.clone(),
                    reason: format!("'{alias}' in model.yaml does not match model.lock"),
                });
            }
            _ => {
                actions.push(Action::Resolve {
                    alias: alias.clone(),
                    name,
                    reference: dep.reference.clone(),
                    entry: dep.entry.clone(),
                });
            }
        }
    }

    let stale: BTreeSet<String> = lock
        .dependencies
        .keys()
        .filter(|alias| !manifest.dependencies.contains_key(*alias))
        .cloned()
        .collect();

    if frozen && !stale.is_empty() {
        return Err(Error::FrozenLockViolation {
            path: lock.path.clone(),
            reason: format!(
                "model.lock has entries not in model.yaml: {}",
                stale.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
        });
    }

    Ok((actions, stale))
}

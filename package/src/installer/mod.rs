//! The installer: turns a manifest + lock into an up-to-date `.dlang/packages`
//! cache and a refreshed lock file.

pub mod plan;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::cache::PackageCache;
use crate::error::Error;
use crate::host::{GitHostClient, HostClient};
use crate::lock::{LockFile, LockedDependency};
use crate::manifest::ManifestFile;
use crate::progress::{ProgressEvent, ProgressSender};
use crate::semver_cmp::{self, Bump};
use crate::spec::{classify_ref, Name, RefKind, Specifier};
use crate::workspace_lock::WorkspaceLock;
use plan::Action;

const CACHE_DIR: &str = ".dlang/packages";

/// Options controlling a single `install` run.
#[derive(Clone, Debug)]
pub struct InstallOptions {
    /// Never touch the network or the lock file; fail if the manifest has
    /// drifted from what's locked.
    pub frozen_lock: bool,
    /// Maximum number of dependencies resolved/fetched concurrently.
    pub concurrency: usize,
}

impl Default for InstallOptions {
    fn default() -> Self {
        InstallOptions {
            frozen_lock: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_mul(2)
        .min(8)
        .max(1)
}

/// One dependency's outdated-ness, as reported by `outdated`/`upgrade`.
#[derive(Debug, Clone)]
pub struct OutdatedReport {
    pub alias: String,
    pub name: Name,
    pub current: String,
    pub latest: String,
    pub bump: Bump,
}

/// A single workspace: its manifest, lock, and package cache.
pub struct Workspace {
    pub manifest: ManifestFile,
    pub lock: LockFile,
    cache: Arc<PackageCache>,
    host: Arc<dyn HostClient>,
}

impl Workspace {
    /// Discover and open the workspace containing `start`.
    pub fn open(start: impl AsRef<Path>) -> Result<Self, Error> {
        let manifest = ManifestFile::discover(start)?;
        let lock_path = manifest.dir().join(crate::lock::LOCK_FILE_NAME);
        let lock = LockFile::load_or_empty(&lock_path)?;
        let cache = Arc::new(PackageCache::new(manifest.dir().join(CACHE_DIR)));
        Ok(Workspace {
            manifest,
            lock,
            cache,
            host: Arc::new(GitHostClient::new()),
        })
    }

    /// Override the host client (tests supply a fake).
    pub fn with_host(mut self, host: Arc<dyn HostClient>) -> Self {
        self.host = host;
        self
    }

    /// The directory this workspace lives in.
    pub fn root(&self) -> &Path {
        self.manifest.dir()
    }

    /// Hold the advisory workspace lock for the duration of a mutating
    /// operation.
    fn guard(&self) -> Result<WorkspaceLock, Error> {
        WorkspaceLock::acquire(self.root())
    }

    /// Resolve and fetch every dependency named by the manifest, reusing
    /// whatever the lock already pins when it still matches.
    pub async fn install(
        &mut self,
        opts: &InstallOptions,
        progress: ProgressSender,
    ) -> Result<(), Error> {
        let _guard = self.guard()?;
        let (actions, stale) = plan::build_plan(&self.manifest, &self.lock, opts.frozen_lock)?;
        for alias in &stale {
            self.lock.dependencies.remove(alias);
        }

        let resolved = run_actions(&self.host, &self.cache, actions, opts.concurrency, &progress).await?;
        for (alias, locked) in resolved {
            self.lock.dependencies.insert(alias, locked);
        }
        if !opts.frozen_lock {
            self.lock.save()?;
        }
        let _ = progress.send(ProgressEvent::Done);
        Ok(())
    }

    /// Add a new dependency to the manifest and install it.
    pub async fn add(
        &mut self,
        specifier: &Specifier,
        opts: &InstallOptions,
        progress: ProgressSender,
    ) -> Result<(), Error> {
        let alias = specifier.name.to_string();
        if self.manifest.dependencies.contains_key(&alias) {
            return Err(Error::AlreadyExists { name: alias });
        }
        self.manifest.dependencies.insert(
            alias.clone(),
            crate::manifest::DependencyEntry {
                source: None,
                reference: specifier.reference.clone(),
                entry: None,
            },
        );

        match self.install(opts, progress).await {
            Ok(()) => {
                self.manifest.save()?;
                Ok(())
            }
            Err(e) => {
                self.manifest.dependencies.remove(&alias);
                Err(e)
            }
        }
    }

    /// Remove a dependency from the manifest and the lock, and evict its
    /// cached package. Accepts an optional `@ref` suffix on `alias` (as
    /// printed by `list`/`outdated`), which is stripped before lookup.
    pub async fn remove(&mut self, alias: &str) -> Result<(), Error> {
        let _guard = self.guard()?;
        let alias = alias.split('@').next().unwrap_or(alias);
        if self.manifest.dependencies.remove(alias).is_none() {
            return Err(Error::NotADependency {
                name: alias.to_owned(),
            });
        }
        if let Some(locked) = self.lock.dependencies.remove(alias) {
            if let Ok(name) = Name::parse(&locked.source) {
                self.cache.remove_package(&name.owner, &name.repo).await?;
            }
        }
        self.manifest.save()?;
        self.lock.save()?;
        Ok(())
    }

    /// Re-resolve branch-pinned dependencies to their current HEAD commit.
    /// Tag- and commit-pinned dependencies are untouched (use `upgrade` to
    /// move a tag forward).
    pub async fn update(
        &mut self,
        alias: Option<&str>,
        progress: ProgressSender,
    ) -> Result<(), Error> {
        let _guard = self.guard()?;
        let mut targets = Vec::new();
        for (a, dep) in &self.manifest.dependencies {
            if alias.is_some_and(|only| only != a.as_str()) {
                continue;
            }
            if classify_ref(&dep.reference) != RefKind::Branch {
                continue;
            }
            let name = dep.resolved_name(a).map_err(|reason| Error::ManifestInvalid {
                path: self.manifest.path.clone(),
                reason,
            })?;
            targets.push((a.clone(), name, dep.reference.clone()));
        }

        let actions = targets
            .into_iter()
            .map(|(alias, name, reference)| Action::Resolve {
                alias,
                name,
                reference,
                entry: None,
            })
            .collect();

        let resolved = run_actions(&self.host, &self.cache, actions, default_concurrency(), &progress).await?;
        for (alias, locked) in resolved {
            self.lock.dependencies.insert(alias, locked);
        }
        self.lock.save()?;
        let _ = progress.send(ProgressEvent::Done);
        Ok(())
    }

    /// Report, for every tag-pinned dependency, whether a newer tag exists.
    pub async fn outdated(&self) -> Result<Vec<OutdatedReport>, Error> {
        let mut reports = Vec::new();
        for (alias, dep) in &self.manifest.dependencies {
            if classify_ref(&dep.reference) != RefKind::Tag {
                continue;
            }
            let name = dep.resolved_name(alias).map_err(|reason| Error::ManifestInvalid {
                path: self.manifest.path.clone(),
                reason,
            })?;
            let tags = self.host.list_tags(&name).await?;
            let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();
            let Some(latest) = semver_cmp::find_latest(tag_refs) else {
                continue;
            };
            let bump = semver_cmp::classify_bump(&dep.reference, latest);
            reports.push(OutdatedReport {
                alias: alias.clone(),
                name,
                current: dep.reference.clone(),
                latest: latest.to_owned(),
                bump,
            });
        }
        Ok(reports)
    }

    /// Bump tag-pinned dependencies to the latest available tag, re-fetch
    /// them, and update the manifest and lock.
    pub async fn upgrade(
        &mut self,
        alias: Option<&str>,
        progress: ProgressSender,
    ) -> Result<Vec<OutdatedReport>, Error> {
        let _guard = self.guard()?;
        let candidates = self.outdated().await?;
        let to_upgrade: Vec<OutdatedReport> = candidates
            .into_iter()
            .filter(|r| alias.map_or(true, |only| only == r.alias))
            .filter(|r| r.bump != Bump::UpToDate)
            .collect();

        let actions = to_upgrade
            .iter()
            .map(|r| Action::Resolve {
                alias: r.alias.clone(),
                name: r.name.clone(),
                reference: r.latest.clone(),
                entry: self
                    .manifest
                    .dependencies
                    .get(&r.alias)
                    .and_then(|d| d.entry.clone()),
            })
            .collect();

        let resolved = run_actions(&self.host, &self.cache, actions, default_concurrency(), &progress).await?;
        for (alias, locked) in &resolved {
            if let Some(dep) = self.manifest.dependencies.get_mut(alias) {
                dep.reference = locked.reference.clone();
            }
            self.lock.dependencies.insert(alias.clone(), locked.clone());
        }
        if !resolved.is_empty() {
            self.manifest.save()?;
            self.lock.save()?;
        }
        let _ = progress.send(ProgressEvent::Done);
        Ok(to_upgrade)
    }

    /// Remove every entry from the package cache.
    pub async fn cache_clear(&self) -> Result<(), Error> {
        self.cache.clear().await
    }
}

/// Run every action with bounded concurrency, turning each into a resolved
/// lock entry. Fails fast with [`Error::InstallFailed`] once any action
/// fails, after letting in-flight work settle.
async fn run_actions(
    host: &Arc<dyn HostClient>,
    cache: &Arc<PackageCache>,
    actions: Vec<Action>,
    concurrency: usize,
    progress: &ProgressSender,
) -> Result<Vec<(String, LockedDependency)>, Error> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(actions.len());

    for action in actions {
        let semaphore = Arc::clone(&semaphore);
        let host = Arc::clone(host);
        let cache = Arc::clone(cache);
        let progress = progress.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            resolve_one(&host, &cache, action, &progress).await
        }));
    }

    let mut resolved = Vec::with_capacity(handles.len());
    let mut first_error = None;
    for handle in handles {
        match handle.await.expect("install task panicked") {
            Ok(pair) => resolved.push(pair),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(_) => Err(Error::InstallFailed),
        None => Ok(resolved),
    }
}

async fn resolve_one(
    host: &Arc<dyn HostClient>,
    cache: &Arc<PackageCache>,
    action: Action,
    progress: &ProgressSender,
) -> Result<(String, LockedDependency), Error> {
    let error_name = match &action {
        Action::Reuse { name, .. } => Some(name.clone()),
        Action::Resolve { name, .. } => Some(name.clone()),
    };

    let result = match action {
        Action::Reuse { alias, name, locked } => reuse(host, cache, alias, name, locked, progress).await,
        Action::Resolve {
            alias,
            name,
            reference,
            entry,
        } => resolve_fresh(host, cache, alias, name, reference, entry, progress).await,
    };

    if let Err(e) = &result {
        if let Some(name) = error_name {
            let _ = progress.send(ProgressEvent::Failed {
                name,
                message: e.to_string(),
            });
        }
    }
    result
}

async fn reuse(
    host: &Arc<dyn HostClient>,
    cache: &Arc<PackageCache>,
    alias: String,
    name: Name,
    locked: LockedDependency,
    progress: &ProgressSender,
) -> Result<(String, LockedDependency), Error> {
    let _ = progress.send(ProgressEvent::Started { name: name.clone() });

    if cache.has(&name.owner, &name.repo, &locked.commit) {
        let _ = progress.send(ProgressEvent::CacheHit { name: name.clone() });
    } else {
        let tarball = host.fetch_tarball(&name, &locked.commit).await?;
        cache
            .put(
                &name.owner,
                &name.repo,
                &locked.commit,
                &locked.integrity,
                &locked.resolved,
                &tarball.bytes,
            )
            .await?;
    }
    let _ = progress.send(ProgressEvent::Finished { name });
    Ok((alias, locked))
}

async fn resolve_fresh(
    host: &Arc<dyn HostClient>,
    cache: &Arc<PackageCache>,
    alias: String,
    name: Name,
    reference: String,
    entry: Option<String>,
    progress: &ProgressSender,
) -> Result<(String, LockedDependency), Error> {
    let _ = progress.send(ProgressEvent::Started { name: name.clone() });

    let commit = host.resolve_ref_to_commit(&name, &reference).await?;
    let _ = progress.send(ProgressEvent::Resolved {
        name: name.clone(),
        commit: commit.clone(),
    });

    let tarball = host.fetch_tarball(&name, &commit).await?;
    let digest = crate::integrity::compute(&tarball.bytes);
    cache
        .put(
            &name.owner,
            &name.repo,
            &commit,
            &digest,
            &tarball.resolved_url,
            &tarball.bytes,
        )
        .await?;

    let _ = progress.send(ProgressEvent::Finished { name: name.clone() });
    Ok((
        alias,
        LockedDependency {
            source: name.to_string(),
            reference: reference.clone(),
            ref_type: classify_ref(&reference).to_string(),
            resolved: tarball.resolved_url,
            commit,
            integrity: digest,
            entry,
        },
    ))
}

/// A flat dependency map keyed by alias, handy for rendering `outdated`
/// and `install --json` output in the CLI.
pub fn flatten_dependencies(manifest: &ManifestFile) -> BTreeMap<String, String> {
    manifest
        .dependencies
        .iter()
        .map(|(alias, dep)| (alias.clone(), dep.reference.clone()))
        .collect()
}

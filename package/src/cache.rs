//! The content-addressed package cache.
//!
//! Packages live on disk under `<workspace>/.dlang/packages/<owner>/<repo>/
//! <commit>/`, keyed by `(owner, repo, commit)`. Writes go to a sibling temp
//! directory and are promoted with a single `rename`, so a reader never
//! observes a partially-extracted package and two concurrent installers
//! racing to populate the same entry both succeed: the loser's temp
//! directory is simply discarded (property 6 of the spec).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::Error;

const METADATA_FILE_NAME: &str = ".dlang-metadata.json";

pub struct PackageCache {
    /// The `packages` directory itself: `<workspace>/.dlang/packages`.
    root: PathBuf,
}

/// The sidecar written alongside every extracted package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub integrity: String,
    pub resolved: String,
    #[serde(rename = "commitSha")]
    pub commit_sha: String,
}

impl PackageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PackageCache { root: root.into() }
    }

    fn entry_dir(&self, owner: &str, repo: &str, commit: &str) -> PathBuf {
        self.root.join(owner).join(repo).join(commit)
    }

    fn metadata_path(&self, owner: &str, repo: &str, commit: &str) -> PathBuf {
        self.entry_dir(owner, repo, commit).join(METADATA_FILE_NAME)
    }

    /// Whether a fully-extracted entry already exists for `(owner, repo, commit)`.
    pub fn has(&self, owner: &str, repo: &str, commit: &str) -> bool {
        self.entry_dir(owner, repo, commit).join(".complete").is_file()
    }

    /// The extracted package directory for `(owner, repo, commit)`, if present.
    pub fn get(&self, owner: &str, repo: &str, commit: &str) -> Option<PathBuf> {
        self.has(owner, repo, commit).then(|| self.entry_dir(owner, repo, commit))
    }

    /// Extract `tarball` (gzip-compressed tar bytes) into the cache under
    /// `(owner, repo, commit)`, verifying integrity first and stripping the
    /// archive's leading directory. Writes the `.dlang-metadata.json`
    /// sidecar before promotion. Returns the extracted directory.
    ///
    /// Concurrency-safe: extraction happens in a private temp directory,
    /// promoted into place with `rename`. If another task wins the race,
    /// this task's temp directory is removed and the winner's result is
    /// returned.
    pub async fn put(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
        integrity: &str,
        resolved: &str,
        tarball: &[u8],
    ) -> Result<PathBuf, Error> {
        crate::integrity::verify(integrity, tarball).map_err(|e| e.into_error(owner, repo))?;

        if let Some(existing) = self.get(owner, repo, commit) {
            return Ok(existing);
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| Error::CacheIoError {
                path: self.root.clone(),
                source,
            })?;

        let tmp_dir = self.root.join(format!(".tmp-{owner}-{repo}-{commit}"));
        if tmp_dir.exists() {
            let _ = tokio::fs::remove_dir_all(&tmp_dir).await;
        }
        tokio::fs::create_dir_all(&tmp_dir)
            .await
            .map_err(|source| Error::CacheIoError {
                path: tmp_dir.clone(),
                source,
            })?;

        extract_tar_gz(tarball, &tmp_dir).map_err(|source| Error::CacheIoError {
            path: tmp_dir.clone(),
            source,
        })?;

        let metadata = PackageMetadata {
            integrity: integrity.to_owned(),
            resolved: resolved.to_owned(),
            commit_sha: commit.to_owned(),
        };
        let metadata_bytes = serde_json::to_vec_pretty(&metadata).map_err(|source| Error::CacheIoError {
            path: tmp_dir.join(METADATA_FILE_NAME),
            source: std::io::Error::new(std::io::ErrorKind::Other, source),
        })?;
        atomic_write(&tmp_dir.join(METADATA_FILE_NAME), &metadata_bytes).map_err(|source| {
            Error::CacheIoError {
                path: tmp_dir.join(METADATA_FILE_NAME),
                source,
            }
        })?;

        tokio::fs::File::create(tmp_dir.join(".complete"))
            .await
            .map_err(|source| Error::CacheIoError {
                path: tmp_dir.clone(),
                source,
            })?;

        let dest = self.entry_dir(owner, repo, commit);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::CacheIoError {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        match tokio::fs::rename(&tmp_dir, &dest).await {
            Ok(()) => Ok(dest),
            Err(_) if self.has(owner, repo, commit) => {
                // Lost the race: another task already promoted its copy.
                let _ = tokio::fs::remove_dir_all(&tmp_dir).await;
                Ok(dest)
            }
            Err(source) => Err(Error::CacheIoError {
                path: tmp_dir,
                source,
            }),
        }
    }

    /// Read back the sidecar metadata for a cached entry, if present.
    pub fn get_metadata(&self, owner: &str, repo: &str, commit: &str) -> Option<PackageMetadata> {
        let bytes = std::fs::read(self.metadata_path(owner, repo, commit)).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Remove every cached directory for `owner/repo` (all commits), and
    /// prune now-empty parent directories up to but not including the
    /// packages root's parent (`.dlang`) (invariant 6).
    pub async fn remove_package(&self, owner: &str, repo: &str) -> Result<(), Error> {
        let repo_dir = self.root.join(owner).join(repo);
        if repo_dir.exists() {
            tokio::fs::remove_dir_all(&repo_dir)
                .await
                .map_err(|source| Error::CacheIoError {
                    path: repo_dir.clone(),
                    source,
                })?;
        }
        prune_if_empty(&self.root.join(owner)).await;
        prune_if_empty(&self.root).await;
        Ok(())
    }

    /// Remove every cached package.
    pub async fn clear(&self) -> Result<(), Error> {
        if self.root.exists() {
            tokio::fs::remove_dir_all(&self.root)
                .await
                .map_err(|source| Error::CacheIoError {
                    path: self.root.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// Remove `dir` if it exists and is empty. Best-effort: any error (missing,
/// non-empty, permission) is silently absorbed.
async fn prune_if_empty(dir: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    if matches!(entries.next_entry().await, Ok(None)) {
        let _ = tokio::fs::remove_dir(dir).await;
    }
}

/// Extract a gzip-compressed tar archive into `dest`, stripping the leading
/// path component of every entry (the `<repo>-<sha>/` directory GitHub's
/// codeload tarballs wrap everything in).
fn extract_tar_gz(bytes: &[u8], dest: &Path) -> std::io::Result<()> {
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let stripped: PathBuf = path.components().skip(1).collect();
        if stripped.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(&stripped);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&target)?;
    }
    Ok(())
}

/// Write `bytes` to `path` via a temp file in the same directory followed by
/// a rename, so a crash or a concurrent reader never observes a partially
/// written file.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(
        ".tmp-{}-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ));
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)
}

/// Async counterpart of [`atomic_write`], used on the install hot path.
pub async fn atomic_write_async(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_owned();
    tokio::fs::create_dir_all(&dir).await?;
    let tmp_path = dir.join(format!(
        ".tmp-{}-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ));
    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    drop(file);
    tokio::fs::rename(&tmp_path, path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a tarball shaped like a real codeload download: every entry
    /// nested under a single top-level `<repo>-<sha>/` directory, so the
    /// strip-depth-1 extraction has something to strip.
    fn make_tarball(files: &[(&str, &[u8])]) -> Vec<u8> {
        let buf = Vec::new();
        let encoder = flate2::write::GzEncoder::new(buf, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in files {
            let path = format!("core-deadbeef/{name}");
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *contents).unwrap();
        }
        let encoder = builder.into_inner().unwrap();
        encoder.finish().unwrap()
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path());
        let tarball = make_tarball(&[("README.md", b"hello")]);
        let digest = crate::integrity::compute(&tarball);
        let commit = "a".repeat(40);

        assert!(!cache.has("acme", "core", &commit));
        let extracted = cache
            .put("acme", "core", &commit, &digest, "https://example.test/tarball", &tarball)
            .await
            .unwrap();
        assert!(cache.has("acme", "core", &commit));
        assert!(extracted.join("README.md").is_file());
        assert_eq!(extracted, dir.path().join("acme").join("core").join(&commit));
    }

    #[tokio::test]
    async fn put_strips_leading_archive_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path());
        let tarball = make_tarball(&[("src/lib.dlang", b"model")]);
        let digest = crate::integrity::compute(&tarball);
        let commit = "b".repeat(40);

        let extracted = cache
            .put("acme", "core", &commit, &digest, "https://example.test/tarball", &tarball)
            .await
            .unwrap();
        assert!(extracted.join("src/lib.dlang").is_file());
        assert!(!extracted.join("core-deadbeef").exists());
    }

    #[tokio::test]
    async fn put_writes_metadata_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path());
        let tarball = make_tarball(&[("a.txt", b"a")]);
        let digest = crate::integrity::compute(&tarball);
        let commit = "c".repeat(40);

        cache
            .put("acme", "core", &commit, &digest, "https://example.test/tarball", &tarball)
            .await
            .unwrap();
        let metadata = cache.get_metadata("acme", "core", &commit).unwrap();
        assert_eq!(metadata.integrity, digest);
        assert_eq!(metadata.resolved, "https://example.test/tarball");
        assert_eq!(metadata.commit_sha, commit);
    }

    #[tokio::test]
    async fn put_rejects_tampered_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path());
        let tarball = make_tarball(&[("a.txt", b"a")]);
        let digest = crate::integrity::compute(&tarball);
        let mut tampered = tarball.clone();
        tampered.push(0);

        let err = cache
            .put("acme", "core", &"a".repeat(40), &digest, "https://example.test/tarball", &tampered)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IntegrityMismatch { .. }));
    }

    #[tokio::test]
    async fn concurrent_put_of_same_commit_both_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = std::sync::Arc::new(PackageCache::new(dir.path()));
        let tarball = make_tarball(&[("x.txt", b"x")]);
        let digest = crate::integrity::compute(&tarball);
        let commit = "d".repeat(40);

        let (a, b) = tokio::join!(
            cache.put("acme", "core", &commit, &digest, "https://example.test/tarball", &tarball),
            cache.put("acme", "core", &commit, &digest, "https://example.test/tarball", &tarball),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert!(cache.has("acme", "core", &commit));
    }

    #[tokio::test]
    async fn remove_package_deletes_entry_and_prunes_empty_parents() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path());
        let tarball = make_tarball(&[("a.txt", b"a")]);
        let digest = crate::integrity::compute(&tarball);
        let commit = "e".repeat(40);
        cache
            .put("acme", "core", &commit, &digest, "https://example.test/tarball", &tarball)
            .await
            .unwrap();

        cache.remove_package("acme", "core").await.unwrap();
        assert!(!dir.path().join("acme").join("core").exists());
        assert!(!dir.path().join("acme").exists());
    }

    #[tokio::test]
    async fn remove_package_keeps_sibling_repo_under_shared_owner() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path());
        let tarball = make_tarball(&[("a.txt", b"a")]);
        let digest = crate::integrity::compute(&tarball);
        cache
            .put("acme", "core", &"f".repeat(40), &digest, "https://example.test/tarball", &tarball)
            .await
            .unwrap();
        cache
            .put("acme", "utils", &"1".repeat(40), &digest, "https://example.test/tarball", &tarball)
            .await
            .unwrap();

        cache.remove_package("acme", "core").await.unwrap();
        assert!(!dir.path().join("acme").join("core").exists());
        assert!(dir.path().join("acme").join("utils").exists());
    }

    #[test]
    fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.txt");
        atomic_write(&path, b"hi").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "hi");
    }
}

//! End-to-end installer scenarios against a fake host, covering:
//! fresh install, lock reuse across a second install, `--frozen-lock`
//! drift detection, add/remove, and the upgrade/outdated flow.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use domainlang_package::error::Error;
use domainlang_package::host::{FetchedTarball, HostClient};
use domainlang_package::installer::InstallOptions;
use domainlang_package::progress;
use domainlang_package::spec::{Name, Specifier};
use domainlang_package::Workspace;

struct FakeHostClient {
    commits: HashMap<(String, String), String>,
    tarballs: HashMap<String, Vec<u8>>,
    tags: HashMap<String, Vec<String>>,
    fetch_count: Mutex<u32>,
}

impl FakeHostClient {
    fn new() -> Self {
        FakeHostClient {
            commits: HashMap::new(),
            tarballs: HashMap::new(),
            tags: HashMap::new(),
            fetch_count: Mutex::new(0),
        }
    }

    fn with_ref(mut self, name: &str, reference: &str, commit: &str, contents: &[(&str, &[u8])]) -> Self {
        self.commits
            .insert((name.to_owned(), reference.to_owned()), commit.to_owned());
        self.tarballs.insert(commit.to_owned(), make_tarball(contents));
        self
    }

    fn with_tags(mut self, name: &str, tags: &[&str]) -> Self {
        self.tags
            .insert(name.to_owned(), tags.iter().map(|t| t.to_string()).collect());
        self
    }
}

/// Shapes a tarball like a real codeload download: every entry nested under
/// a single top-level `<repo>-<sha>/` directory.
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
    builder.into_inner().unwrap().finish().unwrap()
}

#[async_trait]
impl HostClient for FakeHostClient {
    async fn resolve_ref_to_commit(&self, name: &Name, reference: &str) -> Result<String, Error> {
        self.commits
            .get(&(name.to_string(), reference.to_owned()))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                owner: name.owner.clone(),
                repo: name.repo.clone(),
                reference: reference.to_owned(),
            })
    }

    async fn fetch_tarball(&self, name: &Name, commit: &str) -> Result<FetchedTarball, Error> {
        *self.fetch_count.lock().unwrap() += 1;
        self.tarballs
            .get(commit)
            .cloned()
            .map(|bytes| FetchedTarball {
                bytes,
                resolved_url: format!("https://codeload.github.com/{}/{}/tar.gz/{}", name.owner, name.repo, commit),
            })
            .ok_or_else(|| Error::NotFound {
                owner: name.owner.clone(),
                repo: name.repo.clone(),
                reference: commit.to_owned(),
            })
    }

    async fn list_tags(&self, name: &Name) -> Result<Vec<String>, Error> {
        Ok(self.tags.get(&name.to_string()).cloned().unwrap_or_default())
    }
}

fn write_manifest(dir: &std::path::Path, yaml: &str) {
    std::fs::write(dir.join("model.yaml"), yaml).unwrap();
}

#[tokio::test]
async fn fresh_install_resolves_and_writes_lock() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "model:\n  name: ws\ndependencies:\n  acme/core: v1.0.0\n",
    );
    let host = Arc::new(
        FakeHostClient::new().with_ref("acme/core", "v1.0.0", &"a".repeat(40), &[("README.md", b"hi")]),
    );

    let mut workspace = Workspace::open(dir.path()).unwrap().with_host(host);
    workspace
        .install(&InstallOptions::default(), progress::sink())
        .await
        .unwrap();

    assert_eq!(workspace.lock.dependencies.len(), 1);
    let locked = &workspace.lock.dependencies["acme/core"];
    assert_eq!(locked.commit, "a".repeat(40));
    assert!(dir.path().join("model.lock").is_file());
}

#[tokio::test]
async fn second_install_reuses_lock_without_refetching() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "model:\n  name: ws\ndependencies:\n  acme/core: v1.0.0\n",
    );
    let host = Arc::new(
        FakeHostClient::new().with_ref("acme/core", "v1.0.0", &"b".repeat(40), &[("x", b"y")]),
    );

    let mut workspace = Workspace::open(dir.path()).unwrap().with_host(host.clone());
    workspace
        .install(&InstallOptions::default(), progress::sink())
        .await
        .unwrap();

    let mut second = Workspace::open(dir.path()).unwrap().with_host(host.clone());
    second
        .install(&InstallOptions::default(), progress::sink())
        .await
        .unwrap();

    // Cache already had the entry; fetch_tarball should only have run once.
    assert_eq!(*host.fetch_count.lock().unwrap(), 1);
    assert_eq!(second.lock.dependencies["acme/core"].commit, "b".repeat(40));
}

#[tokio::test]
async fn frozen_lock_rejects_undeclared_lock_drift() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "model:\n  name: ws\ndependencies:\n  acme/core: v2.0.0\n",
    );
    let host: Arc<dyn HostClient> = Arc::new(FakeHostClient::new());

    let mut workspace = Workspace::open(dir.path()).unwrap().with_host(host);
    let opts = InstallOptions {
        frozen_lock: true,
        ..Default::default()
    };
    let err = workspace.install(&opts, progress::sink()).await.unwrap_err();
    assert!(matches!(err, Error::FrozenLockViolation { .. }));
    assert!(!dir.path().join("model.lock").is_file());
}

#[tokio::test]
async fn add_then_remove_round_trips_manifest_and_lock() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "model:\n  name: ws\ndependencies:\n");
    let host = Arc::new(
        FakeHostClient::new().with_ref("acme/core", "main", &"c".repeat(40), &[("f", b"1")]),
    );

    let mut workspace = Workspace::open(dir.path()).unwrap().with_host(host);
    let specifier = Specifier::parse("acme/core").unwrap();
    workspace
        .add(&specifier, &InstallOptions::default(), progress::sink())
        .await
        .unwrap();
    assert!(workspace.manifest.dependencies.contains_key("acme/core"));
    assert!(workspace.lock.dependencies.contains_key("acme/core"));
    assert!(dir.path().join(".dlang/packages/acme/core").exists());

    workspace.remove("acme/core@main").await.unwrap();
    assert!(!workspace.manifest.dependencies.contains_key("acme/core"));
    assert!(!workspace.lock.dependencies.contains_key("acme/core"));
    assert!(!dir.path().join(".dlang/packages/acme/core").exists());
    assert!(!dir.path().join(".dlang/packages/acme").exists());

    let reloaded = Workspace::open(dir.path()).unwrap();
    assert!(reloaded.manifest.dependencies.is_empty());
    assert!(reloaded.lock.dependencies.is_empty());
}

#[tokio::test]
async fn outdated_reports_available_tag_bump() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "model:\n  name: ws\ndependencies:\n  acme/core: v1.0.0\n",
    );
    let host = Arc::new(
        FakeHostClient::new()
            .with_ref("acme/core", "v1.0.0", &"d".repeat(40), &[("f", b"1")])
            .with_tags("acme/core", &["v1.0.0", "v1.2.0", "v2.0.0"]),
    );
    let workspace = Workspace::open(dir.path()).unwrap().with_host(host);

    let reports = workspace.outdated().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].latest, "v2.0.0");
}

#[tokio::test]
async fn upgrade_bumps_manifest_and_lock_to_latest_tag() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "model:\n  name: ws\ndependencies:\n  acme/core: v1.0.0\n",
    );
    let host = Arc::new(
        FakeHostClient::new()
            .with_ref("acme/core", "v1.0.0", &"e".repeat(40), &[("f", b"1")])
            .with_ref("acme/core", "v2.0.0", &"f".repeat(40), &[("f", b"2")])
            .with_tags("acme/core", &["v1.0.0", "v2.0.0"]),
    );

    let mut workspace = Workspace::open(dir.path()).unwrap().with_host(host);
    let upgraded = workspace.upgrade(None, progress::sink()).await.unwrap();

    assert_eq!(upgraded.len(), 1);
    assert_eq!(workspace.manifest.dependencies["acme/core"].reference, "v2.0.0");
    assert_eq!(workspace.lock.dependencies["acme/core"].reference, "v2.0.0");
}

#[tokio::test]
async fn cache_clear_empties_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "model:\n  name: ws\ndependencies:\n  acme/core: v1.0.0\n",
    );
    let host = Arc::new(
        FakeHostClient::new().with_ref("acme/core", "v1.0.0", &"9".repeat(40), &[("f", b"1")]),
    );

    let mut workspace = Workspace::open(dir.path()).unwrap().with_host(host);
    workspace
        .install(&InstallOptions::default(), progress::sink())
        .await
        .unwrap();

    assert!(dir.path().join(".dlang/packages").exists());
    workspace.cache_clear().await.unwrap();
    assert!(!dir.path().join(".dlang/packages").exists());
}

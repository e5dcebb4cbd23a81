//! The host client: everything that talks to a Git forge over the network.

pub mod retry;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::credentials::CredentialProvider;
use crate::error::Error;
use crate::spec::Name;
use retry::RetryPolicy;

/// A fetched tarball together with the URL it was actually resolved from
/// (recorded verbatim as `resolved` in the lock file).
#[derive(Debug, Clone)]
pub struct FetchedTarball {
    pub bytes: Vec<u8>,
    pub resolved_url: String,
}

/// Everything the installer needs from a Git forge. Implemented for
/// production use by [`GitHostClient`], and by hand-written fakes in tests.
#[async_trait]
pub trait HostClient: Send + Sync {
    /// Resolve a ref (branch, tag, or already-a-commit) to a concrete commit
    /// hash.
    async fn resolve_ref_to_commit(&self, name: &Name, reference: &str) -> Result<String, Error>;

    /// Fetch the gzip-compressed tarball of `name` at `commit`.
    async fn fetch_tarball(&self, name: &Name, commit: &str) -> Result<FetchedTarball, Error>;

    /// List every tag known for `name`, across all pages, in no particular
    /// order.
    async fn list_tags(&self, name: &Name) -> Result<Vec<String>, Error>;
}

/// Production [`HostClient`] backed by the GitHub REST API.
pub struct GitHostClient {
    http: reqwest::Client,
    credentials: CredentialProvider,
    retry: RetryPolicy,
    api_base: String,
    codeload_base: String,
}

impl GitHostClient {
    pub fn new() -> Self {
        GitHostClient {
            http: reqwest::Client::builder()
                .user_agent(concat!("dlang/", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("building the host HTTP client"),
            credentials: CredentialProvider::load(),
            retry: RetryPolicy::default(),
            api_base: "https://api.github.com".to_owned(),
            codeload_base: "https://codeload.github.com".to_owned(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.resolve("github.com") {
            Some(cred) => builder.bearer_auth(cred.token),
            None => builder,
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, Error> {
        self.retry
            .run(
                || async {
                    let response = self
                        .authorize(self.http.get(url))
                        .send()
                        .await
                        .map_err(|source| Error::NetworkError {
                            url: url.to_owned(),
                            source,
                        })?;
                    classify_status(url, response).await
                },
                |err| matches!(err, Error::NetworkError { .. } | Error::RateLimited { .. }),
            )
            .await
    }
}

impl Default for GitHostClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn classify_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response, Error> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            let host = url::Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_owned))
                .unwrap_or_else(|| url.to_owned());
            Err(Error::AuthError { host })
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            Err(Error::RateLimited {
                url: url.to_owned(),
                retry_after,
            })
        }
        StatusCode::NOT_FOUND => Err(Error::NotFound {
            owner: String::new(),
            repo: String::new(),
            reference: String::new(),
        }),
        _ => {
            let source = response
                .error_for_status()
                .expect_err("non-success status should produce an error");
            Err(Error::NetworkError {
                url: url.to_owned(),
                source,
            })
        }
    }
}

#[derive(serde::Deserialize)]
struct CommitResponse {
    sha: String,
}

#[derive(serde::Deserialize)]
struct TagResponse {
    name: String,
}

#[async_trait]
impl HostClient for GitHostClient {
    async fn resolve_ref_to_commit(&self, name: &Name, reference: &str) -> Result<String, Error> {
        let url = format!(
            "{}/repos/{}/{}/commits/{}",
            self.api_base, name.owner, name.repo, reference
        );
        let response = self.get(&url).await.map_err(|e| fill_not_found(e, name, reference))?;
        let body: CommitResponse = response
            .json()
            .await
            .map_err(|source| Error::NetworkError { url: url.clone(), source })?;
        Ok(body.sha)
    }

    async fn fetch_tarball(&self, name: &Name, commit: &str) -> Result<FetchedTarball, Error> {
        let url = format!(
            "{}/{}/{}/tar.gz/{}",
            self.codeload_base, name.owner, name.repo, commit
        );
        let response = self.get(&url).await.map_err(|e| fill_not_found(e, name, commit))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| Error::NetworkError { url: url.clone(), source })?;
        Ok(FetchedTarball {
            bytes: bytes.to_vec(),
            resolved_url: url,
        })
    }

    async fn list_tags(&self, name: &Name) -> Result<Vec<String>, Error> {
        const PER_PAGE: u32 = 100;
        const MAX_PAGES: u32 = 100;

        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{}/repos/{}/{}/tags?per_page={PER_PAGE}&page={page}",
                self.api_base, name.owner, name.repo
            );
            let response = self.get(&url).await.map_err(|e| fill_not_found(e, name, ""))?;
            let body: Vec<TagResponse> = response
                .json()
                .await
                .map_err(|source| Error::NetworkError { url: url.clone(), source })?;
            let got = body.len();
            all.extend(body.into_iter().map(|t| t.name));

            if got < PER_PAGE as usize {
                break;
            }
            page += 1;
            if page > MAX_PAGES {
                tracing::warn!(
                    owner = %name.owner,
                    repo = %name.repo,
                    pages = MAX_PAGES,
                    tags = all.len(),
                    "tag list truncated after reaching the page safety cap"
                );
                break;
            }
        }
        Ok(all)
    }
}

fn fill_not_found(err: Error, name: &Name, reference: &str) -> Error {
    match err {
        Error::NotFound { .. } => Error::NotFound {
            owner: name.owner.clone(),
            repo: name.repo.clone(),
            reference: reference.to_owned(),
        },
        other => other,
    }
}

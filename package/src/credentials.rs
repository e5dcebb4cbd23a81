//! Credential resolution for authenticated host requests.
//!
//! Lookup order for a given host (e.g. `github.com`):
//!  1. `<HOST>_TOKEN` environment variable, with the host upper-cased and
//!     every non-alphanumeric byte turned into `_` (`github.com` ->
//!     `GITHUB_COM_TOKEN`).
//!  2. A netrc-style credentials file at the platform config directory
//!     (`$XDG_CONFIG_HOME/dlang/credentials` on Linux).
//!  3. Anonymous: no credentials, request proceeds unauthenticated.
//!
//! This module only reads external state; it has no side effects.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// A resolved access token for a single host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
}

pub struct CredentialProvider {
    file_tokens: HashMap<String, String>,
}

impl CredentialProvider {
    /// Build a provider that reads the netrc-style file under the standard
    /// config directory, if one exists. Never fails: a missing or
    /// unreadable file just means no file-based credentials.
    pub fn load() -> Self {
        let file_tokens = credentials_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .map(|text| parse_credentials_file(&text))
            .unwrap_or_default();
        CredentialProvider { file_tokens }
    }

    /// The same provider, but reading the credentials file from an
    /// explicit path (used in tests).
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let file_tokens = std::fs::read_to_string(path)
            .map(|text| parse_credentials_file(&text))
            .unwrap_or_default();
        CredentialProvider { file_tokens }
    }

    /// Resolve a credential for `host`, checking the environment first.
    pub fn resolve(&self, host: &str) -> Option<Credential> {
        if let Ok(token) = std::env::var(env_var_name(host)) {
            if !token.is_empty() {
                return Some(Credential { token });
            }
        }
        self.file_tokens
            .get(host)
            .cloned()
            .map(|token| Credential { token })
    }
}

fn env_var_name(host: &str) -> String {
    let mut name: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    name.push_str("_TOKEN");
    name
}

fn credentials_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "domainlang", "dlang")
        .map(|dirs| dirs.config_dir().join("credentials"))
}

/// Parse a netrc-style file: one `machine <host> login <user> password
/// <token>` stanza per line, whitespace-separated. Only `machine` and
/// `password` are used; `login` is accepted but ignored.
fn parse_credentials_file(text: &str) -> HashMap<String, String> {
    let mut tokens = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let mut host = None;
        let mut password = None;
        let mut i = 0;
        while i + 1 < fields.len() {
            match fields[i] {
                "machine" => host = Some(fields[i + 1]),
                "password" => password = Some(fields[i + 1]),
                _ => {}
            }
            i += 2;
        }
        if let (Some(host), Some(password)) = (host, password) {
            tokens.insert(host.to_owned(), password.to_owned());
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_name_normalizes_host() {
        assert_eq!(env_var_name("github.com"), "GITHUB_COM_TOKEN");
        assert_eq!(env_var_name("gitlab.example.org"), "GITLAB_EXAMPLE_ORG_TOKEN");
    }

    #[test]
    fn parses_netrc_style_file() {
        let text = "machine github.com login alice password abc123\nmachine gitlab.com password def456\n";
        let tokens = parse_credentials_file(text);
        assert_eq!(tokens.get("github.com"), Some(&"abc123".to_owned()));
        assert_eq!(tokens.get("gitlab.com"), Some(&"def456".to_owned()));
    }

    #[test]
    fn ignores_blank_lines_and_comments() {
        let text = "# comment\n\nmachine github.com password tok\n";
        let tokens = parse_credentials_file(text);
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn file_credential_resolves_when_env_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        std::fs::write(&path, "machine github.com password filetoken\n").unwrap();
        let provider = CredentialProvider::load_from(&path);
        assert_eq!(
            provider.resolve("github.com"),
            Some(Credential { token: "filetoken".to_owned() })
        );
        assert_eq!(provider.resolve("unknown.example.com"), None);
    }
}

//! Package specifiers (`owner/repo[@ref]`) and ref-type classification.
//!
//! Classification is purely syntactic: it never needs a network call, and it
//! is a total function over any non-empty ref string (property 5 of the
//! spec).

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Two non-empty path segments identifying a package: `owner/repo`.
///
/// Comparison is case-sensitive; the canonical display form is `owner/repo`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name {
    pub owner: String,
    pub repo: String,
}

impl Name {
    fn is_valid_segment(s: &str) -> bool {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        let mut parts = s.splitn(2, '/');
        let owner = parts.next().unwrap_or_default();
        let Some(repo) = parts.next() else {
            return Err(format!("expected 'owner/repo', got '{s}'"));
        };
        if repo.contains('/') {
            return Err(format!(
                "expected exactly one '/' in the owner/repo segment of '{s}'"
            ));
        }
        if !Self::is_valid_segment(owner) || !Self::is_valid_segment(repo) {
            return Err(format!(
                "owner/repo must match [A-Za-z0-9._-]+/[A-Za-z0-9._-]+, got '{s}'"
            ));
        }
        Ok(Name {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
        })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for Name {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// How a ref string was classified; purely syntactic (see [`classify_ref`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefKind {
    Commit,
    Tag,
    Branch,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RefKind::Commit => "commit",
            RefKind::Tag => "tag",
            RefKind::Branch => "branch",
        })
    }
}

impl FromStr for RefKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(RefKind::Commit),
            "tag" => Ok(RefKind::Tag),
            "branch" => Ok(RefKind::Branch),
            other => Err(format!("unknown refType '{other}'")),
        }
    }
}

/// The default ref used when a specifier omits `@ref`.
pub const DEFAULT_BRANCH: &str = "main";

/// Classify a ref string into commit/tag/branch. Total over non-empty
/// strings; never performs I/O.
pub fn classify_ref(reference: &str) -> RefKind {
    if is_commit(reference) {
        RefKind::Commit
    } else if is_tag(reference) {
        RefKind::Tag
    } else {
        RefKind::Branch
    }
}

fn is_commit(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

fn is_tag(s: &str) -> bool {
    let s = s.strip_prefix('v').unwrap_or(s);
    let mut parts = s.splitn(4, '.');
    let major = parts.next().unwrap_or_default();
    let minor = parts.next().unwrap_or_default();
    let patch_and_suffix = parts.next().unwrap_or_default();
    if major.is_empty() || !major.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if minor.is_empty() || !minor.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let patch: String = patch_and_suffix
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .map(|b| b as char)
        .collect();
    !patch.is_empty()
}

/// A user-facing specifier: `owner/repo[@ref]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Specifier {
    pub name: Name,
    pub reference: String,
}

impl Specifier {
    pub fn parse(s: &str) -> Result<Self, Error> {
        let (name_part, reference) = match s.split_once('@') {
            Some((n, r)) => (n, r.to_owned()),
            None => (s, DEFAULT_BRANCH.to_owned()),
        };
        // Tolerate an `@ref/path` suffix: only the ref up to the next `/` is
        // significant to this crate; any trailing path segment is consumed
        // by the caller (not interpreted by the core).
        let reference = reference.split('/').next().unwrap_or(&reference).to_owned();

        let name = Name::parse(name_part).map_err(|reason| Error::SpecInvalid {
            spec: s.to_owned(),
            reason,
        })?;
        Ok(Specifier { name, reference })
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.reference)
    }
}

impl FromStr for Specifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

//! Ordering and comparison of Git tag strings as semver-ish versions.
//!
//! Tags are accepted with an optional leading `v`. Non-semver tags always
//! compare lower than any semver tag, so `find_latest` never picks a
//! non-semver string over a real release.

use std::cmp::Ordering;

use semver::Version;

/// The outcome of comparing a currently-locked tag against the latest tag
/// seen on the host, used by `upgrade`/`outdated`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bump {
    UpToDate,
    Patch,
    Minor,
    Major,
}

impl std::fmt::Display for Bump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Bump::UpToDate => "up-to-date",
            Bump::Patch => "patch",
            Bump::Minor => "minor",
            Bump::Major => "major",
        })
    }
}

fn parse(tag: &str) -> Option<Version> {
    let stripped = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(stripped).ok()
}

/// Compare two tag strings. Non-semver tags sort below any semver tag; two
/// non-semver tags compare equal to each other (stable, but otherwise
/// unordered).
pub fn compare(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// The largest semver-parseable tag in `tags`, or `None` if none parse.
pub fn find_latest<'a, I: IntoIterator<Item = &'a str>>(tags: I) -> Option<&'a str> {
    tags.into_iter()
        .filter(|t| parse(t).is_some())
        .max_by(|a, b| compare(a, b))
}

/// Classify the upgrade from `current` to `latest`.
pub fn classify_bump(current: &str, latest: &str) -> Bump {
    let (Some(cur), Some(lat)) = (parse(current), parse(latest)) else {
        return Bump::UpToDate;
    };
    if lat <= cur {
        Bump::UpToDate
    } else if lat.major != cur.major {
        Bump::Major
    } else if lat.minor != cur.minor {
        Bump::Minor
    } else {
        Bump::Patch
    }
}

//! SRI-style integrity digests (`sha512-<base64>`) of tarball bytes.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha512};

use crate::error::Error;

/// Compute the SRI-format integrity string for a byte slice.
pub fn compute(bytes: &[u8]) -> String {
    let digest = Sha512::digest(bytes);
    format!("sha512-{}", BASE64.encode(digest))
}

/// Verify that `bytes` hashes to `expected`. Comparison of the digest bytes
/// is constant-time; only the final bool crosses a timing boundary.
pub fn verify(expected: &str, bytes: &[u8]) -> Result<(), MismatchDetail> {
    let actual = compute(bytes);
    if constant_time_eq(expected.as_bytes(), actual.as_bytes()) {
        Ok(())
    } else {
        Err(MismatchDetail { expected: expected.to_owned(), actual })
    }
}

/// The two digests involved in a failed [`verify`], for the caller to wrap
/// into an [`Error::IntegrityMismatch`].
pub struct MismatchDetail {
    pub expected: String,
    pub actual: String,
}

impl MismatchDetail {
    pub fn into_error(self, owner: &str, repo: &str) -> Error {
        Error::IntegrityMismatch {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            expected: self.expected,
            actual: self.actual,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_sri_formatted() {
        let digest = compute(b"hello world");
        assert!(digest.starts_with("sha512-"));
    }

    #[test]
    fn verify_matches_same_bytes() {
        let digest = compute(b"some tarball bytes");
        assert!(verify(&digest, b"some tarball bytes").is_ok());
    }

    #[test]
    fn verify_rejects_tampered_bytes() {
        let digest = compute(b"some tarball bytes");
        let err = verify(&digest, b"tampered bytes").unwrap_err();
        assert_eq!(err.expected, digest);
        assert_ne!(err.actual, digest);
    }
}

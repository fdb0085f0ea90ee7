use sha1::{Digest, Sha1};

/// Compute the SHA-1 digest of a byte slice, returning the lowercase hex encoding.
///
/// npm registries publish this value as `dist.shasum` for every version.
#[must_use]
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Check `data` against an expected hex digest, ignoring case and surrounding whitespace.
#[must_use]
pub fn sha1_matches(data: &[u8], expected: &str) -> bool {
    sha1_hex(data).eq_ignore_ascii_case(expected.trim())
}

//! Cache key normalization and URL checksums.

use sha2::{Digest, Sha256};

/// Normalize a requested URL into its cache key.
///
/// Lowercases the whole string and strips trailing slashes, so URLs that
/// differ only by case or a trailing `/` share one entry.
pub fn normalize_key(url: &str) -> String {
    url.to_lowercase().trim_end_matches('/').to_string()
}

/// Short, filename-safe checksum of a URL: the first 8 bytes of its
/// SHA-256, hex-encoded.
pub fn url_checksum(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_strips_slash() {
        assert_eq!(normalize_key("Example.COM/Path/"), "example.com/path");
        assert_eq!(normalize_key("example.com"), "example.com");
    }

    #[test]
    fn test_normalize_collides_case_and_slash() {
        assert_eq!(normalize_key("site.test/a"), normalize_key("SITE.test/A/"));
    }

    #[test]
    fn test_normalize_idempotent() {
        for input in ["", "/", "//", "a//", "Site.Test/X/", "ÄBC/", "x?q=A/", "  spaced/ "] {
            let once = normalize_key(input);
            assert_eq!(normalize_key(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_key(""), "");
        assert_eq!(normalize_key("/"), "");
    }

    #[test]
    fn test_checksum_stability() {
        assert_eq!(url_checksum("http://site.test/"), url_checksum("http://site.test/"));
        assert_ne!(url_checksum("http://site.test/a"), url_checksum("http://site.test/b"));
    }

    #[test]
    fn test_checksum_format() {
        let sum = url_checksum("http://site.test/");
        assert_eq!(sum.len(), 16);
        assert!(sum.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

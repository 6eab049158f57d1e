//! Cache entry keys and body digests.

use sha2::{Digest, Sha256};
use url::Url;

/// Key under which a GET response for `url` is stored.
///
/// Fragments never reach the network, so they are not part of the key.
pub fn entry_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

/// Hex-encoded SHA-256 of a response body.
pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_key_drops_fragment() {
        let a = entry_key(&Url::parse("https://example.com/index.html#top").unwrap());
        let b = entry_key(&Url::parse("https://example.com/index.html").unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_entry_key_keeps_query() {
        let a = entry_key(&Url::parse("https://example.com/app.js?v=1").unwrap());
        let b = entry_key(&Url::parse("https://example.com/app.js?v=2").unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_format() {
        let digest = body_digest(b"body { margin: 0 }");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, body_digest(b"body { margin: 0 }"));
        assert_ne!(digest, body_digest(b"body { margin: 1px }"));
    }
}

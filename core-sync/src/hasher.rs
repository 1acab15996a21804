//! Content fingerprints.
//!
//! SHA-256 over the raw bytes of a document, frontmatter included, rendered
//! as lowercase hex. Used to skip documents whose content has not changed
//! since the last confirmed sync.

use sha2::{Digest, Sha256};

/// Fingerprint of a document's full original content
pub fn content_hash(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        assert_eq!(
            content_hash(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_stable_and_sensitive() {
        let a = content_hash(b"---\ntags: [x]\n---\nbody");
        assert_eq!(a, content_hash(b"---\ntags: [x]\n---\nbody"));
        assert_ne!(a, content_hash(b"---\ntags: [y]\n---\nbody"));
        assert_ne!(content_hash(b"hello"), content_hash(b"hellp"));
        assert_eq!(a.len(), 64);
    }
}

use sha2::{Digest, Sha256};

/// SHA-256 fingerprint of the exact bytes, lower-case hex.
pub fn hash_content(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            hash_content(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hash_content(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_distinct_content_distinct_hash() {
        let a = hash_content(b"package main");
        let b = hash_content(b"package main\n");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_content(b"package main"));
    }
}

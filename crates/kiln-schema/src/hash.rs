//! Cache-key and content hashing.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::io::Read;

use crate::format::ArchiveFormat;

/// Lowercase hex SHA-1 of the UTF-8 bytes of `input`.
///
/// This is the naming hash for cache entries. It is not used for integrity.
pub fn sha1_hex(input: &str) -> String {
    hex::encode(Sha1::digest(input.as_bytes()))
}

/// BLAKE3 digest of a file's content, used as the deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute the hash of an in-memory buffer.
    pub fn compute(data: &[u8]) -> Self {
        Self(blake3::hash(data).to_hex().to_string())
    }

    /// Compute the hash of a file, streaming it in 64 KiB chunks.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or read.
    pub fn compute_file(path: &std::path::Path) -> std::io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = [0u8; 65536];
        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
        Ok(Self(hasher.finalize().to_hex().to_string()))
    }

    /// Return the inner hex string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable name of a cache entry.
///
/// Binary entries are `<sha1(uri)>-<sha1(version)>-<platform><ext>`; source
/// mirrors are `<sha1(uri)>-<sha1("")>-Source`. The same inputs produce the
/// same name on every machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    url_hash: String,
    version_hash: String,
    platform: String,
}

impl CacheKey {
    /// Key for a prebuilt archive of `uri` at `version` for `platform`.
    pub fn binary(uri: &str, version: &str, platform: &str) -> Self {
        Self {
            url_hash: sha1_hex(uri),
            version_hash: sha1_hex(version),
            platform: platform.to_string(),
        }
    }

    /// Key for the bare source mirror of `uri`. Mirrors are shared by all
    /// versions and platforms.
    pub fn source(uri: &str) -> Self {
        Self {
            url_hash: sha1_hex(uri),
            version_hash: sha1_hex(""),
            platform: "Source".to_string(),
        }
    }

    /// Hash of the package URI.
    pub fn url_hash(&self) -> &str {
        &self.url_hash
    }

    /// Entry name for the given format, without any directory component.
    pub fn file_name(&self, format: ArchiveFormat) -> String {
        format!(
            "{}-{}-{}{}",
            self.url_hash,
            self.version_hash,
            self.platform,
            format.extension()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_known_vectors() {
        assert_eq!(sha1_hex(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(sha1_hex("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn cache_key_is_stable() {
        let key = CacheKey::binary("abc", "", "Linux");
        assert_eq!(
            key.file_name(ArchiveFormat::TarLzma),
            "a9993e364706816aba3e25717850c26c9cd0d89d-da39a3ee5e6b4b0d3255bfef95601890afd80709-Linux.tar.lzma"
        );
        assert_eq!(
            CacheKey::binary("abc", "", "Linux"),
            CacheKey::binary("abc", "", "Linux")
        );
    }

    #[test]
    fn cache_key_distinguishes_inputs() {
        let a = CacheKey::binary("https://x", "1.0", "Windows");
        let b = CacheKey::binary("https://x", "1.1", "Windows");
        let c = CacheKey::binary("https://x", "1.0", "Linux");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(
            a.file_name(ArchiveFormat::TarGzip),
            a.file_name(ArchiveFormat::TarLzma)
        );
    }

    #[test]
    fn source_key_layout() {
        let name = CacheKey::source("abc").file_name(ArchiveFormat::SourceDirectory);
        assert_eq!(
            name,
            "a9993e364706816aba3e25717850c26c9cd0d89d-da39a3ee5e6b4b0d3255bfef95601890afd80709-Source"
        );
    }

    #[test]
    fn content_hash_file_matches_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, b"same bytes").unwrap();
        assert_eq!(
            ContentHash::compute_file(&path).unwrap(),
            ContentHash::compute(b"same bytes")
        );
    }
}

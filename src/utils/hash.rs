//! Hashing utilities.
//!
//! - `compute`: fast, deterministic 64-bit FxHash (error-message keys)
//! - `ContentHash`: blake3 content fingerprint of a source document

use rustc_hash::FxHasher;
use std::fs::File;
use std::hash::Hasher;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Compute 64-bit hash from byte data.
#[inline]
pub fn compute<T: AsRef<[u8]> + ?Sized>(data: &T) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_ref());
    hasher.finish()
}

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash of in-memory content.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Stream a file through blake3.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(64 * 1024, file);
        let mut hasher = blake3::Hasher::new();
        let mut buffer = [0u8; 64 * 1024];

        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    hasher.update(&buffer[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(Self(*hasher.finalize().as_bytes()))
    }

    /// Convert to hex string.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 16 hex chars are enough for logs
        write!(f, "{}", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_compute_is_deterministic() {
        assert_eq!(compute("unexpected token"), compute("unexpected token"));
        assert_ne!(compute("unexpected token"), compute("unexpected eof"));
    }

    #[test]
    fn test_content_hash_display() {
        let hash = ContentHash::new([0xab; 32]);
        assert_eq!(format!("{hash}"), "abababababababab");
    }

    #[test]
    fn test_file_hash_tracks_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("home.jml");
        fs::write(&path, "<Page/>").unwrap();

        let first = ContentHash::of_file(&path).unwrap();
        assert_eq!(first, ContentHash::of(b"<Page/>"));

        fs::write(&path, "<Page title=\"x\"/>").unwrap();
        assert_ne!(first, ContentHash::of_file(&path).unwrap());
    }

    #[test]
    fn test_file_hash_missing() {
        assert!(ContentHash::of_file(Path::new("/nonexistent/file.jml")).is_err());
    }
}

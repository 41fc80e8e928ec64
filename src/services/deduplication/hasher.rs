//! Content hashing for exact-match detection.
//!
//! Content is normalized before hashing so formatting differences do not
//! hide a duplicate.

use sha2::{Digest, Sha256};

/// Content hasher for deduplication.
///
/// # Normalization
///
/// Before hashing, content is:
/// - Trimmed of leading/trailing whitespace
/// - Converted to lowercase
/// - Whitespace runs collapsed to single spaces
///
/// # Example
///
/// ```rust
/// use katra::services::deduplication::ContentHasher;
///
/// let hash = ContentHasher::hash("Restarted the indexer after OOM");
/// assert_eq!(hash.len(), 64);
///
/// let hash2 = ContentHasher::hash("  restarted  the indexer after   oom ");
/// assert_eq!(hash, hash2);
/// ```
pub struct ContentHasher;

impl ContentHasher {
    /// Computes the lowercase hex SHA256 of normalized content.
    #[must_use]
    pub fn hash(content: &str) -> String {
        let normalized = Self::normalize(content);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Normalizes content for consistent hashing.
    #[must_use]
    pub fn normalize(content: &str) -> String {
        content
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

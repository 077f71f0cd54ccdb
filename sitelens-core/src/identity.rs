//! Identity types for SiteLens reports and executions

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Report identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type ReportId = Uuid;

/// Identifier of a single orchestrated execution (one in-flight entry).
pub type ExecutionId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 digest used for cache identity.
pub type ContentHash = [u8; 32];

/// Generate a new UUIDv7 identifier (timestamp-sortable).
pub fn new_report_id() -> ReportId {
    Uuid::now_v7()
}

/// Generate a new UUIDv7 execution identifier.
pub fn new_execution_id() -> ExecutionId {
    Uuid::now_v7()
}

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Hex-encode a content hash (64 lowercase characters).
pub fn content_hash_hex(hash: &ContentHash) -> String {
    hex::encode(hash)
}

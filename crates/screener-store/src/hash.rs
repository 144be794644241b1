//! Blake3 fingerprints of report content

use chrono::{DateTime, Utc};
use screener_pipeline::RunReport;

/// Hash raw bytes with blake3.
pub fn hash_bytes(data: &[u8]) -> blake3::Hash {
    blake3::hash(data)
}

/// Hash of everything in the report except `generated_at`.
///
/// Two runs that produced the same results share a fingerprint.
pub fn report_fingerprint(report: &RunReport) -> serde_json::Result<blake3::Hash> {
    let mut normalized = report.clone();
    normalized.generated_at = DateTime::<Utc>::UNIX_EPOCH;
    let json = serde_json::to_vec(&normalized)?;
    Ok(hash_bytes(&json))
}

/// Return the first 8 hex characters of a blake3 hash.
pub fn short_hash(hash: &blake3::Hash) -> String {
    hash.to_hex()[..8].to_string()
}

//! Snapshot input and report output on the local filesystem

pub mod hash;
pub mod sink;
pub mod snapshot;

pub use hash::{hash_bytes, report_fingerprint, short_hash};
pub use sink::JsonReportSink;
pub use snapshot::SnapshotSource;

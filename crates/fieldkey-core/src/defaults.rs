//! Centralized default constants for the fieldkey export engine.
//!
//! **This module is the single source of truth** for all shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// SWEEPS
// =============================================================================

/// Export sweep interval in seconds (15 minutes).
///
/// Long enough that a full sweep over every datasource finishes comfortably
/// before the next tick; short enough that edits appear in downloadable
/// snapshots within a working session.
pub const EXPORT_SWEEP_INTERVAL_SECS: u64 = 900;

/// Size sweep interval in seconds (15 minutes).
pub const SIZE_SWEEP_INTERVAL_SECS: u64 = 900;

/// Maximum snapshot builds running concurrently during a sweep.
///
/// Each build holds a source-store connection, a target file handle, and a
/// scratch directory (plus a process slot when the subprocess executor is
/// in use), so the fan-out must be capped.
pub const MAX_CONCURRENT_BUILDS: usize = 4;

// =============================================================================
// ARTIFACTS
// =============================================================================

/// File extension of the embedded database inside a snapshot.
pub const SNAPSHOT_DB_EXTENSION: &str = "sqlite";

/// Suffix appended to an archive path while it is being written.
/// The finished archive is renamed onto its final path in one step.
pub const ARCHIVE_PART_SUFFIX: &str = ".part";

/// Prefix of scratch directories for in-progress builds.
pub const SCRATCH_DIR_PREFIX: &str = "fieldkey-build-";

/// File name of the bundled copyright notice inside a snapshot, when one
/// is configured.
pub const COPYRIGHT_NOTICE_NAME: &str = "NOTICE.txt";

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum source-store pool connections.
pub const POOL_MAX_CONNECTIONS: u32 = 8;

/// Default minimum source-store pool connections.
pub const POOL_MIN_CONNECTIONS: u32 = 1;

/// Default source-store connect timeout in seconds.
pub const POOL_CONNECT_TIMEOUT_SECS: u64 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_intervals_are_fifteen_minutes() {
        assert_eq!(EXPORT_SWEEP_INTERVAL_SECS, 15 * 60);
        assert_eq!(SIZE_SWEEP_INTERVAL_SECS, 15 * 60);
    }

    #[test]
    fn test_build_fanout_is_bounded() {
        assert!(MAX_CONCURRENT_BUILDS >= 1);
    }

    #[test]
    fn test_part_suffix_keeps_zip_extension_out_front() {
        let partial = format!("7-2024-01-01-00-00-00-true.zip{}", ARCHIVE_PART_SUFFIX);
        assert!(!partial.ends_with(".zip"));
    }
}

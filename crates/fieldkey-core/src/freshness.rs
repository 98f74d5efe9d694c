//! Freshness keys and artifact naming.
//!
//! A snapshot artifact is named after the datasource it was built from, the
//! formatted last-modified timestamp of that datasource, and the
//! video-inclusion flag:
//!
//! ```text
//! <datasource_id>-<yyyy-MM-dd-HH-mm-ss>-<include_videos>.zip
//! ```
//!
//! The timestamp in the name *is* the cache key: an artifact is fresh exactly
//! when a file with the expected name exists, so no separate version counter
//! or manifest is needed. Everything here is a pure function of its inputs;
//! the wall clock is never consulted.

use chrono::NaiveDateTime;

/// Timestamp layout embedded in artifact file names.
///
/// Chosen to sort lexicographically in timestamp order and to contain no
/// characters that need escaping in file names or URLs.
pub const FRESHNESS_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Format a datasource's last-modified timestamp as a freshness key.
pub fn freshness_key(timestamp: NaiveDateTime) -> String {
    timestamp.format(FRESHNESS_FORMAT).to_string()
}

/// The artifact file name for one (datasource, variant) pair at one freshness key.
pub fn artifact_file_name(datasource_id: i32, key: &str, include_videos: bool) -> String {
    format!("{}-{}-{}.zip", datasource_id, key, include_videos)
}

/// The file-name prefix shared by every artifact of one datasource.
///
/// Stale-artifact cleanup deletes by this prefix, so it must match all
/// freshness keys and both variants of the datasource while never matching
/// another datasource (the trailing `-` keeps id 1 from matching id 10).
pub fn artifact_prefix(datasource_id: i32) -> String {
    format!("{}-", datasource_id)
}

/// Name of the artifact directory for one deployment version.
///
/// Versioning the directory keeps artifacts from incompatible schema
/// generations apart: a redeploy with a schema change writes to a fresh
/// directory instead of serving stale files.
pub fn artifact_dir_name(deploy_version: &str) -> String {
    format!("fieldkey-datasources-{}", deploy_version)
}

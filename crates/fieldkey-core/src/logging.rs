//! Structured logging schema and field name constants for fieldkey.
//!
//! All crates use these constants for consistent structured logging fields.
//! This ensures log aggregation tools (Loki, Elasticsearch) can query by
//! standardized field names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied (failed build kept old artifact, missing media file) |
//! | INFO  | Lifecycle events (sweep start/stop, artifact installs) |
//! | DEBUG | Decision points, per-table copy counts, freshness checks |
//! | TRACE | Per-item iteration, high-volume data (per-file bundling) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "export", "db"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "builder", "bundler", "archiver", "cache", "scheduler", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "ensure_fresh", "build", "sweep", "copy_table"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Datasource being exported or measured.
pub const DATASOURCE_ID: &str = "datasource_id";

/// Variant flag of the snapshot being built.
pub const INCLUDE_VIDEOS: &str = "include_videos";

/// Artifact file name or path.
pub const ARTIFACT: &str = "artifact";

/// Source or target table of a copy step.
pub const DB_TABLE: &str = "db_table";

/// Media row involved in a bundling decision.
pub const MEDIA_ID: &str = "media_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows copied by a table-copy step.
pub const ROW_COUNT: &str = "row_count";

/// Number of files written (bundling, archiving).
pub const FILE_COUNT: &str = "file_count";

/// Byte size of a file or artifact.
pub const SIZE_BYTES: &str = "size_bytes";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

//! # fieldkey-db
//!
//! Database layer for the fieldkey export engine.
//!
//! This crate provides:
//! - Source-store (MySQL) connection pool management
//! - The closure source and datasource catalog repositories
//! - The SQLite snapshot target writer and its template schema
//!
//! ## Example
//!
//! ```rust,ignore
//! use fieldkey_db::{create_pool, MySqlDatasourceCatalog, MySqlSnapshotSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool("mysql://localhost/fieldkey").await?;
//!     let catalog = MySqlDatasourceCatalog::new(pool.clone());
//!     let source = MySqlSnapshotSource::new(pool);
//!
//!     for ds in catalog.all().await? {
//!         println!("{}: {}", ds.id, ds.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod pool;
pub mod source;
pub mod target;
pub mod target_schema;

// Re-export core types
pub use fieldkey_core::*;

// Re-export repository implementations
pub use catalog::MySqlDatasourceCatalog;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use source::MySqlSnapshotSource;
pub use target::SqliteSnapshotTarget;
pub use target_schema::{create_template, TARGET_SCHEMA};

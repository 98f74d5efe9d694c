//! # fieldkey-export
//!
//! Snapshot export engine for fieldkey.
//!
//! This crate provides:
//! - Closure-complete snapshot builds (SQLite file plus bundled media)
//! - Flat zip archiving with atomic installs
//! - A freshness-keyed artifact cache with per-datasource build locks
//! - Scheduled export and size sweeps over all datasources
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fieldkey_db::{create_pool, MySqlDatasourceCatalog, MySqlSnapshotSource};
//! use fieldkey_export::{ExportConfig, ExportScheduler, InProcessExecutor, SizeSweep, SnapshotCache};
//!
//! let config = ExportConfig::from_env()?;
//! let pool = create_pool(&config.database_url).await?;
//!
//! let catalog = Arc::new(MySqlDatasourceCatalog::new(pool.clone()));
//! let source = Arc::new(MySqlSnapshotSource::new(pool.clone()));
//! let executor = Arc::new(InProcessExecutor::new(source));
//! let cache = Arc::new(SnapshotCache::new(catalog.clone(), executor, &config)?);
//!
//! // On-demand: fresh artifact for one datasource and variant.
//! let artifact = cache.ensure_fresh(7, false).await?;
//!
//! // Background: keep everything fresh.
//! let sweeps = ExportScheduler::new(catalog.clone(), cache.clone(), &config).start();
//! let sizes = SizeSweep::new(catalog, &config).start();
//!
//! // Graceful shutdown
//! sweeps.shutdown().await?;
//! sizes.shutdown().await?;
//! ```

pub mod archiver;
pub mod builder;
pub mod bundler;
pub mod cache;
pub mod config;
pub mod executor;
pub mod scheduler;
pub mod size_sweep;
pub mod test_support;

// Re-export core types
pub use fieldkey_core::*;

// Re-export engine types
pub use archiver::archive_folder;
pub use builder::{BuildRequest, SnapshotBuilder};
pub use bundler::{resolve_media_link, stage_file, BundleOutcome, MediaBundler};
pub use cache::SnapshotCache;
pub use config::ExportConfig;
pub use executor::{BuildExecutor, InProcessExecutor, SubprocessExecutor};
pub use scheduler::{ExportScheduler, SweepHandle, SweepStats};
pub use size_sweep::SizeSweep;

//! Freshness-keyed artifact cache.
//!
//! The cache owns one versioned artifact directory holding the snapshot
//! archives. An artifact's file name encodes its datasource id, the
//! datasource's last-modified timestamp, and the video variant; existence of
//! the expected name *is* the freshness check, so the cache keeps no state
//! about what it has built beyond the directory itself.
//!
//! Builds for the same datasource are serialized through a per-id lock so a
//! burst of requests produces one build, and stale artifacts are removed only
//! after a fresh one is installed. A failed build changes nothing: the old
//! artifact keeps serving until a build succeeds.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use fieldkey_core::freshness::{artifact_dir_name, artifact_file_name, artifact_prefix, freshness_key};
use fieldkey_core::{defaults, DatasourceCatalog, Error, Result};

use crate::archiver;
use crate::builder::BuildRequest;
use crate::config::ExportConfig;
use crate::executor::BuildExecutor;

/// Artifact cache over one versioned directory.
pub struct SnapshotCache {
    catalog: Arc<dyn DatasourceCatalog>,
    executor: Arc<dyn BuildExecutor>,
    artifact_dir: PathBuf,
    template_path: PathBuf,
    media_root: Option<PathBuf>,
    copyright_notice: Option<PathBuf>,
    locks: Mutex<HashMap<i32, Arc<Mutex<()>>>>,
}

impl SnapshotCache {
    /// Create the cache, creating its artifact directory if needed.
    pub fn new(
        catalog: Arc<dyn DatasourceCatalog>,
        executor: Arc<dyn BuildExecutor>,
        config: &ExportConfig,
    ) -> Result<Self> {
        let artifact_dir = config
            .artifact_root
            .join(artifact_dir_name(&config.deploy_version));
        std::fs::create_dir_all(&artifact_dir)?;

        info!(
            subsystem = "export",
            component = "cache",
            artifact_dir = %artifact_dir.display(),
            "Artifact directory ready"
        );

        Ok(Self {
            catalog,
            executor,
            artifact_dir,
            template_path: config.template_path.clone(),
            media_root: config.media_root.clone(),
            copyright_notice: config.copyright_notice.clone(),
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// The directory artifacts are installed into.
    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Return the path of a fresh artifact for the requested variant,
    /// building it first if needed.
    ///
    /// Freshness is judged against the datasource row at call time; the
    /// returned artifact matches the row as it was read here, which a
    /// concurrent edit may already have superseded.
    pub async fn ensure_fresh(&self, datasource_id: i32, include_videos: bool) -> Result<PathBuf> {
        let datasource = self
            .catalog
            .by_id(datasource_id)
            .await?
            .ok_or(Error::DatasourceNotFound(datasource_id))?;
        let timestamp = datasource.freshness_timestamp().ok_or_else(|| {
            Error::InvalidInput(format!(
                "datasource {} has no timestamp to derive a freshness key from",
                datasource_id
            ))
        })?;
        let key = freshness_key(timestamp);
        let name = artifact_file_name(datasource_id, &key, include_videos);
        let path = self.artifact_dir.join(&name);

        if path.is_file() {
            debug!(
                subsystem = "export",
                component = "cache",
                op = "ensure_fresh",
                datasource_id = datasource_id,
                include_videos = include_videos,
                artifact = %name,
                "Artifact is fresh"
            );
            return Ok(path);
        }

        let lock = self.lock_for(datasource_id).await;
        let _guard = lock.lock().await;

        // Whoever held the lock before us may have built this very artifact.
        if path.is_file() {
            debug!(
                subsystem = "export",
                component = "cache",
                op = "ensure_fresh",
                datasource_id = datasource_id,
                include_videos = include_videos,
                artifact = %name,
                "Artifact became fresh while waiting for the build lock"
            );
            return Ok(path);
        }

        let started = Instant::now();
        let scratch = tempfile::Builder::new()
            .prefix(&format!(
                "{}{}-",
                defaults::SCRATCH_DIR_PREFIX,
                datasource_id
            ))
            .tempdir()?;

        let request = BuildRequest {
            datasource_id,
            include_videos,
            template_path: self.template_path.clone(),
            media_root: self.media_root.clone(),
            copyright_notice: self.copyright_notice.clone(),
        };
        let summary = self.executor.execute(&request, scratch.path()).await?;
        archiver::archive_folder(scratch.path(), &path).await?;

        // The freshly installed artifact and its sibling variant survive;
        // everything else with this datasource's prefix is stale, including
        // orphaned .part files from interrupted runs.
        let sibling = artifact_file_name(datasource_id, &key, !include_videos);
        self.remove_stale(datasource_id, &[&name, &sibling]).await;

        info!(
            subsystem = "export",
            component = "cache",
            op = "ensure_fresh",
            datasource_id = datasource_id,
            include_videos = include_videos,
            artifact = %name,
            nodes = summary.nodes,
            files_bundled = summary.files_bundled,
            files_missing = summary.files_missing,
            duration_ms = started.elapsed().as_millis() as u64,
            "Artifact built and installed"
        );
        Ok(path)
    }

    /// Refresh both variants of one datasource, videos first.
    ///
    /// The variants are built back to back rather than in parallel; they read
    /// the same tables and mostly bundle the same files, so overlapping them
    /// buys little.
    pub async fn refresh_both(&self, datasource_id: i32) -> Result<(PathBuf, PathBuf)> {
        let with_videos = self.ensure_fresh(datasource_id, true).await?;
        let without_videos = self.ensure_fresh(datasource_id, false).await?;
        Ok((with_videos, without_videos))
    }

    async fn lock_for(&self, datasource_id: i32) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(datasource_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Delete every artifact of `datasource_id` not named in `keep`.
    /// Best effort: failures are logged and skipped.
    async fn remove_stale(&self, datasource_id: i32, keep: &[&str]) {
        let prefix = artifact_prefix(datasource_id);
        let mut entries = match fs::read_dir(&self.artifact_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    subsystem = "export",
                    component = "cache",
                    error = %e,
                    "Failed to list artifact directory for cleanup"
                );
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        subsystem = "export",
                        component = "cache",
                        error = %e,
                        "Failed to read artifact directory entry"
                    );
                    break;
                }
            };
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.starts_with(&prefix) || keep.contains(&name) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => debug!(
                    subsystem = "export",
                    component = "cache",
                    artifact = name,
                    "Removed stale artifact"
                ),
                Err(e) => warn!(
                    subsystem = "export",
                    component = "cache",
                    artifact = name,
                    error = %e,
                    "Failed to remove stale artifact"
                ),
            }
        }
    }
}

//! Build execution strategies.
//!
//! The cache does not care how a snapshot folder gets materialized, only
//! that it appears in the scratch directory it hands over. [`InProcessExecutor`]
//! runs the builder on the engine's own runtime; [`SubprocessExecutor`] spawns
//! the converter binary instead, keeping the memory spike of a large build
//! out of the serving process and surviving converter crashes as build
//! failures rather than engine crashes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use fieldkey_core::{defaults, Error, Result, SnapshotSource, SnapshotSummary};

use crate::builder::{BuildRequest, SnapshotBuilder};

/// Materializes one snapshot folder into a scratch directory.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    async fn execute(&self, request: &BuildRequest, scratch: &Path) -> Result<SnapshotSummary>;
}

/// Runs builds on the engine's own runtime.
pub struct InProcessExecutor {
    builder: SnapshotBuilder,
}

impl InProcessExecutor {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            builder: SnapshotBuilder::new(source),
        }
    }
}

#[async_trait]
impl BuildExecutor for InProcessExecutor {
    async fn execute(&self, request: &BuildRequest, scratch: &Path) -> Result<SnapshotSummary> {
        self.builder.build_into(request, scratch).await
    }
}

/// Runs builds through the converter binary.
///
/// The child inherits stderr for its logs and prints its build summary as a
/// single JSON line on stdout. A non-zero exit is a build failure; an
/// unparseable summary is not, since the folder was still produced.
pub struct SubprocessExecutor {
    program: PathBuf,
    database_url: String,
}

impl SubprocessExecutor {
    pub fn new(program: impl Into<PathBuf>, database_url: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            database_url: database_url.into(),
        }
    }
}

#[async_trait]
impl BuildExecutor for SubprocessExecutor {
    async fn execute(&self, request: &BuildRequest, scratch: &Path) -> Result<SnapshotSummary> {
        let target_db = scratch.join(format!(
            "{}.{}",
            request.datasource_id,
            defaults::SNAPSHOT_DB_EXTENSION
        ));

        let mut command = Command::new(&self.program);
        command
            .arg(request.datasource_id.to_string())
            .arg(request.include_videos.to_string())
            .arg(&request.template_path)
            .arg(&target_db)
            .arg("--database-url")
            .arg(&self.database_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(root) = &request.media_root {
            command.arg("--media-root").arg(root);
        }
        if let Some(notice) = &request.copyright_notice {
            command.arg("--copyright-notice").arg(notice);
        }

        debug!(
            subsystem = "export",
            component = "executor",
            op = "spawn",
            program = %self.program.display(),
            datasource_id = request.datasource_id,
            include_videos = request.include_videos,
            "Spawning converter"
        );

        let output = command.output().await.map_err(|e| {
            Error::BuildFailed(format!(
                "failed to spawn converter {}: {}",
                self.program.display(),
                e
            ))
        })?;

        if !output.status.success() {
            return Err(Error::BuildFailed(format!(
                "converter exited with {} for datasource {}",
                output.status, request.datasource_id
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let summary_line = stdout.lines().rev().find(|line| !line.trim().is_empty());
        match summary_line.map(serde_json::from_str::<SnapshotSummary>) {
            Some(Ok(summary)) => Ok(summary),
            _ => {
                warn!(
                    subsystem = "export",
                    component = "executor",
                    datasource_id = request.datasource_id,
                    "Converter exited cleanly but produced no parseable summary"
                );
                Ok(SnapshotSummary {
                    datasource_id: request.datasource_id,
                    include_videos: request.include_videos,
                    ..Default::default()
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request() -> BuildRequest {
        BuildRequest::new(7, false, "/srv/template.sqlite")
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_build_failure() {
        let scratch = TempDir::new().unwrap();
        let executor = SubprocessExecutor::new("false", "mysql://localhost/fieldkey");

        let result = executor.execute(&request(), scratch.path()).await;
        assert!(matches!(result, Err(Error::BuildFailed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_exit_without_summary_falls_back() {
        let scratch = TempDir::new().unwrap();
        let executor = SubprocessExecutor::new("true", "mysql://localhost/fieldkey");

        let summary = executor.execute(&request(), scratch.path()).await.unwrap();
        assert_eq!(summary.datasource_id, 7);
        assert!(!summary.include_videos);
        assert_eq!(summary.nodes, 0);
    }

    #[tokio::test]
    async fn test_missing_program_is_build_failure() {
        let scratch = TempDir::new().unwrap();
        let executor =
            SubprocessExecutor::new("/nonexistent/fieldkey-convert", "mysql://localhost/fieldkey");

        let result = executor.execute(&request(), scratch.path()).await;
        assert!(matches!(result, Err(Error::BuildFailed(_))));
    }
}

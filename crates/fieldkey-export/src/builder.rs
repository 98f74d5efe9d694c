//! Snapshot builder.
//!
//! Materializes the full closure of one datasource into a snapshot folder:
//! a SQLite file copied from the template and filled table by table, plus the
//! bundled media files next to it. Tables are copied in dependency order so
//! every foreign key points at a row that is already present:
//!
//! ```text
//! datasource → nodes → attributes → attribute values → media types
//!            → media → node media → relationships → similarities
//! ```
//!
//! Each step is filtered by the ids the previous steps actually copied, so
//! the snapshot never contains rows outside the closure.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use fieldkey_core::{defaults, Error, Result, SnapshotSource, SnapshotSummary};
use fieldkey_db::SqliteSnapshotTarget;

use crate::bundler::{stage_file, BundleOutcome, MediaBundler};
use crate::config::ExportConfig;

/// Everything one build needs besides the source store.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub datasource_id: i32,
    pub include_videos: bool,
    pub template_path: PathBuf,
    pub media_root: Option<PathBuf>,
    pub copyright_notice: Option<PathBuf>,
}

impl BuildRequest {
    pub fn new(
        datasource_id: i32,
        include_videos: bool,
        template_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            datasource_id,
            include_videos,
            template_path: template_path.into(),
            media_root: None,
            copyright_notice: None,
        }
    }

    /// A request for one (datasource, variant) pair under the given config.
    pub fn from_config(config: &ExportConfig, datasource_id: i32, include_videos: bool) -> Self {
        Self {
            datasource_id,
            include_videos,
            template_path: config.template_path.clone(),
            media_root: config.media_root.clone(),
            copyright_notice: config.copyright_notice.clone(),
        }
    }
}

/// Builds snapshot folders from a source store.
#[derive(Clone)]
pub struct SnapshotBuilder {
    source: Arc<dyn SnapshotSource>,
}

impl SnapshotBuilder {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self { source }
    }

    /// Materialize one snapshot folder into `scratch`.
    ///
    /// On success the folder holds the filled SQLite file, the bundled media
    /// files, and the icon and copyright notice when configured. On error the
    /// folder contents are unspecified; the caller discards the scratch
    /// directory either way once it has archived it.
    pub async fn build_into(
        &self,
        request: &BuildRequest,
        scratch: &Path,
    ) -> Result<SnapshotSummary> {
        let started = Instant::now();
        let datasource_id = request.datasource_id;

        let mut datasource = self
            .source
            .datasource(datasource_id)
            .await?
            .ok_or(Error::DatasourceNotFound(datasource_id))?;

        let db_name = format!("{}.{}", datasource_id, defaults::SNAPSHOT_DB_EXTENSION);
        let mut target =
            SqliteSnapshotTarget::create_from_template(&request.template_path, &scratch.join(db_name))
                .await?;

        let mut summary = SnapshotSummary {
            datasource_id,
            include_videos: request.include_videos,
            ..Default::default()
        };

        // The icon follows the media policy: bundled under its bare name and
        // the row rewritten, or nulled when the file is absent.
        if let Some(link) = datasource.icon.take() {
            datasource.icon =
                stage_file(&link, request.media_root.as_deref(), scratch).await;
        }
        target.insert_datasource(&datasource).await?;

        let nodes = self.source.nodes(datasource_id).await?;
        let node_ids: Vec<i32> = nodes.iter().map(|n| n.id).collect();
        target.insert_nodes(&nodes).await?;
        summary.nodes = nodes.len();

        let attributes = self.source.attributes(&node_ids).await?;
        let attribute_ids: Vec<i32> = attributes.iter().map(|a| a.id).collect();
        target.insert_attributes(&attributes).await?;
        summary.attributes = attributes.len();

        let attribute_values = self
            .source
            .attribute_values(&node_ids, &attribute_ids)
            .await?;
        target.insert_attribute_values(&attribute_values).await?;
        summary.attribute_values = attribute_values.len();

        let media_types = self.source.media_types(&node_ids).await?;
        let media_type_ids: Vec<i32> = media_types.iter().map(|mt| mt.id).collect();
        target.insert_media_types(&media_types).await?;
        summary.media_types = media_types.len();

        let mut media = self.source.media(&node_ids, &media_type_ids).await?;
        let bundler = MediaBundler::new(
            request.include_videos,
            &media_types,
            request.media_root.clone(),
        );
        for row in &mut media {
            match bundler.bundle(row, scratch).await {
                BundleOutcome::Bundled => summary.files_bundled += 1,
                BundleOutcome::Missing => summary.files_missing += 1,
                BundleOutcome::ExcludedVideo => {}
            }
        }
        let media_ids: Vec<i32> = media.iter().map(|m| m.id).collect();
        target.insert_media(&media).await?;
        summary.media = media.len();

        let node_media = self.source.node_media(&node_ids, &media_ids).await?;
        target.insert_node_media(&node_media).await?;
        summary.node_media = node_media.len();

        let relationships = self.source.relationships(&node_ids).await?;
        target.insert_relationships(&relationships).await?;
        summary.relationships = relationships.len();

        let similarities = self.source.similarities(&node_ids).await?;
        target.insert_similarities(&similarities).await?;
        summary.similarities = similarities.len();

        self.stage_notice(request, scratch).await;
        target.close().await?;

        info!(
            subsystem = "export",
            component = "builder",
            op = "build",
            datasource_id = datasource_id,
            include_videos = request.include_videos,
            nodes = summary.nodes,
            media = summary.media,
            files_bundled = summary.files_bundled,
            files_missing = summary.files_missing,
            duration_ms = started.elapsed().as_millis() as u64,
            "Snapshot folder materialized"
        );
        Ok(summary)
    }

    async fn stage_notice(&self, request: &BuildRequest, scratch: &Path) {
        let Some(notice) = &request.copyright_notice else {
            return;
        };
        let staged = scratch.join(defaults::COPYRIGHT_NOTICE_NAME);
        match tokio::fs::copy(notice, &staged).await {
            Ok(_) => debug!(
                subsystem = "export",
                component = "builder",
                notice = %notice.display(),
                "Copyright notice bundled"
            ),
            Err(e) => warn!(
                subsystem = "export",
                component = "builder",
                notice = %notice.display(),
                error = %e,
                "Copyright notice not bundled"
            ),
        }
    }
}

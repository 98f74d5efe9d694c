//! Scheduled media size accounting.
//!
//! Clients decide whether to download the full or the no-videos snapshot
//! based on the byte sizes stored on the datasource row. This sweep keeps
//! those numbers honest: it walks each datasource's media files on disk,
//! sums image and video sizes separately, and writes the totals back.
//!
//! Runs independently of the export sweep on its own interval; neither
//! blocks the other.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use fieldkey_core::{DatasourceCatalog, MediaKind, Result};

use crate::bundler::resolve_media_link;
use crate::config::ExportConfig;
use crate::scheduler::{SweepHandle, SweepStats};

/// Periodic recalculation of per-datasource media sizes.
pub struct SizeSweep {
    catalog: Arc<dyn DatasourceCatalog>,
    media_root: Option<PathBuf>,
    interval: Duration,
}

impl SizeSweep {
    pub fn new(catalog: Arc<dyn DatasourceCatalog>, config: &ExportConfig) -> Self {
        Self {
            catalog,
            media_root: config.media_root.clone(),
            interval: config.size_sweep_interval,
        }
    }

    /// Start the sweep loop. The first pass runs immediately.
    pub fn start(self) -> SweepHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            self.run(shutdown_rx).await;
        });
        SweepHandle::new(shutdown_tx, task)
    }

    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(
            subsystem = "export",
            component = "size_sweep",
            interval_secs = self.interval.as_secs(),
            "Size sweep started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }

        info!(
            subsystem = "export",
            component = "size_sweep",
            "Size sweep stopped"
        );
    }

    /// Measure and persist sizes for every datasource.
    pub async fn sweep_once(&self) -> SweepStats {
        let started = Instant::now();
        let datasources = match self.catalog.all().await {
            Ok(datasources) => datasources,
            Err(e) => {
                warn!(
                    subsystem = "export",
                    component = "size_sweep",
                    error = %e,
                    "Could not list datasources; skipping size sweep"
                );
                return SweepStats::default();
            }
        };

        let mut stats = SweepStats::default();
        for datasource in &datasources {
            match self.measure_datasource(datasource.id).await {
                Ok((size_total, size_no_video)) => {
                    match self
                        .catalog
                        .update_sizes(datasource.id, size_total, size_no_video)
                        .await
                    {
                        Ok(()) => {
                            stats.succeeded += 1;
                            debug!(
                                subsystem = "export",
                                component = "size_sweep",
                                datasource_id = datasource.id,
                                size_total = size_total,
                                size_no_video = size_no_video,
                                "Datasource sizes updated"
                            );
                        }
                        Err(e) => {
                            stats.failed += 1;
                            warn!(
                                subsystem = "export",
                                component = "size_sweep",
                                datasource_id = datasource.id,
                                error = %e,
                                "Failed to persist datasource sizes"
                            );
                        }
                    }
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(
                        subsystem = "export",
                        component = "size_sweep",
                        datasource_id = datasource.id,
                        error = %e,
                        "Failed to measure datasource media"
                    );
                }
            }
        }

        info!(
            subsystem = "export",
            component = "size_sweep",
            op = "sweep",
            succeeded = stats.succeeded,
            failed = stats.failed,
            duration_ms = started.elapsed().as_millis() as u64,
            "Size sweep completed"
        );
        stats
    }

    /// Sum media file sizes for one datasource.
    ///
    /// Returns `(size_total, size_no_video)`. Media shared between nodes is
    /// counted once per datasource; files absent from disk contribute
    /// nothing.
    async fn measure_datasource(&self, datasource_id: i32) -> Result<(i64, i64)> {
        let nodes = self.catalog.nodes_for_datasource(datasource_id).await?;

        let mut counted: HashSet<PathBuf> = HashSet::new();
        let mut image_bytes: i64 = 0;
        let mut video_bytes: i64 = 0;

        for node in &nodes {
            for (media, kind) in self.catalog.media_for_node(node.id).await? {
                let Some(link) = media.internal_link.as_deref() else {
                    continue;
                };
                let path = resolve_media_link(link, self.media_root.as_deref());
                if !counted.insert(path.clone()) {
                    continue;
                }
                let size = match tokio::fs::metadata(&path).await {
                    Ok(meta) if meta.is_file() => meta.len() as i64,
                    _ => {
                        trace!(
                            subsystem = "export",
                            component = "size_sweep",
                            media_id = media.id,
                            "Media file absent during size sweep"
                        );
                        continue;
                    }
                };
                match kind {
                    MediaKind::Image => image_bytes += size,
                    MediaKind::Video => video_bytes += size,
                    MediaKind::Other => {}
                }
            }
        }

        Ok((image_bytes + video_bytes, image_bytes))
    }
}

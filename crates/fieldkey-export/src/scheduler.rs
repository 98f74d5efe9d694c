//! Scheduled export sweeps.
//!
//! The export scheduler periodically walks every datasource and makes sure
//! both snapshot variants exist for its current freshness key, so the first
//! download after an edit does not pay the build. Builds fan out across
//! datasources up to a concurrency cap; the two variants of one datasource
//! stay sequential behind the cache's per-datasource lock.
//!
//! One failing datasource never stops a sweep. Its error is logged, its old
//! artifacts keep serving, and the next sweep retries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use fieldkey_core::{DatasourceCatalog, Error, Result};

use crate::cache::SnapshotCache;
use crate::config::ExportConfig;

/// Handle to a running sweep task.
pub struct SweepHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl SweepHandle {
    pub(crate) fn new(shutdown_tx: mpsc::Sender<()>, task: tokio::task::JoinHandle<()>) -> Self {
        Self { shutdown_tx, task }
    }

    /// Signal shutdown and wait for the sweep task to finish its current
    /// pass and exit.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("sweep task already stopped".to_string()))?;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("sweep task panicked: {}", e)))
    }
}

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub succeeded: usize,
    pub failed: usize,
}

/// Periodic refresher of every datasource's snapshot artifacts.
pub struct ExportScheduler {
    catalog: Arc<dyn DatasourceCatalog>,
    cache: Arc<SnapshotCache>,
    interval: Duration,
    max_concurrent_builds: usize,
}

impl ExportScheduler {
    pub fn new(
        catalog: Arc<dyn DatasourceCatalog>,
        cache: Arc<SnapshotCache>,
        config: &ExportConfig,
    ) -> Self {
        Self {
            catalog,
            cache,
            interval: config.sweep_interval,
            max_concurrent_builds: config.max_concurrent_builds.max(1),
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
            component = "scheduler",
            interval_secs = self.interval.as_secs(),
            max_concurrent_builds = self.max_concurrent_builds,
            "Export sweep scheduler started"
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
            component = "scheduler",
            "Export sweep scheduler stopped"
        );
    }

    /// Run one full pass over all datasources.
    pub async fn sweep_once(&self) -> SweepStats {
        let started = Instant::now();
        let datasources = match self.catalog.all().await {
            Ok(datasources) => datasources,
            Err(e) => {
                warn!(
                    subsystem = "export",
                    component = "scheduler",
                    error = %e,
                    "Could not list datasources; skipping sweep"
                );
                return SweepStats::default();
            }
        };

        debug!(
            subsystem = "export",
            component = "scheduler",
            op = "sweep",
            datasource_count = datasources.len(),
            "Export sweep started"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_builds));
        let mut tasks: JoinSet<(i32, Result<()>)> = JoinSet::new();
        for datasource in datasources {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let cache = Arc::clone(&self.cache);
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = cache.refresh_both(datasource.id).await.map(|_| ());
                (datasource.id, outcome)
            });
        }

        let mut stats = SweepStats::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => stats.succeeded += 1,
                Ok((datasource_id, Err(e))) => {
                    stats.failed += 1;
                    warn!(
                        subsystem = "export",
                        component = "scheduler",
                        datasource_id = datasource_id,
                        error = %e,
                        "Datasource refresh failed; previous artifacts keep serving"
                    );
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(
                        subsystem = "export",
                        component = "scheduler",
                        error = %e,
                        "Refresh task panicked"
                    );
                }
            }
        }

        info!(
            subsystem = "export",
            component = "scheduler",
            op = "sweep",
            succeeded = stats.succeeded,
            failed = stats.failed,
            duration_ms = started.elapsed().as_millis() as u64,
            "Export sweep completed"
        );
        stats
    }
}

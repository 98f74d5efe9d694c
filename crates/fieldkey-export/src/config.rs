//! Export engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use fieldkey_core::{defaults, Error, Result};

/// Configuration for the snapshot cache and the background sweeps.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// MySQL connection string of the source store.
    pub database_url: String,
    /// Directory the versioned artifact directory is created under.
    pub artifact_root: PathBuf,
    /// Deployment version embedded in the artifact directory name.
    ///
    /// Bumping it on a schema change makes the engine start from an empty
    /// directory instead of serving snapshots with the old schema.
    pub deploy_version: String,
    /// SQLite template file each snapshot starts from.
    pub template_path: PathBuf,
    /// Directory relative media links resolve against. Absolute links are
    /// used as stored.
    pub media_root: Option<PathBuf>,
    /// Copyright notice file bundled into every snapshot, if set.
    pub copyright_notice: Option<PathBuf>,
    /// Delay between export sweeps.
    pub sweep_interval: Duration,
    /// Delay between size sweeps.
    pub size_sweep_interval: Duration,
    /// Maximum snapshot builds running concurrently during a sweep.
    pub max_concurrent_builds: usize,
    /// Run builds through the converter binary instead of in process.
    pub use_subprocess: bool,
    /// Path of the converter binary when `use_subprocess` is set.
    pub convert_bin: Option<PathBuf>,
}

impl ExportConfig {
    /// Create a configuration with defaults for everything optional.
    pub fn new(database_url: impl Into<String>, template_path: impl Into<PathBuf>) -> Self {
        Self {
            database_url: database_url.into(),
            artifact_root: std::env::temp_dir(),
            deploy_version: env!("CARGO_PKG_VERSION").to_string(),
            template_path: template_path.into(),
            media_root: None,
            copyright_notice: None,
            sweep_interval: Duration::from_secs(defaults::EXPORT_SWEEP_INTERVAL_SECS),
            size_sweep_interval: Duration::from_secs(defaults::SIZE_SWEEP_INTERVAL_SECS),
            max_concurrent_builds: defaults::MAX_CONCURRENT_BUILDS,
            use_subprocess: false,
            convert_bin: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `FIELDKEY_DATABASE_URL` | (required) | MySQL connection string |
    /// | `FIELDKEY_TEMPLATE_PATH` | (required) | SQLite template schema file |
    /// | `FIELDKEY_ARTIFACT_DIR` | system temp dir | Parent of the artifact directory |
    /// | `FIELDKEY_DEPLOY_VERSION` | crate version | Artifact directory version tag |
    /// | `FIELDKEY_MEDIA_ROOT` | unset | Base directory for relative media links |
    /// | `FIELDKEY_COPYRIGHT_NOTICE` | unset | Notice file bundled into snapshots |
    /// | `FIELDKEY_SWEEP_INTERVAL_SECS` | 900 | Export sweep interval |
    /// | `FIELDKEY_SIZE_SWEEP_INTERVAL_SECS` | 900 | Size sweep interval |
    /// | `FIELDKEY_MAX_CONCURRENT_BUILDS` | 4 | Build fan-out cap per sweep |
    /// | `FIELDKEY_USE_SUBPROCESS` | false | Build via the converter binary |
    /// | `FIELDKEY_CONVERT_BIN` | `fieldkey-convert` | Converter binary path |
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("FIELDKEY_DATABASE_URL")
            .map_err(|_| Error::Config("FIELDKEY_DATABASE_URL is not set".to_string()))?;
        let template_path = std::env::var("FIELDKEY_TEMPLATE_PATH")
            .map_err(|_| Error::Config("FIELDKEY_TEMPLATE_PATH is not set".to_string()))?;

        let mut config = Self::new(database_url, template_path);

        if let Ok(dir) = std::env::var("FIELDKEY_ARTIFACT_DIR") {
            config.artifact_root = PathBuf::from(dir);
        }
        if let Ok(version) = std::env::var("FIELDKEY_DEPLOY_VERSION") {
            config.deploy_version = version;
        }
        config.media_root = std::env::var("FIELDKEY_MEDIA_ROOT").ok().map(PathBuf::from);
        config.copyright_notice = std::env::var("FIELDKEY_COPYRIGHT_NOTICE")
            .ok()
            .map(PathBuf::from);
        config.sweep_interval = Duration::from_secs(
            std::env::var("FIELDKEY_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::EXPORT_SWEEP_INTERVAL_SECS)
                .max(1),
        );
        config.size_sweep_interval = Duration::from_secs(
            std::env::var("FIELDKEY_SIZE_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::SIZE_SWEEP_INTERVAL_SECS)
                .max(1),
        );
        config.max_concurrent_builds = std::env::var("FIELDKEY_MAX_CONCURRENT_BUILDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::MAX_CONCURRENT_BUILDS)
            .max(1);
        config.use_subprocess = std::env::var("FIELDKEY_USE_SUBPROCESS")
            .ok()
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        config.convert_bin = std::env::var("FIELDKEY_CONVERT_BIN").ok().map(PathBuf::from);

        Ok(config)
    }

    /// Set the directory the artifact directory is created under.
    pub fn with_artifact_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.artifact_root = root.into();
        self
    }

    /// Set the deployment version tag.
    pub fn with_deploy_version(mut self, version: impl Into<String>) -> Self {
        self.deploy_version = version.into();
        self
    }

    /// Set the base directory for relative media links.
    pub fn with_media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.media_root = Some(root.into());
        self
    }

    /// Set the copyright notice file.
    pub fn with_copyright_notice(mut self, path: impl Into<PathBuf>) -> Self {
        self.copyright_notice = Some(path.into());
        self
    }

    /// Set the export sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the size sweep interval.
    pub fn with_size_sweep_interval(mut self, interval: Duration) -> Self {
        self.size_sweep_interval = interval;
        self
    }

    /// Set the build fan-out cap (clamped to at least 1).
    pub fn with_max_concurrent_builds(mut self, max: usize) -> Self {
        self.max_concurrent_builds = max.max(1);
        self
    }

    /// Route builds through the converter binary at `bin`.
    pub fn with_subprocess(mut self, bin: impl Into<PathBuf>) -> Self {
        self.use_subprocess = true;
        self.convert_bin = Some(bin.into());
        self
    }
}

//! Converter binary: materializes one snapshot folder and exits.
//!
//! Spawned by the subprocess executor, one invocation per build. Logs go to
//! stderr; the only stdout output is the build summary as a single JSON line,
//! which the parent parses. Exit code 0 means the folder at the target's
//! parent directory is complete; anything else means the build failed and
//! the folder must be discarded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use fieldkey_core::SnapshotSource;
use fieldkey_db::{create_pool, MySqlSnapshotSource};
use fieldkey_export::{BuildRequest, SnapshotBuilder};

#[derive(Parser, Debug)]
#[command(name = "fieldkey-convert", version, about = "Materialize one datasource snapshot folder")]
struct Cli {
    /// Datasource to export.
    datasource_id: i32,

    /// Whether video media keep their bundled files (`true` or `false`).
    #[arg(action = clap::ArgAction::Set)]
    include_videos: bool,

    /// SQLite template schema file.
    template: PathBuf,

    /// Target SQLite file; media files are staged next to it.
    target: PathBuf,

    /// MySQL connection string of the source store. Falls back to
    /// `FIELDKEY_DATABASE_URL`.
    #[arg(long)]
    database_url: Option<String>,

    /// Directory relative media links resolve against.
    #[arg(long)]
    media_root: Option<PathBuf>,

    /// Copyright notice file to bundle into the snapshot.
    #[arg(long)]
    copyright_notice: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fieldkey_export=info,fieldkey_db=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let database_url = cli
        .database_url
        .or_else(|| std::env::var("FIELDKEY_DATABASE_URL").ok())
        .ok_or_else(|| {
            anyhow::anyhow!("--database-url or FIELDKEY_DATABASE_URL must be provided")
        })?;

    let scratch = cli
        .target
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow::anyhow!("target path has no parent directory"))?;

    let pool = create_pool(&database_url).await?;
    let source: Arc<dyn SnapshotSource> = Arc::new(MySqlSnapshotSource::new(pool.clone()));
    let builder = SnapshotBuilder::new(source);

    let request = BuildRequest {
        datasource_id: cli.datasource_id,
        include_videos: cli.include_videos,
        template_path: cli.template,
        media_root: cli.media_root,
        copyright_notice: cli.copyright_notice,
    };

    let summary = builder.build_into(&request, &scratch).await?;
    pool.close().await;

    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

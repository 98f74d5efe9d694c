//! Integration tests for the freshness-keyed artifact cache.

use std::sync::Arc;

use tempfile::TempDir;

use fieldkey_db::create_template;
use fieldkey_export::freshness::artifact_file_name;
use fieldkey_export::test_support::{self, CountingExecutor, FailingExecutor, MemoryStore};
use fieldkey_export::{Error, ExportConfig, SnapshotCache};

struct CacheFixture {
    store: MemoryStore,
    executor: Arc<CountingExecutor>,
    cache: Arc<SnapshotCache>,
    config: ExportConfig,
    _artifact_root: TempDir,
    _template_dir: TempDir,
}

impl CacheFixture {
    async fn new() -> Self {
        let template_dir = TempDir::new().unwrap();
        let template = template_dir.path().join("template.sqlite");
        create_template(&template).await.unwrap();
        let artifact_root = TempDir::new().unwrap();

        let config = ExportConfig::new("mysql://unused/fieldkey", &template)
            .with_artifact_root(artifact_root.path())
            .with_deploy_version("test");

        let store = MemoryStore::new();
        let executor = Arc::new(CountingExecutor::new(Arc::new(store.clone())));
        let cache = Arc::new(
            SnapshotCache::new(Arc::new(store.clone()), executor.clone(), &config).unwrap(),
        );

        Self {
            store,
            executor,
            cache,
            config,
            _artifact_root: artifact_root,
            _template_dir: template_dir,
        }
    }

    fn seed_simple(&self) {
        self.store.add_datasource(test_support::datasource(
            7,
            "Crop pests",
            test_support::stamp(2024, 3, 7, 9, 5, 42),
        ));
        self.store.add_node(test_support::node(10, 7, "Aphid"));
    }

    fn artifact_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.cache.artifact_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

#[tokio::test]
async fn test_first_request_builds_then_serves_cached() {
    let fixture = CacheFixture::new().await;
    fixture.seed_simple();

    let first = fixture.cache.ensure_fresh(7, false).await.unwrap();
    let second = fixture.cache.ensure_fresh(7, false).await.unwrap();

    assert_eq!(first, second);
    assert!(first.is_file());
    assert_eq!(
        first.file_name().unwrap().to_str().unwrap(),
        artifact_file_name(7, "2024-03-07-09-05-42", false)
    );
    assert_eq!(fixture.executor.build_count(), 1);
}

#[tokio::test]
async fn test_variants_are_separate_artifacts() {
    let fixture = CacheFixture::new().await;
    fixture.seed_simple();

    let without = fixture.cache.ensure_fresh(7, false).await.unwrap();
    let with = fixture.cache.ensure_fresh(7, true).await.unwrap();

    assert_ne!(without, with);
    assert!(without.is_file());
    assert!(with.is_file());
    assert_eq!(fixture.executor.build_count(), 2);
}

#[tokio::test]
async fn test_edit_invalidates_and_removes_stale_artifacts() {
    let fixture = CacheFixture::new().await;
    fixture.seed_simple();

    fixture.cache.refresh_both(7).await.unwrap();
    assert_eq!(fixture.executor.build_count(), 2);
    assert_eq!(fixture.artifact_names().len(), 2);

    fixture
        .store
        .touch_datasource(7, test_support::stamp(2024, 3, 8, 10, 0, 0));

    // Rebuilding one variant sweeps out both stale artifacts but spares the
    // (not yet built) sibling name of the new key.
    let rebuilt = fixture.cache.ensure_fresh(7, false).await.unwrap();
    assert_eq!(fixture.executor.build_count(), 3);
    assert_eq!(
        fixture.artifact_names(),
        vec![artifact_file_name(7, "2024-03-08-10-00-00", false)]
    );
    assert!(rebuilt.is_file());

    fixture.cache.ensure_fresh(7, true).await.unwrap();
    assert_eq!(
        fixture.artifact_names(),
        vec![
            artifact_file_name(7, "2024-03-08-10-00-00", false),
            artifact_file_name(7, "2024-03-08-10-00-00", true),
        ]
    );
}

#[tokio::test]
async fn test_cleanup_leaves_other_datasources_alone() {
    let fixture = CacheFixture::new().await;
    fixture.seed_simple();
    fixture.store.add_datasource(test_support::datasource(
        70,
        "Weeds",
        test_support::stamp(2024, 3, 7, 9, 5, 42),
    ));

    fixture.cache.ensure_fresh(70, false).await.unwrap();
    fixture
        .store
        .touch_datasource(7, test_support::stamp(2024, 3, 8, 10, 0, 0));
    fixture.cache.ensure_fresh(7, false).await.unwrap();

    // Datasource 7's cleanup must not claim datasource 70's artifact.
    let names = fixture.artifact_names();
    assert!(names.contains(&artifact_file_name(70, "2024-03-07-09-05-42", false)));
    assert!(names.contains(&artifact_file_name(7, "2024-03-08-10-00-00", false)));
}

#[tokio::test]
async fn test_failed_build_preserves_previous_artifact() {
    let fixture = CacheFixture::new().await;
    fixture.seed_simple();

    let previous = fixture.cache.ensure_fresh(7, false).await.unwrap();
    fixture
        .store
        .touch_datasource(7, test_support::stamp(2024, 3, 8, 10, 0, 0));

    let failing_cache = SnapshotCache::new(
        Arc::new(fixture.store.clone()),
        Arc::new(FailingExecutor),
        &fixture.config,
    )
    .unwrap();

    let result = failing_cache.ensure_fresh(7, false).await;
    assert!(matches!(result, Err(Error::BuildFailed(_))));
    // The stale artifact keeps serving until a build succeeds.
    assert!(previous.is_file());
}

#[tokio::test]
async fn test_unknown_datasource_is_not_found() {
    let fixture = CacheFixture::new().await;

    let result = fixture.cache.ensure_fresh(99, false).await;
    assert!(matches!(result, Err(Error::DatasourceNotFound(99))));
}

#[tokio::test]
async fn test_datasource_without_timestamps_is_rejected() {
    let fixture = CacheFixture::new().await;
    let mut ds = test_support::datasource(7, "No clock", test_support::stamp(2024, 1, 1, 0, 0, 0));
    ds.created_on = None;
    ds.updated_on = None;
    fixture.store.add_datasource(ds);

    let result = fixture.cache.ensure_fresh(7, false).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_concurrent_requests_share_one_build() {
    let fixture = CacheFixture::new().await;
    fixture.seed_simple();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let cache = fixture.cache.clone();
        handles.push(tokio::spawn(async move { cache.ensure_fresh(7, false).await }));
    }

    let mut paths = Vec::new();
    for handle in handles {
        paths.push(handle.await.unwrap().unwrap());
    }

    assert!(paths.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(fixture.executor.build_count(), 1);
}

#[tokio::test]
async fn test_artifact_is_a_readable_archive() {
    let fixture = CacheFixture::new().await;
    fixture.seed_simple();

    let artifact = fixture.cache.ensure_fresh(7, false).await.unwrap();

    let file = std::fs::File::open(&artifact).unwrap();
    let archive = zip::ZipArchive::new(file).unwrap();
    let names: Vec<&str> = archive.file_names().collect();
    assert!(names.contains(&"7.sqlite"));
}

#[tokio::test]
async fn test_no_part_files_remain_after_builds() {
    let fixture = CacheFixture::new().await;
    fixture.seed_simple();

    fixture.cache.refresh_both(7).await.unwrap();

    assert!(fixture
        .artifact_names()
        .iter()
        .all(|name| !name.ends_with(".part")));
}

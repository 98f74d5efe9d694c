//! Integration tests for snapshot builds against an in-memory store.

use std::path::PathBuf;
use std::sync::Arc;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use tempfile::TempDir;

use fieldkey_db::create_template;
use fieldkey_export::test_support::{self, MemoryStore};
use fieldkey_export::{BuildRequest, Datasource, Error, Media, SnapshotBuilder};

struct BuildFixture {
    store: MemoryStore,
    media_dir: TempDir,
    _template_dir: TempDir,
    template: PathBuf,
}

impl BuildFixture {
    async fn new() -> Self {
        let template_dir = TempDir::new().unwrap();
        let template = template_dir.path().join("template.sqlite");
        create_template(&template).await.unwrap();
        Self {
            store: MemoryStore::new(),
            media_dir: TempDir::new().unwrap(),
            _template_dir: template_dir,
            template,
        }
    }

    fn media_file(&self, name: &str, content: &str) -> String {
        let path = self.media_dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path.to_str().unwrap().to_string()
    }

    /// One datasource with a parent and child node. The parent carries an
    /// image and a video; one attribute value, one relationship, one
    /// similarity. A second attribute exists but is valued on no node.
    fn seed_worked_example(&self) {
        let store = &self.store;
        store.add_datasource(test_support::datasource(
            7,
            "Crop pests",
            test_support::stamp(2024, 3, 7, 9, 5, 42),
        ));
        store.add_node(test_support::node(10, 7, "Aphid"));
        store.add_node(test_support::node(11, 7, "Black bean aphid"));
        store.add_relationship(test_support::relationship(1, 10, 11));
        store.add_similarity(test_support::similarity(1, 10, 11));

        store.add_attribute(test_support::attribute(5, "Host plants"));
        store.add_attribute(test_support::attribute(6, "Unused"));
        store.add_attribute_value(test_support::attribute_value(50, 10, 5, "Beans"));

        store.add_media_type(test_support::media_type(1, "Image"));
        store.add_media_type(test_support::media_type(2, "Video"));

        let leaf = self.media_file("leaf.jpg", "jpeg bytes");
        store.add_media(test_support::media(30, 1, "leaf", Some(&leaf)));
        let clip_path = self.media_file("clip.mp4", "video bytes");
        let mut clip = test_support::media(31, 2, "clip", Some(&clip_path));
        clip.external_link = Some("https://example.org/clip".to_string());
        store.add_media(clip);

        store.add_node_media(test_support::node_media(1, 10, 30));
        store.add_node_media(test_support::node_media(2, 10, 31));
    }

    fn builder(&self) -> SnapshotBuilder {
        SnapshotBuilder::new(Arc::new(self.store.clone()))
    }

    fn request(&self, include_videos: bool) -> BuildRequest {
        BuildRequest::new(7, include_videos, &self.template)
    }
}

async fn open_snapshot(scratch: &TempDir) -> SqliteConnection {
    let options = SqliteConnectOptions::new().filename(scratch.path().join("7.sqlite"));
    SqliteConnection::connect_with(&options).await.unwrap()
}

async fn count(conn: &mut SqliteConnection, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(conn)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_no_videos_variant_nulls_video_link_and_skips_file() {
    let fixture = BuildFixture::new().await;
    fixture.seed_worked_example();
    let scratch = TempDir::new().unwrap();

    let summary = fixture
        .builder()
        .build_into(&fixture.request(false), scratch.path())
        .await
        .unwrap();

    assert_eq!(summary.nodes, 2);
    assert_eq!(summary.media, 2);
    assert_eq!(summary.relationships, 1);
    assert_eq!(summary.similarities, 1);
    assert_eq!(summary.files_bundled, 1);
    assert_eq!(summary.files_missing, 0);

    // The folder holds the database and the image only.
    assert!(scratch.path().join("7.sqlite").is_file());
    assert!(scratch.path().join("leaf.jpg").is_file());
    assert!(!scratch.path().join("clip.mp4").exists());

    let mut conn = open_snapshot(&scratch).await;
    assert_eq!(count(&mut conn, "nodes").await, 2);
    assert_eq!(count(&mut conn, "media").await, 2);
    assert_eq!(count(&mut conn, "relationships").await, 1);
    assert_eq!(count(&mut conn, "similarities").await, 1);

    let image: Media = sqlx::query_as("SELECT * FROM media WHERE id = 30")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(image.internal_link.as_deref(), Some("leaf.jpg"));

    // The video row survives with all its data except the bundled file.
    let video: Media = sqlx::query_as("SELECT * FROM media WHERE id = 31")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(video.internal_link, None);
    assert_eq!(video.name, "clip");
    assert_eq!(video.external_link.as_deref(), Some("https://example.org/clip"));
}

#[tokio::test]
async fn test_with_videos_variant_bundles_both_files() {
    let fixture = BuildFixture::new().await;
    fixture.seed_worked_example();
    let scratch = TempDir::new().unwrap();

    let summary = fixture
        .builder()
        .build_into(&fixture.request(true), scratch.path())
        .await
        .unwrap();

    assert_eq!(summary.files_bundled, 2);
    assert!(scratch.path().join("leaf.jpg").is_file());
    assert!(scratch.path().join("clip.mp4").is_file());

    let mut conn = open_snapshot(&scratch).await;
    let video: Media = sqlx::query_as("SELECT * FROM media WHERE id = 31")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(video.internal_link.as_deref(), Some("clip.mp4"));
}

#[tokio::test]
async fn test_closure_excludes_other_datasources() {
    let fixture = BuildFixture::new().await;
    fixture.seed_worked_example();
    // A second datasource and an edge reaching into it.
    fixture.store.add_datasource(test_support::datasource(
        8,
        "Weeds",
        test_support::stamp(2024, 3, 7, 9, 5, 42),
    ));
    fixture.store.add_node(test_support::node(20, 8, "Thistle"));
    fixture
        .store
        .add_relationship(test_support::relationship(2, 10, 20));
    fixture
        .store
        .add_similarity(test_support::similarity(2, 10, 20));
    let scratch = TempDir::new().unwrap();

    fixture
        .builder()
        .build_into(&fixture.request(false), scratch.path())
        .await
        .unwrap();

    let mut conn = open_snapshot(&scratch).await;
    assert_eq!(count(&mut conn, "nodes").await, 2);
    // Edges with an endpoint outside the closure are dropped.
    assert_eq!(count(&mut conn, "relationships").await, 1);
    assert_eq!(count(&mut conn, "similarities").await, 1);
    let foreign: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes WHERE id = 20")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(foreign, 0);
}

#[tokio::test]
async fn test_only_valued_attributes_are_copied() {
    let fixture = BuildFixture::new().await;
    fixture.seed_worked_example();
    let scratch = TempDir::new().unwrap();

    let summary = fixture
        .builder()
        .build_into(&fixture.request(false), scratch.path())
        .await
        .unwrap();

    assert_eq!(summary.attributes, 1);
    assert_eq!(summary.attribute_values, 1);

    let mut conn = open_snapshot(&scratch).await;
    let name: String = sqlx::query_scalar("SELECT name FROM attributes")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(name, "Host plants");
}

#[tokio::test]
async fn test_absent_media_file_is_nonfatal() {
    let fixture = BuildFixture::new().await;
    fixture.seed_worked_example();
    fixture
        .store
        .add_media(test_support::media(32, 1, "gone", Some("/nonexistent/gone.jpg")));
    fixture
        .store
        .add_node_media(test_support::node_media(3, 11, 32));
    let scratch = TempDir::new().unwrap();

    let summary = fixture
        .builder()
        .build_into(&fixture.request(false), scratch.path())
        .await
        .unwrap();

    assert_eq!(summary.media, 3);
    assert_eq!(summary.files_bundled, 1);
    assert_eq!(summary.files_missing, 1);

    let mut conn = open_snapshot(&scratch).await;
    let gone: Media = sqlx::query_as("SELECT * FROM media WHERE id = 32")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(gone.internal_link, None);
    assert_eq!(gone.name, "gone");
}

#[tokio::test]
async fn test_unknown_datasource_is_not_found() {
    let fixture = BuildFixture::new().await;
    let scratch = TempDir::new().unwrap();

    let request = BuildRequest::new(99, false, &fixture.template);
    let result = fixture.builder().build_into(&request, scratch.path()).await;
    assert!(matches!(result, Err(Error::DatasourceNotFound(99))));
}

#[tokio::test]
async fn test_missing_template_fails_the_build() {
    let fixture = BuildFixture::new().await;
    fixture.seed_worked_example();
    let scratch = TempDir::new().unwrap();

    let request = BuildRequest::new(7, false, "/nonexistent/template.sqlite");
    let result = fixture.builder().build_into(&request, scratch.path()).await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_empty_datasource_builds_valid_snapshot() {
    let fixture = BuildFixture::new().await;
    fixture.store.add_datasource(test_support::datasource(
        7,
        "Empty",
        test_support::stamp(2024, 3, 7, 9, 5, 42),
    ));
    let scratch = TempDir::new().unwrap();

    let summary = fixture
        .builder()
        .build_into(&fixture.request(false), scratch.path())
        .await
        .unwrap();

    assert_eq!(summary.nodes, 0);
    assert_eq!(summary.media, 0);

    let mut conn = open_snapshot(&scratch).await;
    assert_eq!(count(&mut conn, "datasources").await, 1);
    assert_eq!(count(&mut conn, "nodes").await, 0);
    assert_eq!(count(&mut conn, "media").await, 0);
}

#[tokio::test]
async fn test_icon_and_notice_are_bundled() {
    let fixture = BuildFixture::new().await;
    let icon = fixture.media_file("icon.png", "png bytes");
    let mut ds = test_support::datasource(7, "Crop pests", test_support::stamp(2024, 3, 7, 9, 5, 42));
    ds.icon = Some(icon);
    fixture.store.add_datasource(ds);

    let notice_dir = TempDir::new().unwrap();
    let notice = notice_dir.path().join("legal.txt");
    std::fs::write(&notice, "all rights reserved").unwrap();
    let scratch = TempDir::new().unwrap();

    let mut request = fixture.request(false);
    request.copyright_notice = Some(notice);
    fixture
        .builder()
        .build_into(&request, scratch.path())
        .await
        .unwrap();

    assert!(scratch.path().join("icon.png").is_file());
    assert_eq!(
        std::fs::read_to_string(scratch.path().join("NOTICE.txt")).unwrap(),
        "all rights reserved"
    );

    let mut conn = open_snapshot(&scratch).await;
    let row: Datasource = sqlx::query_as("SELECT * FROM datasources WHERE id = 7")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(row.icon.as_deref(), Some("icon.png"));
}

#[tokio::test]
async fn test_absent_icon_is_nulled() {
    let fixture = BuildFixture::new().await;
    let mut ds = test_support::datasource(7, "Crop pests", test_support::stamp(2024, 3, 7, 9, 5, 42));
    ds.icon = Some("/nonexistent/icon.png".to_string());
    fixture.store.add_datasource(ds);
    let scratch = TempDir::new().unwrap();

    fixture
        .builder()
        .build_into(&fixture.request(false), scratch.path())
        .await
        .unwrap();

    let mut conn = open_snapshot(&scratch).await;
    let row: Datasource = sqlx::query_as("SELECT * FROM datasources WHERE id = 7")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(row.icon, None);
}

//! In-memory fixtures for export engine tests.
//!
//! Provides a shared in-memory store implementing both source seams, plus
//! instrumented executors, so builds, cache behavior, and sweeps can be
//! tested without a MySQL instance.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fieldkey_export::test_support::{self, MemoryStore};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let store = MemoryStore::new();
//!     store.add_datasource(test_support::datasource(7, "Crop pests", test_support::stamp(2024, 3, 7, 9, 5, 42)));
//!     store.add_node(test_support::node(10, 7, "Aphid"));
//!
//!     // Run your tests...
//! }
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use fieldkey_core::{
    Attribute, AttributeValue, Datasource, DatasourceCatalog, Error, Media, MediaKind, MediaType,
    Node, NodeMedia, Relationship, Result, Similarity, SnapshotSource, SnapshotSummary,
};

use crate::builder::BuildRequest;
use crate::executor::{BuildExecutor, InProcessExecutor};

#[derive(Default)]
struct StoreData {
    datasources: Vec<Datasource>,
    nodes: Vec<Node>,
    attributes: Vec<Attribute>,
    attribute_values: Vec<AttributeValue>,
    media_types: Vec<MediaType>,
    media: Vec<Media>,
    node_media: Vec<NodeMedia>,
    relationships: Vec<Relationship>,
    similarities: Vec<Similarity>,
    size_updates: Vec<(i32, i64, i64)>,
}

/// In-memory store backing both [`SnapshotSource`] and [`DatasourceCatalog`].
///
/// Cloning shares the underlying data, so a test can keep one handle for
/// seeding and mutation while the engine holds another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, StoreData> {
        self.inner.lock().expect("store mutex poisoned")
    }

    pub fn add_datasource(&self, row: Datasource) {
        self.data().datasources.push(row);
    }

    pub fn add_node(&self, row: Node) {
        self.data().nodes.push(row);
    }

    pub fn add_attribute(&self, row: Attribute) {
        self.data().attributes.push(row);
    }

    pub fn add_attribute_value(&self, row: AttributeValue) {
        self.data().attribute_values.push(row);
    }

    pub fn add_media_type(&self, row: MediaType) {
        self.data().media_types.push(row);
    }

    pub fn add_media(&self, row: Media) {
        self.data().media.push(row);
    }

    pub fn add_node_media(&self, row: NodeMedia) {
        self.data().node_media.push(row);
    }

    pub fn add_relationship(&self, row: Relationship) {
        self.data().relationships.push(row);
    }

    pub fn add_similarity(&self, row: Similarity) {
        self.data().similarities.push(row);
    }

    /// Move a datasource's `updated_on` forward, changing its freshness key.
    pub fn touch_datasource(&self, datasource_id: i32, timestamp: NaiveDateTime) {
        let mut data = self.data();
        if let Some(row) = data.datasources.iter_mut().find(|d| d.id == datasource_id) {
            row.updated_on = Some(timestamp);
        }
    }

    /// Size updates recorded through [`DatasourceCatalog::update_sizes`],
    /// in call order.
    pub fn size_updates(&self) -> Vec<(i32, i64, i64)> {
        self.data().size_updates.clone()
    }
}

#[async_trait]
impl SnapshotSource for MemoryStore {
    async fn datasource(&self, datasource_id: i32) -> Result<Option<Datasource>> {
        Ok(self
            .data()
            .datasources
            .iter()
            .find(|d| d.id == datasource_id)
            .cloned())
    }

    async fn nodes(&self, datasource_id: i32) -> Result<Vec<Node>> {
        Ok(self
            .data()
            .nodes
            .iter()
            .filter(|n| n.datasource_id == datasource_id)
            .cloned()
            .collect())
    }

    async fn attributes(&self, node_ids: &[i32]) -> Result<Vec<Attribute>> {
        let data = self.data();
        Ok(data
            .attributes
            .iter()
            .filter(|a| {
                data.attribute_values
                    .iter()
                    .any(|av| av.attribute_id == a.id && node_ids.contains(&av.node_id))
            })
            .cloned()
            .collect())
    }

    async fn attribute_values(
        &self,
        node_ids: &[i32],
        attribute_ids: &[i32],
    ) -> Result<Vec<AttributeValue>> {
        Ok(self
            .data()
            .attribute_values
            .iter()
            .filter(|av| {
                node_ids.contains(&av.node_id) && attribute_ids.contains(&av.attribute_id)
            })
            .cloned()
            .collect())
    }

    async fn media_types(&self, node_ids: &[i32]) -> Result<Vec<MediaType>> {
        let data = self.data();
        let attached_type_ids: Vec<i32> = data
            .media
            .iter()
            .filter(|m| {
                data.node_media
                    .iter()
                    .any(|nm| nm.media_id == m.id && node_ids.contains(&nm.node_id))
            })
            .map(|m| m.mediatype_id)
            .collect();
        Ok(data
            .media_types
            .iter()
            .filter(|mt| attached_type_ids.contains(&mt.id))
            .cloned()
            .collect())
    }

    async fn media(&self, node_ids: &[i32], media_type_ids: &[i32]) -> Result<Vec<Media>> {
        let data = self.data();
        Ok(data
            .media
            .iter()
            .filter(|m| {
                media_type_ids.contains(&m.mediatype_id)
                    && data
                        .node_media
                        .iter()
                        .any(|nm| nm.media_id == m.id && node_ids.contains(&nm.node_id))
            })
            .cloned()
            .collect())
    }

    async fn node_media(&self, node_ids: &[i32], media_ids: &[i32]) -> Result<Vec<NodeMedia>> {
        Ok(self
            .data()
            .node_media
            .iter()
            .filter(|nm| node_ids.contains(&nm.node_id) && media_ids.contains(&nm.media_id))
            .cloned()
            .collect())
    }

    async fn relationships(&self, node_ids: &[i32]) -> Result<Vec<Relationship>> {
        Ok(self
            .data()
            .relationships
            .iter()
            .filter(|r| node_ids.contains(&r.parent) && node_ids.contains(&r.child))
            .cloned()
            .collect())
    }

    async fn similarities(&self, node_ids: &[i32]) -> Result<Vec<Similarity>> {
        Ok(self
            .data()
            .similarities
            .iter()
            .filter(|s| node_ids.contains(&s.node_a_id) && node_ids.contains(&s.node_b_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DatasourceCatalog for MemoryStore {
    async fn all(&self) -> Result<Vec<Datasource>> {
        Ok(self.data().datasources.clone())
    }

    async fn by_id(&self, datasource_id: i32) -> Result<Option<Datasource>> {
        Ok(self
            .data()
            .datasources
            .iter()
            .find(|d| d.id == datasource_id)
            .cloned())
    }

    async fn nodes_for_datasource(&self, datasource_id: i32) -> Result<Vec<Node>> {
        Ok(self
            .data()
            .nodes
            .iter()
            .filter(|n| n.datasource_id == datasource_id)
            .cloned()
            .collect())
    }

    async fn media_for_node(&self, node_id: i32) -> Result<Vec<(Media, MediaKind)>> {
        let data = self.data();
        Ok(data
            .node_media
            .iter()
            .filter(|nm| nm.node_id == node_id)
            .filter_map(|nm| data.media.iter().find(|m| m.id == nm.media_id))
            .map(|m| {
                let kind = data
                    .media_types
                    .iter()
                    .find(|mt| mt.id == m.mediatype_id)
                    .map(|mt| mt.kind())
                    .unwrap_or(MediaKind::Other);
                (m.clone(), kind)
            })
            .collect())
    }

    async fn update_sizes(
        &self,
        datasource_id: i32,
        size_total: i64,
        size_no_video: i64,
    ) -> Result<()> {
        let mut data = self.data();
        if let Some(row) = data.datasources.iter_mut().find(|d| d.id == datasource_id) {
            row.size_total = size_total;
            row.size_no_video = size_no_video;
        }
        data.size_updates
            .push((datasource_id, size_total, size_no_video));
        Ok(())
    }
}

// =============================================================================
// ROW BUILDERS
// =============================================================================

pub fn stamp(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .expect("valid date")
        .and_hms_opt(h, mi, s)
        .expect("valid time")
}

pub fn datasource(id: i32, name: &str, updated_on: NaiveDateTime) -> Datasource {
    Datasource {
        id,
        name: name.to_string(),
        description: None,
        version_number: 1,
        data_provider: None,
        contact: None,
        show_key_name: true,
        icon: None,
        size_total: 0,
        size_no_video: 0,
        visible: true,
        created_on: Some(updated_on),
        updated_on: Some(updated_on),
    }
}

pub fn node(id: i32, datasource_id: i32, name: &str) -> Node {
    Node {
        id,
        datasource_id,
        name: name.to_string(),
        description: None,
        created_on: None,
        updated_on: None,
    }
}

pub fn attribute(id: i32, name: &str) -> Attribute {
    Attribute {
        id,
        name: name.to_string(),
        created_on: None,
        updated_on: None,
    }
}

pub fn attribute_value(id: i32, node_id: i32, attribute_id: i32, value: &str) -> AttributeValue {
    AttributeValue {
        id,
        node_id,
        attribute_id,
        value: Some(value.to_string()),
        created_on: None,
        updated_on: None,
    }
}

pub fn media_type(id: i32, name: &str) -> MediaType {
    MediaType {
        id,
        name: name.to_string(),
        created_on: None,
        updated_on: None,
    }
}

pub fn media(id: i32, mediatype_id: i32, name: &str, internal_link: Option<&str>) -> Media {
    Media {
        id,
        mediatype_id,
        name: name.to_string(),
        description: None,
        internal_link: internal_link.map(|l| l.to_string()),
        external_link: None,
        external_link_description: None,
        copyright: None,
        created_on: None,
        updated_on: None,
    }
}

pub fn node_media(id: i32, node_id: i32, media_id: i32) -> NodeMedia {
    NodeMedia {
        id,
        node_id,
        media_id,
        created_on: None,
        updated_on: None,
    }
}

pub fn relationship(id: i32, parent: i32, child: i32) -> Relationship {
    Relationship {
        id,
        parent,
        child,
        created_on: None,
        updated_on: None,
    }
}

pub fn similarity(id: i32, node_a_id: i32, node_b_id: i32) -> Similarity {
    Similarity {
        id,
        node_a_id,
        node_b_id,
        created_on: None,
        updated_on: None,
    }
}

// =============================================================================
// INSTRUMENTED EXECUTORS
// =============================================================================

/// In-process executor that counts how many builds actually ran.
pub struct CountingExecutor {
    inner: InProcessExecutor,
    builds: AtomicUsize,
}

impl CountingExecutor {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            inner: InProcessExecutor::new(source),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildExecutor for CountingExecutor {
    async fn execute(&self, request: &BuildRequest, scratch: &Path) -> Result<SnapshotSummary> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(request, scratch).await
    }
}

/// Executor whose every build fails.
pub struct FailingExecutor;

#[async_trait]
impl BuildExecutor for FailingExecutor {
    async fn execute(&self, request: &BuildRequest, _scratch: &Path) -> Result<SnapshotSummary> {
        Err(Error::BuildFailed(format!(
            "forced failure for datasource {}",
            request.datasource_id
        )))
    }
}

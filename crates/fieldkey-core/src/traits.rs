//! Core traits for the fieldkey export engine.
//!
//! These traits define the interfaces the engine needs from the primary
//! store, enabling pluggable backends and testability. The engine never
//! issues SQL against the source directly; everything flows through these
//! two seams.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// SNAPSHOT SOURCE
// =============================================================================

/// Read access to the closure of one datasource in the primary store.
///
/// Each method fetches exactly the rows of one table reachable from the
/// supplied id sets; the caller drives the fixed dependency order
/// (datasource → nodes → attributes → attribute values → media types →
/// media → node media → relationships → similarities) and feeds each step's
/// returned ids into the next. Implementations MUST return an empty vec,
/// without touching the store, whenever any required id set is empty.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// The closure root: one datasource row by id.
    async fn datasource(&self, datasource_id: i32) -> Result<Option<Datasource>>;

    /// All nodes belonging to the datasource.
    async fn nodes(&self, datasource_id: i32) -> Result<Vec<Node>>;

    /// Attributes referenced by at least one attribute value on the given nodes.
    async fn attributes(&self, node_ids: &[i32]) -> Result<Vec<Attribute>>;

    /// Attribute values restricted to the given node and attribute id sets.
    async fn attribute_values(
        &self,
        node_ids: &[i32],
        attribute_ids: &[i32],
    ) -> Result<Vec<AttributeValue>>;

    /// Media types used by media attached to the given nodes.
    async fn media_types(&self, node_ids: &[i32]) -> Result<Vec<MediaType>>;

    /// Media attached to the given nodes, restricted to the given media types.
    async fn media(&self, node_ids: &[i32], media_type_ids: &[i32]) -> Result<Vec<Media>>;

    /// Node-media join rows restricted to the given node and media id sets.
    async fn node_media(&self, node_ids: &[i32], media_ids: &[i32]) -> Result<Vec<NodeMedia>>;

    /// Relationships whose parent and child are both in the given node set.
    async fn relationships(&self, node_ids: &[i32]) -> Result<Vec<Relationship>>;

    /// Similarities whose endpoints are both in the given node set.
    async fn similarities(&self, node_ids: &[i32]) -> Result<Vec<Similarity>>;
}

// =============================================================================
// DATASOURCE CATALOG
// =============================================================================

/// Catalog-level access to datasources, used by the sweeps and the cache.
///
/// Distinct from [`SnapshotSource`]: the catalog answers "what exists and
/// when did it change", the source feeds row data into one build. The size
/// sweep also writes back through this trait.
#[async_trait]
pub trait DatasourceCatalog: Send + Sync {
    /// All datasources, visible or not. Hidden datasources still get
    /// artifacts; visibility only affects listing in the client API.
    async fn all(&self) -> Result<Vec<Datasource>>;

    /// One datasource by id.
    async fn by_id(&self, datasource_id: i32) -> Result<Option<Datasource>>;

    /// All nodes of one datasource (size sweep input).
    async fn nodes_for_datasource(&self, datasource_id: i32) -> Result<Vec<Node>>;

    /// All media attached to one node, paired with their kind.
    async fn media_for_node(&self, node_id: i32) -> Result<Vec<(Media, MediaKind)>>;

    /// Persist recomputed byte sizes for one datasource.
    async fn update_sizes(&self, datasource_id: i32, size_total: i64, size_no_video: i64)
        -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trait objects are passed across tasks by the scheduler; both seams
    // must stay object-safe and Send + Sync.
    #[test]
    fn test_traits_are_object_safe() {
        fn assert_source(_: Option<&dyn SnapshotSource>) {}
        fn assert_catalog(_: Option<&dyn DatasourceCatalog>) {}
        assert_source(None);
        assert_catalog(None);
    }
}

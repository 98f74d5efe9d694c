//! MySQL implementation of the snapshot closure source.
//!
//! Each fetch mirrors one step of the fixed closure chain. Id sets are bound
//! through [`sqlx::QueryBuilder`] so every id travels as a real bind
//! parameter; the SQL text never contains a value. Empty id sets return
//! empty results without touching the store: `IN ()` is not valid SQL and
//! could only ever match nothing anyway.

use async_trait::async_trait;
use sqlx::mysql::MySql;
use sqlx::{MySqlPool, QueryBuilder};

use fieldkey_core::{
    Attribute, AttributeValue, Datasource, Error, Media, MediaType, Node, NodeMedia, Relationship,
    Result, Similarity, SnapshotSource,
};

/// MySQL implementation of [`SnapshotSource`].
pub struct MySqlSnapshotSource {
    pool: MySqlPool,
}

impl MySqlSnapshotSource {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Append a parenthesized, fully bound id list: `(?, ?, ?)`.
fn push_id_list(qb: &mut QueryBuilder<'static, MySql>, ids: &[i32]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

fn attributes_query(node_ids: &[i32]) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new(
        "SELECT * FROM attributes WHERE EXISTS (SELECT 1 FROM attributevalues \
         WHERE attributevalues.attribute_id = attributes.id AND attributevalues.node_id IN ",
    );
    push_id_list(&mut qb, node_ids);
    qb.push(")");
    qb
}

fn attribute_values_query(node_ids: &[i32], attribute_ids: &[i32]) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new("SELECT * FROM attributevalues WHERE node_id IN ");
    push_id_list(&mut qb, node_ids);
    qb.push(" AND attribute_id IN ");
    push_id_list(&mut qb, attribute_ids);
    qb
}

fn media_types_query(node_ids: &[i32]) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new(
        "SELECT * FROM mediatypes WHERE EXISTS (SELECT 1 FROM media \
         LEFT JOIN nodemedia ON nodemedia.media_id = media.id \
         WHERE media.mediatype_id = mediatypes.id AND nodemedia.node_id IN ",
    );
    push_id_list(&mut qb, node_ids);
    qb.push(")");
    qb
}

fn media_query(node_ids: &[i32], media_type_ids: &[i32]) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new(
        "SELECT * FROM media WHERE EXISTS (SELECT 1 FROM nodemedia \
         WHERE nodemedia.media_id = media.id AND nodemedia.node_id IN ",
    );
    push_id_list(&mut qb, node_ids);
    qb.push(") AND media.mediatype_id IN ");
    push_id_list(&mut qb, media_type_ids);
    qb
}

fn node_media_query(node_ids: &[i32], media_ids: &[i32]) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new("SELECT * FROM nodemedia WHERE node_id IN ");
    push_id_list(&mut qb, node_ids);
    qb.push(" AND media_id IN ");
    push_id_list(&mut qb, media_ids);
    qb
}

fn relationships_query(node_ids: &[i32]) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new("SELECT * FROM relationships WHERE parent IN ");
    push_id_list(&mut qb, node_ids);
    qb.push(" AND child IN ");
    push_id_list(&mut qb, node_ids);
    qb
}

fn similarities_query(node_ids: &[i32]) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new("SELECT * FROM similarities WHERE node_a_id IN ");
    push_id_list(&mut qb, node_ids);
    qb.push(" AND node_b_id IN ");
    push_id_list(&mut qb, node_ids);
    qb
}

#[async_trait]
impl SnapshotSource for MySqlSnapshotSource {
    async fn datasource(&self, datasource_id: i32) -> Result<Option<Datasource>> {
        sqlx::query_as::<_, Datasource>("SELECT * FROM datasources WHERE id = ?")
            .bind(datasource_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn nodes(&self, datasource_id: i32) -> Result<Vec<Node>> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE datasource_id = ?")
            .bind(datasource_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn attributes(&self, node_ids: &[i32]) -> Result<Vec<Attribute>> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }
        attributes_query(node_ids)
            .build_query_as::<Attribute>()
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn attribute_values(
        &self,
        node_ids: &[i32],
        attribute_ids: &[i32],
    ) -> Result<Vec<AttributeValue>> {
        if node_ids.is_empty() || attribute_ids.is_empty() {
            return Ok(Vec::new());
        }
        attribute_values_query(node_ids, attribute_ids)
            .build_query_as::<AttributeValue>()
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn media_types(&self, node_ids: &[i32]) -> Result<Vec<MediaType>> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }
        media_types_query(node_ids)
            .build_query_as::<MediaType>()
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn media(&self, node_ids: &[i32], media_type_ids: &[i32]) -> Result<Vec<Media>> {
        if node_ids.is_empty() || media_type_ids.is_empty() {
            return Ok(Vec::new());
        }
        media_query(node_ids, media_type_ids)
            .build_query_as::<Media>()
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn node_media(&self, node_ids: &[i32], media_ids: &[i32]) -> Result<Vec<NodeMedia>> {
        if node_ids.is_empty() || media_ids.is_empty() {
            return Ok(Vec::new());
        }
        node_media_query(node_ids, media_ids)
            .build_query_as::<NodeMedia>()
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn relationships(&self, node_ids: &[i32]) -> Result<Vec<Relationship>> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }
        relationships_query(node_ids)
            .build_query_as::<Relationship>()
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn similarities(&self, node_ids: &[i32]) -> Result<Vec<Similarity>> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }
        similarities_query(node_ids)
            .build_query_as::<Similarity>()
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }
}

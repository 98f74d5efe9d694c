//! Datasource catalog repository implementation.

use async_trait::async_trait;
use sqlx::{MySqlPool, Row};

use fieldkey_core::{
    Datasource, DatasourceCatalog, Error, Media, MediaKind, Node, Result,
};

/// MySQL implementation of [`DatasourceCatalog`].
pub struct MySqlDatasourceCatalog {
    pool: MySqlPool,
}

impl MySqlDatasourceCatalog {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Parse one joined media row into the media record plus its kind.
    fn parse_media_row(row: sqlx::mysql::MySqlRow) -> (Media, MediaKind) {
        let media = Media {
            id: row.get("id"),
            mediatype_id: row.get("mediatype_id"),
            name: row.get("name"),
            description: row.get("description"),
            internal_link: row.get("internal_link"),
            external_link: row.get("external_link"),
            external_link_description: row.get("external_link_description"),
            copyright: row.get("copyright"),
            created_on: row.get("created_on"),
            updated_on: row.get("updated_on"),
        };
        let kind = row
            .get::<Option<String>, _>("mediatype_name")
            .map(|name| MediaKind::from_name(&name))
            .unwrap_or(MediaKind::Other);
        (media, kind)
    }
}

#[async_trait]
impl DatasourceCatalog for MySqlDatasourceCatalog {
    async fn all(&self) -> Result<Vec<Datasource>> {
        sqlx::query_as::<_, Datasource>("SELECT * FROM datasources")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn by_id(&self, datasource_id: i32) -> Result<Option<Datasource>> {
        sqlx::query_as::<_, Datasource>("SELECT * FROM datasources WHERE id = ?")
            .bind(datasource_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn nodes_for_datasource(&self, datasource_id: i32) -> Result<Vec<Node>> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE datasource_id = ?")
            .bind(datasource_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn media_for_node(&self, node_id: i32) -> Result<Vec<(Media, MediaKind)>> {
        let rows = sqlx::query(
            "SELECT media.*, mediatypes.name AS mediatype_name FROM media \
             LEFT JOIN mediatypes ON mediatypes.id = media.mediatype_id \
             WHERE EXISTS (SELECT 1 FROM nodemedia \
             WHERE nodemedia.media_id = media.id AND nodemedia.node_id = ?)",
        )
        .bind(node_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_media_row).collect())
    }

    async fn update_sizes(
        &self,
        datasource_id: i32,
        size_total: i64,
        size_no_video: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE datasources SET size_total = ?, size_no_video = ? WHERE id = ?")
            .bind(size_total)
            .bind(size_no_video)
            .bind(datasource_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

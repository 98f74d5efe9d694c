//! Snapshot target writer.
//!
//! A snapshot target is one freshly materialized SQLite file. It starts as a
//! byte copy of the template schema file, and the builder then fills it table
//! by table. Each table is written inside its own transaction: a crash mid
//! copy never leaves a partially written table, and since the whole file is
//! rebuilt from scratch on the next attempt, nothing finer-grained is needed.

use std::path::{Path, PathBuf};

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use tokio::fs;
use tracing::debug;

use fieldkey_core::{
    Attribute, AttributeValue, Datasource, Error, Media, MediaType, Node, NodeMedia, Relationship,
    Result, Similarity,
};

/// Write half of one snapshot build.
pub struct SqliteSnapshotTarget {
    conn: SqliteConnection,
    path: PathBuf,
}

impl SqliteSnapshotTarget {
    /// Copy `template` to `target` and open the copy for writing.
    ///
    /// A missing or unreadable template is fatal to the build: without the
    /// schema there is nothing meaningful to produce.
    pub async fn create_from_template(template: &Path, target: &Path) -> Result<Self> {
        if !template.is_file() {
            return Err(Error::Config(format!(
                "template schema file missing: {}",
                template.display()
            )));
        }

        fs::copy(template, target).await?;

        let options = SqliteConnectOptions::new()
            .filename(target)
            .create_if_missing(false);
        let conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "target",
            op = "open",
            target = %target.display(),
            "Snapshot target opened from template"
        );

        Ok(Self {
            conn,
            path: target.to_path_buf(),
        })
    }

    /// Path of the target file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn insert_datasource(&mut self, row: &Datasource) -> Result<()> {
        let mut tx = self.conn.begin().await.map_err(Error::Database)?;
        sqlx::query(
            "INSERT INTO datasources (id, name, description, version_number, data_provider, \
             contact, show_key_name, icon, size_total, size_no_video, visible, created_on, \
             updated_on) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(row.id)
        .bind(&row.name)
        .bind(&row.description)
        .bind(row.version_number)
        .bind(&row.data_provider)
        .bind(&row.contact)
        .bind(row.show_key_name)
        .bind(&row.icon)
        .bind(row.size_total)
        .bind(row.size_no_video)
        .bind(row.visible)
        .bind(row.created_on)
        .bind(row.updated_on)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;
        self.log_copied("datasources", 1);
        Ok(())
    }

    pub async fn insert_nodes(&mut self, rows: &[Node]) -> Result<()> {
        let mut tx = self.conn.begin().await.map_err(Error::Database)?;
        for row in rows {
            sqlx::query(
                "INSERT INTO nodes (id, datasource_id, name, description, created_on, updated_on) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(row.datasource_id)
            .bind(&row.name)
            .bind(&row.description)
            .bind(row.created_on)
            .bind(row.updated_on)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        self.log_copied("nodes", rows.len());
        Ok(())
    }

    pub async fn insert_attributes(&mut self, rows: &[Attribute]) -> Result<()> {
        let mut tx = self.conn.begin().await.map_err(Error::Database)?;
        for row in rows {
            sqlx::query(
                "INSERT INTO attributes (id, name, created_on, updated_on) VALUES (?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(&row.name)
            .bind(row.created_on)
            .bind(row.updated_on)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        self.log_copied("attributes", rows.len());
        Ok(())
    }

    pub async fn insert_attribute_values(&mut self, rows: &[AttributeValue]) -> Result<()> {
        let mut tx = self.conn.begin().await.map_err(Error::Database)?;
        for row in rows {
            sqlx::query(
                "INSERT INTO attributevalues (id, node_id, attribute_id, value, created_on, \
                 updated_on) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(row.node_id)
            .bind(row.attribute_id)
            .bind(&row.value)
            .bind(row.created_on)
            .bind(row.updated_on)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        self.log_copied("attributevalues", rows.len());
        Ok(())
    }

    pub async fn insert_media_types(&mut self, rows: &[MediaType]) -> Result<()> {
        let mut tx = self.conn.begin().await.map_err(Error::Database)?;
        for row in rows {
            sqlx::query(
                "INSERT INTO mediatypes (id, name, created_on, updated_on) VALUES (?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(&row.name)
            .bind(row.created_on)
            .bind(row.updated_on)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        self.log_copied("mediatypes", rows.len());
        Ok(())
    }

    /// Insert media rows as handed over by the bundler, i.e. with
    /// `internal_link` already rewritten to a bare file name or nulled.
    pub async fn insert_media(&mut self, rows: &[Media]) -> Result<()> {
        let mut tx = self.conn.begin().await.map_err(Error::Database)?;
        for row in rows {
            sqlx::query(
                "INSERT INTO media (id, mediatype_id, name, description, internal_link, \
                 external_link, external_link_description, copyright, created_on, updated_on) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(row.mediatype_id)
            .bind(&row.name)
            .bind(&row.description)
            .bind(&row.internal_link)
            .bind(&row.external_link)
            .bind(&row.external_link_description)
            .bind(&row.copyright)
            .bind(row.created_on)
            .bind(row.updated_on)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        self.log_copied("media", rows.len());
        Ok(())
    }

    pub async fn insert_node_media(&mut self, rows: &[NodeMedia]) -> Result<()> {
        let mut tx = self.conn.begin().await.map_err(Error::Database)?;
        for row in rows {
            sqlx::query(
                "INSERT INTO nodemedia (id, node_id, media_id, created_on, updated_on) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(row.node_id)
            .bind(row.media_id)
            .bind(row.created_on)
            .bind(row.updated_on)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        self.log_copied("nodemedia", rows.len());
        Ok(())
    }

    pub async fn insert_relationships(&mut self, rows: &[Relationship]) -> Result<()> {
        let mut tx = self.conn.begin().await.map_err(Error::Database)?;
        for row in rows {
            sqlx::query(
                "INSERT INTO relationships (id, parent, child, created_on, updated_on) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(row.parent)
            .bind(row.child)
            .bind(row.created_on)
            .bind(row.updated_on)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        self.log_copied("relationships", rows.len());
        Ok(())
    }

    pub async fn insert_similarities(&mut self, rows: &[Similarity]) -> Result<()> {
        let mut tx = self.conn.begin().await.map_err(Error::Database)?;
        for row in rows {
            sqlx::query(
                "INSERT INTO similarities (id, node_a_id, node_b_id, created_on, updated_on) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(row.node_a_id)
            .bind(row.node_b_id)
            .bind(row.created_on)
            .bind(row.updated_on)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        self.log_copied("similarities", rows.len());
        Ok(())
    }

    /// Flush and close the target file. Must be called before the file is
    /// archived; dropping the connection instead may leave the WAL
    /// uncheckpointed on some platforms.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await.map_err(Error::Database)
    }

    fn log_copied(&self, table: &str, count: usize) {
        debug!(
            subsystem = "db",
            component = "target",
            op = "copy_table",
            db_table = table,
            row_count = count,
            "Copied table rows into snapshot"
        );
    }
}

//! Schema for snapshot target files.
//!
//! Every exported snapshot database is created by copying a template file
//! that already carries this schema, so clients can open any snapshot from
//! any deployment of the same schema generation. `create_template` exists so
//! deployments (and tests) can fabricate the template instead of shipping a
//! binary file.

use std::path::Path;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};

use fieldkey_core::{Error, Result};

/// DDL applied to a fresh template file.
///
/// Mirrors the source store's logical schema. Table order follows the
/// copy-dependency chain; foreign keys document it.
pub const TARGET_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS datasources (
    id              INTEGER PRIMARY KEY,
    name            TEXT NOT NULL,
    description     TEXT,
    version_number  INTEGER NOT NULL DEFAULT 1,
    data_provider   TEXT,
    contact         TEXT,
    show_key_name   INTEGER NOT NULL DEFAULT 1,
    icon            TEXT,
    size_total      INTEGER NOT NULL DEFAULT 0,
    size_no_video   INTEGER NOT NULL DEFAULT 0,
    visible         INTEGER NOT NULL DEFAULT 1,
    created_on      TEXT,
    updated_on      TEXT
);

CREATE TABLE IF NOT EXISTS nodes (
    id              INTEGER PRIMARY KEY,
    datasource_id   INTEGER NOT NULL REFERENCES datasources(id),
    name            TEXT NOT NULL,
    description     TEXT,
    created_on      TEXT,
    updated_on      TEXT
);

CREATE TABLE IF NOT EXISTS attributes (
    id              INTEGER PRIMARY KEY,
    name            TEXT NOT NULL,
    created_on      TEXT,
    updated_on      TEXT
);

CREATE TABLE IF NOT EXISTS attributevalues (
    id              INTEGER PRIMARY KEY,
    node_id         INTEGER NOT NULL REFERENCES nodes(id),
    attribute_id    INTEGER NOT NULL REFERENCES attributes(id),
    value           TEXT,
    created_on      TEXT,
    updated_on      TEXT
);

CREATE TABLE IF NOT EXISTS mediatypes (
    id              INTEGER PRIMARY KEY,
    name            TEXT NOT NULL,
    created_on      TEXT,
    updated_on      TEXT
);

CREATE TABLE IF NOT EXISTS media (
    id                        INTEGER PRIMARY KEY,
    mediatype_id              INTEGER NOT NULL REFERENCES mediatypes(id),
    name                      TEXT NOT NULL,
    description               TEXT,
    internal_link             TEXT,
    external_link             TEXT,
    external_link_description TEXT,
    copyright                 TEXT,
    created_on                TEXT,
    updated_on                TEXT
);

CREATE TABLE IF NOT EXISTS nodemedia (
    id              INTEGER PRIMARY KEY,
    node_id         INTEGER NOT NULL REFERENCES nodes(id),
    media_id        INTEGER NOT NULL REFERENCES media(id),
    created_on      TEXT,
    updated_on      TEXT
);

CREATE TABLE IF NOT EXISTS relationships (
    id              INTEGER PRIMARY KEY,
    parent          INTEGER NOT NULL REFERENCES nodes(id),
    child           INTEGER NOT NULL REFERENCES nodes(id),
    created_on      TEXT,
    updated_on      TEXT
);

CREATE TABLE IF NOT EXISTS similarities (
    id              INTEGER PRIMARY KEY,
    node_a_id       INTEGER NOT NULL REFERENCES nodes(id),
    node_b_id       INTEGER NOT NULL REFERENCES nodes(id),
    created_on      TEXT,
    updated_on      TEXT
);
"#;

/// Create an empty template database at `path`.
///
/// Fails if the parent directory is missing; overwrites nothing (the DDL is
/// idempotent, so re-running against an existing template is a no-op).
pub async fn create_template(path: &Path) -> Result<()> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let mut conn = SqliteConnection::connect_with(&options)
        .await
        .map_err(Error::Database)?;

    sqlx::raw_sql(TARGET_SCHEMA)
        .execute(&mut conn)
        .await
        .map_err(Error::Database)?;

    conn.close().await.map_err(Error::Database)?;
    Ok(())
}

//! Core data models for the fieldkey export engine.
//!
//! These types mirror the nine tables of the content schema. The source store
//! and the exported snapshot files share this logical schema, so the same row
//! types are used on both sides of a copy. Rows are immutable once exported.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// =============================================================================
// MEDIA KIND
// =============================================================================

/// Classification of a media row, derived from its media type's name.
///
/// The schema stores media types as rows rather than an enum; the two names
/// the export policy cares about are `"Image"` and `"Video"`. Anything else
/// is carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    /// The media type name identifying images.
    pub const IMAGE: &'static str = "Image";
    /// The media type name identifying videos.
    pub const VIDEO: &'static str = "Video";

    /// Classify a media type by its `name` column.
    pub fn from_name(name: &str) -> Self {
        match name {
            Self::IMAGE => MediaKind::Image,
            Self::VIDEO => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }
}

// =============================================================================
// ROW TYPES
// =============================================================================

/// A datasource: one named content package, the root of an export closure.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Datasource {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub version_number: i32,
    pub data_provider: Option<String>,
    pub contact: Option<String>,
    pub show_key_name: bool,
    /// Absolute path of the datasource's icon file on the media volume, if any.
    pub icon: Option<String>,
    /// Total byte size of all backing media files, maintained by the size sweep.
    pub size_total: i64,
    /// Byte size excluding video files, maintained by the size sweep.
    pub size_no_video: i64,
    pub visible: bool,
    pub created_on: Option<NaiveDateTime>,
    pub updated_on: Option<NaiveDateTime>,
}

impl Datasource {
    /// The timestamp the freshness key derives from: `updated_on`, falling
    /// back to `created_on` for rows that were never edited.
    pub fn freshness_timestamp(&self) -> Option<NaiveDateTime> {
        self.updated_on.or(self.created_on)
    }
}

/// A taxonomy item belonging to one datasource. Nodes form a parent/child
/// DAG via [`Relationship`] rows.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Node {
    pub id: i32,
    pub datasource_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub created_on: Option<NaiveDateTime>,
    pub updated_on: Option<NaiveDateTime>,
}

/// A named attribute, referenced by [`AttributeValue`] rows.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attribute {
    pub id: i32,
    pub name: String,
    pub created_on: Option<NaiveDateTime>,
    pub updated_on: Option<NaiveDateTime>,
}

/// One attribute's value on one node.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttributeValue {
    pub id: i32,
    pub node_id: i32,
    pub attribute_id: i32,
    pub value: Option<String>,
    pub created_on: Option<NaiveDateTime>,
    pub updated_on: Option<NaiveDateTime>,
}

/// A media type row (`"Image"`, `"Video"`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MediaType {
    pub id: i32,
    pub name: String,
    pub created_on: Option<NaiveDateTime>,
    pub updated_on: Option<NaiveDateTime>,
}

impl MediaType {
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_name(&self.name)
    }
}

/// A media item attached to nodes via [`NodeMedia`] join rows.
///
/// In the source store `internal_link` is an absolute path on the media
/// volume. In an exported snapshot it is rewritten to the bare file name of
/// the bundled copy, or null when the file was absent or excluded by policy.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Media {
    pub id: i32,
    pub mediatype_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub internal_link: Option<String>,
    pub external_link: Option<String>,
    pub external_link_description: Option<String>,
    pub copyright: Option<String>,
    pub created_on: Option<NaiveDateTime>,
    pub updated_on: Option<NaiveDateTime>,
}

/// Node-to-media join row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NodeMedia {
    pub id: i32,
    pub node_id: i32,
    pub media_id: i32,
    pub created_on: Option<NaiveDateTime>,
    pub updated_on: Option<NaiveDateTime>,
}

/// A directed parent → child edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Relationship {
    pub id: i32,
    pub parent: i32,
    pub child: i32,
    pub created_on: Option<NaiveDateTime>,
    pub updated_on: Option<NaiveDateTime>,
}

/// An undirected similarity edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Similarity {
    pub id: i32,
    pub node_a_id: i32,
    pub node_b_id: i32,
    pub created_on: Option<NaiveDateTime>,
    pub updated_on: Option<NaiveDateTime>,
}

// =============================================================================
// BUILD SUMMARY
// =============================================================================

/// Row and file counts produced by one snapshot build.
///
/// Purely informational; logged after each build and emitted by the
/// converter binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub datasource_id: i32,
    pub include_videos: bool,
    pub nodes: usize,
    pub attributes: usize,
    pub attribute_values: usize,
    pub media_types: usize,
    pub media: usize,
    pub node_media: usize,
    pub relationships: usize,
    pub similarities: usize,
    /// Media files copied into the snapshot folder.
    pub files_bundled: usize,
    /// Media rows whose backing file was absent (link nulled).
    pub files_missing: usize,
}

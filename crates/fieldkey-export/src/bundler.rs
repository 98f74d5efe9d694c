//! Media bundling for snapshot builds.
//!
//! Media rows in the source store point at files on the media volume. When a
//! snapshot is built, each backing file is copied into the flat snapshot
//! folder under its bare file name and the row's `internal_link` is rewritten
//! to that name, making the snapshot self-contained. Rows whose file is
//! absent keep all their data but get a null link, as do video rows when the
//! variant excludes videos.
//!
//! Nothing in here is fatal to a build: a snapshot with a few nulled links is
//! still useful, a snapshot that fails to build is not.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{trace, warn};

use fieldkey_core::{Media, MediaKind, MediaType};

/// What happened to one media row during bundling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleOutcome {
    /// File copied into the snapshot folder, link rewritten.
    Bundled,
    /// Video row with its file dropped by the no-videos variant.
    ExcludedVideo,
    /// No backing file (absent on disk, unreadable, or never recorded);
    /// link nulled.
    Missing,
}

/// Resolve a stored media link to a filesystem path.
///
/// Absolute links are used as stored; relative links resolve against
/// `media_root` when one is configured.
pub fn resolve_media_link(link: &str, media_root: Option<&Path>) -> PathBuf {
    let path = Path::new(link);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match media_root {
        Some(root) => root.join(path),
        None => path.to_path_buf(),
    }
}

/// Copy the file behind `link` into `dest_dir` under its bare file name.
///
/// Returns the bundled file name, or `None` when there was nothing to copy.
/// Two links sharing a base name collide in the flat folder; the last write
/// wins and a warning is logged.
pub async fn stage_file(link: &str, media_root: Option<&Path>, dest_dir: &Path) -> Option<String> {
    let source = resolve_media_link(link, media_root);

    let file_name = match source.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => {
            warn!(
                subsystem = "export",
                component = "bundler",
                link = link,
                "Media link has no file name"
            );
            return None;
        }
    };

    match fs::metadata(&source).await {
        Ok(meta) if meta.is_file() => {}
        _ => {
            warn!(
                subsystem = "export",
                component = "bundler",
                link = link,
                "Media file absent; nulling link"
            );
            return None;
        }
    }

    let staged = dest_dir.join(&file_name);
    if staged.exists() {
        warn!(
            subsystem = "export",
            component = "bundler",
            file = %file_name,
            "Flat-name collision; overwriting previously staged file"
        );
    }
    if let Err(e) = fs::copy(&source, &staged).await {
        warn!(
            subsystem = "export",
            component = "bundler",
            link = link,
            error = %e,
            "Failed to copy media file; nulling link"
        );
        return None;
    }

    trace!(
        subsystem = "export",
        component = "bundler",
        file = %file_name,
        "Staged media file"
    );
    Some(file_name)
}

/// Applies the bundling policy to the media rows of one build.
pub struct MediaBundler {
    include_videos: bool,
    media_root: Option<PathBuf>,
    kinds: HashMap<i32, MediaKind>,
}

impl MediaBundler {
    /// Create a bundler for one build, classifying media by the media types
    /// copied into the same snapshot.
    pub fn new(
        include_videos: bool,
        media_types: &[MediaType],
        media_root: Option<PathBuf>,
    ) -> Self {
        let kinds = media_types.iter().map(|mt| (mt.id, mt.kind())).collect();
        Self {
            include_videos,
            media_root,
            kinds,
        }
    }

    /// The kind of one media row, by its media type.
    pub fn kind_of(&self, media: &Media) -> MediaKind {
        self.kinds
            .get(&media.mediatype_id)
            .copied()
            .unwrap_or(MediaKind::Other)
    }

    /// Bundle one media row into `dest_dir`, rewriting its link in place.
    ///
    /// The row itself is always kept; only the link and the file are subject
    /// to policy.
    pub async fn bundle(&self, media: &mut Media, dest_dir: &Path) -> BundleOutcome {
        if self.kind_of(media) == MediaKind::Video && !self.include_videos {
            media.internal_link = None;
            trace!(
                subsystem = "export",
                component = "bundler",
                media_id = media.id,
                "Video file excluded from this variant"
            );
            return BundleOutcome::ExcludedVideo;
        }

        let Some(link) = media.internal_link.take() else {
            trace!(
                subsystem = "export",
                component = "bundler",
                media_id = media.id,
                "Media row has no stored link"
            );
            return BundleOutcome::Missing;
        };

        match stage_file(&link, self.media_root.as_deref(), dest_dir).await {
            Some(name) => {
                media.internal_link = Some(name);
                BundleOutcome::Bundled
            }
            None => BundleOutcome::Missing,
        }
    }
}

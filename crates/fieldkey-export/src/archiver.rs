//! Snapshot archiving.
//!
//! A finished snapshot folder is packed into a single flat zip: every file
//! under the folder becomes a top-level entry under its bare file name,
//! whatever directory it was staged in. The archive is written to a `.part`
//! sibling and renamed onto its final path in one step, so a name in the
//! artifact directory always refers to a complete archive.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use fieldkey_core::{defaults, Error, Result};

/// Archive every file under `source_dir` into a flat zip at `target`.
///
/// On failure the partial file is removed and `target` is left untouched,
/// whether or not an older archive exists there.
pub async fn archive_folder(source_dir: &Path, target: &Path) -> Result<()> {
    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::InvalidInput(format!("archive target has no file name: {}", target.display()))
        })?;
    let part = target.with_file_name(format!("{}{}", file_name, defaults::ARCHIVE_PART_SUFFIX));

    let started = Instant::now();
    let source_owned = source_dir.to_path_buf();
    let target_owned = target.to_path_buf();
    let part_owned = part.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let written = write_part(&source_owned, &part_owned)?;
        std::fs::rename(&part_owned, &target_owned)?;
        Ok::<_, Error>(written)
    })
    .await
    .map_err(|e| Error::Internal(format!("archive task failed: {}", e)))?;

    match outcome {
        Ok((file_count, size_bytes)) => {
            info!(
                subsystem = "export",
                component = "archiver",
                op = "archive",
                artifact = %target.display(),
                file_count = file_count,
                size_bytes = size_bytes,
                duration_ms = started.elapsed().as_millis() as u64,
                "Archive written"
            );
            Ok(())
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&part).await;
            Err(e)
        }
    }
}

fn write_part(source_dir: &Path, part: &Path) -> Result<(usize, u64)> {
    let mut files = Vec::new();
    collect_files(source_dir, &mut files)?;

    let out = std::fs::File::create(part)?;
    let mut writer = ZipWriter::new(out);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Archive(format!("file has no name: {}", path.display())))?;
        writer.start_file(name, options)?;
        let mut input = std::fs::File::open(path)?;
        io::copy(&mut input, &mut writer)?;
    }

    let out = writer.finish()?;
    let size_bytes = out.metadata()?.len();
    Ok((files.len(), size_bytes))
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), files)?;
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Read;
    use tempfile::TempDir;

    fn stage(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn entry_names(archive_path: &Path) -> HashSet<String> {
        let file = std::fs::File::open(archive_path).unwrap();
        let archive = zip::ZipArchive::new(file).unwrap();
        archive.file_names().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_archive_flattens_nested_folders() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        stage(scratch.path(), "7.sqlite", "database bytes");
        stage(scratch.path(), "leaf.jpg", "jpeg bytes");
        std::fs::create_dir(scratch.path().join("extra")).unwrap();
        stage(&scratch.path().join("extra"), "deep.jpg", "deep bytes");

        let target = out.path().join("7-2024-03-07-09-05-42-false.zip");
        archive_folder(scratch.path(), &target).await.unwrap();

        let names = entry_names(&target);
        assert_eq!(names.len(), 3);
        assert!(names.contains("7.sqlite"));
        assert!(names.contains("leaf.jpg"));
        // Nested file lands at the top level under its bare name.
        assert!(names.contains("deep.jpg"));
    }

    #[tokio::test]
    async fn test_archive_preserves_content() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        stage(scratch.path(), "leaf.jpg", "jpeg bytes");

        let target = out.path().join("snapshot.zip");
        archive_folder(scratch.path(), &target).await.unwrap();

        let file = std::fs::File::open(&target).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entry = archive.by_name("leaf.jpg").unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "jpeg bytes");
    }

    #[tokio::test]
    async fn test_no_part_file_left_after_success() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        stage(scratch.path(), "7.sqlite", "database bytes");

        let target = out.path().join("snapshot.zip");
        archive_folder(scratch.path(), &target).await.unwrap();

        assert!(target.is_file());
        let part = out.path().join(format!("snapshot.zip{}", defaults::ARCHIVE_PART_SUFFIX));
        assert!(!part.exists());
    }

    #[tokio::test]
    async fn test_missing_source_leaves_no_artifact() {
        let out = TempDir::new().unwrap();
        let target = out.path().join("snapshot.zip");

        let result = archive_folder(Path::new("/nonexistent-scratch"), &target).await;
        assert!(result.is_err());
        assert!(!target.exists());
        let part = out.path().join(format!("snapshot.zip{}", defaults::ARCHIVE_PART_SUFFIX));
        assert!(!part.exists());
    }

    #[tokio::test]
    async fn test_empty_folder_archives_to_empty_zip() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let target = out.path().join("empty.zip");

        archive_folder(scratch.path(), &target).await.unwrap();
        assert!(entry_names(&target).is_empty());
    }
}

//! Whole-tree deflate archives for bundle passes
//!
//! Entries are named by their forward-slash path relative to the root;
//! directories get no entries of their own.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use uplink_core::domain::RelativePath;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Name of the archive for a watch rooted at `root`
pub fn archive_name(root: &Path) -> String {
    let stem = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "root".to_string());
    format!("{stem}.zip")
}

/// Write a deflate archive of `files` (all below `root`) to `dest`
///
/// Paths outside `root` and directories are skipped. Runs on the blocking
/// pool. Returns the number of entries written.
///
/// # Errors
/// Returns an error if any file cannot be read or the archive cannot be
/// written; a partial archive may be left at `dest`
pub async fn write_archive(root: &Path, files: Vec<PathBuf>, dest: &Path) -> Result<usize> {
    let root = root.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || write_archive_blocking(&root, &files, &dest))
        .await
        .context("Archive task panicked")?
}

fn write_archive_blocking(root: &Path, files: &[PathBuf], dest: &Path) -> Result<usize> {
    let out = File::create(dest).with_context(|| format!("Failed to create {}", dest.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut sorted: Vec<&PathBuf> = files.iter().collect();
    sorted.sort();

    let mut written = 0;
    for path in sorted {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        if metadata.is_dir() {
            continue;
        }
        let Ok(rel) = RelativePath::from_root(root, path) else {
            debug!(path = %path.display(), "Skipping path outside bundle root");
            continue;
        };

        zip.start_file(rel.as_str(), options)
            .with_context(|| format!("Failed to add {rel} to archive"))?;
        let mut input =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        io::copy(&mut input, &mut zip).with_context(|| format!("Failed to compress {rel}"))?;
        written += 1;
    }

    zip.finish().context("Failed to finalize archive")?;
    debug!(archive = %dest.display(), entries = written, "Archive written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use tempfile::TempDir;
    use zip::ZipArchive;

    use super::*;

    #[test]
    fn test_archive_name() {
        assert_eq!(archive_name(Path::new("/data/photos")), "photos.zip");
        assert_eq!(archive_name(Path::new("/")), "root.zip");
    }

    #[tokio::test]
    async fn test_write_archive_relative_entries() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("tree");
        tokio::fs::create_dir_all(root.join("sub")).await.unwrap();
        tokio::fs::write(root.join("a.txt"), b"alpha").await.unwrap();
        tokio::fs::write(root.join("sub").join("b.txt"), b"beta").await.unwrap();

        let dest = tmp.path().join("out.zip");
        let files = vec![root.join("a.txt"), root.join("sub").join("b.txt"), root.join("sub")];
        let written = write_archive(&root, files, &dest).await.unwrap();
        assert_eq!(written, 2);

        let mut archive = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "sub/b.txt"]);

        let mut entry = archive.by_name("sub/b.txt").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "beta");
    }

    #[tokio::test]
    async fn test_write_archive_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.zip");

        let result = write_archive(tmp.path(), vec![tmp.path().join("gone")], &dest).await;
        assert!(result.is_err());
    }
}

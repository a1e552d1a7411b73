//! Folder scanner.
//!
//! Enumerates image files under a project root, skipping the project
//! metadata subdirectory. Paths are returned relative to the root, sorted
//! for a stable enumeration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Name of the project metadata subdirectory, excluded from traversal.
pub const METADATA_DIR: &str = ".photosort";

/// File extensions treated as images (lowercase).
const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff"];

/// Recursively enumerate image paths under `root`, relative to `root`.
pub fn scan(root: &Path) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    walk(root, root, &mut paths)?;
    paths.sort();
    tracing::info!(root = %root.display(), images = paths.len(), "scan complete");
    Ok(paths)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().map(|n| n == METADATA_DIR).unwrap_or(false) {
                continue;
            }
            walk(root, &path, out)?;
        } else if is_image(&path) {
            if let Ok(relative) = path.strip_prefix(root) {
                out.push(relative.to_string_lossy().into_owned());
            }
        }
    }
    Ok(())
}

fn is_image(path: &PathBuf) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn finds_images_recursively_and_sorted() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.jpg");
        touch(dir.path(), "sub/a.png");
        touch(dir.path(), "notes.txt");

        let paths = scan(dir.path()).unwrap();
        assert_eq!(paths, vec!["b.jpg".to_string(), "sub/a.png".to_string()]);
    }

    #[test]
    fn skips_metadata_directory() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.jpg");
        touch(dir.path(), ".photosort/thumb.jpg");

        let paths = scan(dir.path()).unwrap();
        assert_eq!(paths, vec!["a.jpg".to_string()]);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "UPPER.JPG");
        let paths = scan(dir.path()).unwrap();
        assert_eq!(paths.len(), 1);
    }
}

//! Corpus scanner.
//!
//! Walks a two-level training tree (label directories containing image
//! files) and lazily yields (label, path) pairs.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions treated as images, compared case-insensitively.
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Lazily enumerate `(label, path)` pairs under `root`.
///
/// Immediate subdirectories of `root` are labels; files inside them are
/// candidate images, filtered to the image-extension allow-list. Pair order
/// is directory-traversal order, which is not guaranteed stable across
/// platforms. A missing or empty root yields the empty sequence.
pub fn scan_corpus(root: &Path) -> impl Iterator<Item = (String, PathBuf)> {
    WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| has_image_extension(entry.path()))
        .filter_map(|entry| {
            let label = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())?;
            Some((label, entry.into_path()))
        })
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

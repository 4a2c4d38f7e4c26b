//! Source file discovery.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::manifest::Language;

/// Collect source files under `src_dir` for `language`, sorted for
/// deterministic ordering. Returned paths are absolute.
pub(crate) fn discover(src_dir: &Path, language: Language) -> Vec<PathBuf> {
  if !src_dir.is_dir() {
    return Vec::new();
  }
  let mut sources: Vec<PathBuf> = WalkDir::new(src_dir)
    .follow_links(false)
    .sort_by_file_name()
    .into_iter()
    .filter_map(|entry| entry.ok())
    .filter(|entry| entry.file_type().is_file())
    .filter(|entry| has_extension(entry.path(), language.source_extensions()))
    .map(|entry| entry.into_path())
    .collect();
  sources.sort();
  sources
}

/// Split sources into (module interface units, implementation units).
///
/// Module units must be compiled before any implementation unit.
pub(crate) fn split_modules(sources: Vec<PathBuf>, language: Language) -> (Vec<PathBuf>, Vec<PathBuf>) {
  sources
    .into_iter()
    .partition(|path| has_extension(path, language.module_extensions()))
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .is_some_and(|ext| extensions.contains(&ext))
}

//! Http (single-file) dependency downloads.
//!
//! An `url = "..."` dependency is a plain file fetch, typically a
//! single-header library. Archives are not unpacked.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::FetchError;

/// Download `url` into `dest_dir`, named after the URL's basename (falling
/// back to `<dep_name>.h`). Returns the file path.
pub(crate) fn download(url: &str, dest_dir: &Path, dep_name: &str) -> Result<PathBuf, FetchError> {
  let dest = dest_dir.join(basename(url, dep_name));

  let response = reqwest::blocking::get(url).map_err(|source| FetchError::Http {
    url: url.to_string(),
    source,
  })?;
  if !response.status().is_success() {
    return Err(FetchError::HttpStatus {
      url: url.to_string(),
      status: response.status().as_u16(),
    });
  }
  let bytes = response.bytes().map_err(|source| FetchError::Http {
    url: url.to_string(),
    source,
  })?;

  let mut file = File::create(&dest).map_err(|source| FetchError::Write {
    path: dest.clone(),
    source,
  })?;
  file.write_all(&bytes).map_err(|source| FetchError::Write {
    path: dest.clone(),
    source,
  })?;

  debug!(url, path = %dest.display(), bytes = bytes.len(), "downloaded");
  Ok(dest)
}

fn basename(url: &str, dep_name: &str) -> String {
  let trimmed = url.split(['?', '#']).next().unwrap_or(url);
  let without_scheme = trimmed.split_once("://").map_or(trimmed, |(_, rest)| rest);
  match without_scheme.split_once('/') {
    Some((_, path)) => match path.rsplit('/').next() {
      Some(name) if !name.is_empty() => name.to_string(),
      _ => format!("{}.h", dep_name),
    },
    None => format!("{}.h", dep_name),
  }
}

//! Git operations for dependency fetching.
//!
//! Fetching happens before the async build phase, so these drive the system
//! `git` binary synchronously and capture stderr for error reporting.

use std::path::Path;
use std::process::Command;

use super::FetchError;

pub(crate) fn clone(url: &str, dest: &Path) -> Result<(), FetchError> {
  let output = Command::new("git")
    .arg("clone")
    .arg(url)
    .arg(dest)
    .output()
    .map_err(FetchError::GitSpawn)?;

  if !output.status.success() {
    // A failed clone can leave a partial directory that would satisfy the
    // cache-hit existence check on the next run.
    std::fs::remove_dir_all(dest).ok();
    return Err(FetchError::Clone {
      url: url.to_string(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    });
  }
  Ok(())
}

pub(crate) fn checkout(dir: &Path, tag: &str) -> Result<(), FetchError> {
  let output = Command::new("git")
    .arg("-C")
    .arg(dir)
    .args(["checkout", "--quiet", tag])
    .output()
    .map_err(FetchError::GitSpawn)?;

  if !output.status.success() {
    return Err(FetchError::Checkout {
      tag: tag.to_string(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    });
  }
  Ok(())
}

/// The 40-character commit SHA of the working copy's HEAD.
pub(crate) fn head_commit(dir: &Path) -> Result<String, FetchError> {
  let output = Command::new("git")
    .arg("-C")
    .arg(dir)
    .args(["rev-parse", "HEAD"])
    .output()
    .map_err(FetchError::GitSpawn)?;

  if !output.status.success() {
    return Err(FetchError::RevParse {
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    });
  }
  Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::TempDir;

  /// Create a local git repository with one commit; returns its SHA.
  fn create_local_repo(path: &Path) -> String {
    let run = |args: &[&str]| {
      let output = Command::new("git").args(args).current_dir(path).output().expect("git failed to run");
      assert!(output.status.success(), "git {:?} failed: {:?}", args, output);
    };

    run(&["init"]);
    run(&["config", "user.email", "test@example.com"]);
    run(&["config", "user.name", "Test"]);
    fs::write(path.join("README.md"), "# test repo\n").unwrap();
    run(&["add", "README.md"]);
    run(&["commit", "-m", "initial"]);

    let output = Command::new("git")
      .args(["rev-parse", "HEAD"])
      .current_dir(path)
      .output()
      .unwrap();
    String::from_utf8(output.stdout).unwrap().trim().to_string()
  }

  fn create_tag(path: &Path, tag: &str) -> String {
    let run = |args: &[&str]| {
      let output = Command::new("git").args(args).current_dir(path).output().unwrap();
      assert!(output.status.success(), "git {:?} failed: {:?}", args, output);
    };

    fs::write(path.join("CHANGELOG.md"), format!("# {}\n", tag)).unwrap();
    run(&["add", "CHANGELOG.md"]);
    run(&["commit", "-m", "release"]);
    run(&["tag", tag]);

    let output = Command::new("git")
      .args(["rev-parse", "HEAD"])
      .current_dir(path)
      .output()
      .unwrap();
    String::from_utf8(output.stdout).unwrap().trim().to_string()
  }

  #[test]
  fn clone_and_read_head() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source");
    fs::create_dir(&source).unwrap();
    let sha = create_local_repo(&source);

    let dest = temp.path().join("clone");
    clone(source.to_str().unwrap(), &dest).unwrap();

    assert!(dest.join("README.md").exists());
    assert_eq!(head_commit(&dest).unwrap(), sha);
    assert_eq!(sha.len(), 40);
  }

  #[test]
  fn checkout_moves_head_to_the_tag() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source");
    fs::create_dir(&source).unwrap();
    create_local_repo(&source);
    let tagged = create_tag(&source, "v1.0.0");

    // Another commit after the tag so HEAD differs from v1.0.0.
    fs::write(source.join("NEW.md"), "new\n").unwrap();
    Command::new("git").args(["add", "NEW.md"]).current_dir(&source).output().unwrap();
    Command::new("git")
      .args(["commit", "-m", "post-release"])
      .current_dir(&source)
      .output()
      .unwrap();

    let dest = temp.path().join("clone");
    clone(source.to_str().unwrap(), &dest).unwrap();
    checkout(&dest, "v1.0.0").unwrap();

    assert_eq!(head_commit(&dest).unwrap(), tagged);
  }

  #[test]
  fn checkout_of_missing_tag_is_an_error() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source");
    fs::create_dir(&source).unwrap();
    create_local_repo(&source);

    let dest = temp.path().join("clone");
    clone(source.to_str().unwrap(), &dest).unwrap();

    let err = checkout(&dest, "no-such-tag").unwrap_err();
    assert!(matches!(err, FetchError::Checkout { tag, .. } if tag == "no-such-tag"));
  }

  #[test]
  fn failed_clone_cleans_up_the_partial_directory() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("clone");

    let err = clone("/nonexistent/repo/path", &dest).unwrap_err();
    assert!(matches!(err, FetchError::Clone { .. }));
    assert!(!dest.exists());
  }
}

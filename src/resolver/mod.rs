//! Locate the file behind a recorded datasource path.
//!
//! Recorded paths are frequently stale: projects get moved, data folders get renamed and
//! paths saved on one machine are opened on another. Resolution tries, in order:
//!
//! 1. the recorded path as an absolute path,
//! 2. the recorded path relative to the project directory,
//! 3. the bare file name anywhere below the project's ancestors ([`AncestorSearch`]).
//!
//! The first existing regular file wins. A reference that matches nothing is reported as
//! not found rather than treated as an error.

mod search;

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::datasource::file_name_of;
use crate::models::{ResolveStrategy, ResolvedFile};

pub use search::{AncestorSearch, search_roots};

/// Bounds applied to the fallback search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
  /// How many directories above the project directory are searched.
  pub ancestor_depth: usize,
  /// Maximum directory depth walked below each search root.
  pub max_walk_depth: usize,
  /// Maximum number of directory entries visited below each search root.
  pub max_scan_entries: usize,
  /// Skip files and directories whose name starts with a dot.
  pub skip_hidden: bool,
  /// Directories never searched, such as the package output itself.
  #[serde(skip)]
  pub excluded_roots: Vec<PathBuf>,
}

impl Default for SearchOptions {
  fn default() -> Self {
    Self {
      ancestor_depth: 3,
      max_walk_depth: 12,
      max_scan_entries: 100_000,
      skip_hidden: true,
      excluded_roots: Vec::new(),
    }
  }
}

/// Resolves recorded paths against the filesystem.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
  options: SearchOptions,
}

impl Resolver {
  /// Create a resolver with the given search bounds.
  pub fn new(options: SearchOptions) -> Self {
    Self { options }
  }

  /// Search bounds used by this resolver.
  pub fn options(&self) -> &SearchOptions {
    &self.options
  }

  /// Find the existing file a recorded path refers to.
  pub fn resolve(&self, recorded_path: &str, project_dir: &Path) -> ResolvedFile {
    let recorded = recorded_path.trim();
    if recorded.is_empty() {
      return ResolvedFile::not_found(recorded_path);
    }

    let project_dir = absolutize(project_dir);
    let spellings = path_spellings(recorded);

    for spelling in &spellings {
      let candidate = Path::new(spelling);
      if candidate.is_absolute() && candidate.is_file() {
        return ResolvedFile::found(
          normalize_path(candidate),
          recorded_path,
          ResolveStrategy::Absolute,
        );
      }
    }

    for spelling in &spellings {
      let candidate = normalize_path(&project_dir.join(spelling));
      if candidate.is_file() && !self.is_excluded(&candidate) {
        return ResolvedFile::found(candidate, recorded_path, ResolveStrategy::ProjectRelative);
      }
    }

    let Some(file_name) = file_name_of(recorded) else {
      return ResolvedFile::not_found(recorded_path);
    };

    match AncestorSearch::new(file_name, &project_dir, &self.options).next() {
      Some(found) => {
        debug!(recorded = recorded, found = %found.display(), "resolved by ancestor scan");
        ResolvedFile::found(normalize_path(&found), recorded_path, ResolveStrategy::AncestorScan)
      }
      None => ResolvedFile::not_found(recorded_path),
    }
  }

  fn is_excluded(&self, path: &Path) -> bool {
    self
      .options
      .excluded_roots
      .iter()
      .any(|excluded| path.starts_with(excluded))
  }
}

/// The recorded path as written, plus a `/`-separated spelling when it was saved on Windows.
fn path_spellings(recorded: &str) -> Vec<String> {
  let mut spellings = vec![recorded.to_string()];
  if !cfg!(windows) && recorded.contains('\\') {
    spellings.push(recorded.replace('\\', "/"));
  }
  spellings
}

/// Make `path` absolute against the current directory when needed.
pub fn absolutize(path: &Path) -> PathBuf {
  if path.is_absolute() {
    normalize_path(path)
  } else {
    std::path::absolute(path)
      .map(|absolute| normalize_path(&absolute))
      .unwrap_or_else(|_| normalize_path(path))
  }
}

/// Remove `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
  let mut normalized = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        let ends_with_normal = matches!(
          normalized.components().next_back(),
          Some(Component::Normal(_))
        );
        if ends_with_normal {
          normalized.pop();
        } else if !normalized.has_root() {
          normalized.push("..");
        }
      }
      other => normalized.push(other.as_os_str()),
    }
  }
  normalized
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  fn resolver(depth: usize) -> Resolver {
    Resolver::new(SearchOptions {
      ancestor_depth: depth,
      ..SearchOptions::default()
    })
  }

  #[test]
  fn normalizes_lexically() {
    assert_eq!(normalize_path(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
    assert_eq!(normalize_path(Path::new("../a/../../b")), PathBuf::from("../../b"));
  }

  #[test]
  fn blank_paths_are_not_found() {
    let temp = tempdir().unwrap();
    let resolved = resolver(3).resolve("   ", temp.path());
    assert!(!resolved.found);
    assert_eq!(resolved.strategy, ResolveStrategy::NotFound);
  }

  #[test]
  fn accepts_existing_absolute_paths() -> std::io::Result<()> {
    let temp = tempdir()?;
    let file = temp.path().join("roads.gpkg");
    fs::write(&file, b"gpkg")?;

    let resolved = resolver(0).resolve(&file.to_string_lossy(), Path::new("/nonexistent"));
    assert!(resolved.found);
    assert_eq!(resolved.absolute_path, file);
    assert_eq!(resolved.strategy, ResolveStrategy::Absolute);
    Ok(())
  }

  #[test]
  fn resolves_relative_to_project_directory() -> std::io::Result<()> {
    let temp = tempdir()?;
    let project = temp.path().join("project");
    fs::create_dir_all(temp.path().join("data"))?;
    fs::create_dir_all(&project)?;
    fs::write(temp.path().join("data/rivers.shp"), b"shp")?;

    let resolved = resolver(0).resolve("../data/rivers.shp", &project);
    assert!(resolved.found);
    assert_eq!(resolved.absolute_path, temp.path().join("data/rivers.shp"));
    assert_eq!(resolved.strategy, ResolveStrategy::ProjectRelative);
    assert_eq!(resolved.origin_path, "../data/rivers.shp");
    Ok(())
  }

  #[test]
  fn accepts_windows_separators_in_relative_paths() -> std::io::Result<()> {
    let temp = tempdir()?;
    fs::create_dir_all(temp.path().join("data"))?;
    fs::write(temp.path().join("data/rivers.shp"), b"shp")?;

    let resolved = resolver(0).resolve(".\\data\\rivers.shp", temp.path());
    assert!(resolved.found);
    assert_eq!(resolved.absolute_path, temp.path().join("data/rivers.shp"));
    Ok(())
  }

  #[test]
  fn finds_moved_file_in_sibling_tree() -> std::io::Result<()> {
    let temp = tempdir()?;
    let project = temp.path().join("maps/project");
    fs::create_dir_all(&project)?;
    fs::create_dir_all(temp.path().join("maps/Archive/Town1"))?;
    fs::write(temp.path().join("maps/Archive/Town1/contours.shp"), b"shp")?;

    let resolved = resolver(1).resolve("../data/contours.shp", &project);
    assert!(resolved.found);
    assert_eq!(resolved.strategy, ResolveStrategy::AncestorScan);
    assert_eq!(
      resolved.absolute_path,
      temp.path().join("maps/Archive/Town1/contours.shp")
    );

    let again = resolver(1).resolve("../data/contours.shp", &project);
    assert_eq!(again, resolved);
    Ok(())
  }

  #[test]
  fn finds_files_inside_a_hidden_project_directory() -> std::io::Result<()> {
    let temp = tempdir()?;
    let project = temp.path().join("work/.proj");
    fs::create_dir_all(project.join("data"))?;
    fs::write(project.join("data/roads.gpkg"), b"gpkg")?;

    let resolved = resolver(1).resolve("../old/roads.gpkg", &project);
    assert!(resolved.found);
    assert_eq!(resolved.strategy, ResolveStrategy::AncestorScan);
    assert_eq!(resolved.absolute_path, project.join("data/roads.gpkg"));
    Ok(())
  }

  #[test]
  fn gives_up_outside_search_bound() -> std::io::Result<()> {
    let temp = tempdir()?;
    let project = temp.path().join("deep/er/project");
    fs::create_dir_all(&project)?;
    fs::write(temp.path().join("far.shp"), b"shp")?;

    let resolved = resolver(1).resolve("C:\\old\\far.shp", &project);
    assert!(!resolved.found);
    assert_eq!(resolved.origin_path, "C:\\old\\far.shp");

    let resolved = resolver(3).resolve("C:\\old\\far.shp", &project);
    assert!(resolved.found);
    assert_eq!(resolved.absolute_path, temp.path().join("far.shp"));
    Ok(())
  }
}

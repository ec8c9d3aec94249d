//! Lazy, bounded search for a file name around the project directory.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use super::SearchOptions;

type EntryIter = Box<dyn Iterator<Item = walkdir::Result<DirEntry>>>;

/// Iterator over files named `file_name` below the ancestors of the project directory.
///
/// Roots are visited nearest first: the project's parent, then its parent, and so on up to
/// [`SearchOptions::ancestor_depth`] levels. Each root's subtree is walked in alphabetical
/// order and the subtree of the previously visited (nearer) root is skipped, so every
/// directory is scanned at most once. Hidden entries are skipped when configured, except for
/// the directories leading down to the project itself. Every walk is bounded by depth and entry count, which
/// makes the sequence finite. Building a new search over an unchanged filesystem yields the
/// same matches in the same order.
pub struct AncestorSearch {
  file_name: String,
  project_dir: PathBuf,
  roots: Vec<PathBuf>,
  next_root: usize,
  walker: Option<EntryIter>,
  options: SearchOptions,
}

impl AncestorSearch {
  /// Prepare a search for `file_name` starting at `project_dir`.
  pub fn new(file_name: &str, project_dir: &Path, options: &SearchOptions) -> Self {
    Self {
      file_name: file_name.to_string(),
      project_dir: project_dir.to_path_buf(),
      roots: search_roots(project_dir, options.ancestor_depth),
      next_root: 0,
      walker: None,
      options: options.clone(),
    }
  }

  fn open_next_root(&mut self) -> bool {
    while self.next_root < self.roots.len() {
      let index = self.next_root;
      self.next_root += 1;

      let root = self.roots[index].clone();
      if !root.is_dir() || self.is_excluded(&root) {
        continue;
      }

      let already_scanned = index.checked_sub(1).map(|prev| self.roots[prev].clone());
      let excluded = self.options.excluded_roots.clone();
      let skip_hidden = self.options.skip_hidden;
      let project_dir = self.project_dir.clone();

      debug!(root = %root.display(), file = %self.file_name, "scanning search root");
      let walker = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(self.options.max_walk_depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
          let path = entry.path();
          if skip_hidden
            && entry.depth() > 0
            && is_hidden(entry.file_name())
            && !project_dir.starts_with(path)
          {
            return false;
          }
          if already_scanned.as_deref() == Some(path) {
            return false;
          }
          !excluded.iter().any(|root| root == path)
        })
        .take(self.options.max_scan_entries);

      self.walker = Some(Box::new(walker));
      return true;
    }

    false
  }

  fn is_excluded(&self, path: &Path) -> bool {
    self
      .options
      .excluded_roots
      .iter()
      .any(|excluded| path.starts_with(excluded))
  }
}

impl Iterator for AncestorSearch {
  type Item = PathBuf;

  fn next(&mut self) -> Option<PathBuf> {
    loop {
      if self.walker.is_none() && !self.open_next_root() {
        return None;
      }

      let walker = self.walker.as_mut()?;
      match walker.next() {
        Some(Ok(entry)) => {
          if entry.file_name() != OsStr::new(&self.file_name) {
            continue;
          }
          let file_type = entry.file_type();
          if file_type.is_file() || (file_type.is_symlink() && entry.path().is_file()) {
            return Some(entry.into_path());
          }
        }
        Some(Err(err)) => {
          debug!(error = %err, "skipping unreadable entry during search");
        }
        None => self.walker = None,
      }
    }
  }
}

/// Up to `depth` ancestors of the project directory, nearest first.
pub fn search_roots(project_dir: &Path, depth: usize) -> Vec<PathBuf> {
  project_dir
    .ancestors()
    .skip(1)
    .filter(|ancestor| !ancestor.as_os_str().is_empty())
    .take(depth)
    .map(Path::to_path_buf)
    .collect()
}

fn is_hidden(name: &OsStr) -> bool {
  name.to_string_lossy().starts_with('.')
}

//! Candidate destination names for a source file, from tidiest to most specific.

use std::collections::BTreeSet;
use std::path::{Component, Path};

/// A destination inside the links directory, split into directory and file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
  /// `/` separated directory below the links root, empty for flat placement.
  pub dir: String,
  /// File name of the primary file.
  pub file_name: String,
}

impl Destination {
  /// Path relative to the links root, `/` separated.
  pub fn relative_path(&self) -> String {
    self.sibling(&self.file_name)
  }

  /// Relative path of another file placed in the same directory.
  pub fn sibling(&self, file_name: &str) -> String {
    if self.dir.is_empty() {
      file_name.to_string()
    } else {
      format!("{}/{}", self.dir, file_name)
    }
  }
}

/// Split a file name into stem and extension (with its dot). Leading dots belong to the stem.
pub fn split_extension(file_name: &str) -> (&str, &str) {
  match file_name.rfind('.') {
    Some(index) if index > 0 => file_name.split_at(index),
    _ => (file_name, ""),
  }
}

/// Lazy sequence of destinations for `source`.
///
/// Yields `<file>`, then `<parent>/<file>`, `<grandparent>/<parent>/<file>` and so on for
/// every meaningful ancestor directory name, then `<deepest>/<stem>_N<ext>` for increasing
/// `N` until the counter is exhausted.
#[derive(Debug, Clone)]
pub struct DestinationCandidates {
  file_name: String,
  context: Vec<String>,
  depth: usize,
  counter: Option<u32>,
}

impl DestinationCandidates {
  /// Candidates for `source`, ignoring ancestor names listed in `generic_dir_names`
  /// (compared case-insensitively).
  pub fn new(source: &Path, generic_dir_names: &BTreeSet<String>) -> Self {
    let file_name = source
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default();

    let context = source
      .parent()
      .map(|parent| meaningful_dir_names(parent, generic_dir_names))
      .unwrap_or_default();

    Self {
      file_name,
      context,
      depth: 0,
      counter: None,
    }
  }

  fn prefix(&self, depth: usize) -> String {
    self.context[..depth]
      .iter()
      .rev()
      .cloned()
      .collect::<Vec<_>>()
      .join("/")
  }
}

impl Iterator for DestinationCandidates {
  type Item = Destination;

  fn next(&mut self) -> Option<Destination> {
    if self.file_name.is_empty() {
      return None;
    }

    if self.depth <= self.context.len() && self.counter.is_none() {
      let candidate = Destination {
        dir: self.prefix(self.depth),
        file_name: self.file_name.clone(),
      };
      self.depth += 1;
      if self.depth > self.context.len() {
        self.counter = Some(1);
      }
      return Some(candidate);
    }

    let counter = self.counter?;
    self.counter = counter.checked_add(1);
    let (stem, ext) = split_extension(&self.file_name);
    Some(Destination {
      dir: self.prefix(self.context.len()),
      file_name: format!("{stem}_{counter}{ext}"),
    })
  }
}

/// Directory names of `dir`, nearest first, without roots, drive prefixes and generic names.
fn meaningful_dir_names(dir: &Path, generic_dir_names: &BTreeSet<String>) -> Vec<String> {
  dir
    .components()
    .rev()
    .filter_map(|component| match component {
      Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
      _ => None,
    })
    .filter(|name| !generic_dir_names.contains(&name.to_lowercase()))
    .collect()
}

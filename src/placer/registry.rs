//! Per-run bookkeeping of claimed destinations.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::models::PlacementEntry;

/// Destinations claimed during one packaging run.
///
/// Keys are compared case-insensitively because packages are routinely unpacked on
/// filesystems that do not distinguish `Roads.shp` from `roads.shp`. A path claimed by a file
/// also blocks directories of the same name, and the other way round. Every copied file,
/// sidecars included, is remembered under its own source path so a later reference to it
/// reuses the existing copy.
#[derive(Debug, Default)]
pub struct PlacementRegistry {
  files: BTreeMap<String, PathBuf>,
  dirs: BTreeSet<String>,
  by_source: BTreeMap<PathBuf, PlacementEntry>,
}

impl PlacementRegistry {
  /// Empty registry for a new run.
  pub fn new() -> Self {
    Self::default()
  }

  /// Placement previously recorded for `source`, if any.
  pub fn lookup(&self, source: &Path) -> Option<&PlacementEntry> {
    self.by_source.get(source)
  }

  /// Whether every `(relative path, source)` pair can be written.
  ///
  /// A path already holding a copy of the same source counts as free.
  pub fn is_free<S: AsRef<str>, P: AsRef<Path>>(&self, claims: &[(S, P)]) -> bool {
    claims.iter().all(|(relative, source)| {
      let source: &Path = source.as_ref();
      let key = claim_key(relative.as_ref());
      if self.dirs.contains(&key) {
        return false;
      }
      if self
        .files
        .get(&key)
        .is_some_and(|owner| owner.as_path() != source)
      {
        return false;
      }
      parent_keys(&key).all(|dir| !self.files.contains_key(dir))
    })
  }

  /// Record `entry` and every file it occupies.
  ///
  /// `sidecar_sources` holds the source of each entry in `entry.sidecars`, in the same order.
  /// Sidecars without a known source are attributed to the primary file.
  pub fn claim(&mut self, entry: &PlacementEntry, sidecar_sources: &[PathBuf]) {
    let primary = &entry.source_absolute_path;
    self.occupy(&entry.destination_relative_path, primary);

    for (index, relative) in entry.sidecars.iter().enumerate() {
      let Some(source) = sidecar_sources.get(index) else {
        self.occupy(relative, primary);
        continue;
      };
      self.occupy(relative, source);
      self
        .by_source
        .entry(source.clone())
        .or_insert_with(|| PlacementEntry {
          destination_relative_path: relative.clone(),
          source_absolute_path: source.clone(),
          sidecars: Vec::new(),
          reused: false,
        });
    }

    self.by_source.insert(primary.clone(), entry.clone());
  }

  fn occupy(&mut self, relative: &str, source: &Path) {
    let key = claim_key(relative);
    for dir in parent_keys(&key) {
      self.dirs.insert(dir.to_string());
    }
    self.files.insert(key, source.to_path_buf());
  }

  /// Number of distinct source files copied, sidecars included.
  pub fn len(&self) -> usize {
    self.by_source.len()
  }

  /// Returns true when nothing has been placed yet.
  pub fn is_empty(&self) -> bool {
    self.by_source.is_empty()
  }
}

fn claim_key(relative: &str) -> String {
  relative.replace('\\', "/").to_lowercase()
}

/// Every directory prefix of a `/` separated key, deepest first.
fn parent_keys(key: &str) -> impl Iterator<Item = &str> {
  key.rmatch_indices('/').map(move |(index, _)| &key[..index])
}

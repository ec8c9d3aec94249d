//! Place resolved files into the links directory without name collisions.
//!
//! A file lands flat under the links root when its name is free. On a collision with a
//! different source the destination is escalated with the source's parent directory name,
//! then further ancestors, and finally a numeric suffix ([`DestinationCandidates`]). Sidecar
//! files are copied next to the primary file and renamed only in their base name. Placing the
//! same source twice within a run reuses the first destination.

mod install;
mod naming;
mod registry;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ReferenceError;
use crate::formats::{Sidecar, format_for_path};
use crate::models::{PlacementEntry, ResolvedFile};

pub use install::install_file;
pub use naming::{Destination, DestinationCandidates, split_extension};
pub use registry::PlacementRegistry;

/// Options controlling destination naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementOptions {
  /// Directory names that carry no meaning as disambiguating context.
  pub generic_dir_names: BTreeSet<String>,
}

impl Default for PlacementOptions {
  fn default() -> Self {
    let names = [
      "Documents",
      "Desktop",
      "Downloads",
      "Users",
      "home",
      "tmp",
      "temp",
      "Program Files",
      "Windows",
      "System32",
    ];
    Self {
      generic_dir_names: names.iter().map(|name| name.to_lowercase()).collect(),
    }
  }
}

impl PlacementOptions {
  /// Lowercase the configured names so lookups are case-insensitive.
  pub fn normalized(mut self) -> Self {
    self.generic_dir_names = self
      .generic_dir_names
      .into_iter()
      .map(|name| name.to_lowercase())
      .collect();
    self
  }
}

/// Collect the sidecars present next to `primary`, sorted by file name.
///
/// Files without a multi-file format yield an empty list.
pub fn collect_sidecars(primary: &Path) -> Result<Vec<Sidecar>, ReferenceError> {
  let Some(spec) = format_for_path(primary) else {
    return Ok(Vec::new());
  };
  let (Some(dir), Some(primary_name)) = (primary.parent(), primary.file_name()) else {
    return Ok(Vec::new());
  };
  let primary_name = primary_name.to_string_lossy();
  let scan_error = |source| ReferenceError::SidecarScan {
    dir: dir.to_path_buf(),
    source,
  };

  let mut sidecars = Vec::new();
  for entry in fs::read_dir(dir).map_err(scan_error)? {
    let entry = entry.map_err(scan_error)?;
    if !entry.path().is_file() {
      continue;
    }
    let name = entry.file_name().to_string_lossy().into_owned();
    if let Some(sidecar) = spec.match_sidecar(&primary_name, &name) {
      sidecars.push(sidecar);
    }
  }

  sidecars.sort_by(|a, b| (&a.base, &a.suffix).cmp(&(&b.base, &b.suffix)));
  Ok(sidecars)
}

/// Copies resolved files into a links directory.
#[derive(Debug)]
pub struct LinkPlacer<'a> {
  links_root: &'a Path,
  options: &'a PlacementOptions,
}

impl<'a> LinkPlacer<'a> {
  /// Placer writing below `links_root`.
  pub fn new(links_root: &'a Path, options: &'a PlacementOptions) -> Self {
    Self {
      links_root,
      options,
    }
  }

  /// Choose a unique destination for `resolved`, copy it together with `sidecars` and record
  /// the placement in `registry`.
  ///
  /// A source copied earlier in the run, either as a primary file or as another file's
  /// sidecar, keeps its existing destination. Nothing is claimed when copying fails, so a
  /// later reference to the same source retries.
  pub fn place(
    &self,
    resolved: &ResolvedFile,
    sidecars: &[Sidecar],
    registry: &mut PlacementRegistry,
  ) -> Result<PlacementEntry, ReferenceError> {
    let source = &resolved.absolute_path;
    if let Some(existing) = registry.lookup(source) {
      debug!(source = %source.display(), destination = %existing.destination_relative_path, "reusing placement");
      return Ok(PlacementEntry {
        reused: true,
        ..existing.clone()
      });
    }

    let primary_name = source
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default();
    let dir = source.parent().map(Path::to_path_buf).unwrap_or_default();

    let (destination, sidecar_paths) =
      DestinationCandidates::new(source, &self.options.generic_dir_names)
        .map(|destination| {
          let sidecar_paths = sidecar_destinations(&destination, &primary_name, sidecars);
          (destination, sidecar_paths)
        })
        .find(|(destination, sidecar_paths)| {
          let mut occupied = vec![(destination.relative_path(), source.clone())];
          occupied.extend(
            sidecar_paths
              .iter()
              .map(|(name, relative)| (relative.clone(), dir.join(name))),
          );
          registry.is_free(&occupied)
        })
        .ok_or_else(|| ReferenceError::CollisionExhaustion {
          source_path: source.clone(),
        })?;

    let relative = destination.relative_path();
    self.copy(source, &relative)?;

    let mut placed_sidecars = Vec::with_capacity(sidecar_paths.len());
    let mut sidecar_sources = Vec::with_capacity(sidecar_paths.len());
    for (sidecar_name, sidecar_relative) in sidecar_paths {
      let sidecar_source = dir.join(&sidecar_name);
      self.copy(&sidecar_source, &sidecar_relative)?;
      placed_sidecars.push(sidecar_relative);
      sidecar_sources.push(sidecar_source);
    }

    let entry = PlacementEntry {
      destination_relative_path: relative,
      source_absolute_path: source.clone(),
      sidecars: placed_sidecars,
      reused: false,
    };
    registry.claim(&entry, &sidecar_sources);
    Ok(entry)
  }

  /// Absolute location of a links-relative destination.
  pub fn destination_path(&self, relative: &str) -> PathBuf {
    relative
      .split('/')
      .fold(self.links_root.to_path_buf(), |path, segment| path.join(segment))
  }

  fn copy(&self, source: &Path, relative: &str) -> Result<(), ReferenceError> {
    let destination = self.destination_path(relative);
    install_file(source, &destination).map_err(|err| ReferenceError::CopyFailure {
      from: source.to_path_buf(),
      to: destination,
      source: err,
    })
  }
}

/// Source file name and links-relative destination of every sidecar for `destination`.
fn sidecar_destinations(
  destination: &Destination,
  primary_name: &str,
  sidecars: &[Sidecar],
) -> Vec<(String, String)> {
  let (new_stem, _) = split_extension(&destination.file_name);
  sidecars
    .iter()
    .map(|sidecar| {
      let new_base = if sidecar.base == primary_name {
        destination.file_name.as_str()
      } else {
        new_stem
      };
      (
        format!("{}{}", sidecar.base, sidecar.suffix),
        destination.sibling(&format!("{new_base}{}", sidecar.suffix)),
      )
    })
    .collect()
}

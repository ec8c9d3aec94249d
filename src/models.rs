//! Data structures produced while packaging a project.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::formats::SourceFormat;

/// One data source entry read from the project's layer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
  /// Stable layer identifier used when rewriting the document.
  pub layer_id: String,
  /// Human readable layer name, used for diagnostics only.
  pub layer_name: String,
  /// Data provider key recorded for the layer (`ogr`, `gdal`, ...).
  pub provider: String,
  /// Datasource string exactly as stored in the project document.
  pub recorded_path: String,
  /// Broad classification of the source.
  pub format: SourceFormat,
  /// True when the recorded file belongs to a multi-file format.
  pub is_sidecar_group: bool,
}

/// How a resolved file was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolveStrategy {
  /// The recorded path was absolute and existed.
  Absolute,
  /// The recorded path resolved relative to the project directory.
  ProjectRelative,
  /// The file name was found while scanning an ancestor's subtree.
  AncestorScan,
  /// Nothing matched within the search bounds.
  NotFound,
}

/// Output of the reference resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFile {
  /// Verified location on disk. Equal to the lexical origin path when `found` is false.
  pub absolute_path: PathBuf,
  /// Recorded path the resolution started from.
  pub origin_path: String,
  /// Whether an existing regular file was located.
  pub found: bool,
  /// Step of the search that produced the match.
  pub strategy: ResolveStrategy,
}

impl ResolvedFile {
  /// Build a successful resolution.
  pub fn found(absolute_path: PathBuf, origin_path: &str, strategy: ResolveStrategy) -> Self {
    Self {
      absolute_path,
      origin_path: origin_path.to_string(),
      found: true,
      strategy,
    }
  }

  /// Build a failed resolution carrying the recorded path for reporting.
  pub fn not_found(origin_path: &str) -> Self {
    Self {
      absolute_path: PathBuf::from(origin_path),
      origin_path: origin_path.to_string(),
      found: false,
      strategy: ResolveStrategy::NotFound,
    }
  }
}

/// Destination assigned to a source file inside the links directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementEntry {
  /// Destination relative to the links directory, always `/` separated.
  pub destination_relative_path: String,
  /// Absolute path of the primary source file.
  pub source_absolute_path: PathBuf,
  /// Sidecar destinations copied alongside the primary file.
  pub sidecars: Vec<String>,
  /// True when a previous placement of the same source was reused.
  pub reused: bool,
}

/// A reference that could not be packaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceFailure {
  /// Layer name as shown in the project.
  pub layer_name: String,
  /// Datasource string recorded in the project.
  pub recorded_path: String,
  /// Rendered error message.
  pub reason: String,
}

/// A layer that was intentionally left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedReference {
  /// Layer name as shown in the project.
  pub layer_name: String,
  /// Why the layer was not packaged.
  pub reason: String,
}

/// Mapping from recorded datasource strings to rewritten ones.
pub type PackageManifest = BTreeMap<String, String>;

/// Summary produced by a packaging run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageReport {
  /// Project name without extension.
  pub project_name: String,
  /// Directory holding the rewritten project and its links.
  pub package_dir: PathBuf,
  /// Number of references that were placed and rewritten.
  pub succeeded: usize,
  /// References that could not be resolved or copied.
  pub failures: Vec<ReferenceFailure>,
  /// Layers without a file-backed datasource.
  pub skipped: Vec<SkippedReference>,
  /// Every placement made during the run, in processing order.
  pub placements: Vec<PlacementEntry>,
  /// Recorded datasource to rewritten datasource.
  pub manifest: PackageManifest,
  /// Archive written for the package directory, when requested.
  pub archive: Option<PathBuf>,
}

impl PackageReport {
  /// Empty report for the given project.
  pub fn new(project_name: impl Into<String>, package_dir: PathBuf) -> Self {
    Self {
      project_name: project_name.into(),
      package_dir,
      succeeded: 0,
      failures: Vec::new(),
      skipped: Vec::new(),
      placements: Vec::new(),
      manifest: PackageManifest::new(),
      archive: None,
    }
  }

  /// Returns true when every file-backed reference was packaged.
  pub fn is_complete(&self) -> bool {
    self.failures.is_empty()
  }
}

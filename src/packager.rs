//! Packaging orchestrator: resolve every layer source, place it below the links directory and
//! rewrite the project to point at the copies.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::archive::compress_directory;
use crate::config::PackagerConfig;
use crate::datasource::{parse_datasource, should_ignore_datasource};
use crate::document::ProjectDocument;
use crate::error::ReferenceError;
use crate::models::{PackageReport, PlacementEntry, ReferenceFailure, SkippedReference, SourceReference};
use crate::placer::{LinkPlacer, PlacementRegistry, collect_sidecars};
use crate::resolver::{Resolver, absolutize};

/// Package a project with the configuration discovered next to it.
///
/// The package directory is `<output_root>/<ProjectName>_packaged` unless configured
/// otherwise. No archive is written; see [`Packager::package_and_archive`].
pub fn package_project<D: ProjectDocument>(doc: &mut D, output_root: &Path) -> Result<PackageReport> {
  let config = PackagerConfig::discover(&doc.project_directory());
  Packager::new(config).package(doc, output_root)
}

/// What happened to a single layer.
enum Outcome {
  Placed {
    entry: PlacementEntry,
    rewritten: String,
  },
  Skipped(String),
}

/// Shared state for one packaging run.
struct Run<'a> {
  project_dir: PathBuf,
  resolver: Resolver,
  placer: LinkPlacer<'a>,
  registry: PlacementRegistry,
}

/// Packages project documents according to a [`PackagerConfig`].
#[derive(Debug, Clone, Default)]
pub struct Packager {
  config: PackagerConfig,
}

impl Packager {
  /// Create a packager for the provided configuration.
  pub fn new(config: PackagerConfig) -> Self {
    Self { config }
  }

  /// Configuration used by this packager.
  pub fn config(&self) -> &PackagerConfig {
    &self.config
  }

  /// Copy every data source referenced by `doc` into a fresh package directory below
  /// `output_root`, rewrite the references and save the project there.
  ///
  /// Problems with individual references end up in the report. Only failures affecting the
  /// whole run, such as an unwritable output directory, are returned as errors.
  pub fn package<D: ProjectDocument>(&self, doc: &mut D, output_root: &Path) -> Result<PackageReport> {
    let project_dir = absolutize(&doc.project_directory());
    let project_name = doc.project_name();
    let package_dir = self.config.package_dir(&absolutize(output_root), &project_name);
    let links_dir = self.config.links_dir(&package_dir);

    if project_dir.starts_with(&package_dir) {
      bail!(
        "refusing to package into {} because it contains the project",
        package_dir.display()
      );
    }

    if package_dir.exists() {
      fs::remove_dir_all(&package_dir)
        .with_context(|| format!("failed to clear {}", package_dir.display()))?;
    }
    fs::create_dir_all(&links_dir)
      .with_context(|| format!("failed to create {}", links_dir.display()))?;
    info!(project = %doc.project_path().display(), package = %package_dir.display(), "packaging project");

    let mut search = self.config.search.clone();
    search.excluded_roots.push(package_dir.clone());

    let mut run = Run {
      project_dir,
      resolver: Resolver::new(search),
      placer: LinkPlacer::new(&links_dir, &self.config.placement),
      registry: PlacementRegistry::new(),
    };
    let mut report = PackageReport::new(project_name, package_dir.clone());

    for reference in doc.list_data_sources() {
      let outcome = self
        .process(&reference, &mut run)
        .map_err(|err| err.to_string())
        .and_then(|outcome| match outcome {
          Outcome::Placed { entry, rewritten } => doc
            .rewrite_source(&reference.layer_id, &rewritten)
            .map(|_| Outcome::Placed { entry, rewritten })
            .map_err(|err| err.to_string()),
          skipped => Ok(skipped),
        });

      match outcome {
        Ok(Outcome::Placed { entry, rewritten }) => {
          info!(layer = %reference.layer_name, destination = %entry.destination_relative_path, reused = entry.reused, "packaged layer");
          report.succeeded += 1;
          report.manifest.insert(reference.recorded_path.clone(), rewritten);
          report.placements.push(entry);
        }
        Ok(Outcome::Skipped(reason)) => {
          debug!(layer = %reference.layer_name, reason = %reason, "skipped layer");
          report.skipped.push(SkippedReference {
            layer_name: reference.layer_name.clone(),
            reason,
          });
        }
        Err(reason) => {
          warn!(layer = %reference.layer_name, recorded = %reference.recorded_path, "{reason}");
          report.failures.push(ReferenceFailure {
            layer_name: reference.layer_name.clone(),
            recorded_path: reference.recorded_path.clone(),
            reason,
          });
        }
      }
    }

    let saved = doc
      .save(&package_dir)
      .with_context(|| format!("failed to save project into {}", package_dir.display()))?;
    info!(
      project = %saved.display(),
      succeeded = report.succeeded,
      failed = report.failures.len(),
      skipped = report.skipped.len(),
      "package complete"
    );

    Ok(report)
  }

  /// [`Packager::package`] followed by zipping the package directory to `<package>.zip`.
  pub fn package_and_archive<D: ProjectDocument>(
    &self,
    doc: &mut D,
    output_root: &Path,
  ) -> Result<PackageReport> {
    let mut report = self.package(doc, output_root)?;
    let archive = self.config.archive_path(&report.package_dir);
    let files = compress_directory(&report.package_dir, &archive)?;
    info!(archive = %archive.display(), files, "archive created");
    report.archive = Some(archive);
    Ok(report)
  }

  fn process(&self, reference: &SourceReference, run: &mut Run<'_>) -> Result<Outcome, ReferenceError> {
    let recorded = reference.recorded_path.trim();
    if recorded.is_empty() || reference.provider.trim().is_empty() {
      return Ok(Outcome::Skipped("no datasource".into()));
    }
    if !self.config.is_file_provider(&reference.provider) {
      return Ok(Outcome::Skipped(format!(
        "provider `{}` is not file based",
        reference.provider
      )));
    }
    if should_ignore_datasource(recorded) {
      return Ok(Outcome::Skipped("datasource is not a local file".into()));
    }

    let uri = parse_datasource(recorded);
    let resolved = run.resolver.resolve(&uri.path, &run.project_dir);
    if !resolved.found {
      return Err(ReferenceError::Unresolved {
        layer_name: reference.layer_name.clone(),
        recorded_path: reference.recorded_path.clone(),
      });
    }
    debug!(layer = %reference.layer_name, found = %resolved.absolute_path.display(), strategy = ?resolved.strategy, "resolved datasource");

    let sidecars = if uri.is_archived() {
      Vec::new()
    } else {
      collect_sidecars(&resolved.absolute_path)?
    };

    let entry = run.placer.place(&resolved, &sidecars, &mut run.registry)?;
    let rewritten = uri.render(&format!(
      "{}/{}",
      self.config.links_dir_name, entry.destination_relative_path
    ));
    Ok(Outcome::Placed { entry, rewritten })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::document::QgisProject;
  use tempfile::tempdir;

  fn project_xml(layers: &[(&str, &str, &str)]) -> String {
    let body: String = layers
      .iter()
      .map(|(id, provider, source)| {
        format!(
          "<maplayer><id>{id}</id><datasource>{source}</datasource><layername>{id}</layername><provider>{provider}</provider></maplayer>\n"
        )
      })
      .collect();
    format!("<qgis><projectlayers>\n{body}</projectlayers></qgis>\n")
  }

  #[test]
  fn refuses_to_clear_a_directory_holding_the_project() {
    let temp = tempdir().unwrap();
    let project_dir = temp.path().join("demo_packaged/inner");
    fs::create_dir_all(&project_dir).unwrap();
    let mut doc = QgisProject::from_xml(project_dir.join("demo.qgs"), project_xml(&[]));

    let err = Packager::default().package(&mut doc, temp.path()).unwrap_err();
    assert!(err.to_string().contains("contains the project"));
    assert!(project_dir.exists());
  }

  #[test]
  fn skips_non_file_layers_and_reports_missing_ones() {
    let temp = tempdir().unwrap();
    let project_dir = temp.path().join("project");
    fs::create_dir_all(project_dir.join("data")).unwrap();
    fs::write(project_dir.join("data/points.gpkg"), b"gpkg").unwrap();
    let xml = project_xml(&[
      ("points", "ogr", "./data/points.gpkg|layername=points"),
      ("db", "postgres", "dbname='gis' host=db table=\"roads\""),
      ("osm", "wms", "type=xyz&amp;url=https://tile.openstreetmap.org"),
      ("lost", "ogr", "./data/lost.shp"),
      ("empty", "ogr", ""),
    ]);
    let mut doc = QgisProject::from_xml(project_dir.join("demo.qgs"), xml);

    let mut config = PackagerConfig::default();
    config.search.ancestor_depth = 0;
    let report = Packager::new(config).package(&mut doc, temp.path()).unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.skipped.len(), 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].layer_name, "lost");
    assert_eq!(report.failures[0].recorded_path, "./data/lost.shp");
    assert_eq!(
      report.manifest.get("./data/points.gpkg|layername=points").map(String::as_str),
      Some("./Links/points.gpkg|layername=points")
    );

    let saved = fs::read_to_string(temp.path().join("demo_packaged/demo.qgs")).unwrap();
    assert!(saved.contains("<datasource>./Links/points.gpkg|layername=points</datasource>"));
    assert!(saved.contains("<datasource>./data/lost.shp</datasource>"));
  }
  #[cfg(target_os = "linux")]
  #[test]
  fn copy_failures_are_reported_and_later_layers_still_packaged() {
    let temp = tempdir().unwrap();
    let project_dir = temp.path().join("project");
    fs::create_dir_all(&project_dir).unwrap();
    fs::write(project_dir.join("points.gpkg"), b"gpkg").unwrap();
    // Reading unmapped memory through procfs fails, even for privileged users.
    let xml = project_xml(&[
      ("memory_dump", "ogr", "/proc/self/mem"),
      ("points", "ogr", "points.gpkg"),
    ]);
    let mut doc = QgisProject::from_xml(project_dir.join("demo.qgs"), xml);

    let mut config = PackagerConfig::default();
    config.search.ancestor_depth = 0;
    let report = Packager::new(config).package(&mut doc, temp.path()).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].layer_name, "memory_dump");
    assert!(report.failures[0].reason.starts_with("failed to copy /proc/self/mem"));
    assert!(!report.manifest.contains_key("/proc/self/mem"));
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.placements.len(), 1);
    assert_eq!(report.placements[0].destination_relative_path, "points.gpkg");

    let saved = fs::read_to_string(temp.path().join("demo_packaged/demo.qgs")).unwrap();
    assert!(saved.contains("<datasource>/proc/self/mem</datasource>"));
    assert!(saved.contains("<datasource>./Links/points.gpkg</datasource>"));
  }

  #[test]
  fn sidecars_referenced_as_layers_reuse_their_copy() {
    let temp = tempdir().unwrap();
    let project_dir = temp.path().join("project");
    fs::create_dir_all(project_dir.join("data")).unwrap();
    for name in ["roads.shp", "roads.shx", "roads.dbf"] {
      fs::write(project_dir.join("data").join(name), name).unwrap();
    }
    let xml = project_xml(&[
      ("roads", "ogr", "./data/roads.shp"),
      ("attributes", "ogr", "./data/roads.dbf"),
    ]);
    let mut doc = QgisProject::from_xml(project_dir.join("demo.qgs"), xml);

    let mut config = PackagerConfig::default();
    config.search.ancestor_depth = 0;
    let report = Packager::new(config).package(&mut doc, temp.path()).unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.placements[0].sidecars, vec!["roads.dbf", "roads.shx"]);
    assert!(report.placements[1].reused);
    assert_eq!(report.placements[1].destination_relative_path, "roads.dbf");
    assert_eq!(
      report.manifest.get("./data/roads.dbf").map(String::as_str),
      Some("./Links/roads.dbf")
    );

    let links = temp.path().join("demo_packaged/Links");
    let copied: Vec<_> = fs::read_dir(&links).unwrap().collect();
    assert_eq!(copied.len(), 3);
  }
}

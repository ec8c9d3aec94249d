use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

const PROJECT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<qgis projectname="site">
  <projectlayers>
    <maplayer type="vector">
      <id>roads</id>
      <datasource>./roads.shp</datasource>
      <layername>Roads</layername>
      <provider encoding="UTF-8">ogr</provider>
    </maplayer>
    <maplayer type="raster">
      <id>orthophoto</id>
      <datasource>D:/survey/2019/ortho.tif</datasource>
      <layername>Orthophoto</layername>
      <provider>gdal</provider>
    </maplayer>
  </projectlayers>
</qgis>
"#;

fn fixture(base: &Path) -> PathBuf {
  let project_dir = base.join("site");
  fs::create_dir_all(&project_dir).unwrap();
  fs::write(project_dir.join("roads.shp"), b"shp").unwrap();
  fs::write(project_dir.join("roads.dbf"), b"dbf").unwrap();
  let project = project_dir.join("site.qgs");
  fs::write(&project, PROJECT).unwrap();
  project
}

#[test]
fn prints_json_report_and_writes_archive() {
  let tmp = TempDir::new().unwrap();
  let project = fixture(tmp.path());
  let output = tmp.path().join("out");

  let mut cmd = cargo_bin_cmd!("qgis-bundler");
  cmd
    .arg(&project)
    .args(["--json", "--search-depth", "0", "--output"])
    .arg(&output);
  let stdout = cmd.assert().success().get_output().stdout.clone();
  let report: Value = serde_json::from_slice(&stdout).expect("valid json output");

  assert_eq!(report["projectName"], "site");
  assert_eq!(report["succeeded"], 1);
  assert_eq!(report["failures"][0]["layerName"], "Orthophoto");
  assert_eq!(report["placements"][0]["destinationRelativePath"], "roads.shp");
  assert_eq!(report["placements"][0]["sidecars"][0], "roads.dbf");
  assert_eq!(report["manifest"]["./roads.shp"], "./Links/roads.shp");

  assert!(output.join("site_packaged/Links/roads.dbf").is_file());
  assert!(output.join("site_packaged/site.qgs").is_file());
  assert!(output.join("site_packaged.zip").is_file());
}

#[test]
fn strict_mode_fails_on_missing_layers() {
  let tmp = TempDir::new().unwrap();
  let project = fixture(tmp.path());

  let mut cmd = cargo_bin_cmd!("qgis-bundler");
  cmd
    .arg(&project)
    .args(["--strict", "--no-archive", "--search-depth", "0"]);
  let assert = cmd.assert().code(2);
  let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
  assert!(stdout.contains("Failed: 1 layers"), "{stdout}");
  assert!(stdout.contains("missing: Orthophoto"), "{stdout}");

  let package = tmp.path().join("site/site_packaged");
  assert!(package.join("Links/roads.shp").is_file());
  assert!(!tmp.path().join("site/site_packaged.zip").exists());
}

#[test]
fn missing_layers_are_not_fatal_without_strict() {
  let tmp = TempDir::new().unwrap();
  let project = fixture(tmp.path());

  let mut cmd = cargo_bin_cmd!("qgis-bundler");
  cmd.arg(&project).args(["--no-archive", "--search-depth", "0"]);
  cmd.assert().success();
}

#[test]
fn rejects_unsupported_project_files() {
  let tmp = TempDir::new().unwrap();
  let bogus = tmp.path().join("notes.txt");
  fs::write(&bogus, "not a project").unwrap();

  let mut cmd = cargo_bin_cmd!("qgis-bundler");
  cmd.arg(&bogus);
  let assert = cmd.assert().code(1);
  let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
  assert!(stderr.contains("unsupported project file"), "{stderr}");
}

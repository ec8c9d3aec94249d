//! Packager configuration describing output layout and search bounds.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::placer::PlacementOptions;
use crate::resolver::SearchOptions;

/// File name looked up next to the project when no configuration is given explicitly.
pub const DEFAULT_CONFIG_FILE: &str = "qgis_bundler.config.json";

/// Discoverable configuration for a packaging run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagerConfig {
    /// Directory inside the package that receives every copied data source.
    pub links_dir_name: String,
    /// Suffix appended to the project name to form the package directory name.
    pub package_suffix: String,
    /// Provider keys whose datasources are local files.
    pub file_providers: Vec<String>,
    /// Compress the package directory into `<package>.zip` after packaging.
    pub create_archive: bool,
    /// Bounds for locating moved files.
    pub search: SearchOptions,
    /// Destination naming rules.
    pub placement: PlacementOptions,
}

impl Default for PackagerConfig {
    fn default() -> Self {
        Self {
            links_dir_name: "Links".into(),
            package_suffix: "_packaged".into(),
            file_providers: vec!["ogr".into(), "gdal".into()],
            create_archive: true,
            search: SearchOptions::default(),
            placement: PlacementOptions::default(),
        }
    }
}

impl PackagerConfig {
    /// Attempt to load configuration from the project directory.
    ///
    /// When the configuration file does not exist or fails to parse we fall back to default
    /// values so packaging can proceed with sensible assumptions.
    pub fn discover(project_dir: &Path) -> Self {
        let candidate = project_dir.join(DEFAULT_CONFIG_FILE);
        Self::from_path(&candidate).unwrap_or_default()
    }

    /// Read configuration from a specific JSON file, ignoring unreadable files.
    pub fn from_path(path: &Path) -> Option<Self> {
        Self::load(path).ok()
    }

    /// Read configuration from a specific JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        self.placement = self.placement.normalized();
        self
    }

    /// Whether datasources of `provider` are files that can be packaged.
    pub fn is_file_provider(&self, provider: &str) -> bool {
        self.file_providers
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(provider.trim()))
    }

    /// Package directory for `project_name` below `output_root`.
    pub fn package_dir(&self, output_root: &Path, project_name: &str) -> PathBuf {
        output_root.join(format!("{project_name}{}", self.package_suffix))
    }

    /// Links directory inside `package_dir`.
    pub fn links_dir(&self, package_dir: &Path) -> PathBuf {
        package_dir.join(&self.links_dir_name)
    }

    /// Archive written next to `package_dir`.
    pub fn archive_path(&self, package_dir: &Path) -> PathBuf {
        let mut name = package_dir
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".zip");
        package_dir.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn falls_back_to_defaults() {
        let temp = tempdir().unwrap();
        let config = PackagerConfig::discover(temp.path());
        assert_eq!(config, PackagerConfig::default());
        assert_eq!(config.search.ancestor_depth, 3);

        fs::write(temp.path().join(DEFAULT_CONFIG_FILE), "{ not json").unwrap();
        assert_eq!(PackagerConfig::discover(temp.path()), PackagerConfig::default());
        assert!(PackagerConfig::load(&temp.path().join(DEFAULT_CONFIG_FILE)).is_err());
    }

    #[test]
    fn merges_partial_configuration() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join(DEFAULT_CONFIG_FILE),
            r#"{
                "links_dir_name": "Data",
                "search": { "ancestor_depth": 5 },
                "placement": { "generic_dir_names": ["Shared"] }
            }"#,
        )
        .unwrap();

        let config = PackagerConfig::discover(temp.path());
        assert_eq!(config.links_dir_name, "Data");
        assert_eq!(config.package_suffix, "_packaged");
        assert_eq!(config.search.ancestor_depth, 5);
        assert_eq!(config.search.max_walk_depth, 12);
        assert!(config.placement.generic_dir_names.contains("shared"));
        assert!(config.create_archive);
    }

    #[test]
    fn derives_output_paths() {
        let config = PackagerConfig::default();
        let package = config.package_dir(Path::new("/out"), "survey");
        assert_eq!(package, PathBuf::from("/out/survey_packaged"));
        assert_eq!(config.links_dir(&package), PathBuf::from("/out/survey_packaged/Links"));
        assert_eq!(config.archive_path(&package), PathBuf::from("/out/survey_packaged.zip"));
        assert!(config.is_file_provider("GDAL"));
        assert!(!config.is_file_provider("postgres"));
    }
}

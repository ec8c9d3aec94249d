//! The project document whose layer sources get packaged.
//!
//! The packager only needs to list layer sources, point a layer at a new source and save the
//! result, so the document is abstracted behind [`ProjectDocument`]. [`QgisProject`] is the
//! implementation for `.qgs` and `.qgz` files.

mod qgis;
mod xml;

use std::path::{Path, PathBuf};

use crate::error::DocumentError;
use crate::models::SourceReference;

pub use qgis::QgisProject;
pub use xml::{escape_text, unescape_text};

/// Operations the packager requires from a project document.
pub trait ProjectDocument {
  /// Location of the document on disk.
  fn project_path(&self) -> &Path;

  /// Every layer with its recorded datasource.
  fn list_data_sources(&self) -> Vec<SourceReference>;

  /// Point `layer_id` at `new_source` in the in-memory document.
  fn rewrite_source(&mut self, layer_id: &str, new_source: &str) -> Result<(), DocumentError>;

  /// Write the document into `output_dir` under its original file name and return the path.
  fn save(&self, output_dir: &Path) -> Result<PathBuf, DocumentError>;

  /// File name of the document without its extension.
  fn project_name(&self) -> String {
    self
      .project_path()
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_else(|| "project".to_string())
  }

  /// Directory containing the document.
  fn project_directory(&self) -> PathBuf {
    self
      .project_path()
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default()
  }
}

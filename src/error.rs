//! Error kinds raised while packaging individual references and reading project documents.

use std::path::PathBuf;

use thiserror::Error;

/// Failure confined to a single data source reference.
///
/// These never abort a run; the packager converts them into report entries.
#[derive(Debug, Error)]
pub enum ReferenceError {
  /// No existing file matched the recorded path within the search bounds.
  #[error("could not locate `{recorded_path}` for layer `{layer_name}`")]
  Unresolved {
    /// Layer name as shown in the project.
    layer_name: String,
    /// Datasource string recorded in the project.
    recorded_path: String,
  },
  /// Copying the primary file or one of its sidecars failed.
  #[error("failed to copy {} to {}: {source}", from.display(), to.display())]
  CopyFailure {
    /// Source file.
    from: PathBuf,
    /// Destination file.
    to: PathBuf,
    /// Underlying filesystem error.
    #[source]
    source: std::io::Error,
  },
  /// The directory holding a multi-file source could not be listed.
  #[error("failed to list sidecars in {}: {source}", dir.display())]
  SidecarScan {
    /// Directory of the primary file.
    dir: PathBuf,
    /// Underlying filesystem error.
    #[source]
    source: std::io::Error,
  },
  /// No unique destination name could be produced.
  #[error("no free destination left for {}", source_path.display())]
  CollisionExhaustion {
    /// Source file that could not be placed.
    source_path: PathBuf,
  },
}

/// Errors raised by the project document collaborator.
#[derive(Debug, Error)]
pub enum DocumentError {
  /// Reading or writing the project failed.
  #[error("failed to access {}: {source}", path.display())]
  Io {
    /// Path that caused the error.
    path: PathBuf,
    /// Source I/O error.
    #[source]
    source: std::io::Error,
  },
  /// The `.qgz` container could not be read or written.
  #[error("invalid project archive {}: {source}", path.display())]
  Zip {
    /// Archive path.
    path: PathBuf,
    /// Source zip error.
    #[source]
    source: zip::result::ZipError,
  },
  /// The `.qgz` container holds no `.qgs` document.
  #[error("{} does not contain a .qgs project", path.display())]
  MissingProjectEntry {
    /// Archive path.
    path: PathBuf,
  },
  /// The project file extension is neither `.qgs` nor `.qgz`.
  #[error("unsupported project file {}", path.display())]
  Unsupported {
    /// Offending path.
    path: PathBuf,
  },
  /// A rewrite targeted a layer that does not exist.
  #[error("no layer with id `{0}`")]
  UnknownLayer(String),
}

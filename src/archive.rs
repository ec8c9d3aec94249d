//! Compress a finished package directory into a single zip archive.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zip every regular file below `dir` into `zip_path` and return the number of files written.
///
/// Entry names are relative to `dir`, use `/` separators and are written in sorted order so
/// that identical trees produce identical archives.
pub fn compress_directory(dir: &Path, zip_path: &Path) -> Result<usize> {
  if let Some(parent) = zip_path.parent() {
    fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
  }

  let file =
    File::create(zip_path).with_context(|| format!("failed to create {}", zip_path.display()))?;
  let mut writer = ZipWriter::new(file);
  let options = SimpleFileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .large_file(true);

  let mut written = 0;
  for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
    let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
    if !entry.file_type().is_file() {
      continue;
    }

    let relative = entry
      .path()
      .strip_prefix(dir)
      .with_context(|| format!("{} escaped {}", entry.path().display(), dir.display()))?;
    let name = relative
      .components()
      .map(|component| component.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");

    writer
      .start_file(name.as_str(), options)
      .with_context(|| format!("failed to add {name} to {}", zip_path.display()))?;
    let mut source = File::open(entry.path())
      .with_context(|| format!("failed to read {}", entry.path().display()))?;
    io::copy(&mut source, &mut writer)
      .with_context(|| format!("failed to compress {}", entry.path().display()))?;
    written += 1;
  }

  writer
    .finish()
    .with_context(|| format!("failed to finish {}", zip_path.display()))?;
  Ok(written)
}

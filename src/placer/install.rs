//! Copy source files into the links tree.

use std::fs;
use std::path::Path;

use same_file::is_same_file;

/// Copy `source` to `destination`, creating parent directories.
///
/// An existing destination that already is the source file is left untouched; any other
/// existing file is replaced.
pub fn install_file(source: &Path, destination: &Path) -> std::io::Result<()> {
  if let Some(parent) = destination.parent() {
    fs::create_dir_all(parent)?;
  }

  if destination.exists() {
    if is_same_file(source, destination)? {
      return Ok(());
    }
    fs::remove_file(destination)?;
  }

  fs::copy(source, destination).map(|_| ())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn copies_bytes_into_new_directories() -> std::io::Result<()> {
    let temp = tempdir()?;
    let source = temp.path().join("source.shp");
    fs::write(&source, b"geometry")?;
    let destination = temp.path().join("Links/Town1/source.shp");

    install_file(&source, &destination)?;
    assert_eq!(fs::read(&destination)?, b"geometry");
    assert!(!same_file::is_same_file(&source, &destination)?);
    Ok(())
  }

  #[test]
  fn replaces_stale_destination_and_keeps_self_copies() -> std::io::Result<()> {
    let temp = tempdir()?;
    let source = temp.path().join("dem.tif");
    fs::write(&source, b"new")?;
    let destination = temp.path().join("out/dem.tif");
    fs::create_dir_all(temp.path().join("out"))?;
    fs::write(&destination, b"old")?;

    install_file(&source, &destination)?;
    assert_eq!(fs::read(&destination)?, b"new");

    install_file(&source, &source)?;
    assert_eq!(fs::read(&source)?, b"new");
    Ok(())
  }
}

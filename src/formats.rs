//! Table of file formats that travel with companion files.
//!
//! A format is described by the extensions of its primary file and the suffixes of the
//! sidecars that share the primary file's base name. Adding support for another multi-file
//! format only requires a new [`FormatSpec`] row in [`FORMATS`].

use std::path::Path;

use serde::Serialize;

/// Broad classification of a layer's data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
  /// Feature data read through OGR.
  Vector,
  /// Grid data read through GDAL.
  Raster,
  /// A layer living inside a zip archive; the archive is copied as one unit.
  Archived,
}

impl SourceFormat {
  /// Classify a layer from its provider key and whether it points inside an archive.
  pub fn classify(provider: &str, archived: bool) -> Self {
    if archived {
      Self::Archived
    } else if provider.eq_ignore_ascii_case("gdal") {
      Self::Raster
    } else {
      Self::Vector
    }
  }
}

/// Capability row describing one multi-file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
  /// Display name of the format.
  pub name: &'static str,
  /// Lowercase extensions (without dot) identifying the primary file.
  pub primary_extensions: &'static [&'static str],
  /// Lowercase suffixes appended to the base name to form sidecar file names.
  pub sidecar_suffixes: &'static [&'static str],
  /// Whether sidecar suffixes replace the primary extension (`roads.dbf`) or may also extend
  /// the full file name (`dem.tif.aux.xml`).
  pub stem: SidecarStem,
}

/// Which base name sidecar suffixes attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarStem {
  /// Suffixes follow the file name without its extension.
  WithoutExtension,
  /// Suffixes follow either the stem or the full file name.
  Both,
}

/// Every multi-file format known to the packager.
pub const FORMATS: &[FormatSpec] = &[
  FormatSpec {
    name: "ESRI Shapefile",
    primary_extensions: &["shp"],
    sidecar_suffixes: &[
      ".dbf", ".shx", ".prj", ".cpg", ".qix", ".sbn", ".sbx", ".shp.xml", ".fix", ".qpj", ".qmd",
    ],
    stem: SidecarStem::WithoutExtension,
  },
  FormatSpec {
    name: "MapInfo TAB",
    primary_extensions: &["tab"],
    sidecar_suffixes: &[".dat", ".map", ".id", ".ind", ".cpg", ".qix"],
    stem: SidecarStem::WithoutExtension,
  },
  FormatSpec {
    name: "GeoTIFF",
    primary_extensions: &["tif", "tiff"],
    sidecar_suffixes: &[".tfw", ".tifw", ".tiffw", ".wld", ".prj", ".aux.xml", ".ovr", ".msk"],
    stem: SidecarStem::Both,
  },
  FormatSpec {
    name: "World-file image",
    primary_extensions: &["jpg", "jpeg", "png", "gif", "bmp"],
    sidecar_suffixes: &[".jgw", ".jpgw", ".pgw", ".pngw", ".gfw", ".bpw", ".wld", ".prj", ".aux.xml", ".ovr"],
    stem: SidecarStem::Both,
  },
  FormatSpec {
    name: "ECW / JPEG 2000",
    primary_extensions: &["ecw", "jp2"],
    sidecar_suffixes: &[".eww", ".j2w", ".prj", ".aux.xml", ".ovr"],
    stem: SidecarStem::Both,
  },
];

/// Lowercase extension of the final path segment, if any.
fn lowercase_extension(path: &Path) -> Option<String> {
  path
    .extension()
    .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Find the format row whose primary extension matches `path`.
pub fn format_for_path(path: &Path) -> Option<&'static FormatSpec> {
  let ext = lowercase_extension(path)?;
  FORMATS
    .iter()
    .find(|spec| spec.primary_extensions.contains(&ext.as_str()))
}

/// Returns true when files of this type carry companion files.
pub fn has_sidecars(path: &Path) -> bool {
  format_for_path(path).is_some_and(|spec| !spec.sidecar_suffixes.is_empty())
}

/// A sidecar located next to a primary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sidecar {
  /// Base name the sidecar attaches to (`roads` or `dem.tif`).
  pub base: String,
  /// Remainder of the file name after the base, as found on disk (`.dbf`, `.DBF`, `.aux.xml`).
  pub suffix: String,
}

impl FormatSpec {
  /// Base names of a primary file that sidecar suffixes may attach to.
  pub fn sidecar_bases(&self, file_name: &str) -> Vec<String> {
    let stem = match file_name.rfind('.') {
      Some(index) if index > 0 => &file_name[..index],
      _ => file_name,
    };
    match self.stem {
      SidecarStem::WithoutExtension => vec![stem.to_string()],
      SidecarStem::Both => vec![stem.to_string(), file_name.to_string()],
    }
  }

  /// Match a sibling file name against this format's sidecars for the given primary file.
  ///
  /// The base name must match exactly; the suffix is compared without regard to case.
  pub fn match_sidecar(&self, primary_name: &str, sibling_name: &str) -> Option<Sidecar> {
    if sibling_name == primary_name {
      return None;
    }

    // Longer bases first so `dem.tif.aux.xml` binds to `dem.tif` rather than `dem`.
    let mut bases = self.sidecar_bases(primary_name);
    bases.sort_by_key(|base| std::cmp::Reverse(base.len()));

    bases.into_iter().find_map(|base| {
      let suffix = sibling_name.strip_prefix(base.as_str())?;
      let lowered = suffix.to_ascii_lowercase();
      self
        .sidecar_suffixes
        .contains(&lowered.as_str())
        .then(|| Sidecar {
          base: base.clone(),
          suffix: suffix.to_string(),
        })
    })
  }
}

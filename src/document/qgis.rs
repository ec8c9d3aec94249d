//! QGIS project files (`.qgs` XML and `.qgz` zip containers).

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::ProjectDocument;
use super::xml::{escape_text, unescape_text};
use crate::datasource::{file_name_of, parse_datasource};
use crate::error::DocumentError;
use crate::formats::{SourceFormat, has_sidecars};
use crate::models::SourceReference;

fn maplayer_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"(?s)<maplayer\b[^>]*>(.*?)</maplayer>").expect("invalid maplayer regex")
  })
}

fn element_pattern(name: &str) -> Regex {
  Regex::new(&format!(r"(?s)<{name}\b[^>]*>(.*?)</{name}>")).expect("invalid element regex")
}

fn layer_field_patterns() -> &'static [Regex; 4] {
  static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
  PATTERNS.get_or_init(|| {
    [
      element_pattern("id"),
      element_pattern("datasource"),
      element_pattern("layername"),
      element_pattern("provider"),
    ]
  })
}

fn absolute_paths_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(<Absolute\b[^>]*>)\s*true\s*(</Absolute>)"#).expect("invalid absolute regex")
  })
}

/// Layer fields located in the project XML.
#[derive(Debug, Clone)]
struct LayerRecord {
  id: String,
  name: String,
  provider: String,
  datasource: String,
  /// Byte range of the datasource text inside the XML document.
  datasource_span: Option<Range<usize>>,
}

#[derive(Debug, Clone)]
enum Container {
  Plain,
  Zipped {
    /// Name of the `.qgs` member inside the archive.
    entry_name: String,
    /// Every other member, in archive order, with its contents.
    members: Vec<(String, Vec<u8>)>,
  },
}

/// A QGIS project loaded into memory.
#[derive(Debug, Clone)]
pub struct QgisProject {
  path: PathBuf,
  xml: String,
  container: Container,
  layers: Vec<LayerRecord>,
  rewrites: BTreeMap<String, String>,
}

impl QgisProject {
  /// Load a `.qgs` or `.qgz` project from disk.
  pub fn open(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
    let path = crate::resolver::absolutize(path.as_ref());
    let extension = path
      .extension()
      .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

    let (xml, container) = match extension.as_deref() {
      Some("qgs") => {
        let xml = fs::read_to_string(&path).map_err(|source| DocumentError::Io {
          path: path.clone(),
          source,
        })?;
        (xml, Container::Plain)
      }
      Some("qgz") => read_qgz(&path)?,
      _ => return Err(DocumentError::Unsupported { path }),
    };

    Ok(Self::from_parts(path, xml, container))
  }

  /// Build a plain `.qgs` project from XML text, as if it had been read from `path`.
  pub fn from_xml(path: impl Into<PathBuf>, xml: impl Into<String>) -> Self {
    Self::from_parts(path.into(), xml.into(), Container::Plain)
  }

  fn from_parts(path: PathBuf, xml: String, container: Container) -> Self {
    let layers = parse_layers(&xml);
    Self {
      path,
      xml,
      container,
      layers,
      rewrites: BTreeMap::new(),
    }
  }

  /// Whether the project is stored in a `.qgz` container.
  pub fn is_zipped(&self) -> bool {
    matches!(self.container, Container::Zipped { .. })
  }

  /// Project XML with every pending rewrite applied.
  ///
  /// Rewritten projects store relative paths, so the project's absolute-path setting is
  /// switched off whenever at least one source was rewritten.
  pub fn render_xml(&self) -> String {
    let mut spans: Vec<(&Range<usize>, &String)> = self
      .layers
      .iter()
      .filter_map(|layer| {
        let new_source = self.rewrites.get(&layer.id)?;
        Some((layer.datasource_span.as_ref()?, new_source))
      })
      .collect();
    spans.sort_by_key(|(span, _)| span.start);

    let mut rendered = String::with_capacity(self.xml.len());
    let mut cursor = 0;
    for (span, new_source) in spans {
      rendered.push_str(&self.xml[cursor..span.start]);
      rendered.push_str(&escape_text(new_source));
      cursor = span.end;
    }
    rendered.push_str(&self.xml[cursor..]);

    if self.rewrites.is_empty() {
      rendered
    } else {
      absolute_paths_pattern()
        .replace_all(&rendered, "${1}false${2}")
        .into_owned()
    }
  }
}

impl ProjectDocument for QgisProject {
  fn project_path(&self) -> &Path {
    &self.path
  }

  fn list_data_sources(&self) -> Vec<SourceReference> {
    self
      .layers
      .iter()
      .map(|layer| {
        let uri = parse_datasource(&layer.datasource);
        let is_sidecar_group = file_name_of(&uri.path).is_some_and(|name| has_sidecars(Path::new(name)));
        SourceReference {
          layer_id: layer.id.clone(),
          layer_name: layer.name.clone(),
          provider: layer.provider.clone(),
          recorded_path: layer.datasource.clone(),
          format: SourceFormat::classify(&layer.provider, uri.is_archived()),
          is_sidecar_group: is_sidecar_group && !uri.is_archived(),
        }
      })
      .collect()
  }

  fn rewrite_source(&mut self, layer_id: &str, new_source: &str) -> Result<(), DocumentError> {
    let layer = self
      .layers
      .iter()
      .find(|layer| layer.id == layer_id)
      .ok_or_else(|| DocumentError::UnknownLayer(layer_id.to_string()))?;
    if layer.datasource_span.is_none() {
      return Err(DocumentError::UnknownLayer(layer_id.to_string()));
    }
    self
      .rewrites
      .insert(layer_id.to_string(), new_source.to_string());
    Ok(())
  }

  fn save(&self, output_dir: &Path) -> Result<PathBuf, DocumentError> {
    let file_name = self
      .path
      .file_name()
      .map(|name| name.to_os_string())
      .ok_or_else(|| DocumentError::Unsupported {
        path: self.path.clone(),
      })?;
    let target = output_dir.join(file_name);
    let xml = self.render_xml();

    match &self.container {
      Container::Plain => fs::write(&target, xml).map_err(|source| DocumentError::Io {
        path: target.clone(),
        source,
      })?,
      Container::Zipped {
        entry_name,
        members,
      } => write_qgz(&target, entry_name, xml.as_bytes(), members)?,
    }

    Ok(target)
  }
}

fn parse_layers(xml: &str) -> Vec<LayerRecord> {
  let [id_re, datasource_re, name_re, provider_re] = layer_field_patterns();

  maplayer_pattern()
    .captures_iter(xml)
    .enumerate()
    .filter_map(|(index, caps)| {
      let body = caps.get(1)?;
      let text = |re: &Regex| {
        re.captures(body.as_str())
          .and_then(|inner| inner.get(1))
          .map(|m| unescape_text(m.as_str().trim()).into_owned())
          .unwrap_or_default()
      };

      let id = Some(text(id_re))
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("maplayer-{index}"));
      let datasource_span = datasource_re
        .captures(body.as_str())
        .and_then(|inner| inner.get(1))
        .map(|m| body.start() + m.start()..body.start() + m.end());

      Some(LayerRecord {
        id,
        name: Some(text(name_re))
          .filter(|name| !name.is_empty())
          .unwrap_or_else(|| "unnamed".to_string()),
        provider: text(provider_re),
        datasource: text(datasource_re),
        datasource_span,
      })
    })
    .collect()
}

fn zip_error(path: &Path) -> impl FnOnce(zip::result::ZipError) -> DocumentError + '_ {
  move |source| DocumentError::Zip {
    path: path.to_path_buf(),
    source,
  }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> DocumentError + '_ {
  move |source| DocumentError::Io {
    path: path.to_path_buf(),
    source,
  }
}

fn read_qgz(path: &Path) -> Result<(String, Container), DocumentError> {
  let file = File::open(path).map_err(io_error(path))?;
  let mut archive = ZipArchive::new(file).map_err(zip_error(path))?;

  let stem = path
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_default();
  let preferred = format!("{stem}.qgs");

  let mut entry_name = None;
  let mut xml = String::new();
  let mut members = Vec::new();
  for index in 0..archive.len() {
    let mut member = archive.by_index(index).map_err(zip_error(path))?;
    if member.is_dir() {
      continue;
    }
    let name = member.name().to_string();
    let mut contents = Vec::new();
    member.read_to_end(&mut contents).map_err(io_error(path))?;

    let is_project = name.to_ascii_lowercase().ends_with(".qgs");
    let better = entry_name.is_none() || name == preferred;
    if is_project && better {
      if let Some(previous) = entry_name.replace(name.clone()) {
        members.push((previous, std::mem::take(&mut xml).into_bytes()));
      }
      xml = String::from_utf8(contents).map_err(|err| DocumentError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
      })?;
    } else {
      members.push((name, contents));
    }
  }

  let entry_name = entry_name.ok_or_else(|| DocumentError::MissingProjectEntry {
    path: path.to_path_buf(),
  })?;
  Ok((xml, Container::Zipped {
    entry_name,
    members,
  }))
}

fn write_qgz(
  target: &Path,
  entry_name: &str,
  xml: &[u8],
  members: &[(String, Vec<u8>)],
) -> Result<(), DocumentError> {
  let file = File::create(target).map_err(io_error(target))?;
  let mut writer = ZipWriter::new(file);
  let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

  writer
    .start_file(entry_name, options)
    .map_err(zip_error(target))?;
  writer.write_all(xml).map_err(io_error(target))?;

  for (name, contents) in members {
    writer
      .start_file(name.as_str(), options)
      .map_err(zip_error(target))?;
    writer.write_all(contents).map_err(io_error(target))?;
  }

  writer.finish().map_err(zip_error(target))?;
  Ok(())
}

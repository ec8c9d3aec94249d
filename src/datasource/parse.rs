const VSIZIP_PREFIX: &str = "/vsizip/";
const ZIP_EXTENSION: &str = ".zip";

/// Structured view of a layer datasource string.
///
/// QGIS stores file-backed sources as a path optionally followed by provider options after a
/// `|` separator (`roads.gpkg|layername=roads`). Layers read from inside a zip archive use the
/// GDAL `/vsizip/` prefix, in which case [`DataSourceUri::path`] is the archive itself and the
/// inner member is kept aside so it can be re-attached after the archive is relocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceUri {
    /// Filesystem path to resolve. For archived layers this is the archive file.
    pub path: String,
    /// Path of the layer inside the archive, when the source uses `/vsizip/`.
    pub archive_member: Option<String>,
    /// Provider options following the first `|`, without the separator.
    pub options: Option<String>,
}

impl DataSourceUri {
    /// Whether the source points inside a zip archive.
    pub fn is_archived(&self) -> bool {
        self.archive_member.is_some()
    }

    /// Rebuild the datasource string so it points at `relative_path`, a `/` separated path
    /// relative to the project file, while keeping options and archive members intact.
    ///
    /// The path is written with a leading `./` so QGIS reads it relative to the project.
    pub fn render(&self, relative_path: &str) -> String {
        let relative_path = relative_path.trim_start_matches("./");
        let mut rendered = match &self.archive_member {
            Some(member) if member.is_empty() => format!("{VSIZIP_PREFIX}./{relative_path}"),
            Some(member) => format!("{VSIZIP_PREFIX}./{relative_path}/{member}"),
            None => format!("./{relative_path}"),
        };

        if let Some(options) = &self.options {
            rendered.push('|');
            rendered.push_str(options);
        }

        rendered
    }
}

/// Split a raw datasource string into the file to copy, an optional archive member and
/// provider options.
pub fn parse_datasource(raw: &str) -> DataSourceUri {
    let trimmed = raw.trim();
    let (body, options) = match trimmed.split_once('|') {
        Some((body, options)) => (body, Some(options.to_string())),
        None => (trimmed, None),
    };

    let Some(archived) = body.strip_prefix(VSIZIP_PREFIX) else {
        return DataSourceUri {
            path: body.to_string(),
            archive_member: None,
            options,
        };
    };

    let (path, member) = match find_archive_end(archived) {
        Some(end) => (&archived[..end], archived[end..].trim_start_matches('/')),
        None => (archived, ""),
    };

    DataSourceUri {
        path: path.to_string(),
        archive_member: Some(member.to_string()),
        options,
    }
}

/// Byte offset just past the first `.zip` that ends a path segment.
fn find_archive_end(value: &str) -> Option<usize> {
    let lowered = value.to_ascii_lowercase();
    lowered.match_indices(ZIP_EXTENSION).find_map(|(index, _)| {
        let end = index + ZIP_EXTENSION.len();
        match lowered[end..].chars().next() {
            None | Some('/') | Some('\\') => Some(end),
            Some(_) => None,
        }
    })
}

/// Final segment of a recorded path, accepting both `/` and `\` separators so that projects
/// saved on Windows can be resolved on any host.
pub fn file_name_of(path: &str) -> Option<&str> {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_paths() {
        let uri = parse_datasource("  ./data/roads.shp ");
        assert_eq!(uri.path, "./data/roads.shp");
        assert!(!uri.is_archived());
        assert_eq!(uri.options, None);
        assert_eq!(uri.render("Links/roads.shp"), "./Links/roads.shp");
    }

    #[test]
    fn keeps_provider_options() {
        let uri = parse_datasource("../gpkg/base.gpkg|layername=parcels|subset=\"id\" > 3");
        assert_eq!(uri.path, "../gpkg/base.gpkg");
        assert_eq!(uri.options.as_deref(), Some("layername=parcels|subset=\"id\" > 3"));
        assert_eq!(
            uri.render("Links/base.gpkg"),
            "./Links/base.gpkg|layername=parcels|subset=\"id\" > 3"
        );
    }

    #[test]
    fn splits_archive_members() {
        let uri = parse_datasource("/vsizip/./data/Towns.ZIP/towns/towns.shp|layername=towns");
        assert_eq!(uri.path, "./data/Towns.ZIP");
        assert_eq!(uri.archive_member.as_deref(), Some("towns/towns.shp"));
        assert_eq!(
            uri.render("Links/Towns.ZIP"),
            "/vsizip/./Links/Towns.ZIP/towns/towns.shp|layername=towns"
        );
    }

    #[test]
    fn archive_extension_must_end_a_segment() {
        let uri = parse_datasource("/vsizip//data/zipper.zipped/archive.zip");
        assert_eq!(uri.path, "/data/zipper.zipped/archive.zip");
        assert_eq!(uri.archive_member.as_deref(), Some(""));
        assert_eq!(uri.render("Links/archive.zip"), "/vsizip/./Links/archive.zip");
    }

    #[test]
    fn blank_datasource_has_empty_path() {
        assert_eq!(parse_datasource("   ").path, "");
        assert_eq!(parse_datasource("|layername=x").path, "");
    }

    #[test]
    fn extracts_file_names_from_any_platform() {
        assert_eq!(file_name_of("C:\\GIS\\Town1\\contours.shp"), Some("contours.shp"));
        assert_eq!(file_name_of("../data/contours.shp"), Some("contours.shp"));
        assert_eq!(file_name_of("contours.shp"), Some("contours.shp"));
        assert_eq!(file_name_of("data/"), Some("data"));
        assert_eq!(file_name_of(".."), None);
        assert_eq!(file_name_of(""), None);
    }
}

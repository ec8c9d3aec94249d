use regex::Regex;

fn non_file_datasources() -> &'static [Regex] {
    use std::sync::OnceLock;

    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            vec![
                Regex::new(r"(?i)^(https?|ftp)://").expect("invalid url regex"),
                Regex::new(r"(?i)^/vsi(curl|s3|gs|az|adls|oss|swift)/").expect("invalid vsi network regex"),
                Regex::new(r"(?i)(^|\s)(dbname|service|host)\s*=").expect("invalid connection regex"),
                Regex::new(r"(?i)(^|&)(url|type)=").expect("invalid service uri regex"),
                Regex::new(r"(?i)^memory(\?|$)").expect("invalid memory regex"),
            ]
        })
        .as_slice()
}

/// Determine whether a datasource points at something other than a local file.
///
/// Database connections, web services and in-memory layers are left untouched by the
/// packager since there is nothing on disk to copy.
pub fn should_ignore_datasource(value: &str) -> bool {
    non_file_datasources()
        .iter()
        .any(|pattern| pattern.is_match(value.trim()))
}

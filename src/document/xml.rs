//! Minimal escaping for XML text nodes.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, Regex};

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"&(#x[0-9A-Fa-f]+|#[0-9]+|lt|gt|amp|quot|apos);").expect("invalid entity regex")
    })
}

/// Decode the predefined entities and numeric character references of an XML text node.
pub fn unescape_text(value: &str) -> Cow<'_, str> {
    entity_pattern().replace_all(value, |caps: &Captures<'_>| {
        let entity = &caps[1];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16))
                .unwrap_or_else(|| entity[1..].parse::<u32>())
                .ok()
                .and_then(char::from_u32),
        };
        decoded.map_or_else(|| caps[0].to_string(), String::from)
    })
}

/// Escape a string for use as XML text content.
pub fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

//! Helpers for interpreting the datasource strings stored in project layers.
//!
//! Parsing (option suffixes, archive members) and filtering of sources that are not files
//! live in separate submodules so each can be tested on its own.

mod filters;
mod parse;

pub use filters::should_ignore_datasource;
pub use parse::{DataSourceUri, file_name_of, parse_datasource};

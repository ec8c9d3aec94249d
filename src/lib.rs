#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod archive;
pub mod config;
pub mod datasource;
pub mod document;
pub mod error;
pub mod formats;
pub mod models;
pub mod packager;
pub mod placer;
pub mod resolver;

pub use config::PackagerConfig;
pub use document::{ProjectDocument, QgisProject};
pub use error::{DocumentError, ReferenceError};
pub use models::{PackageReport, PlacementEntry, ResolvedFile, SourceReference};
pub use packager::{Packager, package_project};
pub use placer::{LinkPlacer, PlacementRegistry};
pub use resolver::Resolver;

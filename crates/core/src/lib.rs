//! Core library: path mapping, tag index, clip store, media catalog and the
//! operations that keep them consistent with the media tree.

pub mod catalog;
pub mod clips;
pub mod collate;
pub mod config;
pub mod error;
pub mod media;
pub mod operations;
pub mod paths;
pub mod render;
pub mod tags;

pub use catalog::{Catalog, SharedCatalog};
pub use error::{CatalogError, OpReport, Result};

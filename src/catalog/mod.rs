//! Catalog normalization and feed assembly.

pub mod feed;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod raw;

pub use provider::{CatalogProvider, SearchKind};

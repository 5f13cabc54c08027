//! The contract a remote catalog must fulfil.

use async_trait::async_trait;
use thiserror::Error;

use super::models::SectionKind;
use super::raw::{RawAlbumPage, RawRecord, RawStreamRecord};

/// Provider-level failures surfaced to callers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("remote error {code}: {message}")]
    Remote { code: i32, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("operation not supported: {0}")]
    NotSupported(&'static str),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// What a search should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Songs,
    Albums,
}

/// A remote music catalog. Calls may be slow and may fail independently.
///
/// Records are returned undecoded; normalization happens in the core.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Search the catalog. An empty result is a valid success.
    async fn search(&self, query: &str, kind: SearchKind) -> ProviderResult<Vec<RawRecord>>;

    /// Records backing one feed section.
    async fn feed(&self, kind: SectionKind, limit: u32) -> ProviderResult<Vec<RawRecord>>;

    /// Resolve a fresh stream locator for a track.
    async fn resolve_stream(&self, track_id: &str) -> ProviderResult<RawStreamRecord>;

    /// An album and its tracks.
    async fn album(&self, browse_id: &str) -> ProviderResult<RawAlbumPage>;

    /// Query completions for a partial search.
    async fn suggestions(&self, _query: &str) -> ProviderResult<Vec<String>> {
        Ok(Vec::new())
    }
}

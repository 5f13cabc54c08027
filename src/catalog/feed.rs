//! Home feed assembly.

use futures::future::join_all;

use super::models::{FeedSection, SectionItems, SectionKind};
use super::normalize::{normalize_albums, normalize_tracks};
use super::provider::{CatalogProvider, ProviderError, ProviderResult, SearchKind};
use super::raw::RawRecord;

/// Raw records from one provider query, with the section they feed.
#[derive(Debug, Clone)]
pub struct RawGroup {
    pub label: String,
    pub kind: SectionKind,
    pub records: Vec<RawRecord>,
}

/// Normalize each group and keep the non-empty ones, in input order.
///
/// Sections are not deduplicated against each other.
pub fn build_sections(groups: Vec<RawGroup>) -> Vec<FeedSection> {
    groups
        .into_iter()
        .filter_map(|group| {
            let items = if group.kind.holds_albums() {
                SectionItems::Albums(normalize_albums(&group.records, None))
            } else {
                SectionItems::Tracks(normalize_tracks(&group.records, None))
            };

            if items.is_empty() {
                tracing::debug!("Dropping empty feed section {:?}", group.label);
                return None;
            }

            Some(FeedSection {
                title: group.label,
                kind: group.kind,
                items,
            })
        })
        .collect()
}

/// One feed query: a section label, the provider feed it reads, and an
/// optional search used when the feed fails or comes back empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub label: &'static str,
    pub kind: SectionKind,
    pub fallback_search: Option<&'static str>,
}

/// The home feed, top to bottom.
pub fn default_queries() -> Vec<FeedQuery> {
    vec![
        FeedQuery {
            label: "Trending songs for you",
            kind: SectionKind::TrendingSongs,
            fallback_search: Some("popular music"),
        },
        FeedQuery {
            label: "New releases",
            kind: SectionKind::NewAlbums,
            fallback_search: Some("new albums"),
        },
        FeedQuery {
            label: "Top tracks",
            kind: SectionKind::TopTracks,
            fallback_search: Some("top tracks"),
        },
        FeedQuery {
            label: "New singles",
            kind: SectionKind::NewReleases,
            fallback_search: Some("new singles"),
        },
    ]
}

async fn fetch_group(
    provider: &dyn CatalogProvider,
    query: &FeedQuery,
    limit: u32,
) -> ProviderResult<Vec<RawRecord>> {
    let primary = provider.feed(query.kind, limit).await;
    let Some(fallback) = query.fallback_search else {
        return primary;
    };

    let primary_error = match primary {
        Ok(records) if !records.is_empty() => return Ok(records),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Feed query {:?} failed, trying fallback: {}", query.label, e);
            Some(e)
        }
    };

    let search_kind = if query.kind.holds_albums() {
        SearchKind::Albums
    } else {
        SearchKind::Songs
    };
    match provider.search(fallback, search_kind).await {
        Ok(mut records) => {
            records.truncate(limit as usize);
            Ok(records)
        }
        // Report the primary failure if there was one.
        Err(e) => Err(primary_error.unwrap_or(e)),
    }
}

/// Run every feed query concurrently and assemble the sections.
///
/// A failed query contributes an empty group; the whole load fails only
/// when every query failed.
pub async fn load_feed(
    provider: &dyn CatalogProvider,
    queries: &[FeedQuery],
    limit: u32,
) -> ProviderResult<Vec<FeedSection>> {
    let results = join_all(
        queries
            .iter()
            .map(|query| fetch_group(provider, query, limit)),
    )
    .await;

    let mut first_error: Option<ProviderError> = None;
    let mut failures = 0;
    let mut groups = Vec::with_capacity(queries.len());

    for (query, result) in queries.iter().zip(results) {
        let records = match result {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Feed section {:?} unavailable: {}", query.label, e);
                failures += 1;
                first_error.get_or_insert(e);
                Vec::new()
            }
        };
        groups.push(RawGroup {
            label: query.label.to_string(),
            kind: query.kind,
            records,
        });
    }

    if !queries.is_empty() && failures == queries.len() {
        if let Some(e) = first_error {
            return Err(e);
        }
    }

    Ok(build_sections(groups))
}

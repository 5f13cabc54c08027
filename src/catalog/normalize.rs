//! Conversion of raw provider records into canonical models.
//!
//! Every function here is total: missing or malformed fields degrade to the
//! documented defaults, and batch functions skip (and log) records whose
//! identifier cannot be extracted instead of failing the batch.

use super::models::{Album, AlbumPage, Track};
use super::raw::{RawAlbum, RawAlbumPage, RawRecord, RawTrack};

/// Placeholder for missing titles and artists.
pub const UNKNOWN: &str = "Unknown";

/// Where a formatted duration is going to be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationContext {
    /// Now-playing and progress displays: unknown renders as `--:--`.
    Playback,
    /// Catalog rows: unknown renders as nothing.
    Listing,
}

/// Join artist names for display, falling back to `fallback` and then to
/// [`UNKNOWN`] when the list is absent or empty.
pub fn artist_display(artists: Option<&[String]>, fallback: Option<&str>) -> String {
    match artists {
        Some(names) if !names.is_empty() => names.join(", "),
        _ => fallback
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(UNKNOWN)
            .to_string(),
    }
}

/// Format seconds as `M:SS`.
pub fn format_duration(seconds: Option<u32>, context: DurationContext) -> String {
    match seconds {
        Some(secs) => format!("{}:{:02}", secs / 60, secs % 60),
        None => match context {
            DurationContext::Playback => String::from("--:--"),
            DurationContext::Listing => String::new(),
        },
    }
}

/// Format a millisecond position as `M:SS`.
pub fn format_millis(millis: u64) -> String {
    let secs = millis / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Parse an `M:SS` string back into seconds.
pub fn parse_duration(text: &str) -> Option<u32> {
    let (minutes, seconds) = text.trim().split_once(':')?;
    if seconds.len() != 2 {
        return None;
    }
    let minutes: u32 = minutes.parse().ok()?;
    let seconds: u32 = seconds.parse().ok()?;
    if seconds >= 60 {
        return None;
    }
    minutes.checked_mul(60)?.checked_add(seconds)
}

/// The value unchanged, unless it is missing or blank.
fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).map(String::from)
}

/// The explicit thumbnail wins; otherwise the last (largest) listed one.
fn pick_thumbnail(thumbnail: Option<&str>, thumbnails: Option<&[String]>) -> Option<String> {
    non_empty(thumbnail).or_else(|| {
        thumbnails
            .and_then(|urls| urls.iter().rev().find(|url| !url.trim().is_empty()))
            .cloned()
    })
}

pub fn normalize_track(raw: &RawTrack, fallback_artist: Option<&str>) -> Track {
    Track {
        id: raw.id.clone(),
        title: non_empty(raw.title.as_deref()).unwrap_or_else(|| UNKNOWN.to_string()),
        artist_display: artist_display(raw.artists.as_deref(), fallback_artist),
        duration_seconds: raw.duration,
        thumbnail_url: pick_thumbnail(raw.thumbnail.as_deref(), raw.thumbnails.as_deref()),
    }
}

pub fn normalize_album(raw: &RawAlbum, fallback_artist: Option<&str>) -> Album {
    Album {
        browse_id: raw.browse_id.clone(),
        title: non_empty(raw.title.as_deref()).unwrap_or_else(|| UNKNOWN.to_string()),
        artist_display: artist_display(raw.artists.as_deref(), fallback_artist),
        year: raw.year.map(|y| y.to_string()).unwrap_or_default(),
        thumbnail_url: pick_thumbnail(raw.thumbnail.as_deref(), raw.thumbnails.as_deref()),
        kind: raw.kind.unwrap_or_default(),
    }
}

/// Normalize a batch of track records, skipping malformed ones.
pub fn normalize_tracks(records: &[RawRecord], fallback_artist: Option<&str>) -> Vec<Track> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match RawTrack::decode(record) {
            Ok(raw) => Some(normalize_track(&raw, fallback_artist)),
            Err(e) => {
                tracing::warn!("Skipping record {}: {}", index, e);
                None
            }
        })
        .collect()
}

/// Normalize a batch of album records, skipping malformed ones.
pub fn normalize_albums(records: &[RawRecord], fallback_artist: Option<&str>) -> Vec<Album> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match RawAlbum::decode(record) {
            Ok(raw) => Some(normalize_album(&raw, fallback_artist)),
            Err(e) => {
                tracing::warn!("Skipping record {}: {}", index, e);
                None
            }
        })
        .collect()
}

/// Normalize an album and its tracks. Tracks without their own artist list
/// inherit the album's artists.
///
/// Returns `None` when the album record itself is malformed.
pub fn normalize_album_page(page: &RawAlbumPage) -> Option<AlbumPage> {
    let album = match RawAlbum::decode(&page.album) {
        Ok(raw) => normalize_album(&raw, None),
        Err(e) => {
            tracing::warn!("Album page unusable: {}", e);
            return None;
        }
    };
    let tracks = normalize_tracks(&page.tracks, Some(&album.artist_display));
    Some(AlbumPage { album, tracks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::AlbumKind;
    use serde_json::json;

    #[test]
    fn test_provider_scenario() {
        let records = vec![json!({
            "id": "v1",
            "title": "Song A",
            "duration": 185,
            "artists": [{"name": "X"}, {"name": "Y"}],
        })];
        let tracks = normalize_tracks(&records, None);
        assert_eq!(
            tracks,
            vec![Track {
                id: "v1".into(),
                title: "Song A".into(),
                artist_display: "X, Y".into(),
                duration_seconds: Some(185),
                thumbnail_url: None,
            }]
        );
        assert_eq!(
            format_duration(tracks[0].duration_seconds, DurationContext::Playback),
            "3:05"
        );
    }

    #[test]
    fn test_missing_artists_use_fallback() {
        for record in [
            json!({"id": "a"}),
            json!({"id": "b", "artists": []}),
            json!({"id": "c", "artists": null}),
            json!({"id": "d", "artists": [17]}),
        ] {
            let raw = RawTrack::decode(&record).unwrap();
            assert_eq!(normalize_track(&raw, Some("Band")).artist_display, "Band");
            assert_eq!(normalize_track(&raw, None).artist_display, "Unknown");
            assert_eq!(normalize_track(&raw, Some("  ")).artist_display, "Unknown");
        }
    }

    #[test]
    fn test_album_and_track_share_artist_rule() {
        let track = RawTrack::decode(&json!({"id": "t", "artists": ["A", "B"]})).unwrap();
        let album = RawAlbum::decode(&json!({"browseId": "b", "artists": ["A", "B"]})).unwrap();
        assert_eq!(
            normalize_track(&track, Some("F")).artist_display,
            normalize_album(&album, Some("F")).artist_display
        );
    }

    #[test]
    fn test_duration_formatting_contexts() {
        assert_eq!(format_duration(None, DurationContext::Playback), "--:--");
        assert_eq!(format_duration(None, DurationContext::Listing), "");
        assert_eq!(format_duration(Some(0), DurationContext::Listing), "0:00");
        assert_eq!(format_duration(Some(59), DurationContext::Listing), "0:59");
        assert_eq!(format_duration(Some(3600), DurationContext::Listing), "60:00");
        assert_eq!(format_millis(61_999), "1:01");
    }

    #[test]
    fn test_duration_round_trip_below_one_hour() {
        for secs in 0..3600 {
            let text = format_duration(Some(secs), DurationContext::Listing);
            assert_eq!(parse_duration(&text), Some(secs), "{text}");
        }
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert_eq!(parse_duration("3:5"), None);
        assert_eq!(parse_duration("3:75"), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("-1:00"), None);
        assert_eq!(parse_duration("1:02:03"), None);
    }

    #[test]
    fn test_title_and_thumbnail_defaults() {
        let raw = RawTrack::decode(&json!({"id": "v", "title": "", "thumbnail": ""})).unwrap();
        let track = normalize_track(&raw, None);
        assert_eq!(track.title, "Unknown");
        assert_eq!(track.thumbnail_url, None);

        let raw = RawTrack::decode(&json!({
            "id": "v",
            "thumbnails": [{"url": "s"}, {"url": "l"}],
        }))
        .unwrap();
        assert_eq!(normalize_track(&raw, None).thumbnail_url.as_deref(), Some("l"));

        let raw = RawTrack::decode(&json!({
            "id": "v",
            "thumbnail": "https://img/x.jpg",
            "thumbnails": [{"url": "l"}],
        }))
        .unwrap();
        assert_eq!(
            normalize_track(&raw, None).thumbnail_url.as_deref(),
            Some("https://img/x.jpg")
        );
    }

    #[test]
    fn test_non_blank_values_pass_through_unchanged() {
        let raw = RawTrack::decode(&json!({
            "id": "v",
            "title": " Intro ",
            "thumbnail": "https://img/x.jpg ",
        }))
        .unwrap();
        let track = normalize_track(&raw, None);
        assert_eq!(track.title, " Intro ");
        assert_eq!(track.thumbnail_url.as_deref(), Some("https://img/x.jpg "));

        let raw = RawTrack::decode(&json!({
            "id": "v",
            "thumbnail": "   ",
            "thumbnails": [{"url": " l "}, {"url": " "}],
        }))
        .unwrap();
        assert_eq!(normalize_track(&raw, None).thumbnail_url.as_deref(), Some(" l "));
    }

    #[test]
    fn test_album_year_never_null() {
        let album = |v: serde_json::Value| {
            normalize_album(&RawAlbum::decode(&v).unwrap(), None)
        };
        assert_eq!(album(json!({"browseId": "b", "year": 1999})).year, "1999");
        assert_eq!(album(json!({"browseId": "b", "year": null})).year, "");
        assert_eq!(album(json!({"browseId": "b"})).year, "");
        assert_eq!(album(json!({"browseId": "b"})).kind, AlbumKind::Album);
        assert_eq!(album(json!({"browseId": "b", "type": "Single"})).kind, AlbumKind::Single);
    }

    #[test]
    fn test_batch_skips_exactly_the_malformed_records() {
        let records = vec![
            json!({"id": "1", "title": "ok"}),
            json!({"title": "no id"}),
            json!(null),
            json!({"id": "2", "artists": {"broken": true}}),
            json!({"id": 3}),
            json!({"id": "4", "duration": "bad"}),
        ];
        let tracks = normalize_tracks(&records, None);
        let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);

        let albums = normalize_albums(
            &[json!({"browseId": "a"}), json!([]), json!({"browseId": "b"})],
            None,
        );
        assert_eq!(albums.len(), 2);
    }

    #[test]
    fn test_album_page_tracks_inherit_album_artist() {
        let page = RawAlbumPage {
            album: json!({"browseId": "MPRE", "title": "LP", "artists": ["Band"], "year": 2020}),
            tracks: vec![
                json!({"id": "t1", "title": "One"}),
                json!({"id": "t2", "title": "Two", "artists": ["Guest"]}),
                json!({"title": "broken"}),
            ],
        };
        let page = normalize_album_page(&page).unwrap();
        assert_eq!(page.album.year, "2020");
        assert_eq!(page.tracks.len(), 2);
        assert_eq!(page.tracks[0].artist_display, "Band");
        assert_eq!(page.tracks[1].artist_display, "Guest");
    }

    #[test]
    fn test_album_page_with_malformed_album() {
        let page = RawAlbumPage {
            album: json!({"title": "no id"}),
            tracks: vec![json!({"id": "t1"})],
        };
        assert!(normalize_album_page(&page).is_none());
    }
}

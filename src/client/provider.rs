//! [`CatalogProvider`] over the OpenSubsonic API.
//!
//! Subsonic entities are reshaped into the provider record layout the
//! normalizer reads: songs keep their `id`, albums expose `browseId`, artist
//! strings become `artists` lists and cover art ids become thumbnail URLs.

use async_trait::async_trait;
use chrono::Datelike;
use serde_json::{json, Value};

use super::api::{ApiClientError, SubsonicClient};
use crate::catalog::models::SectionKind;
use crate::catalog::provider::{CatalogProvider, ProviderError, ProviderResult, SearchKind};
use crate::catalog::raw::{RawAlbumPage, RawRecord, RawStreamRecord};

/// Results requested per search.
const SEARCH_PAGE: u32 = 20;

/// Results per entity kind when building suggestions.
const SUGGESTION_PAGE: u32 = 5;

/// Cover art edge length requested for thumbnails.
const THUMBNAIL_SIZE: u32 = 300;

impl From<ApiClientError> for ProviderError {
    fn from(error: ApiClientError) -> Self {
        match error {
            ApiClientError::Request(e) => ProviderError::Network(e.to_string()),
            ApiClientError::InvalidResponse(message) => ProviderError::InvalidResponse(message),
            ApiClientError::ServerError { code, message } => {
                ProviderError::Remote { code, message }
            }
        }
    }
}

impl SubsonicClient {
    /// Artist list of a song or album: the OpenSubsonic `artists` array
    /// when present, else the legacy `artist` string.
    fn artists_of(entity: &Value) -> Value {
        match entity.get("artists") {
            Some(list @ Value::Array(_)) => list.clone(),
            _ => match entity.get("artist") {
                Some(Value::String(name)) => json!([{ "name": name }]),
                _ => Value::Null,
            },
        }
    }

    fn thumbnail_of(&self, entity: &Value) -> Value {
        entity
            .get("coverArt")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(|id| Value::String(self.cover_art_url(id, Some(THUMBNAIL_SIZE))))
            .unwrap_or(Value::Null)
    }

    fn song_record(&self, song: &Value) -> RawRecord {
        json!({
            "id": song.get("id").cloned().unwrap_or(Value::Null),
            "title": song.get("title").cloned().unwrap_or(Value::Null),
            "artists": Self::artists_of(song),
            "duration": song.get("duration").cloned().unwrap_or(Value::Null),
            "thumbnail": self.thumbnail_of(song),
        })
    }

    fn album_record(&self, album: &Value) -> RawRecord {
        let kind = album
            .get("releaseTypes")
            .and_then(Value::as_array)
            .and_then(|types| types.first())
            .cloned()
            .unwrap_or(Value::Null);

        json!({
            "browseId": album.get("id").cloned().unwrap_or(Value::Null),
            "title": album.get("name").cloned().unwrap_or(Value::Null),
            "artists": Self::artists_of(album),
            "year": album.get("year").cloned().unwrap_or(Value::Null),
            "thumbnail": self.thumbnail_of(album),
            "type": kind,
        })
    }

    fn song_records(&self, songs: &[Value], limit: u32) -> Vec<RawRecord> {
        songs
            .iter()
            .take(limit as usize)
            .map(|song| self.song_record(song))
            .collect()
    }

    fn album_records(&self, albums: &[Value]) -> Vec<RawRecord> {
        albums.iter().map(|album| self.album_record(album)).collect()
    }
}

#[async_trait]
impl CatalogProvider for SubsonicClient {
    async fn search(&self, query: &str, kind: SearchKind) -> ProviderResult<Vec<RawRecord>> {
        let records = match kind {
            SearchKind::Songs => {
                let lists = SubsonicClient::search(self, query, 0, 0, SEARCH_PAGE).await?;
                self.song_records(&lists.song, SEARCH_PAGE)
            }
            SearchKind::Albums => {
                let lists = SubsonicClient::search(self, query, 0, SEARCH_PAGE, 0).await?;
                self.album_records(&lists.album)
            }
        };
        tracing::info!("Search {:?} ({:?}) returned {} records", query, kind, records.len());
        Ok(records)
    }

    async fn feed(&self, kind: SectionKind, limit: u32) -> ProviderResult<Vec<RawRecord>> {
        let records = match kind {
            SectionKind::TrendingSongs | SectionKind::Recommended => {
                let songs = self.get_random_songs(limit, None, None).await?;
                self.song_records(&songs, limit)
            }
            SectionKind::NewReleases => {
                let from_year = chrono::Local::now().year() - 1;
                let songs = self.get_random_songs(limit, Some(from_year), None).await?;
                self.song_records(&songs, limit)
            }
            SectionKind::TopTracks => {
                let starred = self.get_starred().await?;
                self.song_records(&starred.song, limit)
            }
            SectionKind::NewAlbums => {
                let albums = self.get_album_list("newest", limit).await?;
                self.album_records(&albums)
            }
        };
        Ok(records)
    }

    async fn resolve_stream(&self, track_id: &str) -> ProviderResult<RawStreamRecord> {
        let song = self.get_song(track_id).await?;
        let options = self.stream_options();

        let (mime_type, format_id) = match options.format.as_deref() {
            Some(format) => (
                song.transcoded_content_type.or(song.content_type),
                Some(format.to_string()),
            ),
            None => (song.content_type, song.suffix),
        };

        Ok(RawStreamRecord {
            url: Some(self.stream_url(track_id)),
            title: song.title,
            author: song.artist,
            duration_seconds: song.duration,
            bitrate: stream_bitrate(song.bit_rate, options.max_bitrate),
            mime_type,
            format_id,
        })
    }

    async fn album(&self, browse_id: &str) -> ProviderResult<RawAlbumPage> {
        let album = self.get_album(browse_id).await?;
        let tracks = album
            .get("song")
            .and_then(Value::as_array)
            .map(|songs| self.song_records(songs, u32::MAX))
            .unwrap_or_default();

        Ok(RawAlbumPage {
            album: self.album_record(&album),
            tracks,
        })
    }

    async fn suggestions(&self, query: &str) -> ProviderResult<Vec<String>> {
        let lists = SubsonicClient::search(
            self,
            query,
            SUGGESTION_PAGE,
            SUGGESTION_PAGE,
            SUGGESTION_PAGE,
        )
        .await?;

        let names = lists
            .song
            .iter()
            .filter_map(|song| song.get("title"))
            .chain(lists.album.iter().filter_map(|album| album.get("name")))
            .chain(lists.artist.iter().filter_map(|artist| artist.get("name")))
            .filter_map(Value::as_str);
        Ok(distinct(names))
    }
}

/// Bits per second of a stream, given the server-reported kbps and the
/// configured cap (0 for none).
fn stream_bitrate(reported_kbps: Option<u32>, max_kbps: u32) -> Option<u32> {
    let kbps = match (reported_kbps, max_kbps) {
        (Some(kbps), 0) => Some(kbps),
        (Some(kbps), max) => Some(kbps.min(max)),
        (None, 0) => None,
        (None, max) => Some(max),
    };
    kbps.map(|kbps| kbps.saturating_mul(1000))
}

/// Non-empty names, first occurrence wins, compared case-insensitively.
fn distinct<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_lowercase()))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::AlbumKind;
    use crate::catalog::normalize::{normalize_album, normalize_track};
    use crate::catalog::raw::{RawAlbum, RawTrack};
    use crate::client::auth::Credentials;

    fn client() -> SubsonicClient {
        SubsonicClient::new("https://music.example.com", Credentials::from_api_key("k"))
    }

    #[test]
    fn test_song_record_normalizes_like_any_provider_record() {
        let client = client();
        let song = json!({
            "id": "s1", "title": "Song A", "artist": "X", "duration": 185,
            "coverArt": "al-1", "bitRate": 320
        });

        let raw = RawTrack::decode(&client.song_record(&song)).unwrap();
        let track = normalize_track(&raw, None);
        assert_eq!(track.id, "s1");
        assert_eq!(track.artist_display, "X");
        assert_eq!(track.duration_seconds, Some(185));
        assert!(track
            .thumbnail_url
            .unwrap()
            .starts_with("https://music.example.com/rest/getCoverArt?"));
    }

    #[test]
    fn test_song_record_prefers_artist_list() {
        let song = json!({
            "id": "s1", "artist": "X feat. Y",
            "artists": [{"id": "a", "name": "X"}, {"id": "b", "name": "Y"}]
        });
        let raw = RawTrack::decode(&client().song_record(&song)).unwrap();
        assert_eq!(normalize_track(&raw, None).artist_display, "X, Y");
    }

    #[test]
    fn test_song_without_id_is_malformed() {
        let raw = client().song_record(&json!({"title": "orphan"}));
        assert!(RawTrack::decode(&raw).is_err());
    }

    #[test]
    fn test_album_record_maps_subsonic_fields() {
        let album = json!({
            "id": "al-1", "name": "Record", "artist": "Band", "year": 2021,
            "releaseTypes": ["EP"]
        });
        let raw = RawAlbum::decode(&client().album_record(&album)).unwrap();
        let album = normalize_album(&raw, None);
        assert_eq!(album.browse_id, "al-1");
        assert_eq!(album.title, "Record");
        assert_eq!(album.artist_display, "Band");
        assert_eq!(album.year, "2021");
        assert_eq!(album.kind, AlbumKind::Ep);
        assert_eq!(album.thumbnail_url, None);
    }

    #[test]
    fn test_distinct_keeps_first_spelling() {
        let names = ["Hello", "hello", "", " World ", "HELLO", "world"];
        assert_eq!(
            distinct(names.into_iter()),
            vec![String::from("Hello"), String::from("World")]
        );
    }

    #[test]
    fn test_stream_bitrate_is_capped_and_saturates() {
        assert_eq!(stream_bitrate(Some(320), 0), Some(320_000));
        assert_eq!(stream_bitrate(Some(320), 128), Some(128_000));
        assert_eq!(stream_bitrate(None, 192), Some(192_000));
        assert_eq!(stream_bitrate(None, 0), None);
        assert_eq!(stream_bitrate(Some(u32::MAX), 0), Some(u32::MAX));
    }

    #[test]
    fn test_api_errors_map_to_provider_errors() {
        let remote: ProviderError = ApiClientError::ServerError {
            code: 70,
            message: String::from("not found"),
        }
        .into();
        assert!(matches!(remote, ProviderError::Remote { code: 70, .. }));

        let invalid: ProviderError = ApiClientError::InvalidResponse(String::from("x")).into();
        assert!(matches!(invalid, ProviderError::InvalidResponse(_)));
    }
}

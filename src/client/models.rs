//! OpenSubsonic API response envelopes.
//!
//! Entity lists are kept as raw JSON values and decoded record by record in
//! the catalog layer. Only the envelopes, and the song metadata needed to
//! describe a stream, are typed here.

use serde::Deserialize;
use serde_json::Value;

/// Root response wrapper for all API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct SubsonicResponse<T> {
    #[serde(rename = "subsonic-response")]
    pub subsonic_response: ResponseBody<T>,
}

/// Response body containing status and data.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody<T> {
    pub status: String,
    pub error: Option<ApiError>,
    #[serde(flatten)]
    pub data: Option<T>,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub code: i32,
    pub message: Option<String>,
}

/// Response for ping endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PingResponse {}

/// Response for search3 endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub search_result3: EntityLists,
}

/// Response for getStarred2 endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StarredResponse {
    pub starred2: EntityLists,
}

/// Artist, album and song lists as returned by search and starred queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityLists {
    #[serde(default)]
    pub artist: Vec<Value>,
    #[serde(default)]
    pub album: Vec<Value>,
    #[serde(default)]
    pub song: Vec<Value>,
}

/// Response for getAlbumList2 endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumListResponse {
    pub album_list2: AlbumListData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumListData {
    #[serde(default)]
    pub album: Vec<Value>,
}

/// Response for getRandomSongs endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomSongsResponse {
    pub random_songs: SongList,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SongList {
    #[serde(default)]
    pub song: Vec<Value>,
}

/// Response for getAlbum endpoint. The album object embeds its songs.
#[derive(Debug, Clone, Deserialize)]
pub struct AlbumResponse {
    pub album: Value,
}

/// Response for getSong endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SongResponse {
    pub song: SongMeta,
}

/// The song fields needed to describe a stream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongMeta {
    pub id: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration: Option<u32>,
    /// Kilobits per second
    pub bit_rate: Option<u32>,
    pub content_type: Option<String>,
    pub suffix: Option<String>,
    pub transcoded_content_type: Option<String>,
    pub transcoded_suffix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope_keeps_raw_records() {
        let body = r#"{"subsonic-response": {"status": "ok", "version": "1.16.1",
            "searchResult3": {"song": [{"id": "1", "title": "A"}, {"title": 5}]}}}"#;
        let parsed: SubsonicResponse<SearchResponse> = serde_json::from_str(body).unwrap();
        let data = parsed.subsonic_response.data.unwrap();
        assert_eq!(data.search_result3.song.len(), 2);
        assert!(data.search_result3.album.is_empty());
    }

    #[test]
    fn test_failed_envelope_carries_error() {
        let body = r#"{"subsonic-response": {"status": "failed", "version": "1.16.1",
            "error": {"code": 40, "message": "Wrong username or password"}}}"#;
        let parsed: SubsonicResponse<PingResponse> = serde_json::from_str(body).unwrap();
        let error = parsed.subsonic_response.error.unwrap();
        assert_eq!(error.code, 40);
        assert_eq!(parsed.subsonic_response.status, "failed");
    }

    #[test]
    fn test_song_meta_ignores_unknown_fields() {
        let song: SongMeta = serde_json::from_str(
            r#"{"id": "s1", "title": "T", "bitRate": 320, "suffix": "flac",
                "contentType": "audio/flac", "replayGain": {"trackGain": 1.0}}"#,
        )
        .unwrap();
        assert_eq!(song.bit_rate, Some(320));
        assert_eq!(song.content_type.as_deref(), Some("audio/flac"));
        assert_eq!(song.duration, None);
    }
}

//! OpenSubsonic API client implementation.

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use super::auth::Credentials;
use super::models::*;

/// API client errors.
#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Server returned failed status: {message}")]
    ServerError { code: i32, message: String },
}

/// Transcoding preferences applied to every stream URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOptions {
    /// Target format, e.g. "opus". `None` streams the original file.
    pub format: Option<String>,
    /// Kilobits per second, 0 for no limit
    pub max_bitrate: u32,
}

/// OpenSubsonic API client.
#[derive(Debug, Clone)]
pub struct SubsonicClient {
    /// HTTP client
    client: Client,

    /// Base server URL
    base_url: String,

    credentials: Credentials,

    /// Client identifier
    client_name: String,

    /// API version to use
    api_version: String,

    stream: StreamOptions,
}

impl SubsonicClient {
    /// Create a new API client.
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            client_name: String::from("catalog-player"),
            api_version: String::from("1.16.1"),
            stream: StreamOptions::default(),
        }
    }

    pub fn with_stream_options(mut self, stream: StreamOptions) -> Self {
        self.stream = stream;
        self
    }

    pub fn stream_options(&self) -> &StreamOptions {
        &self.stream
    }

    /// Build the URL for an API endpoint with query parameters. Each call
    /// is signed with fresh credentials.
    fn build_url(&self, endpoint: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!("{}/rest/{}", self.base_url, endpoint);

        let mut query_parts: Vec<String> = vec![
            format!("v={}", self.api_version),
            format!("c={}", self.client_name),
            String::from("f=json"),
        ];

        for (key, value) in self.credentials.query_params() {
            query_parts.push(format!("{}={}", key, urlencoding::encode(&value)));
        }

        for (key, value) in params {
            query_parts.push(format!("{}={}", key, urlencoding::encode(value)));
        }

        url.push('?');
        url.push_str(&query_parts.join("&"));
        url
    }

    /// Make a GET request to an API endpoint.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ApiClientError> {
        let url = self.build_url(endpoint, params);
        tracing::debug!("GET {}", endpoint);

        let response = self.client.get(&url).send().await?;
        let text = response.text().await?;

        let parsed: SubsonicResponse<T> = serde_json::from_str(&text).map_err(|e| {
            ApiClientError::InvalidResponse(format!(
                "Failed to parse response: {}. Body: {}",
                e,
                text.chars().take(500).collect::<String>()
            ))
        })?;

        if parsed.subsonic_response.status != "ok" {
            if let Some(error) = parsed.subsonic_response.error {
                return Err(ApiClientError::ServerError {
                    code: error.code,
                    message: error
                        .message
                        .unwrap_or_else(|| String::from("Unknown error")),
                });
            }
            return Err(ApiClientError::InvalidResponse(String::from(
                "Server returned failed status without error details",
            )));
        }

        parsed
            .subsonic_response
            .data
            .ok_or_else(|| ApiClientError::InvalidResponse(String::from("Missing response data")))
    }

    /// A freshly signed streaming URL for a song, carrying the configured
    /// transcoding preferences.
    pub fn stream_url(&self, id: &str) -> String {
        let bitrate = self.stream.max_bitrate.to_string();
        let mut params = vec![("id", id)];
        if let Some(format) = self.stream.format.as_deref() {
            params.push(("format", format));
        }
        if self.stream.max_bitrate > 0 {
            params.push(("maxBitRate", bitrate.as_str()));
        }
        self.build_url("stream", &params)
    }

    /// Get the cover art URL for an item.
    pub fn cover_art_url(&self, id: &str, size: Option<u32>) -> String {
        let size_str;
        let params: Vec<(&str, &str)> = if let Some(s) = size {
            size_str = s.to_string();
            vec![("id", id), ("size", &size_str)]
        } else {
            vec![("id", id)]
        };
        self.build_url("getCoverArt", &params)
    }

    /// Test connectivity with the server.
    pub async fn ping(&self) -> Result<(), ApiClientError> {
        let _: PingResponse = self.get("ping", &[]).await?;
        Ok(())
    }

    /// Search for artists, albums, and songs.
    pub async fn search(
        &self,
        query: &str,
        artist_count: u32,
        album_count: u32,
        song_count: u32,
    ) -> Result<EntityLists, ApiClientError> {
        let artist_count_str = artist_count.to_string();
        let album_count_str = album_count.to_string();
        let song_count_str = song_count.to_string();

        let response: SearchResponse = self
            .get(
                "search3",
                &[
                    ("query", query),
                    ("artistCount", &artist_count_str),
                    ("albumCount", &album_count_str),
                    ("songCount", &song_count_str),
                ],
            )
            .await?;

        Ok(response.search_result3)
    }

    /// Get an album by ID, with its songs embedded.
    pub async fn get_album(&self, id: &str) -> Result<Value, ApiClientError> {
        let response: AlbumResponse = self.get("getAlbum", &[("id", id)]).await?;
        Ok(response.album)
    }

    /// Get album list, e.g. "newest" or "frequent".
    pub async fn get_album_list(
        &self,
        list_type: &str,
        size: u32,
    ) -> Result<Vec<Value>, ApiClientError> {
        let size_str = size.to_string();

        let response: AlbumListResponse = self
            .get(
                "getAlbumList2",
                &[("type", list_type), ("size", &size_str), ("offset", "0")],
            )
            .await?;

        Ok(response.album_list2.album)
    }

    /// Get random songs, optionally restricted by release year or genre.
    pub async fn get_random_songs(
        &self,
        size: u32,
        from_year: Option<i32>,
        genre: Option<&str>,
    ) -> Result<Vec<Value>, ApiClientError> {
        let size_str = size.to_string();
        let year_str = from_year.map(|y| y.to_string());

        let mut params = vec![("size", size_str.as_str())];
        if let Some(year) = year_str.as_deref() {
            params.push(("fromYear", year));
        }
        if let Some(genre) = genre {
            params.push(("genre", genre));
        }

        let response: RandomSongsResponse = self.get("getRandomSongs", &params).await?;
        Ok(response.random_songs.song)
    }

    /// Get starred (favorite) items.
    pub async fn get_starred(&self) -> Result<EntityLists, ApiClientError> {
        let response: StarredResponse = self.get("getStarred2", &[]).await?;
        Ok(response.starred2)
    }

    /// Get song metadata by ID.
    pub async fn get_song(&self, id: &str) -> Result<SongMeta, ApiClientError> {
        let response: SongResponse = self.get("getSong", &[("id", id)]).await?;
        Ok(response.song)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SubsonicClient {
        SubsonicClient::new(
            "https://music.example.com/",
            Credentials::from_api_key("key"),
        )
    }

    #[test]
    fn test_build_url_has_common_and_encoded_params() {
        let url = client().build_url("search3", &[("query", "a b&c")]);
        assert!(url.starts_with("https://music.example.com/rest/search3?"));
        assert!(url.contains("v=1.16.1"));
        assert!(url.contains("c=catalog-player"));
        assert!(url.contains("f=json"));
        assert!(url.contains("apiKey=key"));
        assert!(url.contains("query=a%20b%26c"));
    }

    #[test]
    fn test_stream_url_carries_quality_preferences() {
        let plain = client().stream_url("s1");
        assert!(plain.contains("id=s1"));
        assert!(!plain.contains("format="));
        assert!(!plain.contains("maxBitRate="));

        let tuned = client()
            .with_stream_options(StreamOptions {
                format: Some(String::from("opus")),
                max_bitrate: 128,
            })
            .stream_url("s1");
        assert!(tuned.contains("format=opus"));
        assert!(tuned.contains("maxBitRate=128"));
    }

    #[test]
    fn test_token_stream_urls_are_freshly_salted() {
        let client = SubsonicClient::new(
            "https://music.example.com",
            Credentials::from_password("me", "pw"),
        );
        assert_ne!(client.stream_url("s1"), client.stream_url("s1"));
    }
}

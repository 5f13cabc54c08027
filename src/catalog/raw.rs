//! Raw provider records and their lenient decoding.
//!
//! Providers hand back loosely-typed JSON records. Each record is decoded on
//! its own so that one bad entry cannot fail a whole response, and every
//! optional field decodes leniently: a value of the wrong shape is treated
//! as absent instead of failing the record. Only a missing or non-string
//! identifier makes a record malformed.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use super::models::AlbumKind;

/// A single, undecoded provider record.
pub type RawRecord = Value;

/// A record whose required fields could not be extracted.
#[derive(Debug, Error)]
#[error("malformed {kind} record: {reason}")]
pub struct MalformedRecordError {
    pub kind: &'static str,
    pub reason: String,
}

/// Track-shaped record.
///
/// ```json
/// {"id": "v1", "title": "Song A", "artists": [{"name": "X"}], "duration": 185,
///  "thumbnail": "https://..."}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTrack {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_artists")]
    pub artists: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub duration: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub thumbnail: Option<String>,
    #[serde(default, deserialize_with = "lenient_thumbnails")]
    pub thumbnails: Option<Vec<String>>,
}

/// Album-shaped record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAlbum {
    pub browse_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_artists")]
    pub artists: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub thumbnail: Option<String>,
    #[serde(default, deserialize_with = "lenient_thumbnails")]
    pub thumbnails: Option<Vec<String>>,
    #[serde(rename = "type", default, deserialize_with = "lenient_album_kind")]
    pub kind: Option<AlbumKind>,
}

impl RawTrack {
    pub fn decode(record: &RawRecord) -> Result<Self, MalformedRecordError> {
        Self::deserialize(record).map_err(|e| MalformedRecordError {
            kind: "track",
            reason: e.to_string(),
        })
    }
}

impl RawAlbum {
    pub fn decode(record: &RawRecord) -> Result<Self, MalformedRecordError> {
        Self::deserialize(record).map_err(|e| MalformedRecordError {
            kind: "album",
            reason: e.to_string(),
        })
    }
}

/// Result of a stream resolution, as the provider reports it.
///
/// `url` may be missing even when the call itself succeeded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStreamRecord {
    pub url: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub duration_seconds: Option<u32>,
    pub bitrate: Option<u32>,
    pub mime_type: Option<String>,
    pub format_id: Option<String>,
}

/// An album record together with its track records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAlbumPage {
    pub album: RawRecord,
    pub tracks: Vec<RawRecord>,
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_artists<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<String>>, D::Error> {
    Ok(artist_names(&Value::deserialize(d)?))
}

/// Names from `[{"name": ..}]` or `["..."]`. Any entry of another shape
/// discards the whole list.
fn artist_names(value: &Value) -> Option<Vec<String>> {
    let entries = value.as_array()?;
    let names = entries
        .iter()
        .map(|entry| match entry {
            Value::String(name) => Some(name.as_str()),
            Value::Object(fields) => fields.get("name")?.as_str(),
            _ => None,
        })
        .collect::<Option<Vec<&str>>>()?;

    Some(
        names
            .into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect(),
    )
}

fn lenient_seconds<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().and_then(|secs| u32::try_from(secs).ok()),
        Value::String(s) => super::normalize::parse_duration(&s),
        _ => None,
    })
}

fn lenient_year<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64().and_then(|year| i32::try_from(year).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_thumbnails<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<String>>, D::Error> {
    let value = Value::deserialize(d)?;
    let Some(entries) = value.as_array() else {
        return Ok(None);
    };
    Ok(Some(
        entries
            .iter()
            .filter_map(|entry| entry.get("url")?.as_str())
            .map(String::from)
            .collect(),
    ))
}

fn lenient_album_kind<'de, D: Deserializer<'de>>(d: D) -> Result<Option<AlbumKind>, D::Error> {
    Ok(Value::deserialize(d)?
        .as_str()
        .and_then(AlbumKind::from_label))
}

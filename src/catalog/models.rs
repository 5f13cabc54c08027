//! Canonical, presentation-agnostic catalog models.

/// A playable track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Opaque provider identifier
    pub id: String,
    pub title: String,
    /// Artist names joined for display
    pub artist_display: String,
    pub duration_seconds: Option<u32>,
    pub thumbnail_url: Option<String>,
}

/// Release type of an album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlbumKind {
    #[default]
    Album,
    Ep,
    Single,
}

impl AlbumKind {
    /// Parse a provider release-type label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "album" => Some(Self::Album),
            "ep" => Some(Self::Ep),
            "single" => Some(Self::Single),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Album => "Album",
            Self::Ep => "EP",
            Self::Single => "Single",
        }
    }
}

/// An album, EP or single.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub browse_id: String,
    pub title: String,
    pub artist_display: String,
    /// Release year, empty when unknown
    pub year: String,
    pub thumbnail_url: Option<String>,
    pub kind: AlbumKind,
}

/// An album together with its normalized tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumPage {
    pub album: Album,
    pub tracks: Vec<Track>,
}

/// What a feed section shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    TrendingSongs,
    NewAlbums,
    TopTracks,
    Recommended,
    NewReleases,
}

impl SectionKind {
    /// Whether records for this section are albums rather than tracks.
    pub fn holds_albums(&self) -> bool {
        matches!(self, Self::NewAlbums)
    }
}

/// Items of a feed section. A section never mixes tracks and albums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionItems {
    Tracks(Vec<Track>),
    Albums(Vec<Album>),
}

impl SectionItems {
    pub fn len(&self) -> usize {
        match self {
            Self::Tracks(tracks) => tracks.len(),
            Self::Albums(albums) => albums.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A labeled, non-empty group of feed items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSection {
    pub title: String,
    pub kind: SectionKind,
    pub items: SectionItems,
}

/// A resolved, time-limited stream locator plus quality metadata.
///
/// The URL expires after a window only the provider knows about, so a
/// descriptor must never outlive the session it was resolved for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub url: String,
    pub title: String,
    pub author: String,
    pub duration_seconds: Option<u32>,
    /// Bits per second
    pub bitrate: Option<u32>,
    pub mime_type: Option<String>,
    /// Opaque provider quality identifier
    pub format_id: Option<String>,
}

impl StreamDescriptor {
    /// Human-readable quality, e.g. "opus (128 kbps)".
    pub fn quality_label(&self) -> String {
        match self.bitrate {
            Some(bitrate) => {
                let format = self
                    .mime_type
                    .as_deref()
                    .and_then(|mime| mime.split('/').nth(1))
                    .map(|subtype| subtype.split(';').next().unwrap_or(subtype).trim())
                    .filter(|subtype| !subtype.is_empty())
                    .unwrap_or("audio");
                format!("{} ({} kbps)", format, bitrate / 1000)
            }
            None => String::from("Unknown quality"),
        }
    }
}

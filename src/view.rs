//! Plain-text rendering of catalog data and session state.

use crate::catalog::models::{Album, AlbumPage, FeedSection, SectionItems, Track};
use crate::catalog::normalize::{format_duration, format_millis, DurationContext};
use crate::player::{SessionSnapshot, SessionState};

const PROGRESS_BAR_WIDTH: usize = 20;

/// One numbered track row.
pub fn track_line(number: usize, track: &Track) -> String {
    let duration = format_duration(track.duration_seconds, DurationContext::Listing);
    if duration.is_empty() {
        format!("{:>3}. {} - {}", number, track.title, track.artist_display)
    } else {
        format!(
            "{:>3}. {} - {} [{}]",
            number, track.title, track.artist_display, duration
        )
    }
}

/// Album title, artists, kind and year.
fn album_summary(album: &Album) -> String {
    let mut line = format!(
        "{} - {} ({}",
        album.title,
        album.artist_display,
        album.kind.label()
    );
    if !album.year.is_empty() {
        line.push_str(", ");
        line.push_str(&album.year);
    }
    line.push(')');
    line
}

/// One numbered album row.
pub fn album_line(number: usize, album: &Album) -> String {
    format!("{:>3}. {}", number, album_summary(album))
}

pub fn track_list(title: &str, tracks: &[Track]) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", title, tracks.len())];
    lines.extend(
        tracks
            .iter()
            .enumerate()
            .map(|(i, track)| track_line(i + 1, track)),
    );
    lines
}

pub fn album_list(title: &str, albums: &[Album]) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", title, albums.len())];
    lines.extend(
        albums
            .iter()
            .enumerate()
            .map(|(i, album)| album_line(i + 1, album)),
    );
    lines
}

pub fn album_page(page: &AlbumPage) -> Vec<String> {
    let mut lines = vec![album_summary(&page.album)];
    lines.extend(
        page.tracks
            .iter()
            .enumerate()
            .map(|(i, track)| track_line(i + 1, track)),
    );
    lines
}

/// Render the feed. Tracks and albums are numbered separately, continuing
/// across sections, so `play n` and `album n` address them directly.
pub fn feed(sections: &[FeedSection]) -> Vec<String> {
    if sections.is_empty() {
        return vec![String::from("Nothing to show")];
    }

    let mut lines = Vec::new();
    let mut track_number = 0;
    let mut album_number = 0;
    for section in sections {
        lines.push(format!("== {} ==", section.title));
        match &section.items {
            SectionItems::Tracks(tracks) => {
                for track in tracks {
                    track_number += 1;
                    lines.push(track_line(track_number, track));
                }
            }
            SectionItems::Albums(albums) => {
                for album in albums {
                    album_number += 1;
                    lines.push(album_line(album_number, album));
                }
            }
        }
    }
    lines
}

fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Idle => "idle",
        SessionState::Resolving => "resolving",
        SessionState::Buffering => "buffering",
        SessionState::Ready => "ready",
        SessionState::Playing => "playing",
        SessionState::Paused => "paused",
        SessionState::Stopped => "stopped",
        SessionState::Failed => "failed",
    }
}

/// A text progress bar.
fn progress_bar(position_ms: u64, duration_ms: u64) -> String {
    let filled = if duration_ms == 0 {
        0
    } else {
        ((position_ms.min(duration_ms) * PROGRESS_BAR_WIDTH as u64) / duration_ms) as usize
    };
    format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled)
    )
}

/// Session summary, e.g. `[playing] Song - Artist 1:02 / 3:05 [###---]`.
pub fn status(snapshot: &SessionSnapshot) -> String {
    let mut line = format!("[{}]", state_label(snapshot.state));
    if snapshot.buffering {
        line.push_str("[buffering]");
    }

    match &snapshot.track {
        Some(track) => {
            let duration = if snapshot.duration_ms > 0 {
                format_millis(snapshot.duration_ms)
            } else {
                format_duration(None, DurationContext::Playback)
            };
            line.push_str(&format!(
                " {} - {} {} / {} {}",
                track.title,
                track.artist_display,
                format_millis(snapshot.position_ms),
                duration,
                progress_bar(snapshot.position_ms, snapshot.duration_ms)
            ));
        }
        None => line.push_str(" Nothing playing"),
    }

    if let Some(error) = &snapshot.last_error {
        line.push_str(&format!(" (last error: {error})"));
    }
    line
}

/// Short transition notice for a state change.
pub fn transition(snapshot: &SessionSnapshot) -> String {
    match &snapshot.track {
        Some(track) => format!(
            "[{}] {} - {}",
            state_label(snapshot.state),
            track.title,
            track.artist_display
        ),
        None => format!("[{}]", state_label(snapshot.state)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::{AlbumKind, SectionKind};

    fn track(id: &str, duration: Option<u32>) -> Track {
        Track {
            id: id.to_string(),
            title: format!("Song {id}"),
            artist_display: String::from("X, Y"),
            duration_seconds: duration,
            thumbnail_url: None,
        }
    }

    fn album(id: &str, year: &str) -> Album {
        Album {
            browse_id: id.to_string(),
            title: format!("Album {id}"),
            artist_display: String::from("Band"),
            year: year.to_string(),
            thumbnail_url: None,
            kind: AlbumKind::Single,
        }
    }

    #[test]
    fn test_track_line_omits_unknown_duration() {
        assert_eq!(track_line(1, &track("a", Some(185))), "  1. Song a - X, Y [3:05]");
        assert_eq!(track_line(12, &track("b", None)), " 12. Song b - X, Y");
    }

    #[test]
    fn test_album_line_with_and_without_year() {
        assert_eq!(album_line(2, &album("a", "2020")), "  2. Album a - Band (Single, 2020)");
        assert_eq!(album_line(3, &album("b", "")), "  3. Album b - Band (Single)");
    }

    #[test]
    fn test_feed_numbers_tracks_and_albums_separately() {
        let sections = vec![
            FeedSection {
                title: String::from("Trending"),
                kind: SectionKind::TrendingSongs,
                items: SectionItems::Tracks(vec![track("a", None), track("b", None)]),
            },
            FeedSection {
                title: String::from("New releases"),
                kind: SectionKind::NewAlbums,
                items: SectionItems::Albums(vec![album("x", "")]),
            },
            FeedSection {
                title: String::from("Top"),
                kind: SectionKind::TopTracks,
                items: SectionItems::Tracks(vec![track("c", None)]),
            },
        ];
        let lines = feed(&sections);
        assert_eq!(lines[0], "== Trending ==");
        assert!(lines[4].starts_with("  1. Album x"));
        assert!(lines[6].starts_with("  3. Song c"));
    }

    #[test]
    fn test_status_renders_progress() {
        let snapshot = SessionSnapshot {
            state: SessionState::Playing,
            track: Some(track("a", Some(200))),
            generation: 1,
            position_ms: 50_000,
            duration_ms: 200_000,
            buffering: true,
            last_error: None,
        };
        assert_eq!(
            status(&snapshot),
            "[playing][buffering] Song a - X, Y 0:50 / 3:20 [#####---------------]"
        );
    }

    #[test]
    fn test_status_idle_with_error() {
        let snapshot = SessionSnapshot {
            last_error: Some(String::from("no playable stream for track v1")),
            ..SessionSnapshot::default()
        };
        assert_eq!(
            status(&snapshot),
            "[idle] Nothing playing (last error: no playable stream for track v1)"
        );
    }
}

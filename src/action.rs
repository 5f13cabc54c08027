//! Application actions/events that drive state changes.

use crate::catalog::models::{Album, AlbumPage, FeedSection, Track};
use crate::catalog::normalize::parse_duration;
use crate::player::SeekTarget;

/// A user command, parsed from one input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search(String),
    Albums(String),
    /// Listing number or browse id
    Album(String),
    Feed,
    Suggest(String),
    /// Listing number or track id
    Play(String),
    Pause,
    Resume,
    Toggle,
    Seek(SeekTarget),
    Stop,
    Status,
    Help,
    Quit,
}

/// Actions that can be dispatched to update application state.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Command(Command),

    // Provider responses
    SearchResults { query: String, tracks: Vec<Track> },
    AlbumResults { query: String, albums: Vec<Album> },
    AlbumLoaded(AlbumPage),
    FeedLoaded(Vec<FeedSection>),
    SuggestionsLoaded { query: String, suggestions: Vec<String> },

    /// A provider operation failed as a whole
    OperationFailed { operation: &'static str, cause: String },
}

pub const USAGE: &str = "\
commands:
  search <query>       search songs
  albums <query>       search albums
  album <n|id>         open an album from the last album listing
  feed                 load the home feed
  suggest <query>      query completions
  play <n|id>          play a track from the last listing
  pause | resume | toggle
  seek <M:SS|NN%>      seek within the current track
  stop                 stop playback
  status               show the playback session
  help | quit";

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let argument = |name: &str| {
            if rest.is_empty() {
                Err(format!("{name} needs an argument"))
            } else {
                Ok(rest.to_string())
            }
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "search" | "s" => Self::Search(argument("search")?),
            "albums" => Self::Albums(argument("albums")?),
            "album" => Self::Album(argument("album")?),
            "feed" | "home" => Self::Feed,
            "suggest" => Self::Suggest(argument("suggest")?),
            "play" | "p" => Self::Play(argument("play")?),
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "toggle" | "t" => Self::Toggle,
            "seek" => Self::Seek(
                parse_seek(&argument("seek")?)
                    .ok_or_else(|| format!("invalid seek target {rest:?}"))?,
            ),
            "stop" => Self::Stop,
            "status" | "st" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(format!("unknown command {other:?}, try help")),
        };
        Ok(Some(command))
    }
}

/// `NN%`, `M:SS`, or plain seconds.
fn parse_seek(text: &str) -> Option<SeekTarget> {
    if let Some(percent) = text.strip_suffix('%') {
        let percent: f64 = percent.trim().parse().ok()?;
        return (0.0..=100.0)
            .contains(&percent)
            .then(|| SeekTarget::Fraction(percent / 100.0));
    }
    if text.contains(':') {
        return parse_duration(text).map(|secs| SeekTarget::Millis(u64::from(secs) * 1000));
    }
    text.parse::<u64>()
        .ok()
        .and_then(|secs| secs.checked_mul(1000))
        .map(SeekTarget::Millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("   "), Ok(None));
        assert_eq!(
            Command::parse("search  daft punk "),
            Ok(Some(Command::Search(String::from("daft punk"))))
        );
        assert_eq!(Command::parse("FEED"), Ok(Some(Command::Feed)));
        assert_eq!(
            Command::parse("play 3"),
            Ok(Some(Command::Play(String::from("3"))))
        );
        assert_eq!(Command::parse("q"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn test_parse_rejects_missing_arguments_and_unknown_words() {
        assert!(Command::parse("search").is_err());
        assert!(Command::parse("album   ").is_err());
        assert!(Command::parse("dance").is_err());
    }

    #[test]
    fn test_parse_seek_targets() {
        assert_eq!(
            Command::parse("seek 50%"),
            Ok(Some(Command::Seek(SeekTarget::Fraction(0.5))))
        );
        assert_eq!(
            Command::parse("seek 1:05"),
            Ok(Some(Command::Seek(SeekTarget::Millis(65_000))))
        );
        assert_eq!(
            Command::parse("seek 30"),
            Ok(Some(Command::Seek(SeekTarget::Millis(30_000))))
        );
        assert!(Command::parse("seek 120%").is_err());
        assert!(Command::parse("seek 1:75").is_err());
        assert!(Command::parse("seek soon").is_err());
    }

    #[test]
    fn test_parse_seek_rejects_overflowing_seconds() {
        assert!(Command::parse("seek 18446744073709551615").is_err());
        assert_eq!(
            Command::parse("seek 18446744073709551"),
            Ok(Some(Command::Seek(SeekTarget::Millis(18_446_744_073_709_551_000))))
        );
    }
}

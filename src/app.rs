//! Main application state and logic.
//!
//! The app runs on a single loop. Provider calls are spawned as tasks whose
//! results come back as [`Action`]s; the playback controller is only ever
//! touched from here.

use std::sync::Arc;

use color_eyre::Result;
use tokio::sync::mpsc;

use crate::action::{Action, Command, USAGE};
use crate::catalog::feed::{default_queries, load_feed};
use crate::catalog::models::{Album, FeedSection, SectionItems, Track};
use crate::catalog::normalize::{normalize_album_page, normalize_albums, normalize_track, normalize_tracks};
use crate::catalog::raw::RawTrack;
use crate::catalog::{CatalogProvider, SearchKind};
use crate::config::Config;
use crate::player::{ControllerMessage, PlaybackController, SessionState, SessionUpdate};
use crate::view;

/// Main application state.
pub struct App {
    /// Whether the app should quit
    pub should_quit: bool,

    /// Configuration
    pub config: Config,

    provider: Arc<dyn CatalogProvider>,

    /// Playback, if an audio engine could be opened
    controller: Option<PlaybackController>,

    /// Tracks from the last listing, addressable by number
    tracks: Vec<Track>,

    /// Albums from the last listing, addressable by number
    albums: Vec<Album>,

    /// Lines waiting to be printed
    output: Vec<String>,

    /// Action sender for async operations
    action_tx: mpsc::UnboundedSender<Action>,
}

impl App {
    /// Create a new application instance.
    pub fn new(
        config: Config,
        provider: Arc<dyn CatalogProvider>,
        controller: Option<PlaybackController>,
        action_tx: mpsc::UnboundedSender<Action>,
    ) -> Self {
        Self {
            should_quit: false,
            config,
            provider,
            controller,
            tracks: Vec::new(),
            albums: Vec::new(),
            output: Vec::new(),
            action_tx,
        }
    }

    /// Take the lines rendered since the last call.
    pub fn drain_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    fn print(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    /// Handle one line of user input.
    pub fn handle_line(&mut self, line: &str) -> Result<()> {
        match Command::parse(line) {
            Ok(Some(command)) => self.handle_action(Action::Command(command)),
            Ok(None) => Ok(()),
            Err(message) => {
                self.print(format!("error: {message}"));
                Ok(())
            }
        }
    }

    /// Handle an action and update state.
    pub fn handle_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Command(command) => self.handle_command(command)?,

            Action::SearchResults { query, tracks } => {
                let lines = view::track_list(&format!("Songs for {query:?}"), &tracks);
                self.output.extend(lines);
                self.tracks = tracks;
            }
            Action::AlbumResults { query, albums } => {
                let lines = view::album_list(&format!("Albums for {query:?}"), &albums);
                self.output.extend(lines);
                self.albums = albums;
            }
            Action::AlbumLoaded(page) => {
                self.output.extend(view::album_page(&page));
                self.tracks = page.tracks;
            }
            Action::FeedLoaded(sections) => {
                self.output.extend(view::feed(&sections));
                self.set_feed_listing(sections);
            }
            Action::SuggestionsLoaded { query, suggestions } => {
                if suggestions.is_empty() {
                    self.print(format!("No suggestions for {query:?}"));
                } else {
                    self.print(suggestions.join(" | "));
                }
            }
            Action::OperationFailed { operation, cause } => {
                tracing::error!("{} failed: {}", operation, cause);
                self.print(format!("{operation} failed: {cause}"));
            }
        }
        Ok(())
    }

    fn handle_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Search(query) => self.spawn_search(query, SearchKind::Songs),
            Command::Albums(query) => self.spawn_search(query, SearchKind::Albums),
            Command::Album(target) => {
                let browse_id = match pick(&self.albums, &target) {
                    Some(album) => album.browse_id.clone(),
                    None => target,
                };
                self.spawn_album(browse_id);
            }
            Command::Feed => self.spawn_feed(),
            Command::Suggest(query) => self.spawn_suggestions(query),
            Command::Play(target) => {
                let track = match pick(&self.tracks, &target) {
                    Some(track) => track.clone(),
                    None => bare_track(target),
                };
                match self.controller.as_mut() {
                    Some(controller) => controller.play(track),
                    None => self.print("error: no audio output available"),
                }
            }
            Command::Pause => self.control(|c| c.pause()),
            Command::Resume => self.control(|c| c.resume()),
            Command::Toggle => self.control(|c| c.toggle()),
            Command::Seek(target) => self.control(|c| c.seek(target).map(|_| ())),
            Command::Stop => self.control(|c| c.stop()),
            Command::Status => {
                let line = match &self.controller {
                    Some(controller) => view::status(&controller.snapshot()),
                    None => String::from("no audio output available"),
                };
                self.print(line);
            }
            Command::Help => self.print(USAGE),
            Command::Quit => self.should_quit = true,
        }
        Ok(())
    }

    /// Run a playback command, reporting refusals.
    fn control<F>(&mut self, f: F)
    where
        F: FnOnce(&mut PlaybackController) -> Result<(), crate::player::PlaybackError>,
    {
        let result = match self.controller.as_mut() {
            Some(controller) => f(controller),
            None => {
                self.print("error: no audio output available");
                return;
            }
        };
        if let Err(e) = result {
            self.print(format!("error: {e}"));
        }
    }

    /// Route a controller message from background work.
    pub fn handle_controller_message(&mut self, message: ControllerMessage) {
        if let Some(controller) = self.controller.as_mut() {
            controller.handle_message(message);
        }
    }

    /// Render a session update.
    pub fn handle_session_update(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::State(snapshot) => {
                // Idle follows every stop or failure and adds nothing.
                if snapshot.state != SessionState::Idle {
                    self.print(view::transition(&snapshot));
                }
            }
            SessionUpdate::Resolved(descriptor) => {
                self.print(format!("Streaming at {}", descriptor.quality_label()));
            }
            SessionUpdate::Progress { .. } => {}
            SessionUpdate::Buffering(true) => self.print("Buffering..."),
            SessionUpdate::Buffering(false) => {}
            SessionUpdate::Ended => self.print("Playback finished"),
            SessionUpdate::Error(e) => self.print(format!("playback error: {e}")),
        }
    }

    /// Stop playback and abort in-flight work before exit.
    pub fn shutdown(&mut self) {
        if let Some(controller) = self.controller.as_mut() {
            controller.shutdown();
        }
    }

    fn set_feed_listing(&mut self, sections: Vec<FeedSection>) {
        self.tracks.clear();
        self.albums.clear();
        for section in sections {
            match section.items {
                SectionItems::Tracks(tracks) => self.tracks.extend(tracks),
                SectionItems::Albums(albums) => self.albums.extend(albums),
            }
        }
    }

    fn spawn_search(&self, query: String, kind: SearchKind) {
        let provider = Arc::clone(&self.provider);
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let action = match provider.search(&query, kind).await {
                Ok(records) => match kind {
                    SearchKind::Songs => Action::SearchResults {
                        tracks: normalize_tracks(&records, None),
                        query,
                    },
                    SearchKind::Albums => Action::AlbumResults {
                        albums: normalize_albums(&records, None),
                        query,
                    },
                },
                Err(e) => Action::OperationFailed {
                    operation: "search",
                    cause: e.to_string(),
                },
            };
            let _ = tx.send(action);
        });
    }

    fn spawn_album(&self, browse_id: String) {
        let provider = Arc::clone(&self.provider);
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let action = match provider.album(&browse_id).await {
                Ok(raw) => match normalize_album_page(&raw) {
                    Some(page) => Action::AlbumLoaded(page),
                    None => Action::OperationFailed {
                        operation: "album",
                        cause: format!("album {browse_id} is malformed"),
                    },
                },
                Err(e) => Action::OperationFailed {
                    operation: "album",
                    cause: e.to_string(),
                },
            };
            let _ = tx.send(action);
        });
    }

    fn spawn_feed(&self) {
        let provider = Arc::clone(&self.provider);
        let tx = self.action_tx.clone();
        let limit = self.config.feed.section_size;
        tokio::spawn(async move {
            let action = match load_feed(provider.as_ref(), &default_queries(), limit).await {
                Ok(sections) => Action::FeedLoaded(sections),
                Err(e) => Action::OperationFailed {
                    operation: "feed",
                    cause: e.to_string(),
                },
            };
            let _ = tx.send(action);
        });
    }

    fn spawn_suggestions(&self, query: String) {
        let provider = Arc::clone(&self.provider);
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let action = match provider.suggestions(&query).await {
                Ok(suggestions) => Action::SuggestionsLoaded { query, suggestions },
                Err(e) => Action::OperationFailed {
                    operation: "suggest",
                    cause: e.to_string(),
                },
            };
            let _ = tx.send(action);
        });
    }
}

/// Item `n` (1-based) of a listing, when `target` is a number in range.
fn pick<'a, T>(items: &'a [T], target: &str) -> Option<&'a T> {
    let n: usize = target.parse().ok()?;
    n.checked_sub(1).and_then(|i| items.get(i))
}

/// A track known only by id.
fn bare_track(id: String) -> Track {
    normalize_track(
        &RawTrack {
            id,
            ..RawTrack::default()
        },
        None,
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::catalog::models::SectionKind;
    use crate::catalog::provider::{ProviderError, ProviderResult};
    use crate::catalog::raw::{RawAlbumPage, RawRecord, RawStreamRecord};
    use crate::player::engine::{EngineError, EngineEventSink, MediaEngine};

    struct StubProvider;

    #[async_trait]
    impl CatalogProvider for StubProvider {
        async fn search(&self, query: &str, kind: SearchKind) -> ProviderResult<Vec<RawRecord>> {
            match (query, kind) {
                ("offline", _) => Err(ProviderError::Network(String::from("offline"))),
                (_, SearchKind::Songs) => Ok(vec![
                    json!({"id": "t1", "title": "One", "artists": ["A"], "duration": 61}),
                    json!({"title": "no id"}),
                    json!({"id": "t2", "title": "Two"}),
                ]),
                (_, SearchKind::Albums) => Ok(vec![json!({"browseId": "al1", "title": "LP"})]),
            }
        }

        async fn feed(&self, kind: SectionKind, _limit: u32) -> ProviderResult<Vec<RawRecord>> {
            match kind {
                SectionKind::TopTracks => Ok(vec![json!({"id": "f1"})]),
                _ => Ok(Vec::new()),
            }
        }

        async fn resolve_stream(&self, _track_id: &str) -> ProviderResult<RawStreamRecord> {
            Ok(RawStreamRecord::default())
        }

        async fn album(&self, browse_id: &str) -> ProviderResult<RawAlbumPage> {
            Ok(RawAlbumPage {
                album: json!({"browseId": browse_id, "title": "LP", "artists": ["Band"]}),
                tracks: vec![json!({"id": "a1", "title": "Side A"})],
            })
        }
    }

    struct SilentEngine;

    impl MediaEngine for SilentEngine {
        fn load(&mut self, _url: &str, _events: EngineEventSink) -> Result<(), EngineError> {
            Ok(())
        }
        fn play(&mut self) -> Result<(), EngineError> {
            Ok(())
        }
        fn pause(&mut self) -> Result<(), EngineError> {
            Ok(())
        }
        fn stop(&mut self) -> Result<(), EngineError> {
            Ok(())
        }
        fn seek_to(&mut self, _position_ms: u64) -> Result<(), EngineError> {
            Ok(())
        }
        fn current_position(&self) -> u64 {
            0
        }
        fn duration(&self) -> u64 {
            0
        }
    }

    struct Harness {
        app: App,
        actions: mpsc::UnboundedReceiver<Action>,
        messages: mpsc::UnboundedReceiver<ControllerMessage>,
        updates: mpsc::UnboundedReceiver<SessionUpdate>,
    }

    fn harness() -> Harness {
        let provider: Arc<dyn CatalogProvider> = Arc::new(StubProvider);
        let (updates_tx, updates) = mpsc::unbounded_channel();
        let (controller, messages) = PlaybackController::new(
            Arc::clone(&provider),
            Box::new(SilentEngine),
            updates_tx,
            Duration::from_millis(500),
        );
        let (action_tx, actions) = mpsc::unbounded_channel();
        Harness {
            app: App::new(Config::default(), provider, Some(controller), action_tx),
            actions,
            messages,
            updates,
        }
    }

    impl Harness {
        async fn run(&mut self, line: &str) -> Vec<String> {
            self.app.handle_line(line).unwrap();
            let action = self.actions.recv().await.unwrap();
            self.app.handle_action(action).unwrap();
            self.app.drain_output()
        }
    }

    #[tokio::test]
    async fn test_search_lists_only_well_formed_tracks() {
        let mut h = harness();
        let lines = h.run("search one").await;
        assert_eq!(
            lines,
            vec![
                String::from("Songs for \"one\" (2)"),
                String::from("  1. One - A [1:01]"),
                String::from("  2. Two - Unknown"),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_search_reports_cause() {
        let mut h = harness();
        let lines = h.run("search offline").await;
        assert_eq!(lines, vec![String::from("search failed: network error: offline")]);
    }

    #[tokio::test]
    async fn test_album_by_number_uses_album_artist_for_tracks() {
        let mut h = harness();
        h.run("albums lp").await;
        let lines = h.run("album 1").await;
        assert_eq!(lines[0], "LP - Band (Album)");
        assert_eq!(lines[1], "  1. Side A - Band");
    }

    #[tokio::test]
    async fn test_feed_then_play_by_number() {
        let mut h = harness();
        let lines = h.run("feed").await;
        // Empty feeds fall back to searches, so every section is present.
        assert_eq!(lines[0], "== Trending songs for you ==");
        assert!(lines.contains(&String::from("== Top tracks ==")));
        assert!(lines.contains(&String::from("  3. Unknown - Unknown")));

        h.app.handle_line("play 3").unwrap();
        let snapshot = h.app.controller.as_ref().unwrap().snapshot();
        assert_eq!(snapshot.state, SessionState::Resolving);
        assert_eq!(snapshot.track.unwrap().id, "f1");

        // The stub resolves without a URL, so the session fails.
        let message = h.messages.recv().await.unwrap();
        h.app.handle_controller_message(message);
        while let Ok(update) = h.updates.try_recv() {
            h.app.handle_session_update(update);
        }
        let lines = h.app.drain_output();
        assert!(lines
            .iter()
            .any(|l| l == "playback error: no playable stream for track f1"));
    }

    #[tokio::test]
    async fn test_invalid_playback_command_is_reported() {
        let mut h = harness();
        h.app.handle_line("pause").unwrap();
        assert_eq!(
            h.app.drain_output(),
            vec![String::from("error: cannot pause while Idle")]
        );
    }

    #[test]
    fn test_pick_is_one_based() {
        let items = ["a", "b"];
        assert_eq!(pick(&items, "1"), Some(&"a"));
        assert_eq!(pick(&items, "0"), None);
        assert_eq!(pick(&items, "3"), None);
        assert_eq!(pick(&items, "abc"), None);
    }
}

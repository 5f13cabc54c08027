//! Playback session control.
//!
//! [`PlaybackController`] owns at most one live session and the media engine.
//! All of its methods run on the presentation loop; background work
//! (stream resolution, the progress timer, engine callbacks) only reports
//! back through [`ControllerMessage`]s, each stamped with the generation of
//! the session that issued it. A message whose generation is not the
//! current one is dropped, which is what keeps a late result for a replaced
//! track from touching the new session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::engine::{EngineEvent, EngineEventSink, MediaEngine};
use crate::catalog::models::{StreamDescriptor, Track};
use crate::catalog::raw::RawStreamRecord;
use crate::catalog::CatalogProvider;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Resolving,
    Buffering,
    Ready,
    Playing,
    Paused,
    Stopped,
    Failed,
}

impl SessionState {
    /// Whether the engine holds media for this state.
    fn has_media(&self) -> bool {
        matches!(self, Self::Buffering | Self::Ready | Self::Playing | Self::Paused)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("stream resolution failed: {0}")]
    Provider(String),

    #[error("no playable stream for track {0}")]
    NoStreamAvailable(String),

    #[error("playback failed: {0}")]
    Engine(String),

    #[error("cannot {command} while {state:?}")]
    InvalidState {
        command: &'static str,
        state: SessionState,
    },
}

/// Where to seek to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// Fraction of the known duration, 0.0 to 1.0
    Fraction(f64),
    Millis(u64),
}

/// Point-in-time view of the session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub track: Option<Track>,
    pub generation: u64,
    pub position_ms: u64,
    pub duration_ms: u64,
    /// The engine is re-buffering after playback started
    pub buffering: bool,
    pub last_error: Option<String>,
}

/// Notifications published to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    State(SessionSnapshot),
    Resolved(StreamDescriptor),
    Progress { position_ms: u64, duration_ms: u64 },
    Buffering(bool),
    Ended,
    Error(PlaybackError),
}

/// Results of background work, marshalled back to the controller.
#[derive(Debug)]
pub enum ControllerMessage {
    Resolved {
        generation: u64,
        result: Result<StreamDescriptor, PlaybackError>,
    },
    Engine {
        generation: u64,
        event: EngineEvent,
    },
    Tick {
        generation: u64,
    },
}

impl ControllerMessage {
    fn generation(&self) -> u64 {
        match self {
            Self::Resolved { generation, .. }
            | Self::Engine { generation, .. }
            | Self::Tick { generation } => *generation,
        }
    }
}

/// Periodic progress ticks for one session. Cancelled when dropped.
struct ProgressTimer {
    token: CancellationToken,
}

impl ProgressTimer {
    fn start(
        generation: u64,
        period: Duration,
        tx: mpsc::UnboundedSender<ControllerMessage>,
    ) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if tx.send(ControllerMessage::Tick { generation }).is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Progress timer for generation {} stopped", generation);
        });

        Self { token }
    }
}

impl Drop for ProgressTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

struct PlaybackSession {
    track: Track,
    state: SessionState,
    generation: u64,
    position_ms: u64,
    duration_ms: u64,
    buffering: bool,
    /// Aborts the in-flight stream resolution
    resolution: CancellationToken,
    timer: Option<ProgressTimer>,
}

/// Owns the single playback session and drives the media engine.
pub struct PlaybackController {
    provider: Arc<dyn CatalogProvider>,
    engine: Box<dyn MediaEngine>,
    tx: mpsc::UnboundedSender<ControllerMessage>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    progress_interval: Duration,
    generation: u64,
    session: Option<PlaybackSession>,
    last_error: Option<String>,
}

impl PlaybackController {
    /// Create a controller. The returned receiver must be drained on the
    /// presentation loop and fed to [`PlaybackController::handle_message`].
    pub fn new(
        provider: Arc<dyn CatalogProvider>,
        engine: Box<dyn MediaEngine>,
        updates: mpsc::UnboundedSender<SessionUpdate>,
        progress_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ControllerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            provider,
            engine,
            tx,
            updates,
            progress_interval,
            generation: 0,
            session: None,
            last_error: None,
        };
        (controller, rx)
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        match &self.session {
            Some(session) => SessionSnapshot {
                state: session.state,
                track: Some(session.track.clone()),
                generation: session.generation,
                position_ms: session.position_ms,
                duration_ms: session.duration_ms,
                buffering: session.buffering,
                last_error: self.last_error.clone(),
            },
            None => SessionSnapshot {
                generation: self.generation,
                last_error: self.last_error.clone(),
                ..SessionSnapshot::default()
            },
        }
    }

    /// Start a new session for `track`, replacing any current one.
    ///
    /// The previous session's resolution is left to finish; its result is
    /// discarded on arrival.
    pub fn play(&mut self, track: Track) {
        self.generation += 1;
        let generation = self.generation;

        if let Some(previous) = self.session.take() {
            tracing::info!(
                "Replacing session {} ({}) with generation {}",
                previous.generation,
                previous.track.id,
                generation
            );
            if previous.state.has_media() {
                self.stop_engine();
            }
        }

        let resolution = CancellationToken::new();
        self.last_error = None;
        self.session = Some(PlaybackSession {
            track: track.clone(),
            state: SessionState::Idle,
            generation,
            position_ms: 0,
            duration_ms: track.duration_seconds.map_or(0, |s| u64::from(s) * 1000),
            buffering: false,
            resolution: resolution.clone(),
            timer: None,
        });
        self.transition(SessionState::Resolving);

        let provider = Arc::clone(&self.provider);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = tokio::select! {
                _ = resolution.cancelled() => {
                    tracing::debug!("Resolution for generation {} cancelled", generation);
                    return;
                }
                result = provider.resolve_stream(&track.id) => result,
            };

            let result = match result {
                Ok(raw) => describe_stream(raw, &track),
                Err(e) => Err(PlaybackError::Provider(e.to_string())),
            };
            tracing::info!(
                "Resolved stream for {} in {}ms (ok: {})",
                track.id,
                started.elapsed().as_millis(),
                result.is_ok()
            );
            let _ = tx.send(ControllerMessage::Resolved { generation, result });
        });
    }

    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        self.require("pause", &[SessionState::Playing])?;
        self.engine
            .pause()
            .map_err(|e| PlaybackError::Engine(e.to_string()))?;
        self.transition(SessionState::Paused);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), PlaybackError> {
        self.require("resume", &[SessionState::Paused])?;
        self.engine
            .play()
            .map_err(|e| PlaybackError::Engine(e.to_string()))?;
        self.transition(SessionState::Playing);
        Ok(())
    }

    /// Pause when playing, resume when paused.
    pub fn toggle(&mut self) -> Result<(), PlaybackError> {
        match self.state() {
            SessionState::Paused => self.resume(),
            _ => self.pause(),
        }
    }

    /// Seek within the current media. The target is clamped to the known
    /// duration; the session state does not change.
    pub fn seek(&mut self, target: SeekTarget) -> Result<u64, PlaybackError> {
        self.require(
            "seek",
            &[SessionState::Ready, SessionState::Playing, SessionState::Paused],
        )?;

        let duration_ms = self.known_duration();
        let position_ms = match target {
            SeekTarget::Fraction(fraction) => {
                if duration_ms == 0 {
                    return Err(PlaybackError::InvalidState {
                        command: "seek without a known duration",
                        state: self.state(),
                    });
                }
                let fraction = if fraction.is_finite() {
                    fraction.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                (duration_ms as f64 * fraction) as u64
            }
            SeekTarget::Millis(ms) if duration_ms > 0 => ms.min(duration_ms),
            SeekTarget::Millis(ms) => ms,
        };

        self.engine
            .seek_to(position_ms)
            .map_err(|e| PlaybackError::Engine(e.to_string()))?;

        if let Some(session) = self.session.as_mut() {
            session.position_ms = position_ms;
            session.duration_ms = duration_ms;
        }
        self.publish(SessionUpdate::Progress {
            position_ms,
            duration_ms,
        });
        Ok(position_ms)
    }

    /// Stop playback and discard the session.
    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        if self.session.is_none() {
            return Err(PlaybackError::InvalidState {
                command: "stop",
                state: SessionState::Idle,
            });
        }
        // Anything still in flight for the stopped session is now stale.
        self.generation += 1;
        self.finish(SessionState::Stopped);
        Ok(())
    }

    /// Tear down for good: stop, and abort any in-flight resolution.
    pub fn shutdown(&mut self) {
        if let Some(session) = &self.session {
            session.resolution.cancel();
        }
        let _ = self.stop();
    }

    /// Apply the result of background work.
    pub fn handle_message(&mut self, message: ControllerMessage) {
        let current = self
            .session
            .as_ref()
            .is_some_and(|s| s.generation == message.generation());
        if !current || message.generation() != self.generation {
            tracing::debug!(
                "Discarding stale message for generation {} (current {})",
                message.generation(),
                self.generation
            );
            return;
        }

        match message {
            ControllerMessage::Resolved { result, .. } => match result {
                Ok(descriptor) => self.on_resolved(descriptor),
                Err(e) => self.fail(e),
            },
            ControllerMessage::Engine { event, .. } => self.on_engine_event(event),
            ControllerMessage::Tick { .. } => self.on_tick(),
        }
    }

    fn on_resolved(&mut self, descriptor: StreamDescriptor) {
        if self.state() != SessionState::Resolving {
            return;
        }

        if let (Some(session), Some(secs)) = (self.session.as_mut(), descriptor.duration_seconds)
        {
            session.duration_ms = u64::from(secs) * 1000;
        }
        self.transition(SessionState::Buffering);
        self.publish(SessionUpdate::Resolved(descriptor.clone()));

        let sink = EngineEventSink::new(self.generation, self.tx.clone());
        if let Err(e) = self.engine.load(&descriptor.url, sink) {
            self.fail(PlaybackError::Engine(e.to_string()));
        }
    }

    fn on_engine_event(&mut self, event: EngineEvent) {
        let state = self.state();
        match event {
            EngineEvent::Ready => match state {
                SessionState::Buffering => {
                    self.transition(SessionState::Ready);
                    if let Err(e) = self.engine.play() {
                        self.fail(PlaybackError::Engine(e.to_string()));
                        return;
                    }
                    let duration_ms = self.known_duration();
                    let timer = ProgressTimer::start(
                        self.generation,
                        self.progress_interval,
                        self.tx.clone(),
                    );
                    if let Some(session) = self.session.as_mut() {
                        session.duration_ms = duration_ms;
                        session.timer = Some(timer);
                    }
                    self.transition(SessionState::Playing);
                }
                SessionState::Playing | SessionState::Paused => self.set_buffering(false),
                _ => {}
            },
            EngineEvent::Buffering => {
                if matches!(
                    state,
                    SessionState::Ready | SessionState::Playing | SessionState::Paused
                ) {
                    self.set_buffering(true);
                }
            }
            EngineEvent::Ended => {
                if state.has_media() {
                    self.generation += 1;
                    self.publish(SessionUpdate::Ended);
                    self.finish(SessionState::Stopped);
                }
            }
            EngineEvent::Error(message) => self.fail(PlaybackError::Engine(message)),
        }
    }

    fn on_tick(&mut self) {
        if self.state() != SessionState::Playing {
            return;
        }
        let position_ms = self.engine.current_position();
        let duration_ms = self.known_duration();
        if let Some(session) = self.session.as_mut() {
            session.position_ms = position_ms;
            session.duration_ms = duration_ms;
        }
        self.publish(SessionUpdate::Progress {
            position_ms,
            duration_ms,
        });
    }

    fn set_buffering(&mut self, buffering: bool) {
        if let Some(session) = self.session.as_mut() {
            if session.buffering != buffering {
                session.buffering = buffering;
                self.publish(SessionUpdate::Buffering(buffering));
            }
        }
    }

    /// Fail the session with `error`, then return to idle.
    fn fail(&mut self, error: PlaybackError) {
        tracing::error!("Session {} failed: {}", self.generation, error);
        self.last_error = Some(error.to_string());
        self.release();
        self.transition(SessionState::Failed);
        self.publish(SessionUpdate::Error(error));
        self.go_idle();
    }

    /// Move to a terminal state, release everything, and go idle.
    fn finish(&mut self, terminal: SessionState) {
        self.release();
        self.transition(terminal);
        self.go_idle();
    }

    /// Stop the engine and the progress timer for the current session.
    fn release(&mut self) {
        if self.state().has_media() {
            self.stop_engine();
        }
        if let Some(session) = self.session.as_mut() {
            session.timer = None;
        }
    }

    fn go_idle(&mut self) {
        self.session = None;
        tracing::info!("Session idle");
        self.publish(SessionUpdate::State(self.snapshot()));
    }

    fn stop_engine(&mut self) {
        if let Err(e) = self.engine.stop() {
            tracing::warn!("Failed to stop media engine: {}", e);
        }
    }

    fn known_duration(&self) -> u64 {
        match self.engine.duration() {
            0 => self.session.as_ref().map_or(0, |s| s.duration_ms),
            ms => ms,
        }
    }

    fn require(
        &self,
        command: &'static str,
        allowed: &[SessionState],
    ) -> Result<(), PlaybackError> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(PlaybackError::InvalidState { command, state })
        }
    }

    fn transition(&mut self, state: SessionState) {
        if let Some(session) = self.session.as_mut() {
            tracing::info!(
                "Session {} ({}): {:?} -> {:?}",
                session.generation,
                session.track.id,
                session.state,
                state
            );
            session.state = state;
        }
        self.publish(SessionUpdate::State(self.snapshot()));
    }

    fn publish(&self, update: SessionUpdate) {
        let _ = self.updates.send(update);
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.resolution.cancel();
            if session.state.has_media() {
                self.stop_engine();
            }
        }
    }
}

/// Turn a provider stream record into a descriptor, filling gaps from the
/// track being played.
fn describe_stream(raw: RawStreamRecord, track: &Track) -> Result<StreamDescriptor, PlaybackError> {
    let url = raw
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| PlaybackError::NoStreamAvailable(track.id.clone()))?;

    Ok(StreamDescriptor {
        url,
        title: raw
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| track.title.clone()),
        author: raw
            .author
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| track.artist_display.clone()),
        duration_seconds: raw.duration_seconds.or(track.duration_seconds),
        bitrate: raw.bitrate,
        mime_type: raw.mime_type,
        format_id: raw.format_id,
    })
}

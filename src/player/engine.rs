//! The media engine capability surface driven by the session controller.

use thiserror::Error;
use tokio::sync::mpsc;

use super::session::ControllerMessage;

/// Events a media engine reports about the media it was last told to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Ready,
    Buffering,
    Ended,
    Error(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audio engine unavailable: {0}")]
    Unavailable(String),

    #[error("engine command failed: {0}")]
    Command(String),
}

/// Delivers engine events for one load back to the controller.
///
/// Each sink is stamped with the generation of the session that issued the
/// load, so events for media that has since been replaced are dropped.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<ControllerMessage>,
}

impl EngineEventSink {
    pub(super) fn new(generation: u64, tx: mpsc::UnboundedSender<ControllerMessage>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Send an event. Returns false once the controller is gone.
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.tx
            .send(ControllerMessage::Engine {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// An audio playback component.
///
/// Commands are issued from the controller's thread and must not block on
/// I/O; progress is read back synchronously.
pub trait MediaEngine {
    /// Start preparing `url`. Readiness is reported through `events`.
    fn load(&mut self, url: &str, events: EngineEventSink) -> Result<(), EngineError>;
    fn play(&mut self) -> Result<(), EngineError>;
    fn pause(&mut self) -> Result<(), EngineError>;
    /// Stop playback and release the loaded media.
    fn stop(&mut self) -> Result<(), EngineError>;
    fn seek_to(&mut self, position_ms: u64) -> Result<(), EngineError>;
    fn current_position(&self) -> u64;
    /// Duration of the loaded media in milliseconds, 0 when unknown.
    fn duration(&self) -> u64;
}

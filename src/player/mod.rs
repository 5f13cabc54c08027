//! Playback: the session controller and the media engines it drives.

pub mod backend;
pub mod engine;
pub mod session;

pub use backend::RodioEngine;
pub use session::{
    ControllerMessage, PlaybackController, PlaybackError, SeekTarget, SessionSnapshot,
    SessionState, SessionUpdate,
};

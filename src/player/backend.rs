//! Audio playback backend using rodio.

use std::io::{BufReader, Cursor};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::probe::Hint;
use tokio::sync::mpsc;

use super::engine::{EngineError, EngineEvent, EngineEventSink, MediaEngine};

/// Messages sent to the audio thread.
#[derive(Debug)]
enum EngineCommand {
    Load { url: String, events: EngineEventSink },
    Play,
    Pause,
    Stop,
    Seek(Duration),
}

/// State shared between the engine handle and the audio thread.
struct EngineStateShared {
    position_ms: AtomicU64,
    duration_ms: AtomicU64,
    volume: AtomicU64,
}

impl EngineStateShared {
    fn new(volume: u8) -> Self {
        Self {
            position_ms: AtomicU64::new(0),
            duration_ms: AtomicU64::new(0),
            volume: AtomicU64::new(u64::from(volume.min(100))),
        }
    }

    /// Forget position and duration of whatever was loaded before.
    fn clear(&self) {
        self.position_ms.store(0, Ordering::SeqCst);
        self.duration_ms.store(0, Ordering::SeqCst);
    }
}

/// A [`MediaEngine`] that downloads the stream and plays it through the
/// default output device on a dedicated thread.
pub struct RodioEngine {
    command_tx: mpsc::UnboundedSender<EngineCommand>,
    state: Arc<EngineStateShared>,
}

impl RodioEngine {
    /// Open the default output device. `volume` is 0-100.
    pub fn new(volume: u8) -> Result<Self, EngineError> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let state = Arc::new(EngineStateShared::new(volume));
        let state_clone = Arc::clone(&state);

        // The output stream is not Send, so it is opened on the audio thread.
        std::thread::spawn(move || {
            let output = OutputStream::try_default();
            let (_stream, handle) = match output {
                Ok(output) => {
                    let _ = ready_tx.send(Ok(()));
                    output
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            if let Err(e) = run_audio_thread(command_rx, handle, state_clone) {
                tracing::error!("Audio thread error: {}", e);
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { command_tx, state }),
            Ok(Err(e)) => Err(EngineError::Unavailable(e)),
            Err(_) => Err(EngineError::Unavailable(String::from(
                "audio thread exited during startup",
            ))),
        }
    }

    fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.command_tx
            .send(command)
            .map_err(|_| EngineError::Command(String::from("audio thread has exited")))
    }
}

impl MediaEngine for RodioEngine {
    fn load(&mut self, url: &str, events: EngineEventSink) -> Result<(), EngineError> {
        self.state.clear();
        self.send(EngineCommand::Load {
            url: url.to_string(),
            events,
        })
    }

    fn play(&mut self) -> Result<(), EngineError> {
        self.send(EngineCommand::Play)
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.send(EngineCommand::Pause)
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.send(EngineCommand::Stop)
    }

    fn seek_to(&mut self, position_ms: u64) -> Result<(), EngineError> {
        self.state.position_ms.store(position_ms, Ordering::SeqCst);
        self.send(EngineCommand::Seek(Duration::from_millis(position_ms)))
    }

    fn current_position(&self) -> u64 {
        self.state.position_ms.load(Ordering::SeqCst)
    }

    fn duration(&self) -> u64 {
        self.state.duration_ms.load(Ordering::SeqCst)
    }
}

/// Media currently held by the audio thread.
struct LoadedMedia {
    data: Arc<[u8]>,
    events: EngineEventSink,
    clock: PlaybackClock,
}

/// Wall-clock position tracking for a sink.
#[derive(Debug, Default)]
struct PlaybackClock {
    offset: Duration,
    resumed_at: Option<Instant>,
}

impl PlaybackClock {
    fn position(&self) -> Duration {
        self.offset + self.resumed_at.map_or(Duration::ZERO, |t| t.elapsed())
    }

    fn resume(&mut self) {
        if self.resumed_at.is_none() {
            self.resumed_at = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.offset = self.position();
        self.resumed_at = None;
    }

    fn reset(&mut self, position: Duration) {
        let running = self.resumed_at.is_some();
        self.offset = position;
        self.resumed_at = running.then(Instant::now);
    }

    fn is_running(&self) -> bool {
        self.resumed_at.is_some()
    }
}

fn run_audio_thread(
    mut command_rx: mpsc::UnboundedReceiver<EngineCommand>,
    handle: OutputStreamHandle,
    state: Arc<EngineStateShared>,
) -> Result<(), rodio::PlayError> {
    let mut sink = Sink::try_new(&handle)?;
    let mut media: Option<LoadedMedia> = None;

    loop {
        match command_rx.try_recv() {
            Ok(command) => {
                let volume = state.volume.load(Ordering::SeqCst) as f32 / 100.0;
                match command {
                    EngineCommand::Load { url, events } => {
                        sink.stop();
                        sink = Sink::try_new(&handle)?;
                        // A previous load may have finished after the
                        // handle cleared these.
                        state.clear();
                        media = load_media(&url, events, &sink, volume, &state);
                    }
                    EngineCommand::Play => {
                        if let Some(m) = media.as_mut() {
                            sink.play();
                            m.clock.resume();
                        }
                    }
                    EngineCommand::Pause => {
                        if let Some(m) = media.as_mut() {
                            sink.pause();
                            m.clock.pause();
                        }
                    }
                    EngineCommand::Stop => {
                        sink.stop();
                        sink = Sink::try_new(&handle)?;
                        media = None;
                        state.clear();
                    }
                    EngineCommand::Seek(position) => {
                        if let Some(m) = media.as_mut() {
                            // Re-append the source from the new position.
                            let running = m.clock.is_running();
                            sink.stop();
                            sink = Sink::try_new(&handle)?;
                            if !running {
                                sink.pause();
                            }
                            match append_source(&m.data, &sink, volume, position) {
                                Ok(_) => m.clock.reset(position),
                                Err(e) => {
                                    m.events.emit(EngineEvent::Error(format!("Seek failed: {e}")));
                                }
                            }
                        }
                    }
                }
            }
            Err(mpsc::error::TryRecvError::Empty) => {}
            Err(mpsc::error::TryRecvError::Disconnected) => break,
        }

        if let Some(m) = media.as_ref() {
            if m.clock.is_running() && sink.empty() {
                m.events.emit(EngineEvent::Ended);
                media = None;
            } else {
                let position = m.clock.position().as_millis() as u64;
                state.position_ms.store(position, Ordering::SeqCst);
            }
        }

        std::thread::sleep(Duration::from_millis(100));
    }

    Ok(())
}

/// Download and decode `url` into a paused sink, reporting readiness.
fn load_media(
    url: &str,
    events: EngineEventSink,
    sink: &Sink,
    volume: f32,
    state: &EngineStateShared,
) -> Option<LoadedMedia> {
    tracing::debug!("Loading media for generation {}", events.generation());
    events.emit(EngineEvent::Buffering);

    let data: Arc<[u8]> = match fetch_audio_data(url) {
        Ok(data) => data.into(),
        Err(e) => {
            events.emit(EngineEvent::Error(e.to_string()));
            return None;
        }
    };

    sink.pause();
    match append_source(&data, sink, volume, Duration::ZERO) {
        Ok(total) => {
            if let Some(total) = total.or_else(|| probe_duration(&data)) {
                state
                    .duration_ms
                    .store(total.as_millis() as u64, Ordering::SeqCst);
            }
            events.emit(EngineEvent::Ready);
            Some(LoadedMedia {
                data,
                events,
                clock: PlaybackClock::default(),
            })
        }
        Err(e) => {
            events.emit(EngineEvent::Error(e.to_string()));
            None
        }
    }
}

/// Duration from the container's frame count, for formats whose rodio
/// decoder does not report one.
fn probe_duration(audio_data: &Arc<[u8]>) -> Option<Duration> {
    let cursor = Cursor::new(Arc::clone(audio_data));
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());
    let probed = symphonia::default::get_probe()
        .format(&Hint::new(), mss, &Default::default(), &Default::default())
        .ok()?;

    let track = probed.format.default_track()?;
    let frames = track.codec_params.n_frames?;
    let sample_rate = track.codec_params.sample_rate?;
    if sample_rate == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(frames as f64 / f64::from(sample_rate)))
}

/// Fetch audio data from URL.
fn fetch_audio_data(url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let response = reqwest::blocking::get(url)?.error_for_status()?;
    let bytes = response.bytes()?;
    Ok(bytes.to_vec())
}

/// Decode audio data onto the sink, skipping to `skip`. Returns the total
/// duration when the container reports one.
fn append_source(
    audio_data: &Arc<[u8]>,
    sink: &Sink,
    volume: f32,
    skip: Duration,
) -> Result<Option<Duration>, rodio::decoder::DecoderError> {
    let cursor = Cursor::new(Arc::clone(audio_data));
    let source = Decoder::new(BufReader::new(cursor))?;
    let total = source.total_duration();

    if skip > Duration::ZERO {
        sink.append(source.skip_duration(skip));
    } else {
        sink.append(source);
    }
    sink.set_volume(volume);

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_duration_rejects_garbage() {
        let data: Arc<[u8]> = Arc::from(&b"definitely not audio"[..]);
        assert_eq!(probe_duration(&data), None);
    }

    #[test]
    fn test_clear_drops_previous_duration() {
        let state = EngineStateShared::new(250);
        assert_eq!(state.volume.load(Ordering::SeqCst), 100);

        // A late store from an earlier load must not survive the next one.
        state.duration_ms.store(215_000, Ordering::SeqCst);
        state.position_ms.store(12_000, Ordering::SeqCst);
        state.clear();
        assert_eq!(state.duration_ms.load(Ordering::SeqCst), 0);
        assert_eq!(state.position_ms.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clock_accumulates_only_while_running() {
        let mut clock = PlaybackClock::default();
        assert_eq!(clock.position(), Duration::ZERO);
        assert!(!clock.is_running());

        clock.resume();
        std::thread::sleep(Duration::from_millis(20));
        clock.pause();
        let paused_at = clock.position();
        assert!(paused_at >= Duration::from_millis(20));

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(clock.position(), paused_at);
    }

    #[test]
    fn test_clock_reset_keeps_running_state() {
        let mut clock = PlaybackClock::default();
        clock.reset(Duration::from_secs(30));
        assert_eq!(clock.position(), Duration::from_secs(30));
        assert!(!clock.is_running());

        clock.resume();
        clock.reset(Duration::from_secs(10));
        assert!(clock.is_running());
        assert!(clock.position() >= Duration::from_secs(10));
        assert!(clock.position() < Duration::from_secs(11));
    }
}

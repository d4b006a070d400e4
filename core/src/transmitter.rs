use crate::baudot::{self, BaudotEncoder};
use crate::config::TransmitConfig;
use crate::error::{Result, RttyError};
use crate::events::{EventSink, LogEvent};
use crate::fsk::FskSynthesizer;
use crate::playback::{AudioBackend, AudioOutput};
use crate::schedule::{self, Clock, PollOutcome, SystemClock};
use crate::wav::WavStore;
use crate::{POLL_INTERVAL_MS, SAMPLE_RATE};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Lifecycle of the transmitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Encoding,
    Synthesizing,
    Playing,
    Saving,
    /// Last session was cancelled by `stop`
    Stopped,
}

impl SessionState {
    pub fn is_active(self) -> bool {
        !matches!(self, SessionState::Idle | SessionState::Stopped)
    }
}

/// What a successful `transmit` call started playing
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionSummary {
    pub symbols: usize,
    pub bit_units: usize,
    pub samples: usize,
    pub duration_secs: f64,
    pub skipped: Vec<char>,
}

type SharedOutput = Arc<Mutex<Option<Box<dyn AudioOutput>>>>;

fn set_state(state: &Mutex<SessionState>, next: SessionState) {
    let mut current = state.lock().unwrap_or_else(PoisonError::into_inner);
    log::debug!("session state {:?} -> {:?}", *current, next);
    *current = next;
}

/// Take the device out of the session and give it back
fn release_output(output: &SharedOutput, stop_first: bool) {
    let taken = output.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(mut device) = taken {
        if stop_first {
            device.stop();
        }
        device.release();
    }
}

/// A playing transmission and the thread watching it
struct Session {
    cancel: Arc<AtomicBool>,
    output: SharedOutput,
    monitor: Option<JoinHandle<()>>,
}

impl Session {
    fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
        release_output(&self.output, true);
    }

    fn join(&mut self) {
        if let Some(handle) = self.monitor.take() {
            if handle.join().is_err() {
                log::error!("playback monitor panicked");
            }
        }
    }
}

/// Watches playback progress, then runs the save and completion steps
struct Monitor {
    output: SharedOutput,
    cancel: Arc<AtomicBool>,
    samples: Vec<i16>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn WavStore>>,
    state: Arc<Mutex<SessionState>>,
    save_to_file: bool,
}

impl Monitor {
    fn run(mut self) {
        let total = self.samples.len();
        let interval = Duration::from_millis(POLL_INTERVAL_MS);
        let outcome = schedule::poll_until(&*self.clock, interval, &self.cancel, || {
            self.position() >= total || self.fault().is_some()
        });
        if outcome == PollOutcome::Cancelled {
            log::debug!("playback monitor cancelled");
            return;
        }

        if let Some(reason) = self.fault() {
            let err = RttyError::DeviceAcquisitionFailure(reason);
            log::error!("playback failed at sample {}/{}: {}", self.position(), total, err);
            self.sink.report(LogEvent::error(format!("Error: {}", err)));
            release_output(&self.output, true);
            set_state(&self.state, SessionState::Idle);
            return;
        }

        self.sink.report(LogEvent::info("Playback finished."));

        if self.save_to_file {
            set_state(&self.state, SessionState::Saving);
            self.sink.report(LogEvent::info("Saving file..."));
            match self.save() {
                Ok(path) => self
                    .sink
                    .report(LogEvent::info(format!("File saved: {}", path.display()))),
                Err(err) => self.sink.report(LogEvent::error(format!("Error: {}", err))),
            }
        }

        // A stop during the save owns the rest of the session
        if self.cancel.load(Ordering::Acquire) {
            return;
        }

        self.sink
            .report(LogEvent::highlight("=== Transmission complete ==="));
        release_output(&self.output, false);
        set_state(&self.state, SessionState::Idle);
        log::info!("transmission complete");
    }

    fn position(&self) -> usize {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|device| device.playback_position())
            .unwrap_or(0)
    }

    fn fault(&self) -> Option<String> {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|device| device.fault())
    }

    /// Write the WAV on its own thread and wait for the outcome
    fn save(&mut self) -> Result<PathBuf> {
        let store = self.store.clone().ok_or_else(|| {
            RttyError::PersistenceFailure("no output location configured".to_string())
        })?;
        let samples = std::mem::take(&mut self.samples);
        let (tx, rx) = crossbeam_channel::bounded(1);

        thread::Builder::new()
            .name("rtty-wav-writer".to_string())
            .spawn(move || {
                let _ = tx.send(store.save(&samples));
            })?;

        rx.recv().map_err(|_| {
            RttyError::PersistenceFailure("file writer exited without a result".to_string())
        })?
    }
}

/// Runs text through the encoder and synthesizer and plays the result.
///
/// Owns at most one playback session. Progress is reported through the
/// injected `EventSink`; completion is detected by polling the device
/// position every `POLL_INTERVAL_MS`.
pub struct Transmitter {
    backend: Arc<dyn AudioBackend>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn WavStore>>,
    synthesizer: FskSynthesizer,
    state: Arc<Mutex<SessionState>>,
    session: Option<Session>,
}

impl Transmitter {
    pub fn new(backend: Arc<dyn AudioBackend>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            backend,
            sink,
            clock: Arc::new(SystemClock),
            store: None,
            synthesizer: FskSynthesizer::new(),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            session: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Where recordings go when `save_to_file` is set
    pub fn with_store(mut self, store: Arc<dyn WavStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Encode, synthesize and start playing `text`.
    ///
    /// Returns once playback has started; completion and the optional save
    /// happen on a background thread. Any session still playing is stopped
    /// and its device released first.
    pub fn transmit(&mut self, text: &str, config: &TransmitConfig) -> Result<TransmissionSummary> {
        if text.trim().is_empty() {
            self.sink.report(LogEvent::error("Error: no text entered."));
            return Err(RttyError::EmptyInput);
        }
        if let Err(err) = config.validate() {
            self.sink.report(LogEvent::error(format!("Error: {}", err)));
            return Err(err);
        }

        self.halt();

        let params = config.tone_params();
        self.sink
            .report(LogEvent::highlight("=== RTTY transmission start ==="));
        self.sink
            .report(LogEvent::info(format!("MARK frequency: {} Hz", params.mark_freq)));
        self.sink
            .report(LogEvent::info(format!("SPACE frequency: {} Hz", params.space_freq)));
        self.sink
            .report(LogEvent::info(format!("Baud rate: {} Bd", params.baud_rate)));
        self.sink
            .report(LogEvent::info(format!("Volume: {}%", config.volume.min(100))));

        set_state(&self.state, SessionState::Encoding);
        let encoding = match BaudotEncoder::with_verbose(config.verbose).encode(text) {
            Ok(encoding) => encoding,
            Err(err) => return self.abort(err),
        };
        for event in &encoding.events {
            self.sink.report(event.clone());
        }

        set_state(&self.state, SessionState::Synthesizing);
        let synthesis = match self.synthesizer.synthesize(&encoding.bits, &params) {
            Ok(synthesis) => synthesis,
            Err(err) => return self.abort(err),
        };
        if config.verbose {
            self.sink
                .report(LogEvent::info(baudot::format_bits(&encoding.bits)));
        }
        let duration_secs = synthesis.duration_secs();
        self.sink
            .report(LogEvent::info(format!("Audio duration: {:.1} s", duration_secs)));

        let summary = TransmissionSummary {
            symbols: encoding.symbols.len(),
            bit_units: encoding.bits.len(),
            samples: synthesis.samples.len(),
            duration_secs,
            skipped: encoding.skipped,
        };
        let samples = synthesis.samples;

        let mut device = match self.backend.open(self.synthesizer.sample_rate()) {
            Ok(device) => device,
            Err(err) => return self.abort(err),
        };
        if let Err(err) = device.write(&samples).and_then(|()| device.play()) {
            device.release();
            return self.abort(err);
        }

        set_state(&self.state, SessionState::Playing);
        self.sink.report(LogEvent::info("Playing audio..."));
        log::info!(
            "playing {} samples at {} Hz ({:.1} s)",
            samples.len(),
            SAMPLE_RATE,
            duration_secs
        );

        let output: SharedOutput = Arc::new(Mutex::new(Some(device)));
        let cancel = Arc::new(AtomicBool::new(false));
        let monitor = Monitor {
            output: Arc::clone(&output),
            cancel: Arc::clone(&cancel),
            samples,
            sink: Arc::clone(&self.sink),
            clock: Arc::clone(&self.clock),
            store: self.store.clone(),
            state: Arc::clone(&self.state),
            save_to_file: config.save_to_file,
        };

        let spawned = thread::Builder::new()
            .name("rtty-playback".to_string())
            .spawn(move || monitor.run());
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                release_output(&output, true);
                return self.abort(RttyError::DeviceAcquisitionFailure(format!(
                    "failed to start playback monitor: {}",
                    err
                )));
            }
        };

        self.session = Some(Session {
            cancel,
            output,
            monitor: Some(handle),
        });

        Ok(summary)
    }

    /// Halt playback and release the device.
    ///
    /// A WAV save already in progress still finishes and reports its
    /// outcome before this returns.
    pub fn stop(&mut self) {
        let was_active = self.is_active();
        self.halt();
        self.sink
            .report(LogEvent::highlight("=== Transmission stopped ==="));
        if was_active {
            set_state(&self.state, SessionState::Stopped);
        }
    }

    /// Block until the current session has finished playing (and saving).
    ///
    /// Returns immediately when idle. Never returns if the device stops
    /// making progress and nobody calls `stop` from another thread.
    pub fn wait(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.join();
        }
    }

    fn halt(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.cancel();
            session.join();
            log::info!("previous session halted");
        }
    }

    fn abort(&self, err: RttyError) -> Result<TransmissionSummary> {
        self.sink.report(LogEvent::error(format!("Error: {}", err)));
        set_state(&self.state, SessionState::Idle);
        Err(err)
    }
}

impl Drop for Transmitter {
    fn drop(&mut self) {
        self.halt();
    }
}

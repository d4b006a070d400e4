use crate::error::{Result, RttyError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// An opened audio output holding one static PCM buffer.
///
/// This trait allows swapping implementations (real audio device vs mock).
pub trait AudioOutput: Send {
    /// Load the mono 16-bit buffer to play
    fn write(&mut self, samples: &[i16]) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    /// Number of samples played so far
    fn playback_position(&self) -> usize;

    /// Error that ended playback early, if the device reported one
    fn fault(&self) -> Option<String> {
        None
    }

    /// Halt playback; the buffer position is left where it is
    fn stop(&mut self);

    /// Give the device back. Must be idempotent.
    fn release(&mut self);
}

/// Factory for exclusive audio outputs
pub trait AudioBackend: Send + Sync {
    fn open(&self, sample_rate: u32) -> Result<Box<dyn AudioOutput>>;
}

/// Backend used when no audio support is compiled in
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAudioBackend;

impl AudioBackend for NoAudioBackend {
    fn open(&self, _sample_rate: u32) -> Result<Box<dyn AudioOutput>> {
        Err(RttyError::DeviceAcquisitionFailure(
            "no audio backend available in this build".to_string(),
        ))
    }
}

/// Counters shared between a `MockBackend` and the outputs it opens
#[derive(Debug, Default)]
struct MockState {
    opened: AtomicUsize,
    released: AtomicUsize,
    stopped: AtomicUsize,
    open_now: AtomicUsize,
    max_open: AtomicUsize,
    written: Mutex<Vec<i16>>,
}

/// Mock backend for testing.
///
/// Each `playback_position` query advances playback by `step` samples, so a
/// poller sees progress without real time passing.
#[derive(Debug, Clone)]
pub struct MockBackend {
    state: Arc<MockState>,
    step: usize,
    fail_at: Option<usize>,
    should_fail_open: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            step: (crate::SAMPLE_RATE as u64 * crate::POLL_INTERVAL_MS / 1000) as usize,
            fail_at: None,
            should_fail_open: false,
        }
    }

    /// Samples played per position query
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Never make progress; playback only ends through `stop`
    pub fn stalled(self) -> Self {
        self.with_step(0)
    }

    /// Lose the stream once playback reaches `position`
    pub fn with_stream_error_at(mut self, position: usize) -> Self {
        self.fail_at = Some(position);
        self
    }

    pub fn with_open_failure(mut self) -> Self {
        self.should_fail_open = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.state.stopped.load(Ordering::SeqCst)
    }

    /// Largest number of outputs held open at the same time
    pub fn max_concurrent(&self) -> usize {
        self.state.max_open.load(Ordering::SeqCst)
    }

    /// Samples handed to the most recently written output
    pub fn written(&self) -> Vec<i16> {
        self.state
            .written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for MockBackend {
    fn open(&self, _sample_rate: u32) -> Result<Box<dyn AudioOutput>> {
        if self.should_fail_open {
            return Err(RttyError::DeviceAcquisitionFailure(
                "mock device busy".to_string(),
            ));
        }

        self.state.opened.fetch_add(1, Ordering::SeqCst);
        let open_now = self.state.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open.fetch_max(open_now, Ordering::SeqCst);

        Ok(Box::new(MockOutput {
            state: Arc::clone(&self.state),
            step: self.step,
            fail_at: self.fail_at,
            position: AtomicUsize::new(0),
            len: 0,
            playing: false,
            released: false,
        }))
    }
}

struct MockOutput {
    state: Arc<MockState>,
    step: usize,
    fail_at: Option<usize>,
    position: AtomicUsize,
    len: usize,
    playing: bool,
    released: bool,
}

impl AudioOutput for MockOutput {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        self.len = samples.len();
        *self
            .state
            .written
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = samples.to_vec();
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.playing = true;
        Ok(())
    }

    fn playback_position(&self) -> usize {
        if !self.playing {
            return self.position.load(Ordering::SeqCst);
        }
        let end = self.fail_at.map_or(self.len, |at| at.min(self.len));
        let next = (self.position.load(Ordering::SeqCst) + self.step).min(end);
        self.position.store(next, Ordering::SeqCst);
        next
    }

    fn fault(&self) -> Option<String> {
        let at = self.fail_at?;
        (self.position.load(Ordering::SeqCst) >= at).then(|| "mock stream lost".to_string())
    }

    fn stop(&mut self) {
        if self.playing {
            self.playing = false;
            self.state.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.playing = false;
            self.state.released.fetch_add(1, Ordering::SeqCst);
            self.state.open_now.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockOutput {
    fn drop(&mut self) {
        self.release();
    }
}

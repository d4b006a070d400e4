//! RTTY transmitter library
//!
//! Encodes text as ITA2 / МТК-2 Baudot code and renders it as a
//! phase-continuous two-tone FSK signal at 44.1 kHz, then plays it on an
//! audio output and optionally stores it as a WAV file.

pub mod error;
pub mod ita2;
pub mod baudot;
pub mod fsk;
pub mod events;
pub mod config;
pub mod schedule;
pub mod playback;
pub mod wav;
pub mod transmitter;

#[cfg(feature = "cpal-audio")]
pub mod cpal_output;

pub use baudot::{BaudotEncoder, BitUnit, Encoding};
pub use config::TransmitConfig;
pub use error::{Result, RttyError};
pub use events::{EventSink, LogEvent, LogKind, LogSink, MemorySink};
pub use fsk::{FskSynthesizer, Synthesis, ToneParams};
pub use ita2::{Mode, SymbolKey};
pub use playback::{AudioBackend, AudioOutput, NoAudioBackend};
pub use schedule::{Clock, SystemClock};
pub use transmitter::{SessionState, TransmissionSummary, Transmitter};
pub use wav::{DirectoryStore, WavStore};

// Audio format
pub const SAMPLE_RATE: u32 = 44100;

// Mark tone framing around every transmission
pub const PREAMBLE_DURATION_MS: u64 = 300;
pub const PREAMBLE_SAMPLES: usize = (SAMPLE_RATE as usize * PREAMBLE_DURATION_MS as usize) / 1000; // 13230
pub const POSTAMBLE_DURATION_MS: u64 = 300;
pub const POSTAMBLE_SAMPLES: usize = (SAMPLE_RATE as usize * POSTAMBLE_DURATION_MS as usize) / 1000; // 13230

// Longest signal one transmission may render
pub const MAX_AUDIO_DURATION_SECS: u64 = 3600;
pub const MAX_SAMPLES: usize = SAMPLE_RATE as usize * MAX_AUDIO_DURATION_SECS as usize;

// Playback completion polling
pub const POLL_INTERVAL_MS: u64 = 100;

// Default line settings
pub const DEFAULT_BAUD_RATE: f64 = 45.45;
pub const DEFAULT_MARK_FREQ: u32 = 1170;
pub const DEFAULT_SPACE_FREQ: u32 = 1000;
pub const DEFAULT_VOLUME_PERCENT: u8 = 50;

pub const WAV_FILE_NAME: &str = "RTTY.wav";

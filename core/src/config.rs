use crate::error::Result;
use crate::fsk::ToneParams;
use serde::{Deserialize, Serialize};

/// Settings for one transmission, supplied by the front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmitConfig {
    pub baud_rate: f64,
    pub mark_freq: u32,
    pub space_freq: u32,
    /// Output level in percent; values above 100 are treated as 100
    pub volume: u8,
    /// Log every symbol and the full bit listing
    pub verbose: bool,
    /// Store the rendered signal as a WAV file after playback
    pub save_to_file: bool,
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            baud_rate: crate::DEFAULT_BAUD_RATE,
            mark_freq: crate::DEFAULT_MARK_FREQ,
            space_freq: crate::DEFAULT_SPACE_FREQ,
            volume: crate::DEFAULT_VOLUME_PERCENT,
            verbose: false,
            save_to_file: false,
        }
    }
}

impl TransmitConfig {
    pub fn volume_fraction(&self) -> f32 {
        self.volume.min(100) as f32 / 100.0
    }

    pub fn tone_params(&self) -> ToneParams {
        ToneParams {
            baud_rate: self.baud_rate,
            mark_freq: self.mark_freq,
            space_freq: self.space_freq,
            volume: self.volume_fraction(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.tone_params().validate()
    }
}

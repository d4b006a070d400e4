use crate::baudot::BitUnit;
use crate::error::{Result, RttyError};
use crate::{
    MAX_AUDIO_DURATION_SECS, MAX_SAMPLES, POSTAMBLE_DURATION_MS, PREAMBLE_DURATION_MS, SAMPLE_RATE,
};
use std::f64::consts::PI;
use std::ops::Range;

// Two-tone FSK with a continuous phase accumulator.
//
// Each bit unit becomes one sine segment on the mark or space tone. The
// phase carried into the next segment is the analytic phase at the end of
// the previous one, so tone changes never produce a step in the waveform.

/// Peak amplitude before quantization (half of full scale)
const HALF_SCALE: f32 = (i16::MAX / 2) as f32;

const TWO_PI: f64 = 2.0 * PI;

/// Tone and timing parameters for one transmission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneParams {
    /// Symbols per second
    pub baud_rate: f64,
    /// Tone for logical 1 and stop bits (Hz)
    pub mark_freq: u32,
    /// Tone for logical 0 and start bits (Hz)
    pub space_freq: u32,
    /// Output level, clamped to 0.0..=1.0
    pub volume: f32,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self {
            baud_rate: crate::DEFAULT_BAUD_RATE,
            mark_freq: crate::DEFAULT_MARK_FREQ,
            space_freq: crate::DEFAULT_SPACE_FREQ,
            volume: 0.5,
        }
    }
}

impl ToneParams {
    pub fn bit_duration(&self) -> f64 {
        1.0 / self.baud_rate
    }

    pub fn frequency_for(&self, bit: BitUnit) -> u32 {
        if bit.is_mark() {
            self.mark_freq
        } else {
            self.space_freq
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.baud_rate.is_finite() || self.baud_rate <= 0.0 {
            return Err(RttyError::InvalidConfiguration(format!(
                "baud rate must be positive, got {}",
                self.baud_rate
            )));
        }
        // The shortest unit (half-stop) needs at least one sample
        if samples_for(0.5 * self.bit_duration()) == 0 {
            return Err(RttyError::InvalidConfiguration(format!(
                "baud rate {} is too high for {} Hz output",
                self.baud_rate, SAMPLE_RATE
            )));
        }
        if self.mark_freq == 0 || self.space_freq == 0 {
            return Err(RttyError::InvalidConfiguration(format!(
                "tone frequencies must be positive, got mark {} Hz / space {} Hz",
                self.mark_freq, self.space_freq
            )));
        }
        Ok(())
    }
}

/// One constant-frequency stretch of the output
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub frequency: u32,
    pub duration: f64,
    /// Phase of the first sample (radians)
    pub start_phase: f64,
    /// Phase carried into the next segment, in `[0, 2π)`
    pub end_phase: f64,
    pub sample_range: Range<usize>,
}

/// PCM output of one synthesis call
#[derive(Debug, Clone, Default)]
pub struct Synthesis {
    pub samples: Vec<i16>,
    /// Preamble, one segment per bit unit, then postamble
    pub segments: Vec<Segment>,
}

impl Synthesis {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }
}

/// Number of samples a segment of `duration_secs` occupies
pub fn samples_for(duration_secs: f64) -> usize {
    (SAMPLE_RATE as f64 * duration_secs).round() as usize
}

/// Phase after holding `freq_hz` for `duration_secs`, wrapped to `[0, 2π)`
pub fn advance_phase(phase: f64, freq_hz: u32, duration_secs: f64) -> f64 {
    let cycles = freq_hz as f64 * duration_secs;
    (phase + TWO_PI * cycles).rem_euclid(TWO_PI)
}

/// Generate a sine tone starting at `phase`.
///
/// Returns unquantized amplitudes in `[-HALF_SCALE, HALF_SCALE]`.
pub fn generate_tone(freq_hz: u32, num_samples: usize, phase: f64, volume: f32) -> Vec<f32> {
    let omega = TWO_PI * freq_hz as f64;
    let gain = volume.clamp(0.0, 1.0) * HALF_SCALE;

    (0..num_samples)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE as f64;
            (omega * t + phase).sin() as f32 * gain
        })
        .collect()
}

/// Map a tone amplitude to a 16-bit sample
fn quantize(amplitude: f32) -> i16 {
    (amplitude * 2.0) as i16
}

/// Samples `synthesize` will produce for `bits` at `baud_rate`.
///
/// `None` when the count does not fit in `usize`.
pub fn expected_sample_count(bits: &[BitUnit], baud_rate: f64) -> Option<usize> {
    let bit_duration = 1.0 / baud_rate;
    let framing = samples_for(PREAMBLE_DURATION_MS as f64 / 1000.0)
        + samples_for(POSTAMBLE_DURATION_MS as f64 / 1000.0);

    bits.iter().try_fold(framing, |total, bit| {
        total.checked_add(samples_for(bit_duration * bit.duration_factor()))
    })
}

/// Phase-continuous two-tone FSK synthesizer
pub struct FskSynthesizer {
    sample_rate: u32,
}

impl FskSynthesizer {
    pub fn new() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Synthesize `bits` as mark/space tones framed by a 300 ms mark
    /// preamble and postamble.
    pub fn synthesize(&self, bits: &[BitUnit], params: &ToneParams) -> Result<Synthesis> {
        params.validate()?;

        let total = expected_sample_count(bits, params.baud_rate)
            .filter(|&n| n <= MAX_SAMPLES)
            .ok_or_else(|| {
                RttyError::InvalidConfiguration(format!(
                    "{} bit units at {} Bd exceed the {} s audio limit",
                    bits.len(),
                    params.baud_rate,
                    MAX_AUDIO_DURATION_SECS
                ))
            })?;

        let bit_duration = params.bit_duration();
        let mut out = Synthesis {
            samples: Vec::with_capacity(total),
            segments: Vec::with_capacity(bits.len() + 2),
        };
        let mut phase = 0.0;

        let preamble = PREAMBLE_DURATION_MS as f64 / 1000.0;
        phase = self.push_segment(&mut out, params.mark_freq, preamble, phase, params.volume);

        for &bit in bits {
            let freq = params.frequency_for(bit);
            let duration = bit_duration * bit.duration_factor();
            phase = self.push_segment(&mut out, freq, duration, phase, params.volume);
        }

        let postamble = POSTAMBLE_DURATION_MS as f64 / 1000.0;
        self.push_segment(&mut out, params.mark_freq, postamble, phase, params.volume);

        log::debug!(
            "synthesized {} bit units into {} samples ({:.3} s)",
            bits.len(),
            out.samples.len(),
            out.duration_secs()
        );

        Ok(out)
    }

    fn push_segment(
        &self,
        out: &mut Synthesis,
        freq: u32,
        duration: f64,
        phase: f64,
        volume: f32,
    ) -> f64 {
        let start = out.samples.len();
        let tone = generate_tone(freq, samples_for(duration), phase, volume);
        out.samples.extend(tone.into_iter().map(quantize));

        let end_phase = advance_phase(phase, freq, duration);
        out.segments.push(Segment {
            frequency: freq,
            duration,
            start_phase: phase,
            end_phase,
            sample_range: start..out.samples.len(),
        });
        end_phase
    }
}

impl Default for FskSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baudot::BaudotEncoder;

    fn cq_bits() -> Vec<BitUnit> {
        BaudotEncoder::new().encode("CQ").unwrap().bits
    }

    fn full_volume() -> ToneParams {
        ToneParams {
            volume: 1.0,
            ..ToneParams::default()
        }
    }

    #[test]
    fn test_segment_layout() {
        let bits = cq_bits();
        let synth = FskSynthesizer::new().synthesize(&bits, &ToneParams::default()).unwrap();

        assert_eq!(synth.segments.len(), bits.len() + 2);
        let first = &synth.segments[0];
        let last = synth.segments.last().unwrap();
        assert_eq!(first.frequency, 1170);
        assert_eq!(first.sample_range, 0..13230);
        assert_eq!(last.frequency, 1170);
        assert_eq!(last.sample_range.len(), 13230);
        assert_eq!(last.sample_range.end, synth.samples.len());

        for (bit, segment) in bits.iter().zip(&synth.segments[1..]) {
            let expected = match bit {
                BitUnit::Space => 1000,
                BitUnit::Mark | BitUnit::HalfStop => 1170,
            };
            assert_eq!(segment.frequency, expected);
        }
    }

    #[test]
    fn test_sample_count_formula() {
        let bits = cq_bits();
        let params = ToneParams::default();
        let synth = FskSynthesizer::new().synthesize(&bits, &params).unwrap();

        let full = samples_for(1.0 / 45.45);
        let half = samples_for(0.5 / 45.45);
        let half_stops = bits.iter().filter(|b| **b == BitUnit::HalfStop).count();
        let expected = 2 * samples_for(0.3) + (bits.len() - half_stops) * full + half_stops * half;

        assert_eq!(synth.samples.len(), expected);
        assert_eq!(expected_sample_count(&bits, params.baud_rate), Some(expected));
    }

    #[test]
    fn test_cq_duration() {
        let bits = cq_bits();
        assert_eq!(bits.len(), 56);
        let synth = FskSynthesizer::new().synthesize(&bits, &ToneParams::default()).unwrap();

        // 49 full units plus 7 half stops
        let expected = 0.6 + 52.5 / 45.45;
        let rounding = (bits.len() + 2) as f64 * 0.5 / SAMPLE_RATE as f64;
        assert!(
            (synth.duration_secs() - expected).abs() <= rounding,
            "duration {} vs {}",
            synth.duration_secs(),
            expected
        );
    }

    #[test]
    fn test_phase_carried_between_segments() {
        let synth = FskSynthesizer::new().synthesize(&cq_bits(), &ToneParams::default()).unwrap();

        assert_eq!(synth.segments[0].start_phase, 0.0);
        for pair in synth.segments.windows(2) {
            assert!((pair[1].start_phase - pair[0].end_phase).abs() < 1e-12);
            let advanced = advance_phase(pair[0].start_phase, pair[0].frequency, pair[0].duration);
            assert!((advanced - pair[0].end_phase).abs() < 1e-9);
            assert!((0.0..TWO_PI).contains(&pair[0].end_phase));
        }

        // Phases actually accumulate rather than restarting at zero
        assert!(synth.segments[1..].iter().any(|s| s.start_phase > 0.1));
    }

    #[test]
    fn test_first_sample_uses_carried_phase() {
        let synth = FskSynthesizer::new().synthesize(&cq_bits(), &full_volume()).unwrap();

        for segment in &synth.segments {
            let expected = quantize(segment.start_phase.sin() as f32 * HALF_SCALE);
            let actual = synth.samples[segment.sample_range.start];
            assert!((actual as i32 - expected as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_no_discontinuity_at_boundaries() {
        let synth = FskSynthesizer::new().synthesize(&cq_bits(), &full_volume()).unwrap();

        for pair in synth.segments.windows(2) {
            let last = synth.samples[pair[0].sample_range.end - 1] as f64;
            let next = synth.samples[pair[1].sample_range.start] as f64;
            // At most 1.5 sample periods of phase advance separate the two samples
            let max_step = 2.0 * HALF_SCALE as f64 * TWO_PI * pair[0].frequency as f64 * 1.5
                / SAMPLE_RATE as f64
                + 2.0;
            assert!(
                (next - last).abs() <= max_step,
                "jump of {} at sample {}",
                next - last,
                pair[1].sample_range.start
            );
        }
    }

    #[test]
    fn test_volume_is_clamped() {
        let bits = cq_bits();
        let synth = FskSynthesizer::new();
        let loud = synth
            .synthesize(&bits, &ToneParams { volume: 3.0, ..ToneParams::default() })
            .unwrap();
        let full = synth.synthesize(&bits, &full_volume()).unwrap();
        assert_eq!(loud.samples, full.samples);

        let peak = full.samples.iter().map(|s| (*s as i32).abs()).max().unwrap();
        assert!(peak <= 32766);
        assert!(peak > 32000);

        let silent = synth
            .synthesize(&bits, &ToneParams { volume: -0.5, ..ToneParams::default() })
            .unwrap();
        assert!(silent.samples.iter().all(|s| *s == 0));
    }

    #[test]
    fn test_rejects_invalid_baud_rate() {
        let synth = FskSynthesizer::new();
        for baud_rate in [0.0, -45.45, f64::NAN, f64::INFINITY] {
            let params = ToneParams { baud_rate, ..ToneParams::default() };
            assert!(
                matches!(
                    synth.synthesize(&cq_bits(), &params),
                    Err(RttyError::InvalidConfiguration(_))
                ),
                "baud {}",
                baud_rate
            );
        }
    }

    #[test]
    fn test_rejects_baud_rate_too_fast_to_sample() {
        // Half-stop would round to zero samples and vanish from the signal
        let params = ToneParams {
            baud_rate: 1e6,
            ..ToneParams::default()
        };
        assert!(matches!(
            FskSynthesizer::new().synthesize(&cq_bits(), &params),
            Err(RttyError::InvalidConfiguration(_))
        ));

        // Still fast, but every unit keeps at least one sample
        let params = ToneParams {
            baud_rate: 40000.0,
            ..ToneParams::default()
        };
        let synth = FskSynthesizer::new().synthesize(&cq_bits(), &params).unwrap();
        assert!(synth.segments[1..synth.segments.len() - 1]
            .iter()
            .all(|segment| !segment.sample_range.is_empty()));
    }

    #[test]
    fn test_rejects_signal_over_duration_limit() {
        for baud_rate in [1e-300, 1e-10, 0.001] {
            let params = ToneParams {
                baud_rate,
                ..ToneParams::default()
            };
            assert!(matches!(
                FskSynthesizer::new().synthesize(&cq_bits(), &params),
                Err(RttyError::InvalidConfiguration(_))
            ));
        }
        assert_eq!(expected_sample_count(&cq_bits(), 1e-300), None);
    }

    #[test]
    fn test_rejects_zero_frequency() {
        let params = ToneParams { space_freq: 0, ..ToneParams::default() };
        assert!(FskSynthesizer::new().synthesize(&cq_bits(), &params).is_err());
    }

    #[test]
    fn test_empty_bits_is_framing_only() {
        let synth = FskSynthesizer::new().synthesize(&[], &ToneParams::default()).unwrap();
        assert_eq!(synth.samples.len(), 2 * 13230);
        assert_eq!(synth.segments.len(), 2);
    }

    #[test]
    fn test_generate_tone_frequency() {
        // 1000 Hz over 0.1 s crosses zero upwards exactly 100 times
        let tone = generate_tone(1000, 4410, 0.0, 1.0);
        let crossings = tone.windows(2).filter(|w| w[0] < 0.0 && w[1] >= 0.0).count();
        assert!((99..=100).contains(&crossings), "{}", crossings);
    }
}

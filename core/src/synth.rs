//! Phase-continuous tone synthesis.
//!
//! SSTV receivers slew between tones; any phase jump at a tone boundary
//! splatters energy across the passband and shows up as vertical streaks in
//! the decoded image. The generator therefore keeps a single running phase
//! across all tones and only ever advances it.

use std::f64::consts::TAU;

pub struct ToneGenerator {
    sample_rate: f64,
    phase: f64,
    samples: Vec<f32>,
}

impl ToneGenerator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            phase: 0.0,
            samples: Vec::new(),
        }
    }

    /// Append `duration` seconds of `freq`, truncated to whole samples.
    pub fn add_tone(&mut self, freq: f32, duration: f32) {
        let count = crate::samples_for(duration, self.sample_rate as u32);
        self.add_tone_samples(freq, count);
    }

    /// Append exactly `count` samples of `freq`.
    ///
    /// Callers that need sample-accurate segment boundaries (pixel scans)
    /// compute the counts themselves and use this directly.
    pub fn add_tone_samples(&mut self, freq: f32, count: usize) {
        let step = TAU * freq as f64 / self.sample_rate;
        self.samples.reserve(count);
        for _ in 0..count {
            self.samples.push(self.phase.sin() as f32);
            self.phase += step;
        }
        self.phase %= TAU;
    }

    /// Append `duration` seconds of silence.
    pub fn add_silence(&mut self, duration: f32) {
        let count = crate::samples_for(duration, self.sample_rate as u32);
        self.samples.resize(self.samples.len() + count, 0.0);
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Clear the buffer and reset the phase accumulator.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_counts_are_floored() {
        let mut gen = ToneGenerator::new(48000);
        gen.add_tone(1900.0, 0.010);
        assert_eq!(gen.len(), 480);
        gen.add_tone(1200.0, 0.0301);
        assert_eq!(gen.len(), 480 + 1444);
    }

    #[test]
    fn output_stays_in_unit_range() {
        let mut gen = ToneGenerator::new(48000);
        gen.add_tone(2300.0, 0.1);
        assert!(gen.samples().iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn phase_is_continuous_across_tone_boundaries() {
        let mut gen = ToneGenerator::new(48000);
        for &(freq, dur) in &[
            (1900.0, 0.300),
            (1200.0, 0.010),
            (1900.0, 0.030),
            (1100.0, 0.030),
            (2300.0, 0.030),
            (1500.0, 0.030),
        ] {
            gen.add_tone(freq, dur);
        }

        // The largest per-sample step any of these tones can produce. A phase
        // jump at a boundary would exceed it.
        let max_step = std::f64::consts::TAU * 2300.0 / 48000.0;
        let bound = (max_step + 1e-4) as f32;
        let samples = gen.samples();
        for pair in samples.windows(2) {
            assert!(
                (pair[1] - pair[0]).abs() <= bound,
                "discontinuity {} exceeds {}",
                (pair[1] - pair[0]).abs(),
                bound
            );
        }
    }

    #[test]
    fn reset_clears_phase_and_buffer() {
        let mut gen = ToneGenerator::new(48000);
        gen.add_tone(1700.0, 0.013);
        gen.reset();
        assert!(gen.is_empty());
        gen.add_tone(1700.0, 0.001);
        // Phase restarts at zero, so the first sample is sin(0).
        assert_eq!(gen.samples()[0], 0.0);
    }
}

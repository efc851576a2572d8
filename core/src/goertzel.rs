//! Single-bin frequency estimation via the Goertzel recurrence.
//!
//! The demodulator never needs a full spectrum, only "which tone is this
//! window closest to", so a swept Goertzel is both cheaper and more accurate
//! than an FFT at the short window lengths a scan line forces on us. The bin
//! index is allowed to be fractional so the sweep can probe arbitrary
//! frequencies without snapping to the FFT grid.

use std::f32::consts::PI;

/// Coarse sweep bounds for pixel-value estimation, Hz.
const SWEEP_LOW: f32 = 1100.0;
const SWEEP_HIGH: f32 = 2500.0;
const SWEEP_STEP: f32 = 25.0;

/// Fixed probe list used for sync and VIS tones, Hz.
const TONE_PROBES: [f32; 13] = [
    1100.0, 1200.0, 1300.0, 1400.0, 1500.0, 1600.0, 1700.0, 1800.0, 1900.0, 2000.0, 2100.0,
    2200.0, 2300.0,
];

/// Minimum magnitude for a fixed-list winner to be worth refining.
const REFINE_THRESHOLD: f32 = 0.05;

pub struct FreqEstimator {
    sample_rate: f32,
}

impl FreqEstimator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
        }
    }

    /// Normalized Goertzel magnitude of `freq` over `samples[start..end)`.
    ///
    /// A full-scale sine exactly on `freq` comes out near 0.5; silence is 0.
    pub fn goertzel(&self, samples: &[f32], start: usize, end: usize, freq: f32) -> f32 {
        let end = end.min(samples.len());
        if start >= end {
            return 0.0;
        }
        let n = end - start;

        let omega = 2.0 * PI * freq / self.sample_rate;
        let coeff = 2.0 * omega.cos();

        let mut q1 = 0.0f32;
        let mut q2 = 0.0f32;
        for &sample in &samples[start..end] {
            let q0 = coeff * q1 - q2 + sample;
            q2 = q1;
            q1 = q0;
        }

        let real = q1 - q2 * omega.cos();
        let imag = q2 * omega.sin();
        (real * real + imag * imag).sqrt() / n as f32
    }

    /// Estimate the dominant pixel-band frequency over `samples[start..start+len)`.
    ///
    /// Coarse sweep in 25 Hz steps over 1100..2500 Hz, then a 1 Hz sweep
    /// within +/-30 Hz of the coarse winner. Undersized windows return the
    /// black level (1500 Hz) rather than failing.
    pub fn detect_frequency_range(&self, samples: &[f32], start: usize, len: usize) -> f32 {
        let end = (start + len).min(samples.len());
        if end.saturating_sub(start) < 10 {
            return 1500.0;
        }

        let mut coarse = SWEEP_LOW;
        let mut best_mag = 0.0f32;
        let mut f = SWEEP_LOW;
        while f <= SWEEP_HIGH {
            let mag = self.goertzel(samples, start, end, f);
            if mag > best_mag {
                best_mag = mag;
                coarse = f;
            }
            f += SWEEP_STEP;
        }

        let mut fine = coarse;
        let mut best_mag = 0.0f32;
        let mut f = coarse - 30.0;
        while f <= coarse + 30.0 {
            let mag = self.goertzel(samples, start, end, f);
            if mag > best_mag {
                best_mag = mag;
                fine = f;
            }
            f += 1.0;
        }

        fine
    }

    /// Estimate a sync/VIS tone over `samples[start..start+len)`.
    ///
    /// Probes the fixed 1100..2300 Hz list; when the winner carries real
    /// energy it is refined within +/-100 Hz in 10 Hz steps so shifted
    /// carriers (off-tune transmitters, Doppler) still read accurately.
    pub fn detect_frequency(&self, samples: &[f32], start: usize, len: usize) -> f32 {
        let end = (start + len).min(samples.len());
        if end.saturating_sub(start) < 10 {
            return 1500.0;
        }

        let mut winner = TONE_PROBES[0];
        let mut best_mag = 0.0f32;
        for &f in &TONE_PROBES {
            let mag = self.goertzel(samples, start, end, f);
            if mag > best_mag {
                best_mag = mag;
                winner = f;
            }
        }

        if best_mag <= REFINE_THRESHOLD {
            return winner;
        }

        let mut refined = winner;
        let mut best_mag = 0.0f32;
        let mut f = winner - 100.0;
        while f <= winner + 100.0 {
            let mag = self.goertzel(samples, start, end, f);
            if mag > best_mag {
                best_mag = mag;
                refined = f;
            }
            f += 10.0;
        }

        refined
    }
}

//! Line-sync pulse acquisition.

use crate::goertzel::FreqEstimator;
use crate::modes::Mode;
use crate::{samples_for, FREQ_SYNC};

/// Scan stride, seconds.
const STEP: f32 = 0.0002;
/// Shortest measurement window, seconds. Modes with very short sync pulses
/// (Martin) still need enough samples for a usable estimate.
const MIN_WINDOW: f32 = 0.004;
/// Acceptance band around the shifted sync frequency, Hz.
const TOLERANCE: f32 = 200.0;
/// Minimum Goertzel magnitude for a window to count as a tone at all;
/// silence and noise floor tie-break to in-band frequencies otherwise.
const MIN_MAGNITUDE: f32 = 0.05;

/// Find the first 1200 Hz pulse of the mode's sync duration within
/// `samples[start..end)`. Returns the pulse's start index.
///
/// The scan only ever runs forward; callers that want slack on both sides
/// widen the range themselves. A hit is confirmed by re-measuring three
/// sub-windows across the pulse so a single lucky window can't match.
pub fn find_sync_pulse(
    samples: &[f32],
    sample_rate: u32,
    mode: &Mode,
    freq_shift: f32,
    start: usize,
    end: usize,
) -> Option<usize> {
    let est = FreqEstimator::new(sample_rate);
    let step = samples_for(STEP, sample_rate).max(1);
    let window = samples_for(mode.sync_pulse.max(MIN_WINDOW), sample_rate);
    let target = FREQ_SYNC + freq_shift;
    let end = end.min(samples.len());

    let mut pos = start;
    while pos + window <= end {
        let freq = est.detect_frequency(samples, pos, window);
        if (freq - target).abs() <= TOLERANCE
            && est.goertzel(samples, pos, pos + window, freq) >= MIN_MAGNITUDE
        {
            let third = window / 3;
            let confirmed = (0..3).all(|i| {
                let sub = est.detect_frequency(samples, pos + i * third, third);
                (sub - target).abs() <= TOLERANCE
            });
            if confirmed {
                return Some(pos);
            }
        }
        pos += step;
    }
    None
}

//! Carrier offset measurement.
//!
//! Off-tune transmitters and Doppler from orbital stations shift every tone
//! by a common offset. The sync pulses are the only fixed reference in the
//! signal, so the offset is read off them: re-find the sync over a run of
//! lines, sweep a narrow band around 1200 Hz at each one, and take the
//! median so the occasional corrupted line cannot skew the result.

use crate::goertzel::FreqEstimator;
use crate::modes::Mode;
use crate::sync::find_sync_pulse;
use crate::{samples_for, FREQ_SYNC};

/// Lines sampled for the estimate.
const MAX_LINES: usize = 20;
/// Offsets below this are treated as in-tune, Hz.
const DEAD_ZONE: f32 = 50.0;

/// Estimate the transmission's carrier offset in Hz from the sync pulses
/// following `first_sync`. Returns 0 when the signal is close enough to
/// nominal tuning.
pub fn estimate_freq_offset(
    samples: &[f32],
    sample_rate: u32,
    mode: &Mode,
    first_sync: usize,
) -> f32 {
    let est = FreqEstimator::new(sample_rate);
    let period = samples_for(mode.line_period(), sample_rate);
    let sync_len = samples_for(mode.sync_pulse, sample_rate);
    let slack = period / 20;

    let mut offsets: Vec<f32> = Vec::with_capacity(MAX_LINES);
    let mut pos = first_sync;
    for _ in 0..MAX_LINES {
        if pos + sync_len > samples.len() {
            break;
        }
        offsets.push(sync_center_frequency(&est, samples, pos, sync_len) - FREQ_SYNC);

        let expected = pos + period;
        let from = expected.saturating_sub(slack);
        pos = find_sync_pulse(samples, sample_rate, mode, 0.0, from, expected + slack)
            .unwrap_or(expected);
    }

    if offsets.is_empty() {
        return 0.0;
    }
    offsets.sort_by(f32::total_cmp);
    let median = offsets[offsets.len() / 2];
    if median.abs() > DEAD_ZONE {
        tracing::debug!(median, "carrier offset detected");
        median
    } else {
        0.0
    }
}

/// Peak of a fine Goertzel sweep around 1200 Hz over one sync pulse.
fn sync_center_frequency(est: &FreqEstimator, samples: &[f32], pos: usize, len: usize) -> f32 {
    let mut best = FREQ_SYNC;
    let mut best_mag = 0.0f32;
    let mut f = FREQ_SYNC - 150.0;
    while f <= FREQ_SYNC + 150.0 {
        let mag = est.goertzel(samples, pos, pos + len, f);
        if mag > best_mag {
            best_mag = mag;
            best = f;
        }
        f += 2.0;
    }
    best
}

//! VIS header detection.
//!
//! The VIS frame is a 300 ms 1900 Hz leader, a 10 ms 1200 Hz break, a 30 ms
//! 1900 Hz start bit, seven 30 ms data bits (LSB first, 1100 Hz = 1, 1300 Hz
//! = 0), an even parity bit and a 30 ms 1200 Hz stop bit. Real recordings
//! add long silent prefixes, off-tune carriers and noise bursts, so a
//! candidate break tone has to survive several independent checks before its
//! bits are trusted: two leader probes behind it, a minimum break extent,
//! and parity over the decoded bits. When no valid VIS exists at all, line
//! timing is measured directly as a fallback.

use crate::goertzel::FreqEstimator;
use crate::modes::{self, Mode};
use crate::{samples_for, FREQ_SYNC, FREQ_VIS_START};

/// How much audio to scan before giving up, seconds. Some off-air captures
/// start many seconds before the broadcast.
const SEARCH_WINDOW: f32 = 60.0;
/// Candidate scan stride, seconds.
const STRIDE: f32 = 0.0005;
/// Break tone acceptance around 1200 Hz, Hz.
const BREAK_TOLERANCE: f32 = 150.0;
/// Leader probe acceptance around the shifted 1900 Hz, Hz.
const LEADER_TOLERANCE: f32 = 200.0;
/// Frequency wander allowed while measuring the break extent, Hz.
const EXTENT_TOLERANCE: f32 = 80.0;

#[derive(Debug, Clone, Copy)]
pub struct VisDetection {
    pub mode: &'static Mode,
    /// Sample index of the end of the VIS frame, i.e. where the first line's
    /// sync pulse begins.
    pub vis_end_pos: usize,
    /// Measured carrier offset of the transmission, Hz.
    pub freq_shift: f32,
    /// Decoded VIS code, or `None` when detection fell back on timing or on
    /// the default mode.
    pub vis_code: Option<u8>,
}

/// Identify the transmission's mode and the end of its VIS frame.
///
/// Never fails: when neither VIS decoding nor timing analysis succeeds the
/// default mode (Robot 36) is returned with `vis_code: None` so the decoder
/// can still attempt sync acquisition from the top of the file.
pub fn detect_mode(samples: &[f32], sample_rate: u32) -> VisDetection {
    let est = FreqEstimator::new(sample_rate);
    let stride = samples_for(STRIDE, sample_rate).max(1);
    let probe30 = samples_for(0.030, sample_rate);
    let search_end = samples.len().min(samples_for(SEARCH_WINDOW, sample_rate));

    let mut pos = 0;
    while pos + probe30 < search_end {
        if let Some(detection) = try_candidate(&est, samples, sample_rate, pos) {
            tracing::debug!(
                mode = detection.mode.name,
                vis_end = detection.vis_end_pos,
                freq_shift = detection.freq_shift,
                "VIS decoded"
            );
            return detection;
        }
        pos += stride;
    }

    if let Some(detection) = detect_by_timing(&est, samples, sample_rate) {
        tracing::debug!(mode = detection.mode.name, "mode matched by line timing");
        return detection;
    }

    tracing::debug!("no VIS found, assuming Robot 36");
    VisDetection {
        mode: &Mode::ROBOT36,
        vis_end_pos: 0,
        freq_shift: 0.0,
        vis_code: None,
    }
}

/// Validate a possible break tone at `pos` and decode the bits behind it.
fn try_candidate(
    est: &FreqEstimator,
    samples: &[f32],
    sample_rate: u32,
    pos: usize,
) -> Option<VisDetection> {
    let probe10 = samples_for(0.010, sample_rate);
    let probe20 = samples_for(0.020, sample_rate);
    let probe30 = samples_for(0.030, sample_rate);

    let break_freq = est.detect_frequency(samples, pos, probe10);
    if (break_freq - FREQ_SYNC).abs() > BREAK_TOLERANCE {
        return None;
    }
    let shift = break_freq - FREQ_SYNC;
    let leader = FREQ_VIS_START + shift;

    // The break must sit at the end of a leader. Two probes into the leader
    // reject nearly every noise-induced candidate.
    let back200 = samples_for(0.200, sample_rate);
    let back100 = samples_for(0.100, sample_rate);
    if pos < back200 {
        return None;
    }
    let probe_a = est.detect_frequency(samples, pos - back200, probe20);
    let probe_b = est.detect_frequency(samples, pos - back100, probe20);
    if (probe_a - leader).abs() > LEADER_TOLERANCE || (probe_b - leader).abs() > LEADER_TOLERANCE {
        return None;
    }

    // Walk the break tone's extent in both directions. The probes are as
    // short as the step so a 10 ms break still reads clean against the
    // leader on one side and the start bit on the other.
    let step5 = samples_for(0.005, sample_rate);
    let max_extent = samples_for(0.300, sample_rate);
    let mut break_start = pos;
    while break_start >= step5 && pos - break_start < max_extent {
        let freq = est.detect_frequency(samples, break_start - step5, step5);
        if (freq - break_freq).abs() > EXTENT_TOLERANCE {
            break;
        }
        break_start -= step5;
    }
    let mut break_end = pos;
    while break_end + step5 <= samples.len() && break_end - pos < max_extent {
        let freq = est.detect_frequency(samples, break_end, step5);
        if (freq - break_freq).abs() > EXTENT_TOLERANCE {
            break;
        }
        break_end += step5;
    }
    if break_end - break_start < step5 {
        return None;
    }

    // A 30 ms leader-frequency tone after the break is the start bit. Some
    // transmitters omit it and go straight into the data bits.
    let mut bit_start = break_end;
    let after = est.detect_frequency(samples, break_end, probe30);
    if (after - leader).abs() <= BREAK_TOLERANCE {
        bit_start = break_end + probe30;
    }

    // The first data bit has to be a bit tone. Seeing leader frequency here
    // means this was a stray break inside a longer leader.
    let first = est.detect_frequency(samples, bit_start, probe30);
    if (first - leader).abs() <= BREAK_TOLERANCE {
        return None;
    }
    if first < 1000.0 + shift || first > 1500.0 + shift {
        return None;
    }

    if bit_start + 8 * probe30 > samples.len() {
        return None;
    }

    let threshold = FREQ_SYNC + shift;
    let mut code = 0u8;
    let mut ones = 0u32;
    for bit in 0..7 {
        let freq = est.detect_frequency(samples, bit_start + bit * probe30, probe30);
        if freq < threshold {
            code |= 1 << bit;
            ones += 1;
        }
    }
    let parity_freq = est.detect_frequency(samples, bit_start + 7 * probe30, probe30);
    let parity = parity_freq < threshold;
    if (ones + parity as u32) % 2 != 0 {
        tracing::trace!(code, "VIS candidate failed parity");
        return None;
    }

    let Some(mode) = modes::from_vis_code(code) else {
        tracing::trace!(code, "VIS parity ok but code unknown");
        return None;
    };

    // Nominal end: data bits, parity, stop. Refine against the first line's
    // porch tone, then back off over the sync pulse that precedes it.
    let nominal_end = bit_start + 9 * probe30;
    let vis_end_pos = refine_vis_end(est, samples, sample_rate, nominal_end, shift);

    Some(VisDetection {
        mode,
        vis_end_pos,
        freq_shift: shift,
        vis_code: Some(code),
    })
}

fn refine_vis_end(
    est: &FreqEstimator,
    samples: &[f32],
    sample_rate: u32,
    nominal_end: usize,
    shift: f32,
) -> usize {
    let probe10 = samples_for(0.010, sample_rate);
    let step2 = samples_for(0.002, sample_rate).max(1);
    let span = samples_for(0.060, sample_rate);
    let porch = 1500.0 + shift;
    let sync_len = samples_for(0.009, sample_rate);

    let mut p = nominal_end.saturating_sub(span);
    while p <= nominal_end + span && p + probe10 <= samples.len() {
        let freq = est.detect_frequency(samples, p, probe10);
        if (freq - porch).abs() <= 100.0 {
            return p.saturating_sub(sync_len);
        }
        p += step2;
    }
    nominal_end
}

/// Fallback when no VIS decodes: find a sustained leader (shifted carriers
/// included), skip the VIS region behind it, measure the spacing of the
/// first few sync pulses and match it against the known line periods.
fn detect_by_timing(
    est: &FreqEstimator,
    samples: &[f32],
    sample_rate: u32,
) -> Option<VisDetection> {
    let probe20 = samples_for(0.020, sample_rate);
    let search_end = samples.len().min(samples_for(SEARCH_WINDOW, sample_rate));
    let min_leader = samples_for(0.200, sample_rate);

    // Walk the leader run to its end; the VIS region is measured from there.
    let mut leader_end = None;
    let mut run_start: Option<usize> = None;
    let mut pos = 0;
    while pos + probe20 < search_end {
        let freq = est.detect_frequency(samples, pos, probe20);
        let in_leader = (freq - FREQ_VIS_START).abs() <= LEADER_TOLERANCE
            && est.goertzel(samples, pos, pos + probe20, freq) >= 0.05;
        if in_leader {
            run_start.get_or_insert(pos);
        } else {
            if let Some(start) = run_start {
                if pos - start >= min_leader {
                    leader_end = Some(pos);
                    break;
                }
            }
            run_start = None;
        }
        pos += probe20;
    }
    let leader_end = leader_end?;

    // Skip past the VIS bits and collect up to three sync pulse onsets.
    let scan_from = leader_end + samples_for(0.500, sample_rate);
    let scan_to = samples
        .len()
        .min(scan_from + samples_for(2.0, sample_rate));
    let win = samples_for(0.005, sample_rate);
    let step = samples_for(0.001, sample_rate).max(1);

    let mut syncs: Vec<usize> = Vec::new();
    let mut in_pulse = false;
    let mut p = scan_from;
    while p + win <= scan_to && syncs.len() < 3 {
        let freq = est.detect_frequency(samples, p, win);
        let is_sync = (freq - FREQ_SYNC).abs() <= BREAK_TOLERANCE
            && est.goertzel(samples, p, p + win, freq) >= 0.05;
        if is_sync && !in_pulse {
            syncs.push(p);
        }
        in_pulse = is_sync;
        p += step;
    }
    if syncs.len() < 2 {
        return None;
    }

    let mut period = (syncs[1] - syncs[0]) as f32 / sample_rate as f32;
    if syncs.len() == 3 {
        period = (syncs[2] - syncs[0]) as f32 / 2.0 / sample_rate as f32;
    }

    for mode in modes::ALL_MODES {
        let expected = mode.line_period();
        if (period - expected).abs() <= 0.1 * expected {
            tracing::trace!(period, mode = mode.name, "line period matched");
            return Some(VisDetection {
                mode,
                vis_end_pos: syncs[0],
                freq_shift: 0.0,
                vis_code: None,
            });
        }
    }
    None
}

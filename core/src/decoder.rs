//! SSTV receive path: orchestration plus the per-mode line decoders.

use std::time::Instant;

use crate::calibrate::estimate_freq_offset;
use crate::color;
use crate::error::{Result, SstvError};
use crate::goertzel::FreqEstimator;
use crate::modes::{
    ColorFormat, Mode, ROBOT36_CHROMA_PORCH, ROBOT36_CHROMA_SCAN, ROBOT36_CHROMA_SEP,
    ROBOT36_Y_SCAN,
};
use crate::quality::{self, QualityReport};
use crate::sync::find_sync_pulse;
use crate::vis;
use crate::{samples_for, FREQ_BLACK, FREQ_WHITE};

/// Map a carrier frequency back to a pixel value, full range.
pub fn freq_to_value(freq: f32, offset: f32) -> u8 {
    let span = FREQ_WHITE - FREQ_BLACK;
    color::clamp_u8((freq - (FREQ_BLACK + offset)) / span * 255.0)
}

#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Re-acquire sync between lines and measure the carrier offset before
    /// decoding. Disable only for known-clean loopback signals.
    pub auto_calibrate: bool,
    /// Force a mode instead of trusting VIS lookup.
    pub mode_hint: Option<&'static Mode>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            auto_calibrate: true,
            mode_hint: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub mode_name: &'static str,
    pub vis_code: Option<u8>,
    pub sample_rate: u32,
    pub duration_secs: f32,
    /// Carrier offset applied during decoding, Hz.
    pub freq_offset: f32,
    pub auto_calibrated: bool,
    /// Sample index of the first line's sync pulse.
    pub first_sync: usize,
    pub decode_ms: u64,
    pub quality: QualityReport,
}

pub struct DecodedImage {
    /// RGBA-8888, row major, alpha always 255.
    pub pixels: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub diagnostics: Diagnostics,
}

pub struct Decoder {
    sample_rate: u32,
    options: DecoderOptions,
}

impl Decoder {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_options(sample_rate, DecoderOptions::default())
    }

    pub fn with_options(sample_rate: u32, options: DecoderOptions) -> Self {
        Self {
            sample_rate,
            options,
        }
    }

    /// Decode a sample buffer into an RGBA frame plus diagnostics.
    ///
    /// Mode detection never fails (it degrades to the Robot 36 default), but
    /// a buffer with no recognizable sync pulse is unrecoverable and returns
    /// [`SstvError::NoSyncFound`]. A transmission that ends mid-frame yields
    /// the partial image with a warning in the quality report.
    pub fn decode(&self, samples: &[f32]) -> Result<DecodedImage> {
        let started = Instant::now();
        let rate = self.sample_rate;

        let detection = vis::detect_mode(samples, rate);
        let mode = self.options.mode_hint.unwrap_or(detection.mode);
        let period = samples_for(mode.line_period(), rate);

        // The VIS data and stop bits sit at 1200 Hz just before vis_end_pos,
        // so the search must only ever run forward from there.
        let vis_end = detection.vis_end_pos;
        let first_sync =
            find_sync_pulse(samples, rate, mode, detection.freq_shift, vis_end, vis_end + period)
                .or_else(|| {
                    find_sync_pulse(
                        samples,
                        rate,
                        mode,
                        detection.freq_shift,
                        vis_end,
                        vis_end + 3 * period,
                    )
                })
                .or_else(|| {
                    find_sync_pulse(samples, rate, mode, detection.freq_shift, 0, samples.len())
                })
                .ok_or(SstvError::NoSyncFound)?;

        let mut freq_offset = detection.freq_shift;
        if self.options.auto_calibrate {
            let refined = estimate_freq_offset(samples, rate, mode, first_sync);
            if refined != 0.0 {
                freq_offset = refined;
            }
        }
        tracing::debug!(
            mode = mode.name,
            first_sync,
            freq_offset,
            "starting line decode"
        );

        let mut pixels = vec![0u8; 4 * mode.width * mode.lines];
        for px in pixels.chunks_exact_mut(4) {
            px[3] = 255;
        }
        let needs_chroma = mode.color_format != ColorFormat::Rgb;
        let plane_len = if needs_chroma {
            mode.width * mode.lines
        } else {
            0
        };

        let mut lines = LineDecoder {
            est: FreqEstimator::new(rate),
            samples,
            sample_rate: rate,
            mode,
            freq_offset,
            auto_calibrate: self.options.auto_calibrate,
            pixels,
            // Neutral chroma so unwritten cells cannot tint the output.
            u_plane: vec![128u8; plane_len],
            v_plane: vec![128u8; plane_len],
            truncated: false,
        };
        match mode.color_format {
            ColorFormat::Rgb => lines.decode_rgb(first_sync),
            ColorFormat::Yuv => lines.decode_yuv(first_sync),
            ColorFormat::Pd => lines.decode_pd(first_sync),
        }

        let LineDecoder {
            mut pixels,
            u_plane,
            v_plane,
            truncated,
            ..
        } = lines;
        match mode.color_format {
            ColorFormat::Yuv => {
                color::reconstruct_yuv(&mut pixels, &u_plane, &v_plane, mode.width, mode.lines)
            }
            ColorFormat::Pd => {
                color::reconstruct_pd(&mut pixels, &u_plane, &v_plane, mode.width, mode.lines)
            }
            ColorFormat::Rgb => {}
        }

        let mut quality = quality::analyze(&pixels);
        if truncated {
            quality
                .warnings
                .push("Audio ended before the full frame was decoded".to_string());
        }

        Ok(DecodedImage {
            pixels,
            width: mode.width,
            height: mode.lines,
            diagnostics: Diagnostics {
                mode_name: mode.name,
                vis_code: detection.vis_code,
                sample_rate: rate,
                duration_secs: samples.len() as f32 / rate as f32,
                freq_offset,
                auto_calibrated: self.options.auto_calibrate,
                first_sync,
                decode_ms: started.elapsed().as_millis() as u64,
                quality,
            },
        })
    }
}

struct LineDecoder<'a> {
    est: FreqEstimator,
    samples: &'a [f32],
    sample_rate: u32,
    mode: &'a Mode,
    freq_offset: f32,
    auto_calibrate: bool,
    pixels: Vec<u8>,
    u_plane: Vec<u8>,
    v_plane: Vec<u8>,
    truncated: bool,
}

impl LineDecoder<'_> {
    /// Raw frequency estimates for `count` segments of a scan spanning
    /// `total` samples at `pos`. Boundaries are the absolute fractions
    /// `k/count * total`; each measurement window stretches past its segment
    /// for frequency resolution but never past the scan. Returns false when
    /// the scan would run off the buffer.
    fn scan_freqs(&self, pos: usize, total: usize, count: usize, out: &mut Vec<f32>) -> bool {
        if pos + total > self.samples.len() {
            return false;
        }
        out.clear();
        for k in 0..count {
            let start = k * total / count;
            let end = (k + 1) * total / count;
            let window = (4 * (end - start)).max(96).min(total - start);
            out.push(
                self.est
                    .detect_frequency_range(self.samples, pos + start, window),
            );
        }
        true
    }

    /// Expected start of the next line, snapped to a re-acquired sync pulse
    /// when calibration is on and one is found nearby. Snapping corrects
    /// slow clock drift without letting a missed sync derail the cursor.
    fn next_line_start(&self, line_start: usize, period: usize) -> usize {
        let expected = line_start + period;
        if self.auto_calibrate {
            let slack = period / 10;
            if let Some(found) = find_sync_pulse(
                self.samples,
                self.sample_rate,
                self.mode,
                self.freq_offset,
                expected.saturating_sub(slack),
                expected + slack,
            ) {
                return found;
            }
        }
        expected
    }

    fn decode_rgb(&mut self, first_sync: usize) {
        let rate = self.sample_rate;
        let mode = self.mode;
        let sync = samples_for(mode.sync_pulse, rate);
        let porch = samples_for(mode.sync_porch, rate);
        let sep = samples_for(mode.separator_pulse, rate);
        let total = samples_for(mode.scan_time, rate);
        let period = samples_for(mode.line_period(), rate);

        let mut freqs = Vec::with_capacity(mode.width);
        let mut line_start = first_sync;
        for y in 0..mode.lines {
            let mut cur = line_start + sync + porch;
            for (i, &ch) in [1usize, 2, 0].iter().enumerate() {
                if !self.scan_freqs(cur, total, mode.width, &mut freqs) {
                    self.truncated = true;
                    return;
                }
                for (x, &freq) in freqs.iter().enumerate() {
                    self.pixels[4 * (y * mode.width + x) + ch] =
                        freq_to_value(freq, self.freq_offset);
                }
                cur += total;
                if i < 2 {
                    cur += sep;
                }
            }
            line_start = self.next_line_start(line_start, period);
        }
    }

    fn decode_yuv(&mut self, first_sync: usize) {
        let rate = self.sample_rate;
        let mode = self.mode;
        let width = mode.width;
        let half = width / 2;
        let sync = samples_for(mode.sync_pulse, rate);
        let porch = samples_for(mode.sync_porch, rate);
        let y_total = samples_for(ROBOT36_Y_SCAN, rate);
        let sep = samples_for(ROBOT36_CHROMA_SEP, rate);
        let chroma_porch = samples_for(ROBOT36_CHROMA_PORCH, rate);
        let chroma_total = samples_for(ROBOT36_CHROMA_SCAN, rate);
        let period = samples_for(mode.line_period(), rate);

        let mut freqs = Vec::with_capacity(width);
        let mut line_start = first_sync;
        for y in 0..mode.lines {
            let mut cur = line_start + sync + porch;
            if !self.scan_freqs(cur, y_total, width, &mut freqs) {
                self.truncated = true;
                return;
            }
            for (x, &freq) in freqs.iter().enumerate() {
                let value = freq_to_value(freq, self.freq_offset);
                let idx = 4 * (y * width + x);
                self.pixels[idx] = value;
                self.pixels[idx + 1] = value;
                self.pixels[idx + 2] = value;
            }
            cur += y_total;

            // The separator frequency nominally announces which chroma plane
            // follows, but line parity is the reliable selector on real
            // signals; a disagreeing separator is only worth a log line.
            let even = y % 2 == 0;
            let sep_freq = self.est.detect_frequency(self.samples, cur, sep);
            let expected_sep = (if even { FREQ_BLACK } else { FREQ_WHITE }) + self.freq_offset;
            if (sep_freq - expected_sep).abs() > 200.0 {
                tracing::debug!(line = y, sep_freq, "chroma separator disagrees with line parity");
            }
            cur += sep + chroma_porch;

            if !self.scan_freqs(cur, chroma_total, half, &mut freqs) {
                self.truncated = true;
                return;
            }
            let plane = if even {
                &mut self.v_plane
            } else {
                &mut self.u_plane
            };
            for cx in 0..half {
                let value = freq_to_value(median5(&freqs, cx), self.freq_offset);
                plane[y * width + 2 * cx] = value;
                plane[y * width + 2 * cx + 1] = value;
            }

            line_start = self.next_line_start(line_start, period);
        }
    }

    fn decode_pd(&mut self, first_sync: usize) {
        let rate = self.sample_rate;
        let mode = self.mode;
        let width = mode.width;
        let sync = samples_for(mode.sync_pulse, rate);
        let porch = samples_for(mode.sync_porch, rate);
        let total = samples_for(mode.component_time, rate);
        let period = samples_for(mode.line_period(), rate);

        let mut freqs = Vec::with_capacity(width);
        let mut line_start = first_sync;
        let mut y = 0;
        while y < mode.lines {
            let y1 = (y + 1).min(mode.lines - 1);
            let mut cur = line_start + sync + porch;

            for component in 0..4 {
                if !self.scan_freqs(cur, total, width, &mut freqs) {
                    self.truncated = true;
                    return;
                }
                match component {
                    0 => self.write_luma_row(y, &freqs),
                    3 => self.write_luma_row(y1, &freqs),
                    chroma => {
                        let plane = if chroma == 1 {
                            &mut self.v_plane
                        } else {
                            &mut self.u_plane
                        };
                        for x in 0..width {
                            let value = freq_to_value(median5(&freqs, x), self.freq_offset);
                            plane[y * width + x] = value;
                            plane[y1 * width + x] = value;
                        }
                    }
                }
                cur += total;
            }

            line_start = self.next_line_start(line_start, period);
            y += 2;
        }
    }

    fn write_luma_row(&mut self, y: usize, freqs: &[f32]) {
        let width = self.mode.width;
        for (x, &freq) in freqs.iter().enumerate() {
            let value = freq_to_value(freq, self.freq_offset);
            let idx = 4 * (y * width + x);
            self.pixels[idx] = value;
            self.pixels[idx + 1] = value;
            self.pixels[idx + 2] = value;
        }
    }
}

/// 5-tap median over neighboring raw frequencies; the two samples at each
/// edge pass through unfiltered.
fn median5(freqs: &[f32], i: usize) -> f32 {
    if i < 2 || i + 2 >= freqs.len() {
        return freqs[i];
    }
    let mut window = [
        freqs[i - 2],
        freqs[i - 1],
        freqs[i],
        freqs[i + 1],
        freqs[i + 2],
    ];
    window.sort_by(f32::total_cmp);
    window[2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::value_to_freq;
    use crate::synth::ToneGenerator;

    #[test]
    fn boundaries_partition_the_scan_exactly() {
        for &(count, total) in &[
            (320usize, 4224usize),
            (640, 5836),
            (160, 2112),
            (320, 7008),
            (7, 100),
            (1, 1),
        ] {
            let sum: usize = (0..count)
                .map(|k| (k + 1) * total / count - k * total / count)
                .sum();
            assert_eq!(sum, total, "count={count} total={total}");
        }
    }

    #[test]
    fn summed_floor_durations_would_drift() {
        // The broken alternative: flooring one segment duration and summing
        // it leaves 64 samples unaccounted per Robot 36 luma scan.
        let per_pixel = 4224usize / 320;
        assert_ne!(per_pixel * 320, 4224);
    }

    #[test]
    fn full_range_mapping_round_trips_within_one() {
        let est = FreqEstimator::new(48000);
        for value in [0u8, 1, 37, 127, 128, 200, 254, 255] {
            let mut gen = ToneGenerator::new(48000);
            gen.add_tone(value_to_freq(value), 0.010);
            let freq = est.detect_frequency_range(gen.samples(), 0, gen.len());
            let decoded = freq_to_value(freq, 0.0);
            assert!(
                (decoded as i32 - value as i32).abs() <= 1,
                "value {value} decoded as {decoded} via {freq} Hz"
            );
        }
    }

    #[test]
    fn freq_to_value_applies_the_offset() {
        assert_eq!(freq_to_value(1500.0, 0.0), 0);
        assert_eq!(freq_to_value(2300.0, 0.0), 255);
        assert_eq!(freq_to_value(1371.0, -129.0), 0);
        assert_eq!(freq_to_value(2171.0, -129.0), 255);
    }

    #[test]
    fn median_filter_suppresses_single_outliers() {
        let freqs = [1700.0, 1700.0, 2300.0, 1700.0, 1700.0, 1700.0, 1700.0];
        assert_eq!(median5(&freqs, 2), 1700.0);
        // Edges pass through untouched.
        assert_eq!(median5(&freqs, 0), 1700.0);
        let edge = [2300.0, 1700.0, 1700.0, 1700.0, 1700.0];
        assert_eq!(median5(&edge, 0), 2300.0);
    }

    #[test]
    fn no_sync_in_silence() {
        let decoder = Decoder::new(48000);
        let silence = vec![0.0f32; 48000];
        assert!(matches!(
            decoder.decode(&silence),
            Err(SstvError::NoSyncFound)
        ));
    }
}

//! SSTV transmit path: VIS framing plus per-mode line synthesis.

use crate::color;
use crate::error::{Result, SstvError};
use crate::modes::{
    ColorFormat, Mode, ROBOT36_CHROMA_PORCH, ROBOT36_CHROMA_SCAN, ROBOT36_CHROMA_SEP,
    ROBOT36_Y_SCAN,
};
use crate::synth::ToneGenerator;
use crate::wav;
use crate::{
    FREQ_BLACK, FREQ_SYNC, FREQ_VIS_BIT0, FREQ_VIS_BIT1, FREQ_VIS_START, FREQ_WHITE,
    VIS_BIT_TIME, VIS_BREAK_TIME, VIS_LEADER_TIME,
};

/// Map a pixel value to its carrier frequency, full range.
pub fn value_to_freq(value: u8) -> f32 {
    FREQ_BLACK + value as f32 / 255.0 * (FREQ_WHITE - FREQ_BLACK)
}

pub struct Encoder {
    sample_rate: u32,
    tone: ToneGenerator,
}

impl Encoder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            tone: ToneGenerator::new(sample_rate),
        }
    }

    /// Encode an RGBA raster into float samples.
    ///
    /// The raster must be at the mode's native width and carry at least
    /// `mode.lines` rows; scaling is the caller's job. Alpha is ignored.
    pub fn encode(
        &mut self,
        pixels: &[u8],
        width: usize,
        height: usize,
        mode: &Mode,
    ) -> Result<Vec<f32>> {
        if width != mode.width {
            return Err(SstvError::InvalidInput(format!(
                "{} expects width {}, got {}",
                mode.name, mode.width, width
            )));
        }
        if height < mode.lines {
            return Err(SstvError::InvalidInput(format!(
                "{} expects at least {} rows, got {}",
                mode.name, mode.lines, height
            )));
        }
        if pixels.len() < 4 * width * height {
            return Err(SstvError::InvalidInput(format!(
                "RGBA buffer too short: {} bytes for {}x{}",
                pixels.len(),
                width,
                height
            )));
        }

        self.tone.reset();
        self.vis_header(mode.vis_code);

        let raster = Raster { pixels, width };
        match mode.color_format {
            ColorFormat::Rgb => self.encode_rgb(&raster, mode),
            ColorFormat::Yuv => self.encode_yuv(&raster, mode),
            ColorFormat::Pd => self.encode_pd(&raster, mode),
        }

        let tone = std::mem::replace(&mut self.tone, ToneGenerator::new(self.sample_rate));
        Ok(tone.into_samples())
    }

    /// Encode straight to finished WAV bytes.
    pub fn encode_to_wav(
        &mut self,
        pixels: &[u8],
        width: usize,
        height: usize,
        mode: &Mode,
    ) -> Result<Vec<u8>> {
        let samples = self.encode(pixels, width, height, mode)?;
        wav::write_wav(&samples, self.sample_rate)
    }

    /// Leader, break, start bit, 7 data bits LSB first, even parity, stop.
    fn vis_header(&mut self, vis_code: u8) {
        self.tone.add_tone(FREQ_VIS_START, VIS_LEADER_TIME);
        self.tone.add_tone(FREQ_SYNC, VIS_BREAK_TIME);
        self.tone.add_tone(FREQ_VIS_START, VIS_BIT_TIME);

        let mut ones = 0u32;
        for bit in 0..7 {
            let set = (vis_code >> bit) & 1 != 0;
            if set {
                ones += 1;
            }
            self.vis_bit(set);
        }
        self.vis_bit(ones % 2 != 0);
        self.tone.add_tone(FREQ_SYNC, VIS_BIT_TIME);
    }

    fn vis_bit(&mut self, set: bool) {
        let freq = if set { FREQ_VIS_BIT1 } else { FREQ_VIS_BIT0 };
        self.tone.add_tone(freq, VIS_BIT_TIME);
    }

    /// Emit one scan of `values` over `scan_time` seconds with boundaries at
    /// `floor(k/N * total)`. Summing per-pixel floor durations instead would
    /// drift by up to a dozen samples per line and shear the image.
    fn scan(&mut self, values: &[f32], scan_time: f32) {
        let total = crate::samples_for(scan_time, self.sample_rate);
        let n = values.len();
        for (k, &value) in values.iter().enumerate() {
            let start = k * total / n;
            let end = (k + 1) * total / n;
            let freq = value_to_freq(color::clamp_u8(value));
            self.tone.add_tone_samples(freq, end - start);
        }
    }

    fn encode_rgb(&mut self, raster: &Raster, mode: &Mode) {
        let mut channel = vec![0.0f32; mode.width];
        for y in 0..mode.lines {
            self.tone.add_tone(FREQ_SYNC, mode.sync_pulse);
            self.tone.add_tone(FREQ_BLACK, mode.sync_porch);

            for (i, ch) in [1usize, 2, 0].iter().enumerate() {
                for x in 0..mode.width {
                    channel[x] = raster.channel(x, y, *ch) as f32;
                }
                self.scan(&channel, mode.scan_time);
                if i < 2 {
                    self.tone.add_tone(FREQ_SYNC, mode.separator_pulse);
                }
            }
        }
    }

    fn encode_yuv(&mut self, raster: &Raster, mode: &Mode) {
        let width = mode.width;
        let mut luma_row = vec![0.0f32; width];
        let mut chroma_row = vec![0.0f32; width / 2];

        for y in 0..mode.lines {
            self.tone.add_tone(FREQ_SYNC, mode.sync_pulse);
            self.tone.add_tone(FREQ_BLACK, mode.sync_porch);

            for x in 0..width {
                let (r, g, b) = raster.rgb(x, y);
                luma_row[x] = color::luma(r, g, b);
            }
            self.scan(&luma_row, ROBOT36_Y_SCAN);

            // Chroma alternates per line: even lines carry V (R-Y) behind a
            // 1500 Hz separator, odd lines carry U (B-Y) behind 2300 Hz.
            let even = y % 2 == 0;
            let sep_freq = if even { FREQ_BLACK } else { FREQ_WHITE };
            self.tone.add_tone(sep_freq, ROBOT36_CHROMA_SEP);
            self.tone.add_tone(FREQ_BLACK, ROBOT36_CHROMA_PORCH);

            for cx in 0..width / 2 {
                let (r0, g0, b0) = raster.rgb(2 * cx, y);
                let (r1, g1, b1) = raster.rgb(2 * cx + 1, y);
                let (c0, c1) = if even {
                    (color::chroma_v(r0, g0, b0), color::chroma_v(r1, g1, b1))
                } else {
                    (color::chroma_u(r0, g0, b0), color::chroma_u(r1, g1, b1))
                };
                chroma_row[cx] = (c0 + c1) / 2.0;
            }
            self.scan(&chroma_row, ROBOT36_CHROMA_SCAN);
        }
    }

    fn encode_pd(&mut self, raster: &Raster, mode: &Mode) {
        let width = mode.width;
        let mut component = vec![0.0f32; width];

        for y in (0..mode.lines).step_by(2) {
            let y1 = (y + 1).min(mode.lines - 1);
            self.tone.add_tone(FREQ_SYNC, mode.sync_pulse);
            self.tone.add_tone(FREQ_BLACK, mode.sync_porch);

            for x in 0..width {
                let (r, g, b) = raster.rgb(x, y);
                component[x] = color::luma(r, g, b);
            }
            self.scan(&component, mode.component_time);

            for x in 0..width {
                let (r0, g0, b0) = raster.rgb(x, y);
                let (r1, g1, b1) = raster.rgb(x, y1);
                component[x] = (color::pd_ry(r0, g0, b0) + color::pd_ry(r1, g1, b1)) / 2.0;
            }
            self.scan(&component, mode.component_time);

            for x in 0..width {
                let (r0, g0, b0) = raster.rgb(x, y);
                let (r1, g1, b1) = raster.rgb(x, y1);
                component[x] = (color::pd_by(r0, g0, b0) + color::pd_by(r1, g1, b1)) / 2.0;
            }
            self.scan(&component, mode.component_time);

            for x in 0..width {
                let (r, g, b) = raster.rgb(x, y1);
                component[x] = color::luma(r, g, b);
            }
            self.scan(&component, mode.component_time);
        }
    }
}

struct Raster<'a> {
    pixels: &'a [u8],
    width: usize,
}

impl Raster<'_> {
    fn rgb(&self, x: usize, y: usize) -> (u8, u8, u8) {
        let idx = 4 * (y * self.width + x);
        (self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2])
    }

    fn channel(&self, x: usize, y: usize, ch: usize) -> u8 {
        self.pixels[4 * (y * self.width + x) + ch]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_raster(width: usize, height: usize, rgba: [u8; 4]) -> Vec<u8> {
        rgba.iter()
            .copied()
            .cycle()
            .take(4 * width * height)
            .collect()
    }

    #[test]
    fn full_range_frequency_mapping() {
        assert_eq!(value_to_freq(0), 1500.0);
        assert_eq!(value_to_freq(255), 2300.0);
        assert!((value_to_freq(128) - 1901.57).abs() < 0.01);
    }

    #[test]
    fn unknown_geometry_is_rejected() {
        let mut enc = Encoder::new(48000);
        let pixels = solid_raster(100, 100, [0, 0, 0, 255]);
        assert!(enc.encode(&pixels, 100, 100, &Mode::ROBOT36).is_err());

        let short = solid_raster(320, 100, [0, 0, 0, 255]);
        assert!(enc.encode(&short, 320, 100, &Mode::ROBOT36).is_err());
    }

    #[test]
    fn robot36_transmission_has_expected_length() {
        let mut enc = Encoder::new(48000);
        let pixels = solid_raster(320, 240, [128, 128, 128, 255]);
        let samples = enc.encode(&pixels, 320, 240, &Mode::ROBOT36).unwrap();

        // VIS header: 300 + 10 + 30 + 7*30 + 30 + 30 ms = 610 ms.
        // Body: 240 lines at 150 ms.
        let expected = 0.610 + 240.0 * 0.150;
        let got = samples.len() as f32 / 48000.0;
        assert!(
            (got - expected).abs() < 0.01,
            "expected ~{expected}s, got {got}s"
        );
    }

    #[test]
    fn scan_boundaries_cover_the_scan_exactly() {
        let mut enc = Encoder::new(48000);
        let before = enc.tone.len();
        let values = vec![100.0f32; 320];
        enc.scan(&values, 0.088);
        let total = (0.088f32 * 48000.0) as usize;
        assert_eq!(enc.tone.len() - before, total);
    }

    #[test]
    fn encode_resets_between_calls() {
        let mut enc = Encoder::new(48000);
        let pixels = solid_raster(320, 240, [10, 20, 30, 255]);
        let first = enc.encode(&pixels, 320, 240, &Mode::ROBOT36).unwrap();
        let second = enc.encode(&pixels, 320, 240, &Mode::ROBOT36).unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[..1000], second[..1000]);
    }
}

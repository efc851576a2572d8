//! Static registry of the supported SSTV modes and their timings.
//!
//! Timing values follow the N7CXI "Proposal for SSTV Mode Specifications"
//! tables; only the four modes commonly heard on HF and from the ISS are
//! carried here.

/// Color layout of a mode's scan lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    /// Three sequential full-width channel scans per line (G, B, R order).
    Rgb,
    /// Luma scan plus alternating half-width chroma scan (Robot 36).
    Yuv,
    /// Line-paired luma with shared R-Y / B-Y components (PD family).
    Pd,
}

/// Immutable descriptor for one SSTV mode.
///
/// RGB modes use `scan_time`/`separator_pulse`; PD modes use
/// `component_time`; Robot 36 uses the `ROBOT36_*` constants below for its
/// fixed luma/chroma segment layout.
#[derive(Debug, Clone, Copy)]
pub struct Mode {
    pub name: &'static str,
    pub key: &'static str,
    pub vis_code: u8,
    pub width: usize,
    pub lines: usize,
    pub color_format: ColorFormat,
    /// 1200 Hz sync pulse duration, seconds.
    pub sync_pulse: f32,
    /// 1500 Hz porch following the sync pulse, seconds.
    pub sync_porch: f32,
    /// Per-channel scan duration for RGB modes, seconds.
    pub scan_time: f32,
    /// Channel separator duration for RGB modes, seconds.
    pub separator_pulse: f32,
    /// Per-component scan duration for PD modes, seconds.
    pub component_time: f32,
}

/// Robot 36 luma scan duration, seconds.
pub const ROBOT36_Y_SCAN: f32 = 0.088;
/// Robot 36 chroma separator duration, seconds. The separator frequency
/// signals which chroma plane follows (1500 Hz for R-Y, 2300 Hz for B-Y).
pub const ROBOT36_CHROMA_SEP: f32 = 0.0045;
/// Robot 36 porch between separator and chroma scan, seconds.
pub const ROBOT36_CHROMA_PORCH: f32 = 0.0015;
/// Robot 36 half-resolution chroma scan duration, seconds.
pub const ROBOT36_CHROMA_SCAN: f32 = 0.044;

impl Mode {
    pub const ROBOT36: Self = Self {
        name: "Robot 36",
        key: "ROBOT36",
        vis_code: 0x08,
        width: 320,
        lines: 240,
        color_format: ColorFormat::Yuv,
        sync_pulse: 9.0e-3,
        sync_porch: 3.0e-3,
        scan_time: 0.0,
        separator_pulse: 0.0,
        component_time: 0.0,
    };

    pub const MARTIN1: Self = Self {
        name: "Martin M1",
        key: "MARTIN1",
        vis_code: 0x2c,
        width: 320,
        lines: 256,
        color_format: ColorFormat::Rgb,
        sync_pulse: 4.862e-3,
        sync_porch: 0.572e-3,
        scan_time: 146.0e-3,
        separator_pulse: 0.572e-3,
        component_time: 0.0,
    };

    pub const SCOTTIE1: Self = Self {
        name: "Scottie S1",
        key: "SCOTTIE1",
        vis_code: 0x3c,
        width: 320,
        lines: 256,
        color_format: ColorFormat::Rgb,
        sync_pulse: 9.0e-3,
        sync_porch: 1.5e-3,
        scan_time: 138.0e-3,
        separator_pulse: 1.5e-3,
        component_time: 0.0,
    };

    pub const PD120: Self = Self {
        name: "PD 120",
        key: "PD120",
        vis_code: 0x5d,
        width: 640,
        lines: 496,
        color_format: ColorFormat::Pd,
        sync_pulse: 20.0e-3,
        sync_porch: 2.08e-3,
        scan_time: 0.0,
        separator_pulse: 0.0,
        component_time: 121.6e-3,
    };

    /// Seconds from one sync pulse to the next. For PD modes this is the
    /// period of a line *pair*, since one sync covers two image rows.
    pub fn line_period(&self) -> f32 {
        match self.color_format {
            ColorFormat::Rgb => {
                self.sync_pulse
                    + self.sync_porch
                    + 3.0 * self.scan_time
                    + 2.0 * self.separator_pulse
            }
            ColorFormat::Yuv => {
                self.sync_pulse
                    + self.sync_porch
                    + ROBOT36_Y_SCAN
                    + ROBOT36_CHROMA_SEP
                    + ROBOT36_CHROMA_PORCH
                    + ROBOT36_CHROMA_SCAN
            }
            ColorFormat::Pd => self.sync_pulse + self.sync_porch + 4.0 * self.component_time,
        }
    }

    /// Image rows advanced per line period (2 for PD modes).
    pub fn rows_per_period(&self) -> usize {
        match self.color_format {
            ColorFormat::Pd => 2,
            _ => 1,
        }
    }
}

pub static ALL_MODES: [&Mode; 4] = [
    &Mode::ROBOT36,
    &Mode::MARTIN1,
    &Mode::SCOTTIE1,
    &Mode::PD120,
];

/// Look up a mode by its 7-bit VIS code.
pub fn from_vis_code(code: u8) -> Option<&'static Mode> {
    ALL_MODES.iter().copied().find(|m| m.vis_code == code)
}

/// Look up a mode by its registry key (`ROBOT36`, `MARTIN1`, `SCOTTIE1`,
/// `PD120`). Matching is case-insensitive.
pub fn from_key(key: &str) -> Option<&'static Mode> {
    ALL_MODES
        .iter()
        .copied()
        .find(|m| m.key.eq_ignore_ascii_case(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_vis_codes() {
        assert_eq!(Mode::ROBOT36.vis_code, 0x08);
        assert_eq!(Mode::MARTIN1.vis_code, 0x2c);
        assert_eq!(Mode::SCOTTIE1.vis_code, 0x3c);
        assert_eq!(Mode::PD120.vis_code, 0x5d);
    }

    #[test]
    fn vis_code_lookup() {
        assert_eq!(from_vis_code(0x08).unwrap().name, "Robot 36");
        assert_eq!(from_vis_code(0x2c).unwrap().name, "Martin M1");
        assert!(from_vis_code(0x7f).is_none());
    }

    #[test]
    fn key_lookup_is_case_insensitive() {
        assert_eq!(from_key("pd120").unwrap().vis_code, 0x5d);
        assert_eq!(from_key("Robot36").unwrap().vis_code, 0x08);
        assert!(from_key("MARTIN2").is_none());
    }

    #[test]
    fn line_periods() {
        // Robot 36 lines are exactly 150 ms.
        assert!((Mode::ROBOT36.line_period() - 0.150).abs() < 1e-6);
        // PD 120 pairs: 20 + 2.08 + 4 * 121.6 = 508.48 ms.
        assert!((Mode::PD120.line_period() - 0.50848).abs() < 1e-5);
        assert_eq!(Mode::PD120.rows_per_period(), 2);
        assert_eq!(Mode::MARTIN1.rows_per_period(), 1);
    }
}

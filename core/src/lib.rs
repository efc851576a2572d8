//! SSTV codec library
//!
//! Encodes still images as slow-scan television audio and decodes such audio
//! back into images. Four modes are supported (Robot 36, Martin M1,
//! Scottie S1, PD 120) across the YUV, RGB and PD color layouts. The
//! transmit path is deterministic phase-continuous tone synthesis; the
//! receive path is VIS detection with a timing-based fallback, sync
//! acquisition, and per-line Goertzel demodulation.

pub mod calibrate;
pub mod color;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod goertzel;
pub mod modes;
pub mod quality;
pub mod sync;
pub mod synth;
pub mod vis;
pub mod wav;

pub use decoder::{DecodedImage, Decoder, DecoderOptions, Diagnostics};
pub use encoder::Encoder;
pub use error::{Result, SstvError};
pub use modes::{ColorFormat, Mode};
pub use quality::{QualityReport, Verdict};
pub use vis::VisDetection;
pub use wav::{read_wav, write_wav};

/// Canonical sample rate; other rates are accepted and threaded through.
pub const SAMPLE_RATE: u32 = 48000;

// Wire-level tone frequencies. These are the interop contract; every
// conforming SSTV station uses the same values.
pub const FREQ_SYNC: f32 = 1200.0;
pub const FREQ_BLACK: f32 = 1500.0;
pub const FREQ_WHITE: f32 = 2300.0;
pub const FREQ_VIS_BIT1: f32 = 1100.0;
pub const FREQ_VIS_BIT0: f32 = 1300.0;
pub const FREQ_VIS_START: f32 = 1900.0;

// VIS framing timings, seconds.
pub const VIS_LEADER_TIME: f32 = 0.300;
pub const VIS_BREAK_TIME: f32 = 0.010;
pub const VIS_BIT_TIME: f32 = 0.030;

/// Whole samples in `seconds` of audio. The epsilon absorbs f32
/// representation error so nominal durations like 9 ms at 48 kHz land on
/// their exact sample count instead of flooring one short.
pub(crate) fn samples_for(seconds: f32, sample_rate: u32) -> usize {
    (seconds as f64 * sample_rate as f64 + 1e-3) as usize
}

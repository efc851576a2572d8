//! In-memory WAV emission and parsing.
//!
//! Built on `hound`, which writes the canonical 44-byte mono PCM header and
//! walks chunks in arbitrary order on read, so files with LIST/INFO or fact
//! chunks before `data` parse correctly.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{Result, SstvError};

/// Serialize float samples as 16-bit little-endian mono PCM WAV bytes.
///
/// Samples are clamped to [-1, 1] before quantization.
pub fn write_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut bytes = Vec::with_capacity(44 + samples.len() * 2);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec)?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * 32767.0) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(bytes)
}

/// Parse WAV bytes into float samples plus the container's sample rate.
///
/// Accepts 16-bit integer and 32-bit float PCM; stereo is averaged down to
/// mono. Anything else is rejected as invalid input.
pub fn read_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / 32768.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        (_, bits) => {
            return Err(SstvError::InvalidInput(format!(
                "unsupported PCM format: {} bit {:?}",
                bits, spec.sample_format
            )));
        }
    };

    let samples = match spec.channels {
        1 => samples,
        2 => stereo_to_mono(&samples),
        n => {
            return Err(SstvError::InvalidInput(format!(
                "unsupported channel count: {n}"
            )));
        }
    };

    Ok((samples, spec.sample_rate))
}

/// Mix interleaved stereo down to mono by averaging both channels.
pub fn stereo_to_mono(samples: &[f32]) -> Vec<f32> {
    samples
        .chunks_exact(2)
        .map(|pair| (pair[0] + pair[1]) / 2.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_within_quantization_error() {
        let samples: Vec<f32> = (0..4800)
            .map(|i| (i as f32 * 0.013).sin() * 0.9)
            .collect();
        let bytes = write_wav(&samples, 48000).unwrap();
        let (decoded, rate) = read_wav(&bytes).unwrap();

        assert_eq!(rate, 48000);
        assert_eq!(decoded.len(), samples.len());
        for (a, b) in samples.iter().zip(decoded.iter()) {
            assert!((a - b).abs() <= 1.0 / 32768.0, "{a} vs {b}");
        }
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let bytes = write_wav(&[2.0, -2.0], 48000).unwrap();
        let (decoded, _) = read_wav(&bytes).unwrap();
        assert!((decoded[0] - 32767.0 / 32768.0).abs() < 1e-6);
        assert!((decoded[1] + 32767.0 / 32768.0).abs() < 1e-6);
    }

    #[test]
    fn header_is_canonical_44_bytes() {
        let bytes = write_wav(&[0.0; 10], 48000).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(bytes.len(), 44 + 20);
    }

    #[test]
    fn reader_skips_chunks_before_data() {
        // Hand-build a WAV with a LIST chunk between fmt and data, the way
        // some recorders tag their files.
        let payload: Vec<i16> = vec![0, 16384, -16384, 0];
        let mut wav: Vec<u8> = Vec::new();
        let data_len = payload.len() * 2;
        let list_body = b"INFOISFT\x04\x00\x00\x00test";
        let riff_len = 4 + 24 + (8 + list_body.len()) + 8 + data_len;
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(riff_len as u32).to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&1u16.to_le_bytes()); // mono
        wav.extend_from_slice(&48000u32.to_le_bytes());
        wav.extend_from_slice(&96000u32.to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"LIST");
        wav.extend_from_slice(&(list_body.len() as u32).to_le_bytes());
        wav.extend_from_slice(list_body);
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&(data_len as u32).to_le_bytes());
        for s in &payload {
            wav.extend_from_slice(&s.to_le_bytes());
        }

        let (decoded, rate) = read_wav(&wav).unwrap();
        assert_eq!(rate, 48000);
        assert_eq!(decoded.len(), 4);
        assert!((decoded[1] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn stereo_input_is_averaged() {
        let mono = stereo_to_mono(&[0.2, 0.8, -0.4, -0.6]);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.5).abs() < 1e-6);
        assert!((mono[1] + 0.5).abs() < 1e-6);
    }
}

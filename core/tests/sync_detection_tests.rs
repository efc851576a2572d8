//! VIS and sync acquisition tests against encoder-generated signals.

use slowscan_core::modes::{self, Mode};
use slowscan_core::sync::find_sync_pulse;
use slowscan_core::synth::ToneGenerator;
use slowscan_core::vis::detect_mode;
use slowscan_core::{Encoder, SAMPLE_RATE};

fn solid_raster(width: usize, height: usize, rgba: [u8; 4]) -> Vec<u8> {
    rgba.iter()
        .copied()
        .cycle()
        .take(4 * width * height)
        .collect()
}

fn encode_solid(mode: &Mode, rgba: [u8; 4]) -> Vec<f32> {
    let mut encoder = Encoder::new(SAMPLE_RATE);
    let pixels = solid_raster(mode.width, mode.lines, rgba);
    encoder
        .encode(&pixels, mode.width, mode.lines, mode)
        .expect("encode failed")
}

/// Samples from the start of the transmission to the end of the VIS frame:
/// 300 ms leader, 10 ms break, then start bit, 7 data bits, parity and stop
/// at 30 ms each.
fn vis_frame_len() -> usize {
    (0.300f64 * SAMPLE_RATE as f64) as usize
        + (0.010f64 * SAMPLE_RATE as f64) as usize
        + 10 * (0.030f64 * SAMPLE_RATE as f64) as usize
}

#[test]
fn vis_round_trip_for_every_mode() {
    for mode in modes::ALL_MODES {
        let samples = encode_solid(mode, [128, 128, 128, 255]);
        let detection = detect_mode(&samples, SAMPLE_RATE);

        assert_eq!(
            detection.mode.vis_code, mode.vis_code,
            "wrong mode for {}",
            mode.name
        );
        assert_eq!(detection.vis_code, Some(mode.vis_code));
        assert!(
            detection.freq_shift.abs() < 20.0,
            "{}: freq shift {}",
            mode.name,
            detection.freq_shift
        );

        let expected_end = vis_frame_len();
        let slack = (0.010 * SAMPLE_RATE as f32) as usize;
        assert!(
            (detection.vis_end_pos as i64 - expected_end as i64).abs() <= slack as i64,
            "{}: vis end {} vs expected {}",
            mode.name,
            detection.vis_end_pos,
            expected_end
        );
    }
}

#[test]
fn sync_pulse_follows_the_vis_stop_bit() {
    let mode = &Mode::ROBOT36;
    let samples = encode_solid(mode, [90, 160, 40, 255]);
    let vis_end = vis_frame_len();
    let period = (mode.line_period() * SAMPLE_RATE as f32) as usize;

    let found = find_sync_pulse(&samples, SAMPLE_RATE, mode, 0.0, vis_end, vis_end + period)
        .expect("first line sync not found");
    assert_eq!(found, vis_end, "sync should start right after the stop bit");
}

#[test]
fn martin_sync_is_found_despite_short_pulse() {
    let mode = &Mode::MARTIN1;
    let samples = encode_solid(mode, [200, 30, 60, 255]);
    let vis_end = vis_frame_len();
    let period = (mode.line_period() * SAMPLE_RATE as f32) as usize;

    let found = find_sync_pulse(&samples, SAMPLE_RATE, mode, 0.0, vis_end, vis_end + period)
        .expect("first line sync not found");
    assert!(
        (found as i64 - vis_end as i64).abs() <= 48,
        "found {found}, expected ~{vis_end}"
    );
}

#[test]
fn detection_defaults_to_robot36_on_silence() {
    let silence = vec![0.0f32; 2 * SAMPLE_RATE as usize];
    let detection = detect_mode(&silence, SAMPLE_RATE);
    assert_eq!(detection.mode.vis_code, Mode::ROBOT36.vis_code);
    assert_eq!(detection.vis_code, None);
    assert_eq!(detection.freq_shift, 0.0);
    assert_eq!(detection.vis_end_pos, 0);
}

#[test]
fn glitched_break_inside_a_leader_is_rejected() {
    // A long leader with a stray 8 ms 1200 Hz burst in it must not decode as
    // a VIS frame, but the real VIS that follows must.
    let mode = &Mode::ROBOT36;
    let encoded = encode_solid(mode, [128, 128, 128, 255]);

    let mut gen = ToneGenerator::new(SAMPLE_RATE);
    gen.add_tone(1900.0, 0.296);
    gen.add_tone(1200.0, 0.008);
    let mut samples = gen.into_samples();
    samples.extend_from_slice(&encoded);

    let detection = detect_mode(&samples, SAMPLE_RATE);
    assert_eq!(detection.mode.vis_code, mode.vis_code);
    assert_eq!(detection.vis_code, Some(mode.vis_code));

    // The detected VIS end belongs to the real frame behind the glitch.
    let prefix = samples.len() - encoded.len();
    let expected_end = prefix + vis_frame_len();
    assert!(
        (detection.vis_end_pos as i64 - expected_end as i64).abs() <= 960,
        "vis end {} vs expected {}",
        detection.vis_end_pos,
        expected_end
    );
}

#[test]
fn vis_survives_a_long_silent_prefix() {
    let mode = &Mode::ROBOT36;
    let encoded = encode_solid(mode, [128, 128, 128, 255]);
    let mut samples = vec![0.0f32; 10 * SAMPLE_RATE as usize];
    samples.extend_from_slice(&encoded);

    let detection = detect_mode(&samples, SAMPLE_RATE);
    assert_eq!(detection.vis_code, Some(mode.vis_code));
    let expected_end = 10 * SAMPLE_RATE as usize + vis_frame_len();
    assert!(
        (detection.vis_end_pos as i64 - expected_end as i64).abs() <= 960,
        "vis end {} vs expected {}",
        detection.vis_end_pos,
        expected_end
    );
}

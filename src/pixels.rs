use image::RgbaImage;
use std::sync::Arc;

pub const MAX_THRESHOLD: u8 = 100;

/// Brightness above which a pixel is considered background at the given
/// threshold. Threshold 100 maps to cutoff 0 (everything but black goes),
/// threshold 0 maps to cutoff 255 (nothing goes).
pub fn brightness_cutoff(threshold: u8) -> f32 {
    255.0 - f32::from(threshold.min(MAX_THRESHOLD)) * 2.55
}

/// Make near-white pixels transparent.
///
/// Pure function of `(source, threshold)`: a pixel whose red/green/blue
/// average exceeds the cutoff gets alpha 0, every other byte is untouched.
/// Threshold 0 returns the source allocation itself so callers never pay for
/// a copy or re-encode on the no-op path.
pub fn remove_background(source: &Arc<RgbaImage>, threshold: u8) -> Arc<RgbaImage> {
    if threshold == 0 {
        return Arc::clone(source);
    }

    let cutoff = brightness_cutoff(threshold);
    let mut out = source.as_ref().clone();
    for px in out.chunks_exact_mut(4) {
        let avg = (f32::from(px[0]) + f32::from(px[1]) + f32::from(px[2])) / 3.0;
        if avg > cutoff {
            px[3] = 0;
        }
    }
    Arc::new(out)
}

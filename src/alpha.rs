//! Alpha-artifact correction for transparent PNG rasters
//!
//! Some encoders leave stray dark RGB data under transparent and
//! near-transparent pixels (a premultiplied-alpha artifact). Composited over
//! anything but white, those pixels read as a dark halo around the subject.
//! This module rewrites the affected pixels so the stored color data agrees
//! with the alpha channel.

use image::RgbaImage;

/// Alpha values below this are treated as carrying partially-premultiplied
/// color data and are rescaled; values at or above it are left untouched.
/// Empirically tuned against the product imagery this pipeline was built
/// for; not a general premultiplied-alpha inverse.
pub const NEAR_TRANSPARENT_CUTOFF: u8 = 15;

/// Correct alpha artifacts in place.
///
/// For every RGBA pixel:
/// - alpha == 0: RGB forced to (0,0,0). Fully transparent pixels carry
///   meaningless, non-deterministic RGB in many encoders; zeroing removes
///   any edge-blend contribution regardless of later alpha changes.
/// - 0 < alpha < [`NEAR_TRANSPARENT_CUTOFF`]: each RGB channel scaled by
///   `alpha / 15`, rounded to the nearest integer and clamped to [0, 255].
/// - otherwise: pixel unchanged.
///
/// Total over any well-formed raster; synchronous and CPU-bound with no
/// suspension points, so a buffer is never observable half-corrected.
pub fn correct_in_place(raster: &mut RgbaImage) {
    for pixel in raster.pixels_mut() {
        let alpha = pixel.0[3];
        if alpha == 0 {
            pixel.0[0] = 0;
            pixel.0[1] = 0;
            pixel.0[2] = 0;
        } else if alpha < NEAR_TRANSPARENT_CUTOFF {
            let factor = f32::from(alpha) / f32::from(NEAR_TRANSPARENT_CUTOFF);
            for channel in &mut pixel.0[..3] {
                *channel = (f32::from(*channel) * factor).round().min(255.0) as u8;
            }
        }
    }
}

//! Additive Gaussian noise.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::decode::PixelBuffer;

/// Add zero-mean Gaussian noise with standard deviation `std_dev` to every
/// color channel of every pixel, clamping to 0..=255.
///
/// Each channel gets an independent draw. Alpha is not noised, unlike a
/// plain every-channel pass over RGBA data, so opaque regions stay opaque.
/// A non-positive (or non-finite) `std_dev` returns a copy.
pub fn add_noise<R: Rng + ?Sized>(image: &PixelBuffer, std_dev: f32, rng: &mut R) -> PixelBuffer {
    let mut result = image.clone();
    if !std_dev.is_finite() || std_dev <= 0.0 {
        return result;
    }

    let Ok(normal) = Normal::new(0.0f32, std_dev) else {
        return result;
    };

    let channels = result.channels();
    for px in result.pixels.chunks_exact_mut(channels) {
        for c in &mut px[..3] {
            let noisy = *c as f32 + normal.sample(rng);
            *c = noisy.clamp(0.0, 255.0) as u8;
        }
    }
    result
}

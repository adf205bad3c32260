// ============================================================
// Layer 4 - Training Augmentation
// ============================================================
// Random photometric and geometric perturbations applied to the
// TRAINING split only. Validation images are never augmented:
// the threshold calibrated on them must reflect clean inputs.
//
// Pipeline (applied in order):
//   1. Random resized crop  - keep 85%-100% of the area, resize
//                             back to image_size
//   2. Horizontal flip      - p = 0.5
//   3. Rotation             - uniform in ±10°, bilinear, black fill
//   4. Colour jitter        - brightness, contrast and saturation
//                             factors each drawn from [0.8, 1.2],
//                             applied to [0, 1] floats
//
// Reference: imageproc geometric_transformations::rotate_about_center

use image::{imageops, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use rand::Rng;

use crate::data::preprocessor::{denormalize_image, normalize_image, resize_image};
use crate::domain::error::Result;

#[derive(Debug, Clone, Copy)]
pub struct Augmenter {
    pub image_size:    u32,
    pub min_scale:     f32,
    pub flip_prob:     f64,
    pub max_rotation:  f32,
    pub jitter:        f32,
}

impl Augmenter {
    pub fn new(image_size: usize) -> Self {
        Self {
            image_size:   image_size as u32,
            min_scale:    0.85,
            flip_prob:    0.5,
            max_rotation: 10.0,
            jitter:       0.2,
        }
    }

    pub fn apply<R: Rng>(&self, image: &RgbImage, rng: &mut R) -> Result<RgbImage> {
        // ── Step 1: Random resized crop ──────────────────────────────────────
        let mut out = self.random_resized_crop(image, rng);

        // ── Step 2: Horizontal flip ──────────────────────────────────────────
        if rng.gen_bool(self.flip_prob) {
            imageops::flip_horizontal_in_place(&mut out);
        }

        // ── Step 3: Rotation ─────────────────────────────────────────────────
        let degrees = rng.gen_range(-self.max_rotation..=self.max_rotation);
        out = rotate_about_center(
            &out,
            degrees.to_radians(),
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
        );

        // ── Step 4: Colour jitter ────────────────────────────────────────────
        let lo = 1.0 - self.jitter;
        let hi = 1.0 + self.jitter;
        let brightness = rng.gen_range(lo..=hi);
        let contrast   = rng.gen_range(lo..=hi);
        let saturation = rng.gen_range(lo..=hi);
        color_jitter(&out, brightness, contrast, saturation)
    }

    fn random_resized_crop<R: Rng>(&self, image: &RgbImage, rng: &mut R) -> RgbImage {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return image.clone();
        }

        let scale  = rng.gen_range(self.min_scale..=1.0f32);
        let side   = scale.sqrt();
        let crop_w = ((w as f32 * side).round() as u32).clamp(1, w);
        let crop_h = ((h as f32 * side).round() as u32).clamp(1, h);
        let x      = rng.gen_range(0..=w - crop_w);
        let y      = rng.gen_range(0..=h - crop_h);

        let crop = imageops::crop_imm(image, x, y, crop_w, crop_h).to_image();
        resize_image(&crop, self.image_size)
    }
}

/// Luma weights (ITU-R 601) used for the contrast mean and saturation grey.
fn luma(p: [f32; 3]) -> f32 {
    0.299 * p[0] + 0.587 * p[1] + 0.114 * p[2]
}

/// Factor 1.0 leaves the channel property unchanged.
pub fn color_jitter(
    image:      &RgbImage,
    brightness: f32,
    contrast:   f32,
    saturation: f32,
) -> Result<RgbImage> {
    let mut values = normalize_image(image);
    let count      = (values.len() / 3).max(1) as f32;
    let mean_luma  = values
        .chunks_exact(3)
        .map(|p| luma([p[0], p[1], p[2]]) * brightness)
        .sum::<f32>()
        / count;

    for pixel in values.chunks_exact_mut(3) {
        for c in pixel.iter_mut() {
            *c = (*c * brightness - mean_luma) * contrast + mean_luma;
        }
        let grey = luma([pixel[0], pixel[1], pixel[2]]);
        for c in pixel.iter_mut() {
            *c = (*c - grey) * saturation + grey;
        }
    }

    denormalize_image(&values, image.width(), image.height())
}

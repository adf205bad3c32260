// ============================================================
// Layer 4 - Image Preprocessor
// ============================================================
// Turns a decoded RGB face crop into the fixed-size normalised
// tensor the embedding network expects.
//
// Steps (applied in order):
//   1. Resize to image_size x image_size (bilinear)
//   2. Scale bytes to [0, 1]
//   3. Normalise each channel with the ImageNet statistics
//        mean = (0.485, 0.456, 0.406)
//        std  = (0.229, 0.224, 0.225)
//   4. Reorder HWC pixels into CHW planes
//
// The network was trained on exactly this transform, so serving
// must use it too. Any change here invalidates checkpoints.
//
// Reference: image crate documentation (imageops::resize)

use std::path::Path;

use burn::prelude::*;
use image::{imageops, imageops::FilterType, RgbImage};

use crate::domain::error::{FaceVerifyError, Result};
use crate::domain::verification::BoundingBox;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD:  [f32; 3] = [0.229, 0.224, 0.225];

/// Extra pixels kept around a detected face box before cropping.
pub const DEFAULT_CROP_MARGIN: u32 = 20;

// ─── FaceTensor ───────────────────────────────────────────────────────────────
/// One preprocessed face in CHW order: `3 * size * size` values.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceTensor {
    pub data: Vec<f32>,
    pub size: usize,
}

impl FaceTensor {
    /// Shape `[1, 3, size, size]`, ready for `SiameseNetwork::embed`.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        let data = TensorData::new(self.data.clone(), [1, 3, self.size, self.size]);
        Tensor::from_data(data, device)
    }
}

// ─── ImagePreprocessor ────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    image_size: usize,
}

impl ImagePreprocessor {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    pub fn prepare(&self, image: &RgbImage) -> FaceTensor {
        let size  = self.image_size;
        let plane = size * size;

        // ── Step 1: Resize ───────────────────────────────────────────────────
        let resized = resize_image(image, size as u32);

        // ── Steps 2-4: Scale, normalise, HWC → CHW ───────────────────────────
        let mut data = vec![0.0f32; 3 * plane];
        for (offset, pixel) in normalize_image(&resized).chunks_exact(3).enumerate() {
            for c in 0..3 {
                data[c * plane + offset] = (pixel[c] - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }

        FaceTensor { data, size }
    }
}

/// Bilinear resize to a square of side `size`. A no-op copy when the
/// image already has that shape.
pub fn resize_image(image: &RgbImage, size: u32) -> RgbImage {
    if image.width() == size && image.height() == size {
        return image.clone();
    }
    imageops::resize(image, size, size, FilterType::Triangle)
}

/// Decode an image file into 8-bit RGB.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|e| FaceVerifyError::DataIntegrity {
            path:   path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Bytes → f32 in [0, 1], HWC order.
pub fn normalize_image(image: &RgbImage) -> Vec<f32> {
    image.as_raw().iter().map(|&b| b as f32 / 255.0).collect()
}

/// Inverse of `normalize_image`: values are rounded and clamped to [0, 255].
pub fn denormalize_image(values: &[f32], width: u32, height: u32) -> Result<RgbImage> {
    let expected = width as usize * height as usize * 3;
    if values.len() != expected {
        return Err(FaceVerifyError::InvalidInput(format!(
            "expected {expected} values for a {width}x{height} RGB image, got {}",
            values.len()
        )));
    }

    let bytes: Vec<u8> = values
        .iter()
        .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect();

    RgbImage::from_raw(width, height, bytes)
        .ok_or_else(|| FaceVerifyError::InvalidInput("pixel buffer size mismatch".to_string()))
}

/// Crop `bbox` enlarged by `margin` pixels on each side, clamped to the
/// image bounds. `None` when the clamped region is empty.
pub fn crop_face(image: &RgbImage, bbox: &BoundingBox, margin: u32) -> Option<RgbImage> {
    let x1 = bbox.x1.saturating_sub(margin);
    let y1 = bbox.y1.saturating_sub(margin);
    let x2 = bbox.x2.saturating_add(margin).min(image.width());
    let y2 = bbox.y2.saturating_add(margin).min(image.height());

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(imageops::crop_imm(image, x1, y1, x2 - x1, y2 - y1).to_image())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::Rng;

    fn random_image(w: u32, h: u32) -> RgbImage {
        let mut rng = rand::thread_rng();
        RgbImage::from_fn(w, h, |_, _| image::Rgb([rng.gen(), rng.gen(), rng.gen()]))
    }

    #[test]
    fn test_normalize_denormalize_round_trip() {
        let img    = random_image(17, 11);
        let values = normalize_image(&img);
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));

        let back = denormalize_image(&values, 17, 11).unwrap();
        for (a, b) in img.as_raw().iter().zip(back.as_raw()) {
            assert!((*a as i16 - *b as i16).abs() <= 1);
        }
    }

    #[test]
    fn test_denormalize_rejects_wrong_length() {
        assert!(denormalize_image(&[0.5; 10], 2, 2).is_err());
    }

    #[test]
    fn test_prepare_output_shape_and_values() {
        let img  = RgbImage::from_pixel(40, 30, image::Rgb([255, 0, 128]));
        let face = ImagePreprocessor::new(32).prepare(&img);
        assert_eq!(face.size, 32);
        assert_eq!(face.data.len(), 3 * 32 * 32);

        // Solid colour stays solid after resize; check the channel planes.
        let plane = 32 * 32;
        let red   = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let green = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((face.data[0] - red).abs() < 1e-4);
        assert!((face.data[plane] - green).abs() < 1e-4);

        let tensor = face.to_tensor::<NdArray>(&Default::default());
        assert_eq!(tensor.dims(), [1, 3, 32, 32]);
    }

    #[test]
    fn test_crop_face_clamps_to_bounds() {
        let img  = random_image(100, 80);
        let bbox = BoundingBox { x1: 10, y1: 5, x2: 90, y2: 70 };
        let crop = crop_face(&img, &bbox, DEFAULT_CROP_MARGIN).unwrap();
        assert_eq!((crop.width(), crop.height()), (100, 80));

        let inner = crop_face(&img, &BoundingBox { x1: 40, y1: 30, x2: 50, y2: 40 }, 5).unwrap();
        assert_eq!((inner.width(), inner.height()), (20, 20));
    }

    #[test]
    fn test_crop_outside_image_is_none() {
        let img = random_image(50, 50);
        assert!(crop_face(&img, &BoundingBox { x1: 200, y1: 200, x2: 300, y2: 300 }, 0).is_none());
    }
}

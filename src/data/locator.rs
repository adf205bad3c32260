//! Face locators for inputs where detection already happened upstream.

use image::RgbImage;

use crate::domain::error::Result;
use crate::domain::traits::FaceLocator;
use crate::domain::verification::BoundingBox;

/// Treats the whole frame as a single face. Used for pre-cropped input.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeImageLocator;

impl FaceLocator for WholeImageLocator {
    fn locate(&self, image: &RgbImage) -> Result<Vec<BoundingBox>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![BoundingBox { x1: 0, y1: 0, x2: image.width(), y2: image.height() }])
    }
}

/// Reports a box supplied by the caller (e.g. from an external detector).
/// A box lying entirely outside the image counts as no face.
#[derive(Debug, Clone, Copy)]
pub struct FixedBoxLocator {
    pub bbox: BoundingBox,
}

impl FixedBoxLocator {
    pub fn new(bbox: BoundingBox) -> Self {
        Self { bbox }
    }
}

impl FaceLocator for FixedBoxLocator {
    fn locate(&self, image: &RgbImage) -> Result<Vec<BoundingBox>> {
        if self.bbox.x1 >= image.width() || self.bbox.y1 >= image.height() {
            return Ok(Vec::new());
        }
        Ok(vec![self.bbox])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_image_box() {
        let img   = RgbImage::new(64, 48);
        let boxes = WholeImageLocator.locate(&img).unwrap();
        assert_eq!(boxes, vec![BoundingBox { x1: 0, y1: 0, x2: 64, y2: 48 }]);
    }

    #[test]
    fn test_fixed_box_outside_image_finds_nothing() {
        let img     = RgbImage::new(64, 48);
        let locator = FixedBoxLocator::new(BoundingBox { x1: 70, y1: 0, x2: 90, y2: 20 });
        assert!(locator.locate(&img).unwrap().is_empty());

        let locator = FixedBoxLocator::new(BoundingBox { x1: 10, y1: 10, x2: 30, y2: 30 });
        assert_eq!(locator.locate(&img).unwrap().len(), 1);
    }
}

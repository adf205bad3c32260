// ============================================================
// Layer 5 - Verification Decision Engine
// ============================================================
// Serving-time comparison of two faces against a loaded,
// weights-frozen network.
//
// Flow per request:
//   image A, image B
//     │  FaceLocator   → zero boxes ⇒ NoFaceDetected(slot),
//     │                  before any model call
//     │  crop_face     → first box only, 20 px margin
//     │  preprocessor  → FaceTensor (CHW, ImageNet-normalised)
//     ▼
//   embed_pair → Embedding × 2 → cosine similarity + distance
//     ▼
//   DecisionRule::Distance   (distance <  t, calibrated default)
//   DecisionRule::Similarity (cosine   >= t, default 0.7)
//
// InferenceContext is built explicitly by the serving layer and
// every operation takes &self. It is Send but not Sync (burn
// parameters initialise lazily), so concurrent callers each take a
// clone: module clones share the weight tensors.

use std::path::Path;

use burn::prelude::*;
use image::RgbImage;

use crate::data::preprocessor::{crop_face, FaceTensor, ImagePreprocessor, DEFAULT_CROP_MARGIN};
use crate::domain::embedding::{cosine_similarity, euclidean_distance, Embedding};
use crate::domain::error::{FaceVerifyError, ImageSlot, Result};
use crate::domain::traits::FaceLocator;
use crate::domain::verification::{
    DecisionRule, DistanceDecision, PairMeasurement, SimilarityReport, VerificationResult,
};
use crate::infra::checkpoint::load_checkpoint;
use crate::ml::model::{SiameseNetwork, SiameseNetworkConfig};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Everything a verification call needs: the inference-mode network,
/// its device, the preprocessing it was trained with and the thresholds.
/// Clone once per thread to serve requests concurrently.
#[derive(Debug, Clone)]
pub struct InferenceContext<B: Backend> {
    model:                SiameseNetwork<B>,
    device:               B::Device,
    preprocessor:         ImagePreprocessor,
    calibrated_threshold: Option<f64>,
    similarity_threshold: f64,
}

impl<B: Backend> InferenceContext<B> {
    pub fn new(model: SiameseNetwork<B>, device: B::Device, image_size: usize) -> Self {
        Self {
            model,
            device,
            preprocessor:         ImagePreprocessor::new(image_size),
            calibrated_threshold: None,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Load weights and, when present, the calibrated distance threshold
    /// and training resolution. `image_size` covers legacy files only.
    pub fn from_checkpoint(
        path:       &Path,
        fallback:   &SiameseNetworkConfig,
        image_size: usize,
        device:     B::Device,
    ) -> Result<Self> {
        let loaded = load_checkpoint::<B>(path, fallback, &device)?;
        let image_size = loaded.image_size(image_size);
        let mut ctx = Self::new(loaded.model, device, image_size);
        ctx.calibrated_threshold = loaded.metadata.map(|m| m.optimal_threshold);
        Ok(ctx)
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn calibrated_threshold(&self) -> Option<f64> {
        self.calibrated_threshold
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    /// Locate, crop and preprocess one face. Only the first box is used.
    pub fn prepare_face(
        &self,
        image:   &RgbImage,
        locator: &dyn FaceLocator,
        slot:    ImageSlot,
    ) -> Result<FaceTensor> {
        let boxes = locator.locate(image)?;
        let Some(bbox) = boxes.first() else {
            return Err(FaceVerifyError::NoFaceDetected(slot));
        };
        if boxes.len() > 1 {
            tracing::debug!("{} faces in {} image, using the first", boxes.len(), slot);
        }

        let crop = crop_face(image, bbox, DEFAULT_CROP_MARGIN)
            .ok_or(FaceVerifyError::NoFaceDetected(slot))?;
        Ok(self.preprocessor.prepare(&crop))
    }

    fn check_face(&self, face: &FaceTensor, slot: ImageSlot) -> Result<()> {
        let size = self.preprocessor.image_size();
        if face.size != size || face.data.len() != 3 * size * size {
            return Err(FaceVerifyError::InvalidInput(format!(
                "{slot} face tensor has {} values, expected 3x{size}x{size}",
                face.data.len()
            )));
        }
        Ok(())
    }

    /// Embed both faces with the shared network.
    pub fn embed_pair(&self, a: &FaceTensor, b: &FaceTensor) -> Result<(Embedding, Embedding)> {
        self.check_face(a, ImageSlot::First)?;
        self.check_face(b, ImageSlot::Second)?;

        let (emb_a, emb_b) = self
            .model
            .embed_pair(a.to_tensor::<B>(&self.device), b.to_tensor::<B>(&self.device));
        Ok((to_embedding(emb_a)?, to_embedding(emb_b)?))
    }

    pub fn measure(&self, a: &FaceTensor, b: &FaceTensor) -> Result<PairMeasurement> {
        let (emb_a, emb_b) = self.embed_pair(a, b)?;
        Ok(PairMeasurement {
            cosine_similarity:  cosine_similarity(&emb_a, &emb_b),
            euclidean_distance: euclidean_distance(&emb_a, &emb_b),
        })
    }
}

fn to_embedding<B: Backend>(t: Tensor<B, 2>) -> Result<Embedding> {
    t.into_data()
        .to_vec::<f32>()
        .map(Embedding::new)
        .map_err(|e| FaceVerifyError::InvalidInput(format!("cannot read embedding: {e:?}")))
}

/// Distance rule: match when `distance < threshold`. Without an explicit
/// threshold the calibrated one from the checkpoint is used.
pub fn verify_by_distance<B: Backend>(
    ctx:       &InferenceContext<B>,
    a:         &FaceTensor,
    b:         &FaceTensor,
    threshold: Option<f64>,
) -> Result<DistanceDecision> {
    let threshold = threshold.or(ctx.calibrated_threshold()).ok_or_else(|| {
        FaceVerifyError::InvalidInput(
            "no distance threshold given and the checkpoint carries no calibrated one".to_string(),
        )
    })?;

    let m = ctx.measure(a, b)?;
    Ok(DistanceDecision {
        euclidean_distance: m.euclidean_distance,
        is_match:           DecisionRule::Distance.is_match(m.euclidean_distance as f64, threshold),
        threshold_used:     threshold,
    })
}

/// Similarity rule: match when `cosine >= threshold` (default 0.7).
pub fn verify_by_similarity<B: Backend>(
    ctx:       &InferenceContext<B>,
    a:         &FaceTensor,
    b:         &FaceTensor,
    threshold: Option<f64>,
) -> Result<VerificationResult> {
    let threshold = threshold.unwrap_or(ctx.similarity_threshold());

    let m = ctx.measure(a, b)?;
    Ok(VerificationResult {
        similarity_score: m.cosine_similarity,
        is_match:         DecisionRule::Similarity.is_match(m.cosine_similarity as f64, threshold),
        threshold_used:   threshold,
    })
}

pub fn similarity_report<B: Backend>(
    ctx: &InferenceContext<B>,
    a:   &FaceTensor,
    b:   &FaceTensor,
) -> Result<SimilarityReport> {
    Ok(ctx.measure(a, b)?.into())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::locator::{FixedBoxLocator, WholeImageLocator};
    use crate::domain::verification::BoundingBox;
    use crate::ml::backbone::Backbone;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    const SIZE: usize = 32;

    fn context() -> InferenceContext<TestBackend> {
        let device = Default::default();
        let model  = SiameseNetworkConfig::new(Backbone::ResNet18)
            .with_embedding_dim(16)
            .init::<TestBackend>(&device);
        InferenceContext::new(model, device, SIZE)
    }

    fn face(seed: u8) -> FaceTensor {
        let img = RgbImage::from_fn(40, 40, |x, y| {
            image::Rgb([(x as u8).wrapping_mul(seed), (y as u8).wrapping_add(seed), seed])
        });
        ImagePreprocessor::new(SIZE).prepare(&img)
    }

    #[test]
    fn test_identical_faces_are_maximally_similar() {
        let ctx = context();
        let f   = face(7);
        let m   = ctx.measure(&f, &f).unwrap();
        assert!((m.cosine_similarity - 1.0).abs() < 1e-5);
        assert!(m.euclidean_distance.abs() < 1e-5);

        let report = similarity_report(&ctx, &f, &f).unwrap();
        assert!((report.normalized_similarity - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rules_use_their_own_thresholds() {
        let mut ctx = context();
        ctx.calibrated_threshold = Some(0.5);
        let f   = face(3);

        let by_distance = verify_by_distance(&ctx, &f, &f, None).unwrap();
        assert!(by_distance.is_match);
        assert_eq!(by_distance.threshold_used, 0.5);

        let by_similarity = verify_by_similarity(&ctx, &f, &f, None).unwrap();
        assert!(by_similarity.is_match);
        assert_eq!(by_similarity.threshold_used, DEFAULT_SIMILARITY_THRESHOLD);

        // A distance threshold of 0 can never match (strict <).
        assert!(!verify_by_distance(&ctx, &f, &f, Some(0.0)).unwrap().is_match);
    }

    #[test]
    fn test_distance_rule_without_any_threshold_is_rejected() {
        let ctx = context();
        let f   = face(1);
        assert!(matches!(
            verify_by_distance(&ctx, &f, &f, None),
            Err(FaceVerifyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_missing_face_is_reported_per_image() {
        let ctx     = context();
        let img     = RgbImage::new(40, 40);
        let nowhere = FixedBoxLocator::new(BoundingBox { x1: 100, y1: 100, x2: 120, y2: 120 });

        let err = ctx.prepare_face(&img, &nowhere, ImageSlot::Second).unwrap_err();
        assert!(matches!(err, FaceVerifyError::NoFaceDetected(ImageSlot::Second)));

        let ok = ctx.prepare_face(&img, &WholeImageLocator, ImageSlot::First).unwrap();
        assert_eq!(ok.size, SIZE);
    }

    #[test]
    fn test_clones_measure_identically_across_threads() {
        let ctx      = context();
        let (a, b)   = (face(4), face(9));
        let expected = ctx.measure(&a, &b).unwrap();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let ctx = ctx.clone();
                let (a, b) = (a.clone(), b.clone());
                std::thread::spawn(move || ctx.measure(&a, &b).unwrap())
            })
            .collect();

        for handle in handles {
            let m = handle.join().unwrap();
            assert!((m.cosine_similarity - expected.cosine_similarity).abs() < 1e-6);
            assert!((m.euclidean_distance - expected.euclidean_distance).abs() < 1e-5);
        }
    }

    #[test]
    fn test_checkpoint_resolution_overrides_configured_one() {
        use crate::infra::checkpoint::{save_checkpoint, CheckpointMetadata};

        let dir = std::env::temp_dir().join(format!("face_verify_verifier_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path    = dir.join("net.ckpt");
        let network = SiameseNetworkConfig::new(Backbone::ResNet18).with_embedding_dim(16);
        let model   = network.init::<TestBackend>(&Default::default());
        let meta    = CheckpointMetadata {
            epoch: 2, val_loss: 0.4, val_accuracy: 0.6, optimal_threshold: 0.8, image_size: SIZE,
        };
        save_checkpoint(&path, &model, &network, &meta).unwrap();

        let ctx = InferenceContext::<TestBackend>::from_checkpoint(&path, &network, 160, Default::default())
            .unwrap();
        assert_eq!(ctx.calibrated_threshold(), Some(0.8));
        assert!(ctx.measure(&face(2), &face(6)).is_ok());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_wrong_tensor_size_is_invalid_input() {
        let ctx   = context();
        let small = ImagePreprocessor::new(16).prepare(&RgbImage::new(20, 20));
        assert!(matches!(
            ctx.measure(&small, &face(2)),
            Err(FaceVerifyError::InvalidInput(_))
        ));
    }
}

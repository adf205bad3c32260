// ============================================================
// Layer 2 - VerifyUseCase
// ============================================================
// Serving-side workflow for one pair of image files:
//
//   Step 1: Decode both images                (Layer 4 - data)
//   Step 2: Build the InferenceContext once   (Layer 5 - ml)
//           from the checkpoint
//   Step 3: Locate + crop + preprocess faces  (Layer 4 / 5)
//   Step 4: Decide with the requested rule    (Layer 5 - ml)
//
// The context is created per use case and passed down by
// reference. Without a box the whole image is taken as the face.

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::prelude::Backend;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::network_config;
use crate::data::locator::{FixedBoxLocator, WholeImageLocator};
use crate::data::preprocessor::{load_image, FaceTensor};
use crate::domain::error::ImageSlot;
use crate::domain::traits::FaceLocator;
use crate::domain::verification::{
    BoundingBox, DecisionRule, DistanceDecision, SimilarityReport, VerificationResult,
};
use crate::infra::config::AppConfig;
use crate::ml::backend::{CpuBackend, ResolvedDevice};
use crate::ml::verifier::{similarity_report, verify_by_distance, verify_by_similarity, InferenceContext};

/// Two images to compare, with optional face boxes.
#[derive(Debug, Clone)]
pub struct FacePairRequest {
    pub image_a: PathBuf,
    pub image_b: PathBuf,
    pub bbox_a:  Option<BoundingBox>,
    pub bbox_b:  Option<BoundingBox>,
}

/// Outcome of `verify`, shaped by the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Verdict {
    Similarity(VerificationResult),
    Distance(DistanceDecision),
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        match self {
            Verdict::Similarity(r) => r.is_match,
            Verdict::Distance(d)   => d.is_match,
        }
    }
}

enum Operation {
    Verify { rule: DecisionRule, threshold: Option<f64> },
    Similarity,
}

enum Outcome {
    Verdict(Verdict),
    Report(SimilarityReport),
}

pub struct VerifyUseCase {
    config:     AppConfig,
    checkpoint: PathBuf,
}

impl VerifyUseCase {
    /// `checkpoint` defaults to `model.path`.
    pub fn new(config: AppConfig, checkpoint: Option<PathBuf>) -> Self {
        let checkpoint = checkpoint.unwrap_or_else(|| config.model.path.clone());
        Self { config, checkpoint }
    }

    /// Match decision under `rule`. `threshold` overrides the rule's
    /// default (calibrated distance, or `serving.similarity_threshold`).
    pub fn verify(
        &self,
        request:   &FacePairRequest,
        rule:      DecisionRule,
        threshold: Option<f64>,
    ) -> Result<Verdict> {
        match self.dispatch(request, Operation::Verify { rule, threshold })? {
            Outcome::Verdict(v) => Ok(v),
            Outcome::Report(_)  => anyhow::bail!("verification produced a similarity report"),
        }
    }

    /// Raw cosine similarity and distance, no decision.
    pub fn similarity(&self, request: &FacePairRequest) -> Result<SimilarityReport> {
        match self.dispatch(request, Operation::Similarity)? {
            Outcome::Report(r)  => Ok(r),
            Outcome::Verdict(_) => anyhow::bail!("similarity produced a verdict"),
        }
    }

    fn dispatch(&self, request: &FacePairRequest, op: Operation) -> Result<Outcome> {
        match self.config.model.device.resolve()? {
            ResolvedDevice::Cpu => {
                self.run::<CpuBackend>(request, op, burn::backend::ndarray::NdArrayDevice::Cpu)
            }
            #[cfg(feature = "wgpu")]
            ResolvedDevice::Accelerator => self.run::<crate::ml::backend::GpuBackend>(
                request,
                op,
                burn::backend::wgpu::WgpuDevice::default(),
            ),
            #[cfg(not(feature = "wgpu"))]
            ResolvedDevice::Accelerator => {
                anyhow::bail!("accelerator backend is not compiled into this build")
            }
        }
    }

    fn run<B: Backend>(&self, request: &FacePairRequest, op: Operation, device: B::Device) -> Result<Outcome> {
        let cfg = &self.config;

        // ── Step 1: Decode ────────────────────────────────────────────────────
        let image_a = read_image(&request.image_a)?;
        let image_b = read_image(&request.image_b)?;

        // ── Step 2: Context ───────────────────────────────────────────────────
        let ctx = InferenceContext::<B>::from_checkpoint(
            &self.checkpoint,
            &network_config(cfg)?,
            cfg.data.image_size,
            device,
        )
        .with_context(|| format!("Cannot load checkpoint '{}'", self.checkpoint.display()))?
        .with_similarity_threshold(cfg.serving.similarity_threshold);

        // ── Step 3: Faces ─────────────────────────────────────────────────────
        let face_a = prepare(&ctx, &image_a, request.bbox_a, ImageSlot::First)?;
        let face_b = prepare(&ctx, &image_b, request.bbox_b, ImageSlot::Second)?;

        // ── Step 4: Decision ──────────────────────────────────────────────────
        let outcome = match op {
            Operation::Verify { rule: DecisionRule::Similarity, threshold } => Outcome::Verdict(
                Verdict::Similarity(verify_by_similarity(&ctx, &face_a, &face_b, threshold)?),
            ),
            Operation::Verify { rule: DecisionRule::Distance, threshold } => Outcome::Verdict(
                Verdict::Distance(verify_by_distance(&ctx, &face_a, &face_b, threshold)?),
            ),
            Operation::Similarity => Outcome::Report(similarity_report(&ctx, &face_a, &face_b)?),
        };
        Ok(outcome)
    }
}

fn read_image(path: &std::path::Path) -> Result<RgbImage> {
    load_image(path).with_context(|| format!("Cannot read image '{}'", path.display()))
}

fn prepare<B: Backend>(
    ctx:   &InferenceContext<B>,
    image: &RgbImage,
    bbox:  Option<BoundingBox>,
    slot:  ImageSlot,
) -> Result<FaceTensor> {
    let locator: Box<dyn FaceLocator> = match bbox {
        Some(b) => Box::new(FixedBoxLocator::new(b)),
        None    => Box::new(WholeImageLocator),
    };
    Ok(ctx.prepare_face(image, locator.as_ref(), slot)?)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::FaceVerifyError;
    use crate::infra::checkpoint::{save_checkpoint, CheckpointMetadata};
    use crate::ml::backend::DeviceKind;
    use image::Rgb;
    use std::{fs, path::Path};

    struct Fixture {
        root:     PathBuf,
        use_case: VerifyUseCase,
        request:  FacePairRequest,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    fn fixture(name: &str) -> Fixture {
        let root = std::env::temp_dir()
            .join(format!("face_verify_verify_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();

        let mut cfg = AppConfig::default();
        cfg.model.backbone      = "resnet18".to_string();
        cfg.model.embedding_dim = 8;
        cfg.model.device        = DeviceKind::Cpu;
        cfg.model.path          = root.join("siamese.ckpt");
        cfg.data.image_size     = 32;

        let network = network_config(&cfg).unwrap();
        let model   = network.init::<CpuBackend>(&Default::default());
        let meta    = CheckpointMetadata {
            epoch: 1, val_loss: 0.3, val_accuracy: 0.7, optimal_threshold: 0.5, image_size: 32,
        };
        save_checkpoint(&cfg.model.path, &model, &network, &meta).unwrap();

        let face = root.join("face.png");
        write_face(&face);

        Fixture {
            root,
            use_case: VerifyUseCase::new(cfg, None),
            request:  FacePairRequest {
                image_a: face.clone(),
                image_b: face,
                bbox_a:  None,
                bbox_b:  None,
            },
        }
    }

    fn write_face(path: &Path) {
        RgbImage::from_fn(48, 48, |x, y| Rgb([(x * 5) as u8, (y * 5) as u8, 90]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_same_image_matches_under_both_rules() {
        let f = fixture("both");

        let by_similarity = f.use_case.verify(&f.request, DecisionRule::Similarity, None).unwrap();
        assert!(by_similarity.is_match());
        let Verdict::Similarity(r) = by_similarity else { panic!("wrong verdict shape") };
        assert_eq!(r.threshold_used, 0.7);

        // Distance rule falls back to the calibrated threshold in the file.
        let by_distance = f.use_case.verify(&f.request, DecisionRule::Distance, None).unwrap();
        let Verdict::Distance(d) = by_distance else { panic!("wrong verdict shape") };
        assert!(d.is_match);
        assert_eq!(d.threshold_used, 0.5);

        let report = f.use_case.similarity(&f.request).unwrap();
        assert!(report.euclidean_distance.abs() < 1e-5);
    }

    #[test]
    fn test_box_outside_second_image_is_no_face() {
        let f = fixture("nobox");
        let request = FacePairRequest {
            bbox_b: Some(BoundingBox { x1: 200, y1: 200, x2: 240, y2: 240 }),
            ..f.request.clone()
        };

        let err = f.use_case.verify(&request, DecisionRule::Similarity, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FaceVerifyError>(),
            Some(FaceVerifyError::NoFaceDetected(ImageSlot::Second))
        ));
    }

    #[test]
    fn test_missing_checkpoint_is_reported() {
        let f = fixture("nockpt");
        let use_case = VerifyUseCase::new(f.use_case.config.clone(), Some(f.root.join("absent.ckpt")));
        let err = use_case.similarity(&f.request).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FaceVerifyError>(),
            Some(FaceVerifyError::CheckpointNotFound(_))
        ));
    }
}

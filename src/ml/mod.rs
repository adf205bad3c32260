// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here.
//
// What's in this layer:
//
//   backbone.rs    - ResNet-18 / ResNet-50 feature extractors
//                    (classification layer removed)
//
//   model.rs       - The Siamese embedding network
//                    backbone → linear → ReLU → dropout → linear
//                    → L2 normalisation; one instance embeds
//                    both images of a pair
//
//   loss.rs        - Contrastive loss and pairwise distance
//
//   calibration.rs - Threshold sweep, classification report,
//                    ROC / AUC
//
//   scheduler.rs   - Reduce-on-plateau learning rate
//
//   backend.rs     - CPU / accelerator backend selection
//
//   trainer.rs     - The training loop: train, validate,
//                    calibrate, schedule, checkpoint
//
//   verifier.rs    - Serving-time decision engine built on an
//                    explicit InferenceContext
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Koch et al. (2015) Siamese Neural Networks

pub mod backbone;

pub mod model;

pub mod loss;

pub mod calibration;

pub mod scheduler;

pub mod backend;

pub mod trainer;

pub mod verifier;

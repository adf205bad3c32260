// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything from a directory of face images to device-ready
// tensor batches of labelled pairs.
//
// The pipeline flows in this order:
//
//   <root>/<identity>/*.jpg
//       │
//       ▼
//   IdentityFolderLoader → scans identities, builds the Corpus
//       │
//       ▼
//   PairSampler          → draws (image A, image B, label)
//       │
//       ▼
//   Augmenter            → random crop/flip/rotate/jitter (train only)
//       │
//       ▼
//   ImagePreprocessor    → resize, ImageNet normalisation, CHW
//       │
//       ▼
//   PairDataset          → implements Burn's Dataset trait
//       │
//       ▼
//   PairBatcher          → stacks pairs into tensor batches
//       │
//       ▼
//   DataLoader           → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Scans a directory-per-identity corpus
pub mod loader;

/// Face locators for pre-cropped or externally detected input
pub mod locator;

/// Decoding, resizing, normalisation and face cropping
pub mod preprocessor;

/// Training-only random augmentation
pub mod augment;

/// Positive/negative pair generation with bounded retries
pub mod sampler;

/// Implements Burn's Dataset trait for labelled pairs
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Per-identity train/validation split
pub mod splitter;

// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training, evaluating, verifying a pair or
// preparing a dataset).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No UI or printing here (that's Layer 1)
//   - Backend selection happens here, once per use case
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The training workflow
pub mod train_use_case;

// Offline evaluation of a checkpoint
pub mod evaluate_use_case;

// Pair verification and similarity scoring
pub mod verify_use_case;

// Train/val split and corpus statistics
pub mod dataset_use_case;

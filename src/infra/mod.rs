// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any one business
// layer:
//
//   config.rs     - TOML application configuration
//                   Defaults for every key, validation, and the
//                   best-accuracy checkpoint path rule.
//
//   checkpoint.rs - Saving and loading network weights
//                   Burn named MessagePack records wrapped in a
//                   bincode envelope that also carries the
//                   architecture and epoch metadata.
//
//   metrics.rs    - Training metrics logging
//                   Epoch rows appended to metrics.csv, plus the
//                   batch-weighted running averages.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Application configuration (TOML)
pub mod config;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that define the core
// concepts of face verification.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Identity classes, image samples and labelled pairs
pub mod identity;

// Unit-norm embedding vectors and the two standalone metrics
pub mod embedding;

// Verification inputs/outputs and the two decision rules
pub mod verification;

// Error taxonomy shared by every layer
pub mod error;

// Collaborator seams (corpus source, face locator)
pub mod traits;

// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// Seams to the collaborators the core does not own:
//
//   IdentitySource - something that can produce a labelled corpus
//                    (IdentityFolderLoader scans a directory tree)
//   FaceLocator    - the face detector; the core only consumes the
//                    bounding boxes it reports
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use image::RgbImage;

use crate::domain::error::Result;
use crate::domain::identity::Corpus;
use crate::domain::verification::BoundingBox;

// ─── IdentitySource ───────────────────────────────────────────────────────────
/// Any component that can load a directory-per-identity style corpus.
///
/// Implementations:
///   - IdentityFolderLoader → scans `<root>/<identity>/<image>`
pub trait IdentitySource {
    /// Build the corpus. Fails with `EmptyCorpus` when no identity
    /// has a single usable image.
    fn load_corpus(&self) -> Result<Corpus>;
}

// ─── FaceLocator ──────────────────────────────────────────────────────────────
/// Face localisation collaborator.
///
/// Implementations:
///   - WholeImageLocator → the whole frame is one face (pre-cropped input)
///   - FixedBoxLocator   → a box supplied by the caller
pub trait FaceLocator {
    /// Boxes of every face found, best first. An empty Vec means no face.
    fn locate(&self, image: &RgbImage) -> Result<Vec<BoundingBox>>;
}

// ============================================================
// Layer 3 - Identity Corpus Types
// ============================================================
// An identity corpus is a set of named classes, each holding the
// images believed to depict one person:
//
//   Corpus
//     └── IdentityClass ("alice")
//           └── ImageSample (data/train/alice/001.jpg)
//
// A corpus is built once when a dataset directory is scanned and
// is read-only afterwards; it is shared between data-loading
// workers behind an Arc.
//
// A Pair borrows two samples from the corpus plus the label the
// sampler assigned. Pairs are never stored.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::{FaceVerifyError, Result};

/// Reference to one raw image file. Pixels are decoded lazily by the
/// data pipeline, never kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSample {
    pub path:     PathBuf,
    /// Name of the owning identity class
    pub identity: String,
}

impl ImageSample {
    pub fn new(path: impl Into<PathBuf>, identity: impl Into<String>) -> Self {
        Self { path: path.into(), identity: identity.into() }
    }
}

/// A named group of one or more images of the same person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClass {
    pub name:   String,
    pub images: Vec<ImageSample>,
}

impl IdentityClass {
    /// Build a class from image paths; every sample is tagged with `name`.
    pub fn new(name: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        let name = name.into();
        let images = paths
            .into_iter()
            .map(|p| ImageSample::new(p, name.clone()))
            .collect();
        Self { name, images }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// The full labelled corpus. Construction guarantees at least one class
/// and at least one image per class.
#[derive(Debug, Clone)]
pub struct Corpus {
    root:    PathBuf,
    classes: Vec<IdentityClass>,
}

impl Corpus {
    /// Classes with zero images are dropped; if nothing is left the corpus
    /// is rejected with `EmptyCorpus`.
    pub fn new(root: impl Into<PathBuf>, classes: Vec<IdentityClass>) -> Result<Self> {
        let root = root.into();
        let classes: Vec<IdentityClass> = classes.into_iter().filter(|c| !c.is_empty()).collect();
        if classes.is_empty() {
            return Err(FaceVerifyError::EmptyCorpus(root));
        }
        Ok(Self { root, classes })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn class(&self, index: usize) -> &IdentityClass {
        &self.classes[index]
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn num_images(&self) -> usize {
        self.classes.iter().map(IdentityClass::len).sum()
    }
}

/// Binary pair label: 1.0 = same identity, 0.0 = different identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairLabel {
    Same,
    Different,
}

impl PairLabel {
    pub fn as_f32(self) -> f32 {
        match self {
            PairLabel::Same      => 1.0,
            PairLabel::Different => 0.0,
        }
    }
}

/// Two samples plus the label the sampler assigned to them.
#[derive(Debug, Clone, Copy)]
pub struct Pair<'a> {
    pub first:  &'a ImageSample,
    pub second: &'a ImageSample,
    pub label:  PairLabel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_classes_are_dropped() {
        let corpus = Corpus::new(
            "data/train",
            vec![
                IdentityClass::new("alice", vec![PathBuf::from("a/1.jpg")]),
                IdentityClass::new("bob", Vec::new()),
            ],
        )
        .unwrap();
        assert_eq!(corpus.num_classes(), 1);
        assert_eq!(corpus.class(0).name, "alice");
        assert_eq!(corpus.class(0).images[0].identity, "alice");
    }

    #[test]
    fn test_corpus_without_images_is_rejected() {
        let err = Corpus::new("data/val", vec![IdentityClass::new("bob", Vec::new())]).unwrap_err();
        assert!(matches!(err, FaceVerifyError::EmptyCorpus(_)));
    }

    #[test]
    fn test_label_values() {
        assert_eq!(PairLabel::Same.as_f32(), 1.0);
        assert_eq!(PairLabel::Different.as_f32(), 0.0);
    }
}

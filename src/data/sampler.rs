// ============================================================
// Layer 4 - Pair Sampler
// ============================================================
// Draws labelled image pairs from an identity corpus, with
// replacement, as a virtually infinite stream.
//
// Per pair:
//   1. Coin flip: same identity or different identity
//   2. Identity A uniformly from all classes
//   3. Same:      image 1 and image 2 from A, image 2 != image 1
//                 (a singleton class pairs its image with itself)
//      Different: image 1 from A, identity B != A, image 2 from B
//                 (a single-class corpus falls back to B = A)
//
// "Retry until different" loops are bounded at MAX_RETRIES
// draws. When they run out, the other candidates are picked
// from directly, so the outcome never depends on luck:
//   - corpus with >= 2 classes → a negative is always a true negative
//   - class with >= 2 images   → a positive never self-pairs
//
// The nominal length (classes × pairs_per_class) only sizes an
// epoch. Indices are not stable keys: the same index yields a
// different pair every time it is requested.

use std::sync::Arc;

use rand::Rng;

use crate::domain::identity::{Corpus, Pair, PairLabel};

/// Redraws before falling back to an explicit pick among the others.
pub const MAX_RETRIES: usize = 32;

#[derive(Debug, Clone)]
pub struct PairSampler {
    corpus:          Arc<Corpus>,
    pairs_per_class: usize,
}

impl PairSampler {
    pub fn new(corpus: Arc<Corpus>, pairs_per_class: usize) -> Self {
        if corpus.num_classes() == 1 {
            tracing::warn!(
                "Corpus '{}' has a single identity: negative pairs will reuse it \
                 and carry label 0.0 for same-identity images",
                corpus.root().display()
            );
        }
        Self { corpus, pairs_per_class }
    }

    /// Pairs per epoch: `classes × pairs_per_class`.
    pub fn len(&self) -> usize {
        self.corpus.num_classes() * self.pairs_per_class
    }

    /// Draw one pair; positive and negative with equal probability.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Pair<'_> {
        let label = if rng.gen_bool(0.5) { PairLabel::Same } else { PairLabel::Different };
        self.sample_kind(label, rng)
    }

    /// Draw one pair with the requested label.
    pub fn sample_kind<R: Rng>(&self, label: PairLabel, rng: &mut R) -> Pair<'_> {
        let num_classes = self.corpus.num_classes();
        let class_a     = rng.gen_range(0..num_classes);
        let images_a    = &self.corpus.class(class_a).images;
        let idx1        = rng.gen_range(0..images_a.len());

        match label {
            PairLabel::Same => {
                let idx2 = draw_other(images_a.len(), idx1, rng);
                Pair { first: &images_a[idx1], second: &images_a[idx2], label }
            }
            PairLabel::Different => {
                let class_b  = draw_other(num_classes, class_a, rng);
                let images_b = &self.corpus.class(class_b).images;
                let idx2     = rng.gen_range(0..images_b.len());
                Pair { first: &images_a[idx1], second: &images_b[idx2], label }
            }
        }
    }
}

/// Uniform index in `0..n` different from `avoid`, or `avoid` itself
/// when `n == 1`.
fn draw_other<R: Rng>(n: usize, avoid: usize, rng: &mut R) -> usize {
    if n <= 1 {
        return avoid;
    }

    for _ in 0..MAX_RETRIES {
        let candidate = rng.gen_range(0..n);
        if candidate != avoid {
            return candidate;
        }
    }

    // Uniform over the n - 1 others.
    let pick = rng.gen_range(0..n - 1);
    if pick >= avoid { pick + 1 } else { pick }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::IdentityClass;
    use rand::{rngs::StdRng, SeedableRng};
    use std::path::PathBuf;

    fn class(name: &str, n: usize) -> IdentityClass {
        let paths = (0..n).map(|i| PathBuf::from(format!("{name}/{i}.jpg"))).collect();
        IdentityClass::new(name, paths)
    }

    fn sampler(classes: Vec<IdentityClass>) -> PairSampler {
        let corpus = Corpus::new("mem", classes).unwrap();
        PairSampler::new(Arc::new(corpus), 100)
    }

    #[test]
    fn test_nominal_length() {
        let s = sampler(vec![class("a", 3), class("b", 1), class("c", 5)]);
        assert_eq!(s.len(), 300);
    }

    #[test]
    fn test_singleton_positive_is_self_pair() {
        let s       = sampler(vec![class("solo", 1)]);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let pair = s.sample_kind(PairLabel::Same, &mut rng);
            assert_eq!(pair.first, pair.second);
            assert_eq!(pair.label.as_f32(), 1.0);
        }
    }

    #[test]
    fn test_positive_from_multi_image_class_never_self_pairs() {
        let s       = sampler(vec![class("a", 2), class("b", 2)]);
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..500 {
            let pair = s.sample_kind(PairLabel::Same, &mut rng);
            assert_ne!(pair.first.path, pair.second.path);
            assert_eq!(pair.first.identity, pair.second.identity);
        }
    }

    #[test]
    fn test_negative_with_two_classes_is_always_true_negative() {
        let s       = sampler(vec![class("a", 1), class("b", 4)]);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let pair = s.sample_kind(PairLabel::Different, &mut rng);
            assert_ne!(pair.first.identity, pair.second.identity);
            assert_eq!(pair.label.as_f32(), 0.0);
        }
    }

    #[test]
    fn test_single_class_negative_falls_back_to_same_class() {
        let s       = sampler(vec![class("only", 3)]);
        let mut rng = StdRng::seed_from_u64(4);
        let pair    = s.sample_kind(PairLabel::Different, &mut rng);
        assert_eq!(pair.first.identity, pair.second.identity);
        assert_eq!(pair.label, PairLabel::Different);
    }

    #[test]
    fn test_coin_flip_produces_both_labels() {
        let s       = sampler(vec![class("a", 2), class("b", 2), class("c", 2)]);
        let mut rng = StdRng::seed_from_u64(5);
        let same    = (0..400)
            .filter(|_| s.sample(&mut rng).label == PairLabel::Same)
            .count();
        assert!(same > 120 && same < 280, "got {same} positives out of 400");
    }

    #[test]
    fn test_draw_other_fallback_is_uniform_over_others() {
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..200 {
            let v = draw_other(3, 1, &mut rng);
            assert!(v == 0 || v == 2);
        }
        assert_eq!(draw_other(1, 0, &mut rng), 0);
    }
}

use std::sync::Arc;

use burn::data::dataset::Dataset;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::augment::Augmenter;
use crate::data::preprocessor::{load_image, ImagePreprocessor};
use crate::data::sampler::PairSampler;
use crate::domain::error::Result;
use crate::domain::identity::Corpus;

/// Redraws attempted by `Dataset::get` after a decode failure.
pub const MAX_DECODE_ATTEMPTS: usize = 8;

/// One preprocessed pair: two CHW face tensors and the pair label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairItem {
    pub image_a:    Vec<f32>,
    pub image_b:    Vec<f32>,
    /// 1.0 = same identity, 0.0 = different identity
    pub label:      f32,
    pub image_size: usize,
}

/// Pairs drawn fresh on every `get`; `index` only bounds the epoch.
pub struct PairDataset {
    sampler:      PairSampler,
    preprocessor: ImagePreprocessor,
    /// Present on the training split only.
    augmenter:    Option<Augmenter>,
}

impl PairDataset {
    pub fn train(corpus: Arc<Corpus>, pairs_per_class: usize, image_size: usize) -> Self {
        Self {
            sampler:      PairSampler::new(corpus, pairs_per_class),
            preprocessor: ImagePreprocessor::new(image_size),
            augmenter:    Some(Augmenter::new(image_size)),
        }
    }

    pub fn validation(corpus: Arc<Corpus>, pairs_per_class: usize, image_size: usize) -> Self {
        Self {
            sampler:      PairSampler::new(corpus, pairs_per_class),
            preprocessor: ImagePreprocessor::new(image_size),
            augmenter:    None,
        }
    }

    pub fn sampler(&self) -> &PairSampler {
        &self.sampler
    }

    /// Draw and decode one pair, surfacing a decode failure to the caller.
    pub fn try_get<R: Rng>(&self, rng: &mut R) -> Result<PairItem> {
        let pair = self.sampler.sample(rng);

        let mut image_a = load_image(&pair.first.path)?;
        let mut image_b = load_image(&pair.second.path)?;

        if let Some(aug) = &self.augmenter {
            image_a = aug.apply(&image_a, rng)?;
            image_b = aug.apply(&image_b, rng)?;
        }

        Ok(PairItem {
            image_a:    self.preprocessor.prepare(&image_a).data,
            image_b:    self.preprocessor.prepare(&image_b).data,
            label:      pair.label.as_f32(),
            image_size: self.preprocessor.image_size(),
        })
    }
}

impl Dataset<PairItem> for PairDataset {
    /// `None` past `len()` ends the epoch. Within range a failed decode
    /// redraws a new pair, and the run aborts only when
    /// MAX_DECODE_ATTEMPTS consecutive draws all fail.
    fn get(&self, index: usize) -> Option<PairItem> {
        if index >= self.len() {
            return None;
        }

        let mut rng = rand::thread_rng();
        let mut last_error = None;

        for attempt in 1..=MAX_DECODE_ATTEMPTS {
            match self.try_get(&mut rng) {
                Ok(item) => return Some(item),
                Err(e) => {
                    tracing::warn!("Pair draw {}/{} failed: {}", attempt, MAX_DECODE_ATTEMPTS, e);
                    last_error = Some(e);
                }
            }
        }

        panic!(
            "{MAX_DECODE_ATTEMPTS} consecutive pair draws failed to decode, last error: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        );
    }

    fn len(&self) -> usize {
        self.sampler.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::FaceVerifyError;
    use crate::domain::identity::IdentityClass;
    use image::{Rgb, RgbImage};
    use rand::{rngs::StdRng, SeedableRng};
    use std::{fs, path::PathBuf};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "face_verify_dataset_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &PathBuf, shade: u8) {
        RgbImage::from_pixel(24, 24, Rgb([shade, 255 - shade, shade / 2]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_items_have_expected_shape() {
        let root = scratch_dir("shape");
        let a = root.join("a.png");
        let b = root.join("b.png");
        write_png(&a, 10);
        write_png(&b, 200);

        let corpus = Corpus::new(
            &root,
            vec![IdentityClass::new("x", vec![a]), IdentityClass::new("y", vec![b])],
        )
        .unwrap();
        let train = PairDataset::train(Arc::new(corpus.clone()), 3, 32);
        let val   = PairDataset::validation(Arc::new(corpus), 3, 32);
        assert!(train.augmenter.is_some());
        assert!(val.augmenter.is_none());
        assert_eq!(train.len(), 6);

        let item = val.get(0).unwrap();
        assert_eq!(item.image_a.len(), 3 * 32 * 32);
        assert_eq!(item.image_b.len(), 3 * 32 * 32);
        assert!(item.label == 0.0 || item.label == 1.0);

        let item = train.get(5).unwrap();
        assert_eq!(item.image_size, 32);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_single_worker_loader_stops_after_one_epoch() {
        use crate::ml::trainer::build_loader;
        use burn::backend::NdArray;

        let root = scratch_dir("epoch");
        let a = root.join("a.png");
        let b = root.join("b.png");
        write_png(&a, 40);
        write_png(&b, 160);

        let corpus = Corpus::new(
            &root,
            vec![IdentityClass::new("x", vec![a]), IdentityClass::new("y", vec![b])],
        )
        .unwrap();
        let dataset = PairDataset::validation(Arc::new(corpus), 3, 32);
        assert_eq!(dataset.len(), 6);
        assert!(dataset.get(5).is_some());
        assert!(dataset.get(6).is_none());

        let loader  = build_loader::<NdArray>(Default::default(), 2, 0, dataset);
        let batches = loader.iter().take(10).count();
        assert_eq!(batches, 6usize.div_ceil(2));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_undecodable_image_surfaces_from_try_get() {
        let root = scratch_dir("corrupt");
        let bad  = root.join("bad.jpg");
        fs::write(&bad, b"not an image").unwrap();

        let corpus  = Corpus::new(&root, vec![IdentityClass::new("x", vec![bad])]).unwrap();
        let dataset = PairDataset::validation(Arc::new(corpus), 1, 32);
        let mut rng = StdRng::seed_from_u64(0);

        let err = dataset.try_get(&mut rng).unwrap_err();
        assert!(matches!(err, FaceVerifyError::DataIntegrity { .. }));

        fs::remove_dir_all(&root).unwrap();
    }
}

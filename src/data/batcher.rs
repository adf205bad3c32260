// ============================================================
// Layer 4 - Pair Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<PairItem> into
// device tensors.
//
// How batching works here:
//   Input:  N PairItems, each holding two CHW images of 3×S×S
//   Output: PairBatch with
//             images_a, images_b : [N, 3, S, S]
//             labels             : [N]
//
//   The per-item CHW vectors are concatenated in order, so the
//   flat buffer reshapes directly to [N, 3, S, S].
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::PairItem;

// ─── PairBatch ────────────────────────────────────────────────────────────────
/// A batch of labelled pairs ready for `SiameseNetwork::embed_pair`.
#[derive(Debug, Clone)]
pub struct PairBatch<B: Backend> {
    /// First images: [batch_size, 3, image_size, image_size]
    pub images_a: Tensor<B, 4>,

    /// Second images: [batch_size, 3, image_size, image_size]
    pub images_b: Tensor<B, 4>,

    /// 1.0 = same identity, 0.0 = different: [batch_size]
    pub labels: Tensor<B, 1>,
}

// ─── PairBatcher ──────────────────────────────────────────────────────────────
/// Holds the target device so tensors are created where the model lives.
#[derive(Clone, Debug)]
pub struct PairBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> PairBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<PairItem, PairBatch<B>> for PairBatcher<B> {
    fn batch(&self, items: Vec<PairItem>) -> PairBatch<B> {
        let batch_size = items.len();
        let size       = items.first().map(|i| i.image_size).unwrap_or(0);

        // ── Flatten both image columns ───────────────────────────────────────
        let flat_a: Vec<f32> = items.iter().flat_map(|i| i.image_a.iter().copied()).collect();
        let flat_b: Vec<f32> = items.iter().flat_map(|i| i.image_b.iter().copied()).collect();
        let labels: Vec<f32> = items.iter().map(|i| i.label).collect();

        // ── Create tensors ───────────────────────────────────────────────────
        let shape = [batch_size, 3, size, size];

        let images_a = Tensor::<B, 4>::from_data(TensorData::new(flat_a, shape), &self.device);
        let images_b = Tensor::<B, 4>::from_data(TensorData::new(flat_b, shape), &self.device);
        let labels   = Tensor::<B, 1>::from_data(TensorData::new(labels, [batch_size]), &self.device);

        PairBatch { images_a, images_b, labels }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_batch_shapes_and_order() {
        let size  = 4;
        let numel = 3 * size * size;
        let items = vec![
            PairItem { image_a: vec![0.0; numel], image_b: vec![1.0; numel], label: 1.0, image_size: size },
            PairItem { image_a: vec![2.0; numel], image_b: vec![3.0; numel], label: 0.0, image_size: size },
        ];

        let batch = PairBatcher::<NdArray>::new(Default::default()).batch(items);
        assert_eq!(batch.images_a.dims(), [2, 3, 4, 4]);
        assert_eq!(batch.images_b.dims(), [2, 3, 4, 4]);

        let labels = batch.labels.into_data().to_vec::<f32>().unwrap();
        assert_eq!(labels, vec![1.0, 0.0]);

        // Second sample of images_a is all 2.0.
        let a = batch.images_a.into_data().to_vec::<f32>().unwrap();
        assert_eq!(a[numel], 2.0);
    }
}

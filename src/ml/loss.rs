// ============================================================
// Layer 5 - Contrastive Loss
// ============================================================
// For a batch of embedded pairs with distance d and label y:
//
//   L = mean( y · d²  +  (1 − y) · max(0, margin − d)² )
//
//   same identity (y = 1):      pulled together without bound
//   different identity (y = 0): pushed apart until d ≥ margin,
//                               zero gradient beyond it
//
// d is computed as ||a − b + ε||₂ with ε = 1e-6 so the square
// root has a finite gradient when a == b (singleton self-pairs).
//
// Reference: Hadsell, Chopra & LeCun (2006) Dimensionality
//            Reduction by Learning an Invariant Mapping

use burn::prelude::*;

pub const DISTANCE_EPS: f64 = 1e-6;

#[derive(Config, Debug)]
pub struct ContrastiveLossConfig {
    #[config(default = 1.0)]
    pub margin: f64,
}

impl ContrastiveLossConfig {
    pub fn init(&self) -> ContrastiveLoss {
        ContrastiveLoss { margin: self.margin }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContrastiveLoss {
    pub margin: f64,
}

impl ContrastiveLoss {
    /// a, b: [batch, dim], labels: [batch] → scalar loss [1]
    pub fn forward<B: Backend>(
        &self,
        a:      Tensor<B, 2>,
        b:      Tensor<B, 2>,
        labels: Tensor<B, 1>,
    ) -> Tensor<B, 1> {
        contrastive_loss_from_distances(pairwise_distance(a, b), labels, self.margin)
    }
}

/// Per-row Euclidean distance: [batch, dim] × 2 → [batch]
pub fn pairwise_distance<B: Backend>(a: Tensor<B, 2>, b: Tensor<B, 2>) -> Tensor<B, 1> {
    (a - b)
        .add_scalar(DISTANCE_EPS)
        .powf_scalar(2.0)
        .sum_dim(1)
        .sqrt()
        .flatten::<1>(0, 1)
}

pub fn contrastive_loss_from_distances<B: Backend>(
    distances: Tensor<B, 1>,
    labels:    Tensor<B, 1>,
    margin:    f64,
) -> Tensor<B, 1> {
    let positive = labels.clone() * distances.clone().powf_scalar(2.0);
    let negative = labels.neg().add_scalar(1.0)
        * distances.neg().add_scalar(margin).clamp_min(0.0).powf_scalar(2.0);
    (positive + negative).mean()
}

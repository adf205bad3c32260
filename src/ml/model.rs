use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::backbone::{Backbone, ResNet};

/// Norms below this are clamped before dividing.
const NORM_EPS: f64 = 1e-12;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally. Do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct SiameseNetworkConfig {
    pub backbone: Backbone,
    #[config(default = 128)]
    pub embedding_dim: usize,
    #[config(default = 512)]
    pub hidden_dim: usize,
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl SiameseNetworkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SiameseNetwork<B> {
        let backbone = self.backbone.init(device);
        let fc1      = LinearConfig::new(self.backbone.feature_width(), self.hidden_dim).init(device);
        let fc2      = LinearConfig::new(self.hidden_dim, self.embedding_dim).init(device);
        let dropout  = DropoutConfig::new(self.dropout).init();
        SiameseNetwork { backbone, fc1, dropout, fc2 }
    }
}

/// One embedding network. Both images of a pair go through this same
/// instance, which is what makes the pair branches share weights.
#[derive(Module, Debug)]
pub struct SiameseNetwork<B: Backend> {
    pub backbone: ResNet<B>,
    pub fc1:      Linear<B>,
    pub dropout:  Dropout,
    pub fc2:      Linear<B>,
}

impl<B: Backend> SiameseNetwork<B> {
    /// images: [batch, 3, H, W] → unit-norm embeddings [batch, embedding_dim]
    pub fn embed(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.backbone.forward(images);
        let hidden   = self.dropout.forward(relu(self.fc1.forward(features)));
        l2_normalize(self.fc2.forward(hidden))
    }

    /// `embed` applied to each input in turn; no state crosses branches.
    pub fn embed_pair(
        &self,
        images_a: Tensor<B, 4>,
        images_b: Tensor<B, 4>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        (self.embed(images_a), self.embed(images_b))
    }

    pub fn embedding_dim(&self) -> usize {
        self.fc2.weight.val().dims()[1]
    }
}

/// Row-wise L2 normalisation of a [batch, dim] tensor.
pub fn l2_normalize<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let norm = x.clone().powf_scalar(2.0).sum_dim(1).sqrt().clamp_min(NORM_EPS);
    x / norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn small_net() -> SiameseNetwork<TestBackend> {
        SiameseNetworkConfig::new(Backbone::ResNet18)
            .with_embedding_dim(16)
            .init(&Default::default())
    }

    #[test]
    fn test_embeddings_have_unit_norm() {
        let net = small_net();
        let x   = Tensor::<TestBackend, 4>::random([3, 3, 32, 32], Distribution::Normal(0.0, 1.0), &Default::default());
        let emb = net.embed(x);
        assert_eq!(emb.dims(), [3, 16]);

        let norms = emb.powf_scalar(2.0).sum_dim(1).sqrt().into_data().to_vec::<f32>().unwrap();
        for n in norms {
            assert!((n - 1.0).abs() < 1e-5, "norm {n}");
        }
    }

    #[test]
    fn test_embed_pair_of_identical_inputs_is_identical() {
        let net = small_net();
        let x   = Tensor::<TestBackend, 4>::random([2, 3, 32, 32], Distribution::Normal(0.0, 1.0), &Default::default());

        let (a, b) = net.embed_pair(x.clone(), x.clone());
        let single = net.embed(x);

        let a = a.into_data().to_vec::<f32>().unwrap();
        let b = b.into_data().to_vec::<f32>().unwrap();
        let s = single.into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, s);
    }

    #[test]
    fn test_l2_normalize_zero_row_stays_finite() {
        let x = Tensor::<TestBackend, 2>::zeros([1, 4], &Default::default());
        let y = l2_normalize(x).into_data().to_vec::<f32>().unwrap();
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_embedding_dim_reported_from_weights() {
        assert_eq!(small_net().embedding_dim(), 16);
    }
}

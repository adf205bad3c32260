// ============================================================
// Layer 5 - Convolutional Backbones
// ============================================================
// Residual feature extractors with the classification layer
// removed. Each maps [batch, 3, H, W] to [batch, width] through
// global average pooling:
//
//   resnet18  basic blocks      [2, 2, 2, 2]         width  512
//   resnet50  bottleneck blocks [3, 4, 6, 3] (×4)    width 2048
//
// Layout (both variants):
//   conv 7×7 /2 → BN → ReLU → maxpool 3×3 /2
//   → stage 1 (64)  → stage 2 (128, /2)
//   → stage 3 (256, /2) → stage 4 (512, /2)
//   → adaptive avg pool 1×1 → flatten
//
// The first block of a stage carries the stride and, when the
// shape changes, a 1×1 projection on the skip path.
//
// Reference: He et al. (2016) Deep Residual Learning
//            Burn Book §3 (Building Blocks)

use std::{fmt, str::FromStr};

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};

use crate::domain::error::FaceVerifyError;

const STAGE_CHANNELS: [usize; 4] = [64, 128, 256, 512];
const BOTTLENECK_EXPANSION: usize = 4;

/// Supported feature extractors. Unknown names are rejected when parsed,
/// before any weights are allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backbone {
    ResNet18,
    ResNet50,
}

impl Backbone {
    /// Width of the pooled feature vector.
    pub fn feature_width(self) -> usize {
        match self {
            Backbone::ResNet18 => 512,
            Backbone::ResNet50 => 512 * BOTTLENECK_EXPANSION,
        }
    }

    fn stage_depths(self) -> [usize; 4] {
        match self {
            Backbone::ResNet18 => [2, 2, 2, 2],
            Backbone::ResNet50 => [3, 4, 6, 3],
        }
    }

    fn is_bottleneck(self) -> bool {
        matches!(self, Backbone::ResNet50)
    }

    pub fn init<B: Backend>(self, device: &B::Device) -> ResNet<B> {
        let expansion = if self.is_bottleneck() { BOTTLENECK_EXPANSION } else { 1 };

        let mut blocks   = Vec::new();
        let mut in_chans = 64;
        for (stage, (&chans, &depth)) in STAGE_CHANNELS.iter().zip(self.stage_depths().iter()).enumerate() {
            let stage_stride = if stage == 0 { 1 } else { 2 };
            for i in 0..depth {
                let stride = if i == 0 { stage_stride } else { 1 };
                let block  = if self.is_bottleneck() {
                    ResidualBlock::bottleneck(in_chans, chans, stride, device)
                } else {
                    ResidualBlock::basic(in_chans, chans, stride, device)
                };
                blocks.push(block);
                in_chans = chans * expansion;
            }
        }

        ResNet {
            conv1: Conv2dConfig::new([3, 64], [7, 7])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_bias(false)
                .init(device),
            bn1: BatchNormConfig::new(64).init(device),
            maxpool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            blocks,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        }
    }
}

impl fmt::Display for Backbone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backbone::ResNet18 => write!(f, "resnet18"),
            Backbone::ResNet50 => write!(f, "resnet50"),
        }
    }
}

impl FromStr for Backbone {
    type Err = FaceVerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resnet18" => Ok(Backbone::ResNet18),
            "resnet50" => Ok(Backbone::ResNet50),
            _          => Err(FaceVerifyError::UnsupportedBackbone(s.to_string())),
        }
    }
}

// ─── Building blocks ──────────────────────────────────────────────────────────

fn conv<B: Backend>(
    in_chans:  usize,
    out_chans: usize,
    kernel:    usize,
    stride:    usize,
    device:    &B::Device,
) -> Conv2d<B> {
    let pad = kernel / 2;
    Conv2dConfig::new([in_chans, out_chans], [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(pad, pad))
        .with_bias(false)
        .init(device)
}

/// 1×1 projection on the skip path when stride or width changes.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn:   BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    fn new(in_chans: usize, out_chans: usize, stride: usize, device: &B::Device) -> Self {
        Self {
            conv: conv(in_chans, out_chans, 1, stride, device),
            bn:   BatchNormConfig::new(out_chans).init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Basic block (two 3×3 convs) or, with `conv3` present, a bottleneck
/// block (1×1 reduce, 3×3, 1×1 expand).
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    conv1:      Conv2d<B>,
    bn1:        BatchNorm<B, 2>,
    conv2:      Conv2d<B>,
    bn2:        BatchNorm<B, 2>,
    conv3:      Option<Conv2d<B>>,
    bn3:        Option<BatchNorm<B, 2>>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> ResidualBlock<B> {
    fn basic(in_chans: usize, chans: usize, stride: usize, device: &B::Device) -> Self {
        let downsample = (stride != 1 || in_chans != chans)
            .then(|| Downsample::new(in_chans, chans, stride, device));
        Self {
            conv1: conv(in_chans, chans, 3, stride, device),
            bn1:   BatchNormConfig::new(chans).init(device),
            conv2: conv(chans, chans, 3, 1, device),
            bn2:   BatchNormConfig::new(chans).init(device),
            conv3: None,
            bn3:   None,
            downsample,
        }
    }

    fn bottleneck(in_chans: usize, chans: usize, stride: usize, device: &B::Device) -> Self {
        let out_chans  = chans * BOTTLENECK_EXPANSION;
        let downsample = (stride != 1 || in_chans != out_chans)
            .then(|| Downsample::new(in_chans, out_chans, stride, device));
        Self {
            conv1: conv(in_chans, chans, 1, 1, device),
            bn1:   BatchNormConfig::new(chans).init(device),
            conv2: conv(chans, chans, 3, stride, device),
            bn2:   BatchNormConfig::new(chans).init(device),
            conv3: Some(conv(chans, out_chans, 1, 1, device)),
            bn3:   Some(BatchNormConfig::new(out_chans).init(device)),
            downsample,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(ds) => ds.forward(x.clone()),
            None     => x.clone(),
        };

        let mut out = relu(self.bn1.forward(self.conv1.forward(x)));
        out = self.bn2.forward(self.conv2.forward(out));
        if let (Some(conv3), Some(bn3)) = (&self.conv3, &self.bn3) {
            out = bn3.forward(conv3.forward(relu(out)));
        }

        relu(out + identity)
    }
}

#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    conv1:   Conv2d<B>,
    bn1:     BatchNorm<B, 2>,
    maxpool: MaxPool2d,
    blocks:  Vec<ResidualBlock<B>>,
    avgpool: AdaptiveAvgPool2d,
}

impl<B: Backend> ResNet<B> {
    /// [batch, 3, H, W] → [batch, feature_width]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.bn1.forward(self.conv1.forward(images)));
        let mut x = self.maxpool.forward(x);
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.avgpool.forward(x).flatten::<2>(1, 3)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_parse_backbone_names() {
        assert_eq!("resnet18".parse::<Backbone>().unwrap(), Backbone::ResNet18);
        assert_eq!("ResNet50".parse::<Backbone>().unwrap(), Backbone::ResNet50);

        let err = "vgg16".parse::<Backbone>().unwrap_err();
        assert!(matches!(err, FaceVerifyError::UnsupportedBackbone(ref name) if name == "vgg16"));
        assert!(err.is_fatal_config());
    }

    #[test]
    fn test_feature_widths() {
        assert_eq!(Backbone::ResNet18.feature_width(), 512);
        assert_eq!(Backbone::ResNet50.feature_width(), 2048);
        assert_eq!(Backbone::ResNet18.to_string(), "resnet18");
    }

    #[test]
    fn test_resnet18_output_shape() {
        let device = Default::default();
        let net    = Backbone::ResNet18.init::<TestBackend>(&device);
        let x      = Tensor::<TestBackend, 4>::random([2, 3, 32, 32], burn::tensor::Distribution::Default, &device);
        assert_eq!(net.forward(x).dims(), [2, 512]);
    }

    #[test]
    fn test_resnet50_output_shape() {
        let device = Default::default();
        let net    = Backbone::ResNet50.init::<TestBackend>(&device);
        let x      = Tensor::<TestBackend, 4>::random([1, 3, 32, 32], burn::tensor::Distribution::Default, &device);
        assert_eq!(net.forward(x).dims(), [1, 2048]);
    }
}

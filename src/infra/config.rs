// ============================================================
// Layer 6 - Application Configuration
// ============================================================
// All knobs for training and serving, read from a TOML file:
//
//   [model]     path, embedding_dim, backbone, device, dropout
//   [training]  epochs, batch_size, learning_rate, margin, ...
//   [data]      train_dir, val_dir, image_size, num_workers, ...
//   [serving]   similarity_threshold
//
// Every key has a default, so an empty file (or no file at all)
// yields a runnable configuration. CLI flags are applied on top
// by the presentation layer.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::domain::error::{FaceVerifyError, Result};
use crate::ml::backbone::Backbone;
use crate::ml::backend::DeviceKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model:    ModelSection,
    pub training: TrainingSection,
    pub data:     DataSection,
    pub serving:  ServingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// Checkpoint for the lowest validation loss; the best-accuracy
    /// checkpoint is written next to it with a `_best_acc` suffix.
    pub path:          PathBuf,
    pub embedding_dim: usize,
    /// Kept as text so an unknown name is reported as a configuration
    /// error when the network is built, not as a TOML parse error.
    pub backbone:      String,
    pub device:        DeviceKind,
    pub dropout:       f64,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            path:          PathBuf::from("models/siamese.ckpt"),
            embedding_dim: 128,
            backbone:      "resnet50".to_string(),
            device:        DeviceKind::Auto,
            dropout:       0.5,
        }
    }
}

impl ModelSection {
    pub fn backbone(&self) -> Result<Backbone> {
        self.backbone.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    pub epochs:        usize,
    pub batch_size:    usize,
    pub learning_rate: f64,
    /// Contrastive margin
    pub margin:        f64,
    pub weight_decay:  f64,
    pub lr_patience:   usize,
    pub lr_factor:     f64,
    /// Threshold sweep resolution for calibration
    pub calibration_steps: usize,
    /// Where metrics.csv is written
    pub log_dir:       PathBuf,
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            epochs:            100,
            batch_size:        32,
            learning_rate:     1e-3,
            margin:            1.0,
            weight_decay:      1e-4,
            lr_patience:       5,
            lr_factor:         0.5,
            calibration_steps: 100,
            log_dir:           PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub train_dir:       PathBuf,
    pub val_dir:         PathBuf,
    pub image_size:      usize,
    pub num_workers:     usize,
    pub pairs_per_class: usize,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            train_dir:       PathBuf::from("data/train"),
            val_dir:         PathBuf::from("data/val"),
            image_size:      160,
            num_workers:     4,
            pairs_per_class: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingSection {
    /// Default for the similarity rule when the caller passes none
    pub similarity_threshold: f64,
}

impl Default for ServingSection {
    fn default() -> Self {
        Self { similarity_threshold: 0.7 }
    }
}

impl AppConfig {
    /// Load from `path`. A missing file falls back to defaults with a
    /// warning; a malformed file is a configuration error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        if !path.exists() {
            tracing::warn!("Config file '{}' not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)?;
        let cfg = Self::from_toml(&text)
            .map_err(|e| FaceVerifyError::Configuration(format!("{}: {e}", path.display())))?;
        tracing::debug!("Loaded configuration from '{}'", path.display());
        Ok(cfg)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text)
            .map_err(|e| FaceVerifyError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(FaceVerifyError::Configuration(msg.to_string()));

        self.model.backbone()?;
        if self.model.embedding_dim == 0 {
            return fail("model.embedding_dim must be positive");
        }
        if !(0.0..1.0).contains(&self.model.dropout) {
            return fail("model.dropout must be in [0, 1)");
        }
        if self.training.epochs == 0 {
            return fail("training.epochs must be positive");
        }
        if self.training.batch_size == 0 {
            return fail("training.batch_size must be positive");
        }
        if self.training.learning_rate <= 0.0 {
            return fail("training.learning_rate must be positive");
        }
        if self.training.margin <= 0.0 {
            return fail("training.margin must be positive");
        }
        if self.training.weight_decay < 0.0 {
            return fail("training.weight_decay must not be negative");
        }
        if !(0.0..1.0).contains(&self.training.lr_factor) || self.training.lr_factor == 0.0 {
            return fail("training.lr_factor must be in (0, 1)");
        }
        if self.training.calibration_steps == 0 {
            return fail("training.calibration_steps must be positive");
        }
        // ResNet downsamples by 32.
        if self.data.image_size < 32 {
            return fail("data.image_size must be at least 32");
        }
        if self.data.pairs_per_class == 0 {
            return fail("data.pairs_per_class must be positive");
        }
        Ok(())
    }

    /// Path of the best-accuracy checkpoint: `models/siamese.ckpt` →
    /// `models/siamese_best_acc.ckpt`.
    pub fn best_accuracy_path(&self) -> PathBuf {
        let path = &self.model.path;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model");
        let file = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}_best_acc.{ext}"),
            None      => format!("{stem}_best_acc"),
        };
        path.with_file_name(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.model.embedding_dim, 128);
        assert_eq!(cfg.model.backbone().unwrap(), Backbone::ResNet50);
        assert_eq!(cfg.training.margin, 1.0);
        assert_eq!(cfg.training.lr_patience, 5);
        assert_eq!(cfg.data.image_size, 160);
        assert_eq!(cfg.data.pairs_per_class, 100);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_bundled_config_file_matches_defaults() {
        let cfg = AppConfig::from_toml(include_str!("../../config.toml")).unwrap();
        let def = AppConfig::default();
        assert_eq!(cfg.model.path, def.model.path);
        assert_eq!(cfg.model.device, DeviceKind::Auto);
        assert_eq!(cfg.training.learning_rate, def.training.learning_rate);
        assert_eq!(cfg.training.weight_decay, def.training.weight_decay);
        assert_eq!(cfg.data.val_dir, def.data.val_dir);
        assert_eq!(cfg.serving.similarity_threshold, 0.7);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [model]
            backbone = "resnet18"
            device = "cpu"

            [training]
            epochs = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.model.backbone().unwrap(), Backbone::ResNet18);
        assert_eq!(cfg.model.device, DeviceKind::Cpu);
        assert_eq!(cfg.training.epochs, 3);
        assert_eq!(cfg.training.batch_size, 32);
    }

    #[test]
    fn test_unknown_backbone_is_configuration_error() {
        let err = AppConfig::from_toml("[model]\nbackbone = \"vgg16\"\n").unwrap_err();
        assert!(matches!(err, FaceVerifyError::UnsupportedBackbone(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AppConfig::from_toml("[training]\nbatch_size = 0\n").is_err());
        assert!(AppConfig::from_toml("[training]\nmargin = -1.0\n").is_err());
        assert!(AppConfig::from_toml("[data]\nimage_size = 8\n").is_err());
        assert!(AppConfig::from_toml("not toml at all [").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("face_verify_no_such_config.toml");
        let cfg = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.training.epochs, 100);
    }

    #[test]
    fn test_best_accuracy_path() {
        let mut cfg = AppConfig::default();
        assert_eq!(cfg.best_accuracy_path(), PathBuf::from("models/siamese_best_acc.ckpt"));
        cfg.model.path = PathBuf::from("out/net");
        assert_eq!(cfg.best_accuracy_path(), PathBuf::from("out/net_best_acc"));
    }
}

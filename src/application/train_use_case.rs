// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Apply CLI overrides, validate   (Layer 6 - infra)
//   Step 2: Build the network config        (Layer 5 - ml)
//   Step 3: Scan train/ and val/ corpora    (Layer 4 - data)
//   Step 4: Build pair datasets             (Layer 4 - data)
//   Step 5: Checkpoint manager + metrics    (Layer 6 - infra)
//   Step 6: Resolve the compute backend     (Layer 5 - ml)
//   Step 7: Run training loop               (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};

use crate::data::{dataset::PairDataset, loader::IdentityFolderLoader};
use crate::domain::identity::Corpus;
use crate::domain::traits::IdentitySource;
use crate::infra::{checkpoint::CheckpointManager, config::AppConfig, metrics::MetricsLogger};
use crate::ml::backend::{CpuAutodiff, ResolvedDevice};
use crate::ml::model::SiameseNetworkConfig;
use crate::ml::trainer::{run_training, TrainingSummary};

// ─── Overrides ────────────────────────────────────────────────────────────────
// Values given on the command line win over the config file.
#[derive(Debug, Clone, Default)]
pub struct TrainOverrides {
    pub epochs:        Option<usize>,
    pub batch_size:    Option<usize>,
    pub learning_rate: Option<f64>,
    pub train_dir:     Option<PathBuf>,
    pub val_dir:       Option<PathBuf>,
    pub model_path:    Option<PathBuf>,
}

impl TrainOverrides {
    pub fn apply(self, cfg: &mut AppConfig) {
        if let Some(v) = self.epochs        { cfg.training.epochs = v; }
        if let Some(v) = self.batch_size    { cfg.training.batch_size = v; }
        if let Some(v) = self.learning_rate { cfg.training.learning_rate = v; }
        if let Some(v) = self.train_dir     { cfg.data.train_dir = v; }
        if let Some(v) = self.val_dir       { cfg.data.val_dir = v; }
        if let Some(v) = self.model_path    { cfg.model.path = v; }
    }
}

/// Network architecture described by `[model]`.
pub fn network_config(cfg: &AppConfig) -> Result<SiameseNetworkConfig> {
    let backbone = cfg.model.backbone().context("Invalid [model] section")?;
    Ok(SiameseNetworkConfig::new(backbone)
        .with_embedding_dim(cfg.model.embedding_dim)
        .with_dropout(cfg.model.dropout))
}

/// Scan one directory-per-identity corpus.
pub fn load_corpus(dir: &std::path::Path) -> Result<Arc<Corpus>> {
    let corpus = IdentityFolderLoader::new(dir)
        .load_corpus()
        .with_context(|| format!("Cannot load identity corpus from '{}'", dir.display()))?;
    tracing::info!(
        "Corpus '{}': {} identities, {} images",
        dir.display(),
        corpus.num_classes(),
        corpus.num_images()
    );
    Ok(Arc::new(corpus))
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: AppConfig,
}

impl TrainUseCase {
    pub fn new(mut config: AppConfig, overrides: TrainOverrides) -> Self {
        overrides.apply(&mut config);
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingSummary> {
        let cfg = &self.config;
        cfg.validate().context("Invalid configuration")?;

        // ── Step 2: Architecture ──────────────────────────────────────────────
        let network = network_config(cfg)?;

        // ── Step 3: Corpora ───────────────────────────────────────────────────
        let train_corpus = load_corpus(&cfg.data.train_dir)?;
        let val_corpus   = load_corpus(&cfg.data.val_dir)?;

        // ── Step 4: Pair datasets ─────────────────────────────────────────────
        // Only the training side is augmented.
        let train_dataset =
            PairDataset::train(train_corpus, cfg.data.pairs_per_class, cfg.data.image_size);
        let val_dataset =
            PairDataset::validation(val_corpus, cfg.data.pairs_per_class, cfg.data.image_size);

        // ── Step 5: Checkpoints and metrics ───────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.model.path, cfg.best_accuracy_path());
        let metrics = MetricsLogger::new(&cfg.training.log_dir)
            .with_context(|| format!("Cannot create log dir '{}'", cfg.training.log_dir.display()))?;

        // ── Step 6 + 7: Backend and training loop ─────────────────────────────
        let device = cfg.model.device.resolve()?;
        tracing::info!("Training on {:?} backend", device);

        let summary = match device {
            ResolvedDevice::Cpu => run_training::<CpuAutodiff>(
                cfg,
                &network,
                train_dataset,
                val_dataset,
                &ckpt_manager,
                &metrics,
                burn::backend::ndarray::NdArrayDevice::Cpu,
            )?,
            #[cfg(feature = "wgpu")]
            ResolvedDevice::Accelerator => run_training::<crate::ml::backend::GpuAutodiff>(
                cfg,
                &network,
                train_dataset,
                val_dataset,
                &ckpt_manager,
                &metrics,
                burn::backend::wgpu::WgpuDevice::default(),
            )?,
            #[cfg(not(feature = "wgpu"))]
            ResolvedDevice::Accelerator => {
                anyhow::bail!("accelerator backend is not compiled into this build")
            }
        };

        Ok(summary)
    }
}

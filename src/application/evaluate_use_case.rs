// ============================================================
// Layer 2 - EvaluateUseCase
// ============================================================
// Offline evaluation of a saved checkpoint on the validation
// corpus:
//
//   Step 1: Load checkpoint (architecture + weights + metadata)
//   Step 2: Draw validation pairs, embed, collect distances
//   Step 3: Recalibrate the threshold on this pass
//   Step 4: Classification report at that threshold
//   Step 5: ROC AUC over similarity scores
//
// Nothing here feeds back into training or serving.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::prelude::Backend;
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::{load_corpus, network_config};
use crate::data::dataset::PairDataset;
use crate::infra::checkpoint::load_checkpoint;
use crate::infra::config::AppConfig;
use crate::ml::backend::{CpuBackend, ResolvedDevice};
use crate::ml::calibration::{calibrate, roc_auc, roc_curve, Calibration, ClassificationReport};
use crate::ml::trainer::{build_loader, validation_pass};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub checkpoint:        PathBuf,
    pub pairs:             usize,
    pub val_loss:          f64,
    pub calibration:       Calibration,
    /// Threshold stored in the checkpoint at training time, if any
    pub stored_threshold:  Option<f64>,
    pub report:            ClassificationReport,
    /// `None` when the drawn pairs contain a single class
    pub roc_auc:           Option<f64>,
}

pub struct EvaluateUseCase {
    config:     AppConfig,
    checkpoint: PathBuf,
}

impl EvaluateUseCase {
    /// `checkpoint` defaults to `model.path`.
    pub fn new(config: AppConfig, checkpoint: Option<PathBuf>) -> Self {
        let checkpoint = checkpoint.unwrap_or_else(|| config.model.path.clone());
        Self { config, checkpoint }
    }

    pub fn execute(&self) -> Result<EvaluationReport> {
        let cfg = &self.config;
        cfg.validate().context("Invalid configuration")?;

        match cfg.model.device.resolve()? {
            ResolvedDevice::Cpu => {
                evaluate::<CpuBackend>(cfg, &self.checkpoint, burn::backend::ndarray::NdArrayDevice::Cpu)
            }
            #[cfg(feature = "wgpu")]
            ResolvedDevice::Accelerator => evaluate::<crate::ml::backend::GpuBackend>(
                cfg,
                &self.checkpoint,
                burn::backend::wgpu::WgpuDevice::default(),
            ),
            #[cfg(not(feature = "wgpu"))]
            ResolvedDevice::Accelerator => {
                anyhow::bail!("accelerator backend is not compiled into this build")
            }
        }
    }
}

fn evaluate<B: Backend>(cfg: &AppConfig, checkpoint: &Path, device: B::Device) -> Result<EvaluationReport> {
    // ── Step 1: Checkpoint ────────────────────────────────────────────────────
    let loaded = load_checkpoint::<B>(checkpoint, &network_config(cfg)?, &device)
        .with_context(|| format!("Cannot load checkpoint '{}'", checkpoint.display()))?;

    // ── Step 2: Validation pass ───────────────────────────────────────────────
    let corpus  = load_corpus(&cfg.data.val_dir)?;
    let image_size = loaded.image_size(cfg.data.image_size);
    let dataset = PairDataset::validation(corpus, cfg.data.pairs_per_class, image_size);
    let loader  = build_loader::<B>(device, cfg.training.batch_size, cfg.data.num_workers, dataset);
    let pass    = validation_pass(&loaded.model, loader.as_ref(), cfg.training.margin)?;
    tracing::info!("Evaluated {} validation pairs", pass.distances.len());

    // ── Step 3-5: Calibration, report, ROC ────────────────────────────────────
    let calibration = calibrate(&pass.distances, &pass.labels, cfg.training.calibration_steps)?;
    let report = ClassificationReport::at(&pass.distances, &pass.labels, calibration.threshold)?;
    let auc = roc_curve(&pass.distances, &pass.labels)?.map(|points| roc_auc(&points));

    let stored_threshold = loaded.metadata.map(|m| m.optimal_threshold);
    if let Some(stored) = stored_threshold {
        tracing::info!(
            "Threshold: stored {:.4}, recalibrated {:.4}",
            stored,
            calibration.threshold
        );
    }

    Ok(EvaluationReport {
        checkpoint: checkpoint.to_path_buf(),
        pairs:      pass.distances.len(),
        val_loss:   pass.loss.mean(),
        calibration,
        stored_threshold,
        report,
        roc_auc:    auc,
    })
}

// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Contrastive training of the Siamese network with Burn's
// DataLoader and Adam.
//
// Per epoch:
//   1. Train       - embed pairs, contrastive loss, backward,
//                    Adam step (weight decay as L2 penalty)
//   2. Validate    - model.valid() (no autodiff, dropout and
//                    batch norm in inference mode), collect every
//                    distance and label
//   3. Calibrate   - threshold sweep over the validation pass
//   4. Schedule    - reduce-on-plateau on validation loss
//   5. Checkpoint  - lowest val_loss and highest val_acc are
//                    tracked and saved independently
//
// Key Burn insight:
//   - Training runs on B (an AutodiffBackend)
//   - model.valid() returns the model on B::InnerBackend
//   - The validation batcher must also use B::InnerBackend
//
// NaN losses are not intercepted: they propagate into the
// metrics and simply never count as an improvement.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::{sync::Arc, time::Instant};

use anyhow::{anyhow, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::{PairBatch, PairBatcher},
    dataset::PairDataset,
};
use crate::infra::checkpoint::{CheckpointManager, CheckpointMetadata};
use crate::infra::config::AppConfig;
use crate::infra::metrics::{format_duration, EpochMetrics, MetricsLogger, RunningAverage};
use crate::ml::calibration::{accuracy_at, calibrate};
use crate::ml::loss::{contrastive_loss_from_distances, pairwise_distance};
use crate::ml::model::{SiameseNetwork, SiameseNetworkConfig};
use crate::ml::scheduler::PlateauScheduler;

/// Distance threshold for the per-batch training accuracy.
const TRAIN_ACCURACY_THRESHOLD: f64 = 0.5;
const LOG_EVERY_BATCHES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub epochs_run:          usize,
    pub best_val_loss:       f64,
    pub best_val_accuracy:   f64,
    /// Threshold calibrated in the epoch with the best accuracy
    pub best_threshold:      f64,
    pub final_learning_rate: f64,
}

fn to_vec_f32<Bk: Backend, const D: usize>(t: Tensor<Bk, D>) -> Result<Vec<f32>> {
    t.into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("cannot read tensor data: {e:?}"))
}

/// Burn DataLoader over a pair dataset. 0 workers loads batches on
/// the calling thread.
pub fn build_loader<Bk: Backend>(
    device:      Bk::Device,
    batch_size:  usize,
    num_workers: usize,
    dataset:     PairDataset,
) -> Arc<dyn DataLoader<PairBatch<Bk>>> {
    let mut builder = DataLoaderBuilder::new(PairBatcher::<Bk>::new(device)).batch_size(batch_size);
    if num_workers > 0 {
        builder = builder.num_workers(num_workers);
    }
    builder.build(dataset)
}

/// Everything a no-gradient pass over a loader produces.
#[derive(Debug, Clone, Default)]
pub struct ValidationPass {
    pub loss:      RunningAverage,
    pub distances: Vec<f32>,
    pub labels:    Vec<f32>,
}

/// Embed every batch with an inference-mode model and collect the
/// per-pair distances, labels and the batch-weighted mean loss.
pub fn validation_pass<Bk: Backend>(
    model:  &SiameseNetwork<Bk>,
    loader: &dyn DataLoader<PairBatch<Bk>>,
    margin: f64,
) -> Result<ValidationPass> {
    let mut pass = ValidationPass::default();

    for batch in loader.iter() {
        let n = batch.labels.dims()[0];

        let (emb_a, emb_b) = model.embed_pair(batch.images_a, batch.images_b);
        let d    = pairwise_distance(emb_a, emb_b);
        let loss = contrastive_loss_from_distances(d.clone(), batch.labels.clone(), margin);

        pass.loss.update(loss.into_scalar().elem::<f64>(), n);
        pass.distances.extend(to_vec_f32(d)?);
        pass.labels.extend(to_vec_f32(batch.labels)?);
    }

    Ok(pass)
}

pub fn run_training<B: AutodiffBackend>(
    cfg:           &AppConfig,
    network:       &SiameseNetworkConfig,
    train_dataset: PairDataset,
    val_dataset:   PairDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
    device:        B::Device,
) -> Result<TrainingSummary> {
    let training = &cfg.training;

    // ── Build model ──────────────────────────────────────────────────────────
    let mut model: SiameseNetwork<B> = network.init(&device);
    tracing::info!(
        "Model ready: {} backbone, {}-d embeddings, {} parameters",
        network.backbone,
        network.embedding_dim,
        model.num_params()
    );

    // ── Adam optimiser with L2 weight decay ──────────────────────────────────
    let optim_cfg = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(training.weight_decay as f32)));
    let mut optim = optim_cfg.init();
    let mut scheduler =
        PlateauScheduler::new(training.learning_rate, training.lr_factor, training.lr_patience);

    // ── Data loaders ─────────────────────────────────────────────────────────
    let train_pairs   = train_dataset.sampler().len();
    let total_batches = train_pairs.div_ceil(training.batch_size);
    let train_loader  = build_loader::<B>(
        device.clone(), training.batch_size, cfg.data.num_workers, train_dataset,
    );
    let val_loader = build_loader::<B::InnerBackend>(
        device.clone(), training.batch_size, cfg.data.num_workers, val_dataset,
    );

    let mut best_val_loss = f64::INFINITY;
    let mut best_val_acc  = 0.0f64;
    let mut best_threshold = 0.0f64;

    // ── Epoch loop ───────────────────────────────────────────────────────────
    for epoch in 1..=training.epochs {
        let started = Instant::now();
        let lr      = scheduler.lr();

        // ── Training phase ───────────────────────────────────────────────────
        let mut train_loss = RunningAverage::default();
        let mut train_acc  = RunningAverage::default();

        for (iteration, batch) in train_loader.iter().enumerate() {
            let n = batch.labels.dims()[0];

            let (emb_a, emb_b) = model.embed_pair(batch.images_a, batch.images_b);
            let distances      = pairwise_distance(emb_a, emb_b);
            let loss = contrastive_loss_from_distances(
                distances.clone(), batch.labels.clone(), training.margin,
            );

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            let acc = accuracy_at(
                &to_vec_f32(distances)?,
                &to_vec_f32(batch.labels)?,
                TRAIN_ACCURACY_THRESHOLD,
            );
            train_loss.update(loss_val, n);
            train_acc.update(acc, n);

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);

            if (iteration + 1) % LOG_EVERY_BATCHES == 0 {
                tracing::info!(
                    "Epoch {:>3} [{:>4}/{}] loss={:.4} acc={:.3}",
                    epoch, iteration + 1, total_batches, train_loss.mean(), train_acc.mean(),
                );
            }
        }

        // ── Validation phase ─────────────────────────────────────────────────
        let model_valid = model.valid();
        let val = validation_pass(&model_valid, val_loader.as_ref(), training.margin)?;

        // ── Calibration + schedule ───────────────────────────────────────────
        let calibration  = calibrate(&val.distances, &val.labels, training.calibration_steps)?;
        let avg_val_loss = val.loss.mean();
        scheduler.step(avg_val_loss);

        let m = EpochMetrics {
            epoch,
            train_loss:    train_loss.mean(),
            train_acc:     train_acc.mean(),
            val_loss:      avg_val_loss,
            val_acc:       calibration.accuracy,
            threshold:     calibration.threshold,
            learning_rate: lr,
            epoch_secs:    started.elapsed().as_secs_f64(),
        };
        metrics.log(&m)?;

        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} | train_acc={:.3} | val_loss={:.4} | \
             val_acc={:.3} | threshold={:.4} | lr={:.2e} | {}",
            epoch, training.epochs, m.train_loss, m.train_acc, m.val_loss,
            m.val_acc, m.threshold, lr, format_duration(started.elapsed()),
        );

        // ── Checkpoints ──────────────────────────────────────────────────────
        let metadata = CheckpointMetadata {
            epoch,
            val_loss:          m.val_loss,
            val_accuracy:      m.val_acc,
            optimal_threshold: m.threshold,
            image_size:        cfg.data.image_size,
        };

        if m.is_loss_improvement(best_val_loss) {
            best_val_loss = m.val_loss;
            ckpt_manager.save_best_loss(&model_valid, network, &metadata)?;
            tracing::info!(
                "New best val_loss {:.4}, saved '{}'",
                best_val_loss,
                ckpt_manager.best_loss_path().display()
            );
        }

        if m.is_accuracy_improvement(best_val_acc) {
            best_val_acc   = m.val_acc;
            best_threshold = m.threshold;
            ckpt_manager.save_best_accuracy(&model_valid, network, &metadata)?;
            tracing::info!(
                "New best val_acc {:.3}, saved '{}'",
                best_val_acc,
                ckpt_manager.best_accuracy_path().display()
            );
        }
    }

    tracing::info!("Training complete!");
    Ok(TrainingSummary {
        epochs_run:          training.epochs,
        best_val_loss,
        best_val_accuracy:   best_val_acc,
        best_threshold,
        final_learning_rate: scheduler.lr(),
    })
}

// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Saves and restores network weights together with the metadata
// of the epoch that produced them.
//
// File layout:
//   bytes 0..8   magic "FVCKPT02"
//   bytes 8..    bincode envelope {
//                  network:  Option<SiameseNetworkConfig>,
//                  metadata: Option<CheckpointMetadata>,
//                  weights:  Vec<u8>   (Burn named MessagePack record)
//                }
//
// A file WITHOUT the magic is a legacy checkpoint: raw record
// bytes only. It loads with empty metadata. "FVCKPT01" envelopes
// predate the stored image size and are rejected.
//
// Two files are maintained during training:
//   models/siamese.ckpt           ← lowest validation loss
//   models/siamese_best_acc.ckpt  ← highest validation accuracy
//
// Writes are atomic by replacement: the envelope is built in
// memory, written to "<path>.tmp", then renamed over the target.
// A reader never sees a half-written checkpoint.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
};
use serde::{Deserialize, Serialize};

use crate::domain::error::{FaceVerifyError, Result};
use crate::ml::model::{SiameseNetwork, SiameseNetworkConfig};

const MAGIC: &[u8; 8] = b"FVCKPT02";
const MAGIC_FAMILY: &[u8; 6] = b"FVCKPT";

/// Facts about the epoch a checkpoint was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub epoch:             usize,
    pub val_loss:          f64,
    pub val_accuracy:      f64,
    /// Distance threshold calibrated on the validation pass
    pub optimal_threshold: f64,
    /// Side length the network was trained on
    pub image_size:        usize,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    network:  Option<SiameseNetworkConfig>,
    metadata: Option<CheckpointMetadata>,
    weights:  Vec<u8>,
}

/// A restored network plus whatever metadata the file carried.
#[derive(Debug)]
pub struct LoadedCheckpoint<B: Backend> {
    pub model:    SiameseNetwork<B>,
    pub network:  SiameseNetworkConfig,
    pub metadata: Option<CheckpointMetadata>,
}

impl<B: Backend> LoadedCheckpoint<B> {
    /// Training resolution from the metadata; `fallback` for legacy files.
    pub fn image_size(&self, fallback: usize) -> usize {
        match self.metadata {
            Some(m) if m.image_size != fallback => {
                tracing::warn!(
                    "Checkpoint was trained at {}px, ignoring configured {}px",
                    m.image_size,
                    fallback
                );
                m.image_size
            }
            Some(m) => m.image_size,
            None    => fallback,
        }
    }
}

fn recorder() -> NamedMpkBytesRecorder<FullPrecisionSettings> {
    NamedMpkBytesRecorder::<FullPrecisionSettings>::default()
}

fn checkpoint_err(path: &Path, what: &str, e: impl std::fmt::Debug) -> FaceVerifyError {
    FaceVerifyError::Checkpoint(format!("{what} '{}': {e:?}", path.display()))
}

/// Manages the two "best" checkpoints of a training run.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    best_loss_path:     PathBuf,
    best_accuracy_path: PathBuf,
}

impl CheckpointManager {
    pub fn new(best_loss_path: impl Into<PathBuf>, best_accuracy_path: impl Into<PathBuf>) -> Self {
        Self {
            best_loss_path:     best_loss_path.into(),
            best_accuracy_path: best_accuracy_path.into(),
        }
    }

    pub fn best_loss_path(&self) -> &Path {
        &self.best_loss_path
    }

    pub fn best_accuracy_path(&self) -> &Path {
        &self.best_accuracy_path
    }

    pub fn save_best_loss<B: Backend>(
        &self,
        model:    &SiameseNetwork<B>,
        network:  &SiameseNetworkConfig,
        metadata: &CheckpointMetadata,
    ) -> Result<()> {
        save_checkpoint(&self.best_loss_path, model, network, metadata)
    }

    pub fn save_best_accuracy<B: Backend>(
        &self,
        model:    &SiameseNetwork<B>,
        network:  &SiameseNetworkConfig,
        metadata: &CheckpointMetadata,
    ) -> Result<()> {
        save_checkpoint(&self.best_accuracy_path, model, network, metadata)
    }
}

/// Serialise `model` with its architecture and metadata, then atomically
/// replace `path`.
pub fn save_checkpoint<B: Backend>(
    path:     &Path,
    model:    &SiameseNetwork<B>,
    network:  &SiameseNetworkConfig,
    metadata: &CheckpointMetadata,
) -> Result<()> {
    let weights = Recorder::<B>::record(&recorder(), model.clone().into_record(), ())
        .map_err(|e| checkpoint_err(path, "cannot serialise weights for", e))?;

    let envelope = Envelope {
        network:  Some(network.clone()),
        metadata: Some(*metadata),
        weights,
    };
    let body = bincode::serialize(&envelope)
        .map_err(|e| checkpoint_err(path, "cannot encode", e))?;

    let mut bytes = Vec::with_capacity(MAGIC.len() + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&body);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp: OsString = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;

    tracing::debug!(
        "Saved checkpoint '{}' (epoch {}, {} bytes)",
        path.display(),
        metadata.epoch,
        bytes.len()
    );
    Ok(())
}

/// Restore a network from `path`. The architecture stored in the file
/// wins; `fallback` is used for legacy files that carry none.
pub fn load_checkpoint<B: Backend>(
    path:     &Path,
    fallback: &SiameseNetworkConfig,
    device:   &B::Device,
) -> Result<LoadedCheckpoint<B>> {
    if !path.exists() {
        return Err(FaceVerifyError::CheckpointNotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path)?;

    let (network, metadata, weights) = match bytes.strip_prefix(MAGIC.as_slice()) {
        Some(body) => {
            let env: Envelope = bincode::deserialize(body)
                .map_err(|e| checkpoint_err(path, "corrupt checkpoint", e))?;
            (env.network.unwrap_or_else(|| fallback.clone()), env.metadata, env.weights)
        }
        None if bytes.starts_with(MAGIC_FAMILY) => {
            return Err(checkpoint_err(
                path,
                "unsupported checkpoint version in",
                String::from_utf8_lossy(&bytes[..MAGIC.len().min(bytes.len())]),
            ));
        }
        None => {
            tracing::warn!("'{}' is a legacy checkpoint without metadata", path.display());
            (fallback.clone(), None, bytes)
        }
    };

    let record = Recorder::<B>::load(&recorder(), weights, device)
        .map_err(|e| checkpoint_err(path, "weights do not match the network in", e))?;
    let model = network.init::<B>(device).load_record(record);

    tracing::info!(
        "Loaded checkpoint '{}' ({} backbone, {}-d embeddings)",
        path.display(),
        network.backbone,
        network.embedding_dim
    );
    Ok(LoadedCheckpoint { model, network, metadata })
}

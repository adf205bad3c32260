// ============================================================
// Layer 2 - Dataset Preparation
// ============================================================
// Two offline chores around the directory-per-identity layout:
//
//   split   - copy <source>/<identity>/<image> into
//             <output>/train/<identity>/ and <output>/val/<identity>/
//             (shuffled, training share floored per identity).
//             Images that fail to decode or are smaller than
//             min_size on either side are skipped.
//
//   analyze - per split: identities, images, and the spread of
//             images per identity (class imbalance).
//
// Copied files are renamed `<identity>_001.<ext>` (train) and
// `<identity>_val_001.<ext>` (val); the extension is kept.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::loader::list_images;
use crate::data::preprocessor::load_image;
use crate::data::splitter::split_train_val;

pub const DEFAULT_TRAIN_RATIO: f64 = 0.8;
pub const DEFAULT_MIN_SIZE: u32 = 160;

#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub source:      PathBuf,
    pub output:      PathBuf,
    pub train_ratio: f64,
    pub min_size:    u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub identities:   usize,
    pub train_images: usize,
    pub val_images:   usize,
    /// Undecodable or undersized
    pub skipped:      usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitStats {
    pub split:      String,
    pub identities: usize,
    pub images:     usize,
    pub per_identity: Vec<(String, usize)>,
    pub min_images: usize,
    pub max_images: usize,
}

impl SplitStats {
    pub fn is_balanced(&self) -> bool {
        self.min_images == self.max_images
    }
}

/// Identity directories of `root`, sorted by name.
fn identity_dirs(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("Cannot read '{}'", root.display()))? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            dirs.push((name.to_string(), path.clone()));
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn is_usable(path: &Path, min_size: u32) -> bool {
    match load_image(path) {
        Ok(img) if img.width() >= min_size && img.height() >= min_size => true,
        Ok(img) => {
            tracing::warn!(
                "Skipping '{}': {}x{} is below {}x{}",
                path.display(), img.width(), img.height(), min_size, min_size
            );
            false
        }
        Err(e) => {
            tracing::warn!("Skipping '{}': {}", path.display(), e);
            false
        }
    }
}

/// No directory is created for an empty slice.
fn copy_all(images: &[PathBuf], dest: &Path, prefix: &str) -> Result<usize> {
    if images.is_empty() {
        return Ok(0);
    }
    fs::create_dir_all(dest)?;
    for (i, src) in images.iter().enumerate() {
        let ext  = src.extension().and_then(|e| e.to_str()).unwrap_or("jpg");
        let file = dest.join(format!("{prefix}_{:03}.{ext}", i + 1));
        fs::copy(src, &file)
            .with_context(|| format!("Cannot copy '{}' to '{}'", src.display(), file.display()))?;
    }
    Ok(images.len())
}

pub fn split_dataset(opts: &SplitOptions) -> Result<SplitSummary> {
    if !opts.source.is_dir() {
        bail!("Source directory '{}' does not exist", opts.source.display());
    }
    if !(0.0..=1.0).contains(&opts.train_ratio) {
        bail!("train ratio must be in [0, 1], got {}", opts.train_ratio);
    }

    let train_root = opts.output.join("train");
    let val_root   = opts.output.join("val");
    let mut summary = SplitSummary::default();

    for (name, dir) in identity_dirs(&opts.source)? {
        let images = list_images(&dir)?;
        let total  = images.len();
        let usable: Vec<PathBuf> = images.into_iter().filter(|p| is_usable(p, opts.min_size)).collect();
        summary.skipped += total - usable.len();

        if usable.is_empty() {
            tracing::warn!("No usable images for '{}'", name);
            continue;
        }

        let (train, val) = split_train_val(usable, opts.train_ratio);
        summary.train_images += copy_all(&train, &train_root.join(&name), &name)?;
        summary.val_images   += copy_all(&val, &val_root.join(&name), &format!("{name}_val"))?;
        summary.identities   += 1;

        tracing::info!("{}: {} train, {} val", name, train.len(), val.len());
    }

    tracing::info!(
        "Split {} identities: {} train, {} val, {} skipped",
        summary.identities, summary.train_images, summary.val_images, summary.skipped
    );
    Ok(summary)
}

/// Statistics for `<root>/train` and `<root>/val`.
pub fn analyze_dataset(root: &Path) -> Result<Vec<SplitStats>> {
    let mut stats = Vec::new();
    for split in ["train", "val"] {
        let dir = root.join(split);
        if !dir.is_dir() {
            bail!("Missing '{}' directory under '{}'", split, root.display());
        }

        let mut per_identity = Vec::new();
        for (name, path) in identity_dirs(&dir)? {
            per_identity.push((name, list_images(&path)?.len()));
        }

        let counts = per_identity.iter().map(|(_, n)| *n);
        stats.push(SplitStats {
            split:        split.to_string(),
            identities:   per_identity.len(),
            images:       counts.clone().sum(),
            min_images:   counts.clone().min().unwrap_or(0),
            max_images:   counts.max().unwrap_or(0),
            per_identity,
        });
    }
    Ok(stats)
}

// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the subcommands and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, BoundingBox, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::application::dataset_use_case::{SplitOptions, DEFAULT_MIN_SIZE, DEFAULT_TRAIN_RATIO};
use crate::application::train_use_case::TrainOverrides;
use crate::application::verify_use_case::FacePairRequest;
use crate::domain::verification::{BoundingBox, DecisionRule};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the Siamese network on a directory-per-identity corpus
    Train(TrainArgs),

    /// Recalibrate and report a checkpoint on the validation corpus
    Evaluate(EvaluateArgs),

    /// Decide whether two images show the same person
    Verify(VerifyArgs),

    /// Print cosine similarity and distance for two images
    Similarity(PairArgs),

    /// Prepare or inspect a dataset
    #[command(subcommand)]
    Dataset(DatasetCommands),
}

/// Flags for `train`. Each one overrides the config file.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Pairs per forward pass
    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Directory with one sub-directory of images per identity
    #[arg(long)]
    pub train_dir: Option<PathBuf>,

    #[arg(long)]
    pub val_dir: Option<PathBuf>,

    /// Where the best-loss checkpoint is written
    #[arg(long)]
    pub model_path: Option<PathBuf>,
}

/// CLI TrainArgs → application-layer overrides.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainOverrides {
    fn from(a: TrainArgs) -> Self {
        TrainOverrides {
            epochs:        a.epochs,
            batch_size:    a.batch_size,
            learning_rate: a.learning_rate,
            train_dir:     a.train_dir,
            val_dir:       a.val_dir,
            model_path:    a.model_path,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Checkpoint to evaluate (defaults to model.path)
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Validation corpus (defaults to data.val_dir)
    #[arg(long)]
    pub val_dir: Option<PathBuf>,
}

/// Two images plus optional face boxes.
#[derive(Args, Debug)]
pub struct PairArgs {
    pub image_a: PathBuf,

    pub image_b: PathBuf,

    /// Face box in the first image as x1,y1,x2,y2 (whole image if omitted)
    #[arg(long)]
    pub bbox_a: Option<BoundingBox>,

    #[arg(long)]
    pub bbox_b: Option<BoundingBox>,

    /// Checkpoint to load (defaults to model.path)
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
}

impl PairArgs {
    pub fn request(&self) -> FacePairRequest {
        FacePairRequest {
            image_a: self.image_a.clone(),
            image_b: self.image_b.clone(),
            bbox_a:  self.bbox_a,
            bbox_b:  self.bbox_b,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum RuleArg {
    /// cosine similarity >= threshold
    #[default]
    Similarity,
    /// euclidean distance < threshold
    Distance,
}

impl From<RuleArg> for DecisionRule {
    fn from(r: RuleArg) -> Self {
        match r {
            RuleArg::Similarity => DecisionRule::Similarity,
            RuleArg::Distance   => DecisionRule::Distance,
        }
    }
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    #[arg(long, value_enum, default_value_t = RuleArg::Similarity)]
    pub rule: RuleArg,

    /// Overrides the rule's default threshold
    #[arg(long)]
    pub threshold: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum DatasetCommands {
    /// Copy a directory-per-identity source into train/ and val/
    Split(SplitArgs),

    /// Identities, image counts and class balance per split
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    #[arg(long)]
    pub source: PathBuf,

    #[arg(long)]
    pub output: PathBuf,

    /// Share of each identity's images that goes to train/ (floored)
    #[arg(long, default_value_t = DEFAULT_TRAIN_RATIO)]
    pub train_ratio: f64,

    /// Smallest accepted width and height in pixels
    #[arg(long, default_value_t = DEFAULT_MIN_SIZE)]
    pub min_size: u32,
}

impl From<SplitArgs> for SplitOptions {
    fn from(a: SplitArgs) -> Self {
        SplitOptions {
            source:      a.source,
            output:      a.output,
            train_ratio: a.train_ratio,
            min_size:    a.min_size,
        }
    }
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Directory holding train/ and val/
    pub dataset: PathBuf,
}

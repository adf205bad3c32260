// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:         the epoch number (1, 2, 3, ...)
//   - train_loss:    mean contrastive loss over training pairs
//   - train_acc:     pair accuracy at the fixed 0.5 threshold
//   - val_loss:      mean contrastive loss over validation pairs
//   - val_acc:       accuracy at the calibrated threshold
//   - threshold:     calibrated distance threshold
//   - learning_rate: rate used during this epoch
//   - epoch_secs:    wall-clock time of the epoch
//
// Output file: <training.log_dir>/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,train_acc,val_loss,val_acc,threshold,learning_rate,epoch_secs
//   1,0.412300,0.612500,0.398100,0.690000,0.842113,0.001000,53.2
//
// How to read the metrics:
//   - val_acc rising while threshold settles → the metric space
//     is separating identities
//   - val_loss rising while train_loss falls → overfitting
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};
use serde::{Deserialize, Serialize};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:         usize,
    pub train_loss:    f64,
    pub train_acc:     f64,
    pub val_loss:      f64,
    pub val_acc:       f64,
    pub threshold:     f64,
    pub learning_rate: f64,
    pub epoch_secs:    f64,
}

impl EpochMetrics {
    /// Strictly lower validation loss than `best_val_loss`.
    pub fn is_loss_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }

    /// Strictly higher validation accuracy than `best_val_acc`.
    pub fn is_accuracy_improvement(&self, best_val_acc: f64) -> bool {
        self.val_acc > best_val_acc
    }
}

/// Mean weighted by the number of samples each update covers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningAverage {
    sum:   f64,
    count: usize,
}

impl RunningAverage {
    pub fn update(&mut self, value: f64, n: usize) {
        self.sum   += value * n as f64;
        self.count += n;
    }

    /// NaN until the first update.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// `1h 02m 03s`, `4m 05s` or `6.7s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

const CSV_HEADER: &str =
    "epoch,train_loss,train_acc,val_loss,val_acc,threshold,learning_rate,epoch_secs";

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so
    /// repeated runs append to one log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6e},{:.1}",
            m.epoch,
            m.train_loss,
            m.train_acc,
            m.val_loss,
            m.val_acc,
            m.threshold,
            m.learning_rate,
            m.epoch_secs,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(epoch: usize, val_loss: f64, val_acc: f64) -> EpochMetrics {
        EpochMetrics {
            epoch,
            train_loss:    0.5,
            train_acc:     0.6,
            val_loss,
            val_acc,
            threshold:     0.8,
            learning_rate: 1e-3,
            epoch_secs:    1.5,
        }
    }

    #[test]
    fn test_improvement_checks_are_strict() {
        let m = metrics(2, 2.3, 0.7);
        assert!(m.is_loss_improvement(3.0));
        assert!(!m.is_loss_improvement(2.3));
        assert!(m.is_loss_improvement(f64::INFINITY));

        assert!(m.is_accuracy_improvement(0.0));
        assert!(!m.is_accuracy_improvement(0.7));
    }

    #[test]
    fn test_running_average_weights_by_batch_size() {
        let mut avg = RunningAverage::default();
        assert!(avg.mean().is_nan());
        avg.update(1.0, 3);
        avg.update(4.0, 1);
        assert!((avg.mean() - 1.75).abs() < 1e-12);
        assert_eq!(avg.count(), 4);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
        assert_eq!(format_duration(Duration::from_secs(245)), "4m 05s");
        assert_eq!(format_duration(Duration::from_millis(6700)), "6.7s");
    }

    #[test]
    fn test_logger_appends_rows_under_one_header() {
        let dir = std::env::temp_dir().join(format!("face_verify_metrics_{}", std::process::id()));
        let _   = fs::remove_dir_all(&dir);

        let logger = MetricsLogger::new(&dir).unwrap();
        logger.log(&metrics(1, 0.4, 0.6)).unwrap();
        let logger = MetricsLogger::new(&dir).unwrap();
        logger.log(&metrics(2, 0.3, 0.7)).unwrap();

        let text  = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[2].starts_with("2,"));

        fs::remove_dir_all(&dir).unwrap();
    }
}

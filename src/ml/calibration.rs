// ============================================================
// Layer 5 - Threshold Calibration & Evaluation Metrics
// ============================================================
// Given the distances and labels accumulated over a validation
// pass, pick the distance threshold with the best accuracy.
//
// Sweep:
//   candidates = linspace(min(d), max(d), steps)
//   predict "same" when d < t
//   keep the FIRST candidate reaching the best accuracy
//
// The sweep starts from (threshold 0, accuracy 0) and only a
// strict improvement replaces the current best, so ties resolve
// to the lowest (strictest) threshold.
//
// ROC / AUC are offline reporting tools: they never feed a live
// decision.

use serde::{Deserialize, Serialize};

use crate::domain::error::{FaceVerifyError, Result};

pub const DEFAULT_CALIBRATION_STEPS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub threshold: f64,
    pub accuracy:  f64,
}

fn check_inputs(distances: &[f32], labels: &[f32]) -> Result<()> {
    if distances.is_empty() {
        return Err(FaceVerifyError::InvalidInput("no distances to calibrate on".to_string()));
    }
    if distances.len() != labels.len() {
        return Err(FaceVerifyError::InvalidInput(format!(
            "{} distances but {} labels",
            distances.len(),
            labels.len()
        )));
    }
    Ok(())
}

fn is_same(label: f32) -> bool {
    label > 0.5
}

/// Fraction of pairs classified correctly with "same" ⇔ `d < threshold`.
pub fn accuracy_at(distances: &[f32], labels: &[f32], threshold: f64) -> f64 {
    if distances.is_empty() {
        return 0.0;
    }
    let correct = distances
        .iter()
        .zip(labels)
        .filter(|&(&d, &y)| ((d as f64) < threshold) == is_same(y))
        .count();
    correct as f64 / distances.len() as f64
}

pub fn calibrate(distances: &[f32], labels: &[f32], steps: usize) -> Result<Calibration> {
    check_inputs(distances, labels)?;

    let min = distances.iter().copied().fold(f32::INFINITY, f32::min) as f64;
    let max = distances.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let steps = steps.max(1);

    let mut best = Calibration { threshold: 0.0, accuracy: 0.0 };
    for i in 0..steps {
        let t = if steps == 1 {
            min
        } else {
            min + (max - min) * i as f64 / (steps - 1) as f64
        };
        let accuracy = accuracy_at(distances, labels, t);
        if accuracy > best.accuracy {
            best = Calibration { threshold: t, accuracy };
        }
    }

    tracing::debug!(
        "Calibrated threshold {:.4} (accuracy {:.4}) over {} pairs",
        best.threshold,
        best.accuracy,
        distances.len()
    );
    Ok(best)
}

// ─── Classification report ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub threshold:       f64,
    pub accuracy:        f64,
    pub precision:       f64,
    pub recall:          f64,
    pub f1:              f64,
    pub true_positives:  usize,
    pub true_negatives:  usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ClassificationReport {
    /// "Positive" means predicted/actual same identity.
    pub fn at(distances: &[f32], labels: &[f32], threshold: f64) -> Result<Self> {
        check_inputs(distances, labels)?;

        let (mut tp, mut tn, mut fp, mut fn_) = (0, 0, 0, 0);
        for (&d, &y) in distances.iter().zip(labels) {
            match ((d as f64) < threshold, is_same(y)) {
                (true,  true)  => tp += 1,
                (false, false) => tn += 1,
                (true,  false) => fp += 1,
                (false, true)  => fn_ += 1,
            }
        }

        let precision = ratio(tp, tp + fp);
        let recall    = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            threshold,
            accuracy: ratio(tp + tn, distances.len()),
            precision,
            recall,
            f1,
            true_positives:  tp,
            true_negatives:  tn,
            false_positives: fp,
            false_negatives: fn_,
        })
    }
}

// ─── ROC ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub false_positive_rate: f64,
    pub true_positive_rate:  f64,
    /// Similarity score at which this point is reached
    pub score_threshold:     f64,
}

/// ROC over similarity scores `1 − d / max(d)`. `None` unless both
/// classes are present.
pub fn roc_curve(distances: &[f32], labels: &[f32]) -> Result<Option<Vec<RocPoint>>> {
    check_inputs(distances, labels)?;

    let positives = labels.iter().filter(|&&y| is_same(y)).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return Ok(None);
    }

    let max = distances.iter().copied().fold(0.0f32, f32::max) as f64;
    let mut scored: Vec<(f64, bool)> = distances
        .iter()
        .zip(labels)
        .map(|(&d, &y)| {
            let score = if max > 0.0 { 1.0 - d as f64 / max } else { 1.0 };
            (score, is_same(y))
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut points = vec![RocPoint {
        false_positive_rate: 0.0,
        true_positive_rate:  0.0,
        score_threshold:     f64::INFINITY,
    }];
    let (mut tp, mut fp) = (0usize, 0usize);
    for (i, &(score, same)) in scored.iter().enumerate() {
        if same { tp += 1 } else { fp += 1 }
        // Emit one point per distinct score.
        let last_of_group = scored.get(i + 1).map_or(true, |next| next.0 != score);
        if last_of_group {
            points.push(RocPoint {
                false_positive_rate: ratio(fp, negatives),
                true_positive_rate:  ratio(tp, positives),
                score_threshold:     score,
            });
        }
    }
    Ok(Some(points))
}

/// Trapezoidal area under a ROC curve.
pub fn roc_auc(points: &[RocPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| {
            let dx = w[1].false_positive_rate - w[0].false_positive_rate;
            dx * (w[1].true_positive_rate + w[0].true_positive_rate) / 2.0
        })
        .sum()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const D: [f32; 4] = [0.1, 0.2, 0.8, 0.9];
    const Y: [f32; 4] = [1.0, 1.0, 0.0, 0.0];

    #[test]
    fn test_separable_distances_calibrate_perfectly() {
        let cal = calibrate(&D, &Y, DEFAULT_CALIBRATION_STEPS).unwrap();
        assert!(cal.threshold > 0.2 && cal.threshold <= 0.8, "threshold {}", cal.threshold);
        assert_eq!(cal.accuracy, 1.0);
    }

    #[test]
    fn test_ties_keep_lowest_threshold() {
        // Every candidate in (0.2, 0.8] scores 1.0; the first one wins.
        let cal  = calibrate(&D, &Y, 100).unwrap();
        let step = (0.9 - 0.1) / 99.0;
        assert!(cal.threshold - 0.2 < step + 1e-6);
    }

    #[test]
    fn test_constant_distances() {
        let cal = calibrate(&[0.5, 0.5], &[1.0, 0.0], 10).unwrap();
        assert_eq!(cal.accuracy, 0.5);
        assert!((cal.threshold - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(calibrate(&[], &[], 100), Err(FaceVerifyError::InvalidInput(_))));
        assert!(matches!(calibrate(&[0.1], &[1.0, 0.0], 100), Err(FaceVerifyError::InvalidInput(_))));
    }

    #[test]
    fn test_accuracy_at_fixed_threshold() {
        assert_eq!(accuracy_at(&D, &Y, 0.5), 1.0);
        assert_eq!(accuracy_at(&D, &Y, 0.0), 0.5);
        assert_eq!(accuracy_at(&[], &[], 0.5), 0.0);
    }

    #[test]
    fn test_classification_report_counts() {
        let r = ClassificationReport::at(&[0.1, 0.3, 0.4, 0.9], &[1.0, 0.0, 1.0, 0.0], 0.35).unwrap();
        assert_eq!((r.true_positives, r.false_positives), (1, 1));
        assert_eq!((r.false_negatives, r.true_negatives), (1, 1));
        assert_eq!(r.precision, 0.5);
        assert_eq!(r.recall, 0.5);
        assert_eq!(r.f1, 0.5);
        assert_eq!(r.accuracy, 0.5);
    }

    #[test]
    fn test_report_zero_division_yields_zero() {
        let r = ClassificationReport::at(&[0.9, 0.8], &[0.0, 0.0], 0.1).unwrap();
        assert_eq!(r.precision, 0.0);
        assert_eq!(r.recall, 0.0);
        assert_eq!(r.f1, 0.0);
        assert_eq!(r.accuracy, 1.0);
    }

    #[test]
    fn test_roc_auc_extremes() {
        let curve = roc_curve(&D, &Y).unwrap().unwrap();
        assert!((roc_auc(&curve) - 1.0).abs() < 1e-9);

        let flipped = [0.0, 0.0, 1.0, 1.0];
        let curve   = roc_curve(&D, &flipped).unwrap().unwrap();
        assert!(roc_auc(&curve).abs() < 1e-9);
    }

    #[test]
    fn test_roc_needs_both_classes() {
        assert!(roc_curve(&D, &[1.0; 4]).unwrap().is_none());
    }
}

// ============================================================
// Layer 3 - Verification Data Contracts
// ============================================================
// Plain result types handed to the serving layer. Two decision
// conventions exist and are inverses of each other:
//
//   distance   rule:  match  <=>  euclidean_distance <  threshold
//   similarity rule:  match  <=>  cosine_similarity  >= threshold
//
// DecisionRule is the only place either comparison is written.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::FaceVerifyError;

/// A face region reported by the external detector, in pixel
/// coordinates: `[x1, y1)` to `[x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

/// Parses `x1,y1,x2,y2`.
impl FromStr for BoundingBox {
    type Err = FaceVerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|e| FaceVerifyError::InvalidInput(format!("bounding box '{s}': {e}")))?;

        match parts.as_slice() {
            [x1, y1, x2, y2] if x2 > x1 && y2 > y1 => {
                Ok(Self { x1: *x1, y1: *y1, x2: *x2, y2: *y2 })
            }
            _ => Err(FaceVerifyError::InvalidInput(format!(
                "bounding box '{s}' must be x1,y1,x2,y2 with x2 > x1 and y2 > y1"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionRule {
    /// Match when the Euclidean distance is strictly below the threshold.
    Distance,
    /// Match when the cosine similarity reaches the threshold.
    Similarity,
}

impl DecisionRule {
    pub fn is_match(self, value: f64, threshold: f64) -> bool {
        match self {
            DecisionRule::Distance   => value < threshold,
            DecisionRule::Similarity => value >= threshold,
        }
    }
}

/// Both metrics for one embedded pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairMeasurement {
    pub cosine_similarity:  f32,
    pub euclidean_distance: f32,
}

/// Similarity-rule decision (`similarity >= threshold`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub similarity_score: f32,
    pub is_match:         bool,
    pub threshold_used:   f64,
}

/// Distance-rule decision (`distance < threshold`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceDecision {
    pub euclidean_distance: f32,
    pub is_match:           bool,
    pub threshold_used:     f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityReport {
    pub cosine_similarity:     f32,
    pub euclidean_distance:    f32,
    /// Cosine similarity mapped from [-1, 1] to [0, 1]
    pub normalized_similarity: f32,
}

impl From<PairMeasurement> for SimilarityReport {
    fn from(m: PairMeasurement) -> Self {
        Self {
            cosine_similarity:     m.cosine_similarity,
            euclidean_distance:    m.euclidean_distance,
            normalized_similarity: (m.cosine_similarity + 1.0) / 2.0,
        }
    }
}

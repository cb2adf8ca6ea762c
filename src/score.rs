//! # Weighted Composite Scorer
//! Pure arithmetic core shared by every scoring profile: a named factor set,
//! a non-negative weight vector, one normalized composite out.
//!
//! Composite = (Σ value × weight) / (Σ weight), rounded to one decimal.
//! Relative weight ratios decide the outcome; absolute magnitudes do not.

use std::collections::BTreeMap;
use std::fmt;

/// Declared value range for a factor. Values outside the range are clamped
/// before aggregation rather than rejected (degraded-but-available).
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FactorRange {
    pub min: f64,
    pub max: f64,
}

impl FactorRange {
    pub const PERCENT: FactorRange = FactorRange {
        min: 0.0,
        max: 100.0,
    };

    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }
}

impl Default for FactorRange {
    fn default() -> Self {
        Self::PERCENT
    }
}

/// Why a composite could not be produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreError {
    /// Every weight is zero (or the vector is empty): invalid configuration,
    /// never a division by zero.
    ZeroTotalWeight,
    /// A factor or weight name the profile does not declare.
    UnknownFactor {
        name: String,
        suggestion: Option<String>,
    },
}

impl fmt::Display for ScoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreError::ZeroTotalWeight => {
                write!(f, "invalid configuration: total weight is zero")
            }
            ScoreError::UnknownFactor { name, suggestion } => match suggestion {
                Some(s) => write!(f, "unknown factor '{name}' (did you mean '{s}'?)"),
                None => write!(f, "unknown factor '{name}'"),
            },
        }
    }
}

impl std::error::Error for ScoreError {}

/// Weighted average of `factors` under `weights`, clamped to `range`.
///
/// Every key in `weights` must have a value in `factors` (callers resolve
/// defaults before getting here). Negative weights are treated as zero.
pub fn composite(
    factors: &BTreeMap<String, f64>,
    weights: &BTreeMap<String, f64>,
    range: FactorRange,
) -> Result<f64, ScoreError> {
    let mut weighted_sum = 0.0_f64;
    let mut total_weight = 0.0_f64;

    for (name, raw_w) in weights {
        let w = raw_w.max(0.0);
        let v = factors.get(name).copied().unwrap_or(range.min);
        weighted_sum += range.clamp(v) * w;
        total_weight += w;
    }

    if total_weight <= 0.0 {
        return Err(ScoreError::ZeroTotalWeight);
    }

    Ok(round1(range.clamp(weighted_sum / total_weight)))
}

/// One decimal place, the precision the score snapshots persist.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Nearest declared name for a typo'd factor, used in validation errors.
/// Only suggests when the edit distance is small relative to the input.
pub fn nearest_name<'a, I>(input: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, &str)> = None;
    for cand in candidates {
        let d = strsim::levenshtein(input, cand);
        if best.map_or(true, |(bd, _)| d < bd) {
            best = Some((d, cand));
        }
    }
    match best {
        Some((d, cand)) if d <= 2 && d < input.chars().count() => Some(cand.to_string()),
        _ => None,
    }
}

//! # Scoring Engine
//! Pure, testable logic that maps `(profile, factors, overrides)` → a score
//! report. No I/O, suitable for unit tests and offline evaluation; the HTTP
//! layer only validates shape and persists the snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::profile::ScoringProfile;
use crate::recommend;
use crate::score::{self, ScoreError};

/// One computed snapshot: always recomputed wholesale, never mutated,
/// timestamped at calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub profile: String,
    pub score: f64,
    pub band: String,
    /// Effective (defaulted + clamped) factor values that produced the score.
    pub factors: BTreeMap<String, f64>,
    pub recommendations: Vec<String>,
    pub calculated_at: DateTime<Utc>,
}

/// Score a factor map through a profile.
///
/// * Unknown factor or override names are rejected (with a nearest-name hint).
/// * Missing factors take the profile's declared default.
/// * Out-of-range values are clamped, not rejected.
/// * `overrides` replaces individual weights for this request only; negative
///   overrides clamp to zero, and an override set that zeroes the whole
///   vector surfaces the invalid-configuration error.
pub fn score_with_profile(
    profile: &ScoringProfile,
    raw_factors: &BTreeMap<String, f64>,
    weight_overrides: Option<&BTreeMap<String, f64>>,
) -> Result<ScoreReport, ScoreError> {
    for name in raw_factors.keys() {
        if !profile.has_factor(name) {
            return Err(unknown(profile, name));
        }
    }

    let mut weights = profile.weights();
    if let Some(overrides) = weight_overrides {
        for (name, w) in overrides {
            if !profile.has_factor(name) {
                return Err(unknown(profile, name));
            }
            weights.insert(name.clone(), w.max(0.0));
        }
    }

    let mut effective = BTreeMap::new();
    for name in profile.factor_names() {
        let value = raw_factors
            .get(name)
            .copied()
            .unwrap_or_else(|| profile.default_for(name));
        effective.insert(name.to_string(), profile.range.clamp(value));
    }

    let composite = score::composite(&effective, &weights, profile.range)?;
    let band = profile.bands.classify(composite).to_string();
    let recommendations =
        recommend::derive(&profile.recommendations, &effective, &band, &profile.bands);

    Ok(ScoreReport {
        profile: profile.name.clone(),
        score: composite,
        band,
        factors: effective,
        recommendations,
        calculated_at: Utc::now(),
    })
}

fn unknown(profile: &ScoringProfile, name: &str) -> ScoreError {
    ScoreError::UnknownFactor {
        name: name.to_string(),
        suggestion: score::nearest_name(name, profile.factor_names()),
    }
}

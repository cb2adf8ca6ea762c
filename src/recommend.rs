//! Recommendation rules: a static `when`/`message` table evaluated against the
//! effective factor values and the assigned band. Plain rule-following, no
//! inference; rules fire in declaration order and the output is deterministic.
//!
//! Conditions (all present ones must hold):
//! - `factor` + `below`:    the named factor's value is < `below`
//! - `factor` + `at_least`: the named factor's value is >= `at_least`
//! - `band_is`:             the assigned band equals the label
//! - `band_at_or_below`:    the band's severity rank is <= the label's rank
//! - `band_at_or_above`:    the band's severity rank is >= the label's rank

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::band::ThresholdTable;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct When {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_least: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band_is: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band_at_or_below: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band_at_or_above: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub when: When,
    pub message: String,
}

/// Evaluate the rule list against effective factors and the assigned band.
pub fn derive(
    rules: &[Rule],
    factors: &BTreeMap<String, f64>,
    band: &str,
    table: &ThresholdTable,
) -> Vec<String> {
    let mut out = Vec::new();
    for rule in rules {
        if matches_when(&rule.when, factors, band, table) {
            out.push(rule.message.clone());
        }
    }
    out
}

fn matches_when(
    w: &When,
    factors: &BTreeMap<String, f64>,
    band: &str,
    table: &ThresholdTable,
) -> bool {
    if let Some(name) = &w.factor {
        let Some(&value) = factors.get(name) else {
            return false;
        };
        if let Some(limit) = w.below {
            if value >= limit {
                return false;
            }
        }
        if let Some(limit) = w.at_least {
            if value < limit {
                return false;
            }
        }
    }
    if let Some(label) = &w.band_is {
        if band != label {
            return false;
        }
    }
    if let Some(label) = &w.band_at_or_below {
        if table.rank(band) > table.rank(label) {
            return false;
        }
    }
    if let Some(label) = &w.band_at_or_above {
        if table.rank(band) < table.rank(label) {
            return false;
        }
    }
    true
}

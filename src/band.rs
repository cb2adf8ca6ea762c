//! # Band Classifier
//! Maps a composite score onto an ordered threshold table. Boundary values
//! belong to the higher band (>= semantics): a 76.0 against the M&A table
//! lands in "Very High", not "High".

use serde::{Deserialize, Serialize};
use std::fmt;

/// One `(lower_bound, label)` entry. Tables list these descending by bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub min: f64,
    pub label: String,
}

/// Descending threshold table plus the floor label assigned below all bounds.
///
/// Validated once at configuration load; classification itself cannot fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    pub thresholds: Vec<Threshold>,
    pub floor: String,
}

/// Malformed table detected at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum TableError {
    Empty,
    NotDescending { at: usize },
    DuplicateLabel { label: String },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::Empty => write!(f, "threshold table has no entries"),
            TableError::NotDescending { at } => {
                write!(f, "threshold bounds must strictly descend (entry {at})")
            }
            TableError::DuplicateLabel { label } => {
                write!(f, "duplicate band label '{label}'")
            }
        }
    }
}

impl std::error::Error for TableError {}

impl ThresholdTable {
    pub fn new(thresholds: Vec<Threshold>, floor: impl Into<String>) -> Result<Self, TableError> {
        let table = Self {
            thresholds,
            floor: floor.into(),
        };
        table.validate()?;
        Ok(table)
    }

    /// Fail fast on non-monotonic or ambiguous tables.
    pub fn validate(&self) -> Result<(), TableError> {
        if self.thresholds.is_empty() {
            return Err(TableError::Empty);
        }
        for (i, pair) in self.thresholds.windows(2).enumerate() {
            if pair[1].min >= pair[0].min {
                return Err(TableError::NotDescending { at: i + 1 });
            }
        }
        let mut seen: Vec<&str> = self.thresholds.iter().map(|t| t.label.as_str()).collect();
        seen.push(self.floor.as_str());
        seen.sort_unstable();
        for pair in seen.windows(2) {
            if pair[0] == pair[1] {
                return Err(TableError::DuplicateLabel {
                    label: pair[0].to_string(),
                });
            }
        }
        Ok(())
    }

    /// First label whose bound is <= `score`; the floor otherwise.
    pub fn classify(&self, score: f64) -> &str {
        for t in &self.thresholds {
            if score >= t.min {
                return &t.label;
            }
        }
        &self.floor
    }

    /// Severity rank of a label: floor is 0, the topmost threshold is highest.
    /// Unknown labels rank 0 (callers validate labels against the table).
    pub fn rank(&self, label: &str) -> usize {
        for (i, t) in self.thresholds.iter().enumerate() {
            if t.label == label {
                return self.thresholds.len() - i;
            }
        }
        0
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.floor == label || self.thresholds.iter().any(|t| t.label == label)
    }
}

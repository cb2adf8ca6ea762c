//! In-memory log of score snapshots: the denormalized "last calculated" view
//! surfaced by the debug endpoints. Company identifiers are stored hashed;
//! raw tenant identifiers never land in logs or diagnostics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

use crate::engine::ScoreReport;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub profile: String,
    /// Short sha2 hash of the company id, or `None` for ad hoc requests.
    pub company_ref: Option<String>,
    pub score: f64,
    pub band: String,
}

#[derive(Debug)]
pub struct History {
    inner: Mutex<Vec<HistoryEntry>>,
    cap: usize,
}

impl History {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::with_capacity(cap.min(10_000))),
            cap: cap.min(10_000),
        }
    }

    pub fn push(&self, report: &ScoreReport, company_id: Option<&str>) {
        let entry = HistoryEntry {
            at: report.calculated_at,
            profile: report.profile.clone(),
            company_ref: company_id.map(anon_ref),
            score: report.score,
            band: report.band.clone(),
        };

        let mut v = self.inner.lock().expect("history mutex poisoned");
        v.push(entry);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<HistoryEntry> {
        let v = self.inner.lock().expect("history mutex poisoned");
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }
}

/// 12-hex-char sha2 prefix of an identifier, for log-safe references.
pub fn anon_ref(id: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

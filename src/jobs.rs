//! # Analysis Job Store
//! One record per background analysis, keyed by a generated identifier, with
//! the status persisted through every transition:
//! `pending → analyzing → completed | failed`.
//!
//! Each job carries a cancellation token; cancelling marks the record failed
//! and the worker bails out at its next checkpoint. Transitions are
//! single-writer under the store mutex; there is no CAS and no retry, a
//! failed analysis is retriggered by the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::engine::ScoreReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Analyzing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub company_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScoreReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cloneable cancellation flag handed to the worker.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }
}

#[derive(Debug)]
struct Entry {
    record: JobRecord,
    token: CancelToken,
}

/// In-process job table. The datastore collaborator stays opaque in this
/// service; everything that would be a relational row lives here.
#[derive(Debug, Default)]
pub struct JobStore {
    inner: Mutex<HashMap<String, Entry>>,
    seq: AtomicU64,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending record and return it with its cancellation token.
    pub fn create(&self, company_id: &str) -> (JobRecord, CancelToken) {
        let now = Utc::now();
        let id = self.generate_id(company_id, now);
        let record = JobRecord {
            id: id.clone(),
            company_id: company_id.to_string(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        };
        let token = CancelToken::new();
        let mut map = self.inner.lock().expect("job store mutex poisoned");
        map.insert(
            id,
            Entry {
                record: record.clone(),
                token: token.clone(),
            },
        );
        (record, token)
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        let map = self.inner.lock().expect("job store mutex poisoned");
        map.get(id).map(|e| e.record.clone())
    }

    /// `pending → analyzing`. Returns false when the job was cancelled or is
    /// already past pending; the worker stops in that case.
    pub fn mark_analyzing(&self, id: &str) -> bool {
        let mut map = self.inner.lock().expect("job store mutex poisoned");
        match map.get_mut(id) {
            Some(e) if e.record.status == JobStatus::Pending && !e.token.is_cancelled() => {
                e.record.status = JobStatus::Analyzing;
                e.record.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// `analyzing → completed`. A result for a cancelled job is dropped.
    pub fn complete(&self, id: &str, report: ScoreReport) {
        let mut map = self.inner.lock().expect("job store mutex poisoned");
        if let Some(e) = map.get_mut(id) {
            if e.record.status == JobStatus::Analyzing && !e.token.is_cancelled() {
                e.record.status = JobStatus::Completed;
                e.record.result = Some(report);
                e.record.updated_at = Utc::now();
            }
        }
    }

    /// `pending|analyzing → failed` with an error message.
    pub fn fail(&self, id: &str, message: &str) {
        let mut map = self.inner.lock().expect("job store mutex poisoned");
        if let Some(e) = map.get_mut(id) {
            if !e.record.status.is_terminal() {
                e.record.status = JobStatus::Failed;
                e.record.error = Some(message.to_string());
                e.record.updated_at = Utc::now();
            }
        }
    }

    /// Request cancellation. Finished jobs cannot be cancelled; the caller
    /// gets the terminal status back to surface a conflict.
    pub fn cancel(&self, id: &str) -> Result<JobRecord, CancelError> {
        let mut map = self.inner.lock().expect("job store mutex poisoned");
        let Some(e) = map.get_mut(id) else {
            return Err(CancelError::NotFound);
        };
        if e.record.status.is_terminal() {
            return Err(CancelError::AlreadyFinished(e.record.status));
        }
        e.token.cancel();
        e.record.status = JobStatus::Failed;
        e.record.error = Some("cancelled by caller".to_string());
        e.record.updated_at = Utc::now();
        Ok(e.record.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("job store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // sha2 short hash over (company, timestamp, sequence): unique enough for
    // an in-process table and log-safe, never derived from tenant data alone.
    fn generate_id(&self, company_id: &str, now: DateTime<Utc>) -> String {
        use sha2::{Digest, Sha256};
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(company_id.as_bytes());
        hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        hasher.update(n.to_le_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(16);
        for b in digest.iter().take(8) {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelError {
    NotFound,
    AlreadyFinished(JobStatus),
}

// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod ai;
pub mod analysis;
pub mod api;
pub mod band;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod jobs;
pub mod metrics;
pub mod profile;
pub mod recommend;
pub mod score;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::band::ThresholdTable;
pub use crate::engine::{score_with_profile, ScoreReport};
pub use crate::profile::{ProfileHandle, ProfileSet, ScoringProfile};
pub use crate::score::{composite, FactorRange, ScoreError};

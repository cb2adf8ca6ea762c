//! # Scoring Profiles
//! A profile bundles everything one call site needs: the declared factor set
//! (ranges and defaults), the weight vector, the band threshold table, and
//! the recommendation rules. Profiles load from `config/profiles.toml` with a
//! built-in seed fallback; the seeded constants are the hand-tuned values
//! carried over from the source platform and are deliberately not re-derived.

use anyhow::{bail, Context};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::band::{Threshold, ThresholdTable};
use crate::recommend::Rule;
use crate::score::FactorRange;

pub const DEFAULT_PROFILES_PATH: &str = "config/profiles.toml";
pub const ENV_PROFILES_PATH: &str = "DEALSCOPE_PROFILES_PATH";
pub const ENV_PROFILES_HOT_RELOAD: &str = "DEALSCOPE_HOT_RELOAD";

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("name regex"));

/// One declared factor: range bounds come from the profile, the default fills
/// in when a request omits the factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSpec {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub default: Option<f64>,
}

fn default_weight() -> f64 {
    1.0
}

/// A fully validated scoring profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringProfile {
    pub name: String,
    pub label: String,
    pub range: FactorRange,
    pub factors: Vec<FactorSpec>,
    pub bands: ThresholdTable,
    pub recommendations: Vec<Rule>,
}

impl ScoringProfile {
    pub fn factor_names(&self) -> impl Iterator<Item = &str> {
        self.factors.iter().map(|f| f.name.as_str())
    }

    pub fn has_factor(&self, name: &str) -> bool {
        self.factors.iter().any(|f| f.name == name)
    }

    /// Weight vector as a map, for the composite call.
    pub fn weights(&self) -> BTreeMap<String, f64> {
        self.factors
            .iter()
            .map(|f| (f.name.clone(), f.weight))
            .collect()
    }

    /// Default value for a factor the request omitted.
    pub fn default_for(&self, name: &str) -> f64 {
        self.factors
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.default)
            .unwrap_or(self.range.min)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !NAME_RE.is_match(&self.name) {
            bail!("profile name '{}' is not snake_case", self.name);
        }
        if self.factors.is_empty() {
            bail!("profile '{}' declares no factors", self.name);
        }
        if self.range.min >= self.range.max {
            bail!("profile '{}' has an empty factor range", self.name);
        }
        let mut total = 0.0;
        for f in &self.factors {
            if !NAME_RE.is_match(&f.name) {
                bail!(
                    "profile '{}': factor name '{}' is not snake_case",
                    self.name,
                    f.name
                );
            }
            if f.weight < 0.0 {
                bail!(
                    "profile '{}': factor '{}' has a negative weight",
                    self.name,
                    f.name
                );
            }
            if let Some(d) = f.default {
                if d < self.range.min || d > self.range.max {
                    bail!(
                        "profile '{}': default for '{}' is outside the declared range",
                        self.name,
                        f.name
                    );
                }
            }
            total += f.weight;
        }
        if total <= 0.0 {
            bail!("profile '{}': total weight is zero", self.name);
        }
        self.bands
            .validate()
            .with_context(|| format!("profile '{}': bad threshold table", self.name))?;
        for rule in &self.recommendations {
            if let Some(factor) = &rule.when.factor {
                if !self.has_factor(factor) {
                    bail!(
                        "profile '{}': recommendation references unknown factor '{}'",
                        self.name,
                        factor
                    );
                }
            }
            for label in [
                &rule.when.band_is,
                &rule.when.band_at_or_below,
                &rule.when.band_at_or_above,
            ]
            .into_iter()
            .flatten()
            {
                if !self.bands.contains_label(label) {
                    bail!(
                        "profile '{}': recommendation references unknown band '{}'",
                        self.name,
                        label
                    );
                }
            }
        }
        Ok(())
    }
}

// --- TOML wire shapes ---

#[derive(Debug, Deserialize)]
struct ProfilesFile {
    profiles: BTreeMap<String, ProfileCfg>,
}

#[derive(Debug, Deserialize)]
struct ProfileCfg {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    range: FactorRange,
    factors: Vec<FactorSpec>,
    bands: Vec<Threshold>,
    floor: String,
    #[serde(default)]
    recommendations: Vec<Rule>,
}

/// All loaded profiles, keyed by name.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSet {
    profiles: BTreeMap<String, ScoringProfile>,
}

impl ProfileSet {
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let file: ProfilesFile = toml::from_str(toml_str).context("parse profiles TOML")?;
        let mut profiles = BTreeMap::new();
        for (name, cfg) in file.profiles {
            let profile = ScoringProfile {
                label: cfg.label.unwrap_or_else(|| name.clone()),
                name: name.clone(),
                range: cfg.range,
                factors: cfg.factors,
                bands: ThresholdTable {
                    thresholds: cfg.bands,
                    floor: cfg.floor,
                },
                recommendations: cfg.recommendations,
            };
            profile.validate()?;
            profiles.insert(name, profile);
        }
        if profiles.is_empty() {
            bail!("profiles file declares no profiles");
        }
        Ok(Self { profiles })
    }

    pub fn from_toml_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("read profiles config {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load from disk, falling back to the built-in seed when the file is
    /// missing. A present-but-invalid file is an error: silently masking a
    /// typo'd threshold table would defeat the fail-fast contract.
    pub fn load_or_seed(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_toml_path(path)
        } else {
            warn!(path = %path.display(), "profiles config not found; using built-in seed");
            Ok(Self::default_seed())
        }
    }

    pub fn get(&self, name: &str) -> Option<&ScoringProfile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Built-in seed with the three production call sites. The weights and
    /// band boundaries are the hand-tuned constants from the source platform.
    pub fn default_seed() -> Self {
        let toml_str = include_str!("profile_seed.toml");
        Self::from_toml_str(toml_str).expect("built-in profile seed must be valid")
    }
}

/// Shared, reloadable view of the profile set used by Axum handlers.
#[derive(Clone)]
pub struct ProfileHandle {
    inner: Arc<RwLock<ProfileSet>>,
    path: PathBuf,
}

impl ProfileHandle {
    pub fn new(set: ProfileSet, path: PathBuf) -> Self {
        Self {
            inner: Arc::new(RwLock::new(set)),
            path,
        }
    }

    /// Snapshot of the current set (cheap: profiles are small).
    pub fn current(&self) -> ProfileSet {
        self.inner
            .read()
            .expect("profile lock poisoned")
            .clone()
    }

    pub fn profile(&self, name: &str) -> Option<ScoringProfile> {
        self.inner
            .read()
            .expect("profile lock poisoned")
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.read().expect("profile lock poisoned").names()
    }

    /// Re-read the config from disk and swap atomically.
    pub fn reload(&self) -> anyhow::Result<usize> {
        let fresh = ProfileSet::load_or_seed(&self.path)?;
        let n = fresh.len();
        let mut guard = self.inner.write().expect("profile lock poisoned");
        *guard = fresh;
        Ok(n)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A file seen for the first time counts as changed, so a profiles file
/// dropped in after boot takes effect on its first sighting.
fn mtime_changed(prev: Option<SystemTime>, now: SystemTime) -> bool {
    match prev {
        None => true,
        Some(p) => now > p,
    }
}

fn hot_reload_enabled() -> bool {
    std::env::var(ENV_PROFILES_HOT_RELOAD)
        .ok()
        .is_some_and(|v| v == "1")
}

/// Polling watcher: reload the profile set when the config file's mtime
/// changes. 2s poll, std only. No-op unless DEALSCOPE_HOT_RELOAD=1.
pub fn start_hot_reload_thread(handle: ProfileHandle) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        // Baseline is whatever was on disk at boot. If the file does not
        // exist yet (serving from the seed), its first appearance counts as
        // a change and reloads immediately.
        let mut last_mtime: Option<SystemTime> =
            fs::metadata(handle.path()).and_then(|m| m.modified()).ok();

        loop {
            match fs::metadata(handle.path()).and_then(|m| m.modified()) {
                Ok(mtime) => {
                    if mtime_changed(last_mtime, mtime) {
                        match handle.reload() {
                            Ok(n) => info!(profiles = n, "profiles hot-reloaded"),
                            Err(e) => warn!(error = %e, "profiles hot-reload failed; keeping previous set"),
                        }
                        last_mtime = Some(mtime);
                    }
                }
                Err(_) => {
                    // File missing or unreadable; keep trying.
                }
            }
            thread::sleep(poll);
        }
    });
}

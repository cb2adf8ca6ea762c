//! Service configuration, resolved from environment variables (with `.env`
//! loaded by the binary in local runs).

pub mod ai;

use std::path::PathBuf;

use crate::profile::{DEFAULT_PROFILES_PATH, ENV_PROFILES_PATH};

pub const ENV_ADDR: &str = "DEALSCOPE_ADDR";
pub const ENV_API_KEY: &str = "DEALSCOPE_API_KEY";
pub const ENV_AI_CONFIG_PATH: &str = "DEALSCOPE_AI_CONFIG_PATH";

pub const DEFAULT_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub addr: String,
    /// When set, every scoring/analysis/admin request must carry this key in
    /// `x-api-key`. Unset means auth is disabled (local development).
    pub api_key: Option<String>,
    pub profiles_path: PathBuf,
    pub ai_config_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let addr = std::env::var(ENV_ADDR).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
        let api_key = std::env::var(ENV_API_KEY).ok().filter(|k| !k.is_empty());
        let profiles_path = std::env::var(ENV_PROFILES_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_PROFILES_PATH));
        let ai_config_path = std::env::var(ENV_AI_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_AI_CONFIG_PATH));
        Self {
            addr,
            api_key,
            profiles_path,
            ai_config_path,
        }
    }
}

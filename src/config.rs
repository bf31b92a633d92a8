//! Runtime configuration, resolved from the environment with sensible
//! defaults for local development.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::generation::{DEFAULT_MAX_ITERATIONS, DEFAULT_THRESHOLD, LoopParams};
use crate::session::state::STATE_FILE_NAME;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_AIRSAAS_URL: &str = "https://api.airsaas.io/v1";
pub const DEFAULT_SMARTVIEW_PAGE_CAP: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the report backend (session, generation, evaluation).
    pub backend_url: String,
    /// Optional bearer token for the report backend.
    pub backend_key: Option<String>,
    /// Base URL of the AirSaas API used for smartview discovery.
    pub airsaas_url: String,
    /// AirSaas API key; smartview commands require it.
    pub airsaas_api_key: Option<String>,
    /// Minimum score for a candidate to be accepted outright.
    pub threshold: u8,
    /// Generation attempts before settling for the best candidate.
    pub max_iterations: u32,
    /// Pages of smartview listing to follow; 0 means unlimited.
    pub smartview_page_cap: u32,
    /// Location of the persisted session record.
    pub state_file: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            backend_url: env::var("REPORTFLOW_BACKEND_URL")
                .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
            backend_key: env::var("REPORTFLOW_BACKEND_KEY").ok(),
            airsaas_url: env::var("AIRSAAS_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_AIRSAAS_URL.to_string()),
            airsaas_api_key: env::var("AIRSAAS_API_KEY").ok(),
            threshold: parse_env("EVALUATION_THRESHOLD", DEFAULT_THRESHOLD)?,
            max_iterations: parse_env("MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS)?,
            smartview_page_cap: parse_env("SMARTVIEW_MAX_PAGES", DEFAULT_SMARTVIEW_PAGE_CAP)?,
            state_file: match env::var("REPORTFLOW_STATE_FILE") {
                Ok(path) => PathBuf::from(path),
                Err(_) => default_state_file()?,
            },
        })
    }

    pub fn loop_params(&self) -> LoopParams {
        LoopParams {
            max_iterations: self.max_iterations,
            threshold: self.threshold,
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn default_state_file() -> Result<PathBuf> {
    let base = dirs::data_local_dir().context("could not determine the local data directory")?;
    Ok(base.join("reportflow").join(STATE_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_falls_back_to_the_default() {
        let value: u8 = parse_env("REPORTFLOW_TEST_UNSET_VAR", 65).unwrap();
        assert_eq!(value, 65);
    }

    #[test]
    fn loop_params_mirror_the_config() {
        let config = Config {
            backend_url: DEFAULT_BACKEND_URL.into(),
            backend_key: None,
            airsaas_url: DEFAULT_AIRSAAS_URL.into(),
            airsaas_api_key: None,
            threshold: 72,
            max_iterations: 3,
            smartview_page_cap: DEFAULT_SMARTVIEW_PAGE_CAP,
            state_file: PathBuf::from("/tmp/session-state.json"),
        };
        let params = config.loop_params();
        assert_eq!(params.threshold, 72);
        assert_eq!(params.max_iterations, 3);
    }

    #[test]
    fn defaults_match_the_documented_contract() {
        assert_eq!(DEFAULT_THRESHOLD, 65);
        assert_eq!(DEFAULT_MAX_ITERATIONS, 2);
        assert_eq!(DEFAULT_SMARTVIEW_PAGE_CAP, 5);
    }
}

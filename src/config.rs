//! Service configuration
//!
//! Loaded from a TOML file; every field has a default so a missing file
//! still yields a runnable local setup.

use crate::error::{PredictorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote endpoint serving the latest settled round.
    pub poll_url: String,
    /// Seconds between poll attempts.
    pub poll_interval_secs: u64,
    /// Path of the JSON snapshot holding history and learned state.
    pub data_file: String,
    /// Listen address for the HTTP API.
    pub listen_addr: String,
    /// Monte Carlo simulation count per prediction.
    pub monte_carlo_sims: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_url: "https://toilavinhmaycays23.onrender.com/vinhmaycay".to_string(),
            poll_interval_secs: 30,
            data_file: "data.json".to_string(),
            listen_addr: "0.0.0.0:3000".to_string(),
            monte_carlo_sims: 500,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            tracing::info!("config file {} not found, using defaults", path);
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| PredictorError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_missing() {
        let cfg = Config::load("/nonexistent/config.toml").unwrap();
        assert_eq!(cfg.poll_interval_secs, 30);
        assert_eq!(cfg.monte_carlo_sims, 500);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "poll_interval_secs = 10").unwrap();
        let cfg = Config::load(f.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.poll_interval_secs, 10);
        assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "poll_interval_secs = \"not a number\"").unwrap();
        assert!(Config::load(f.path().to_str().unwrap()).is_err());
    }
}

//! Runtime configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/saldo/config/saldo.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Environment variables are applied on top by [`SaldoConfig::apply_env`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::filters::{validate_page_size, DEFAULT_PAGE_SIZE};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/saldo.toml");

pub const DEFAULT_AGGREGATOR_URL: &str = "https://api.pluggy.ai";

/// Transaction view tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    /// Quiet period before a search edit propagates
    pub debounce: Duration,
    /// Page size given to newly seen accounts
    pub default_page_size: u32,
    /// Transactions per account in the overview
    pub summary_page_size: u32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            default_page_size: DEFAULT_PAGE_SIZE,
            summary_page_size: 20,
        }
    }
}

/// Aggregator connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AGGREGATOR_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaldoConfig {
    pub view: ViewConfig,
    pub aggregator: AggregatorConfig,
}

impl SaldoConfig {
    /// Load from the override location (or embedded defaults), then apply env
    pub fn load() -> Result<Self> {
        let mut config = load_config(None)?;
        config.apply_env();
        Ok(config)
    }

    /// Load from an explicit file, then apply env
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = load_config(Some(path))?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment overrides
    ///
    /// - `PLUGGY_API_URL`: aggregator base URL
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("PLUGGY_API_URL") {
            if !url.trim().is_empty() {
                self.aggregator.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("saldo").join("config").join("saldo.toml"))
}

fn read_config(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&Path>) -> Result<SaldoConfig> {
    let path = match override_path {
        Some(path) if !path.exists() => {
            warn!(path = %path.display(), "Config file not found, using defaults");
            None
        }
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.exists()),
    };

    match path {
        Some(path) => parse_config(&read_config(&path)?),
        None => parse_config(DEFAULT_CONFIG),
    }
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    view: Option<RawView>,
    aggregator: Option<RawAggregator>,
}

#[derive(Debug, Deserialize)]
struct RawView {
    debounce_ms: Option<u64>,
    default_page_size: Option<u32>,
    summary_page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawAggregator {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<SaldoConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = SaldoConfig::default();

    if let Some(view) = raw.view {
        if let Some(ms) = view.debounce_ms {
            config.view.debounce = Duration::from_millis(ms);
        }
        if let Some(size) = view.default_page_size {
            config.view.default_page_size = validate_page_size(size)
                .map_err(|e| Error::Config(format!("view.default_page_size: {}", e)))?;
        }
        if let Some(size) = view.summary_page_size {
            if size == 0 {
                return Err(Error::Config(
                    "view.summary_page_size must be positive".into(),
                ));
            }
            config.view.summary_page_size = size;
        }
    }

    if let Some(aggregator) = raw.aggregator {
        if let Some(url) = aggregator.base_url {
            config.aggregator.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = aggregator.timeout_secs {
            config.aggregator.timeout = Duration::from_secs(secs);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, SaldoConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = parse_config("[view]\ndebounce_ms = 250\n").unwrap();
        assert_eq!(config.view.debounce, Duration::from_millis(250));
        assert_eq!(config.view.default_page_size, 100);
        assert_eq!(config.aggregator.base_url, DEFAULT_AGGREGATOR_URL);
    }

    #[test]
    fn test_rejects_unsupported_page_size() {
        let err = parse_config("[view]\ndefault_page_size = 75\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config =
            parse_config("[aggregator]\nbase_url = \"http://localhost:9000/\"\ntimeout_secs = 5\n")
                .unwrap();
        assert_eq!(config.aggregator.base_url, "http://localhost:9000");
        assert_eq!(config.aggregator.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saldo.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[view]\nsummary_page_size = 10").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.view.summary_page_size, 10);
    }

    #[test]
    fn test_missing_explicit_path_uses_embedded_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config, parse_config(DEFAULT_CONFIG).unwrap());
    }
}

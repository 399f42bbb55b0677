//! Demo configuration.
//!
//! Configuration can be loaded from:
//! - TOML configuration file (`$FANOUT_CONFIG` or a default path)
//! - Environment variables (FANOUT_*, nested keys separated by `__`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Demo configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fallback tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Scenario configuration.
    #[serde(default)]
    pub demo: DemoConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Subscriber names, in subscription order.
    #[serde(default = "default_subscribers")]
    pub subscribers: Vec<String>,

    /// Messages published before the last subscriber leaves.
    #[serde(default = "default_messages")]
    pub messages: usize,

    /// Inbox capacity for every subscriber.
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,

    /// Time given to delivery loops to drain, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_log_filter() -> String {
    "fanout=debug,tenvis_fanout_core=debug".to_string()
}

fn default_subscribers() -> Vec<String> {
    vec!["sub01".to_string(), "sub02".to_string(), "sub03".to_string()]
}

fn default_messages() -> usize {
    3
}

fn default_inbox_capacity() -> usize {
    tenvis_fanout_core::DEFAULT_INBOX_CAPACITY
}

fn default_settle_ms() -> u64 {
    1_000
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            demo: DemoConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            subscribers: default_subscribers(),
            messages: default_messages(),
            inbox_capacity: default_inbox_capacity(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults, then apply `FANOUT_*`
    /// environment overrides.
    ///
    /// The file is `$FANOUT_CONFIG` if set, otherwise the first of the
    /// default paths that exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// an environment override has the wrong type.
    pub fn load() -> Result<Self> {
        let base = match Self::config_path() {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        base.with_env(Self::env_source())
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FANOUT_CONFIG") {
            return Some(PathBuf::from(shellexpand::tilde(&path).as_ref()));
        }

        let config_paths = [
            "fanout.toml",
            "/etc/fanout/fanout.toml",
            "~/.config/fanout/fanout.toml",
        ];

        config_paths
            .iter()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
            .find(|path| path.exists())
    }

    /// `FANOUT_DEMO__SETTLE_MS=200` overrides `demo.settle_ms`.
    fn env_source() -> ::config::Environment {
        ::config::Environment::with_prefix("FANOUT")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Layer `env` on top of `self`.
    fn with_env(&self, env: ::config::Environment) -> Result<Self> {
        let base = ::config::Config::try_from(self).context("Failed to serialize configuration")?;

        ::config::Config::builder()
            .add_source(base)
            .add_source(env)
            .build()
            .and_then(|settings| settings.try_deserialize())
            .context("Failed to apply environment overrides")
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.demo.subscribers, vec!["sub01", "sub02", "sub03"]);
        assert_eq!(config.demo.messages, 3);
        assert_eq!(config.demo.inbox_capacity, 100);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            log_filter = "info"

            [demo]
            subscribers = ["alpha", "beta"]
            settle_ms = 50

            [metrics]
            enabled = true
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.demo.subscribers, vec!["alpha", "beta"]);
        assert_eq!(config.demo.settle_ms, 50);
        assert_eq!(config.demo.messages, 3);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9090);
    }

    fn env(vars: &[(&str, &str)]) -> ::config::Environment {
        let source = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<::config::Map<String, String>>();
        Config::env_source().source(Some(source))
    }

    #[test]
    fn test_env_overrides_defaults() {
        let config = Config::default()
            .with_env(env(&[
                ("FANOUT_DEMO__SETTLE_MS", "250"),
                ("FANOUT_METRICS__ENABLED", "true"),
            ]))
            .unwrap();

        assert_eq!(config.demo.settle_ms, 250);
        assert!(config.metrics.enabled);
        assert_eq!(config.demo.messages, 3);
        assert_eq!(config.demo.subscribers, vec!["sub01", "sub02", "sub03"]);
    }

    #[test]
    fn test_env_overrides_file() {
        let path = std::env::temp_dir().join(format!("fanout-test-{}.toml", std::process::id()));
        std::fs::write(&path, "[demo]\nmessages = 7\nsettle_ms = 10\n").unwrap();

        let from_file = Config::from_file(&path);
        std::fs::remove_file(&path).unwrap();

        let config = from_file
            .unwrap()
            .with_env(env(&[("FANOUT_DEMO__SETTLE_MS", "40")]))
            .unwrap();
        assert_eq!(config.demo.messages, 7);
        assert_eq!(config.demo.settle_ms, 40);
    }

    #[test]
    fn test_env_rejects_bad_type() {
        let result = Config::default().with_env(env(&[("FANOUT_DEMO__SETTLE_MS", "soon")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_from_missing_file() {
        assert!(Config::from_file("/nonexistent/fanout.toml").is_err());
    }
}

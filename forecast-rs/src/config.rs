//! Engine configuration.
//!
//! All fields have defaults, so a TOML file only needs the keys it overrides:
//!
//! ```toml
//! order = 4
//! window = 256
//!
//! [learned]
//! input_size = 12
//! ```

use crate::error::{Error, Result};
use crate::filter::WaveletOrder;
use crate::transform::{check_window, scaling_size};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the learned coefficient predictors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnedConfig {
    /// First differences fed to each network
    pub input_size: usize,

    /// Hidden neurons per network
    pub hidden_size: usize,

    pub learning_rate: f64,

    /// Activation-space error above which a network is retrained
    pub max_error: f64,

    /// Error at which retraining stops
    pub min_error: f64,

    /// Cap on backpropagation steps per retraining
    pub max_epochs: usize,
}

impl Default for LearnedConfig {
    fn default() -> Self {
        Self {
            input_size: 8,
            hidden_size: 16,
            learning_rate: 0.1,
            max_error: 0.01,
            min_error: 1e-6,
            max_epochs: 256,
        }
    }
}

impl LearnedConfig {
    /// History rows a learned predictor needs: its inputs, one extra row to
    /// difference against, and the row it scores itself on.
    pub fn min_history(&self) -> usize {
        self.input_size + 2
    }

    /// Check layer sizes and training parameters.
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.hidden_size == 0 {
            return Err(Error::invalid_config("learned layer sizes must be non-zero"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(Error::invalid_config(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.min_error >= 0.0 && self.min_error <= self.max_error) {
            return Err(Error::invalid_config(format!(
                "error thresholds must satisfy 0 <= min_error <= max_error, got {} and {}",
                self.min_error, self.max_error
            )));
        }
        Ok(())
    }
}

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Daubechies order N (2..=10)
    pub order: usize,

    /// Window size S, a power of two of at least 2N
    pub window: usize,

    /// Reuse invariant coefficients from history once it is deep enough
    pub reduced_transform: bool,

    /// Perturbation applied to the last sample during calibration
    pub calibration_delta: f64,

    /// Solved shifts at or beyond this magnitude are discarded
    pub outlier_bound: f64,

    /// Seed for learned-predictor weight initialisation
    pub seed: u64,

    pub learned: LearnedConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            order: 2,
            window: 128,
            reduced_transform: true,
            calibration_delta: 2.0,
            outlier_bound: 2.0,
            seed: 42,
            learned: LearnedConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Default configuration with a different order and window.
    pub fn with_window(order: usize, window: usize) -> Self {
        Self {
            order,
            window,
            ..Self::default()
        }
    }

    /// Get the configured wavelet order.
    pub fn wavelet_order(&self) -> Result<WaveletOrder> {
        WaveletOrder::from_order(self.order)
    }

    /// Check the whole engine configuration.
    pub fn validate(&self) -> Result<()> {
        let order = self.wavelet_order()?;
        check_window(self.window, order.filter_len()).map_err(|_| {
            Error::invalid_config(format!(
                "window {} must be a power of two of at least {}",
                self.window,
                scaling_size(order.filter_len())
            ))
        })?;
        if !(self.calibration_delta > 0.0 && self.calibration_delta.is_finite()) {
            return Err(Error::invalid_config(format!(
                "calibration delta must be positive, got {}",
                self.calibration_delta
            )));
        }
        if !(self.outlier_bound > 0.0) {
            return Err(Error::invalid_config(format!(
                "outlier bound must be positive, got {}",
                self.outlier_bound
            )));
        }
        self.learned.validate()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(source).context("failed to parse engine config")?;
        config.validate().context("invalid engine config")?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        Self::from_toml(&source).with_context(|| format!("in config file {}", path.display()))
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string(self).context("failed to serialize engine config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.order, 2);
        assert_eq!(config.window, 128);
        assert!(config.reduced_transform);
        assert_eq!(config.calibration_delta, 2.0);
        assert_eq!(config.learned.input_size, 8);
        assert_eq!(config.learned.hidden_size, 16);
        assert_eq!(config.learned.min_history(), 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            order = 4
            window = 256

            [learned]
            input_size = 12
            "#,
        )
        .unwrap();
        assert_eq!(config.wavelet_order().unwrap(), WaveletOrder::D4);
        assert_eq!(config.window, 256);
        assert_eq!(config.seed, 42);
        assert_eq!(config.learned.input_size, 12);
        assert_eq!(config.learned.hidden_size, 16);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(EngineConfig::with_window(2, 100).validate().is_err());
        assert!(EngineConfig::with_window(11, 128).validate().is_err());
        // 6-tap filter needs at least 8 samples.
        assert!(EngineConfig::with_window(3, 4).validate().is_err());
        assert!(EngineConfig::with_window(3, 8).validate().is_ok());

        let mut config = EngineConfig::default();
        config.calibration_delta = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.learned.min_error = 0.5;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        assert!(EngineConfig::from_toml("window = 96").is_err());
        assert!(EngineConfig::from_toml("window = \"big\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "window = 64\nseed = 7").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.window, 64);
        assert_eq!(config.seed, 7);

        let err = EngineConfig::load("/nonexistent/wavecast.toml").unwrap_err();
        assert!(err.to_string().contains("could not read config file"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::with_window(3, 64);
        let text = config.to_toml().unwrap();
        assert_eq!(EngineConfig::from_toml(&text).unwrap(), config);
    }
}

use crate::logging::LoggingConfig;
use crate::optimizer::AnnealingConfig;
use crate::similarity::{NormalizedMutualInformation, DEFAULT_BINS};
use crate::transform::TransformParams;
use crate::error::{RegistrationError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub annealing: AnnealingConfig,
    pub similarity: SimilarityConfig,
    pub scenario: ScenarioConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub bins: usize,
}

/// Known misalignment applied to the fixed slice to synthesize the moving slice
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub angle_degrees: f64,
    pub scale: f64,
    pub tx: f64,
    pub ty: f64,
    /// Standard deviation of additive Gaussian noise on the moving slice
    pub noise_sigma: f64,
    pub seed: u64,
    /// Size of the synthetic phantom used when no input file is given
    pub phantom_size: (usize, usize),
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self { bins: DEFAULT_BINS }
    }
}

impl SimilarityConfig {
    pub fn metric(&self) -> Result<NormalizedMutualInformation> {
        NormalizedMutualInformation::new(self.bins)
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            angle_degrees: 15.0,
            scale: 1.1,
            tx: 10.0,
            ty: -20.0,
            noise_sigma: 0.0,
            seed: 42,
            phantom_size: (128, 128),
        }
    }
}

impl ScenarioConfig {
    pub fn true_params(&self) -> TransformParams {
        TransformParams::from_degrees(self.angle_degrees, self.scale, self.tx, self.ty)
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RegistrationError::ResourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path)?;

        if content.trim_start().starts_with('{') {
            serde_json::from_str(&content).map_err(|e| RegistrationError::Config(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| RegistrationError::Config(e.to_string()))
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> Result<()> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| RegistrationError::Config(e.to_string()))?,
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| RegistrationError::Config(e.to_string()))?
            }
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.annealing.validate() {
            errors.push(e.to_string());
        }

        if self.similarity.bins == 0 {
            errors.push("similarity bins must be positive".to_string());
        }

        if let Err(e) = self.scenario.true_params().validate() {
            errors.push(format!("scenario: {}", e));
        }

        if !(self.scenario.noise_sigma.is_finite() && self.scenario.noise_sigma >= 0.0) {
            errors.push("scenario noise_sigma must be non-negative".to_string());
        }

        let (rows, cols) = self.scenario.phantom_size;
        if rows < 2 || cols < 2 {
            errors.push("scenario phantom_size must be at least 2x2".to_string());
        }

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl std::str::FromStr for ConfigFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            other => Err(format!("unknown config format: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registration.toml");

        let mut config = Config::default();
        config.annealing.max_iterations = 300;
        config.scenario.angle_degrees = -7.5;
        config.save_to_file(&path, ConfigFormat::Toml).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.annealing.max_iterations, 300);
        assert_eq!(loaded.scenario.angle_degrees, -7.5);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registration.json");
        fs::write(&path, r#"{ "annealing": { "cooling_rate": 0.99 } }"#).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.annealing.cooling_rate, 0.99);
        assert_eq!(loaded.annealing.max_iterations, 2500);
        assert_eq!(loaded.similarity.bins, DEFAULT_BINS);
    }

    #[test]
    fn test_invalid_values_reported() {
        let mut config = Config::default();
        config.similarity.bins = 0;
        config.scenario.scale = -1.0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_config_format_parsing() {
        assert_eq!("TOML".parse::<ConfigFormat>().unwrap(), ConfigFormat::Toml);
        assert!("yaml".parse::<ConfigFormat>().is_err());
    }
}

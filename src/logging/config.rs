//! Logging configuration
//!
//! Per-component log levels and output destinations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub global_level: String,

    /// Level for the annealing search
    pub optimizer_level: String,

    /// Level for slice loading
    pub loader_level: String,

    /// Enable console output
    pub console_output: bool,

    /// Directory for daily-rolled JSON log files (None = no file logging)
    pub log_directory: Option<PathBuf>,

    /// Include file location in logs
    pub include_file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            optimizer_level: "info".to_string(),
            loader_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
        }
    }
}

impl LoggingConfig {
    /// Warnings and errors only
    pub fn quiet() -> Self {
        Self {
            global_level: "warn".to_string(),
            optimizer_level: "warn".to_string(),
            loader_level: "warn".to_string(),
            ..Self::default()
        }
    }

    /// Map a `-v` count onto the global and optimizer levels
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        let level = match verbose {
            0 => return self,
            1 => "debug",
            _ => "trace",
        };
        self.global_level = level.to_string();
        self.optimizer_level = level.to_string();
        self.loader_level = level.to_string();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, level) in [
            ("global_level", &self.global_level),
            ("optimizer_level", &self.optimizer_level),
            ("loader_level", &self.loader_level),
        ] {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(format!(
                    "Invalid {}: {}. Must be one of: {:?}",
                    name, level, VALID_LEVELS
                ));
            }
        }

        if let Some(ref log_dir) = self.log_directory {
            if let Some(parent) = log_dir.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(format!("Log directory parent does not exist: {:?}", parent));
                }
            }
        }

        Ok(())
    }

    /// `EnvFilter` directives for this crate
    pub fn filter_directives(&self) -> String {
        let krate = env!("CARGO_PKG_NAME").replace('-', "_");
        format!(
            "{krate}={},{krate}::optimizer={},{krate}::data={}",
            self.global_level, self.optimizer_level, self.loader_level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.global_level, "info");
        assert!(config.console_output);
        assert!(config.log_directory.is_none());
        assert!(!config.include_file_location);
    }

    #[test]
    fn test_config_validation() {
        let mut config = LoggingConfig::default();
        assert!(config.validate().is_ok());

        config.global_level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.global_level = "debug".to_string();
        config.optimizer_level = "loud".to_string();
        assert!(config.validate().unwrap_err().contains("optimizer_level"));
    }

    #[test]
    fn test_verbosity_and_directives() {
        let config = LoggingConfig::quiet().with_verbosity(1);
        assert_eq!(config.optimizer_level, "debug");
        assert_eq!(
            config.filter_directives(),
            "slice_registration=debug,slice_registration::optimizer=debug,slice_registration::data=debug"
        );

        let unchanged = LoggingConfig::quiet().with_verbosity(0);
        assert_eq!(unchanged.global_level, "warn");
    }
}

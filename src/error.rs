//! Error types shared by the loader, the evaluator, the scorer and the optimizer

use std::path::PathBuf;
use thiserror::Error;

/// Registration errors
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Resource not found: {}", path.display())]
    ResourceNotFound { path: PathBuf },

    #[error("Error loading image data: {0}")]
    Load(String),

    #[error("Cannot normalize a constant image (every pixel is {min})")]
    EmptyRange { min: f64 },

    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for RegistrationError {
    fn from(err: std::io::Error) -> Self {
        RegistrationError::Load(err.to_string())
    }
}

impl From<image::ImageError> for RegistrationError {
    fn from(err: image::ImageError) -> Self {
        RegistrationError::Load(err.to_string())
    }
}

/// Result type for registration operations
pub type Result<T> = std::result::Result<T, RegistrationError>;

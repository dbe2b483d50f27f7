pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod optimizer;
pub mod similarity;
pub mod slice;
pub mod transform;
pub mod visualization;

pub use analysis::*;
pub use data::*;
pub use error::{RegistrationError, Result};
pub use optimizer::{
    anneal, metropolis_accept, optimize, perturb, AnnealingConfig, AnnealingResult,
    AnnealingSearch, NoProgress, ProgressObserver, StepOutcome, TracingProgress,
};
pub use similarity::{score, NormalizedMutualInformation, SimilarityMetric};
pub use slice::Image;
pub use transform::{inverse, warp, TransformParams};

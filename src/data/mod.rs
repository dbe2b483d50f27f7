pub mod loader;
pub mod nifti;
pub mod phantom;

pub use loader::*;
pub use phantom::*;

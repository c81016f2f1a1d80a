// Re-export all model types for ease of use

pub mod extraction;

pub use extraction::*;

//! Utility types shared across the crate.

pub mod errors;

pub use errors::{PolyResult, PolyschedError};

//! Error types

pub mod types;

pub use types::{minutes_label, EngineError, EngineResult, HarnessError};

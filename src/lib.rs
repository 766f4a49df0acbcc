//! Sandboxed evaluation of submitted model containers

// Public modules
pub mod config;
pub mod engine;
pub mod error;
pub mod harness;
pub mod logging;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use error::{EngineError, HarnessError};
pub use harness::{Evaluator, ExecutionResult, SubmissionJob, ValidationStatus};

//! Harness error types
//!
//! Two layers: `EngineError` is what a container engine reports, and
//! `HarnessError` is the job-level taxonomy. The `Display` text of a
//! `HarnessError` is exactly what ends up in `submission_errors`.

use std::time::Duration;
use thiserror::Error;

/// Errors reported by a container engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The referenced container or image does not exist
    #[error("{0}")]
    NotFound(String),

    /// The engine rejected or failed the request; carries the engine's text
    #[error("{0}")]
    Api(String),

    /// The engine endpoint could not be reached
    #[error("Docker not available: {0}")]
    Unavailable(String),
}

impl EngineError {
    /// Check if this error only means the target was already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Job-level failures. Every variant converts into an INVALID outcome.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Image reference fields are missing or malformed
    #[error("{0}")]
    Configuration(String),

    /// Registry credentials could not be loaded
    #[error("Unable to load registry credentials: {0}")]
    Credentials(String),

    /// Registry, auth or network failure while pulling
    #[error("Unable to pull image: {0}")]
    Pull(String),

    /// Execution exceeded the configured budget
    #[error(
        "Container exceeded execution time limit of {} minutes; stopping container.",
        minutes_label(.0)
    )]
    Timeout(Duration),

    /// Any other engine fault while running, waiting or reading logs
    #[error("Error running container: {0}")]
    Engine(String),

    /// Clean exit but the expected artifact is absent
    #[error("Container did not generate a file called {0}")]
    MissingArtifact(String),

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Short machine-friendly name, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Configuration(_) => "configuration",
            HarnessError::Credentials(_) => "credentials",
            HarnessError::Pull(_) => "pull",
            HarnessError::Timeout(_) => "timeout",
            HarnessError::Engine(_) => "engine",
            HarnessError::MissingArtifact(_) => "missing_artifact",
            HarnessError::Io(_) => "io",
        }
    }

    /// Whether the failure happened after a container was created and so
    /// required forced cleanup
    pub fn required_forced_cleanup(&self) -> bool {
        matches!(self, HarnessError::Timeout(_) | HarnessError::Engine(_))
    }
}

/// Render a duration in minutes the way the results consumers expect it:
/// always as a float, `1.0` rather than `1`.
pub fn minutes_label(limit: &Duration) -> String {
    let minutes = limit.as_secs_f64() / 60.0;
    if minutes.fract() == 0.0 {
        format!("{:.1}", minutes)
    } else {
        format!("{}", minutes)
    }
}

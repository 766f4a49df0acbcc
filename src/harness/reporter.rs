//! Job outcome and results record
//!
//! A job is VALID only if it pulled, exited within budget without an engine
//! fault, and left the predictions file in its output directory.

use crate::error::HarnessError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Two-state verdict consumed by the scoring stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Valid,
    Invalid,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStatus::Valid => write!(f, "VALID"),
            ValidationStatus::Invalid => write!(f, "INVALID"),
        }
    }
}

/// Produced exactly once per job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status: ValidationStatus,
    /// Empty when VALID
    pub message: String,
    /// Bounded log file, when one was written
    pub log_path: Option<PathBuf>,
}

impl ExecutionResult {
    pub fn valid(log_path: Option<PathBuf>) -> Self {
        Self {
            status: ValidationStatus::Valid,
            message: String::new(),
            log_path,
        }
    }

    pub fn invalid(err: &HarnessError, log_path: Option<PathBuf>) -> Self {
        Self {
            status: ValidationStatus::Invalid,
            message: err.to_string(),
            log_path,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == ValidationStatus::Valid
    }

    pub fn to_record(&self) -> ResultsRecord {
        ResultsRecord {
            submission_status: self.status,
            submission_errors: self.message.clone(),
        }
    }
}

/// On-disk shape of `results.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsRecord {
    pub submission_status: ValidationStatus,
    pub submission_errors: String,
}

/// Turns the stage results into the final verdict
#[derive(Debug, Clone)]
pub struct OutcomeReporter {
    predictions_file: String,
}

impl OutcomeReporter {
    pub fn new(predictions_file: impl Into<String>) -> Self {
        Self {
            predictions_file: predictions_file.into(),
        }
    }

    /// Fail unless the predictions file exists in `output_dir`
    pub async fn check_artifact(&self, output_dir: &Path) -> Result<(), HarnessError> {
        let path = output_dir.join(&self.predictions_file);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(HarnessError::MissingArtifact(self.predictions_file.clone())),
        }
    }

    /// Final verdict for a run that got past every earlier stage
    pub async fn report(&self, output_dir: &Path, log_path: Option<PathBuf>) -> ExecutionResult {
        match self.check_artifact(output_dir).await {
            Ok(()) => ExecutionResult::valid(log_path),
            Err(err) => ExecutionResult::invalid(&err, log_path),
        }
    }
}

/// Write the results record as JSON
pub async fn write_results(path: &Path, result: &ExecutionResult) -> Result<(), HarnessError> {
    let body = serde_json::to_string(&result.to_record())
        .map_err(|e| HarnessError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, body).await?;
    Ok(())
}

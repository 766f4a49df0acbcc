//! Submission job description
//!
//! A job is immutable once built. Container and log file names are derived
//! from the submission id alone, so re-running a submission always targets
//! the same artifacts.

use crate::error::HarnessError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Message used when a submission carries no image at all
pub const NOT_A_DOCKER_IMAGE: &str = "Submission is not a Docker image, please try again.";

/// A submitted image, pinned by content digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub repository: String,
    pub digest: String,
}

impl ImageReference {
    pub fn new(repository: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            digest: digest.into(),
        }
    }

    /// Check both fields are present and the digest is `<algorithm>:<hex>`
    pub fn validate(&self) -> Result<(), HarnessError> {
        let repository = self.repository.trim();
        let digest = self.digest.trim();

        match (repository.is_empty(), digest.is_empty()) {
            (true, true) => {
                return Err(HarnessError::Configuration(NOT_A_DOCKER_IMAGE.to_string()))
            }
            (true, false) => {
                return Err(HarnessError::Configuration(
                    "Submission is missing a Docker repository.".to_string(),
                ))
            }
            (false, true) => {
                return Err(HarnessError::Configuration(
                    "Submission is missing a Docker image digest.".to_string(),
                ))
            }
            (false, false) => {}
        }

        if repository.contains('@') {
            return Err(HarnessError::Configuration(format!(
                "Docker repository must not embed a digest: {}",
                repository
            )));
        }

        let valid_digest = match digest.split_once(':') {
            Some((algorithm, hex)) => {
                !algorithm.is_empty()
                    && algorithm
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
                    && !hex.is_empty()
                    && hex.chars().all(|c| c.is_ascii_hexdigit())
            }
            None => false,
        };
        if !valid_digest {
            return Err(HarnessError::Configuration(format!(
                "Invalid Docker image digest: {}",
                digest
            )));
        }

        Ok(())
    }

    /// `repository@digest`, the only form the harness pulls or runs
    pub fn pinned(&self) -> String {
        format!("{}@{}", self.repository.trim(), self.digest.trim())
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pinned())
    }
}

/// One evaluation request
#[derive(Debug, Clone)]
pub struct SubmissionJob {
    pub submission_id: String,
    pub image: ImageReference,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Where the bounded log is placed in the durable store
    pub parent_id: String,
    pub store_logs: bool,
    /// Overrides the configured execution budget
    pub timeout: Option<Duration>,
}

impl SubmissionJob {
    /// Validate the parts of the job that do not touch the engine
    pub fn validate(&self) -> Result<(), HarnessError> {
        self.image.validate()?;

        let id = self.submission_id.as_str();
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(HarnessError::Configuration(format!(
                "Invalid submission id: {:?}",
                id
            )));
        }

        Ok(())
    }

    pub fn container_name(&self) -> String {
        format!("{}-docker_run", self.submission_id)
    }

    pub fn log_file_name(&self) -> String {
        format!("{}-docker_logs.txt", self.submission_id)
    }
}

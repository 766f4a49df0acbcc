//! Sandboxed container launch
//!
//! Containers are started detached: control comes back as soon as the
//! engine has started the process, and the guard supervises it from there.

use crate::engine::{ContainerEngine, ContainerSpec};
use crate::error::HarnessError;
use crate::harness::job::SubmissionJob;
use crate::harness::reaper::ResourceReaper;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A started container owned by the current job
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    pub name: String,
    pub engine_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Creates and starts submission containers
pub struct ContainerRunner {
    engine: Arc<dyn ContainerEngine>,
    reaper: ResourceReaper,
    memory_limit: i64,
}

impl ContainerRunner {
    pub fn new(engine: Arc<dyn ContainerEngine>, reaper: ResourceReaper, memory_limit: i64) -> Self {
        Self {
            engine,
            reaper,
            memory_limit,
        }
    }

    /// Remove whatever a previous attempt for this submission left behind
    pub async fn clear_stale(&self, job: &SubmissionJob) {
        let name = job.container_name();
        if self.reaper.remove_container(&name).await {
            tracing::info!(
                submission_id = %job.submission_id,
                container = %name,
                "Removed stale container from an earlier attempt"
            );
        }
    }

    /// Build the sandbox description for `job`
    pub async fn container_spec(&self, job: &SubmissionJob) -> Result<ContainerSpec, HarnessError> {
        let input_dir = absolute_dir(&job.input_dir, false).await?;
        let output_dir = absolute_dir(&job.output_dir, true).await?;

        Ok(ContainerSpec {
            name: job.container_name(),
            image: job.image.pinned(),
            input_dir,
            output_dir,
            memory_limit: self.memory_limit,
            network_disabled: true,
        })
    }

    /// Create and start the container, detached.
    ///
    /// Errors from the engine come back as `HarnessError::Engine`; the
    /// caller still owns cleanup of anything that was partially created.
    pub async fn start(&self, job: &SubmissionJob) -> Result<ContainerHandle, HarnessError> {
        let spec = self.container_spec(job).await?;

        self.clear_stale(job).await;

        tracing::info!(
            submission_id = %job.submission_id,
            container = %spec.name,
            input = %spec.input_dir.display(),
            output = %spec.output_dir.display(),
            memory_limit = spec.memory_limit,
            "Running container"
        );

        let engine_id = self
            .engine
            .run(&spec)
            .await
            .map_err(|e| HarnessError::Engine(e.to_string()))?;

        Ok(ContainerHandle {
            name: spec.name,
            engine_id,
            started_at: chrono::Utc::now(),
        })
    }
}

/// Resolve a bind-mount source to an absolute path, creating it if asked
async fn absolute_dir(path: &Path, create: bool) -> Result<PathBuf, HarnessError> {
    if create {
        tokio::fs::create_dir_all(path).await?;
    }

    let resolved = tokio::fs::canonicalize(path).await.map_err(|e| {
        HarnessError::Configuration(format!("Directory {} is not usable: {}", path.display(), e))
    })?;

    if !tokio::fs::metadata(&resolved).await?.is_dir() {
        return Err(HarnessError::Configuration(format!(
            "{} is not a directory",
            resolved.display()
        )));
    }

    Ok(resolved)
}

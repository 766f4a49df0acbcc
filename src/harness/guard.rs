//! Wall-clock supervision of a running container
//!
//! The guard races the engine's blocking wait against a timer. When the
//! timer wins, or the engine faults, the container is killed and removed on
//! the spot; no graceful shutdown is attempted.

use crate::engine::ContainerEngine;
use crate::error::HarnessError;
use crate::harness::reaper::ResourceReaper;
use crate::harness::runner::ContainerHandle;
use crate::utils::{with_timeout, TimeoutError};
use std::sync::Arc;
use std::time::Duration;

/// Terminal state of a supervised run. Exactly one is produced per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Finished within budget
    NaturalExit { exit_code: i64 },
    /// Budget elapsed; the container has been removed
    Timeout { limit: Duration },
    /// Engine fault; the container has been removed
    ApiError { message: String },
}

impl RunOutcome {
    /// The job failure this outcome stands for, if any
    pub fn into_error(self) -> Option<HarnessError> {
        match self {
            RunOutcome::NaturalExit { .. } => None,
            RunOutcome::Timeout { limit } => Some(HarnessError::Timeout(limit)),
            RunOutcome::ApiError { message } => Some(HarnessError::Engine(message)),
        }
    }
}

/// Bounds execution time of one container
pub struct TimeoutGuard {
    engine: Arc<dyn ContainerEngine>,
    reaper: ResourceReaper,
    budget: Duration,
}

impl TimeoutGuard {
    pub fn new(engine: Arc<dyn ContainerEngine>, reaper: ResourceReaper, budget: Duration) -> Self {
        Self {
            engine,
            reaper,
            budget,
        }
    }

    /// Wait for the container with the configured budget
    pub async fn supervise(&self, handle: &ContainerHandle) -> RunOutcome {
        tracing::info!(
            container = %handle.name,
            budget_secs = self.budget.as_secs(),
            "Waiting for container"
        );

        match with_timeout(self.budget, self.engine.wait(&handle.name)).await {
            Ok(exit_code) => {
                let elapsed = chrono::Utc::now().signed_duration_since(handle.started_at);
                tracing::info!(
                    container = %handle.name,
                    exit_code,
                    elapsed_secs = elapsed.num_seconds(),
                    "Container exited"
                );
                RunOutcome::NaturalExit { exit_code }
            }
            Err(TimeoutError::Timeout(limit)) => {
                tracing::warn!(
                    container = %handle.name,
                    limit_secs = limit.as_secs(),
                    "Container exceeded execution time limit; stopping container"
                );
                self.reaper.remove_container(&handle.name).await;
                RunOutcome::Timeout { limit }
            }
            Err(TimeoutError::Inner(err)) => self.abort(&handle.name, err.to_string()).await,
        }
    }

    /// Kill and remove `name` after an engine fault
    pub async fn abort(&self, name: &str, message: String) -> RunOutcome {
        tracing::error!(container = %name, error = %message, "Engine fault while running container");
        self.reaper.remove_container(name).await;
        RunOutcome::ApiError { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::{FakeEngine, FakeRun};
    use crate::engine::ContainerSpec;
    use std::path::PathBuf;

    async fn started(engine: &Arc<FakeEngine>) -> ContainerHandle {
        let dir = std::env::temp_dir();
        let spec = ContainerSpec {
            name: "1234-docker_run".to_string(),
            image: "repo@sha256:abc".to_string(),
            input_dir: PathBuf::from(&dir),
            output_dir: PathBuf::from(&dir),
            memory_limit: 1024,
            network_disabled: true,
        };
        let engine_id = engine.run(&spec).await.unwrap();
        ContainerHandle {
            name: spec.name,
            engine_id,
            started_at: chrono::Utc::now(),
        }
    }

    fn guard(engine: Arc<FakeEngine>, budget: Duration) -> TimeoutGuard {
        TimeoutGuard::new(engine.clone(), ResourceReaper::new(engine), budget)
    }

    #[tokio::test]
    async fn test_natural_exit_leaves_container_for_log_capture() {
        let engine = Arc::new(FakeEngine::new(FakeRun::Exit {
            delay: Duration::from_millis(5),
            code: 3,
            writes: None,
        }));
        let handle = started(&engine).await;

        let outcome = guard(engine.clone(), Duration::from_secs(5)).supervise(&handle).await;

        assert_eq!(outcome, RunOutcome::NaturalExit { exit_code: 3 });
        assert!(engine.container_exists("1234-docker_run"));
    }

    #[tokio::test]
    async fn test_timeout_removes_container() {
        let engine = Arc::new(FakeEngine::new(FakeRun::Hang));
        let handle = started(&engine).await;

        let outcome = guard(engine.clone(), Duration::from_millis(20))
            .supervise(&handle)
            .await;

        assert_eq!(
            outcome,
            RunOutcome::Timeout {
                limit: Duration::from_millis(20)
            }
        );
        assert!(!engine.container_exists("1234-docker_run"));
        assert!(!engine.calls().iter().any(|c| c.starts_with("logs")));
    }

    #[tokio::test]
    async fn test_engine_fault_removes_container() {
        let engine = Arc::new(FakeEngine::new(FakeRun::WaitFails(
            "container killed by OOM".to_string(),
        )));
        let handle = started(&engine).await;

        let outcome = guard(engine.clone(), Duration::from_secs(5)).supervise(&handle).await;

        assert_eq!(
            outcome,
            RunOutcome::ApiError {
                message: "container killed by OOM".to_string()
            }
        );
        assert!(!engine.container_exists("1234-docker_run"));
    }

    #[test]
    fn test_outcome_messages() {
        let timeout = RunOutcome::Timeout {
            limit: Duration::from_secs(60),
        };
        assert_eq!(
            timeout.into_error().unwrap().to_string(),
            "Container exceeded execution time limit of 1.0 minutes; stopping container."
        );
        assert!(RunOutcome::NaturalExit { exit_code: 0 }.into_error().is_none());
    }
}

//! End-to-end evaluation of one submission
//!
//! pull -> run -> supervise -> capture logs -> reap -> report.
//! Every stage can short-circuit to INVALID; the reaper runs on every path
//! that got past configuration validation.

use crate::config::{CredentialProvider, Settings};
use crate::engine::ContainerEngine;
use crate::error::HarnessError;
use crate::harness::guard::{RunOutcome, TimeoutGuard};
use crate::harness::job::SubmissionJob;
use crate::harness::log_store::{persist_best_effort, LogStore};
use crate::harness::logs::LogCapture;
use crate::harness::puller::ImagePuller;
use crate::harness::reaper::ResourceReaper;
use crate::harness::reporter::{ExecutionResult, OutcomeReporter};
use crate::harness::runner::ContainerRunner;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// What the run stages left behind, before the artifact check
struct RunReport {
    error: Option<HarnessError>,
    log_path: Option<PathBuf>,
}

impl RunReport {
    fn failed(error: HarnessError, log_path: Option<PathBuf>) -> Self {
        Self {
            error: Some(error),
            log_path,
        }
    }
}

/// Runs submissions against one container engine.
///
/// An `Evaluator` holds no per-job state and can serve concurrent jobs;
/// names are derived from submission ids so jobs never collide.
pub struct Evaluator {
    engine: Arc<dyn ContainerEngine>,
    puller: ImagePuller,
    runner: ContainerRunner,
    reaper: ResourceReaper,
    logs: LogCapture,
    reporter: OutcomeReporter,
    log_store: Arc<dyn LogStore>,
    default_timeout: Duration,
}

impl Evaluator {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        settings: &Settings,
        log_store: Arc<dyn LogStore>,
    ) -> Self {
        let reaper = ResourceReaper::new(engine.clone());

        Self {
            puller: ImagePuller::new(engine.clone()),
            runner: ContainerRunner::new(engine.clone(), reaper.clone(), settings.memory_limit),
            logs: LogCapture::new(
                engine.clone(),
                &settings.log_dir,
                settings.log_size_threshold,
                settings.log_tail_lines,
            ),
            reporter: OutcomeReporter::new(&settings.predictions_file),
            default_timeout: settings.execution_timeout(),
            reaper,
            log_store,
            engine,
        }
    }

    /// Evaluate `job`. Never fails: every fault becomes an INVALID result.
    pub async fn evaluate(
        &self,
        job: &SubmissionJob,
        credentials: &dyn CredentialProvider,
    ) -> ExecutionResult {
        if let Err(err) = job.validate() {
            tracing::warn!(
                submission_id = %job.submission_id,
                kind = err.kind(),
                error = %err,
                "Submission rejected before running"
            );
            return ExecutionResult::invalid(&err, None);
        }

        let run = self.execute(job, credentials).await;

        self.reaper.remove_container(&job.container_name()).await;
        self.reaper.remove_image(&job.image.pinned()).await;

        let result = match run.error {
            Some(err) => {
                tracing::warn!(
                    submission_id = %job.submission_id,
                    kind = err.kind(),
                    forced_cleanup = err.required_forced_cleanup(),
                    error = %err,
                    "Submission invalid"
                );
                ExecutionResult::invalid(&err, run.log_path)
            }
            None => self.reporter.report(&job.output_dir, run.log_path).await,
        };

        tracing::info!(
            submission_id = %job.submission_id,
            status = %result.status,
            message = %result.message,
            "Evaluation finished"
        );

        result
    }

    async fn execute(&self, job: &SubmissionJob, credentials: &dyn CredentialProvider) -> RunReport {
        // before the pull, so a failed pull cannot leave a stale container behind
        self.runner.clear_stale(job).await;

        if let Err(err) = self.puller.pull(&job.image, credentials).await {
            return RunReport::failed(err, None);
        }

        let guard = TimeoutGuard::new(
            self.engine.clone(),
            self.reaper.clone(),
            job.timeout.unwrap_or(self.default_timeout),
        );

        let outcome = match self.runner.start(job).await {
            Ok(handle) => match guard.supervise(&handle).await {
                RunOutcome::NaturalExit { exit_code } => match self.logs.fetch(&handle).await {
                    Ok(raw) => {
                        if exit_code != 0 {
                            tracing::info!(
                                submission_id = %job.submission_id,
                                exit_code,
                                "Container exited with non-zero status"
                            );
                        }
                        let log_path = self.record_log(job, &raw).await;
                        return RunReport {
                            error: None,
                            log_path,
                        };
                    }
                    Err(e) => guard.abort(&handle.name, e.to_string()).await,
                },
                other => other,
            },
            Err(HarnessError::Engine(message)) => {
                guard.abort(&job.container_name(), message).await
            }
            Err(err) => return RunReport::failed(err, None),
        };

        match outcome.into_error() {
            Some(err) => {
                let log_path = self.record_log(job, err.to_string().as_bytes()).await;
                RunReport::failed(err, log_path)
            }
            None => RunReport {
                error: None,
                log_path: None,
            },
        }
    }

    /// Write, bound and (optionally) persist the job log. Best-effort.
    async fn record_log(&self, job: &SubmissionJob, raw: &[u8]) -> Option<PathBuf> {
        let path = match self.logs.write(job, raw).await {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(
                    submission_id = %job.submission_id,
                    error = %e,
                    "Unable to write log file"
                );
                return None;
            }
        };

        if job.store_logs {
            persist_best_effort(self.log_store.as_ref(), &path, &job.parent_id).await;
        }

        Some(path)
    }
}

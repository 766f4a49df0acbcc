//! Submission evaluation harness
//!
//! Runs one untrusted model container per job inside a sandbox
//! (read-only input, read-write output, no network, memory ceiling), bounds
//! its wall-clock time, captures a bounded log and tears everything down.

pub mod evaluator;
pub mod guard;
pub mod job;
pub mod log_store;
pub mod logs;
pub mod puller;
pub mod reaper;
pub mod reporter;
pub mod runner;

pub use evaluator::Evaluator;
pub use guard::{RunOutcome, TimeoutGuard};
pub use job::{ImageReference, SubmissionJob};
pub use log_store::{DirectoryLogStore, LogStore};
pub use logs::{LogCapture, EMPTY_LOG_PLACEHOLDER};
pub use puller::ImagePuller;
pub use reaper::ResourceReaper;
pub use reporter::{write_results, ExecutionResult, OutcomeReporter, ResultsRecord, ValidationStatus};
pub use runner::{ContainerHandle, ContainerRunner};

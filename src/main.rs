//! Model Eval Harness
//!
//! Runs one submitted model container in a sandbox and writes the
//! `results.json` record consumed by the scoring stage.

use anyhow::{Context, Result};
use clap::Parser;
use model_eval_harness::{
    config::{
        AnonymousCredentials, ConfigFileCredentials, CredentialProvider, EnvCredentials, Settings,
    },
    engine::DockerEngine,
    harness::{
        write_results, DirectoryLogStore, Evaluator, ExecutionResult, ImageReference,
        SubmissionJob,
    },
    logging::init_tracing,
    HarnessError,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Model Eval Harness
///
/// Pull a submitted image by digest, run it without network access against
/// the input directory, and report VALID/INVALID.
#[derive(Parser, Debug)]
#[command(name = "model-eval-harness")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Submission id; container and log names derive from it
    #[arg(short = 's', long)]
    submission_id: String,

    /// Docker repository of the submitted image
    #[arg(short = 'p', long, default_value = "")]
    docker_repository: String,

    /// Content digest of the submitted image (sha256:...)
    #[arg(short = 'd', long, default_value = "")]
    docker_digest: String,

    /// Input directory, mounted read-only at /input
    #[arg(short = 'i', long)]
    input_dir: PathBuf,

    /// Output directory, mounted read-write at /output
    /// (default: a per-submission directory under the system temp dir)
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Registry credentials file (INI, [authentication] username/authtoken)
    #[arg(short = 'c', long)]
    credentials_file: Option<PathBuf>,

    /// Store the bounded log file in the log store
    #[arg(long)]
    store: bool,

    /// Parent id under which logs are stored
    #[arg(long)]
    parent_id: String,

    /// Execution budget in seconds (overrides EXECUTION_TIMEOUT_SECONDS)
    #[arg(long)]
    timeout: Option<u64>,

    /// Results file path (overrides RESULTS_FILE)
    #[arg(long)]
    results: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load()?;
    if let Some(log_level) = args.log_level.clone() {
        settings.log_level = log_level;
    }
    if let Some(timeout) = args.timeout {
        settings.execution_timeout_seconds = timeout;
    }
    if let Some(results) = args.results.clone() {
        settings.results_file = results;
    }
    settings.validate()?;

    init_tracing(&settings.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        submission_id = %args.submission_id,
        timeout_secs = settings.execution_timeout_seconds,
        "Starting evaluation"
    );

    let output_dir = args.output_dir.clone().unwrap_or_else(|| {
        std::env::temp_dir().join(format!("{}-output", args.submission_id))
    });

    let job = SubmissionJob {
        submission_id: args.submission_id.clone(),
        image: ImageReference::new(&args.docker_repository, &args.docker_digest),
        input_dir: args.input_dir.clone(),
        output_dir,
        parent_id: args.parent_id.clone(),
        store_logs: args.store,
        timeout: args.timeout.map(Duration::from_secs),
    };

    let credentials: Box<dyn CredentialProvider> = match &args.credentials_file {
        Some(path) => Box::new(ConfigFileCredentials::new(path, &settings.registry_url)),
        None if EnvCredentials::is_configured() => {
            Box::new(EnvCredentials::new(&settings.registry_url))
        }
        None => Box::new(AnonymousCredentials),
    };

    let result = run(&settings, &job, credentials.as_ref()).await;

    write_results(&settings.results_file, &result)
        .await
        .with_context(|| format!("Failed to write {}", settings.results_file.display()))?;

    tracing::info!(
        status = %result.status,
        results = %settings.results_file.display(),
        "Results written"
    );

    Ok(())
}

/// Connect to the engine and evaluate. An unreachable engine still yields
/// a results record.
async fn run(
    settings: &Settings,
    job: &SubmissionJob,
    credentials: &dyn CredentialProvider,
) -> ExecutionResult {
    let engine = match DockerEngine::connect(
        settings.docker_host.as_deref(),
        settings.engine_request_timeout(),
    )
    .await
    {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %e, "Container engine unavailable");
            return ExecutionResult::invalid(&HarnessError::Engine(e.to_string()), None);
        }
    };

    if let Ok(version) = engine.version().await {
        tracing::info!(engine = %version, "Connected to container engine");
    }

    let evaluator = Evaluator::new(
        Arc::new(engine),
        settings,
        Arc::new(DirectoryLogStore::new(&settings.log_store_dir)),
    );

    evaluator.evaluate(job, credentials).await
}

//! Container log capture
//!
//! Logs are written to `<log_dir>/<submission_id>-docker_logs.txt` and then
//! bounded: a file over the size threshold is rewritten to hold only its
//! last few lines, which is where failures usually show up.

use crate::engine::ContainerEngine;
use crate::error::{EngineResult, HarnessError};
use crate::harness::job::SubmissionJob;
use crate::harness::runner::ContainerHandle;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Written instead of an empty log
pub const EMPTY_LOG_PLACEHOLDER: &str = "Docker container did not produce any STDOUT or logs.";

/// Block size for the backward scan
const TAIL_CHUNK: usize = 4096;

/// Retrieves, writes and bounds job logs
pub struct LogCapture {
    engine: Arc<dyn ContainerEngine>,
    log_dir: PathBuf,
    size_threshold: u64,
    tail_lines: usize,
}

impl LogCapture {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        log_dir: impl Into<PathBuf>,
        size_threshold: u64,
        tail_lines: usize,
    ) -> Self {
        Self {
            engine,
            log_dir: log_dir.into(),
            size_threshold,
            tail_lines,
        }
    }

    /// Where this job's log file lives
    pub fn log_path(&self, job: &SubmissionJob) -> PathBuf {
        self.log_dir.join(job.log_file_name())
    }

    /// Pull combined stdout+stderr from the engine.
    ///
    /// Only valid after a natural exit, while the container still exists.
    pub async fn fetch(&self, handle: &ContainerHandle) -> EngineResult<Vec<u8>> {
        self.engine.logs(&handle.name).await
    }

    /// Write `raw` (or the placeholder when empty) and bound the file
    pub async fn write(&self, job: &SubmissionJob, raw: &[u8]) -> Result<PathBuf, HarnessError> {
        let text = sanitize(raw);
        let text = if text.is_empty() {
            EMPTY_LOG_PLACEHOLDER.to_string()
        } else {
            text
        };

        tokio::fs::create_dir_all(&self.log_dir).await?;
        let path = self.log_path(job);
        tokio::fs::write(&path, text).await?;

        let bounded = {
            let path = path.clone();
            let threshold = self.size_threshold;
            let lines = self.tail_lines;
            tokio::task::spawn_blocking(move || bound_log_file(&path, threshold, lines))
                .await
                .map_err(|e| HarnessError::Io(io::Error::new(io::ErrorKind::Other, e)))??
        };

        tracing::debug!(
            submission_id = %job.submission_id,
            path = %path.display(),
            truncated = bounded,
            "Log file written"
        );

        Ok(path)
    }
}

/// Keep ASCII only, matching what downstream log viewers accept
pub fn sanitize(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(char::is_ascii)
        .collect()
}

/// Rewrite `path` to its last `lines` lines if it is larger than
/// `threshold` bytes. Returns whether the file was rewritten.
pub fn bound_log_file(path: &Path, threshold: u64, lines: usize) -> io::Result<bool> {
    let size = std::fs::metadata(path)?.len();
    if size <= threshold {
        return Ok(false);
    }

    let tail = tail_lines(path, lines)?;
    std::fs::write(path, tail)?;
    Ok(true)
}

/// Read the last `n` lines of a file by scanning backwards from the end.
///
/// The final byte is skipped so a trailing newline does not count as an
/// empty last line. With fewer than `n` lines the whole file is returned.
pub fn tail_lines(path: &Path, n: usize) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len == 0 || n == 0 {
        return Ok(Vec::new());
    }

    let mut start = 0u64;
    let mut end = len - 1;
    let mut found = 0usize;
    let mut buf = vec![0u8; TAIL_CHUNK];

    'scan: while end > 0 {
        let chunk_start = end.saturating_sub(TAIL_CHUNK as u64);
        let size = (end - chunk_start) as usize;
        file.seek(SeekFrom::Start(chunk_start))?;
        file.read_exact(&mut buf[..size])?;

        for (i, byte) in buf[..size].iter().enumerate().rev() {
            if *byte == b'\n' {
                found += 1;
                if found == n {
                    start = chunk_start + i as u64 + 1;
                    break 'scan;
                }
            }
        }
        end = chunk_start;
    }

    file.seek(SeekFrom::Start(start))?;
    let mut tail = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut tail)?;
    Ok(tail)
}

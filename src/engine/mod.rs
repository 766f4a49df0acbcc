//! Container engine capability
//!
//! The harness never talks to Docker directly; every stage goes through
//! `ContainerEngine`, so the lifecycle can be driven by a fake in tests.

pub mod docker;
#[cfg(test)]
pub mod fake;

use crate::config::RegistryCredentials;
use crate::error::EngineResult;
use async_trait::async_trait;
use std::path::PathBuf;

pub use docker::DockerEngine;

/// Everything needed to create a sandboxed container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    /// Deterministic container name
    pub name: String,
    /// Image reference, pinned by digest
    pub image: String,
    /// Host directory bound read-only at `/input`
    pub input_dir: PathBuf,
    /// Host directory bound read-write at `/output`
    pub output_dir: PathBuf,
    /// Memory ceiling in bytes
    pub memory_limit: i64,
    pub network_disabled: bool,
}

/// Operations the harness needs from a container engine.
///
/// Operations take container names, not engine ids, so a stale container
/// from a crashed attempt can be addressed without knowing its id.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Pull an image, authenticating with `credentials` when given
    async fn pull(&self, image: &str, credentials: Option<&RegistryCredentials>)
        -> EngineResult<()>;

    /// Create and start a detached container; returns the engine id
    async fn run(&self, spec: &ContainerSpec) -> EngineResult<String>;

    /// Block until the container stops; returns its exit code
    async fn wait(&self, name: &str) -> EngineResult<i64>;

    /// Combined stdout and stderr, in emission order
    async fn logs(&self, name: &str) -> EngineResult<Vec<u8>>;

    /// Stop immediately, without a grace period
    async fn stop(&self, name: &str) -> EngineResult<()>;

    /// Force-remove a container
    async fn remove(&self, name: &str) -> EngineResult<()>;

    /// Force-remove an image
    async fn remove_image(&self, image: &str) -> EngineResult<()>;
}

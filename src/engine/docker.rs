//! Docker implementation of `ContainerEngine`
//!
//! Talks to the Docker daemon through bollard. Errors are flattened into
//! `EngineError` with the daemon's own text preserved.

use super::{ContainerEngine, ContainerSpec};
use crate::config::settings::{CONTAINER_INPUT_DIR, CONTAINER_OUTPUT_DIR};
use crate::config::RegistryCredentials;
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions, WaitContainerOptions,
};
use bollard::image::{CreateImageOptions, RemoveImageOptions};
use bollard::service::HostConfig;
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use std::time::Duration;

/// Request timeout bollard starts with before `with_timeout` raises it
const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Docker-backed container engine
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to the daemon and verify it answers.
    ///
    /// `request_timeout` must exceed the job's execution budget: the wait
    /// call is a single long-lived request and must only ever be cut short
    /// by the harness's own deadline.
    pub async fn connect(host: Option<&str>, request_timeout: Duration) -> EngineResult<Self> {
        let docker = match host.and_then(unix_socket_path) {
            Some(socket) => {
                Docker::connect_with_unix(socket, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            // tcp:// and npipe:// are resolved from DOCKER_HOST by bollard
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| EngineError::Unavailable(e.to_string()))?
        .with_timeout(request_timeout);

        docker
            .ping()
            .await
            .map_err(|e| EngineError::Unavailable(format!("Failed to ping Docker: {}", e)))?;

        Ok(Self { docker })
    }

    /// Get Docker version info
    pub async fn version(&self) -> EngineResult<String> {
        let version = self.docker.version().await.map_err(map_error)?;

        Ok(format!(
            "Docker {} (API {})",
            version.version.unwrap_or_default(),
            version.api_version.unwrap_or_default()
        ))
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn pull(
        &self,
        image: &str,
        credentials: Option<&RegistryCredentials>,
    ) -> EngineResult<()> {
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };
        let auth = credentials.map(|c| DockerCredentials {
            username: Some(c.username.clone()),
            password: Some(c.password.clone()),
            serveraddress: Some(c.server_address.clone()),
            ..Default::default()
        });

        let mut stream = self.docker.create_image(Some(options), None, auth);
        while let Some(progress) = stream.next().await {
            let info = progress.map_err(map_error)?;
            if let Some(err) = info.error {
                return Err(EngineError::Api(err));
            }
            if let Some(status) = info.status {
                tracing::trace!(image = %image, status = %status, "Pull progress");
            }
        }

        Ok(())
    }

    async fn run(&self, spec: &ContainerSpec) -> EngineResult<String> {
        let host_config = HostConfig {
            binds: Some(bind_mounts(spec)),
            memory: Some(spec.memory_limit),
            network_mode: if spec.network_disabled {
                Some("none".to_string())
            } else {
                None
            },
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            network_disabled: Some(spec.network_disabled),
            attach_stdout: Some(false),
            attach_stderr: Some(false),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.as_str(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(map_error)?;

        for warning in &response.warnings {
            tracing::warn!(container = %spec.name, warning = %warning, "Engine warning on create");
        }

        self.docker
            .start_container(&response.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(map_error)?;

        Ok(response.id)
    }

    async fn wait(&self, name: &str) -> EngineResult<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut stream = self.docker.wait_container(name, Some(options));
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error; it is still a
            // natural exit as far as the harness is concerned
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(map_error(e)),
            None => Err(EngineError::Api(format!(
                "wait on container {} ended without a status",
                name
            ))),
        }
    }

    async fn logs(&self, name: &str) -> EngineResult<Vec<u8>> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Default::default()
        };

        let mut combined = Vec::new();
        let mut stream = self.docker.logs(name, Some(options));
        while let Some(chunk) = stream.next().await {
            let output = chunk.map_err(map_error)?;
            combined.extend_from_slice(&output.into_bytes());
        }

        Ok(combined)
    }

    async fn stop(&self, name: &str) -> EngineResult<()> {
        match self
            .docker
            .stop_container(name, Some(StopContainerOptions { t: 0 }))
            .await
        {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(map_error(e)),
        }
    }

    async fn remove(&self, name: &str) -> EngineResult<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_container(name, Some(options))
            .await
            .map_err(map_error)
    }

    async fn remove_image(&self, image: &str) -> EngineResult<()> {
        let options = RemoveImageOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_image(image, Some(options), None)
            .await
            .map(|deleted| {
                tracing::debug!(image = %image, entries = deleted.len(), "Image removed");
            })
            .map_err(map_error)
    }
}

/// Socket path of a unix endpoint (`unix:///run/docker.sock` or a bare path)
fn unix_socket_path(host: &str) -> Option<&str> {
    match host.strip_prefix("unix://") {
        Some(path) => Some(path),
        None if host.starts_with('/') => Some(host),
        None => None,
    }
}

/// `host:container:mode` bind strings for the two job directories
fn bind_mounts(spec: &ContainerSpec) -> Vec<String> {
    vec![
        format!("{}:{}:ro", spec.input_dir.display(), CONTAINER_INPUT_DIR),
        format!("{}:{}:rw", spec.output_dir.display(), CONTAINER_OUTPUT_DIR),
    ]
}

fn map_error(err: bollard::errors::Error) -> EngineError {
    use bollard::errors::Error;

    match err {
        Error::DockerResponseServerError {
            status_code: 404,
            message,
        } => EngineError::NotFound(message),
        Error::DockerResponseServerError { message, .. } => EngineError::Api(message),
        other => EngineError::Api(other.to_string()),
    }
}

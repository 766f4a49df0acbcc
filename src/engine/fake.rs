//! In-memory `ContainerEngine` for lifecycle tests

use super::{ContainerEngine, ContainerSpec};
use crate::config::RegistryCredentials;
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

/// How the fake container behaves once started
#[derive(Debug, Clone)]
pub enum FakeRun {
    /// Exit after `delay` with `code`; optionally write the named file to `/output`
    Exit {
        delay: Duration,
        code: i64,
        writes: Option<String>,
    },
    /// Never exits
    Hang,
    /// The wait call fails with this engine text
    WaitFails(String),
}

#[derive(Debug)]
pub struct FakeEngine {
    pub pull_error: Option<String>,
    pub run_error: Option<String>,
    pub logs_error: Option<String>,
    pub remove_image_error: Option<String>,
    pub behavior: FakeRun,
    pub log_output: Vec<u8>,

    containers: Mutex<HashSet<String>>,
    images: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    seen_credentials: Mutex<Option<RegistryCredentials>>,
    last_spec: Mutex<Option<ContainerSpec>>,
}

impl FakeEngine {
    pub fn new(behavior: FakeRun) -> Self {
        Self {
            pull_error: None,
            run_error: None,
            logs_error: None,
            remove_image_error: None,
            behavior,
            log_output: Vec::new(),
            containers: Mutex::new(HashSet::new()),
            images: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            seen_credentials: Mutex::new(None),
            last_spec: Mutex::new(None),
        }
    }

    /// A container that exits cleanly after writing `predictions.csv`
    pub fn writing_predictions() -> Self {
        Self::new(FakeRun::Exit {
            delay: Duration::from_millis(5),
            code: 0,
            writes: Some("predictions.csv".to_string()),
        })
    }

    /// Leave a container behind, as a crashed earlier attempt would
    pub fn with_stale_container(self, name: &str) -> Self {
        self.containers.lock().unwrap().insert(name.to_string());
        self
    }

    pub fn container_exists(&self, name: &str) -> bool {
        self.containers.lock().unwrap().contains(name)
    }

    pub fn image_exists(&self, image: &str) -> bool {
        self.images.lock().unwrap().contains(image)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn seen_credentials(&self) -> Option<RegistryCredentials> {
        self.seen_credentials.lock().unwrap().clone()
    }

    pub fn last_spec(&self) -> Option<ContainerSpec> {
        self.last_spec.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn pull(
        &self,
        image: &str,
        credentials: Option<&RegistryCredentials>,
    ) -> EngineResult<()> {
        self.record(format!("pull {}", image));
        *self.seen_credentials.lock().unwrap() = credentials.cloned();
        if let Some(err) = &self.pull_error {
            return Err(EngineError::Api(err.clone()));
        }
        self.images.lock().unwrap().insert(image.to_string());
        Ok(())
    }

    async fn run(&self, spec: &ContainerSpec) -> EngineResult<String> {
        self.record(format!("run {}", spec.name));
        *self.last_spec.lock().unwrap() = Some(spec.clone());
        if let Some(err) = &self.run_error {
            return Err(EngineError::Api(err.clone()));
        }

        let mut containers = self.containers.lock().unwrap();
        if !containers.insert(spec.name.clone()) {
            return Err(EngineError::Api(format!(
                "Conflict. The container name \"/{}\" is already in use",
                spec.name
            )));
        }
        drop(containers);

        if let FakeRun::Exit {
            writes: Some(file), ..
        } = &self.behavior
        {
            std::fs::write(spec.output_dir.join(file), "id,probability\n1,0.5\n")
                .map_err(|e| EngineError::Api(e.to_string()))?;
        }

        Ok(format!("fake-{}", spec.name))
    }

    async fn wait(&self, name: &str) -> EngineResult<i64> {
        self.record(format!("wait {}", name));
        match &self.behavior {
            FakeRun::Exit { delay, code, .. } => {
                tokio::time::sleep(*delay).await;
                Ok(*code)
            }
            FakeRun::Hang => std::future::pending().await,
            FakeRun::WaitFails(err) => Err(EngineError::Api(err.clone())),
        }
    }

    async fn logs(&self, name: &str) -> EngineResult<Vec<u8>> {
        self.record(format!("logs {}", name));
        match &self.logs_error {
            Some(err) => Err(EngineError::Api(err.clone())),
            None => Ok(self.log_output.clone()),
        }
    }

    async fn stop(&self, name: &str) -> EngineResult<()> {
        self.record(format!("stop {}", name));
        if self.container_exists(name) {
            Ok(())
        } else {
            Err(EngineError::NotFound(format!("No such container: {}", name)))
        }
    }

    async fn remove(&self, name: &str) -> EngineResult<()> {
        self.record(format!("remove {}", name));
        if self.containers.lock().unwrap().remove(name) {
            Ok(())
        } else {
            Err(EngineError::NotFound(format!("No such container: {}", name)))
        }
    }

    async fn remove_image(&self, image: &str) -> EngineResult<()> {
        self.record(format!("remove_image {}", image));
        if let Some(err) = &self.remove_image_error {
            return Err(EngineError::Api(err.clone()));
        }
        if self.images.lock().unwrap().remove(image) {
            Ok(())
        } else {
            Err(EngineError::NotFound(format!("No such image: {}", image)))
        }
    }
}

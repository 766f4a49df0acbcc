//! Best-effort teardown of containers and images
//!
//! Nothing here returns an error: by the time the reaper runs the job's
//! outcome is already decided, and a failed removal must not change it.

use crate::engine::ContainerEngine;
use crate::error::EngineError;
use std::sync::Arc;

/// Stops and removes job artifacts, logging failures
#[derive(Clone)]
pub struct ResourceReaper {
    engine: Arc<dyn ContainerEngine>,
}

impl ResourceReaper {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// Stop then force-remove the named container.
    ///
    /// Returns `true` if a container was actually removed.
    pub async fn remove_container(&self, name: &str) -> bool {
        if let Err(e) = self.engine.stop(name).await {
            log_failure("stop", name, &e);
        }

        match self.engine.remove(name).await {
            Ok(()) => {
                tracing::info!(container = %name, "Container removed");
                true
            }
            Err(e) => {
                log_failure("remove", name, &e);
                false
            }
        }
    }

    /// Force-remove the image to bound disk usage on the shared host
    pub async fn remove_image(&self, image: &str) -> bool {
        match self.engine.remove_image(image).await {
            Ok(()) => {
                tracing::info!(image = %image, "Image removed");
                true
            }
            Err(e) => {
                log_failure("remove image", image, &e);
                false
            }
        }
    }
}

fn log_failure(action: &str, target: &str, err: &EngineError) {
    if err.is_not_found() {
        tracing::debug!(target_name = %target, action, "Nothing to clean up");
    } else {
        tracing::warn!(
            target_name = %target,
            action,
            error = %err,
            "Unable to clean up; continuing"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeEngine;

    #[tokio::test]
    async fn test_remove_stale_container() {
        let engine = Arc::new(FakeEngine::writing_predictions().with_stale_container("1234-docker_run"));
        let reaper = ResourceReaper::new(engine.clone());

        assert!(reaper.remove_container("1234-docker_run").await);
        assert!(!engine.container_exists("1234-docker_run"));
        assert_eq!(
            engine.calls(),
            vec![
                "stop 1234-docker_run".to_string(),
                "remove 1234-docker_run".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_container_is_not_an_error() {
        let reaper = ResourceReaper::new(Arc::new(FakeEngine::writing_predictions()));
        assert!(!reaper.remove_container("absent-docker_run").await);
    }

    #[tokio::test]
    async fn test_image_removal_failure_is_swallowed() {
        let mut fake = FakeEngine::writing_predictions();
        fake.remove_image_error = Some("image is in use".to_string());
        let reaper = ResourceReaper::new(Arc::new(fake));

        assert!(!reaper.remove_image("repo@sha256:abc").await);
    }
}

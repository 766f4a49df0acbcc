//! Image acquisition

use crate::config::CredentialProvider;
use crate::engine::ContainerEngine;
use crate::error::HarnessError;
use crate::harness::job::ImageReference;
use std::sync::Arc;

/// Pulls submitted images by digest
pub struct ImagePuller {
    engine: Arc<dyn ContainerEngine>,
}

impl ImagePuller {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// Resolve credentials for this job and pull `image`.
    ///
    /// Nothing is created on failure, so the caller has nothing to clean up
    /// beyond the (possibly partial) image.
    pub async fn pull(
        &self,
        image: &ImageReference,
        credentials: &dyn CredentialProvider,
    ) -> Result<(), HarnessError> {
        let login = credentials.registry_credentials()?;
        let pinned = image.pinned();

        tracing::info!(
            image = %pinned,
            authenticated = login.is_some(),
            "Pulling submitted Docker image"
        );

        self.engine
            .pull(&pinned, login.as_ref())
            .await
            .map_err(|e| HarnessError::Pull(e.to_string()))
    }
}

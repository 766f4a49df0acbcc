//! Registry credential providers
//!
//! Credentials are resolved per job from an explicit provider value and
//! handed to the image pull. Nothing here is cached globally.

use crate::error::HarnessError;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Login secrets for one registry
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    pub server_address: String,
}

impl RegistryCredentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        server_address: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            server_address: server_address.into(),
        }
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server_address", &self.server_address)
            .finish()
    }
}

/// Source of registry login secrets
pub trait CredentialProvider: Send + Sync {
    /// Resolve credentials; `Ok(None)` means pull anonymously
    fn registry_credentials(&self) -> Result<Option<RegistryCredentials>, HarnessError>;
}

/// Pulls without logging in
#[derive(Debug, Default, Clone)]
pub struct AnonymousCredentials;

impl CredentialProvider for AnonymousCredentials {
    fn registry_credentials(&self) -> Result<Option<RegistryCredentials>, HarnessError> {
        Ok(None)
    }
}

/// Reads an INI credentials file with an `[authentication]` section
/// holding `username` and `authtoken`.
#[derive(Debug, Clone)]
pub struct ConfigFileCredentials {
    path: PathBuf,
    registry: String,
}

impl ConfigFileCredentials {
    pub fn new(path: impl Into<PathBuf>, registry: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            registry: registry.into(),
        }
    }
}

impl CredentialProvider for ConfigFileCredentials {
    fn registry_credentials(&self) -> Result<Option<RegistryCredentials>, HarnessError> {
        let path = self.path.to_string_lossy();
        let parsed = config::Config::builder()
            .add_source(config::File::new(&path, config::FileFormat::Ini).required(true))
            .build()
            .map_err(|e| HarnessError::Credentials(format!("{}: {}", path, e)))?;

        let username = parsed
            .get_string("authentication.username")
            .map_err(|e| HarnessError::Credentials(e.to_string()))?;
        let token = parsed
            .get_string("authentication.authtoken")
            .map_err(|e| HarnessError::Credentials(e.to_string()))?;

        Ok(Some(RegistryCredentials::new(
            username,
            token,
            self.registry.clone(),
        )))
    }
}

/// Reads `REGISTRY_USERNAME` / `REGISTRY_PASSWORD`
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    registry: String,
}

impl EnvCredentials {
    pub fn new(registry: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
        }
    }

    /// Whether both variables are present
    pub fn is_configured() -> bool {
        env::var("REGISTRY_USERNAME").is_ok() && env::var("REGISTRY_PASSWORD").is_ok()
    }
}

impl CredentialProvider for EnvCredentials {
    fn registry_credentials(&self) -> Result<Option<RegistryCredentials>, HarnessError> {
        let username = env::var("REGISTRY_USERNAME")
            .map_err(|_| HarnessError::Credentials("REGISTRY_USERNAME is not set".to_string()))?;
        let password = env::var("REGISTRY_PASSWORD")
            .map_err(|_| HarnessError::Credentials("REGISTRY_PASSWORD is not set".to_string()))?;

        Ok(Some(RegistryCredentials::new(
            username,
            password,
            self.registry.clone(),
        )))
    }
}

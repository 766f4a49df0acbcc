//! Configuration management module
//!
//! Harness settings come from environment variables and `.env` files;
//! registry credentials come from an explicit provider.

pub mod credentials;
pub mod settings;

pub use credentials::{
    AnonymousCredentials, ConfigFileCredentials, CredentialProvider, EnvCredentials,
    RegistryCredentials,
};
pub use settings::{parse_memory_limit, Settings};

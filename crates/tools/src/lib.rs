//! Chainforge Tools Library
//!
//! Typed deployment configuration for smart-contract build and migration runs:
//! network profiles, the pinned compiler, plugins, explorer API keys, and the
//! lazily built signing provider.

pub mod config;
pub mod error;
pub mod logging;
pub mod provider;
pub mod schema;
pub mod secrets;

#[cfg(test)]
mod tests;

pub use config::{
    ApiKeySet, CompilerSpec, Config, ConfigLoader, ConfigSource, NetworkId, NetworkProfile,
};
pub use error::ConfigError;
pub use provider::{materialize_provider, DeploymentSession, ProviderFactory, SigningProvider};
pub use secrets::{EnvSecrets, PrivateKey, PrivateKeys, SecretSource};

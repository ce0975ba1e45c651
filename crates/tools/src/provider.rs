//! Signing provider construction
//!
//! Building a provider is the only step that touches key material, and it is
//! kept apart from configuration loading: resolve a [`NetworkProfile`] first,
//! then call [`materialize_provider`] (or go through a [`DeploymentSession`],
//! which does it at most once).

use std::cell::OnceCell;
use tracing::{debug, info};

use crate::config::{validate_host, Config, NetworkId, NetworkProfile};
use crate::error::ConfigError;
use crate::secrets::{PrivateKeys, SecretSource};

/// Builds signing providers bound to a network endpoint
pub trait ProviderFactory {
    fn create(
        &self,
        profile: &NetworkProfile,
        keys: &PrivateKeys,
    ) -> Result<SigningProvider, ConfigError>;
}

impl<F: ProviderFactory + ?Sized> ProviderFactory for &F {
    fn create(
        &self,
        profile: &NetworkProfile,
        keys: &PrivateKeys,
    ) -> Result<SigningProvider, ConfigError> {
        (**self).create(profile, keys)
    }
}

/// Provider that signs with a fixed list of hex private keys, one account
/// per key in the order given.
#[derive(Debug, Clone, Copy, Default)]
pub struct HdWalletFactory;

impl ProviderFactory for HdWalletFactory {
    fn create(
        &self,
        profile: &NetworkProfile,
        keys: &PrivateKeys,
    ) -> Result<SigningProvider, ConfigError> {
        let failed = |reason: String| ConfigError::ProviderConstructionFailed {
            network: profile.name.clone(),
            reason,
        };

        if keys.is_empty() {
            return Err(failed("no private keys supplied".to_string()));
        }
        if let Some(index) = keys.iter().position(|key| !key.is_well_formed()) {
            return Err(failed(format!(
                "private key #{} is not 32 bytes of hex",
                index + 1
            )));
        }

        if profile.port == 0 {
            return Err(failed("endpoint port cannot be 0".to_string()));
        }
        validate_host(&profile.host)
            .map_err(|reason| failed(format!("unusable endpoint: {}", reason)))?;

        Ok(SigningProvider {
            network: profile.name.clone(),
            rpc_url: profile.rpc_url(),
            network_id: profile.network_id.clone(),
            keys: keys.clone(),
        })
    }
}

/// Transaction signer bound to one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningProvider {
    network: String,
    rpc_url: String,
    network_id: NetworkId,
    keys: PrivateKeys,
}

impl SigningProvider {
    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn network_id(&self) -> &NetworkId {
        &self.network_id
    }

    pub fn account_count(&self) -> usize {
        self.keys.len()
    }
}

/// Build a provider for `profile` with the default [`HdWalletFactory`]
pub fn materialize_provider(
    profile: &NetworkProfile,
    keys: &PrivateKeys,
) -> Result<SigningProvider, ConfigError> {
    materialize_with(&HdWalletFactory, profile, keys)
}

/// Build a provider for `profile` with a specific factory
pub fn materialize_with<F: ProviderFactory + ?Sized>(
    factory: &F,
    profile: &NetworkProfile,
    keys: &PrivateKeys,
) -> Result<SigningProvider, ConfigError> {
    info!(
        network = %profile.name,
        accounts = keys.len(),
        "Materializing signing provider"
    );
    factory.create(profile, keys)
}

/// One deployment run against a single network.
///
/// The provider is built lazily on the first [`DeploymentSession::provider`]
/// call and reused afterwards.
pub struct DeploymentSession<'a, F: ProviderFactory = HdWalletFactory> {
    profile: &'a NetworkProfile,
    factory: F,
    provider: OnceCell<SigningProvider>,
}

impl<'a> DeploymentSession<'a, HdWalletFactory> {
    pub fn new(config: &'a Config, network: &str) -> Result<Self, ConfigError> {
        Self::with_factory(config, network, HdWalletFactory)
    }
}

impl<'a, F: ProviderFactory> DeploymentSession<'a, F> {
    pub fn with_factory(config: &'a Config, network: &str, factory: F) -> Result<Self, ConfigError> {
        let profile = config.resolve_network(network)?;
        debug!(network = %profile.name, "Deployment session opened");
        Ok(Self {
            profile,
            factory,
            provider: OnceCell::new(),
        })
    }

    pub fn profile(&self) -> &NetworkProfile {
        self.profile
    }

    pub fn is_materialized(&self) -> bool {
        self.provider.get().is_some()
    }

    /// Provider for this run, reading keys from `secrets` on first use
    pub fn provider(&self, secrets: &dyn SecretSource) -> Result<&SigningProvider, ConfigError> {
        if let Some(provider) = self.provider.get() {
            return Ok(provider);
        }
        let keys = PrivateKeys::from_source(secrets, &self.profile.name)?;
        let provider = materialize_with(&self.factory, self.profile, &keys)?;
        Ok(self.provider.get_or_init(|| provider))
    }
}

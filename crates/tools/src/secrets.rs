//! Runtime key material
//!
//! Private keys never come from the configuration file. They are read from
//! the environment when a signing provider is about to be built, and a missing
//! key is an error rather than a reason to fall back to anything.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::ConfigError;

/// Comma-separated private keys shared by every network.
pub const PRIVATE_KEYS_ENV: &str = "CHAINFORGE_PRIVATE_KEYS";

/// Lookup of named secrets.
pub trait SecretSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Process environment, optionally backed by a `.env` file.
///
/// The file is read into memory and consulted only for variables the process
/// environment does not set. The process environment itself is never
/// modified.
#[derive(Debug, Clone, Default)]
pub struct EnvSecrets {
    dotenv: HashMap<String, String>,
}

impl EnvSecrets {
    /// Process environment only
    pub fn new() -> Self {
        Self::default()
    }

    /// Process environment plus `.env` from the working directory, if present
    pub fn with_dotenv() -> Result<Self, ConfigError> {
        match dotenvy::dotenv_iter() {
            Ok(iter) => Self::collect(iter),
            // Missing .env is fine
            Err(e) if e.not_found() => Ok(Self::new()),
            Err(e) => Err(ConfigError::Dotenv(e)),
        }
    }

    /// Process environment plus the variables defined in `path`
    pub fn from_dotenv_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::collect(dotenvy::from_path_iter(path.as_ref())?)
    }

    fn collect<R: std::io::Read>(iter: dotenvy::Iter<R>) -> Result<Self, ConfigError> {
        let dotenv = iter.collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self { dotenv })
    }
}

impl SecretSource for EnvSecrets {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| self.dotenv.get(key).cloned())
    }
}

impl SecretSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// `{prefix}_{NAME}` with `name` upper-cased and anything outside
/// `[A-Za-z0-9]` replaced by `_`, so the result is always a settable variable.
pub fn env_var_name(prefix: &str, name: &str) -> String {
    let suffix: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", prefix, suffix)
}

/// Per-network override, e.g. `CHAINFORGE_PRIVATE_KEYS_BSCTESTNET`
pub fn network_keys_var(network: &str) -> String {
    env_var_name(PRIVATE_KEYS_ENV, network)
}

/// A single private key. Its contents never appear in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(key: impl Into<String>) -> Self {
        PrivateKey(key.into())
    }

    /// Hex digits without any `0x` prefix
    pub fn hex(&self) -> &str {
        self.0
            .strip_prefix("0x")
            .or_else(|| self.0.strip_prefix("0X"))
            .unwrap_or(&self.0)
    }

    /// Whether this is 32 bytes of hex
    pub fn is_well_formed(&self) -> bool {
        let hex = self.hex();
        hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Ordered list of keys handed to a provider factory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivateKeys(Vec<PrivateKey>);

impl PrivateKeys {
    pub fn new(keys: Vec<PrivateKey>) -> Self {
        PrivateKeys(keys)
    }

    /// Read the keys for `network`
    ///
    /// The network-specific variable wins over [`PRIVATE_KEYS_ENV`].
    ///
    /// # Errors
    ///
    /// `ConfigError::MissingSecret` if neither variable holds a key.
    pub fn from_source(source: &dyn SecretSource, network: &str) -> Result<Self, ConfigError> {
        let network_var = network_keys_var(network);
        let value = source
            .get(&network_var)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| source.get(PRIVATE_KEYS_ENV))
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::MissingSecret(format!("{} or {}", network_var, PRIVATE_KEYS_ENV))
            })?;

        let keys: Vec<PrivateKey> = value
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(PrivateKey::new)
            .collect();

        if keys.is_empty() {
            return Err(ConfigError::MissingSecret(PRIVATE_KEYS_ENV.to_string()));
        }
        Ok(PrivateKeys(keys))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PrivateKey> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

//! Deployment configuration management
//!
//! This module turns a declarative deployment file into a typed, validated
//! [`Config`]. Configuration is resolved in this order:
//!
//! 1. The selected source (embedded default, file, or string)
//! 2. Explorer API key overrides from the environment (`CHAINFORGE_API_KEY_*`)
//! 3. Validation; any failure stops the load
//!
//! The resulting value is immutable and handed by reference to whatever drives
//! the deployment. Key material is not part of it: see [`crate::secrets`] and
//! [`crate::provider`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use chainforge_tools::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let network = config.resolve_network("bscTestnet")?;
//! println!("RPC URL: {}", network.rpc_url());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::schema::{RawConfig, RawNetwork, RawNetworkId, RawOptimizer};
use crate::secrets::{env_var_name, EnvSecrets, SecretSource};

/// Configuration compiled into the binary, used when no file is given.
pub const DEFAULT_CONFIG: &str = include_str!("../chainforge.toml");

/// Prefix for explorer API key overrides, e.g. `CHAINFORGE_API_KEY_BSCSCAN`.
pub const API_KEY_ENV_PREFIX: &str = "CHAINFORGE_API_KEY";

/// Optimizer runs assumed when the optimizer is enabled without a count.
pub const DEFAULT_OPTIMIZER_RUNS: u32 = 200;

/// Chain id meaning "any network".
pub const NETWORK_ID_WILDCARD: &str = "*";

/// Explorer services whose API keys share the 34-character format.
pub const KNOWN_EXPLORERS: &[&str] = &[
    "bscscan",
    "etherscan",
    "polygonscan",
    "hecoinfo",
    "ftmscan",
];

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "ws", "wss"];

/// Chain identifier a network profile accepts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NetworkId {
    /// Wildcard, any chain id is accepted
    Any,
    /// A specific chain id, kept as written
    Id(String),
}

impl NetworkId {
    pub fn as_str(&self) -> &str {
        match self {
            NetworkId::Any => NETWORK_ID_WILDCARD,
            NetworkId::Id(id) => id,
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for NetworkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Connection parameters for one deployment target.
///
/// This is plain data. Signing providers are built separately by
/// [`crate::provider::materialize_provider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkProfile {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub network_id: NetworkId,
}

impl NetworkProfile {
    /// Endpoint a signing provider binds to
    pub fn rpc_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.contains("://") {
            format!("{}:{}", host, self.port)
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }
}

/// Pinned compiler and optimizer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilerSpec {
    pub version: String,
    pub optimizer_enabled: bool,
    /// Kept even when the optimizer is disabled, but only meaningful when it
    /// is enabled; see [`CompilerSpec::effective_runs`].
    pub optimizer_runs: Option<u32>,
}

impl CompilerSpec {
    pub fn effective_runs(&self) -> Option<u32> {
        if self.optimizer_enabled {
            self.optimizer_runs
        } else {
            None
        }
    }
}

/// Explorer service name to API credential.
///
/// An empty credential means the service is not configured. `Debug` and
/// `Serialize` mask the values.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKeySet(BTreeMap<String, String>);

impl ApiKeySet {
    pub fn new(keys: BTreeMap<String, String>) -> Self {
        Self(keys)
    }

    /// Raw credential, `Some("")` for a declared but unconfigured service
    pub fn get(&self, service: &str) -> Option<&str> {
        self.0.get(service).map(String::as_str)
    }

    /// Credential only if one is actually set
    pub fn configured(&self, service: &str) -> Option<&str> {
        self.get(service).filter(|key| !key.is_empty())
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Format check only; the explorer is never contacted.
    pub fn is_plausible(service: &str, key: &str) -> bool {
        if key.is_empty() || !KNOWN_EXPLORERS.contains(&service) {
            return true;
        }
        key.len() == 34
            && key
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    }

    fn masked(&self) -> BTreeMap<&str, String> {
        self.0
            .iter()
            .map(|(service, key)| (service.as_str(), mask(key)))
            .collect()
    }
}

fn mask(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{}", tail)
}

impl fmt::Debug for ApiKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.masked()).finish()
    }
}

impl Serialize for ApiKeySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.masked().serialize(serializer)
    }
}

/// Artifact database settings. Disabled unless explicitly enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default)]
    pub adapter: DbAdapter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbAdapter {
    #[serde(default = "default_db_adapter")]
    pub name: String,
    #[serde(default)]
    pub settings: DbAdapterSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbAdapterSettings {
    #[serde(default = "default_db_directory")]
    pub directory: String,
}

fn default_db_host() -> String {
    "127.0.0.1".to_string()
}

fn default_db_adapter() -> String {
    "sqlite".to_string()
}

fn default_db_directory() -> String {
    ".db".to_string()
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_db_host(),
            adapter: DbAdapter::default(),
        }
    }
}

impl Default for DbAdapter {
    fn default() -> Self {
        Self {
            name: default_db_adapter(),
            settings: DbAdapterSettings::default(),
        }
    }
}

impl Default for DbAdapterSettings {
    fn default() -> Self {
        Self {
            directory: default_db_directory(),
        }
    }
}

/// Resolved, validated deployment configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Networks in declaration order, names unique
    pub networks: Vec<NetworkProfile>,
    pub compiler: CompilerSpec,
    /// Plugins in invocation order
    pub plugins: Vec<String>,
    pub api_keys: ApiKeySet,
    pub db: DbConfig,
}

impl Config {
    /// Load the embedded configuration with environment overrides applied
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required field is missing, a port is out of
    /// range, a network name repeats, or the optimizer settings are invalid.
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Validate an already-parsed document
    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let networks = validate_networks(&raw)?;
        let compiler = validate_compiler(&raw)?;
        let plugins = validate_plugins(raw.plugins)?;
        let api_keys = validate_api_keys(raw.api_keys);
        let db = validate_db(raw.db.unwrap_or_default())?;

        debug!(
            networks = networks.len(),
            plugins = plugins.len(),
            compiler = %compiler.version,
            "Configuration validated"
        );

        Ok(Config {
            networks,
            compiler,
            plugins,
            api_keys,
            db,
        })
    }

    /// Look up a network by name
    pub fn resolve_network(&self, name: &str) -> Result<&NetworkProfile, ConfigError> {
        self.networks
            .iter()
            .find(|network| network.name == name)
            .ok_or_else(|| ConfigError::UnknownNetwork(name.to_string()))
    }

    pub fn network_names(&self) -> impl Iterator<Item = &str> {
        self.networks.iter().map(|network| network.name.as_str())
    }

    /// Print the resolved configuration
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════════╗");
        println!("║            DEPLOYMENT CONFIGURATION RESOLVED                   ║");
        println!("╚════════════════════════════════════════════════════════════════╝");
        println!("  Compiler:            solc {}", self.compiler.version);
        match self.compiler.effective_runs() {
            Some(runs) => println!("  Optimizer:           enabled ({} runs)", runs),
            None => println!("  Optimizer:           disabled"),
        }

        println!("  Networks:");
        for network in &self.networks {
            println!(
                "    {:<18} {} (network id {})",
                network.name,
                network.rpc_url(),
                network.network_id
            );
        }

        if self.plugins.is_empty() {
            println!("  Plugins:             (none)");
        } else {
            println!("  Plugins:             {}", self.plugins.join(", "));
        }

        if self.api_keys.is_empty() {
            println!("  API keys:            (none)");
        } else {
            println!("  API keys:");
        }
        for service in self.api_keys.services() {
            match self.api_keys.configured(service) {
                Some(key) => println!("    {:<18} {}", service, mask(key)),
                None => println!("    {:<18} (not configured)", service),
            }
        }

        if self.db.enabled {
            println!(
                "  Artifact DB:         {} at {}",
                self.db.adapter.name, self.db.adapter.settings.directory
            );
        }

        println!("╚════════════════════════════════════════════════════════════════╝");
    }

    /// Get configuration as JSON, with API keys masked
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Where configuration text comes from
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// [`DEFAULT_CONFIG`]
    Embedded,
    Toml(String),
    Json(String),
    /// A file; `.json` is parsed as JSON, anything else as TOML
    Path(PathBuf),
    /// An already-built document
    Raw(RawConfig),
}

/// Reads a [`ConfigSource`], applies environment overrides, and validates.
pub struct ConfigLoader {
    source: ConfigSource,
    secrets: Box<dyn SecretSource>,
}

impl ConfigLoader {
    /// Loader over the embedded configuration and the process environment.
    ///
    /// Loading only reads the environment; `.env` files are not consulted.
    pub fn new() -> Self {
        Self::from_source(ConfigSource::Embedded)
    }

    pub fn from_source(source: ConfigSource) -> Self {
        Self {
            source,
            secrets: Box::new(EnvSecrets::new()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::from_source(ConfigSource::Path(path.as_ref().to_path_buf()))
    }

    /// Replace the environment used for overrides
    pub fn with_secrets(mut self, secrets: impl SecretSource + 'static) -> Self {
        self.secrets = Box::new(secrets);
        self
    }

    pub fn load(&self) -> Result<Config, ConfigError> {
        let mut raw = self.read_raw()?;
        apply_api_key_overrides(&mut raw, self.secrets.as_ref());
        Config::from_raw(raw)
    }

    fn read_raw(&self) -> Result<RawConfig, ConfigError> {
        match &self.source {
            ConfigSource::Embedded => {
                debug!("Using embedded default configuration");
                Ok(toml::from_str(DEFAULT_CONFIG)?)
            }
            ConfigSource::Toml(text) => Ok(toml::from_str(text)?),
            ConfigSource::Json(text) => Ok(serde_json::from_str(text)?),
            ConfigSource::Path(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
                debug!("Loaded configuration from {:?}", path);
                if path.extension().is_some_and(|ext| ext == "json") {
                    Ok(serde_json::from_str(&content)?)
                } else {
                    Ok(toml::from_str(&content)?)
                }
            }
            ConfigSource::Raw(raw) => Ok(raw.clone()),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_api_key_overrides(raw: &mut RawConfig, secrets: &dyn SecretSource) {
    let services: Vec<String> = raw
        .api_keys
        .keys()
        .cloned()
        .chain(KNOWN_EXPLORERS.iter().map(|s| s.to_string()))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    for service in services {
        let var = api_key_var(&service);
        if let Some(key) = secrets.get(&var) {
            debug!(service = %service, "API key overridden from {}", var);
            raw.api_keys.insert(service, key.trim().to_string());
        }
    }
}

/// Override variable for `service`, e.g. `CHAINFORGE_API_KEY_MY_SCAN` for `my-scan`
pub fn api_key_var(service: &str) -> String {
    env_var_name(API_KEY_ENV_PREFIX, service)
}

fn validate_networks(raw: &RawConfig) -> Result<Vec<NetworkProfile>, ConfigError> {
    let mut seen = HashSet::new();
    for (index, network) in raw.networks.iter().enumerate() {
        let name = network
            .name
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField(format!("networks[{}].name", index)))?;
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateNetworkName(name.to_string()));
        }
    }

    raw.networks.iter().map(validate_network).collect()
}

fn validate_network(network: &RawNetwork) -> Result<NetworkProfile, ConfigError> {
    let name = network.name.clone().unwrap_or_default();
    if name.trim().is_empty() {
        return Err(ConfigError::invalid("networks", "network name cannot be empty"));
    }
    let field = |f: &str| format!("networks.{}.{}", name, f);

    let host = network
        .host
        .clone()
        .ok_or_else(|| ConfigError::MissingField(field("host")))?;
    validate_host(&host).map_err(|message| ConfigError::invalid(field("host"), message))?;

    let port = network
        .port
        .ok_or_else(|| ConfigError::MissingField(field("port")))?;
    let port = u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ConfigError::InvalidPort {
            network: name.clone(),
            port,
        })?;

    let network_id = match &network.network_id {
        None => return Err(ConfigError::MissingField(field("network_id"))),
        Some(RawNetworkId::Number(id)) => NetworkId::Id(id.to_string()),
        Some(RawNetworkId::Text(id)) if id == NETWORK_ID_WILDCARD => NetworkId::Any,
        Some(RawNetworkId::Text(id)) if id.trim().is_empty() => {
            return Err(ConfigError::invalid(field("network_id"), "cannot be empty"));
        }
        Some(RawNetworkId::Text(id)) => NetworkId::Id(id.trim().to_string()),
    };

    Ok(NetworkProfile {
        name,
        host,
        port,
        network_id,
    })
}

/// A bare address, optionally with a scheme. The port comes from the `port`
/// field, so an embedded port, path, query, fragment, or userinfo is rejected.
pub(crate) fn validate_host(host: &str) -> Result<(), String> {
    if host.trim().is_empty() {
        return Err("host cannot be empty".to_string());
    }
    if host.chars().any(char::is_whitespace) {
        return Err(format!("host contains whitespace: {:?}", host));
    }
    let authority = match host.split_once("://") {
        Some((scheme, rest)) => {
            if !ALLOWED_SCHEMES.contains(&scheme) {
                return Err(format!(
                    "unsupported scheme '{}', expected one of {:?}",
                    scheme, ALLOWED_SCHEMES
                ));
            }
            rest
        }
        None => host,
    };
    let authority = authority.trim_end_matches('/');

    if authority.is_empty() {
        return Err(format!("host has no address: {}", host));
    }
    if let Some(c) = authority.chars().find(|c| matches!(c, '/' | '?' | '#' | '@')) {
        return Err(format!(
            "host must be a bare address without path, query, fragment or credentials (found '{}'): {}",
            c, host
        ));
    }
    let has_port = match authority.strip_prefix('[') {
        // IPv6 literal
        Some(rest) => match rest.split_once(']') {
            Some((addr, tail)) => addr.is_empty() || !tail.is_empty(),
            None => return Err(format!("unterminated IPv6 literal: {}", host)),
        },
        None => authority.contains(':'),
    };
    if has_port {
        return Err(format!(
            "host must not carry a port, set it in the port field instead: {}",
            host
        ));
    }
    Ok(())
}

fn validate_compiler(raw: &RawConfig) -> Result<CompilerSpec, ConfigError> {
    let solc = raw
        .compilers
        .as_ref()
        .and_then(|c| c.solc.as_ref())
        .ok_or_else(|| ConfigError::MissingField("compilers.solc".to_string()))?;

    let version = solc
        .version
        .clone()
        .ok_or_else(|| ConfigError::MissingField("compilers.solc.version".to_string()))?;
    if !is_semver(&version) {
        return Err(ConfigError::invalid(
            "compilers.solc.version",
            format!("'{}' is not a MAJOR.MINOR.PATCH version", version),
        ));
    }

    let optimizer: &RawOptimizer = solc
        .settings
        .as_ref()
        .and_then(|s| s.optimizer.as_ref())
        .ok_or_else(|| {
            ConfigError::MissingField("compilers.solc.settings.optimizer.enabled".to_string())
        })?;
    let optimizer_enabled = optimizer.enabled.ok_or_else(|| {
        ConfigError::MissingField("compilers.solc.settings.optimizer.enabled".to_string())
    })?;

    let optimizer_runs = match (optimizer_enabled, optimizer.runs) {
        (true, None) => Some(DEFAULT_OPTIMIZER_RUNS),
        (true, Some(runs)) if runs <= 0 => return Err(ConfigError::InvalidOptimizerRuns(runs)),
        (true, Some(runs)) => Some(u32::try_from(runs).map_err(|_| {
            ConfigError::invalid(
                "compilers.solc.settings.optimizer.runs",
                format!("{} exceeds {}", runs, u32::MAX),
            )
        })?),
        (false, Some(runs)) => {
            warn!(
                runs,
                "optimizer.runs is set while the optimizer is disabled; it will be ignored"
            );
            u32::try_from(runs).ok().filter(|r| *r > 0)
        }
        (false, None) => None,
    };

    Ok(CompilerSpec {
        version,
        optimizer_enabled,
        optimizer_runs,
    })
}

/// `MAJOR.MINOR.PATCH`, optionally followed by `-prerelease` and/or `+build`
fn is_semver(version: &str) -> bool {
    let (core, suffix) = match version.find(['+', '-']) {
        Some(index) => (&version[..index], Some(&version[index + 1..])),
        None => (version, None),
    };
    let parts: Vec<&str> = core.split('.').collect();
    let core_ok = parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));

    core_ok
        && suffix.map_or(true, |suffix| {
            suffix
                .split(['.', '+'])
                .all(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
        })
}

fn validate_plugins(plugins: Vec<String>) -> Result<Vec<String>, ConfigError> {
    let mut seen = HashSet::new();
    for (index, plugin) in plugins.iter().enumerate() {
        if plugin.trim().is_empty() {
            return Err(ConfigError::invalid(
                format!("plugins[{}]", index),
                "plugin identifier cannot be empty",
            ));
        }
        if !seen.insert(plugin.as_str()) {
            warn!(plugin = %plugin, "plugin listed more than once");
        }
    }
    Ok(plugins)
}

fn validate_api_keys(keys: BTreeMap<String, String>) -> ApiKeySet {
    for (service, key) in &keys {
        if !ApiKeySet::is_plausible(service, key) {
            warn!(service = %service, "API key does not look like a {} key", service);
        }
    }
    ApiKeySet::new(keys)
}

fn validate_db(db: DbConfig) -> Result<DbConfig, ConfigError> {
    if db.enabled {
        if db.adapter.name != "sqlite" {
            return Err(ConfigError::invalid(
                "db.adapter.name",
                format!("unsupported adapter '{}', only sqlite is available", db.adapter.name),
            ));
        }
        if db.adapter.settings.directory.trim().is_empty() {
            return Err(ConfigError::MissingField(
                "db.adapter.settings.directory".to_string(),
            ));
        }
    }
    Ok(db)
}

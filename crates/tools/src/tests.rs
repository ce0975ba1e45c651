use std::cell::Cell;
use std::collections::HashMap;
use std::io::Write;

use crate::config::{Config, ConfigLoader, ConfigSource, NetworkId, NetworkProfile};
use crate::error::ConfigError;
use crate::provider::{
    materialize_with, DeploymentSession, HdWalletFactory, ProviderFactory, SigningProvider,
};
use crate::schema::{
    NetworkEntries, RawCompilers, RawConfig, RawNetwork, RawOptimizer, RawSolc, RawSolcSettings,
};
use crate::secrets::{PrivateKey, PrivateKeys, PRIVATE_KEYS_ENV};

const BSC_TESTNET_JSON: &str = r#"{
    "networks": {
        "bscTestnet": {
            "host": "https://data-seed-prebsc-1-s1.binance.org",
            "port": 8545,
            "network_id": "97"
        }
    },
    "compilers": {
        "solc": {
            "version": "0.8.7",
            "settings": { "optimizer": { "enabled": true, "runs": 200 } }
        }
    },
    "plugins": ["truffle-plugin-verify"],
    "api_keys": {
        "bscscan": "I2K9IIDIXVW8BM5IR3NW5WPAM8BIRC4KPF",
        "etherscan": "",
        "polygonscan": "PY1HE7T1I1WDX2YBEXZV7FQRTS62QF957K",
        "hecoinfo": "",
        "ftmscan": ""
    }
}"#;

const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

fn no_env() -> HashMap<String, String> {
    HashMap::new()
}

fn load(source: ConfigSource) -> Result<Config, ConfigError> {
    ConfigLoader::from_source(source).with_secrets(no_env()).load()
}

fn network(name: &str, host: &str, port: i64, network_id: &str) -> RawNetwork {
    RawNetwork {
        name: Some(name.to_string()),
        host: Some(host.to_string()),
        port: Some(port),
        network_id: Some(network_id.into()),
    }
}

fn raw_with_networks(networks: Vec<RawNetwork>) -> RawConfig {
    RawConfig {
        networks: NetworkEntries(networks),
        compilers: Some(RawCompilers {
            solc: Some(RawSolc {
                version: Some("0.8.7".to_string()),
                settings: Some(RawSolcSettings {
                    optimizer: Some(RawOptimizer {
                        enabled: Some(true),
                        runs: Some(200),
                    }),
                }),
            }),
        }),
        plugins: vec!["truffle-plugin-verify".to_string()],
        ..Default::default()
    }
}

#[derive(Default)]
struct RecordingFactory {
    calls: Cell<usize>,
}

impl ProviderFactory for RecordingFactory {
    fn create(
        &self,
        profile: &NetworkProfile,
        keys: &PrivateKeys,
    ) -> Result<SigningProvider, ConfigError> {
        self.calls.set(self.calls.get() + 1);
        HdWalletFactory.create(profile, keys)
    }
}

#[test]
fn literal_configuration_end_to_end() {
    let config = load(ConfigSource::Json(BSC_TESTNET_JSON.to_string())).unwrap();

    let bsc = config.resolve_network("bscTestnet").unwrap();
    assert_eq!(bsc.port, 8545);
    assert_eq!(bsc.network_id, NetworkId::Id("97".to_string()));
    assert_eq!(bsc.network_id.as_str(), "97");

    assert_eq!(config.api_keys.get("etherscan"), Some(""));
    assert_eq!(config.api_keys.configured("etherscan"), None);
    assert_eq!(
        config.api_keys.configured("bscscan"),
        Some("I2K9IIDIXVW8BM5IR3NW5WPAM8BIRC4KPF")
    );
    assert_eq!(config.plugins, vec!["truffle-plugin-verify"]);
    assert_eq!(config.compiler.version, "0.8.7");
    assert_eq!(config.compiler.effective_runs(), Some(200));
}

#[test]
fn every_declared_network_resolves_to_itself() {
    for source in [
        ConfigSource::Embedded,
        ConfigSource::Json(BSC_TESTNET_JSON.to_string()),
    ] {
        let config = load(source).unwrap();
        let names: Vec<String> = config.network_names().map(str::to_string).collect();
        assert!(!names.is_empty());
        for name in names {
            assert_eq!(config.resolve_network(&name).unwrap().name, name);
        }
    }
}

#[test]
fn duplicate_network_in_raw_document() {
    let raw = raw_with_networks(vec![
        network("bscTestnet", "https://data-seed-prebsc-1-s1.binance.org", 8545, "97"),
        network("bscTestnet", "https://data-seed-prebsc-2-s1.binance.org", 8545, "97"),
    ]);
    match load(ConfigSource::Raw(raw)) {
        Err(ConfigError::DuplicateNetworkName(name)) => assert_eq!(name, "bscTestnet"),
        other => panic!("expected DuplicateNetworkName, got {:?}", other),
    }
}

#[test]
fn duplicate_network_in_json_map() {
    let json = r#"{
        "networks": {
            "bscTestnet": {"host": "https://data-seed-prebsc-1-s1.binance.org", "port": 8545, "network_id": "97"},
            "bscTestnet": {"host": "https://data-seed-prebsc-1-s1.binance.org", "port": 8545, "network_id": "97"}
        },
        "compilers": {"solc": {"version": "0.8.7", "settings": {"optimizer": {"enabled": true}}}}
    }"#;
    assert!(matches!(
        load(ConfigSource::Json(json.to_string())),
        Err(ConfigError::DuplicateNetworkName(_))
    ));
}

#[test]
fn duplicate_network_in_toml_list() {
    let toml = r#"
        [[networks]]
        name = "bscTestnet"
        host = "https://data-seed-prebsc-1-s1.binance.org"
        port = 8545
        network_id = "97"

        [[networks]]
        name = "bscTestnet"
        host = "https://data-seed-prebsc-1-s1.binance.org"
        port = 8545
        network_id = "97"

        [compilers.solc]
        version = "0.8.7"
        [compilers.solc.settings.optimizer]
        enabled = true
    "#;
    assert!(matches!(
        load(ConfigSource::Toml(toml.to_string())),
        Err(ConfigError::DuplicateNetworkName(_))
    ));
}

#[test]
fn port_range_is_enforced() {
    for port in [0, 70000, -1] {
        let raw = raw_with_networks(vec![network("local", "127.0.0.1", port, "*")]);
        match load(ConfigSource::Raw(raw)) {
            Err(ConfigError::InvalidPort { network, port: bad }) => {
                assert_eq!(network, "local");
                assert_eq!(bad, port);
            }
            other => panic!("expected InvalidPort for {}, got {:?}", port, other),
        }
    }

    let raw = raw_with_networks(vec![network("local", "127.0.0.1", 8545, "*")]);
    let config = load(ConfigSource::Raw(raw)).unwrap();
    assert_eq!(config.resolve_network("local").unwrap().port, 8545);
}

#[test]
fn provider_built_only_after_resolve() {
    let factory = RecordingFactory::default();
    let config = load(ConfigSource::Json(BSC_TESTNET_JSON.to_string())).unwrap();

    let profile = config.resolve_network("bscTestnet").unwrap();
    assert_eq!(factory.calls.get(), 0);

    let keys = PrivateKeys::new(vec![PrivateKey::new(KEY)]);
    let provider = materialize_with(&factory, profile, &keys).unwrap();
    assert_eq!(factory.calls.get(), 1);
    assert_eq!(provider.rpc_url(), "https://data-seed-prebsc-1-s1.binance.org:8545");
}

#[test]
fn load_with_keys_available_does_not_materialize() {
    let mut env = HashMap::new();
    env.insert(PRIVATE_KEYS_ENV.to_string(), KEY.to_string());

    let config = ConfigLoader::from_source(ConfigSource::Json(BSC_TESTNET_JSON.to_string()))
        .with_secrets(env.clone())
        .load()
        .unwrap();

    let factory = RecordingFactory::default();
    let session = DeploymentSession::with_factory(&config, "bscTestnet", &factory).unwrap();
    assert!(!session.is_materialized());
    assert_eq!(factory.calls.get(), 0);

    session.provider(&env).unwrap();
    assert!(session.is_materialized());
    assert_eq!(factory.calls.get(), 1);
}

#[test]
fn default_loader_leaves_process_env_unchanged() {
    let before: Vec<(String, String)> = std::env::vars().collect();
    let config = ConfigLoader::new().load().unwrap();
    let after: Vec<(String, String)> = std::env::vars().collect();

    assert_eq!(before, after);
    assert!(config.resolve_network("bscTestnet").is_ok());
}

#[test]
fn repeated_loads_are_equal() {
    let first = load(ConfigSource::Json(BSC_TESTNET_JSON.to_string())).unwrap();
    let second = load(ConfigSource::Json(BSC_TESTNET_JSON.to_string())).unwrap();
    assert_eq!(first, second);

    let first = load(ConfigSource::Embedded).unwrap();
    let second = load(ConfigSource::Embedded).unwrap();
    assert_eq!(first, second);
}

#[test]
fn load_from_json_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(BSC_TESTNET_JSON.as_bytes()).unwrap();

    let config = ConfigLoader::from_path(file.path())
        .with_secrets(no_env())
        .load()
        .unwrap();
    assert_eq!(config.resolve_network("bscTestnet").unwrap().port, 8545);
}

#[test]
fn load_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chainforge.toml");
    std::fs::write(&path, crate::config::DEFAULT_CONFIG).unwrap();

    let from_file = ConfigLoader::from_path(&path)
        .with_secrets(no_env())
        .load()
        .unwrap();
    let embedded = load(ConfigSource::Embedded).unwrap();
    assert_eq!(from_file, embedded);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ConfigLoader::from_path(dir.path().join("absent.toml"))
        .with_secrets(no_env())
        .load();
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let result = load(ConfigSource::Json("{ networks: ".to_string()));
    assert!(matches!(result, Err(ConfigError::JsonParse(_))));
}

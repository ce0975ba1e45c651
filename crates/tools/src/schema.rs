//! On-disk configuration schema
//!
//! These types mirror the declarative file as written: every field is optional
//! so that a missing value surfaces as [`ConfigError::MissingField`] during
//! validation instead of an opaque parse error.
//!
//! [`ConfigError::MissingField`]: crate::error::ConfigError::MissingField

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::DbConfig;

/// Top-level configuration document
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub networks: NetworkEntries,
    #[serde(default)]
    pub compilers: Option<RawCompilers>,
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,
    #[serde(default)]
    pub db: Option<DbConfig>,
}

/// Network declarations in source order.
///
/// Accepts either a mapping of name to profile or a list of profiles that
/// carry their own `name`. Repeated names are kept so validation can reject
/// them; a plain map type would silently keep the last one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkEntries(pub Vec<RawNetwork>);

impl NetworkEntries {
    pub fn iter(&self) -> std::slice::Iter<'_, RawNetwork> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for NetworkEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = NetworkEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of network name to profile, or a list of named profiles")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((name, network)) = map.next_entry::<String, RawNetwork>()? {
                    // The key is authoritative in map form
                    entries.push(RawNetwork {
                        name: Some(name),
                        ..network
                    });
                }
                Ok(NetworkEntries(entries))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some(network) = seq.next_element::<RawNetwork>()? {
                    entries.push(network);
                }
                Ok(NetworkEntries(entries))
            }
        }

        deserializer.deserialize_any(EntriesVisitor)
    }
}

/// One network entry as written.
///
/// Unknown fields are rejected, which keeps inline `provider` or
/// `private_key` entries out of committed configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawNetwork {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub network_id: Option<RawNetworkId>,
}

/// Chain identifier as written: `"97"`, `97`, or the wildcard `"*"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawNetworkId {
    Number(u64),
    Text(String),
}

impl From<&str> for RawNetworkId {
    fn from(value: &str) -> Self {
        RawNetworkId::Text(value.to_string())
    }
}

impl<'de> Deserialize<'de> for RawNetworkId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NetworkIdVisitor;

        impl<'de> Visitor<'de> for NetworkIdVisitor {
            type Value = RawNetworkId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a chain id string, a non-negative integer, or \"*\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(RawNetworkId::Number(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(RawNetworkId::Number)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(RawNetworkId::Text(v.to_string()))
            }
        }

        deserializer.deserialize_any(NetworkIdVisitor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCompilers {
    pub solc: Option<RawSolc>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawSolc {
    pub version: Option<String>,
    pub settings: Option<RawSolcSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawSolcSettings {
    pub optimizer: Option<RawOptimizer>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawOptimizer {
    pub enabled: Option<bool>,
    pub runs: Option<i64>,
}

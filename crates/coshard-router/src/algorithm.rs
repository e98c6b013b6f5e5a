//! Shard algorithms

use std::collections::HashMap;

use coshard_config::{Algorithm, RuleConfig};
use coshard_core::{CoshardError, Result};
use serde_json::{Map, Value};

/// Maps a shard-key value to a shard index
pub trait ShardAlgorithm: Send + Sync + std::fmt::Debug {
    /// Get the algorithm name (e.g., "list")
    fn name(&self) -> &'static str;

    fn calculate(&self, value: &str) -> usize;
}

/// Build the algorithm a rule names from its props
pub fn build_algorithm(rule: &RuleConfig) -> Result<Box<dyn ShardAlgorithm>> {
    let algorithm: Box<dyn ShardAlgorithm> = match rule.algorithm {
        Algorithm::List => Box::new(ShardByList::from_props(&rule.name, &rule.props)?),
        Algorithm::Hash => Box::new(ShardByHash::from_props(&rule.name, &rule.props)?),
    };
    tracing::debug!(rule = %rule.name, algorithm = algorithm.name(), "shard rule built");
    Ok(algorithm)
}

fn invalid_prop(rule: &str, message: impl std::fmt::Display) -> CoshardError {
    CoshardError::Configuration(format!("rule: {} {}", rule, message))
}

fn non_negative(rule: &str, props: &Map<String, Value>, key: &str) -> Result<usize> {
    let value = props
        .get(key)
        .ok_or_else(|| invalid_prop(rule, format_args!("is missing `{}`", key)))?;
    value
        .as_u64()
        .map(|v| v as usize)
        .ok_or_else(|| invalid_prop(rule, format_args!("`{}` must be a non-negative integer, got {}", key, value)))
}

/// Explicit value-to-shard table with a fallback shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardByList {
    default_shard: usize,
    routes: HashMap<String, usize>,
}

impl ShardByList {
    pub fn new(default_shard: usize, routes: HashMap<String, usize>) -> Self {
        Self {
            default_shard,
            routes,
        }
    }

    /// Read `default_shard` and the `"value=shard"` entries of `mappings`
    pub fn from_props(rule: &str, props: &Map<String, Value>) -> Result<Self> {
        let default_shard = non_negative(rule, props, "default_shard")?;

        let mappings = match props.get("mappings") {
            Some(Value::Array(mappings)) => mappings.as_slice(),
            Some(other) => {
                return Err(invalid_prop(rule, format_args!("`mappings` must be an array, got {}", other)));
            }
            None => &[],
        };

        let mut routes = HashMap::with_capacity(mappings.len());
        for mapping in mappings {
            let entry = mapping
                .as_str()
                .ok_or_else(|| invalid_prop(rule, format_args!("mapping {} is not a string", mapping)))?;
            let (value, shard) = entry
                .trim()
                .split_once('=')
                .ok_or_else(|| invalid_prop(rule, format_args!("mapping `{}` is not `value=shard`", entry)))?;
            let shard = shard
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid_prop(rule, format_args!("mapping `{}` has an invalid shard index", entry)))?;
            routes.insert(value.trim().to_string(), shard);
        }

        Ok(Self::new(default_shard, routes))
    }

    pub fn default_shard(&self) -> usize {
        self.default_shard
    }
}

impl ShardAlgorithm for ShardByList {
    fn name(&self) -> &'static str {
        "list"
    }

    fn calculate(&self, value: &str) -> usize {
        self.routes
            .get(value.trim())
            .copied()
            .unwrap_or(self.default_shard)
    }
}

/// Modulo sharding over `shard_count` shards
///
/// Integer keys map to `value mod shard_count`; anything else is hashed with
/// 64-bit FNV-1a first so the mapping is stable across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardByHash {
    shard_count: usize,
}

impl ShardByHash {
    pub fn new(shard_count: usize) -> Result<Self> {
        if shard_count == 0 {
            return Err(CoshardError::Configuration(
                "hash shard_count must be greater than 0".into(),
            ));
        }
        Ok(Self { shard_count })
    }

    pub fn from_props(rule: &str, props: &Map<String, Value>) -> Result<Self> {
        let shard_count = non_negative(rule, props, "shard_count")?;
        if shard_count == 0 {
            return Err(invalid_prop(rule, "`shard_count` must be greater than 0"));
        }
        Self::new(shard_count)
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }
}

impl ShardAlgorithm for ShardByHash {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn calculate(&self, value: &str) -> usize {
        let value = value.trim();
        let count = self.shard_count as u64;
        let slot = match value.parse::<i64>() {
            Ok(n) => n.rem_euclid(count as i64) as u64,
            Err(_) => fnv1a(value.as_bytes()) % count,
        };
        slot as usize
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(PRIME)
    })
}

//! Runtime schema: tables bound to rules, rules resolved to shards

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use coshard_config::{PkIncrType, SchemaConfig, ShardType, TableType};
use coshard_core::{CoshardError, Result};

use crate::algorithm::{ShardAlgorithm, build_algorithm};

/// A physical database on a data node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub name: String,
    pub index: usize,
    pub datanode: String,
    pub database: String,
    pub kind: ShardType,
}

/// A named, built sharding rule
pub struct Rule {
    pub name: String,
    pub algorithm: Box<dyn ShardAlgorithm>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm.name())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub kind: TableType,
    pub shard_key: String,
    pub primary_key: String,
    pub pk_incr_type: PkIncrType,
    pub rule: Arc<Rule>,
}

#[derive(Debug)]
pub struct Schema {
    name: String,
    charset: String,
    tables: HashMap<String, Table>,
    rules: HashMap<String, Arc<Rule>>,
    /// Sorted by index
    shards: Vec<Shard>,
}

impl Schema {
    /// Build rules, bind every table to its rule and index the shards
    pub fn from_config(config: &SchemaConfig) -> Result<Self> {
        let mut rules = HashMap::with_capacity(config.rules.len());
        for rule in &config.rules {
            let built = Rule {
                name: rule.name.clone(),
                algorithm: build_algorithm(rule)?,
            };
            if rules.insert(rule.name.clone(), Arc::new(built)).is_some() {
                return Err(CoshardError::Configuration(format!(
                    "schema: {} defines rule {} twice",
                    config.name, rule.name
                )));
            }
        }

        let mut tables = HashMap::with_capacity(config.tables.len());
        for table in &config.tables {
            let rule = rules.get(&table.rule_name).cloned().ok_or_else(|| {
                CoshardError::Configuration(format!("rule: {} doesn't exist", table.rule_name))
            })?;
            tables.insert(
                table.name.clone(),
                Table {
                    name: table.name.clone(),
                    kind: table.kind,
                    shard_key: table.shard_key.clone(),
                    primary_key: table.primary_key.clone(),
                    pk_incr_type: table.pk_incr_type,
                    rule,
                },
            );
        }

        let mut shards: Vec<Shard> = config
            .shards
            .iter()
            .map(|s| Shard {
                name: s.name.clone(),
                index: s.index,
                datanode: s.datanode.clone(),
                database: s.database.clone(),
                kind: s.kind,
            })
            .collect();
        shards.sort_by_key(|s| s.index);
        if let Some(pair) = shards.windows(2).find(|pair| pair[0].index == pair[1].index) {
            return Err(CoshardError::Configuration(format!(
                "schema: {} has two shards with index {}",
                config.name, pair[0].index
            )));
        }

        tracing::debug!(
            schema = %config.name,
            tables = tables.len(),
            rules = rules.len(),
            shards = shards.len(),
            "schema built"
        );

        Ok(Self {
            name: config.name.clone(),
            charset: config.charset.clone(),
            tables,
            rules,
            shards,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn rule(&self, name: &str) -> Option<&Arc<Rule>> {
        self.rules.get(name)
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub fn shard(&self, index: usize) -> Option<&Shard> {
        self.shards
            .binary_search_by_key(&index, |s| s.index)
            .ok()
            .map(|i| &self.shards[i])
    }

    /// Data nodes referenced by this schema's shards
    pub fn datanodes(&self) -> impl Iterator<Item = &str> {
        self.shards.iter().map(|s| s.datanode.as_str())
    }

    /// Pick the shard holding the row of `table` whose shard key equals `value`
    pub fn route(&self, table: &str, value: &str) -> Result<&Shard> {
        let table = self.table(table).ok_or_else(|| {
            CoshardError::NotFound(format!("table: {} in schema {}", table, self.name))
        })?;
        let index = table.rule.algorithm.calculate(value);
        self.shard(index).ok_or_else(|| {
            CoshardError::NotFound(format!(
                "shard {} for table {} (rule {})",
                index, table.name, table.rule.name
            ))
        })
    }
}

use super::algorithm::ShardingAlgorithm;
use super::inline::expand_all;
use super::keygen::KeyGenerator;
use crate::core::{Result, ShardingError, Value};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A physical table on a physical data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DataNode {
    pub data_source: String,
    pub table: String,
}

impl DataNode {
    #[must_use]
    pub fn new(data_source: &str, table: &str) -> Self {
        Self { data_source: data_source.to_string(), table: table.to_string() }
    }

    /// Parses `ds.table`.
    pub fn parse(text: &str) -> Result<Self> {
        match text.trim().split_once('.') {
            Some((ds, table)) if !ds.is_empty() && !table.is_empty() && !table.contains('.') => {
                Ok(Self::new(ds, table))
            }
            _ => Err(ShardingError::InvalidConfig(format!(
                "data node '{text}' must be '<data_source>.<table>'"
            ))),
        }
    }
}

impl fmt::Display for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.data_source, self.table)
    }
}

/// Single-column sharding strategy.
#[derive(Debug, Clone)]
pub struct ShardingStrategy {
    pub column: String,
    pub algorithm_name: String,
    pub algorithm: Arc<dyn ShardingAlgorithm>,
}

impl ShardingStrategy {
    #[must_use]
    pub fn new(column: &str, algorithm_name: &str, algorithm: Arc<dyn ShardingAlgorithm>) -> Self {
        Self { column: column.to_string(), algorithm_name: algorithm_name.to_string(), algorithm }
    }
}

#[derive(Debug, Clone)]
pub struct KeyGenerateStrategy {
    pub column: String,
    pub generator_name: String,
    pub generator: Arc<dyn KeyGenerator>,
}

/// Sharding configuration of one logic table.
#[derive(Debug, Clone)]
pub struct TableRule {
    pub logic_table: String,
    pub actual_data_nodes: Vec<DataNode>,
    pub database_strategy: Option<ShardingStrategy>,
    pub table_strategy: Option<ShardingStrategy>,
    pub key_generate: Option<KeyGenerateStrategy>,
}

impl TableRule {
    /// `actual_data_nodes` is an inline expression such as `ds_${0..1}.t_order_${0..1}`.
    pub fn new(logic_table: &str, actual_data_nodes: &str) -> Result<Self> {
        let actual_data_nodes = expand_all(actual_data_nodes)
            .map_err(|e| ShardingError::InvalidConfig(format!("{logic_table}: {e}")))?
            .iter()
            .map(|node| DataNode::parse(node))
            .collect::<Result<Vec<_>>>()?;
        if actual_data_nodes.is_empty() {
            return Err(ShardingError::InvalidConfig(format!("{logic_table}: no actual data nodes")));
        }
        Ok(Self::with_data_nodes(logic_table, actual_data_nodes))
    }

    #[must_use]
    pub fn with_data_nodes(logic_table: &str, actual_data_nodes: Vec<DataNode>) -> Self {
        Self {
            logic_table: logic_table.to_string(),
            actual_data_nodes,
            database_strategy: None,
            table_strategy: None,
            key_generate: None,
        }
    }

    #[must_use]
    pub fn with_database_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.database_strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn with_table_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.table_strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn with_key_generate(mut self, column: &str, generator_name: &str, generator: Arc<dyn KeyGenerator>) -> Self {
        self.key_generate = Some(KeyGenerateStrategy {
            column: column.to_string(),
            generator_name: generator_name.to_string(),
            generator,
        });
        self
    }

    /// Data sources in first-seen order.
    #[must_use]
    pub fn actual_data_source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for node in &self.actual_data_nodes {
            if !names.contains(&node.data_source) {
                names.push(node.data_source.clone());
            }
        }
        names
    }

    #[must_use]
    pub fn actual_tables_in(&self, data_source: &str) -> Vec<String> {
        self.actual_data_nodes
            .iter()
            .filter(|n| n.data_source == data_source)
            .map(|n| n.table.clone())
            .collect()
    }
}

/// Every table rule plus the defaults that apply to tables without their own.
#[derive(Debug, Clone, Default)]
pub struct ShardingRule {
    pub data_source_names: Vec<String>,
    pub table_rules: Vec<TableRule>,
    pub broadcast_tables: Vec<String>,
    pub default_database_strategy: Option<ShardingStrategy>,
    pub default_table_strategy: Option<ShardingStrategy>,
    /// Target for tables without a table rule.
    pub default_data_source: Option<String>,
}

impl ShardingRule {
    #[must_use]
    pub fn new(data_source_names: &[&str]) -> Self {
        Self {
            data_source_names: data_source_names.iter().map(|s| (*s).to_string()).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_table_rule(mut self, rule: TableRule) -> Self {
        self.table_rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_broadcast_table(mut self, table: &str) -> Self {
        self.broadcast_tables.push(table.to_string());
        self
    }

    #[must_use]
    pub fn with_default_database_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.default_database_strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn with_default_table_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.default_table_strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn with_default_data_source(mut self, data_source: &str) -> Self {
        self.default_data_source = Some(data_source.to_string());
        self
    }

    /// Checks that every data node names a known data source.
    pub fn validate(&self) -> Result<()> {
        for rule in &self.table_rules {
            for node in &rule.actual_data_nodes {
                if !self.data_source_names.contains(&node.data_source) {
                    return Err(ShardingError::InvalidConfig(format!(
                        "table '{}' references unknown data source '{}'",
                        rule.logic_table, node.data_source
                    )));
                }
            }
        }
        if let Some(ds) = &self.default_data_source {
            if !self.data_source_names.contains(ds) {
                return Err(ShardingError::InvalidConfig(format!("unknown default data source '{ds}'")));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn find_table_rule(&self, logic_table: &str) -> Option<&TableRule> {
        self.table_rules.iter().find(|r| r.logic_table.eq_ignore_ascii_case(logic_table))
    }

    #[must_use]
    pub fn is_broadcast_table(&self, table: &str) -> bool {
        self.broadcast_tables.iter().any(|t| t.eq_ignore_ascii_case(table))
    }

    #[must_use]
    pub fn is_all_broadcast_tables(&self, tables: &[&str]) -> bool {
        !tables.is_empty() && tables.iter().all(|t| self.is_broadcast_table(t))
    }

    #[must_use]
    pub fn is_sharding_table(&self, table: &str) -> bool {
        self.find_table_rule(table).is_some()
    }

    /// Tables among `tables` that carry a table rule.
    #[must_use]
    pub fn sharding_logic_table_names<'a>(&self, tables: &[&'a str]) -> Vec<&'a str> {
        tables.iter().copied().filter(|t| self.is_sharding_table(t)).collect()
    }

    #[must_use]
    pub fn database_strategy<'a>(&'a self, rule: &'a TableRule) -> Option<&'a ShardingStrategy> {
        rule.database_strategy.as_ref().or(self.default_database_strategy.as_ref())
    }

    #[must_use]
    pub fn table_strategy<'a>(&'a self, rule: &'a TableRule) -> Option<&'a ShardingStrategy> {
        rule.table_strategy.as_ref().or(self.default_table_strategy.as_ref())
    }

    #[must_use]
    pub fn is_sharding_column(&self, column: &str, table: &str) -> bool {
        self.find_table_rule(table).is_some_and(|rule| {
            [self.database_strategy(rule), self.table_strategy(rule)]
                .into_iter()
                .flatten()
                .any(|s| s.column.eq_ignore_ascii_case(column))
        })
    }

    #[must_use]
    pub fn find_generate_key_column(&self, table: &str) -> Option<&str> {
        self.find_table_rule(table)
            .and_then(|r| r.key_generate.as_ref())
            .map(|k| k.column.as_str())
    }

    pub fn generate_keys(&self, table: &str, count: usize) -> Result<Vec<Value>> {
        let generator = self
            .find_table_rule(table)
            .and_then(|r| r.key_generate.as_ref())
            .ok_or_else(|| ShardingError::InvalidConfig(format!("table '{table}' has no key generator")))?;
        (0..count).map(|_| generator.generator.generate_key()).collect()
    }

    /// Data source for a table without a table rule.
    #[must_use]
    pub fn single_table_data_source(&self) -> Option<&str> {
        match &self.default_data_source {
            Some(ds) => Some(ds.as_str()),
            None if self.data_source_names.len() == 1 => self.data_source_names.first().map(String::as_str),
            None => None,
        }
    }
}

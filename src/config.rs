/// Configuration
///
/// Loaded with priority: explicit file > first default file found, then
/// environment overrides (`SHARDGATE_PROPS__SQL_SHOW=true`). The raw tree
/// converts into runtime rules with `build()`.

use crate::core::{Result, Schema, ShardingError};
use crate::executor::{ShardConnector, ShardingRuntime};
use crate::metadata::{DatabaseType, MetaData};
use crate::readwrite::{
    create_load_balancer, ReadwriteSplittingDataSourceRule, ReadwriteSplittingRule, ReadwriteSplittingSqlRouter,
};
use crate::route::{ShardingSqlRouter, SqlRouter};
use crate::sharding::{
    create_key_generator, create_sharding_algorithm, ShardingAlgorithm, ShardingRule, ShardingStrategy,
    SystemDatetimeService, TableRule,
};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct Props {
    #[serde(default = "default_max_connections_size_per_query")]
    pub max_connections_size_per_query: usize,
    #[serde(default)]
    pub sql_show: bool,
    #[serde(default)]
    pub database_type: DatabaseType,
}

const fn default_max_connections_size_per_query() -> usize {
    1
}

impl Default for Props {
    fn default() -> Self {
        Self {
            max_connections_size_per_query: default_max_connections_size_per_query(),
            sql_show: false,
            database_type: DatabaseType::default(),
        }
    }
}

/// Named algorithm, key generator or load balancer.
#[derive(Debug, Clone, Deserialize)]
pub struct AlgorithmConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub props: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub column: String,
    pub algorithm: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyGenerateConfig {
    pub column: String,
    pub generator: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableRuleConfig {
    pub actual_data_nodes: String,
    pub database_strategy: Option<StrategyConfig>,
    pub table_strategy: Option<StrategyConfig>,
    pub key_generate: Option<KeyGenerateConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShardingConfig {
    #[serde(default)]
    pub tables: BTreeMap<String, TableRuleConfig>,
    #[serde(default)]
    pub broadcast_tables: Vec<String>,
    pub default_database_strategy: Option<StrategyConfig>,
    pub default_table_strategy: Option<StrategyConfig>,
    pub default_data_source: Option<String>,
    #[serde(default)]
    pub algorithms: BTreeMap<String, AlgorithmConfig>,
    #[serde(default)]
    pub key_generators: BTreeMap<String, AlgorithmConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadwriteGroupConfig {
    #[serde(default)]
    pub primary: String,
    #[serde(default)]
    pub replicas: Vec<String>,
    pub load_balancer: String,
    /// Cluster resolved through a dynamic topology instead of the static names.
    pub auto_aware: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadwriteSplittingConfig {
    #[serde(default)]
    pub groups: BTreeMap<String, ReadwriteGroupConfig>,
    #[serde(default)]
    pub load_balancers: BTreeMap<String, AlgorithmConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShardgateConfig {
    #[serde(default)]
    pub props: Props,
    #[serde(default)]
    pub data_sources: Vec<String>,
    pub sharding: Option<ShardingConfig>,
    pub readwrite_splitting: Option<ReadwriteSplittingConfig>,
}

/// Rules built from a configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeRules {
    /// Names the sharding rule routes to: read/write groups plus plain data sources.
    pub logic_data_sources: Vec<String>,
    pub sharding: Option<Arc<ShardingRule>>,
    pub readwrite_splitting: Option<Arc<ReadwriteSplittingRule>>,
}

impl RuntimeRules {
    /// Router chain in execution order.
    #[must_use]
    pub fn routers(&self) -> Vec<Arc<dyn SqlRouter>> {
        let mut routers: Vec<Arc<dyn SqlRouter>> = Vec::new();
        if let Some(sharding) = &self.sharding {
            routers.push(Arc::new(ShardingSqlRouter::new(Arc::clone(sharding), Arc::new(SystemDatetimeService))));
        }
        if let Some(readwrite) = &self.readwrite_splitting {
            routers.push(Arc::new(ReadwriteSplittingSqlRouter::new(Arc::clone(readwrite), None)));
        }
        routers
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/shardgate/shardgate.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("shardgate").join("shardgate.toml"));
    }
    paths.push(PathBuf::from("./shardgate.toml"));
    paths
}

impl ShardgateConfig {
    /// Loads `path`, or the first default file that exists, then applies
    /// `SHARDGATE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like `load`, reading overrides from `env` instead of the process
    /// environment when given.
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ShardingError::InvalidConfig(format!("config file {} not found", path.display())));
                }
                builder = builder.add_source(File::from(path));
                tracing::info!(path = %path.display(), "loaded config");
            }
            None => {
                if let Some(found) = default_config_paths().into_iter().find(|p| p.exists()) {
                    tracing::info!(path = %found.display(), "loaded config");
                    builder = builder.add_source(File::from(found));
                }
            }
        }
        let environment = Environment::with_prefix("SHARDGATE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("data_sources")
            .source(env);
        builder = builder.add_source(environment);
        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn build(&self) -> Result<RuntimeRules> {
        if self.props.max_connections_size_per_query == 0 {
            return Err(ShardingError::InvalidConfig(
                "max_connections_size_per_query must be greater than 0".to_string(),
            ));
        }
        let readwrite_splitting = match &self.readwrite_splitting {
            Some(config) if !config.groups.is_empty() => Some(Arc::new(self.build_readwrite(config)?)),
            _ => None,
        };
        let logic_data_sources = self.logic_data_sources();
        let sharding = match &self.sharding {
            Some(config) => Some(Arc::new(build_sharding(config, &logic_data_sources)?)),
            None => None,
        };
        Ok(RuntimeRules { logic_data_sources, sharding, readwrite_splitting })
    }

    /// Builds the full runtime over `schema` and `connector`.
    pub fn create_runtime(&self, schema: Schema, connector: Arc<dyn ShardConnector>) -> Result<ShardingRuntime> {
        let rules = self.build()?;
        let names: Vec<&str> = rules.logic_data_sources.iter().map(String::as_str).collect();
        let metadata = MetaData::new(schema, &names, self.props.database_type);
        ShardingRuntime::new(metadata, rules.routers(), connector, &self.props)
    }

    /// Group names first, then data sources no group claims.
    fn logic_data_sources(&self) -> Vec<String> {
        let Some(config) = &self.readwrite_splitting else {
            return self.data_sources.clone();
        };
        let mut names: Vec<String> = config.groups.keys().cloned().collect();
        for data_source in &self.data_sources {
            let claimed = config
                .groups
                .values()
                .any(|g| g.primary == *data_source || g.replicas.contains(data_source));
            if !claimed {
                names.push(data_source.clone());
            }
        }
        names
    }

    fn build_readwrite(&self, config: &ReadwriteSplittingConfig) -> Result<ReadwriteSplittingRule> {
        let mut rules = Vec::with_capacity(config.groups.len());
        for (name, group) in &config.groups {
            if group.auto_aware.is_none() {
                for data_source in std::iter::once(&group.primary).chain(&group.replicas) {
                    if !self.data_sources.contains(data_source) {
                        return Err(ShardingError::InvalidConfig(format!(
                            "read/write group '{name}' references unknown data source '{data_source}'"
                        )));
                    }
                }
            }
            let balancer = config.load_balancers.get(&group.load_balancer).ok_or_else(|| {
                ShardingError::InvalidConfig(format!("unknown load balancer '{}'", group.load_balancer))
            })?;
            let replicas: Vec<&str> = group.replicas.iter().map(String::as_str).collect();
            let mut rule = ReadwriteSplittingDataSourceRule::new(
                name,
                &group.primary,
                &replicas,
                &group.load_balancer,
                create_load_balancer(&balancer.type_name, &balancer.props)?,
            );
            if let Some(cluster) = &group.auto_aware {
                rule = rule.with_auto_aware(cluster);
            }
            rules.push(rule);
        }
        ReadwriteSplittingRule::new(rules)
    }
}

fn build_sharding(config: &ShardingConfig, data_sources: &[String]) -> Result<ShardingRule> {
    let mut algorithms: HashMap<&str, Arc<dyn ShardingAlgorithm>> = HashMap::new();
    for (name, algorithm) in &config.algorithms {
        algorithms.insert(name.as_str(), create_sharding_algorithm(&algorithm.type_name, &algorithm.props)?);
    }
    let strategy = |config: &StrategyConfig| -> Result<ShardingStrategy> {
        let algorithm = algorithms.get(config.algorithm.as_str()).ok_or_else(|| {
            ShardingError::InvalidConfig(format!("unknown sharding algorithm '{}'", config.algorithm))
        })?;
        Ok(ShardingStrategy::new(&config.column, &config.algorithm, Arc::clone(algorithm)))
    };

    let names: Vec<&str> = data_sources.iter().map(String::as_str).collect();
    let mut rule = ShardingRule::new(&names);
    for (logic_table, table) in &config.tables {
        let mut table_rule = TableRule::new(logic_table, &table.actual_data_nodes)?;
        if let Some(database) = &table.database_strategy {
            table_rule = table_rule.with_database_strategy(strategy(database)?);
        }
        if let Some(table_strategy) = &table.table_strategy {
            table_rule = table_rule.with_table_strategy(strategy(table_strategy)?);
        }
        if let Some(key_generate) = &table.key_generate {
            let generator = config.key_generators.get(&key_generate.generator).ok_or_else(|| {
                ShardingError::InvalidConfig(format!("unknown key generator '{}'", key_generate.generator))
            })?;
            table_rule = table_rule.with_key_generate(
                &key_generate.column,
                &key_generate.generator,
                create_key_generator(&generator.type_name, &generator.props, None)?,
            );
        }
        rule = rule.with_table_rule(table_rule);
    }
    for table in &config.broadcast_tables {
        rule = rule.with_broadcast_table(table);
    }
    if let Some(database) = &config.default_database_strategy {
        rule = rule.with_default_database_strategy(strategy(database)?);
    }
    if let Some(table) = &config.default_table_strategy {
        rule = rule.with_default_table_strategy(strategy(table)?);
    }
    if let Some(data_source) = &config.default_data_source {
        rule = rule.with_default_data_source(data_source);
    }
    rule.validate()?;
    tracing::debug!(tables = rule.table_rules.len(), broadcast = rule.broadcast_tables.len(), "sharding rule built");
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"
data_sources = ["ds_0", "ds_1", "ds_0_replica"]

[props]
max_connections_size_per_query = 2
sql_show = true
database_type = "PostgreSQL"

[sharding]
broadcast_tables = ["t_config"]

[sharding.tables.t_order]
actual_data_nodes = "rw_ds_0.t_order_${0..1},ds_1.t_order_${0..1}"
database_strategy = { column = "user_id", algorithm = "database_mod" }
table_strategy = { column = "order_id", algorithm = "table_inline" }
key_generate = { column = "order_id", generator = "snowflake" }

[sharding.algorithms.database_mod]
type = "MOD"
props = { sharding-count = "2" }

[sharding.algorithms.table_inline]
type = "INLINE"
props = { algorithm-expression = "t_order_${order_id % 2}" }

[sharding.key_generators.snowflake]
type = "SNOWFLAKE"
props = { worker-id = "3" }

[readwrite_splitting.groups.rw_ds_0]
primary = "ds_0"
replicas = ["ds_0_replica"]
load_balancer = "round_robin"

[readwrite_splitting.load_balancers.round_robin]
type = "ROUND_ROBIN"
"#;

    fn write(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn load(content: &str) -> ShardgateConfig {
        let file = write(content);
        ShardgateConfig::load_with_env(Some(file.path()), Some(HashMap::new())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = load("data_sources = [\"ds_0\"]\n");
        assert_eq!(config.props.max_connections_size_per_query, 1);
        assert!(!config.props.sql_show);
        assert_eq!(config.props.database_type, DatabaseType::MySQL);
        let rules = config.build().unwrap();
        assert!(rules.sharding.is_none());
        assert!(rules.routers().is_empty());
    }

    #[test]
    fn test_full_config_builds_rules() {
        let config = load(CONFIG);
        assert_eq!(config.props.database_type, DatabaseType::PostgreSQL);
        let rules = config.build().unwrap();
        assert_eq!(rules.logic_data_sources, vec!["rw_ds_0", "ds_1"]);
        let sharding = rules.sharding.as_ref().unwrap();
        let table = sharding.find_table_rule("t_order").unwrap();
        assert_eq!(table.actual_data_nodes.len(), 4);
        assert_eq!(table.key_generate.as_ref().unwrap().column, "order_id");
        assert!(sharding.is_broadcast_table("t_config"));
        let readwrite = rules.readwrite_splitting.as_ref().unwrap();
        assert_eq!(readwrite.find_data_source_rule("rw_ds_0").unwrap().primary, "ds_0");
        assert_eq!(rules.routers().len(), 2);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write(CONFIG);
        let env: HashMap<String, String> = [
            ("SHARDGATE_PROPS__SQL_SHOW".to_string(), "false".to_string()),
            ("SHARDGATE_PROPS__MAX_CONNECTIONS_SIZE_PER_QUERY".to_string(), "8".to_string()),
        ]
        .into();
        let config = ShardgateConfig::load_with_env(Some(file.path()), Some(env)).unwrap();
        assert!(!config.props.sql_show);
        assert_eq!(config.props.max_connections_size_per_query, 8);
    }

    #[test]
    fn test_unknown_algorithm_is_rejected() {
        let config = load(
            r#"
data_sources = ["ds_0"]
[sharding.tables.t_order]
actual_data_nodes = "ds_0.t_order"
table_strategy = { column = "order_id", algorithm = "missing" }
"#,
        );
        assert!(matches!(config.build(), Err(ShardingError::InvalidConfig(_))));
    }

    #[test]
    fn test_unknown_replica_is_rejected() {
        let config = load(
            r#"
data_sources = ["ds_0"]
[readwrite_splitting.groups.rw]
primary = "ds_0"
replicas = ["ds_9"]
load_balancer = "random"
[readwrite_splitting.load_balancers.random]
type = "RANDOM"
"#,
        );
        assert!(matches!(config.build(), Err(ShardingError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_max_connections_is_rejected() {
        let config = load("[props]\nmax_connections_size_per_query = 0\n");
        assert!(matches!(config.build(), Err(ShardingError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ShardgateConfig::load_with_env(Some(Path::new("/nonexistent/shardgate.toml")), None);
        assert!(matches!(result, Err(ShardingError::InvalidConfig(_))));
    }
}

use super::load_balance::ReplicaLoadBalanceAlgorithm;
use crate::core::{Result, ShardingError};
use std::sync::Arc;

/// One logical data source backed by a primary and its replicas.
#[derive(Debug, Clone)]
pub struct ReadwriteSplittingDataSourceRule {
    pub name: String,
    pub primary: String,
    pub replicas: Vec<String>,
    pub load_balancer_name: String,
    pub load_balancer: Arc<dyn ReplicaLoadBalanceAlgorithm>,
    /// Cluster name resolved through a dynamic topology at route time.
    pub auto_aware_data_source_name: Option<String>,
}

impl ReadwriteSplittingDataSourceRule {
    #[must_use]
    pub fn new(
        name: &str,
        primary: &str,
        replicas: &[&str],
        load_balancer_name: &str,
        load_balancer: Arc<dyn ReplicaLoadBalanceAlgorithm>,
    ) -> Self {
        Self {
            name: name.to_string(),
            primary: primary.to_string(),
            replicas: replicas.iter().map(|r| (*r).to_string()).collect(),
            load_balancer_name: load_balancer_name.to_string(),
            load_balancer,
            auto_aware_data_source_name: None,
        }
    }

    #[must_use]
    pub fn with_auto_aware(mut self, name: &str) -> Self {
        self.auto_aware_data_source_name = Some(name.to_string());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadwriteSplittingRule {
    pub data_source_rules: Vec<ReadwriteSplittingDataSourceRule>,
}

impl ReadwriteSplittingRule {
    pub fn new(data_source_rules: Vec<ReadwriteSplittingDataSourceRule>) -> Result<Self> {
        for (i, rule) in data_source_rules.iter().enumerate() {
            if rule.primary.is_empty() && rule.auto_aware_data_source_name.is_none() {
                return Err(ShardingError::InvalidConfig(format!(
                    "read/write group '{}' has no primary data source",
                    rule.name
                )));
            }
            if data_source_rules[..i].iter().any(|r| r.name.eq_ignore_ascii_case(&rule.name)) {
                return Err(ShardingError::InvalidConfig(format!(
                    "duplicate read/write group '{}'",
                    rule.name
                )));
            }
        }
        Ok(Self { data_source_rules })
    }

    #[must_use]
    pub fn find_data_source_rule(&self, name: &str) -> Option<&ReadwriteSplittingDataSourceRule> {
        self.data_source_rules.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// The group, when exactly one is configured.
    #[must_use]
    pub fn single_data_source_rule(&self) -> Option<&ReadwriteSplittingDataSourceRule> {
        match self.data_source_rules.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }
}

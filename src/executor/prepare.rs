/// Execution grouping
///
/// Execution units are bucketed per data source and split into batches so
/// that one logical statement never holds more than
/// `max_connections_size_per_query` connections on a data source.

use super::unit::{ExecutionUnit, SqlUnit};
use crate::core::{Result, ShardingError};
use crate::route::RouteContext;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionMode {
    /// Few connections, statements run serially and results are buffered.
    MemoryStrictly,
    /// One connection per statement, results stream.
    ConnectionStrictly,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryStrictly => write!(f, "MEMORY_STRICTLY"),
            Self::ConnectionStrictly => write!(f, "CONNECTION_STRICTLY"),
        }
    }
}

/// Units that share one connection and run one after another.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionGroup {
    pub data_source_name: String,
    pub connection_mode: ConnectionMode,
    pub inputs: Vec<ExecutionUnit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionGroupContext {
    pub groups: Vec<ExecutionGroup>,
}

impl ExecutionGroupContext {
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.groups.iter().map(|g| g.inputs.len()).sum()
    }

    /// Units in group order.
    pub fn units(&self) -> impl Iterator<Item = &ExecutionUnit> {
        self.groups.iter().flat_map(|g| g.inputs.iter())
    }
}

/// Post-processes the groups produced for a statement.
pub trait ExecutionPrepareDecorator: Send + Sync {
    fn order(&self) -> i32;

    fn decorate(&self, route_context: &RouteContext, groups: Vec<ExecutionGroup>) -> Result<Vec<ExecutionGroup>>;
}

#[derive(Clone)]
pub struct ExecutionPrepareEngine {
    max_connections_size_per_query: usize,
    decorators: Vec<Arc<dyn ExecutionPrepareDecorator>>,
}

impl ExecutionPrepareEngine {
    pub fn new(max_connections_size_per_query: usize) -> Result<Self> {
        if max_connections_size_per_query == 0 {
            return Err(ShardingError::InvalidConfig(
                "max_connections_size_per_query must be at least 1".to_string(),
            ));
        }
        Ok(Self { max_connections_size_per_query, decorators: Vec::new() })
    }

    /// Registers a decorator; decorators run in ascending `order()`.
    #[must_use]
    pub fn with_decorator(mut self, decorator: Arc<dyn ExecutionPrepareDecorator>) -> Self {
        self.decorators.push(decorator);
        self.decorators.sort_by_key(|d| d.order());
        self
    }

    #[must_use]
    pub const fn max_connections_size_per_query(&self) -> usize {
        self.max_connections_size_per_query
    }

    pub fn prepare(&self, route_context: &RouteContext, units: Vec<ExecutionUnit>) -> Result<ExecutionGroupContext> {
        let mut groups = Vec::new();
        for (data_source, sql_units) in aggregate_sql_units(units) {
            groups.extend(self.group_data_source(&data_source, sql_units));
        }
        for decorator in &self.decorators {
            groups = decorator.decorate(route_context, groups)?;
        }
        Ok(ExecutionGroupContext { groups })
    }

    fn group_data_source(&self, data_source: &str, sql_units: Vec<SqlUnit>) -> Vec<ExecutionGroup> {
        let max = self.max_connections_size_per_query;
        let desired_size = sql_units.len().div_ceil(max).max(1);
        let connection_mode = if max < sql_units.len() {
            ConnectionMode::ConnectionStrictly
        } else {
            ConnectionMode::MemoryStrictly
        };
        tracing::debug!(
            data_source,
            units = sql_units.len(),
            batch_size = desired_size,
            mode = %connection_mode,
            "grouping execution units"
        );
        sql_units
            .chunks(desired_size)
            .map(|chunk| ExecutionGroup {
                data_source_name: data_source.to_string(),
                connection_mode,
                inputs: chunk.iter().map(|u| ExecutionUnit::new(data_source, u.clone())).collect(),
            })
            .collect()
    }
}

/// Buckets SQL units per data source, keeping first-seen order.
fn aggregate_sql_units(units: Vec<ExecutionUnit>) -> Vec<(String, Vec<SqlUnit>)> {
    let mut result: Vec<(String, Vec<SqlUnit>)> = Vec::new();
    for unit in units {
        match result.iter_mut().find(|(ds, _)| *ds == unit.data_source_name) {
            Some((_, sql_units)) => sql_units.push(unit.sql_unit),
            None => result.push((unit.data_source_name, vec![unit.sql_unit])),
        }
    }
    result
}

/// Scatter execution
///
/// Every execution group runs on its own blocking worker; units inside a
/// group share one connection and run serially. Results come back in group
/// order, which is unrelated to the order in which shards answered.

use super::prepare::{ExecutionGroup, ExecutionGroupContext};
use super::query_result::{MemoryQueryResult, QueryResult};
use super::unit::{ExecutionUnit, SqlUnit};
use crate::core::{Result, ShardingError, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Access to the physical data sources.
pub trait ShardConnector: Send + Sync {
    fn execute_query(&self, data_source: &str, sql_unit: &SqlUnit) -> Result<Box<dyn QueryResult>>;

    fn execute_update(&self, data_source: &str, sql_unit: &SqlUnit) -> Result<u64>;
}

#[derive(Clone)]
pub struct ExecutorEngine {
    connector: Arc<dyn ShardConnector>,
}

impl ExecutorEngine {
    #[must_use]
    pub fn new(connector: Arc<dyn ShardConnector>) -> Self {
        Self { connector }
    }

    pub async fn execute_query(&self, context: ExecutionGroupContext) -> Result<Vec<Box<dyn QueryResult>>> {
        self.execute(context, |connector, unit| {
            connector.execute_query(&unit.data_source_name, &unit.sql_unit)
        })
        .await
    }

    /// Update counts, one per execution unit.
    pub async fn execute_update(&self, context: ExecutionGroupContext) -> Result<Vec<u64>> {
        self.execute(context, |connector, unit| {
            connector.execute_update(&unit.data_source_name, &unit.sql_unit)
        })
        .await
    }

    async fn execute<T, F>(&self, context: ExecutionGroupContext, callback: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(&dyn ShardConnector, &ExecutionUnit) -> Result<T> + Send + Sync + 'static,
    {
        tracing::debug!(groups = context.groups.len(), units = context.unit_count(), "executing");
        let callback = Arc::new(callback);
        let handles: Vec<_> = context
            .groups
            .into_iter()
            .map(|group| {
                let connector = Arc::clone(&self.connector);
                let callback = Arc::clone(&callback);
                let data_source = group.data_source_name.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    execute_group(connector.as_ref(), &group, |c, u| callback(c, u))
                });
                (data_source, handle)
            })
            .collect();
        let mut results = Vec::new();
        for (data_source, handle) in handles {
            let group_results = handle.await.map_err(|e| ShardingError::ExecutionFailed {
                data_source,
                message: format!("worker join error: {e}"),
            })??;
            results.extend(group_results);
        }
        Ok(results)
    }
}

fn execute_group<T>(
    connector: &dyn ShardConnector,
    group: &ExecutionGroup,
    callback: impl Fn(&dyn ShardConnector, &ExecutionUnit) -> Result<T>,
) -> Result<Vec<T>> {
    group
        .inputs
        .iter()
        .map(|unit| {
            callback(connector, unit).map_err(|e| {
                tracing::warn!(data_source = %unit.data_source_name, sql = %unit.sql_unit.sql, error = %e, "execution unit failed");
                match e {
                    failed @ ShardingError::ExecutionFailed { .. } => failed,
                    other => ShardingError::ExecutionFailed {
                        data_source: unit.data_source_name.clone(),
                        message: other.to_string(),
                    },
                }
            })
        })
        .collect()
}

type TableRows = (Vec<String>, Vec<Vec<Value>>);

/// In-memory data sources keyed by data source and actual table name.
///
/// A query returns the rows of every registered table its SQL mentions.
#[derive(Debug, Default)]
pub struct MemoryShardConnector {
    tables: HashMap<String, Vec<(String, TableRows)>>,
    update_counts: HashMap<String, u64>,
    failing: HashSet<String>,
    executed: Mutex<Vec<ExecutionUnit>>,
}

impl MemoryShardConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_table(mut self, data_source: &str, table: &str, labels: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.tables.entry(data_source.to_string()).or_default().push((
            table.to_string(),
            (labels.iter().map(|l| (*l).to_string()).collect(), rows),
        ));
        self
    }

    /// Rows affected by every update on `data_source`; defaults to 1.
    #[must_use]
    pub fn with_update_count(mut self, data_source: &str, count: u64) -> Self {
        self.update_counts.insert(data_source.to_string(), count);
        self
    }

    #[must_use]
    pub fn failing(mut self, data_source: &str) -> Self {
        self.failing.insert(data_source.to_string());
        self
    }

    /// Units executed so far, in execution order.
    #[must_use]
    pub fn executed(&self) -> Vec<ExecutionUnit> {
        self.executed.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn record(&self, data_source: &str, sql_unit: &SqlUnit) -> Result<()> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(ExecutionUnit::new(data_source, sql_unit.clone()));
        }
        if self.failing.contains(data_source) {
            return Err(ShardingError::ExecutionFailed {
                data_source: data_source.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

impl ShardConnector for MemoryShardConnector {
    fn execute_query(&self, data_source: &str, sql_unit: &SqlUnit) -> Result<Box<dyn QueryResult>> {
        self.record(data_source, sql_unit)?;
        let mut labels = Vec::new();
        let mut rows = Vec::new();
        for (table, (table_labels, table_rows)) in self.tables.get(data_source).into_iter().flatten() {
            if super::kernel::contains_identifier(&sql_unit.sql, table) {
                labels.clone_from(table_labels);
                rows.extend(table_rows.iter().cloned().map(Into::into));
            }
        }
        Ok(Box::new(MemoryQueryResult::from_rows(labels, rows)))
    }

    fn execute_update(&self, data_source: &str, sql_unit: &SqlUnit) -> Result<u64> {
        self.record(data_source, sql_unit)?;
        Ok(self.update_counts.get(data_source).copied().unwrap_or(1))
    }
}

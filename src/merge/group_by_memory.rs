/// GROUP BY memory merge
///
/// Drains every partial result, folds rows into one output row per group
/// key and sorts the groups. Used whenever shards cannot deliver rows in
/// group order.

use super::aggregation::{aggregate_row, create_units, write_results, AggregationColumn, AggregationUnit};
use super::compare::{compare_rows, group_key, ResolvedOrderItem};
use super::MergedResult;
use crate::core::{Result, ShardingError, Value};
use crate::executor::QueryResult;
use crate::statement::{AggregationType, Projection, ProjectionsContext};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Default)]
pub struct GroupByMemoryMergedResult {
    rows: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
}

impl MergedResult for GroupByMemoryMergedResult {
    fn next(&mut self) -> Result<bool> {
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn value(&self, index: usize) -> Result<Value> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| ShardingError::InvalidExpression("merged result is exhausted".to_string()))?;
        Ok(row.get(index).cloned().unwrap_or(Value::Null))
    }
}

impl GroupByMemoryMergedResult {
    /// Rows sort by `order_items`, or by `group_items` when there is no ORDER BY.
    pub fn new(
        results: Vec<Box<dyn QueryResult>>,
        projections: &ProjectionsContext,
        group_items: &[ResolvedOrderItem],
        order_items: &[ResolvedOrderItem],
    ) -> Result<Self> {
        let columns = AggregationColumn::from_projections(projections);
        let mut positions: HashMap<Vec<Value>, usize> = HashMap::with_capacity(1024);
        let mut groups: Vec<(Vec<Value>, Vec<Box<dyn AggregationUnit>>)> = Vec::new();
        for mut result in results {
            let width = result.column_count();
            while result.next()? {
                let row = (0..width).map(|i| result.value(i)).collect::<Result<Vec<_>>>()?;
                let key = group_key(&row, group_items);
                let position = match positions.get(&key) {
                    Some(position) => *position,
                    None => {
                        groups.push((row.clone(), create_units(&columns)));
                        positions.insert(key, groups.len() - 1);
                        groups.len() - 1
                    }
                };
                aggregate_row(&columns, &mut groups[position].1, &row)?;
            }
        }
        if groups.is_empty() {
            tracing::debug!("no rows to group, returning aggregate over the empty set");
            return Ok(Self::from_rows(vec![empty_set_row(projections)]));
        }
        let mut rows: Vec<Vec<Value>> = groups
            .into_iter()
            .map(|(mut row, units)| {
                write_results(&columns, &units, &mut row);
                row
            })
            .collect();
        let sort_items = if order_items.is_empty() { group_items } else { order_items };
        rows.sort_by(|a, b| compare_rows(a, b, sort_items));
        tracing::debug!(groups = rows.len(), "grouped in memory");
        Ok(Self::from_rows(rows))
    }

    fn from_rows(rows: Vec<Vec<Value>>) -> Self {
        Self { rows: rows.into(), current: None }
    }
}

/// COUNT columns hold 0, every other column NULL.
fn empty_set_row(projections: &ProjectionsContext) -> Vec<Value> {
    let mut row = vec![Value::Null; projections.column_count()];
    for (i, projection) in projections.projections().iter().enumerate() {
        if let Projection::Aggregation(aggregation) = projection {
            if aggregation.aggregation == AggregationType::Count {
                row[i] = Value::Integer(0);
            }
        }
    }
    row
}

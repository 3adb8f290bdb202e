/// GROUP BY stream merge
///
/// When every shard returns rows ordered by the group key, the order-by
/// stream presents each group as a run of consecutive rows. A group is
/// complete as soon as a row with a different key shows up.

use super::aggregation::{aggregate_row, create_units, write_results, AggregationColumn};
use super::compare::{group_key, ResolvedOrderItem};
use super::order_by::OrderByStreamMergedResult;
use super::MergedResult;
use crate::core::{Result, ShardingError, Value};
use crate::executor::QueryResult;
use crate::statement::ProjectionsContext;

pub struct GroupByStreamMergedResult {
    inner: OrderByStreamMergedResult,
    group_items: Vec<ResolvedOrderItem>,
    columns: Vec<AggregationColumn>,
    width: usize,
    current_row: Option<Vec<Value>>,
    /// The inner stream sits on a row not yet folded into any group.
    pending: bool,
}

impl GroupByStreamMergedResult {
    pub fn new(
        results: Vec<Box<dyn QueryResult>>,
        projections: &ProjectionsContext,
        group_items: Vec<ResolvedOrderItem>,
    ) -> Result<Self> {
        let width = results.first().map_or(0, |r| r.column_count());
        let mut inner = OrderByStreamMergedResult::new(results, group_items.clone())?;
        let pending = inner.next()?;
        Ok(Self {
            inner,
            group_items,
            columns: AggregationColumn::from_projections(projections),
            width,
            current_row: None,
            pending,
        })
    }

    fn inner_row(&self) -> Result<Vec<Value>> {
        (0..self.width).map(|i| self.inner.value(i)).collect()
    }
}

impl MergedResult for GroupByStreamMergedResult {
    fn next(&mut self) -> Result<bool> {
        if !self.pending {
            self.current_row = None;
            return Ok(false);
        }
        let mut row = self.inner_row()?;
        let key = group_key(&row, &self.group_items);
        let mut units = create_units(&self.columns);
        aggregate_row(&self.columns, &mut units, &row)?;
        loop {
            if !self.inner.next()? {
                self.pending = false;
                break;
            }
            let next = self.inner_row()?;
            if group_key(&next, &self.group_items) != key {
                break;
            }
            aggregate_row(&self.columns, &mut units, &next)?;
        }
        write_results(&self.columns, &units, &mut row);
        self.current_row = Some(row);
        Ok(true)
    }

    fn value(&self, index: usize) -> Result<Value> {
        let row = self
            .current_row
            .as_ref()
            .ok_or_else(|| ShardingError::InvalidExpression("merged result is exhausted".to_string()))?;
        Ok(row.get(index).cloned().unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MemoryQueryResult;
    use crate::statement::{AggregationType, NullsOrder, OrderDirection, Projection};

    fn shard(rows: &[(&str, i64)]) -> Box<dyn QueryResult> {
        Box::new(MemoryQueryResult::new(
            &["k", "COUNT(*)"],
            rows.iter().map(|(k, c)| vec![Value::from(*k), Value::Integer(*c)]).collect(),
        ))
    }

    #[test]
    fn test_groups_consecutive_rows_across_shards() {
        let projections = ProjectionsContext::new(
            vec![Projection::column("k"), Projection::aggregation(AggregationType::Count, None)],
            false,
        );
        let items = vec![ResolvedOrderItem {
            index: 0,
            direction: OrderDirection::Asc,
            nulls_order: NullsOrder::Low,
            case_sensitive: true,
        }];
        let mut merged = GroupByStreamMergedResult::new(
            vec![shard(&[("a", 1), ("c", 2)]), shard(&[("a", 4), ("b", 1), ("c", 1)]), shard(&[])],
            &projections,
            items,
        )
        .unwrap();
        let mut rows = Vec::new();
        while merged.next().unwrap() {
            rows.push((merged.value(0).unwrap(), merged.value(1).unwrap()));
        }
        assert_eq!(
            rows,
            vec![
                (Value::from("a"), Value::Integer(5)),
                (Value::from("b"), Value::Integer(1)),
                (Value::from("c"), Value::Integer(3)),
            ]
        );
        assert!(merged.value(0).is_err());
    }
}

/// Result merge engine
///
/// Turns the partial results of a scattered statement into one cursor.
/// One base merger is picked per statement:
/// - a single partial result passes through untouched
/// - GROUP BY or aggregates: group-by stream when GROUP BY equals ORDER BY,
///   group-by memory otherwise
/// - DISTINCT rows: grouped on every projected column
/// - ORDER BY: k-way stream merge
/// - anything else: concatenation
///
/// HAVING and pagination decorate the base merger when more than one
/// partial result took part.

pub mod aggregation;
pub mod compare;
pub mod group_by_memory;
pub mod group_by_stream;
pub mod having;
pub mod iterator;
pub mod order_by;
pub mod pagination;
pub mod result_set;

pub use aggregation::{create_aggregation_unit, AggregationUnit};
pub use group_by_memory::GroupByMemoryMergedResult;
pub use group_by_stream::GroupByStreamMergedResult;
pub use having::HavingDecoratorMergedResult;
pub use iterator::IteratorStreamMergedResult;
pub use order_by::OrderByStreamMergedResult;
pub use pagination::{LimitDecoratorMergedResult, RowNumberDecoratorMergedResult, TopAndRowNumberDecoratorMergedResult};
pub use result_set::MergedResultSet;

use crate::core::{Result, Schema, Value};
use crate::executor::QueryResult;
use crate::metadata::DatabaseType;
use crate::statement::{OrderByItem, SelectStatementContext, StatementContext};
use compare::{column_case_sensitivity, resolve_order_items};
use std::sync::Arc;

/// Forward-only cursor produced by a merger or decorator.
pub trait MergedResult: Send {
    fn next(&mut self) -> Result<bool>;

    /// Cell of the current row at a zero-based position.
    fn value(&self, index: usize) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct MergeEngine {
    database_type: DatabaseType,
    schema: Arc<Schema>,
}

impl MergeEngine {
    #[must_use]
    pub const fn new(database_type: DatabaseType, schema: Arc<Schema>) -> Self {
        Self { database_type, schema }
    }

    pub fn merge(
        &self,
        results: Vec<Box<dyn QueryResult>>,
        statement: &StatementContext,
        parameters: &[Value],
    ) -> Result<MergedResultSet> {
        let labels = results.first().map(|r| r.column_labels().to_vec()).unwrap_or_default();
        let merged: Box<dyn MergedResult> = match statement {
            StatementContext::Select(select) if results.len() > 1 => {
                let case_sensitive = column_case_sensitivity(&labels, &statement.tables(), &self.schema);
                let merged = Self::build(results, select, &labels, &case_sensitive)?;
                self.decorate(merged, select, &labels, parameters)?
            }
            _ => {
                tracing::debug!(results = results.len(), "merging by concatenation");
                Box::new(IteratorStreamMergedResult::new(results))
            }
        };
        Ok(MergedResultSet::new(merged, labels))
    }

    fn build(
        results: Vec<Box<dyn QueryResult>>,
        select: &SelectStatementContext,
        labels: &[String],
        case_sensitive: &[bool],
    ) -> Result<Box<dyn MergedResult>> {
        if !select.group_by.is_empty() || select.projections.has_aggregation() {
            return Self::build_group_by(results, select, &select.group_by, labels, case_sensitive);
        }
        if select.projections.is_distinct_row() {
            let group_by: Vec<OrderByItem> =
                (1..=select.projections.projections().len()).map(OrderByItem::position).collect();
            return Self::build_group_by(results, select, &group_by, labels, case_sensitive);
        }
        if !select.order_by.is_empty() {
            tracing::debug!("merging by order-by stream");
            let items = resolve_order_items(&select.order_by, labels, case_sensitive)?;
            return Ok(Box::new(OrderByStreamMergedResult::new(results, items)?));
        }
        tracing::debug!("merging by iterator stream");
        Ok(Box::new(IteratorStreamMergedResult::new(results)))
    }

    fn build_group_by(
        results: Vec<Box<dyn QueryResult>>,
        select: &SelectStatementContext,
        group_by: &[OrderByItem],
        labels: &[String],
        case_sensitive: &[bool],
    ) -> Result<Box<dyn MergedResult>> {
        let group_items = resolve_order_items(group_by, labels, case_sensitive)?;
        let same_order = !group_by.is_empty()
            && group_by.len() == select.order_by.len()
            && group_by.iter().zip(&select.order_by).all(|(g, o)| g.same_item(o));
        if same_order {
            tracing::debug!("merging by group-by stream");
            return Ok(Box::new(GroupByStreamMergedResult::new(results, &select.projections, group_items)?));
        }
        tracing::debug!("merging by group-by memory");
        let order_items = resolve_order_items(&select.order_by, labels, case_sensitive)?;
        Ok(Box::new(GroupByMemoryMergedResult::new(results, &select.projections, &group_items, &order_items)?))
    }

    fn decorate(
        &self,
        mut merged: Box<dyn MergedResult>,
        select: &SelectStatementContext,
        labels: &[String],
        parameters: &[Value],
    ) -> Result<Box<dyn MergedResult>> {
        if let Some(having) = &select.having {
            merged = Box::new(HavingDecoratorMergedResult::new(
                merged,
                having.clone(),
                labels.to_vec(),
                parameters.to_vec(),
            ));
        }
        let Some(pagination) = select.pagination.as_ref().filter(|p| p.has_pagination()) else {
            return Ok(merged);
        };
        let offset = pagination.actual_offset(parameters)?;
        let row_count = pagination.actual_row_count(parameters)?;
        tracing::debug!(offset, row_count = ?row_count, database_type = %self.database_type, "paginating merged rows");
        Ok(match self.database_type.trunk() {
            DatabaseType::MySQL | DatabaseType::PostgreSQL => {
                Box::new(LimitDecoratorMergedResult::new(merged, offset, row_count)?)
            }
            DatabaseType::Oracle => Box::new(RowNumberDecoratorMergedResult::new(merged, offset, row_count)?),
            DatabaseType::SQLServer => Box::new(TopAndRowNumberDecoratorMergedResult::new(merged, offset, row_count)?),
            _ => merged,
        })
    }
}

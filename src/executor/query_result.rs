use crate::core::{Result, Row, ShardingError, Value};
use std::collections::VecDeque;

/// Forward-only cursor over the rows one shard returned.
///
/// Column positions are zero-based.
pub trait QueryResult: Send {
    fn next(&mut self) -> Result<bool>;

    fn value(&self, index: usize) -> Result<Value>;

    fn column_labels(&self) -> &[String];

    fn column_count(&self) -> usize {
        self.column_labels().len()
    }
}

/// Fully buffered partial result.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueryResult {
    labels: Vec<String>,
    rows: VecDeque<Row>,
    current: Option<Row>,
}

impl MemoryQueryResult {
    #[must_use]
    pub fn new(labels: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
            rows: rows.into_iter().map(Row::new).collect(),
            current: None,
        }
    }

    #[must_use]
    pub fn from_rows(labels: Vec<String>, rows: Vec<Row>) -> Self {
        Self { labels, rows: rows.into(), current: None }
    }
}

impl QueryResult for MemoryQueryResult {
    fn next(&mut self) -> Result<bool> {
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn value(&self, index: usize) -> Result<Value> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| ShardingError::InvalidExpression("cursor is not positioned on a row".to_string()))?;
        row.get(index)
            .cloned()
            .ok_or_else(|| ShardingError::ColumnNotFound(format!("#{index}")))
    }

    fn column_labels(&self) -> &[String] {
        &self.labels
    }
}

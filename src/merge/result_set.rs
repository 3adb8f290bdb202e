use super::compare::label_index;
use super::MergedResult;
use crate::core::{Result, Row, ShardingError, Value};

/// The merged cursor handed back to callers.
///
/// Columns are addressed by zero-based ordinal or by label; label lookup
/// ignores case.
pub struct MergedResultSet {
    merged: Box<dyn MergedResult>,
    labels: Vec<String>,
}

impl MergedResultSet {
    #[must_use]
    pub fn new(merged: Box<dyn MergedResult>, labels: Vec<String>) -> Self {
        Self { merged, labels }
    }

    pub fn next(&mut self) -> Result<bool> {
        self.merged.next()
    }

    pub fn get(&self, index: usize) -> Result<Value> {
        if index >= self.labels.len() {
            return Err(ShardingError::ColumnNotFound(format!("#{index}")));
        }
        self.merged.value(index)
    }

    pub fn get_by_label(&self, label: &str) -> Result<Value> {
        let index =
            label_index(&self.labels, label).ok_or_else(|| ShardingError::ColumnNotFound(label.to_string()))?;
        self.merged.value(index)
    }

    #[must_use]
    pub fn column_labels(&self) -> &[String] {
        &self.labels
    }

    /// Drains the remaining rows.
    pub fn into_rows(mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while self.next()? {
            let values = (0..self.labels.len()).map(|i| self.merged.value(i)).collect::<Result<Vec<_>>>()?;
            rows.push(Row::new(values));
        }
        Ok(rows)
    }
}

impl std::fmt::Debug for MergedResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergedResultSet").field("labels", &self.labels).finish_non_exhaustive()
    }
}

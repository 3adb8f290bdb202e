use super::MergedResult;
use crate::core::{Result, ShardingError, Value};
use crate::executor::QueryResult;

/// Concatenates partial results in the order they were given.
pub struct IteratorStreamMergedResult {
    results: Vec<Box<dyn QueryResult>>,
    current: usize,
}

impl IteratorStreamMergedResult {
    #[must_use]
    pub fn new(results: Vec<Box<dyn QueryResult>>) -> Self {
        Self { results, current: 0 }
    }
}

impl MergedResult for IteratorStreamMergedResult {
    fn next(&mut self) -> Result<bool> {
        while let Some(result) = self.results.get_mut(self.current) {
            if result.next()? {
                return Ok(true);
            }
            self.current += 1;
        }
        Ok(false)
    }

    fn value(&self, index: usize) -> Result<Value> {
        self.results
            .get(self.current)
            .ok_or_else(|| ShardingError::InvalidExpression("merged result is exhausted".to_string()))?
            .value(index)
    }
}

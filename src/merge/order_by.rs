/// ORDER BY stream merge
///
/// Every shard already sorted its rows, so a k-way merge over a binary heap
/// holding one row per shard yields the global order without buffering.

use super::compare::{compare_values, ResolvedOrderItem};
use super::MergedResult;
use crate::core::{Result, ShardingError, Value};
use crate::executor::QueryResult;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// A partial result positioned on a row, keyed by that row's sort values.
struct OrderByValue {
    result: Box<dyn QueryResult>,
    items: Arc<[ResolvedOrderItem]>,
    order_values: Vec<Value>,
}

impl OrderByValue {
    fn next(&mut self) -> Result<bool> {
        if !self.result.next()? {
            return Ok(false);
        }
        self.order_values = self
            .items
            .iter()
            .map(|item| self.result.value(item.index))
            .collect::<Result<_>>()?;
        Ok(true)
    }

    fn compare(&self, other: &Self) -> Ordering {
        for (i, item) in self.items.iter().enumerate() {
            let ordering = compare_values(
                &self.order_values[i],
                &other.order_values[i],
                item.direction,
                item.nulls_order,
                item.case_sensitive,
            );
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl PartialEq for OrderByValue {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for OrderByValue {}

impl PartialOrd for OrderByValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderByValue {
    // BinaryHeap is a max-heap; the smallest row must surface first
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other).reverse()
    }
}

pub struct OrderByStreamMergedResult {
    queue: BinaryHeap<OrderByValue>,
    current: Option<OrderByValue>,
}

impl OrderByStreamMergedResult {
    pub fn new(results: Vec<Box<dyn QueryResult>>, items: Vec<ResolvedOrderItem>) -> Result<Self> {
        let items: Arc<[ResolvedOrderItem]> = items.into();
        let mut queue = BinaryHeap::with_capacity(results.len());
        for result in results {
            let mut value = OrderByValue { result, items: Arc::clone(&items), order_values: Vec::new() };
            if value.next()? {
                queue.push(value);
            }
        }
        Ok(Self { queue, current: None })
    }
}

impl MergedResult for OrderByStreamMergedResult {
    fn next(&mut self) -> Result<bool> {
        if let Some(mut current) = self.current.take() {
            if current.next()? {
                self.queue.push(current);
            }
        }
        self.current = self.queue.pop();
        Ok(self.current.is_some())
    }

    fn value(&self, index: usize) -> Result<Value> {
        self.current
            .as_ref()
            .ok_or_else(|| ShardingError::InvalidExpression("merged result is exhausted".to_string()))?
            .result
            .value(index)
    }
}

/// HAVING decorator
///
/// Re-applies the HAVING predicate to merged rows; a shard only saw its own
/// part of each group, so its HAVING filter cannot be trusted.
/// Supports: =, !=, >, <, >=, <=, BETWEEN, LIKE, IN, IS NULL, AND, OR.

use super::compare::label_index;
use super::MergedResult;
use crate::core::{Result, ShardingError, Value};
use crate::statement::{Condition, Expression};
use std::cmp::Ordering;

/// Evaluates a predicate against the current row of a merged result.
pub struct HavingEvaluator<'a> {
    labels: &'a [String],
    parameters: &'a [Value],
}

impl<'a> HavingEvaluator<'a> {
    #[must_use]
    pub const fn new(labels: &'a [String], parameters: &'a [Value]) -> Self {
        Self { labels, parameters }
    }

    pub fn evaluate(&self, row: &dyn MergedResult, condition: &Condition) -> Result<bool> {
        match condition {
            Condition::Equals(col, expr) => self.compare(row, col, expr, Ordering::is_eq),
            Condition::NotEquals(col, expr) => self.compare(row, col, expr, Ordering::is_ne),
            Condition::GreaterThan(col, expr) => self.compare(row, col, expr, Ordering::is_gt),
            Condition::LessThan(col, expr) => self.compare(row, col, expr, Ordering::is_lt),
            Condition::GreaterThanOrEqual(col, expr) => self.compare(row, col, expr, Ordering::is_ge),
            Condition::LessThanOrEqual(col, expr) => self.compare(row, col, expr, Ordering::is_le),
            Condition::Between(col, low, high) => Ok(self.compare(row, col, low, Ordering::is_ge)?
                && self.compare(row, col, high, Ordering::is_le)?),
            Condition::Like(col, pattern) => match self.cell(row, col)? {
                Value::Text(text) | Value::Char(text) => Ok(like_pattern_match(&text, pattern)),
                Value::Null => Ok(false), // NULL doesn't match anything
                other => Err(ShardingError::NotComparable(format!("LIKE on non-text value {other}"))),
            },
            Condition::In(col, exprs) => {
                let value = self.cell(row, col)?;
                if value.is_null() {
                    return Ok(false);
                }
                for expr in exprs {
                    let candidate = self.resolve(expr)?;
                    if value.compare(&candidate) == Some(Ordering::Equal) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::IsNull(col) => Ok(self.cell(row, col)?.is_null()),
            Condition::IsNotNull(col) => Ok(!self.cell(row, col)?.is_null()),
            Condition::And(left, right) => Ok(self.evaluate(row, left)? && self.evaluate(row, right)?),
            Condition::Or(left, right) => Ok(self.evaluate(row, left)? || self.evaluate(row, right)?),
        }
    }

    fn cell(&self, row: &dyn MergedResult, label: &str) -> Result<Value> {
        let index = label_index(self.labels, label).ok_or_else(|| ShardingError::ColumnNotFound(label.to_string()))?;
        row.value(index)
    }

    fn resolve(&self, expr: &Expression) -> Result<Value> {
        expr.resolve(self.parameters)?
            .ok_or_else(|| ShardingError::Unsupported(format!("HAVING operand {expr:?} cannot be evaluated after merge")))
    }

    /// NULL on either side never satisfies a comparison.
    fn compare(
        &self,
        row: &dyn MergedResult,
        label: &str,
        expr: &Expression,
        accept: fn(Ordering) -> bool,
    ) -> Result<bool> {
        let value = self.cell(row, label)?;
        let operand = self.resolve(expr)?;
        if value.is_null() || operand.is_null() {
            return Ok(false);
        }
        let ordering = value
            .compare(&operand)
            .ok_or_else(|| ShardingError::NotComparable(format!("{value} and {operand}")))?;
        Ok(accept(ordering))
    }
}

/// % matches zero or more characters, _ exactly one. Backtracks only to the last `%`.
fn like_pattern_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while ti < text.len() {
        match pattern.get(pi) {
            Some('%') => {
                backtrack = Some((pi, ti));
                pi += 1;
            }
            Some(&c) if c == '_' || c == text[ti] => {
                ti += 1;
                pi += 1;
            }
            _ => match backtrack {
                // let the last % swallow one more character
                Some((star, matched)) => {
                    pi = star + 1;
                    ti = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[pi..].iter().all(|&c| c == '%')
}

pub struct HavingDecoratorMergedResult {
    inner: Box<dyn MergedResult>,
    condition: Condition,
    labels: Vec<String>,
    parameters: Vec<Value>,
}

impl HavingDecoratorMergedResult {
    #[must_use]
    pub fn new(inner: Box<dyn MergedResult>, condition: Condition, labels: Vec<String>, parameters: Vec<Value>) -> Self {
        Self { inner, condition, labels, parameters }
    }
}

impl MergedResult for HavingDecoratorMergedResult {
    fn next(&mut self) -> Result<bool> {
        while self.inner.next()? {
            let evaluator = HavingEvaluator::new(&self.labels, &self.parameters);
            if evaluator.evaluate(self.inner.as_ref(), &self.condition)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn value(&self, index: usize) -> Result<Value> {
        self.inner.value(index)
    }
}

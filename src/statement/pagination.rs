/// Pagination (LIMIT/OFFSET, ROWNUM, TOP + ROW_NUMBER) in its logical form.
///
/// When a SELECT is scattered, every shard runs a widened window (`LIMIT 0,
/// offset + count`), so the merge layer only needs the *actual* global offset
/// and row count.

use crate::core::{Result, ShardingError, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationValue {
    Literal(u64),
    Parameter(usize),
}

/// How a row-number predicate bounds the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationBound {
    /// `LIMIT n` / `OFFSET n` / `TOP n`
    Exact,
    /// `ROWNUM > n`, `ROWNUM < n`
    Exclusive,
    /// `ROWNUM >= n`, `ROWNUM <= n`
    Inclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSegment {
    pub value: PaginationValue,
    pub bound: PaginationBound,
    /// Byte range `[start, stop)` of a literal value in the logic SQL.
    pub position: Option<(usize, usize)>,
}

impl PaginationSegment {
    #[must_use]
    pub const fn literal(value: u64) -> Self {
        Self { value: PaginationValue::Literal(value), bound: PaginationBound::Exact, position: None }
    }

    #[must_use]
    pub const fn parameter(index: usize) -> Self {
        Self { value: PaginationValue::Parameter(index), bound: PaginationBound::Exact, position: None }
    }

    #[must_use]
    pub const fn with_bound(mut self, bound: PaginationBound) -> Self {
        self.bound = bound;
        self
    }

    #[must_use]
    pub const fn at(mut self, start: usize, stop: usize) -> Self {
        self.position = Some((start, stop));
        self
    }

    fn resolve(&self, parameters: &[Value]) -> Result<u64> {
        match self.value {
            PaginationValue::Literal(v) => Ok(v),
            PaginationValue::Parameter(index) => {
                let value = parameters
                    .get(index)
                    .ok_or(ShardingError::ParameterOutOfRange(index))?;
                value
                    .as_int()
                    .and_then(|v| u64::try_from(v).ok())
                    .ok_or_else(|| ShardingError::InvalidExpression(format!(
                        "pagination parameter {index} is not a non-negative integer: {value}"
                    )))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationContext {
    pub offset: Option<PaginationSegment>,
    pub row_count: Option<PaginationSegment>,
}

impl PaginationContext {
    #[must_use]
    pub const fn new(offset: Option<PaginationSegment>, row_count: Option<PaginationSegment>) -> Self {
        Self { offset, row_count }
    }

    /// `LIMIT row_count OFFSET offset` with literal values.
    #[must_use]
    pub const fn limit(offset: u64, row_count: Option<u64>) -> Self {
        Self {
            offset: Some(PaginationSegment::literal(offset)),
            row_count: match row_count {
                Some(v) => Some(PaginationSegment::literal(v)),
                None => None,
            },
        }
    }

    #[must_use]
    pub const fn has_pagination(&self) -> bool {
        self.offset.is_some() || self.row_count.is_some()
    }

    /// Number of merged rows to skip.
    pub fn actual_offset(&self, parameters: &[Value]) -> Result<u64> {
        let Some(segment) = self.offset else {
            return Ok(0);
        };
        let value = segment.resolve(parameters)?;
        Ok(match segment.bound {
            PaginationBound::Inclusive => value.saturating_sub(1),
            PaginationBound::Exact | PaginationBound::Exclusive => value,
        })
    }

    /// Row count (LIMIT) or upper row-number bound (ROWNUM, TOP).
    pub fn actual_row_count(&self, parameters: &[Value]) -> Result<Option<u64>> {
        let Some(segment) = self.row_count else {
            return Ok(None);
        };
        let value = segment.resolve(parameters)?;
        Ok(Some(match segment.bound {
            PaginationBound::Exclusive => value.saturating_sub(1),
            PaginationBound::Exact | PaginationBound::Inclusive => value,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_limit() {
        let pagination = PaginationContext::limit(1, Some(2));
        assert!(pagination.has_pagination());
        assert_eq!(pagination.actual_offset(&[]).unwrap(), 1);
        assert_eq!(pagination.actual_row_count(&[]).unwrap(), Some(2));
    }

    #[test]
    fn test_parameter_limit() {
        let pagination = PaginationContext::new(
            Some(PaginationSegment::parameter(0)),
            Some(PaginationSegment::parameter(1)),
        );
        let params = vec![Value::Integer(3), Value::Integer(4)];
        assert_eq!(pagination.actual_offset(&params).unwrap(), 3);
        assert_eq!(pagination.actual_row_count(&params).unwrap(), Some(4));
        assert!(pagination.actual_offset(&[Value::Integer(-1)]).is_err());
    }

    #[test]
    fn test_row_number_bounds() {
        // ROWNUM >= 2 AND ROWNUM < 5
        let pagination = PaginationContext::new(
            Some(PaginationSegment::literal(2).with_bound(PaginationBound::Inclusive)),
            Some(PaginationSegment::literal(5).with_bound(PaginationBound::Exclusive)),
        );
        assert_eq!(pagination.actual_offset(&[]).unwrap(), 1);
        assert_eq!(pagination.actual_row_count(&[]).unwrap(), Some(4));
    }

    #[test]
    fn test_no_pagination() {
        let pagination = PaginationContext::default();
        assert!(!pagination.has_pagination());
        assert_eq!(pagination.actual_offset(&[]).unwrap(), 0);
        assert_eq!(pagination.actual_row_count(&[]).unwrap(), None);
    }
}

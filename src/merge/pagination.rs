/// Pagination decorators
///
/// Every shard ran the window `[0, offset + count)`, so the merged stream
/// holds more rows than asked for. These decorators skip the global offset
/// and stop after the global row count.

use super::MergedResult;
use crate::core::{Result, Value};

/// Pulls `offset` rows; true when the inner result ran dry first.
fn skip_offset(inner: &mut dyn MergedResult, offset: u64) -> Result<bool> {
    for _ in 0..offset {
        if !inner.next()? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `LIMIT count OFFSET offset` (MySQL, PostgreSQL and their kin).
pub struct LimitDecoratorMergedResult {
    inner: Box<dyn MergedResult>,
    row_count: Option<u64>,
    row_number: u64,
    skip_all: bool,
}

impl LimitDecoratorMergedResult {
    pub fn new(mut inner: Box<dyn MergedResult>, offset: u64, row_count: Option<u64>) -> Result<Self> {
        let skip_all = skip_offset(inner.as_mut(), offset)?;
        Ok(Self { inner, row_count, row_number: 0, skip_all })
    }
}

impl MergedResult for LimitDecoratorMergedResult {
    fn next(&mut self) -> Result<bool> {
        if self.skip_all {
            return Ok(false);
        }
        let Some(row_count) = self.row_count else {
            return self.inner.next();
        };
        self.row_number += 1;
        if self.row_number > row_count {
            return Ok(false);
        }
        self.inner.next()
    }

    fn value(&self, index: usize) -> Result<Value> {
        self.inner.value(index)
    }
}

/// `ROWNUM` windows (Oracle). `max_row_number` is the highest row number
/// still returned.
pub struct RowNumberDecoratorMergedResult {
    inner: Box<dyn MergedResult>,
    max_row_number: Option<u64>,
    row_number: u64,
    skip_all: bool,
}

impl RowNumberDecoratorMergedResult {
    pub fn new(mut inner: Box<dyn MergedResult>, offset: u64, max_row_number: Option<u64>) -> Result<Self> {
        let skip_all = skip_offset(inner.as_mut(), offset)?;
        Ok(Self { inner, max_row_number, row_number: offset + 1, skip_all })
    }
}

impl MergedResult for RowNumberDecoratorMergedResult {
    fn next(&mut self) -> Result<bool> {
        if self.skip_all {
            return Ok(false);
        }
        let Some(max_row_number) = self.max_row_number else {
            return self.inner.next();
        };
        let row_number = self.row_number;
        self.row_number += 1;
        if row_number > max_row_number {
            return Ok(false);
        }
        self.inner.next()
    }

    fn value(&self, index: usize) -> Result<Value> {
        self.inner.value(index)
    }
}

/// `TOP n` combined with a `ROW_NUMBER()` lower bound (SQL Server).
pub struct TopAndRowNumberDecoratorMergedResult {
    inner: Box<dyn MergedResult>,
    top: Option<u64>,
    row_number: u64,
    skip_all: bool,
}

impl TopAndRowNumberDecoratorMergedResult {
    pub fn new(mut inner: Box<dyn MergedResult>, offset: u64, top: Option<u64>) -> Result<Self> {
        let skip_all = skip_offset(inner.as_mut(), offset)?;
        Ok(Self { inner, top, row_number: offset, skip_all })
    }
}

impl MergedResult for TopAndRowNumberDecoratorMergedResult {
    fn next(&mut self) -> Result<bool> {
        if self.skip_all {
            return Ok(false);
        }
        let Some(top) = self.top else {
            return self.inner.next();
        };
        self.row_number += 1;
        if self.row_number > top {
            return Ok(false);
        }
        self.inner.next()
    }

    fn value(&self, index: usize) -> Result<Value> {
        self.inner.value(index)
    }
}

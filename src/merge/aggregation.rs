/// Aggregation units
///
/// One unit per aggregate projection and group. Units receive the partial
/// aggregate of every shard (or, for DISTINCT, the raw values) and fold
/// them into the global aggregate.

use crate::core::{Result, ShardingError, Value};
use crate::statement::{AggregationType, ProjectionsContext};
use rust_decimal::{Decimal, RoundingStrategy};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt::Debug;

/// Scale of AVG results.
pub const AVG_SCALE: u32 = 4;

pub trait AggregationUnit: Send + Debug {
    /// `values` holds one cell, or the COUNT and SUM cells of a derived AVG.
    fn merge(&mut self, values: &[Value]) -> Result<()>;

    fn result(&self) -> Value;
}

#[must_use]
pub fn create_aggregation_unit(aggregation: AggregationType, distinct: bool) -> Box<dyn AggregationUnit> {
    match (aggregation, distinct) {
        (AggregationType::Max, _) => Box::new(ComparableAggregationUnit::new(false)),
        (AggregationType::Min, _) => Box::new(ComparableAggregationUnit::new(true)),
        (AggregationType::Sum | AggregationType::Count, false) => Box::new(AccumulationAggregationUnit::default()),
        (AggregationType::Avg, false) => Box::new(AverageAggregationUnit::default()),
        (AggregationType::Count, true) => Box::new(DistinctCountAggregationUnit::default()),
        (AggregationType::Sum, true) => Box::new(DistinctSumAggregationUnit::default()),
        (AggregationType::Avg, true) => Box::new(DistinctAverageAggregationUnit::default()),
    }
}

/// An aggregate projection bound to the columns it reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationColumn {
    pub aggregation: AggregationType,
    pub distinct: bool,
    /// Column the merged aggregate is written to.
    pub index: usize,
    /// Columns fed into the unit: the aggregate itself, or AVG's derived COUNT and SUM.
    pub input_indexes: Vec<usize>,
}

impl AggregationColumn {
    #[must_use]
    pub fn from_projections(projections: &ProjectionsContext) -> Vec<Self> {
        projections
            .aggregation_projections()
            .map(|p| Self {
                aggregation: p.aggregation,
                distinct: p.distinct,
                index: p.index,
                input_indexes: if p.derived.is_empty() {
                    vec![p.index]
                } else {
                    p.derived.iter().map(|d| d.index).collect()
                },
            })
            .collect()
    }

    #[must_use]
    pub fn create_unit(&self) -> Box<dyn AggregationUnit> {
        create_aggregation_unit(self.aggregation, self.distinct)
    }
}

/// Fresh units for one group.
#[must_use]
pub fn create_units(columns: &[AggregationColumn]) -> Vec<Box<dyn AggregationUnit>> {
    columns.iter().map(AggregationColumn::create_unit).collect()
}

/// Feeds one partial row into a group's units.
pub fn aggregate_row(columns: &[AggregationColumn], units: &mut [Box<dyn AggregationUnit>], row: &[Value]) -> Result<()> {
    for (column, unit) in columns.iter().zip(units.iter_mut()) {
        let values: Vec<Value> = column
            .input_indexes
            .iter()
            .map(|i| row.get(*i).cloned().unwrap_or(Value::Null))
            .collect();
        unit.merge(&values)?;
    }
    Ok(())
}

/// Writes every unit's result into its column of `row`.
pub fn write_results(columns: &[AggregationColumn], units: &[Box<dyn AggregationUnit>], row: &mut Vec<Value>) {
    for (column, unit) in columns.iter().zip(units) {
        if column.index >= row.len() {
            row.resize(column.index + 1, Value::Null);
        }
        row[column.index] = unit.result();
    }
}

fn first(values: &[Value]) -> Option<&Value> {
    values.first().filter(|v| !v.is_null())
}

/// MIN and MAX.
#[derive(Debug)]
pub struct ComparableAggregationUnit {
    ascending: bool,
    result: Option<Value>,
}

impl ComparableAggregationUnit {
    #[must_use]
    pub const fn new(ascending: bool) -> Self {
        Self { ascending, result: None }
    }
}

impl AggregationUnit for ComparableAggregationUnit {
    fn merge(&mut self, values: &[Value]) -> Result<()> {
        let Some(value) = first(values) else {
            return Ok(());
        };
        if !value.is_comparable() {
            return Err(ShardingError::NotComparable(format!("aggregation value {value}")));
        }
        let replace = match &self.result {
            None => true,
            Some(current) => {
                let ordering = value.compare(current).ok_or_else(|| {
                    ShardingError::NotComparable(format!("aggregation values {value} and {current}"))
                })?;
                if self.ascending { ordering == Ordering::Less } else { ordering == Ordering::Greater }
            }
        };
        if replace {
            self.result = Some(value.clone());
        }
        Ok(())
    }

    fn result(&self) -> Value {
        self.result.clone().unwrap_or(Value::Null)
    }
}

/// SUM and COUNT: the partial results add up.
#[derive(Debug, Default)]
pub struct AccumulationAggregationUnit {
    result: Option<Value>,
}

impl AggregationUnit for AccumulationAggregationUnit {
    fn merge(&mut self, values: &[Value]) -> Result<()> {
        let Some(value) = first(values) else {
            return Ok(());
        };
        self.result = Some(match &self.result {
            None => value.checked_add(&Value::Integer(0))?,
            Some(current) => current.checked_add(value)?,
        });
        Ok(())
    }

    fn result(&self) -> Value {
        self.result.clone().unwrap_or(Value::Null)
    }
}

fn decimal(value: &Value) -> Result<Decimal> {
    value
        .to_decimal()
        .ok_or_else(|| ShardingError::NotComparable(format!("{value} is not numeric")))
}

fn average(sum: Decimal, count: Decimal, real: bool) -> Value {
    if count.is_zero() {
        return Value::Null;
    }
    let avg = sum
        .checked_div(count)
        .map(|avg| avg.round_dp_with_strategy(AVG_SCALE, RoundingStrategy::MidpointAwayFromZero));
    match (avg, real) {
        (Some(avg), true) => Value::Numeric(avg).to_f64().map_or(Value::Null, Value::Real),
        (Some(avg), false) => Value::Numeric(avg),
        (None, _) => Value::Null,
    }
}

/// AVG from the derived COUNT and SUM of every shard.
#[derive(Debug, Default)]
pub struct AverageAggregationUnit {
    count: Option<Decimal>,
    sum: Option<Decimal>,
    real: bool,
}

impl AggregationUnit for AverageAggregationUnit {
    fn merge(&mut self, values: &[Value]) -> Result<()> {
        let (Some(count), Some(sum)) = (values.first(), values.get(1)) else {
            return Err(ShardingError::InvalidExpression(
                "AVG needs derived COUNT and SUM columns".to_string(),
            ));
        };
        if count.is_null() || sum.is_null() {
            return Ok(());
        }
        self.real |= matches!(sum, Value::Real(_));
        self.count = Some(self.count.unwrap_or_default() + decimal(count)?);
        self.sum = Some(self.sum.unwrap_or_default() + decimal(sum)?);
        Ok(())
    }

    fn result(&self) -> Value {
        match (self.sum, self.count) {
            (Some(sum), Some(count)) => average(sum, count, self.real),
            _ => Value::Null,
        }
    }
}

#[derive(Debug, Default)]
pub struct DistinctCountAggregationUnit {
    values: HashSet<Value>,
}

impl AggregationUnit for DistinctCountAggregationUnit {
    fn merge(&mut self, values: &[Value]) -> Result<()> {
        if let Some(value) = first(values) {
            self.values.insert(value.clone());
        }
        Ok(())
    }

    fn result(&self) -> Value {
        Value::Integer(i64::try_from(self.values.len()).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Default)]
pub struct DistinctSumAggregationUnit {
    values: HashSet<Value>,
}

impl AggregationUnit for DistinctSumAggregationUnit {
    fn merge(&mut self, values: &[Value]) -> Result<()> {
        if let Some(value) = first(values) {
            decimal(value)?;
            self.values.insert(value.clone());
        }
        Ok(())
    }

    fn result(&self) -> Value {
        self.values
            .iter()
            .try_fold(None::<Value>, |acc, v| match acc {
                None => Some(Some(v.clone())),
                Some(total) => total.checked_add(v).ok().map(Some),
            })
            .flatten()
            .unwrap_or(Value::Null)
    }
}

/// Distinct AVG over the raw values every shard returned.
#[derive(Debug, Default)]
pub struct DistinctAverageAggregationUnit {
    values: HashSet<Value>,
}

impl AggregationUnit for DistinctAverageAggregationUnit {
    fn merge(&mut self, values: &[Value]) -> Result<()> {
        if let Some(value) = values.last().filter(|v| !v.is_null()) {
            decimal(value)?;
            self.values.insert(value.clone());
        }
        Ok(())
    }

    fn result(&self) -> Value {
        let mut sum = Decimal::ZERO;
        for value in &self.values {
            match value.to_decimal() {
                Some(d) => sum += d,
                None => return Value::Null,
            }
        }
        let real = self.values.iter().any(|v| matches!(v, Value::Real(_)));
        average(sum, Decimal::from(self.values.len()), real)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn merge_all(unit: &mut dyn AggregationUnit, rows: &[&[Value]]) {
        for row in rows {
            unit.merge(row).unwrap();
        }
    }

    #[test]
    fn test_min_max_skip_nulls() {
        let mut max = create_aggregation_unit(AggregationType::Max, false);
        merge_all(max.as_mut(), &[&[Value::Integer(3)], &[Value::Null], &[Value::Integer(9)], &[Value::Integer(4)]]);
        assert_eq!(max.result(), Value::Integer(9));
        let mut min = create_aggregation_unit(AggregationType::Min, false);
        merge_all(min.as_mut(), &[&[Value::from("b")], &[Value::from("a")]]);
        assert_eq!(min.result(), Value::from("a"));
        assert_eq!(create_aggregation_unit(AggregationType::Min, false).result(), Value::Null);
    }

    #[test]
    fn test_min_rejects_incomparable_values() {
        let mut min = create_aggregation_unit(AggregationType::Min, false);
        min.merge(&[Value::Integer(1)]).unwrap();
        assert!(matches!(min.merge(&[Value::from("x")]), Err(ShardingError::NotComparable(_))));
    }

    #[test]
    fn test_sum_and_count_accumulate() {
        let mut sum = create_aggregation_unit(AggregationType::Sum, false);
        merge_all(sum.as_mut(), &[&[Value::Integer(10)], &[Value::Integer(3)], &[Value::Null]]);
        assert_eq!(sum.result(), Value::Integer(13));
        let mut count = create_aggregation_unit(AggregationType::Count, false);
        merge_all(count.as_mut(), &[&[Value::Integer(2)], &[Value::Integer(5)]]);
        assert_eq!(count.result(), Value::Integer(7));
    }

    #[test]
    fn test_avg_uses_derived_count_and_sum() {
        let mut avg = create_aggregation_unit(AggregationType::Avg, false);
        merge_all(avg.as_mut(), &[&[Value::Integer(2), Value::Integer(10)], &[Value::Integer(1), Value::Integer(0)]]);
        assert_eq!(avg.result(), Value::Numeric(Decimal::from_str("3.3333").unwrap()));
        let mut half = create_aggregation_unit(AggregationType::Avg, false);
        half.merge(&[Value::Integer(8), Value::Integer(1)]).unwrap();
        assert_eq!(half.result(), Value::Numeric(Decimal::from_str("0.1250").unwrap()));
        assert_eq!(create_aggregation_unit(AggregationType::Avg, false).result(), Value::Null);
    }

    #[test]
    fn test_avg_rounds_half_up() {
        let mut avg = create_aggregation_unit(AggregationType::Avg, false);
        avg.merge(&[Value::Integer(16), Value::Integer(1)]).unwrap();
        // 1 / 16 = 0.0625 exactly; 1 / 32 = 0.03125 rounds up
        assert_eq!(avg.result(), Value::Numeric(Decimal::from_str("0.0625").unwrap()));
        avg.merge(&[Value::Integer(16), Value::Integer(0)]).unwrap();
        assert_eq!(avg.result(), Value::Numeric(Decimal::from_str("0.0313").unwrap()));
    }

    #[test]
    fn test_aggregation_columns_read_derived_avg_inputs() {
        use crate::statement::Projection;
        let projections = ProjectionsContext::new(
            vec![
                Projection::column("k"),
                Projection::aggregation(AggregationType::Avg, Some("v")),
                Projection::aggregation(AggregationType::Count, None),
            ],
            false,
        );
        let columns = AggregationColumn::from_projections(&projections);
        assert_eq!(columns[0].input_indexes, vec![3, 4]);
        assert_eq!(columns[1].input_indexes, vec![2]);

        let mut units = create_units(&columns);
        aggregate_row(&columns, &mut units, &[Value::Integer(1), Value::Null, Value::Integer(2), Value::Integer(2), Value::Integer(6)]).unwrap();
        aggregate_row(&columns, &mut units, &[Value::Integer(1), Value::Null, Value::Integer(1), Value::Integer(1), Value::Integer(3)]).unwrap();
        let mut row = vec![Value::Integer(1)];
        write_results(&columns, &units, &mut row);
        assert_eq!(row, vec![Value::Integer(1), Value::Numeric(Decimal::from(3)), Value::Integer(3)]);
    }

    #[test]
    fn test_distinct_units() {
        let rows: &[&[Value]] = &[&[Value::Integer(1)], &[Value::Integer(2)], &[Value::Integer(2)], &[Value::Null]];
        let mut count = create_aggregation_unit(AggregationType::Count, true);
        merge_all(count.as_mut(), rows);
        assert_eq!(count.result(), Value::Integer(2));
        let mut sum = create_aggregation_unit(AggregationType::Sum, true);
        merge_all(sum.as_mut(), rows);
        assert_eq!(sum.result(), Value::Integer(3));
        let mut avg = create_aggregation_unit(AggregationType::Avg, true);
        merge_all(avg.as_mut(), &[&[Value::Integer(1), Value::Integer(1)], &[Value::Integer(2), Value::Integer(2)]]);
        assert_eq!(avg.result(), Value::Numeric(Decimal::from_str("1.5000").unwrap()));
    }
}

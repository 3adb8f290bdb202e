use crate::core::Value;
use std::cmp::Ordering;

/// One end of a range condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeBound {
    pub value: Value,
    pub inclusive: bool,
}

/// `lower < / <= column < / <= upper`; a missing end is unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueRange {
    pub lower: Option<RangeBound>,
    pub upper: Option<RangeBound>,
}

impl ValueRange {
    #[must_use]
    pub fn closed(lower: Value, upper: Value) -> Self {
        Self {
            lower: Some(RangeBound { value: lower, inclusive: true }),
            upper: Some(RangeBound { value: upper, inclusive: true }),
        }
    }

    #[must_use]
    pub fn at_least(value: Value, inclusive: bool) -> Self {
        Self { lower: Some(RangeBound { value, inclusive }), upper: None }
    }

    #[must_use]
    pub fn at_most(value: Value, inclusive: bool) -> Self {
        Self { lower: None, upper: Some(RangeBound { value, inclusive }) }
    }

    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        let above = self.lower.as_ref().is_none_or(|b| match value.compare(&b.value) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => b.inclusive,
            _ => false,
        });
        let below = self.upper.as_ref().is_none_or(|b| match value.compare(&b.value) {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => b.inclusive,
            _ => false,
        });
        above && below
    }

    /// Tightest range covered by both.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            lower: tighter(self.lower.as_ref(), other.lower.as_ref(), Ordering::Greater),
            upper: tighter(self.upper.as_ref(), other.upper.as_ref(), Ordering::Less),
        }
    }

    /// Inclusive integer bounds, when both ends are integers.
    #[must_use]
    pub fn integer_bounds(&self) -> Option<(i64, i64)> {
        let lower = self.lower.as_ref()?;
        let upper = self.upper.as_ref()?;
        let low = lower.value.as_int()?.checked_add(i64::from(!lower.inclusive))?;
        let high = upper.value.as_int()?.checked_sub(i64::from(!upper.inclusive))?;
        Some((low, high))
    }
}

fn tighter(a: Option<&RangeBound>, b: Option<&RangeBound>, prefer: Ordering) -> Option<RangeBound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => Some(match x.value.compare(&y.value) {
            Some(Ordering::Equal) => RangeBound { value: x.value.clone(), inclusive: x.inclusive && y.inclusive },
            Some(ordering) if ordering == prefer => x.clone(),
            _ => y.clone(),
        }),
    }
}

/// Values of one sharding column for one logic table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardingConditionValue {
    List { column: String, table: String, values: Vec<Value> },
    Range { column: String, table: String, range: ValueRange },
}

impl ShardingConditionValue {
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::List { column, .. } | Self::Range { column, .. } => column,
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::List { table, .. } | Self::Range { table, .. } => table,
        }
    }
}

/// Sharding values extracted from one inserted row or one OR branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardingCondition {
    pub values: Vec<ShardingConditionValue>,
}

impl ShardingCondition {
    /// Values bound to `column` of `table`, matched case-insensitively.
    pub fn values_for<'a>(&'a self, table: &'a str, column: &'a str) -> impl Iterator<Item = &'a ShardingConditionValue> {
        self.values.iter().filter(move |v| {
            v.table().eq_ignore_ascii_case(table) && v.column().eq_ignore_ascii_case(column)
        })
    }

    /// A list with no values can never match a row.
    #[must_use]
    pub fn is_always_false(&self) -> bool {
        self.values
            .iter()
            .any(|v| matches!(v, ShardingConditionValue::List { values, .. } if values.is_empty()))
    }
}

/// Generated primary keys, one per inserted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKeyContext {
    pub column: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardingConditions {
    pub conditions: Vec<ShardingCondition>,
    pub generated_keys: Option<GeneratedKeyContext>,
}

impl ShardingConditions {
    #[must_use]
    pub const fn new(conditions: Vec<ShardingCondition>) -> Self {
        Self { conditions, generated_keys: None }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Every condition is unsatisfiable.
    #[must_use]
    pub fn is_always_false(&self) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(ShardingCondition::is_always_false)
    }

    /// Keeps only the last condition.
    pub fn merge(&mut self) {
        if self.conditions.len() > 1 {
            let last = self.conditions.pop();
            self.conditions.clear();
            self.conditions.extend(last);
        }
    }
}

use crate::core::{Result, Schema, ShardingError, Value};
use crate::statement::{split_column, NullsOrder, OrderByItem, OrderByTarget, OrderDirection};
use std::cmp::Ordering;

/// Compares two cells under an ORDER BY item.
///
/// NULLs sort first when the item's direction matches its NULL placement
/// (ascending with NULLs low, descending with NULLs high). Values of
/// unrelated types compare equal.
#[must_use]
pub fn compare_values(
    a: &Value,
    b: &Value,
    direction: OrderDirection,
    nulls_order: NullsOrder,
    case_sensitive: bool,
) -> Ordering {
    let nulls_direction = match nulls_order {
        NullsOrder::Low => OrderDirection::Asc,
        NullsOrder::High => OrderDirection::Desc,
    };
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => {
            return if direction == nulls_direction { Ordering::Less } else { Ordering::Greater };
        }
        (false, true) => {
            return if direction == nulls_direction { Ordering::Greater } else { Ordering::Less };
        }
        (false, false) => {}
    }
    let ordering = if case_sensitive { a.compare(b) } else { a.compare_ignore_case(b) }.unwrap_or(Ordering::Equal);
    match direction {
        OrderDirection::Asc => ordering,
        OrderDirection::Desc => ordering.reverse(),
    }
}

static NULL: Value = Value::Null;

/// Compares two rows item by item.
#[must_use]
pub fn compare_rows(a: &[Value], b: &[Value], items: &[ResolvedOrderItem]) -> Ordering {
    for item in items {
        let left = a.get(item.index).unwrap_or(&NULL);
        let right = b.get(item.index).unwrap_or(&NULL);
        let ordering = compare_values(left, right, item.direction, item.nulls_order, item.case_sensitive);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Group key of a row; text of case-insensitive columns is folded.
#[must_use]
pub fn group_key(row: &[Value], items: &[ResolvedOrderItem]) -> Vec<Value> {
    items
        .iter()
        .map(|item| {
            let value = row.get(item.index).unwrap_or(&NULL);
            if item.case_sensitive { value.clone() } else { value.fold_case() }
        })
        .collect()
}

/// An ORDER BY or GROUP BY item bound to a column of the partial results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOrderItem {
    pub index: usize,
    pub direction: OrderDirection,
    pub nulls_order: NullsOrder,
    pub case_sensitive: bool,
}

/// Binds items to column positions of `labels`.
pub fn resolve_order_items(
    items: &[OrderByItem],
    labels: &[String],
    case_sensitive: &[bool],
) -> Result<Vec<ResolvedOrderItem>> {
    items
        .iter()
        .map(|item| {
            let index = match (item.index, &item.target) {
                (Some(index), _) => index,
                (None, OrderByTarget::Position(position)) => position
                    .checked_sub(1)
                    .filter(|i| *i < labels.len())
                    .ok_or_else(|| ShardingError::ColumnNotFound(format!("#{position}")))?,
                (None, OrderByTarget::Column(name)) => label_index(labels, name)
                    .ok_or_else(|| ShardingError::ColumnNotFound(name.clone()))?,
            };
            Ok(ResolvedOrderItem {
                index,
                direction: item.direction,
                nulls_order: item.nulls_order,
                case_sensitive: case_sensitive.get(index).copied().unwrap_or(false),
            })
        })
        .collect()
}

/// Case-insensitive label lookup; `t.col` also matches a bare `col` label.
#[must_use]
pub fn label_index(labels: &[String], name: &str) -> Option<usize> {
    labels.iter().position(|l| l.eq_ignore_ascii_case(name)).or_else(|| {
        let (_, column) = split_column(name);
        labels.iter().position(|l| l.eq_ignore_ascii_case(column))
    })
}

/// Case sensitivity of each result column, found by looking the label up
/// in the statement's tables. Unknown tables, unknown columns and
/// non-text columns are insensitive.
#[must_use]
pub fn column_case_sensitivity(labels: &[String], tables: &[&str], schema: &Schema) -> Vec<bool> {
    labels
        .iter()
        .map(|label| {
            let (_, column) = split_column(label);
            tables
                .iter()
                .filter_map(|t| schema.get(t).ok())
                .find_map(|table| table.get_column(column))
                .is_some_and(|c| c.case_sensitive && c.data_type.is_textual())
        })
        .collect()
}

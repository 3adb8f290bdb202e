/// SELECT statement context
///
/// Projections, grouping, ordering, HAVING and pagination as seen by the
/// router and the merge engine.

use super::expression::Condition;
use super::pagination::PaginationContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationType {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregationType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// An aggregate in the select list.
///
/// `index` is the zero-based position of the aggregate's column in every
/// partial result. AVG carries derived COUNT and SUM projections that the
/// rewritten shard query appends after the visible columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationProjection {
    pub aggregation: AggregationType,
    pub distinct: bool,
    /// Argument text; `None` for `COUNT(*)`.
    pub argument: Option<String>,
    pub alias: Option<String>,
    pub index: usize,
    pub derived: Vec<AggregationProjection>,
}

impl AggregationProjection {
    #[must_use]
    pub fn label(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        let argument = self.argument.as_deref().unwrap_or("*");
        format!("{}({distinct}{argument})", self.aggregation.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Column { name: String, alias: Option<String> },
    Expression { text: String, alias: Option<String> },
    Aggregation(AggregationProjection),
}

impl Projection {
    #[must_use]
    pub fn column(name: &str) -> Self {
        Self::Column { name: name.to_string(), alias: None }
    }

    #[must_use]
    pub fn aggregation(aggregation: AggregationType, argument: Option<&str>) -> Self {
        Self::Aggregation(AggregationProjection {
            aggregation,
            distinct: false,
            argument: argument.map(str::to_string),
            alias: None,
            index: 0,
            derived: Vec::new(),
        })
    }

    #[must_use]
    pub fn distinct_aggregation(aggregation: AggregationType, argument: &str) -> Self {
        match Self::aggregation(aggregation, Some(argument)) {
            Self::Aggregation(mut projection) => {
                projection.distinct = true;
                Self::Aggregation(projection)
            }
            other => other,
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: &str) -> Self {
        match &mut self {
            Self::Column { alias: a, .. } | Self::Expression { alias: a, .. } => {
                *a = Some(alias.to_string());
            }
            Self::Aggregation(projection) => projection.alias = Some(alias.to_string()),
        }
        self
    }

    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Column { name, alias } => alias.clone().unwrap_or_else(|| name.clone()),
            Self::Expression { text, alias } => alias.clone().unwrap_or_else(|| text.clone()),
            Self::Aggregation(projection) => projection.label(),
        }
    }
}

/// Select list with resolved column positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionsContext {
    projections: Vec<Projection>,
    distinct_row: bool,
    column_count: usize,
}

impl ProjectionsContext {
    /// Assigns positions: visible projections first, then a COUNT and a SUM
    /// column for every AVG, in select-list order.
    #[must_use]
    pub fn new(projections: Vec<Projection>, distinct_row: bool) -> Self {
        let mut next_derived = projections.len();
        let mut derived_ordinal = 0;
        let projections = projections
            .into_iter()
            .enumerate()
            .map(|(index, projection)| match projection {
                Projection::Aggregation(mut aggregation) => {
                    aggregation.index = index;
                    if aggregation.aggregation == AggregationType::Avg {
                        aggregation.derived = [AggregationType::Count, AggregationType::Sum]
                            .into_iter()
                            .map(|kind| {
                                let derived = AggregationProjection {
                                    aggregation: kind,
                                    distinct: aggregation.distinct,
                                    argument: aggregation.argument.clone(),
                                    alias: Some(format!(
                                        "AVG_DERIVED_{}_{derived_ordinal}",
                                        kind.name()
                                    )),
                                    index: next_derived,
                                    derived: Vec::new(),
                                };
                                next_derived += 1;
                                derived
                            })
                            .collect();
                        derived_ordinal += 1;
                    }
                    Projection::Aggregation(aggregation)
                }
                other => other,
            })
            .collect();
        Self { projections, distinct_row, column_count: next_derived }
    }

    #[must_use]
    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    #[must_use]
    pub const fn is_distinct_row(&self) -> bool {
        self.distinct_row
    }

    /// Visible plus derived columns.
    #[must_use]
    pub const fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn aggregation_projections(&self) -> impl Iterator<Item = &AggregationProjection> {
        self.projections.iter().filter_map(|p| match p {
            Projection::Aggregation(aggregation) => Some(aggregation),
            _ => None,
        })
    }

    #[must_use]
    pub fn has_aggregation(&self) -> bool {
        self.aggregation_projections().next().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Where NULLs sit relative to other values before the direction is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    Low,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderByTarget {
    /// Column label or alias.
    Column(String),
    /// One-based position in the select list.
    Position(usize),
}

/// One ORDER BY or GROUP BY item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByItem {
    pub target: OrderByTarget,
    pub direction: OrderDirection,
    pub nulls_order: NullsOrder,
    /// Zero-based column position, filled in against the partial results' labels.
    pub index: Option<usize>,
}

impl OrderByItem {
    #[must_use]
    pub fn column(name: &str) -> Self {
        Self {
            target: OrderByTarget::Column(name.to_string()),
            direction: OrderDirection::Asc,
            nulls_order: NullsOrder::Low,
            index: None,
        }
    }

    #[must_use]
    pub const fn position(position: usize) -> Self {
        Self {
            target: OrderByTarget::Position(position),
            direction: OrderDirection::Asc,
            nulls_order: NullsOrder::Low,
            index: None,
        }
    }

    #[must_use]
    pub const fn desc(mut self) -> Self {
        self.direction = OrderDirection::Desc;
        self
    }

    #[must_use]
    pub const fn nulls_high(mut self) -> Self {
        self.nulls_order = NullsOrder::High;
        self
    }

    /// Same column and direction, ignoring the resolved index.
    #[must_use]
    pub fn same_item(&self, other: &Self) -> bool {
        let same_target = match (&self.target, &other.target) {
            (OrderByTarget::Column(a), OrderByTarget::Column(b)) => a.eq_ignore_ascii_case(b),
            (a, b) => a == b,
        };
        same_target && self.direction == other.direction && self.nulls_order == other.nulls_order
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatementContext {
    pub tables: Vec<String>,
    pub projections: ProjectionsContext,
    pub where_clause: Option<Condition>,
    pub group_by: Vec<OrderByItem>,
    pub order_by: Vec<OrderByItem>,
    pub having: Option<Condition>,
    pub pagination: Option<PaginationContext>,
    /// `FOR UPDATE` / `LOCK IN SHARE MODE`
    pub lock: bool,
    pub contains_subquery: bool,
}

impl SelectStatementContext {
    #[must_use]
    pub fn new(tables: &[&str], projections: ProjectionsContext) -> Self {
        Self {
            tables: tables.iter().map(|t| (*t).to_string()).collect(),
            projections,
            where_clause: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            having: None,
            pagination: None,
            lock: false,
            contains_subquery: false,
        }
    }

    #[must_use]
    pub fn with_where(mut self, condition: Condition) -> Self {
        self.where_clause = Some(condition);
        self
    }

    #[must_use]
    pub fn with_group_by(mut self, items: Vec<OrderByItem>) -> Self {
        self.group_by = items;
        self
    }

    #[must_use]
    pub fn with_order_by(mut self, items: Vec<OrderByItem>) -> Self {
        self.order_by = items;
        self
    }

    #[must_use]
    pub fn with_having(mut self, condition: Condition) -> Self {
        self.having = Some(condition);
        self
    }

    #[must_use]
    pub const fn with_pagination(mut self, pagination: PaginationContext) -> Self {
        self.pagination = Some(pagination);
        self
    }

    #[must_use]
    pub const fn for_update(mut self) -> Self {
        self.lock = true;
        self
    }

    #[must_use]
    pub const fn with_subquery(mut self) -> Self {
        self.contains_subquery = true;
        self
    }

    /// Grouping can be merged as a stream only when every shard returns rows
    /// already ordered by the group key.
    #[must_use]
    pub fn is_same_group_by_and_order_by(&self) -> bool {
        !self.group_by.is_empty()
            && self.group_by.len() == self.order_by.len()
            && self
                .group_by
                .iter()
                .zip(&self.order_by)
                .all(|(g, o)| g.same_item(o))
    }

    #[must_use]
    pub fn has_pagination(&self) -> bool {
        self.pagination.as_ref().is_some_and(PaginationContext::has_pagination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_indexes_with_avg_derivations() {
        let ctx = ProjectionsContext::new(
            vec![
                Projection::column("k"),
                Projection::aggregation(AggregationType::Avg, Some("v")),
                Projection::aggregation(AggregationType::Count, None),
            ],
            false,
        );
        assert_eq!(ctx.column_count(), 5);
        let aggregations: Vec<_> = ctx.aggregation_projections().collect();
        assert_eq!(aggregations.len(), 2);
        assert_eq!(aggregations[0].index, 1);
        assert_eq!(aggregations[0].derived[0].index, 3);
        assert_eq!(aggregations[0].derived[0].aggregation, AggregationType::Count);
        assert_eq!(aggregations[0].derived[1].index, 4);
        assert_eq!(aggregations[0].derived[1].label(), "AVG_DERIVED_SUM_0");
        assert_eq!(aggregations[1].index, 2);
        assert_eq!(aggregations[1].label(), "COUNT(*)");
    }

    #[test]
    fn test_labels() {
        assert_eq!(Projection::column("k").alias("key").label(), "key");
        assert_eq!(
            Projection::distinct_aggregation(AggregationType::Count, "v").label(),
            "COUNT(DISTINCT v)"
        );
    }

    #[test]
    fn test_same_group_by_and_order_by() {
        let ctx = SelectStatementContext::new(&["t"], ProjectionsContext::new(vec![Projection::column("k")], false))
            .with_group_by(vec![OrderByItem::column("k")]);
        assert!(!ctx.is_same_group_by_and_order_by());

        let ctx = ctx.with_order_by(vec![OrderByItem::column("K")]);
        assert!(ctx.is_same_group_by_and_order_by());

        let ctx = ctx.with_order_by(vec![OrderByItem::column("k").desc()]);
        assert!(!ctx.is_same_group_by_and_order_by());
    }
}

use crate::core::{Result, ShardingError, Value};

/// Right-hand side of a predicate or an inserted cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// Zero-based position of a `?` marker in the bound parameters.
    Parameter(usize),
    /// `NOW()` and friends; evaluated by the clock service, never by the shard.
    Now,
    /// Anything the router cannot evaluate (function calls, arithmetic, ...).
    Complex(String),
}

impl Expression {
    /// Resolves literals and parameter markers; `None` for expressions that
    /// need a clock or cannot be evaluated at route time.
    pub fn resolve(&self, parameters: &[Value]) -> Result<Option<Value>> {
        match self {
            Self::Literal(value) => Ok(Some(value.clone())),
            Self::Parameter(index) => parameters
                .get(*index)
                .cloned()
                .map(Some)
                .ok_or(ShardingError::ParameterOutOfRange(*index)),
            Self::Now | Self::Complex(_) => Ok(None),
        }
    }
}

/// Shorthand for a literal expression.
pub fn literal(value: impl Into<Value>) -> Expression {
    Expression::Literal(value.into())
}

/// WHERE / HAVING predicate tree.
///
/// Column operands are labels, optionally qualified as `table.column`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(String, Expression),
    NotEquals(String, Expression),
    GreaterThan(String, Expression),
    LessThan(String, Expression),
    GreaterThanOrEqual(String, Expression),
    LessThanOrEqual(String, Expression),
    Between(String, Expression, Expression), // col BETWEEN a AND b
    Like(String, String),                    // col LIKE pattern
    In(String, Vec<Expression>),             // col IN (list)
    IsNull(String),
    IsNotNull(String),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Splits the tree into OR-separated groups of AND-ed leaves.
    ///
    /// `a AND (b OR c)` becomes `[[a, b], [a, c]]`.
    #[must_use]
    pub fn and_groups(&self) -> Vec<Vec<&Self>> {
        match self {
            Self::Or(left, right) => {
                let mut groups = left.and_groups();
                groups.extend(right.and_groups());
                groups
            }
            Self::And(left, right) => {
                let lefts = left.and_groups();
                let rights = right.and_groups();
                let mut groups = Vec::with_capacity(lefts.len() * rights.len());
                for l in &lefts {
                    for r in &rights {
                        let mut group = l.clone();
                        group.extend(r.iter().copied());
                        groups.push(group);
                    }
                }
                groups
            }
            leaf => vec![vec![leaf]],
        }
    }
}

/// Splits `t.col` into `(Some("t"), "col")`.
#[must_use]
pub fn split_column(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((owner, column)) => (Some(owner), column),
        None => (None, name),
    }
}

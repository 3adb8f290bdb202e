use super::expression::{Condition, Expression};
use super::queries::SelectStatementContext;

/// INSERT statement context.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatementContext {
    pub table: String,
    /// Declared column list; empty means "all columns in schema order".
    pub columns: Vec<String>,
    /// One expression list per inserted row.
    pub values: Vec<Vec<Expression>>,
    pub insert_select: Option<Box<SelectStatementContext>>,
    /// `ON DUPLICATE KEY UPDATE col = expr, ...`
    pub on_duplicate_update: Vec<(String, Expression)>,
}

impl InsertStatementContext {
    #[must_use]
    pub fn new(table: &str, columns: &[&str], values: Vec<Vec<Expression>>) -> Self {
        Self {
            table: table.to_string(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            values,
            insert_select: None,
            on_duplicate_update: Vec::new(),
        }
    }

    #[must_use]
    pub fn insert_select(table: &str, columns: &[&str], select: SelectStatementContext) -> Self {
        Self {
            insert_select: Some(Box::new(select)),
            ..Self::new(table, columns, Vec::new())
        }
    }

    #[must_use]
    pub fn with_on_duplicate_update(mut self, assignments: Vec<(String, Expression)>) -> Self {
        self.on_duplicate_update = assignments;
        self
    }

    #[must_use]
    pub fn value_list_count(&self) -> usize {
        self.values.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatementContext {
    pub tables: Vec<String>,
    pub assignments: Vec<(String, Expression)>,
    pub where_clause: Option<Condition>,
    pub limit: Option<u64>,
}

impl UpdateStatementContext {
    #[must_use]
    pub fn new(table: &str, assignments: Vec<(String, Expression)>) -> Self {
        Self {
            tables: vec![table.to_string()],
            assignments,
            where_clause: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn with_where(mut self, condition: Condition) -> Self {
        self.where_clause = Some(condition);
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatementContext {
    pub tables: Vec<String>,
    pub where_clause: Option<Condition>,
    pub limit: Option<u64>,
}

impl DeleteStatementContext {
    #[must_use]
    pub fn new(tables: &[&str]) -> Self {
        Self {
            tables: tables.iter().map(|t| (*t).to_string()).collect(),
            where_clause: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn with_where(mut self, condition: Condition) -> Self {
        self.where_clause = Some(condition);
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

use super::ddl::{DalStatementContext, DdlStatementContext};
use super::dml::{DeleteStatementContext, InsertStatementContext, UpdateStatementContext};
use super::expression::Condition;
use super::queries::SelectStatementContext;
use crate::core::Value;

/// Parsed statement as the router and merger see it.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementContext {
    Select(SelectStatementContext),
    Insert(InsertStatementContext),
    Update(UpdateStatementContext),
    Delete(DeleteStatementContext),
    Ddl(DdlStatementContext),
    Dal(DalStatementContext),
}

impl StatementContext {
    /// Logic tables named by the statement, in declaration order.
    #[must_use]
    pub fn tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = match self {
            Self::Select(select) => select.tables.iter().map(String::as_str).collect(),
            Self::Insert(insert) => {
                let mut tables = vec![insert.table.as_str()];
                if let Some(select) = &insert.insert_select {
                    tables.extend(select.tables.iter().map(String::as_str));
                }
                tables
            }
            Self::Update(update) => update.tables.iter().map(String::as_str).collect(),
            Self::Delete(delete) => delete.tables.iter().map(String::as_str).collect(),
            Self::Ddl(ddl) => ddl.tables.iter().map(String::as_str).collect(),
            Self::Dal(_) => Vec::new(),
        };
        let mut seen = std::collections::HashSet::new();
        tables.retain(|t| seen.insert(t.to_lowercase()));
        tables
    }

    #[must_use]
    pub const fn is_dml(&self) -> bool {
        matches!(self, Self::Select(_) | Self::Insert(_) | Self::Update(_) | Self::Delete(_))
    }

    #[must_use]
    pub const fn is_select(&self) -> bool {
        matches!(self, Self::Select(_))
    }

    #[must_use]
    pub fn where_clause(&self) -> Option<&Condition> {
        match self {
            Self::Select(select) => select.where_clause.as_ref(),
            Self::Update(update) => update.where_clause.as_ref(),
            Self::Delete(delete) => delete.where_clause.as_ref(),
            Self::Insert(_) | Self::Ddl(_) | Self::Dal(_) => None,
        }
    }

    /// Row lock (`SELECT ... FOR UPDATE`).
    #[must_use]
    pub const fn contains_lock(&self) -> bool {
        matches!(self, Self::Select(select) if select.lock)
    }

    /// SELECT with a subquery, or INSERT ... SELECT.
    #[must_use]
    pub fn contains_subquery(&self) -> bool {
        match self {
            Self::Select(select) => select.contains_subquery,
            Self::Insert(insert) => insert.insert_select.is_some(),
            _ => false,
        }
    }
}

/// A logic statement with its SQL text and bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicSql {
    pub statement: StatementContext,
    pub sql: String,
    pub parameters: Vec<Value>,
}

impl LogicSql {
    #[must_use]
    pub fn new(statement: StatementContext, sql: &str, parameters: Vec<Value>) -> Self {
        Self { statement, sql: sql.to_string(), parameters }
    }
}

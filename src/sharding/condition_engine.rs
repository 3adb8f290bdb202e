/// Sharding condition engines
///
/// INSERT statements yield one condition per value row; SELECT, UPDATE and
/// DELETE yield one condition per OR branch of the WHERE clause.

use super::condition::{
    GeneratedKeyContext, ShardingCondition, ShardingConditionValue, ShardingConditions, ValueRange,
};
use super::datetime::DatetimeService;
use super::rule::ShardingRule;
use crate::core::{Result, Schema, ShardingError, Value};
use crate::statement::{
    split_column, Condition, Expression, InsertStatementContext, SelectStatementContext, StatementContext,
};

/// Builds the sharding conditions of any DML statement.
pub fn create_sharding_conditions(
    statement: &StatementContext,
    parameters: &[Value],
    rule: &ShardingRule,
    schema: &Schema,
    clock: &dyn DatetimeService,
) -> Result<ShardingConditions> {
    let conditions = match statement {
        StatementContext::Insert(insert) => InsertClauseShardingConditionEngine { rule, schema, clock }
            .create_sharding_conditions(insert, parameters)?,
        StatementContext::Select(_) | StatementContext::Update(_) | StatementContext::Delete(_) => {
            let tables = statement.tables();
            ShardingConditions::new(
                WhereClauseShardingConditionEngine { rule, clock }
                    .create_sharding_conditions(statement.where_clause(), &tables, parameters)?,
            )
        }
        StatementContext::Ddl(_) | StatementContext::Dal(_) => ShardingConditions::default(),
    };
    tracing::debug!(conditions = conditions.len(), "sharding conditions created");
    Ok(conditions)
}

fn sharding_value(column: &str, value: Option<Value>) -> Result<Option<Value>> {
    match value {
        Some(Value::Null) => Err(ShardingError::NullShardingValue(column.to_string())),
        Some(v) if !v.is_comparable() => Err(ShardingError::NotComparable(format!(
            "sharding value {v} of column '{column}'"
        ))),
        other => Ok(other),
    }
}

fn resolve(
    column: &str,
    expression: &Expression,
    parameters: &[Value],
    clock: &dyn DatetimeService,
) -> Result<Option<Value>> {
    let value = match expression {
        Expression::Now => Some(Value::Timestamp(clock.now())),
        other => other.resolve(parameters)?,
    };
    sharding_value(column, value)
}

pub struct InsertClauseShardingConditionEngine<'a> {
    pub rule: &'a ShardingRule,
    pub schema: &'a Schema,
    pub clock: &'a dyn DatetimeService,
}

impl InsertClauseShardingConditionEngine<'_> {
    pub fn create_sharding_conditions(
        &self,
        insert: &InsertStatementContext,
        parameters: &[Value],
    ) -> Result<ShardingConditions> {
        let columns = self.column_names(insert)?;
        let generated_key = self.generated_key_column(insert, &columns);

        let mut conditions = ShardingConditions::default();
        if let Some(select) = &insert.insert_select {
            conditions.conditions = self.where_engine().create_select_conditions(select, parameters)?;
        } else {
            for (row, expressions) in insert.values.iter().enumerate() {
                conditions.conditions.push(self.create_row_condition(
                    &insert.table,
                    &columns,
                    expressions,
                    row,
                    parameters,
                )?);
            }
        }

        if let Some(column) = generated_key {
            // INSERT ... SELECT has no value rows; one key per derived condition
            let count = if insert.insert_select.is_some() { conditions.len() } else { insert.value_list_count() };
            let values = self.rule.generate_keys(&insert.table, count)?;
            if self.rule.is_sharding_column(&column, &insert.table) {
                for (condition, value) in conditions.conditions.iter_mut().zip(&values) {
                    condition.values.push(ShardingConditionValue::List {
                        column: column.clone(),
                        table: insert.table.clone(),
                        values: vec![value.clone()],
                    });
                }
            }
            conditions.generated_keys = Some(GeneratedKeyContext { column, values });
        }
        Ok(conditions)
    }

    const fn where_engine(&self) -> WhereClauseShardingConditionEngine<'_> {
        WhereClauseShardingConditionEngine { rule: self.rule, clock: self.clock }
    }

    fn column_names(&self, insert: &InsertStatementContext) -> Result<Vec<String>> {
        if !insert.columns.is_empty() {
            return Ok(insert.columns.clone());
        }
        Ok(self.schema.get(&insert.table)?.column_names())
    }

    /// The key column, when the rule generates it and the statement omits it.
    fn generated_key_column(&self, insert: &InsertStatementContext, columns: &[String]) -> Option<String> {
        self.rule
            .find_generate_key_column(&insert.table)
            .filter(|key| !columns.iter().any(|c| c.eq_ignore_ascii_case(key)))
            .map(str::to_string)
    }

    fn create_row_condition(
        &self,
        table: &str,
        columns: &[String],
        expressions: &[Expression],
        row: usize,
        parameters: &[Value],
    ) -> Result<ShardingCondition> {
        if columns.len() != expressions.len() {
            return Err(ShardingError::InvalidExpression(format!(
                "row {row} of '{table}' has {} values for {} columns",
                expressions.len(),
                columns.len()
            )));
        }
        let mut condition = ShardingCondition::default();
        for (column, expression) in columns.iter().zip(expressions) {
            if !self.rule.is_sharding_column(column, table) {
                continue;
            }
            if let Some(value) = resolve(column, expression, parameters, self.clock)? {
                condition.values.push(ShardingConditionValue::List {
                    column: column.clone(),
                    table: table.to_string(),
                    values: vec![value],
                });
            }
        }
        Ok(condition)
    }
}

/// Values collected for one sharding column inside one AND group.
#[derive(Clone)]
enum Collected {
    List(Vec<Value>),
    Range(ValueRange),
}

impl Collected {
    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::List(a), Self::List(b)) => Self::List(a.into_iter().filter(|v| b.contains(v)).collect()),
            (Self::List(list), Self::Range(range)) | (Self::Range(range), Self::List(list)) => {
                Self::List(list.into_iter().filter(|v| range.contains(v)).collect())
            }
            (Self::Range(a), Self::Range(b)) => Self::Range(a.intersect(&b)),
        }
    }
}

pub struct WhereClauseShardingConditionEngine<'a> {
    pub rule: &'a ShardingRule,
    pub clock: &'a dyn DatetimeService,
}

impl WhereClauseShardingConditionEngine<'_> {
    pub fn create_select_conditions(
        &self,
        select: &SelectStatementContext,
        parameters: &[Value],
    ) -> Result<Vec<ShardingCondition>> {
        let tables: Vec<&str> = select.tables.iter().map(String::as_str).collect();
        self.create_sharding_conditions(select.where_clause.as_ref(), &tables, parameters)
    }

    /// An OR branch without any sharding value makes the whole statement
    /// unroutable by value, so no condition is returned at all.
    pub fn create_sharding_conditions(
        &self,
        where_clause: Option<&Condition>,
        tables: &[&str],
        parameters: &[Value],
    ) -> Result<Vec<ShardingCondition>> {
        let Some(where_clause) = where_clause else {
            return Ok(Vec::new());
        };
        let mut result = Vec::new();
        for group in where_clause.and_groups() {
            let mut collected: Vec<((String, String), Collected)> = Vec::new();
            for predicate in group {
                for (key, values) in self.predicate_values(predicate, tables, parameters)? {
                    match collected.iter().position(|(k, _)| *k == key) {
                        Some(pos) => {
                            let (k, existing) = collected.remove(pos);
                            collected.insert(pos, (k, existing.merge(values)));
                        }
                        None => collected.push((key, values)),
                    }
                }
            }
            if collected.is_empty() {
                return Ok(Vec::new());
            }
            result.push(ShardingCondition {
                values: collected
                    .into_iter()
                    .map(|((table, column), values)| match values {
                        Collected::List(values) => ShardingConditionValue::List { column, table, values },
                        Collected::Range(range) => ShardingConditionValue::Range { column, table, range },
                    })
                    .collect(),
            });
        }
        Ok(result)
    }

    /// Sharding tables whose strategy uses `column`.
    fn owning_tables(&self, column: &str, tables: &[&str]) -> Vec<(String, String)> {
        let (owner, name) = split_column(column);
        tables
            .iter()
            .filter(|t| owner.is_none_or(|o| o.eq_ignore_ascii_case(t)))
            .filter(|t| self.rule.is_sharding_column(name, t))
            .map(|t| ((*t).to_string(), name.to_string()))
            .collect()
    }

    fn predicate_values(
        &self,
        predicate: &Condition,
        tables: &[&str],
        parameters: &[Value],
    ) -> Result<Vec<((String, String), Collected)>> {
        let column = match predicate {
            Condition::Equals(column, _)
            | Condition::In(column, _)
            | Condition::Between(column, ..)
            | Condition::GreaterThan(column, _)
            | Condition::GreaterThanOrEqual(column, _)
            | Condition::LessThan(column, _)
            | Condition::LessThanOrEqual(column, _) => column,
            _ => return Ok(Vec::new()),
        };
        // only sharding column values are resolved and validated
        let owners = self.owning_tables(column, tables);
        let Some((last, rest)) = owners.split_last() else {
            return Ok(Vec::new());
        };
        let collected = match predicate {
            Condition::Equals(column, expr) => match resolve(column, expr, parameters, self.clock)? {
                Some(v) => Collected::List(vec![v]),
                None => return Ok(Vec::new()),
            },
            Condition::In(column, exprs) => {
                let mut values = Vec::with_capacity(exprs.len());
                for expr in exprs {
                    match resolve(column, expr, parameters, self.clock)? {
                        Some(v) if !values.contains(&v) => values.push(v),
                        Some(_) => {}
                        None => return Ok(Vec::new()),
                    }
                }
                Collected::List(values)
            }
            Condition::Between(column, low, high) => {
                match (
                    resolve(column, low, parameters, self.clock)?,
                    resolve(column, high, parameters, self.clock)?,
                ) {
                    (Some(low), Some(high)) => Collected::Range(ValueRange::closed(low, high)),
                    _ => return Ok(Vec::new()),
                }
            }
            Condition::GreaterThan(column, expr) | Condition::GreaterThanOrEqual(column, expr) => {
                let inclusive = matches!(predicate, Condition::GreaterThanOrEqual(..));
                match resolve(column, expr, parameters, self.clock)? {
                    Some(v) => Collected::Range(ValueRange::at_least(v, inclusive)),
                    None => return Ok(Vec::new()),
                }
            }
            Condition::LessThan(column, expr) | Condition::LessThanOrEqual(column, expr) => {
                let inclusive = matches!(predicate, Condition::LessThanOrEqual(..));
                match resolve(column, expr, parameters, self.clock)? {
                    Some(v) => Collected::Range(ValueRange::at_most(v, inclusive)),
                    None => return Ok(Vec::new()),
                }
            }
            _ => return Ok(Vec::new()),
        };
        let mut result: Vec<_> = rest.iter().map(|key| (key.clone(), collected.clone())).collect();
        result.push((last.clone(), collected));
        Ok(result)
    }
}

use super::context::RouteContext;
use crate::core::{Result, Schema, ShardingError, Value};
use crate::sharding::ShardingRule;
use crate::statement::{
    split_column, Condition, DdlKind, DdlStatementContext, DeleteStatementContext, InsertStatementContext,
    StatementContext, UpdateStatementContext,
};

/// Statement checks run before and after sharding routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardingStatementValidator {
    Insert,
    Update,
    Delete,
    CreateTable,
    DropTable,
    DropIndex,
}

impl ShardingStatementValidator {
    #[must_use]
    pub const fn for_statement(statement: &StatementContext) -> Option<Self> {
        match statement {
            StatementContext::Insert(_) => Some(Self::Insert),
            StatementContext::Update(_) => Some(Self::Update),
            StatementContext::Delete(_) => Some(Self::Delete),
            StatementContext::Ddl(ddl) => match ddl.kind {
                DdlKind::CreateTable => Some(Self::CreateTable),
                DdlKind::DropTable => Some(Self::DropTable),
                DdlKind::DropIndex => Some(Self::DropIndex),
                _ => None,
            },
            StatementContext::Select(_) | StatementContext::Dal(_) => None,
        }
    }

    pub fn pre_validate(
        self,
        rule: &ShardingRule,
        statement: &StatementContext,
        parameters: &[Value],
        schema: &Schema,
    ) -> Result<()> {
        match (self, statement) {
            (Self::Insert, StatementContext::Insert(insert)) => validate_insert(rule, insert),
            (Self::Update, StatementContext::Update(update)) => validate_update(rule, update, parameters),
            (Self::Delete, StatementContext::Delete(delete)) => validate_delete(delete),
            (Self::CreateTable, StatementContext::Ddl(ddl)) => {
                match ddl.tables.iter().find(|t| schema.contains(t)) {
                    Some(table) => Err(ShardingError::TableExists(table.clone())),
                    None => Ok(()),
                }
            }
            (Self::DropTable | Self::DropIndex, StatementContext::Ddl(ddl)) => validate_tables_exist(ddl, schema),
            _ => Ok(()),
        }
    }

    pub fn post_validate(self, statement: &StatementContext, route_context: &RouteContext) -> Result<()> {
        let multi_node = route_context.route_units().len() > 1;
        match (self, statement) {
            (Self::Update, StatementContext::Update(update)) if multi_node && update.limit.is_some() => Err(
                ShardingError::Unsupported("UPDATE ... LIMIT can not be routed to multiple data nodes".to_string()),
            ),
            (Self::Delete, StatementContext::Delete(delete)) if multi_node && delete.limit.is_some() => Err(
                ShardingError::Unsupported("DELETE ... LIMIT can not be routed to multiple data nodes".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

fn validate_insert(rule: &ShardingRule, insert: &InsertStatementContext) -> Result<()> {
    if let Some((column, _)) = insert
        .on_duplicate_update
        .iter()
        .find(|(column, _)| rule.is_sharding_column(split_column(column).1, &insert.table))
    {
        return Err(ShardingError::Unsupported(format!(
            "ON DUPLICATE KEY UPDATE can not change sharding column '{column}'"
        )));
    }
    if insert.insert_select.is_some() {
        if let Some(key) = rule.find_generate_key_column(&insert.table) {
            if !insert.columns.iter().any(|c| c.eq_ignore_ascii_case(key)) {
                return Err(ShardingError::Unsupported(format!(
                    "INSERT INTO ... SELECT can not generate key column '{key}'"
                )));
            }
        }
    }
    Ok(())
}

/// Value bound to `column` by a top-level equality in the WHERE clause.
fn where_equality_value(condition: &Condition, column: &str, parameters: &[Value]) -> Result<Option<Value>> {
    match condition {
        Condition::Equals(name, expr) if split_column(name).1.eq_ignore_ascii_case(column) => {
            expr.resolve(parameters)
        }
        Condition::And(left, right) => match where_equality_value(left, column, parameters)? {
            Some(value) => Ok(Some(value)),
            None => where_equality_value(right, column, parameters),
        },
        _ => Ok(None),
    }
}

/// A sharding column may only be "updated" to the value the WHERE clause pins it to.
fn validate_update(rule: &ShardingRule, update: &UpdateStatementContext, parameters: &[Value]) -> Result<()> {
    for (column, expr) in &update.assignments {
        let name = split_column(column).1;
        if !update.tables.iter().any(|t| rule.is_sharding_column(name, t)) {
            continue;
        }
        let assigned = expr.resolve(parameters)?;
        let pinned = match &update.where_clause {
            Some(condition) => where_equality_value(condition, name, parameters)?,
            None => None,
        };
        match (assigned, pinned) {
            (Some(a), Some(p)) if a.compare(&p) == Some(std::cmp::Ordering::Equal) => {}
            _ => {
                return Err(ShardingError::Unsupported(format!("can not update sharding column '{name}'")));
            }
        }
    }
    Ok(())
}

fn validate_delete(delete: &DeleteStatementContext) -> Result<()> {
    if delete.tables.len() > 1 {
        return Err(ShardingError::Unsupported("multiple-table DELETE".to_string()));
    }
    Ok(())
}

fn validate_tables_exist(ddl: &DdlStatementContext, schema: &Schema) -> Result<()> {
    for table in &ddl.tables {
        schema.get(table)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, Table};
    use crate::route::context::{RouteMapper, RouteUnit};
    use crate::sharding::{create_key_generator, create_sharding_algorithm, ShardingStrategy, TableRule};
    use crate::statement::{literal, Expression, Projection, ProjectionsContext, SelectStatementContext};
    use std::collections::HashMap;

    fn rule() -> ShardingRule {
        let props = HashMap::from([("sharding-count".to_string(), "2".to_string())]);
        ShardingRule::new(&["ds_0", "ds_1"]).with_table_rule(
            TableRule::new("t_order", "ds_${0..1}.t_order")
                .unwrap()
                .with_database_strategy(ShardingStrategy::new(
                    "user_id",
                    "mod",
                    create_sharding_algorithm("MOD", &props).unwrap(),
                ))
                .with_key_generate("order_id", "uuid", create_key_generator("UUID", &HashMap::new(), None).unwrap()),
        )
    }

    fn check(statement: &StatementContext, parameters: &[Value], schema: &Schema) -> Result<()> {
        ShardingStatementValidator::for_statement(statement)
            .map_or(Ok(()), |v| v.pre_validate(&rule(), statement, parameters, schema))
    }

    #[test]
    fn test_on_duplicate_update_of_sharding_column() {
        let insert = InsertStatementContext::new("t_order", &["user_id"], vec![vec![literal(1)]])
            .with_on_duplicate_update(vec![("user_id".into(), literal(2))]);
        assert!(matches!(
            check(&StatementContext::Insert(insert), &[], &Schema::new()),
            Err(ShardingError::Unsupported(_))
        ));
    }

    #[test]
    fn test_insert_select_without_generated_key() {
        let select =
            SelectStatementContext::new(&["t_order"], ProjectionsContext::new(vec![Projection::column("user_id")], false));
        let insert = InsertStatementContext::insert_select("t_order", &["user_id"], select);
        assert!(check(&StatementContext::Insert(insert), &[], &Schema::new()).is_err());
    }

    #[test]
    fn test_update_sharding_column() {
        let update = UpdateStatementContext::new("t_order", vec![("user_id".into(), Expression::Parameter(0))])
            .with_where(Condition::Equals("user_id".into(), literal(1)));
        let statement = StatementContext::Update(update);
        assert!(check(&statement, &[Value::Integer(1)], &Schema::new()).is_ok());
        assert!(check(&statement, &[Value::Integer(2)], &Schema::new()).is_err());

        let update = UpdateStatementContext::new("t_order", vec![("status".into(), literal("x"))]);
        assert!(check(&StatementContext::Update(update), &[], &Schema::new()).is_ok());
    }

    #[test]
    fn test_delete_checks() {
        let delete = DeleteStatementContext::new(&["t_order", "t_item"]);
        assert!(check(&StatementContext::Delete(delete), &[], &Schema::new()).is_err());

        let statement = StatementContext::Delete(DeleteStatementContext::new(&["t_order"]).with_limit(1));
        let mut ctx = RouteContext::new();
        for ds in ["ds_0", "ds_1"] {
            ctx.add_unit(RouteUnit::new(RouteMapper::new(ds, ds), Vec::new()));
        }
        let validator = ShardingStatementValidator::for_statement(&statement).unwrap();
        assert!(validator.post_validate(&statement, &ctx).is_err());
    }

    #[test]
    fn test_ddl_checks() {
        let schema = Schema::new().with_table(Table::new("t_order", vec![Column::new("id", DataType::Integer)]));
        let create = StatementContext::Ddl(DdlStatementContext::new(DdlKind::CreateTable, &["t_order"]));
        assert!(matches!(check(&create, &[], &schema), Err(ShardingError::TableExists(_))));
        let drop = StatementContext::Ddl(DdlStatementContext::new(DdlKind::DropTable, &["t_missing"]));
        assert!(matches!(check(&drop, &[], &schema), Err(ShardingError::TableNotFound(_))));
    }
}

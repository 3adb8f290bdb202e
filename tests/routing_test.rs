// Routing through the public router chain
use shardgate::core::{Column, DataType, Schema, ShardingError, Table, Value};
use shardgate::route::{PartialSqlRouteExecutor, RouteContext, ShardingSqlRouter, SqlRouter};
use shardgate::sharding::{
    create_key_generator, create_sharding_algorithm, create_sharding_conditions, FixedDatetimeService,
    ShardingConditionValue, ShardingConditions, ShardingRule, ShardingStrategy, SystemDatetimeService, TableRule,
};
use shardgate::statement::{
    literal, Condition, Expression, InsertStatementContext, Projection, ProjectionsContext, SelectStatementContext,
    StatementContext,
};
use shardgate::{DatabaseType, LogicSql, MetaData, SessionContext};
use std::collections::HashMap;
use std::sync::Arc;

fn mod_strategy(column: &str) -> ShardingStrategy {
    let props = HashMap::from([("sharding-count".to_string(), "2".to_string())]);
    ShardingStrategy::new(column, "mod", create_sharding_algorithm("MOD", &props).unwrap())
}

fn rule() -> ShardingRule {
    ShardingRule::new(&["ds_0", "ds_1"])
        .with_table_rule(
            TableRule::new("t_order", "ds_${0..1}.t_order_${0..1}")
                .unwrap()
                .with_database_strategy(mod_strategy("user_id"))
                .with_table_strategy(mod_strategy("order_id")),
        )
        .with_broadcast_table("t_config")
}

fn schema() -> Schema {
    Schema::new().with_table(Table::new(
        "t_order",
        vec![
            Column::new("order_id", DataType::Integer),
            Column::new("user_id", DataType::Integer),
            Column::new("status", DataType::Text),
        ],
    ))
}

fn route(logic_sql: &LogicSql) -> shardgate::Result<RouteContext> {
    let router: Arc<dyn SqlRouter> = Arc::new(ShardingSqlRouter::new(Arc::new(rule()), Arc::new(SystemDatetimeService)));
    let metadata = MetaData::new(schema(), &["ds_0", "ds_1"], DatabaseType::MySQL);
    PartialSqlRouteExecutor::new(vec![router]).route(logic_sql, &metadata, &mut SessionContext::default())
}

fn select(table: &str, where_clause: Option<Condition>, parameters: Vec<Value>) -> LogicSql {
    let mut select =
        SelectStatementContext::new(&[table], ProjectionsContext::new(vec![Projection::column("status")], false));
    if let Some(condition) = where_clause {
        select = select.with_where(condition);
    }
    LogicSql::new(StatementContext::Select(select), &format!("SELECT status FROM {table}"), parameters)
}

fn targets(context: &RouteContext) -> Vec<String> {
    context
        .route_units()
        .iter()
        .map(|u| format!("{}.{}", u.data_source_mapper.actual_name, u.table_mappers[0].actual_name))
        .collect()
}

#[test]
fn test_insert_yields_one_condition_per_row() {
    let insert = InsertStatementContext::new(
        "t_order",
        &["order_id", "user_id", "status"],
        vec![
            vec![literal(1), literal(1), literal("a")],
            vec![literal(2), Expression::Parameter(0), literal("b")],
            vec![literal(3), literal(1), literal("c")],
        ],
    );
    let conditions = create_sharding_conditions(
        &StatementContext::Insert(insert),
        &[Value::Integer(2)],
        &rule(),
        &schema(),
        &FixedDatetimeService(chrono::NaiveDateTime::default()),
    )
    .unwrap();
    assert_eq!(conditions.len(), 3);
    for condition in &conditions.conditions {
        assert_eq!(condition.values.len(), 2);
    }
}

#[test]
fn test_insert_routes_each_row() {
    let insert = InsertStatementContext::new(
        "t_order",
        &["order_id", "user_id"],
        vec![vec![literal(1), literal(1)], vec![literal(2), literal(2)], vec![literal(3), literal(1)]],
    );
    let logic_sql =
        LogicSql::new(StatementContext::Insert(insert), "INSERT INTO t_order (order_id, user_id) VALUES ...", vec![]);
    let context = route(&logic_sql).unwrap();
    assert_eq!(targets(&context), vec!["ds_1.t_order_1", "ds_0.t_order_0"]);
}

#[test]
fn test_null_sharding_value_is_rejected() {
    let insert = InsertStatementContext::new(
        "t_order",
        &["order_id", "user_id"],
        vec![vec![literal(1), Expression::Literal(Value::Null)]],
    );
    let logic_sql = LogicSql::new(StatementContext::Insert(insert), "INSERT INTO t_order VALUES (1, NULL)", vec![]);
    assert!(matches!(route(&logic_sql), Err(ShardingError::NullShardingValue(column)) if column == "user_id"));
}

#[test]
fn test_equality_routes_to_single_unit() {
    let condition = Condition::Equals("user_id".into(), Expression::Parameter(0))
        .and(Condition::Equals("order_id".into(), literal(4)));
    let context = route(&select("t_order", Some(condition), vec![Value::Integer(3)])).unwrap();
    assert_eq!(targets(&context), vec!["ds_1.t_order_0"]);
}

#[test]
fn test_missing_predicate_scatters_to_every_node() {
    let context = route(&select("t_order", None, vec![])).unwrap();
    assert_eq!(targets(&context), vec!["ds_0.t_order_0", "ds_0.t_order_1", "ds_1.t_order_0", "ds_1.t_order_1"]);
}

#[test]
fn test_broadcast_table_ignores_values() {
    let condition = Condition::Equals("id".into(), literal(1));
    let context = route(&select("t_config", Some(condition), vec![])).unwrap();
    assert_eq!(context.actual_data_source_names(), vec!["ds_0", "ds_1"]);
}

#[test]
fn test_single_data_source_fallback() {
    let metadata = MetaData::new(Schema::new(), &["ds_only"], DatabaseType::MySQL);
    let logic_sql = select("t_anything", None, vec![]);
    let context =
        PartialSqlRouteExecutor::new(Vec::new()).route(&logic_sql, &metadata, &mut SessionContext::default()).unwrap();
    assert_eq!(context.actual_data_source_names(), vec!["ds_only"]);
}

fn insert_select(columns: &[&str], contains_subquery: bool) -> InsertStatementContext {
    let condition = Condition::Equals("user_id".into(), literal(1)).or(Condition::Equals("user_id".into(), literal(2)));
    let mut select = SelectStatementContext::new(
        &["t_order"],
        ProjectionsContext::new(columns.iter().map(|c| Projection::column(c)).collect(), false),
    )
    .with_where(condition);
    if contains_subquery {
        select = select.with_subquery();
    }
    InsertStatementContext::insert_select("t_order", columns, select)
}

fn insert_select_conditions(rule: &ShardingRule, insert: InsertStatementContext) -> ShardingConditions {
    create_sharding_conditions(
        &StatementContext::Insert(insert),
        &[],
        rule,
        &schema(),
        &FixedDatetimeService(chrono::NaiveDateTime::default()),
    )
    .unwrap()
}

fn condition_columns(conditions: &ShardingConditions) -> Vec<Vec<String>> {
    conditions
        .conditions
        .iter()
        .map(|c| c.values.iter().map(|v| v.column().to_string()).collect())
        .collect()
}

#[test]
fn test_insert_select_takes_conditions_from_select() {
    let conditions = insert_select_conditions(&rule(), insert_select(&["order_id", "user_id"], false));
    assert!(conditions.generated_keys.is_none());
    assert_eq!(condition_columns(&conditions), vec![vec!["user_id"], vec!["user_id"]]);
    assert_eq!(
        conditions.conditions[1].values[0],
        ShardingConditionValue::List { column: "user_id".into(), table: "t_order".into(), values: vec![Value::Integer(2)] }
    );
}

#[test]
fn test_insert_select_generates_one_key_per_condition() {
    let rule = ShardingRule::new(&["ds_0", "ds_1"]).with_table_rule(
        TableRule::new("t_order", "ds_${0..1}.t_order_${0..1}")
            .unwrap()
            .with_database_strategy(mod_strategy("user_id"))
            .with_table_strategy(mod_strategy("order_id"))
            .with_key_generate("order_id", "snowflake", create_key_generator("SNOWFLAKE", &HashMap::new(), None).unwrap()),
    );
    let conditions = insert_select_conditions(&rule, insert_select(&["user_id", "status"], false));
    let keys = conditions.generated_keys.as_ref().unwrap();
    assert_eq!(keys.column, "order_id");
    assert_eq!(keys.values.len(), 2);
    assert_eq!(condition_columns(&conditions), vec![vec!["user_id", "order_id"], vec!["user_id", "order_id"]]);
}

#[test]
fn test_insert_select_with_subquery_keeps_last_condition() {
    let logic_sql = LogicSql::new(
        StatementContext::Insert(insert_select(&["order_id", "user_id"], true)),
        "INSERT INTO t_order (order_id, user_id) SELECT order_id, user_id FROM t_order WHERE ...",
        vec![],
    );
    let context = route(&logic_sql).unwrap();
    assert_eq!(context.actual_data_source_names(), vec!["ds_0"]);

    let logic_sql = LogicSql::new(
        StatementContext::Insert(insert_select(&["order_id", "user_id"], false)),
        "INSERT INTO t_order (order_id, user_id) SELECT order_id, user_id FROM t_order WHERE ...",
        vec![],
    );
    assert_eq!(route(&logic_sql).unwrap().actual_data_source_names().len(), 2);
}

#[test]
fn test_null_on_plain_column_still_routes() {
    let condition = Condition::Equals("user_id".into(), literal(1))
        .and(Condition::Equals("status".into(), Expression::Parameter(0)));
    let context = route(&select("t_order", Some(condition), vec![Value::Null])).unwrap();
    assert_eq!(targets(&context), vec!["ds_1.t_order_0", "ds_1.t_order_1"]);
}

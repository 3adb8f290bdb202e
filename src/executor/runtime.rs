/// Sharding runtime
///
/// route -> rewrite -> prepare -> execute -> merge, for one logic statement.

use super::engine::{ExecutorEngine, ShardConnector};
use super::kernel::{ExecutionContext, KernelProcessor};
use super::prepare::{ExecutionPrepareDecorator, ExecutionPrepareEngine};
use crate::config::Props;
use crate::core::Result;
use crate::merge::{MergeEngine, MergedResultSet};
use crate::metadata::MetaData;
use crate::route::{PartialSqlRouteExecutor, SqlRouter};
use crate::session::SessionContext;
use crate::sharding::GeneratedKeyContext;
use crate::statement::LogicSql;
use serde::Serialize;
use std::sync::Arc;

/// Outcome of an INSERT, UPDATE or DELETE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateResult {
    pub update_count: u64,
    #[serde(skip)]
    pub generated_keys: Option<GeneratedKeyContext>,
}

pub struct ShardingRuntime {
    metadata: Arc<MetaData>,
    router: PartialSqlRouteExecutor,
    kernel: KernelProcessor,
    prepare_engine: ExecutionPrepareEngine,
    executor: ExecutorEngine,
    merge_engine: MergeEngine,
}

impl ShardingRuntime {
    pub fn new(
        metadata: MetaData,
        routers: Vec<Arc<dyn SqlRouter>>,
        connector: Arc<dyn ShardConnector>,
        props: &Props,
    ) -> Result<Self> {
        let merge_engine = MergeEngine::new(props.database_type, Arc::new(metadata.schema.clone()));
        Ok(Self {
            metadata: Arc::new(metadata),
            router: PartialSqlRouteExecutor::new(routers),
            kernel: KernelProcessor::new(props.database_type, props.sql_show),
            prepare_engine: ExecutionPrepareEngine::new(props.max_connections_size_per_query)?,
            executor: ExecutorEngine::new(connector),
            merge_engine,
        })
    }

    #[must_use]
    pub fn with_prepare_decorator(mut self, decorator: Arc<dyn ExecutionPrepareDecorator>) -> Self {
        self.prepare_engine = self.prepare_engine.with_decorator(decorator);
        self
    }

    #[must_use]
    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    /// Routes and rewrites without executing anything.
    pub fn generate_execution_context(
        &self,
        logic_sql: &LogicSql,
        session: &mut SessionContext,
    ) -> Result<ExecutionContext> {
        let route_context = self.router.route(logic_sql, &self.metadata, session)?;
        tracing::debug!(
            units = route_context.route_units().len(),
            federated = route_context.federated,
            "statement routed"
        );
        self.kernel.generate_execution_context(logic_sql, route_context)
    }

    pub async fn execute_query(&self, logic_sql: &LogicSql, session: &mut SessionContext) -> Result<MergedResultSet> {
        let context = self.generate_execution_context(logic_sql, session)?;
        let groups = self.prepare_engine.prepare(&context.route_context, context.execution_units)?;
        let results = self.executor.execute_query(groups).await?;
        self.merge_engine.merge(results, &logic_sql.statement, &logic_sql.parameters)
    }

    pub async fn execute_update(&self, logic_sql: &LogicSql, session: &mut SessionContext) -> Result<UpdateResult> {
        let context = self.generate_execution_context(logic_sql, session)?;
        let groups = self.prepare_engine.prepare(&context.route_context, context.execution_units)?;
        let counts = self.executor.execute_update(groups).await?;
        Ok(UpdateResult { update_count: counts.iter().sum(), generated_keys: context.generated_keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, Schema, Table, Value};
    use crate::executor::MemoryShardConnector;
    use crate::metadata::DatabaseType;
    use crate::sharding::{
        create_key_generator, create_sharding_algorithm, ShardingRule, ShardingStrategy, SystemDatetimeService,
        TableRule,
    };
    use crate::route::ShardingSqlRouter;
    use crate::statement::{
        literal, Condition, Expression, InsertStatementContext, OrderByItem, PaginationContext,
        PaginationSegment, Projection, ProjectionsContext, SelectStatementContext, StatementContext,
    };
    use std::collections::HashMap;

    fn sharding_rule() -> ShardingRule {
        let props: HashMap<String, String> = [("sharding-count".to_string(), "2".to_string())].into();
        let algorithm = create_sharding_algorithm("MOD", &props).unwrap();
        let generator = create_key_generator("SNOWFLAKE", &HashMap::new(), None).unwrap();
        ShardingRule::new(&["ds_0", "ds_1"]).with_table_rule(
            TableRule::new("t_order", "ds_${0..1}.t_order")
                .unwrap()
                .with_database_strategy(ShardingStrategy::new("user_id", "mod", algorithm))
                .with_key_generate("order_id", "snowflake", generator),
        )
    }

    fn runtime(connector: Arc<MemoryShardConnector>, max_connections: usize) -> ShardingRuntime {
        let schema = Schema::new().with_table(Table::new(
            "t_order",
            vec![
                Column::new("order_id", DataType::Integer),
                Column::new("user_id", DataType::Integer),
            ],
        ));
        let metadata = MetaData::new(schema, &["ds_0", "ds_1"], DatabaseType::MySQL);
        let router = ShardingSqlRouter::new(Arc::new(sharding_rule()), Arc::new(SystemDatetimeService));
        let props = Props { max_connections_size_per_query: max_connections, ..Props::default() };
        ShardingRuntime::new(metadata, vec![Arc::new(router)], connector, &props).unwrap()
    }

    fn connector() -> MemoryShardConnector {
        MemoryShardConnector::new()
            .with_table(
                "ds_0",
                "t_order",
                &["user_id"],
                vec![vec![Value::Integer(0)], vec![Value::Integer(2)], vec![Value::Integer(4)]],
            )
            .with_table("ds_1", "t_order", &["user_id"], vec![vec![Value::Integer(1)], vec![Value::Integer(5)]])
    }

    #[tokio::test]
    async fn test_scatter_query_is_merged_in_order() {
        let connector = Arc::new(connector());
        let runtime = runtime(connector.clone(), 1);
        let sql = "SELECT user_id FROM t_order ORDER BY user_id LIMIT 1, 3";
        let at = sql.find("1, 3").unwrap();
        let pagination = PaginationContext::new(
            Some(PaginationSegment::literal(1).at(at, at + 1)),
            Some(PaginationSegment::literal(3).at(at + 3, at + 4)),
        );
        let select = SelectStatementContext::new(
            &["t_order"],
            ProjectionsContext::new(vec![Projection::column("user_id")], false),
        )
        .with_order_by(vec![OrderByItem::column("user_id")])
        .with_pagination(pagination);
        let logic_sql = LogicSql::new(StatementContext::Select(select), sql, Vec::new());
        let merged = runtime.execute_query(&logic_sql, &mut SessionContext::default()).await.unwrap();
        let ids: Vec<i64> = merged.into_rows().unwrap().iter().map(|r| r.values[0].as_int().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 4]);
        let executed = connector.executed();
        assert_eq!(executed.len(), 2);
        for unit in &executed {
            assert_eq!(unit.sql_unit.sql, "SELECT user_id FROM t_order ORDER BY user_id LIMIT 0, 4");
        }
    }

    #[tokio::test]
    async fn test_point_query_hits_one_data_source() {
        let connector = Arc::new(connector());
        let runtime = runtime(connector.clone(), 4);
        let select = SelectStatementContext::new(
            &["t_order"],
            ProjectionsContext::new(vec![Projection::column("user_id")], false),
        )
        .with_where(Condition::Equals("user_id".into(), Expression::Parameter(0)));
        let logic_sql = LogicSql::new(
            StatementContext::Select(select),
            "SELECT user_id FROM t_order WHERE user_id = ?",
            vec![Value::Integer(7)],
        );
        runtime.execute_query(&logic_sql, &mut SessionContext::default()).await.unwrap();
        let executed = connector.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].data_source_name, "ds_1");
        assert_eq!(executed[0].sql_unit.parameters, vec![Value::Integer(7)]);
    }

    #[tokio::test]
    async fn test_update_counts_are_summed_with_generated_keys() {
        let runtime = runtime(Arc::new(connector().with_update_count("ds_1", 2)), 1);
        let insert = InsertStatementContext::new(
            "t_order",
            &["user_id"],
            vec![vec![literal(1)], vec![literal(2)], vec![literal(3)]],
        );
        let logic_sql = LogicSql::new(
            StatementContext::Insert(insert),
            "INSERT INTO t_order (user_id) VALUES (1), (2), (3)",
            Vec::new(),
        );
        let result = runtime.execute_update(&logic_sql, &mut SessionContext::default()).await.unwrap();
        assert_eq!(result.update_count, 3);
        let keys = result.generated_keys.unwrap();
        assert_eq!(keys.column, "order_id");
        assert_eq!(keys.values.len(), 3);
    }
}

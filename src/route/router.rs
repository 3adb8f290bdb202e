/// Router chain
///
/// Routers run in ascending `order()`. The first one that produces units
/// creates the route context; the rest decorate it.

use super::context::{RouteContext, RouteMapper, RouteUnit};
use super::engine::ShardingRouteEngine;
use super::validator::ShardingStatementValidator;
use crate::core::Result;
use crate::metadata::MetaData;
use crate::session::SessionContext;
use crate::sharding::{create_sharding_conditions, DatetimeService, ShardingConditions, ShardingRule};
use crate::statement::{LogicSql, StatementContext};
use std::sync::Arc;

pub trait SqlRouter: Send + Sync {
    fn order(&self) -> i32;

    fn create_route_context(
        &self,
        logic_sql: &LogicSql,
        metadata: &MetaData,
        session: &mut SessionContext,
    ) -> Result<RouteContext>;

    fn decorate_route_context(
        &self,
        route_context: &mut RouteContext,
        logic_sql: &LogicSql,
        metadata: &MetaData,
        session: &mut SessionContext,
    ) -> Result<()>;
}

pub const SHARDING_ORDER: i32 = 0;

pub struct ShardingSqlRouter {
    rule: Arc<ShardingRule>,
    clock: Arc<dyn DatetimeService>,
}

impl ShardingSqlRouter {
    #[must_use]
    pub fn new(rule: Arc<ShardingRule>, clock: Arc<dyn DatetimeService>) -> Self {
        Self { rule, clock }
    }

    /// Conditions of the route; also used by the kernel to read generated keys.
    pub fn create_sharding_conditions(&self, logic_sql: &LogicSql, metadata: &MetaData) -> Result<ShardingConditions> {
        let statement = &logic_sql.statement;
        if !statement.is_dml() {
            return Ok(ShardingConditions::default());
        }
        let mut conditions = create_sharding_conditions(
            statement,
            &logic_sql.parameters,
            &self.rule,
            &metadata.schema,
            self.clock.as_ref(),
        )?;
        if self.need_merge_sharding_values(statement) {
            tracing::debug!(conditions = conditions.len(), "subquery over sharded tables, keeping last condition");
            conditions.merge();
        }
        Ok(conditions)
    }

    // TODO: audit which subquery shapes are safe to collapse to the last condition;
    // correlated subqueries over a different sharding column are not.
    fn need_merge_sharding_values(&self, statement: &StatementContext) -> bool {
        let contains_subquery = match statement {
            StatementContext::Select(select) => select.contains_subquery,
            StatementContext::Insert(insert) => insert.insert_select.as_ref().is_some_and(|s| s.contains_subquery),
            _ => false,
        };
        contains_subquery && !self.rule.sharding_logic_table_names(&statement.tables()).is_empty()
    }

    /// Routes with conditions of a statement that already passed pre-validation.
    pub fn route_with_conditions(
        &self,
        logic_sql: &LogicSql,
        conditions: &ShardingConditions,
    ) -> Result<RouteContext> {
        let statement = &logic_sql.statement;
        let mut result = RouteContext::new();
        result.generated_keys.clone_from(&conditions.generated_keys);
        ShardingRouteEngine::new(&self.rule, statement, conditions).route(
            &mut result,
            &self.rule,
            conditions,
            statement.is_select(),
        )?;
        if let Some(validator) = ShardingStatementValidator::for_statement(statement) {
            validator.post_validate(statement, &result)?;
        }
        Ok(result)
    }
}

impl SqlRouter for ShardingSqlRouter {
    fn order(&self) -> i32 {
        SHARDING_ORDER
    }

    fn create_route_context(
        &self,
        logic_sql: &LogicSql,
        metadata: &MetaData,
        _session: &mut SessionContext,
    ) -> Result<RouteContext> {
        let statement = &logic_sql.statement;
        if let Some(validator) = ShardingStatementValidator::for_statement(statement) {
            validator.pre_validate(&self.rule, statement, &logic_sql.parameters, &metadata.schema)?;
        }
        let conditions = self.create_sharding_conditions(logic_sql, metadata)?;
        self.route_with_conditions(logic_sql, &conditions)
    }

    fn decorate_route_context(
        &self,
        _route_context: &mut RouteContext,
        _logic_sql: &LogicSql,
        _metadata: &MetaData,
        _session: &mut SessionContext,
    ) -> Result<()> {
        Ok(())
    }
}

/// Ordered router registry.
#[derive(Clone, Default)]
pub struct PartialSqlRouteExecutor {
    routers: Vec<Arc<dyn SqlRouter>>,
}

impl PartialSqlRouteExecutor {
    #[must_use]
    pub fn new(mut routers: Vec<Arc<dyn SqlRouter>>) -> Self {
        routers.sort_by_key(|r| r.order());
        Self { routers }
    }

    pub fn route(
        &self,
        logic_sql: &LogicSql,
        metadata: &MetaData,
        session: &mut SessionContext,
    ) -> Result<RouteContext> {
        let mut result = RouteContext::new();
        for router in &self.routers {
            if result.is_empty() {
                result = router.create_route_context(logic_sql, metadata, session)?;
            } else {
                router.decorate_route_context(&mut result, logic_sql, metadata, session)?;
            }
        }
        if result.is_empty() {
            if let [single] = metadata.data_source_names.as_slice() {
                tracing::debug!(data_source = %single, "no route unit, using the only data source");
                result.add_unit(RouteUnit::new(RouteMapper::new(single, single), Vec::new()));
            }
        }
        Ok(result)
    }
}

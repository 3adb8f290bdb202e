use super::rule::{ReadwriteSplittingDataSourceRule, ReadwriteSplittingRule};
use crate::core::Result;
use crate::metadata::MetaData;
use crate::route::{RouteContext, RouteMapper, RouteUnit, SqlRouter};
use crate::session::SessionContext;
use crate::statement::{LogicSql, StatementContext};
use std::sync::Arc;

/// Dynamic cluster topology, e.g. a discovered primary and replica set.
pub trait DataSourceNameAware: Send + Sync {
    fn primary_data_source_name(&self, cluster: &str) -> String;

    fn replica_data_source_names(&self, cluster: &str) -> Vec<String>;
}

/// Picks the physical data source of one read/write group.
pub struct ReadwriteSplittingDataSourceRouter<'a> {
    rule: &'a ReadwriteSplittingDataSourceRule,
    topology: Option<&'a dyn DataSourceNameAware>,
}

impl<'a> ReadwriteSplittingDataSourceRouter<'a> {
    #[must_use]
    pub const fn new(rule: &'a ReadwriteSplittingDataSourceRule, topology: Option<&'a dyn DataSourceNameAware>) -> Self {
        Self { rule, topology }
    }

    pub fn route(&self, statement: &StatementContext, session: &mut SessionContext) -> String {
        let aware = self.aware_cluster();
        if Self::is_primary_route(statement, session) {
            session.mark_primary_visited();
            return match aware {
                Some((topology, cluster)) => topology.primary_data_source_name(cluster),
                None => self.rule.primary.clone(),
            };
        }
        let (primary, replicas) = match aware {
            Some((topology, cluster)) => {
                (topology.primary_data_source_name(cluster), topology.replica_data_source_names(cluster))
            }
            None => (self.rule.primary.clone(), self.rule.replicas.clone()),
        };
        if replicas.is_empty() {
            tracing::warn!(group = %self.rule.name, "no replica available, reading from primary");
            return primary;
        }
        self.rule.load_balancer.get_data_source(&self.rule.name, &primary, &replicas)
    }

    fn aware_cluster(&self) -> Option<(&'a dyn DataSourceNameAware, &'a str)> {
        match (self.topology, self.rule.auto_aware_data_source_name.as_deref()) {
            (Some(topology), Some(cluster)) if !cluster.is_empty() => Some((topology, cluster)),
            _ => None,
        }
    }

    fn is_primary_route(statement: &StatementContext, session: &SessionContext) -> bool {
        statement.contains_lock()
            || !statement.is_select()
            || session.is_primary_visited()
            || session.is_write_route_only()
            || session.in_transaction()
    }
}

pub const READWRITE_SPLITTING_ORDER: i32 = 10;

/// Creates a route to the only group, or rewrites group names produced by
/// an earlier router into physical data sources.
pub struct ReadwriteSplittingSqlRouter {
    rule: Arc<ReadwriteSplittingRule>,
    topology: Option<Arc<dyn DataSourceNameAware>>,
}

impl ReadwriteSplittingSqlRouter {
    #[must_use]
    pub fn new(rule: Arc<ReadwriteSplittingRule>, topology: Option<Arc<dyn DataSourceNameAware>>) -> Self {
        Self { rule, topology }
    }

    fn router<'a>(&'a self, rule: &'a ReadwriteSplittingDataSourceRule) -> ReadwriteSplittingDataSourceRouter<'a> {
        ReadwriteSplittingDataSourceRouter::new(rule, self.topology.as_deref())
    }
}

impl SqlRouter for ReadwriteSplittingSqlRouter {
    fn order(&self) -> i32 {
        READWRITE_SPLITTING_ORDER
    }

    fn create_route_context(
        &self,
        logic_sql: &LogicSql,
        _metadata: &MetaData,
        session: &mut SessionContext,
    ) -> Result<RouteContext> {
        let mut result = RouteContext::new();
        if let Some(rule) = self.rule.single_data_source_rule() {
            let actual = self.router(rule).route(&logic_sql.statement, session);
            tracing::debug!(group = %rule.name, data_source = %actual, "read/write route");
            result.add_unit(RouteUnit::new(RouteMapper::new(&rule.name, &actual), Vec::new()));
        }
        Ok(result)
    }

    fn decorate_route_context(
        &self,
        route_context: &mut RouteContext,
        logic_sql: &LogicSql,
        _metadata: &MetaData,
        session: &mut SessionContext,
    ) -> Result<()> {
        for unit in route_context.route_units_mut() {
            if let Some(rule) = self.rule.find_data_source_rule(&unit.data_source_mapper.logic_name) {
                let actual = self.router(rule).route(&logic_sql.statement, session);
                tracing::debug!(group = %rule.name, data_source = %actual, "read/write decorate");
                unit.data_source_mapper = RouteMapper::new(&rule.name, &actual);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Schema;
    use crate::metadata::DatabaseType;
    use crate::readwrite::load_balance::RoundRobinLoadBalanceAlgorithm;
    use crate::route::PartialSqlRouteExecutor;
    use crate::statement::{
        literal, Condition, Projection, ProjectionsContext, SelectStatementContext, UpdateStatementContext,
    };

    fn group(replicas: &[&str]) -> ReadwriteSplittingDataSourceRule {
        ReadwriteSplittingDataSourceRule::new(
            "pr_ds",
            "primary",
            replicas,
            "round_robin",
            Arc::new(RoundRobinLoadBalanceAlgorithm::default()),
        )
    }

    fn select() -> StatementContext {
        StatementContext::Select(SelectStatementContext::new(
            &["t_user"],
            ProjectionsContext::new(vec![Projection::column("name")], false),
        ))
    }

    fn update() -> StatementContext {
        StatementContext::Update(
            UpdateStatementContext::new("t_user", vec![("name".into(), literal("x"))])
                .with_where(Condition::Equals("id".into(), literal(1))),
        )
    }

    struct StaticTopology;

    impl DataSourceNameAware for StaticTopology {
        fn primary_data_source_name(&self, cluster: &str) -> String {
            format!("{cluster}_primary")
        }

        fn replica_data_source_names(&self, cluster: &str) -> Vec<String> {
            vec![format!("{cluster}_replica")]
        }
    }

    #[test]
    fn test_reads_balance_and_writes_stick() {
        let rule = group(&["r0", "r1"]);
        let router = ReadwriteSplittingDataSourceRouter::new(&rule, None);
        let mut session = SessionContext::default();
        assert_eq!(router.route(&select(), &mut session), "r0");
        assert_eq!(router.route(&select(), &mut session), "r1");
        assert_eq!(router.route(&update(), &mut session), "primary");
        assert!(session.is_primary_visited());
        assert_eq!(router.route(&select(), &mut session), "primary");
        session.close();
        assert_eq!(router.route(&select(), &mut session), "r0");
    }

    #[test]
    fn test_transaction_lock_and_hint_use_primary() {
        let rule = group(&["r0"]);
        let router = ReadwriteSplittingDataSourceRouter::new(&rule, None);

        let mut session = SessionContext::default();
        session.begin().unwrap();
        assert_eq!(router.route(&select(), &mut session), "primary");

        let mut session = SessionContext::default();
        session.set_write_route_only(true);
        assert_eq!(router.route(&select(), &mut session), "primary");

        let locked = match select() {
            StatementContext::Select(s) => StatementContext::Select(s.for_update()),
            other => other,
        };
        assert_eq!(router.route(&locked, &mut SessionContext::default()), "primary");
    }

    #[test]
    fn test_empty_replicas_fall_back_to_primary() {
        let rule = group(&[]);
        let router = ReadwriteSplittingDataSourceRouter::new(&rule, None);
        assert_eq!(router.route(&select(), &mut SessionContext::default()), "primary");
    }

    #[test]
    fn test_topology_overrides_static_config() {
        let rule = group(&["r0"]).with_auto_aware("cluster_a");
        let topology = StaticTopology;
        let router = ReadwriteSplittingDataSourceRouter::new(&rule, Some(&topology));
        assert_eq!(router.route(&select(), &mut SessionContext::default()), "cluster_a_replica");
        assert_eq!(router.route(&update(), &mut SessionContext::default()), "cluster_a_primary");
    }

    #[test]
    fn test_sql_router_creates_unit_for_single_group() {
        let rule = Arc::new(ReadwriteSplittingRule::new(vec![group(&["r0"])]).unwrap());
        let executor = PartialSqlRouteExecutor::new(vec![Arc::new(ReadwriteSplittingSqlRouter::new(rule, None))]);
        let metadata = MetaData::new(Schema::new(), &["primary", "r0"], DatabaseType::MySQL);
        let logic_sql = LogicSql::new(select(), "SELECT name FROM t_user", Vec::new());
        let ctx = executor.route(&logic_sql, &metadata, &mut SessionContext::default()).unwrap();
        assert_eq!(ctx.route_units()[0].data_source_mapper, RouteMapper::new("pr_ds", "r0"));
    }
}

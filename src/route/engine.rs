/// Route strategies
///
/// One strategy is picked from the statement shape and the sharding
/// conditions, then fills the route context with units.

use super::context::{RouteContext, RouteMapper, RouteUnit};
use crate::core::Result;
use crate::sharding::{
    DataNode, ShardingCondition, ShardingConditionValue, ShardingConditions, ShardingRule, ShardingStrategy,
    TableRule,
};
use crate::statement::StatementContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardingRouteEngine {
    /// Every data node of every table.
    TableBroadcast { tables: Vec<String> },
    /// Every data source, table names unchanged.
    DatabaseBroadcast,
    /// Any single data source.
    Unicast { tables: Vec<String> },
    /// Tables without a table rule, on the default data source.
    SingleTable { tables: Vec<String> },
    /// One sharded table, broadcast tables riding along.
    Standard { table: String, broadcast_tables: Vec<String> },
    /// Several sharded tables combined per data source.
    Complex { tables: Vec<String>, broadcast_tables: Vec<String> },
    /// Conditions can never match.
    Ignore,
}

impl ShardingRouteEngine {
    #[must_use]
    pub fn new(rule: &ShardingRule, statement: &StatementContext, conditions: &ShardingConditions) -> Self {
        let tables = statement.tables();
        let owned = |names: &[&str]| names.iter().map(|t| (*t).to_string()).collect::<Vec<_>>();
        match statement {
            StatementContext::Dal(_) => Self::DatabaseBroadcast,
            StatementContext::Ddl(_) => {
                let configured: Vec<&str> = tables
                    .iter()
                    .copied()
                    .filter(|t| rule.is_sharding_table(t) || rule.is_broadcast_table(t))
                    .collect();
                if configured.is_empty() {
                    Self::DatabaseBroadcast
                } else {
                    Self::TableBroadcast { tables: owned(&configured) }
                }
            }
            _ if tables.is_empty() => Self::Unicast { tables: Vec::new() },
            _ if rule.is_all_broadcast_tables(&tables) => Self::TableBroadcast { tables: owned(&tables) },
            _ => {
                let sharding = rule.sharding_logic_table_names(&tables);
                let broadcast_tables: Vec<String> = tables
                    .iter()
                    .filter(|t| rule.is_broadcast_table(t))
                    .map(|t| (*t).to_string())
                    .collect();
                match sharding.as_slice() {
                    [] => Self::SingleTable { tables: owned(&tables) },
                    _ if conditions.is_always_false() => Self::Ignore,
                    [table] => Self::Standard { table: (*table).to_string(), broadcast_tables },
                    _ => Self::Complex { tables: owned(&sharding), broadcast_tables },
                }
            }
        }
    }

    pub fn route(
        &self,
        ctx: &mut RouteContext,
        rule: &ShardingRule,
        conditions: &ShardingConditions,
        is_select: bool,
    ) -> Result<()> {
        tracing::debug!(engine = ?self, "routing");
        match self {
            Self::TableBroadcast { tables } => {
                for table in tables {
                    for node in table_data_nodes(rule, table) {
                        ctx.add_unit(unit(&node.data_source, vec![RouteMapper::new(table, &node.table)]));
                    }
                }
            }
            Self::DatabaseBroadcast => {
                for ds in &rule.data_source_names {
                    ctx.add_unit(unit(ds, Vec::new()));
                }
            }
            Self::Unicast { tables } => {
                if let Some(ds) = rule.data_source_names.first() {
                    ctx.add_unit(unit(ds, identity_mappers(tables)));
                }
            }
            Self::SingleTable { tables } => match rule.single_table_data_source() {
                Some(ds) => ctx.add_unit(unit(ds, identity_mappers(tables))),
                None => tracing::debug!(?tables, "no data source owns unconfigured tables"),
            },
            Self::Standard { table, broadcast_tables } => {
                let nodes = route_table(ctx, rule, table, conditions)?;
                for node in nodes {
                    let mut mappers = vec![RouteMapper::new(table, &node.table)];
                    mappers.extend(identity_mappers(broadcast_tables));
                    ctx.add_unit(unit(&node.data_source, mappers));
                }
            }
            Self::Complex { tables, broadcast_tables } => {
                route_cartesian(ctx, rule, tables, broadcast_tables, conditions, is_select)?;
            }
            Self::Ignore => {}
        }
        Ok(())
    }
}

fn unit(data_source: &str, table_mappers: Vec<RouteMapper>) -> RouteUnit {
    RouteUnit::new(RouteMapper::new(data_source, data_source), table_mappers)
}

fn identity_mappers(tables: &[String]) -> Vec<RouteMapper> {
    tables.iter().map(|t| RouteMapper::new(t, t)).collect()
}

/// All nodes of a sharded table, or one per data source for a broadcast table.
fn table_data_nodes(rule: &ShardingRule, table: &str) -> Vec<DataNode> {
    match rule.find_table_rule(table) {
        Some(table_rule) => table_rule.actual_data_nodes.clone(),
        None => rule.data_source_names.iter().map(|ds| DataNode::new(ds, table)).collect(),
    }
}

fn push_unique(nodes: &mut Vec<DataNode>, node: DataNode) {
    if !nodes.contains(&node) {
        nodes.push(node);
    }
}

/// Data nodes of one sharded table; records the nodes of every condition.
fn route_table(
    ctx: &mut RouteContext,
    rule: &ShardingRule,
    table: &str,
    conditions: &ShardingConditions,
) -> Result<Vec<DataNode>> {
    let Some(table_rule) = rule.find_table_rule(table) else {
        return Ok(Vec::new());
    };
    if conditions.is_empty() {
        return route_condition(rule, table_rule, table, None);
    }
    let mut result = Vec::new();
    for condition in &conditions.conditions {
        let nodes = route_condition(rule, table_rule, table, Some(condition))?;
        for node in &nodes {
            push_unique(&mut result, node.clone());
        }
        ctx.original_data_nodes.push(nodes);
    }
    Ok(result)
}

fn route_condition(
    rule: &ShardingRule,
    table_rule: &TableRule,
    table: &str,
    condition: Option<&ShardingCondition>,
) -> Result<Vec<DataNode>> {
    let data_sources = shard(
        rule.database_strategy(table_rule),
        &table_rule.actual_data_source_names(),
        table,
        condition,
    )?;
    let mut nodes = Vec::new();
    for ds in data_sources {
        let tables = shard(rule.table_strategy(table_rule), &table_rule.actual_tables_in(&ds), table, condition)?;
        for actual in tables {
            push_unique(&mut nodes, DataNode::new(&ds, &actual));
        }
    }
    Ok(nodes)
}

/// Applies one strategy; no strategy or no value for its column keeps every target.
fn shard(
    strategy: Option<&ShardingStrategy>,
    targets: &[String],
    table: &str,
    condition: Option<&ShardingCondition>,
) -> Result<Vec<String>> {
    let (Some(strategy), Some(condition)) = (strategy, condition) else {
        return Ok(targets.to_vec());
    };
    let mut values = condition.values_for(table, &strategy.column).peekable();
    if values.peek().is_none() {
        return Ok(targets.to_vec());
    }
    let mut result: Vec<String> = Vec::new();
    for value in values {
        let routed = match value {
            ShardingConditionValue::List { values, .. } => values
                .iter()
                .map(|v| strategy.algorithm.do_sharding(targets, &strategy.column, v))
                .collect::<Result<Vec<_>>>()?,
            ShardingConditionValue::Range { range, .. } => {
                strategy.algorithm.do_range_sharding(targets, &strategy.column, range)?
            }
        };
        for target in routed {
            if !result.contains(&target) {
                result.push(target);
            }
        }
    }
    Ok(result)
}

/// Combines the nodes of several sharded tables on each shared data source.
fn route_cartesian(
    ctx: &mut RouteContext,
    rule: &ShardingRule,
    tables: &[String],
    broadcast_tables: &[String],
    conditions: &ShardingConditions,
    is_select: bool,
) -> Result<()> {
    let mut routed: Vec<(String, Vec<DataNode>)> = Vec::with_capacity(tables.len());
    for table in tables {
        let nodes = route_table(ctx, rule, table, conditions)?;
        routed.push((table.clone(), nodes));
    }

    let mut all_sources: Vec<&str> = Vec::new();
    for (_, nodes) in &routed {
        for node in nodes {
            if !all_sources.contains(&node.data_source.as_str()) {
                all_sources.push(&node.data_source);
            }
        }
    }
    if is_select && all_sources.len() > 1 {
        ctx.federated = true;
    }

    let shared: Vec<&str> = all_sources
        .iter()
        .copied()
        .filter(|ds| routed.iter().all(|(_, nodes)| nodes.iter().any(|n| n.data_source == *ds)))
        .collect();
    for ds in shared {
        let mut combinations: Vec<Vec<RouteMapper>> = vec![Vec::new()];
        for (table, nodes) in &routed {
            let actuals: Vec<&DataNode> = nodes.iter().filter(|n| n.data_source == ds).collect();
            combinations = combinations
                .iter()
                .flat_map(|prefix| {
                    actuals.iter().map(move |node| {
                        let mut mappers = prefix.clone();
                        mappers.push(RouteMapper::new(table, &node.table));
                        mappers
                    })
                })
                .collect();
        }
        for mut mappers in combinations {
            mappers.extend(identity_mappers(broadcast_tables));
            ctx.add_unit(unit(ds, mappers));
        }
    }
    Ok(())
}

use crate::sharding::{DataNode, GeneratedKeyContext};
use serde::Serialize;

/// Logic name to actual name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RouteMapper {
    pub logic_name: String,
    pub actual_name: String,
}

impl RouteMapper {
    #[must_use]
    pub fn new(logic_name: &str, actual_name: &str) -> Self {
        Self { logic_name: logic_name.to_string(), actual_name: actual_name.to_string() }
    }
}

/// One physical target: a data source plus the tables renamed on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RouteUnit {
    pub data_source_mapper: RouteMapper,
    pub table_mappers: Vec<RouteMapper>,
}

impl RouteUnit {
    #[must_use]
    pub const fn new(data_source_mapper: RouteMapper, table_mappers: Vec<RouteMapper>) -> Self {
        Self { data_source_mapper, table_mappers }
    }

    /// Actual table for `logic_table`, if this unit renames it.
    #[must_use]
    pub fn find_table_mapper(&self, logic_table: &str) -> Option<&RouteMapper> {
        self.table_mappers.iter().find(|m| m.logic_name.eq_ignore_ascii_case(logic_table))
    }
}

/// Route units accumulated by the router chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteContext {
    route_units: Vec<RouteUnit>,
    /// Data nodes hit by each sharding condition, in condition order.
    #[serde(skip)]
    pub original_data_nodes: Vec<Vec<DataNode>>,
    /// Keys generated for an INSERT that omitted the key column.
    #[serde(skip)]
    pub generated_keys: Option<GeneratedKeyContext>,
    /// Set when the statement needs cross-data-source federation.
    pub federated: bool,
}

impl RouteContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit unless an identical one is already present.
    pub fn add_unit(&mut self, unit: RouteUnit) {
        if !self.route_units.contains(&unit) {
            self.route_units.push(unit);
        }
    }

    #[must_use]
    pub fn route_units(&self) -> &[RouteUnit] {
        &self.route_units
    }

    pub fn route_units_mut(&mut self) -> &mut Vec<RouteUnit> {
        &mut self.route_units
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_units.is_empty()
    }

    #[must_use]
    pub fn is_single_routing(&self) -> bool {
        self.route_units.len() == 1
    }

    /// Actual data source names in first-seen order.
    #[must_use]
    pub fn actual_data_source_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for unit in &self.route_units {
            let name = unit.data_source_mapper.actual_name.as_str();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(ds: &str, table: &str) -> RouteUnit {
        RouteUnit::new(RouteMapper::new(ds, ds), vec![RouteMapper::new("t_order", table)])
    }

    #[test]
    fn test_units_are_deduplicated_in_order() {
        let mut ctx = RouteContext::new();
        ctx.add_unit(unit("ds_1", "t_order_0"));
        ctx.add_unit(unit("ds_0", "t_order_1"));
        ctx.add_unit(unit("ds_1", "t_order_0"));
        ctx.add_unit(unit("ds_1", "t_order_1"));
        assert_eq!(ctx.route_units().len(), 3);
        assert_eq!(ctx.actual_data_source_names(), vec!["ds_1", "ds_0"]);
        assert_eq!(
            ctx.route_units()[0].find_table_mapper("T_ORDER").map(|m| m.actual_name.as_str()),
            Some("t_order_0")
        );
    }
}

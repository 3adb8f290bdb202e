use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use super::error::{Result, ShardingError};
use super::table::Table;

/// Logical schema: table name → table definition.
///
/// Names are matched case-insensitively. An unknown table is reported as
/// `TableNotFound`, never as an empty definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    tables: HashMap<String, Table>,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.to_lowercase(), table);
    }

    #[must_use]
    pub fn with_table(mut self, table: Table) -> Self {
        self.add_table(table);
        self
    }

    pub fn get(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(&name.to_lowercase())
            .ok_or_else(|| ShardingError::TableNotFound(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_lowercase())
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.values().map(|t| t.name.as_str()).collect()
    }
}

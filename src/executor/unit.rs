use crate::core::Value;
use serde::Serialize;
use std::fmt;

/// Rewritten SQL for one physical target plus its bound parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlUnit {
    pub sql: String,
    pub parameters: Vec<Value>,
}

impl SqlUnit {
    #[must_use]
    pub fn new(sql: &str, parameters: Vec<Value>) -> Self {
        Self { sql: sql.to_string(), parameters }
    }
}

/// A `SqlUnit` bound to the data source it runs on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionUnit {
    pub data_source_name: String,
    pub sql_unit: SqlUnit,
}

impl ExecutionUnit {
    #[must_use]
    pub fn new(data_source_name: &str, sql_unit: SqlUnit) -> Self {
        Self { data_source_name: data_source_name.to_string(), sql_unit }
    }
}

impl fmt::Display for ExecutionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ::: {}", self.data_source_name, self.sql_unit.sql)?;
        if !self.sql_unit.parameters.is_empty() {
            let params: Vec<String> = self.sql_unit.parameters.iter().map(ToString::to_string).collect();
            write!(f, " ::: [{}]", params.join(", "))?;
        }
        Ok(())
    }
}

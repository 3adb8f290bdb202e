use crate::core::Schema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL dialect of the physical databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DatabaseType {
    #[default]
    MySQL,
    MariaDB,
    H2,
    PostgreSQL,
    #[serde(rename = "openGauss")]
    OpenGauss,
    Oracle,
    SQLServer,
    SQL92,
}

impl DatabaseType {
    /// Dialect whose pagination syntax this one shares.
    #[must_use]
    pub const fn trunk(self) -> Self {
        match self {
            Self::MariaDB | Self::H2 => Self::MySQL,
            Self::OpenGauss => Self::PostgreSQL,
            other => other,
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MySQL => "MySQL",
            Self::MariaDB => "MariaDB",
            Self::H2 => "H2",
            Self::PostgreSQL => "PostgreSQL",
            Self::OpenGauss => "openGauss",
            Self::Oracle => "Oracle",
            Self::SQLServer => "SQLServer",
            Self::SQL92 => "SQL92",
        };
        write!(f, "{name}")
    }
}

/// Logical schema plus the physical data sources behind it.
#[derive(Debug, Clone, Default)]
pub struct MetaData {
    pub schema: Schema,
    pub data_source_names: Vec<String>,
    pub database_type: DatabaseType,
}

impl MetaData {
    #[must_use]
    pub fn new(schema: Schema, data_source_names: &[&str], database_type: DatabaseType) -> Self {
        Self {
            schema,
            data_source_names: data_source_names.iter().map(|s| (*s).to_string()).collect(),
            database_type,
        }
    }
}

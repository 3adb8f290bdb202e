use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShardingError {
    #[error("Sharding column '{0}' can't be null")]
    NullShardingValue(String),
    #[error("Value must be comparable: {0}")]
    NotComparable(String),
    #[error("Unsupported SQL: {0}")]
    Unsupported(String),
    #[error("Table '{0}' not found")]
    TableNotFound(String),
    #[error("Table '{0}' already exists")]
    TableExists(String),
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),
    #[error("No data node resolved for '{0}'")]
    NoDataNode(String),
    #[error("Parameter index {0} is out of range")]
    ParameterOutOfRange(usize),
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Execution failed on data source '{data_source}': {message}")]
    ExecutionFailed { data_source: String, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, ShardingError>;

// Shardgate - transparent sharding middleware core
// Routes logic SQL to physical shards, runs it and merges the partial results

// Clippy configuration - allow non-critical warnings
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

// Values, errors and schema metadata
pub mod core;

// Parsed statement contexts (select, insert, update, delete, ddl, dal)
pub mod statement;

// Database dialects and logical metadata
pub mod metadata;

// Per-connection transaction and routing state
pub mod session;

// Sharding rule, algorithms, key generators and condition derivation
pub mod sharding;

// Route engine, validators and the router chain
pub mod route;

// Read/write splitting rule, load balancers and router
pub mod readwrite;

// Execution units, grouping, scatter execution and the runtime pipeline
pub mod executor;

// Result merging (stream, group-by, having, pagination)
pub mod merge;

// Configuration loading and rule building
pub mod config;

// Re-export commonly used types for convenience
pub use config::{Props, RuntimeRules, ShardgateConfig};
pub use core::{Column, DataType, Result, Row, Schema, ShardingError, Table, Value};
pub use executor::{
    ExecutionGroupContext, ExecutionPrepareEngine, ExecutorEngine, MemoryQueryResult, MemoryShardConnector,
    QueryResult, ShardConnector, ShardingRuntime, UpdateResult,
};
pub use merge::{MergeEngine, MergedResult, MergedResultSet};
pub use metadata::{DatabaseType, MetaData};
pub use route::{PartialSqlRouteExecutor, RouteContext, RouteUnit, ShardingSqlRouter, SqlRouter};
pub use readwrite::{ReadwriteSplittingRule, ReadwriteSplittingSqlRouter};
pub use session::{SessionContext, TransactionIdGenerator};
pub use sharding::{ShardingConditions, ShardingRule, TableRule};
pub use statement::{LogicSql, StatementContext};

/// Executor module - turns routed statements into shard calls
///
/// Structure:
/// - unit: execution units (data source + actual SQL)
/// - kernel: route context -> execution context, table name rewrite
/// - prepare: execution groups bounded by max connections per query
/// - engine: scatter execution over a `ShardConnector`
/// - query_result: per-shard result cursors
/// - runtime: the full route / execute / merge pipeline

pub mod engine;
pub mod kernel;
pub mod prepare;
pub mod query_result;
pub mod runtime;
pub mod unit;

pub use engine::{ExecutorEngine, MemoryShardConnector, ShardConnector};
pub use kernel::{ExecutionContext, KernelProcessor};
pub use prepare::{
    ConnectionMode, ExecutionGroup, ExecutionGroupContext, ExecutionPrepareDecorator, ExecutionPrepareEngine,
};
pub use query_result::{MemoryQueryResult, QueryResult};
pub use runtime::{ShardingRuntime, UpdateResult};
pub use unit::{ExecutionUnit, SqlUnit};

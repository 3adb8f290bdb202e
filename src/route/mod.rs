// Route context, strategies, validators and the router chain
pub mod context;
pub mod engine;
pub mod router;
pub mod validator;

pub use context::{RouteContext, RouteMapper, RouteUnit};
pub use engine::ShardingRouteEngine;
pub use router::{PartialSqlRouteExecutor, ShardingSqlRouter, SqlRouter, SHARDING_ORDER};
pub use validator::ShardingStatementValidator;

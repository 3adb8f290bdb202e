// Sharding rule, algorithms and condition derivation
pub mod algorithm;
pub mod condition;
pub mod condition_engine;
pub mod datetime;
pub mod inline;
pub mod keygen;
pub mod rule;

pub use algorithm::{create_sharding_algorithm, ShardingAlgorithm};
pub use condition::{
    GeneratedKeyContext, RangeBound, ShardingCondition, ShardingConditionValue, ShardingConditions, ValueRange,
};
pub use condition_engine::create_sharding_conditions;
pub use datetime::{DatetimeService, FixedDatetimeService, SystemDatetimeService};
pub use inline::{expand_all, InlineExpression};
pub use keygen::{create_key_generator, KeyGenerator};
pub use rule::{DataNode, KeyGenerateStrategy, ShardingRule, ShardingStrategy, TableRule};

// Read/write splitting: primary or load-balanced replica per statement
pub mod load_balance;
pub mod router;
pub mod rule;

pub use load_balance::{create_load_balancer, ReplicaLoadBalanceAlgorithm};
pub use router::{
    DataSourceNameAware, ReadwriteSplittingDataSourceRouter, ReadwriteSplittingSqlRouter, READWRITE_SPLITTING_ORDER,
};
pub use rule::{ReadwriteSplittingDataSourceRule, ReadwriteSplittingRule};

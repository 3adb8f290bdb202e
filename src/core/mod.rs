// Module declarations
pub mod error;
pub mod value;
pub mod data_type;
pub mod column;
pub mod row;
pub mod table;
pub mod schema;

// Re-exports for convenience
pub use error::{Result, ShardingError};
pub use value::Value;
pub use data_type::DataType;
pub use column::Column;
pub use row::Row;
pub use table::Table;
pub use schema::Schema;

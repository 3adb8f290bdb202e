// Statement contexts handed over by the SQL front end
pub mod ddl;
pub mod dml;
pub mod expression;
pub mod pagination;
pub mod queries;
#[allow(clippy::module_inception)]
pub mod statement;

pub use ddl::{DalStatementContext, DdlKind, DdlStatementContext};
pub use dml::{DeleteStatementContext, InsertStatementContext, UpdateStatementContext};
pub use expression::{Condition, Expression, literal, split_column};
pub use pagination::{PaginationBound, PaginationContext, PaginationSegment, PaginationValue};
pub use queries::{
    AggregationProjection, AggregationType, NullsOrder, OrderByItem, OrderByTarget, OrderDirection,
    Projection, ProjectionsContext, SelectStatementContext,
};
pub use statement::{LogicSql, StatementContext};

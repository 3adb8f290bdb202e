// Merging partial results the way a scattered SELECT produces them
use shardgate::core::{Column, DataType, Schema, Table, Value};
use shardgate::executor::{MemoryQueryResult, QueryResult};
use shardgate::merge::{MergeEngine, MergedResultSet};
use shardgate::statement::{
    AggregationType, OrderByItem, PaginationContext, Projection, ProjectionsContext, SelectStatementContext,
    StatementContext,
};
use shardgate::DatabaseType;
use std::sync::Arc;

fn engine(database_type: DatabaseType) -> MergeEngine {
    let schema = Schema::new().with_table(Table::new(
        "t_user",
        vec![
            Column::new("k", DataType::Integer),
            Column::new("v", DataType::Integer),
            Column::new("name", DataType::Text).case_sensitive(),
            Column::new("city", DataType::Text),
        ],
    ));
    MergeEngine::new(database_type, Arc::new(schema))
}

fn result(labels: &[&str], rows: Vec<Vec<Value>>) -> Box<dyn QueryResult> {
    Box::new(MemoryQueryResult::new(labels, rows))
}

fn ints(rows: &[&[i64]]) -> Vec<Vec<Value>> {
    rows.iter().map(|r| r.iter().map(|v| Value::Integer(*v)).collect()).collect()
}

fn drain(mut set: MergedResultSet) -> Vec<Vec<Value>> {
    let width = set.column_labels().len();
    let mut rows = Vec::new();
    while set.next().unwrap() {
        rows.push((0..width).map(|i| set.get(i).unwrap()).collect());
    }
    rows
}

fn sum_by_k() -> StatementContext {
    StatementContext::Select(
        SelectStatementContext::new(
            &["t_user"],
            ProjectionsContext::new(
                vec![Projection::column("k"), Projection::aggregation(AggregationType::Sum, Some("v"))],
                false,
            ),
        )
        .with_group_by(vec![OrderByItem::column("k")]),
    )
}

#[test]
fn test_sum_group_by_across_two_shards() {
    let labels = ["k", "SUM(v)"];
    let merged = engine(DatabaseType::MySQL)
        .merge(
            vec![result(&labels, ints(&[&[1, 10], &[2, 5]])), result(&labels, ints(&[&[1, 3], &[3, 7]]))],
            &sum_by_k(),
            &[],
        )
        .unwrap();
    assert_eq!(drain(merged), ints(&[&[1, 13], &[2, 5], &[3, 7]]));
}

#[test]
fn test_group_by_memory_is_order_independent() {
    let labels = ["k", "SUM(v)"];
    let shards = [ints(&[&[3, 1], &[1, 2], &[2, 2]]), ints(&[&[2, 4], &[3, 8]]), ints(&[&[1, 1]])];
    let expected = ints(&[&[1, 3], &[2, 6], &[3, 9]]);
    let orders: [[usize; 3]; 3] = [[0, 1, 2], [2, 0, 1], [1, 2, 0]];
    for order in orders {
        let results: Vec<Box<dyn QueryResult>> = order
            .iter()
            .map(|&i| {
                let mut rows = shards[i].clone();
                rows.reverse();
                result(&labels, rows)
            })
            .collect();
        let merged = engine(DatabaseType::MySQL).merge(results, &sum_by_k(), &[]).unwrap();
        assert_eq!(drain(merged), expected);
    }
}

#[test]
fn test_count_over_empty_shards_yields_zero() {
    let statement = StatementContext::Select(SelectStatementContext::new(
        &["t_user"],
        ProjectionsContext::new(
            vec![
                Projection::aggregation(AggregationType::Count, None),
                Projection::aggregation(AggregationType::Max, Some("v")),
            ],
            false,
        ),
    ));
    let labels = ["COUNT(*)", "MAX(v)"];
    let merged = engine(DatabaseType::PostgreSQL)
        .merge(vec![result(&labels, vec![]), result(&labels, vec![])], &statement, &[])
        .unwrap();
    assert_eq!(drain(merged), vec![vec![Value::Integer(0), Value::Null]]);
}

#[test]
fn test_avg_from_derived_count_and_sum() {
    let statement = StatementContext::Select(SelectStatementContext::new(
        &["t_user"],
        ProjectionsContext::new(vec![Projection::aggregation(AggregationType::Avg, Some("v"))], false),
    ));
    let labels = ["AVG(v)", "AVG_DERIVED_COUNT_0", "AVG_DERIVED_SUM_0"];
    let shard = |avg: i64, count: i64, sum: i64| result(&labels, ints(&[&[avg, count, sum]]));
    let merged = engine(DatabaseType::MySQL).merge(vec![shard(2, 2, 4), shard(5, 1, 5)], &statement, &[]).unwrap();
    let rows = drain(merged);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0].to_f64(), Some(3.0));
}

#[test]
fn test_order_by_respects_case_sensitivity() {
    let select = |column: &str| {
        StatementContext::Select(
            SelectStatementContext::new(
                &["t_user"],
                ProjectionsContext::new(vec![Projection::column(column)], false),
            )
            .with_order_by(vec![OrderByItem::column(column)]),
        )
    };
    let shards = |label: &str| {
        vec![
            result(&[label], vec![vec![Value::from("B")], vec![Value::from("c")]]),
            result(&[label], vec![vec![Value::from("a")]]),
        ]
    };
    let texts = |rows: Vec<Vec<Value>>| rows.into_iter().map(|r| r[0].to_string()).collect::<Vec<_>>();

    // byte order puts upper case first
    let sensitive = engine(DatabaseType::MySQL).merge(shards("name"), &select("name"), &[]).unwrap();
    assert_eq!(texts(drain(sensitive)), vec!["B", "a", "c"]);

    let insensitive = engine(DatabaseType::MySQL).merge(shards("city"), &select("city"), &[]).unwrap();
    assert_eq!(texts(drain(insensitive)), vec!["a", "B", "c"]);
}

#[test]
fn test_offset_limit_window() {
    let statement = StatementContext::Select(
        SelectStatementContext::new(&["t_user"], ProjectionsContext::new(vec![Projection::column("k")], false))
            .with_pagination(PaginationContext::limit(1, Some(2))),
    );
    let merged = engine(DatabaseType::MySQL)
        .merge(
            vec![result(&["k"], ints(&[&[0], &[1], &[2]])), result(&["k"], ints(&[&[3], &[4]]))],
            &statement,
            &[],
        )
        .unwrap();
    assert_eq!(drain(merged), ints(&[&[1], &[2]]));
}

#[test]
fn test_pagination_boundaries() {
    let paginated = |offset: u64, row_count: Option<u64>| {
        StatementContext::Select(
            SelectStatementContext::new(&["t_user"], ProjectionsContext::new(vec![Projection::column("k")], false))
                .with_pagination(PaginationContext::limit(offset, row_count)),
        )
    };
    let shards = || vec![result(&["k"], ints(&[&[0], &[1]])), result(&["k"], ints(&[&[2]]))];

    let past_end = engine(DatabaseType::MySQL).merge(shards(), &paginated(3, Some(5)), &[]).unwrap();
    assert!(drain(past_end).is_empty());

    let everything = engine(DatabaseType::MySQL).merge(shards(), &paginated(0, None), &[]).unwrap();
    assert_eq!(drain(everything), ints(&[&[0], &[1], &[2]]));
}

#[test]
fn test_single_result_round_trip() {
    let rows = vec![
        vec![Value::Integer(2), Value::from("x")],
        vec![Value::Integer(1), Value::Null],
        vec![Value::Integer(3), Value::from("y")],
    ];
    let statement = StatementContext::Select(SelectStatementContext::new(
        &["t_user"],
        ProjectionsContext::new(vec![Projection::column("k"), Projection::column("name")], false),
    ));
    let merged = engine(DatabaseType::MySQL)
        .merge(vec![result(&["k", "name"], rows.clone())], &statement, &[])
        .unwrap();
    assert_eq!(merged.column_labels(), ["k", "name"]);
    assert_eq!(drain(merged), rows);
}

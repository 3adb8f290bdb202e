/// Kernel processing: route context to execution units
///
/// Each route unit becomes one execution unit whose SQL has every logic
/// table name replaced by the unit's actual table name. A paginated SELECT
/// over several units also gets its window widened so the merger can page
/// the combined rows.

use super::unit::{ExecutionUnit, SqlUnit};
use crate::core::{Result, ShardingError, Value};
use crate::metadata::DatabaseType;
use crate::route::{RouteContext, RouteUnit};
use crate::sharding::GeneratedKeyContext;
use crate::statement::{LogicSql, PaginationValue, StatementContext};

/// Shard row count when rows are regrouped in memory before paging.
pub const MAX_ROW_COUNT: u64 = i64::MAX.unsigned_abs();

/// Everything needed to run one logic statement.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub logic_sql: LogicSql,
    pub route_context: RouteContext,
    pub execution_units: Vec<ExecutionUnit>,
    pub generated_keys: Option<GeneratedKeyContext>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KernelProcessor {
    database_type: DatabaseType,
    sql_show: bool,
}

impl KernelProcessor {
    #[must_use]
    pub const fn new(database_type: DatabaseType, sql_show: bool) -> Self {
        Self { database_type, sql_show }
    }

    pub fn generate_execution_context(&self, logic_sql: &LogicSql, route_context: RouteContext) -> Result<ExecutionContext> {
        if route_context.is_empty() {
            return Err(ShardingError::NoDataNode(logic_sql.statement.tables().join(", ")));
        }
        let (sql, parameters) = if route_context.route_units().len() > 1 {
            self.revise_pagination(logic_sql)?
        } else {
            (logic_sql.sql.clone(), logic_sql.parameters.clone())
        };
        let execution_units: Vec<ExecutionUnit> = route_context
            .route_units()
            .iter()
            .map(|unit| {
                ExecutionUnit::new(
                    &unit.data_source_mapper.actual_name,
                    SqlUnit::new(&rewrite_table_names(&sql, unit), parameters.clone()),
                )
            })
            .collect();
        if self.sql_show {
            tracing::info!("Logic SQL: {}", logic_sql.sql);
            for unit in &execution_units {
                tracing::info!("Actual SQL: {unit}");
            }
        }
        let generated_keys = route_context.generated_keys.clone();
        Ok(ExecutionContext { logic_sql: logic_sql.clone(), route_context, execution_units, generated_keys })
    }

    /// Shard-side SQL and parameters of a SELECT merged from several units.
    ///
    /// Offsets become 0 and LIMIT counts become `offset + count`; ROWNUM and
    /// TOP bounds already count from the first row and stay as written.
    fn revise_pagination(&self, logic_sql: &LogicSql) -> Result<(String, Vec<Value>)> {
        let mut sql = logic_sql.sql.clone();
        let mut parameters = logic_sql.parameters.clone();
        let StatementContext::Select(select) = &logic_sql.statement else {
            return Ok((sql, parameters));
        };
        let Some(pagination) = select.pagination.as_ref().filter(|p| p.has_pagination()) else {
            return Ok((sql, parameters));
        };
        let limit_syntax = match self.database_type.trunk() {
            DatabaseType::MySQL | DatabaseType::PostgreSQL => true,
            DatabaseType::Oracle | DatabaseType::SQLServer => false,
            _ => return Ok((sql, parameters)),
        };

        let mut revisions = Vec::with_capacity(2);
        if let Some(offset) = pagination.offset {
            revisions.push((offset, 0));
        }
        if let Some(row_count) = pagination.row_count {
            if !select.group_by.is_empty() && !select.is_same_group_by_and_order_by() {
                revisions.push((row_count, MAX_ROW_COUNT));
            } else if limit_syntax {
                let offset = pagination.actual_offset(&logic_sql.parameters)?;
                let count = pagination.actual_row_count(&logic_sql.parameters)?.unwrap_or_default();
                revisions.push((row_count, offset.saturating_add(count).min(MAX_ROW_COUNT)));
            }
        }

        let mut literals = Vec::new();
        for (segment, value) in revisions {
            match segment.value {
                PaginationValue::Parameter(index) => {
                    let slot = parameters.get_mut(index).ok_or(ShardingError::ParameterOutOfRange(index))?;
                    *slot = Value::Integer(i64::try_from(value).unwrap_or(i64::MAX));
                }
                PaginationValue::Literal(_) => {
                    let position = segment.position.ok_or_else(|| {
                        ShardingError::Unsupported(
                            "pagination literal without a position can not be rewritten for multiple data nodes"
                                .to_string(),
                        )
                    })?;
                    literals.push((position, value));
                }
            }
        }
        // back to front, so earlier positions stay valid
        literals.sort_by_key(|((start, _), _)| std::cmp::Reverse(*start));
        for ((start, stop), value) in literals {
            if sql.get(start..stop).is_none() {
                return Err(ShardingError::InvalidExpression(format!(
                    "pagination position {start}..{stop} is outside the SQL"
                )));
            }
            sql.replace_range(start..stop, &value.to_string());
        }
        tracing::debug!(sql = %sql, "pagination revised for merge");
        Ok((sql, parameters))
    }
}

/// Replaces logic table identifiers with the unit's actual tables.
///
/// Identifiers are matched whole and case-insensitively; string literals
/// are copied untouched.
#[must_use]
pub fn rewrite_table_names(sql: &str, unit: &RouteUnit) -> String {
    if unit.table_mappers.is_empty() {
        return sql.to_string();
    }
    scan_identifiers(sql, |word| unit.find_table_mapper(word).map(|m| m.actual_name.clone()))
}

/// True when `name` occurs in `sql` as a whole identifier.
#[must_use]
pub fn contains_identifier(sql: &str, name: &str) -> bool {
    let mut found = false;
    scan_identifiers(sql, |word| {
        found |= word.eq_ignore_ascii_case(name);
        None
    });
    found
}

const fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

const fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn scan_identifiers(sql: &str, mut replace: impl FnMut(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(sql.len() + 16);
    let mut chars = sql.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c == '\'' {
            result.push(c);
            for (_, c) in chars.by_ref() {
                result.push(c);
                if c == '\'' {
                    break;
                }
            }
        } else if is_identifier_start(c) {
            let mut end = start + c.len_utf8();
            while let Some(&(i, next)) = chars.peek() {
                if !is_identifier_char(next) {
                    break;
                }
                end = i + next.len_utf8();
                chars.next();
            }
            let word = &sql[start..end];
            match replace(word) {
                Some(actual) => result.push_str(&actual),
                None => result.push_str(word),
            }
        } else if c.is_ascii_digit() {
            // numbers never start identifiers; keep `1e5` and `0x1f` intact
            result.push(c);
            while let Some(&(_, next)) = chars.peek() {
                if !is_identifier_char(next) {
                    break;
                }
                result.push(next);
                chars.next();
            }
        } else {
            result.push(c);
        }
    }
    result
}

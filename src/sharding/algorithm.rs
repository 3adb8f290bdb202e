/// Sharding algorithms
///
/// An algorithm maps one sharding value (or a range of values) onto the
/// available target names, which are data source names for database
/// strategies and actual table names for table strategies.

use super::condition::{RangeBound, ValueRange};
use super::inline::InlineExpression;
use crate::core::{Result, ShardingError, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

pub trait ShardingAlgorithm: Send + Sync + Debug {
    fn type_name(&self) -> &'static str;

    /// Target for a single value.
    fn do_sharding(&self, targets: &[String], column: &str, value: &Value) -> Result<String>;

    /// Targets that may hold values inside `range`. Algorithms that cannot
    /// narrow a range return every target.
    fn do_range_sharding(&self, targets: &[String], _column: &str, _range: &ValueRange) -> Result<Vec<String>> {
        Ok(targets.to_vec())
    }
}

/// Trailing decimal digits of a target name: `t_order_12` -> 12.
fn suffix_number(target: &str) -> Option<i64> {
    let digits = target.len() - target.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    target[target.len() - digits..].parse().ok()
}

fn target_with_suffix(targets: &[String], suffix: i64, value: &Value) -> Result<String> {
    targets
        .iter()
        .find(|t| suffix_number(t) == Some(suffix))
        .cloned()
        .ok_or_else(|| ShardingError::NoDataNode(format!("sharding value {value} (shard {suffix})")))
}

fn long_value(value: &Value) -> Result<i64> {
    if let Some(v) = value.as_int() {
        return Ok(v);
    }
    value
        .to_string()
        .trim()
        .parse::<i64>()
        .map_err(|_| ShardingError::NotComparable(format!("sharding value {value} is not an integer")))
}

fn required_prop<'a>(props: &'a HashMap<String, String>, key: &str, type_name: &str) -> Result<&'a str> {
    props
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| ShardingError::InvalidConfig(format!("{type_name} algorithm requires '{key}'")))
}

fn positive_count(props: &HashMap<String, String>, type_name: &str) -> Result<i64> {
    let raw = required_prop(props, "sharding-count", type_name)?;
    match raw.trim().parse::<i64>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(ShardingError::InvalidConfig(format!(
            "{type_name} sharding-count must be a positive integer, got '{raw}'"
        ))),
    }
}

/// `value mod sharding-count`, matched against target suffixes.
#[derive(Debug, Clone)]
pub struct ModShardingAlgorithm {
    sharding_count: i64,
}

impl ModShardingAlgorithm {
    pub fn new(props: &HashMap<String, String>) -> Result<Self> {
        Ok(Self { sharding_count: positive_count(props, "MOD")? })
    }
}

impl ShardingAlgorithm for ModShardingAlgorithm {
    fn type_name(&self) -> &'static str {
        "MOD"
    }

    fn do_sharding(&self, targets: &[String], _column: &str, value: &Value) -> Result<String> {
        let suffix = long_value(value)?.rem_euclid(self.sharding_count);
        target_with_suffix(targets, suffix, value)
    }

    fn do_range_sharding(&self, targets: &[String], column: &str, range: &ValueRange) -> Result<Vec<String>> {
        let Some((low, high)) = range.integer_bounds() else {
            return Ok(targets.to_vec());
        };
        if high < low {
            return Ok(Vec::new());
        }
        if high.saturating_sub(low) >= self.sharding_count {
            return Ok(targets.to_vec());
        }
        let mut result = Vec::new();
        for v in low..=high {
            let target = self.do_sharding(targets, column, &Value::Integer(v))?;
            if !result.contains(&target) {
                result.push(target);
            }
        }
        Ok(result)
    }
}

/// SHA-256 of the value's text form, first eight bytes, mod sharding-count.
#[derive(Debug, Clone)]
pub struct HashModShardingAlgorithm {
    sharding_count: i64,
}

impl HashModShardingAlgorithm {
    pub fn new(props: &HashMap<String, String>) -> Result<Self> {
        Ok(Self { sharding_count: positive_count(props, "HASH_MOD")? })
    }

    fn hash(value: &Value) -> u64 {
        let digest = Sha256::digest(value.to_string().as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix)
    }
}

impl ShardingAlgorithm for HashModShardingAlgorithm {
    fn type_name(&self) -> &'static str {
        "HASH_MOD"
    }

    fn do_sharding(&self, targets: &[String], _column: &str, value: &Value) -> Result<String> {
        let suffix = (Self::hash(value) % self.sharding_count as u64) as i64;
        target_with_suffix(targets, suffix, value)
    }
}

/// Target named by an inline expression such as `t_order_${order_id % 2}`.
#[derive(Debug, Clone)]
pub struct InlineShardingAlgorithm {
    expression: InlineExpression,
}

impl InlineShardingAlgorithm {
    pub fn new(props: &HashMap<String, String>) -> Result<Self> {
        let raw = required_prop(props, "algorithm-expression", "INLINE")?;
        let expression = InlineExpression::parse(raw)
            .map_err(|e| ShardingError::InvalidConfig(format!("INLINE algorithm-expression: {e}")))?;
        if expression.columns().is_empty() {
            return Err(ShardingError::InvalidConfig(format!(
                "INLINE algorithm-expression '{raw}' references no column"
            )));
        }
        Ok(Self { expression })
    }
}

impl ShardingAlgorithm for InlineShardingAlgorithm {
    fn type_name(&self) -> &'static str {
        "INLINE"
    }

    fn do_sharding(&self, targets: &[String], column: &str, value: &Value) -> Result<String> {
        let name = self.expression.evaluate(column, value)?;
        targets
            .iter()
            .find(|t| t.eq_ignore_ascii_case(&name))
            .cloned()
            .ok_or(ShardingError::NoDataNode(name))
    }
}

/// Ascending boundaries split the value space into `boundaries + 1`
/// partitions; partition `i` is the target with suffix `i`.
#[derive(Debug, Clone)]
pub struct BoundaryRangeShardingAlgorithm {
    boundaries: Vec<i64>,
}

impl BoundaryRangeShardingAlgorithm {
    pub fn new(props: &HashMap<String, String>) -> Result<Self> {
        let raw = required_prop(props, "sharding-ranges", "BOUNDARY_RANGE")?;
        let boundaries = raw
            .split(',')
            .map(|s| {
                s.trim().parse::<i64>().map_err(|_| {
                    ShardingError::InvalidConfig(format!("BOUNDARY_RANGE boundary '{s}' is not an integer"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ShardingError::InvalidConfig(format!(
                "BOUNDARY_RANGE sharding-ranges must be strictly ascending: {raw}"
            )));
        }
        Ok(Self { boundaries })
    }

    fn partition(&self, value: i64) -> usize {
        self.boundaries.partition_point(|b| *b <= value)
    }

    fn partition_bounds(&self, partition: usize) -> (i64, i64) {
        let low = if partition == 0 { i64::MIN } else { self.boundaries[partition - 1] };
        let high = self.boundaries.get(partition).map_or(i64::MAX, |b| b - 1);
        (low, high)
    }
}

fn integer_bound(bound: Option<&RangeBound>, lower: bool) -> Option<i64> {
    match bound {
        None => Some(if lower { i64::MIN } else { i64::MAX }),
        Some(b) => {
            let v = b.value.as_int()?;
            Some(match (b.inclusive, lower) {
                (true, _) => v,
                (false, true) => v.saturating_add(1),
                (false, false) => v.saturating_sub(1),
            })
        }
    }
}

impl ShardingAlgorithm for BoundaryRangeShardingAlgorithm {
    fn type_name(&self) -> &'static str {
        "BOUNDARY_RANGE"
    }

    fn do_sharding(&self, targets: &[String], _column: &str, value: &Value) -> Result<String> {
        let partition = self.partition(long_value(value)?);
        target_with_suffix(targets, partition as i64, value)
    }

    fn do_range_sharding(&self, targets: &[String], _column: &str, range: &ValueRange) -> Result<Vec<String>> {
        let (Some(low), Some(high)) = (
            integer_bound(range.lower.as_ref(), true),
            integer_bound(range.upper.as_ref(), false),
        ) else {
            return Ok(targets.to_vec());
        };
        Ok(targets
            .iter()
            .filter(|t| {
                suffix_number(t).and_then(|s| usize::try_from(s).ok()).is_some_and(|p| {
                    if p > self.boundaries.len() {
                        return false;
                    }
                    let (p_low, p_high) = self.partition_bounds(p);
                    low <= p_high && p_low <= high
                })
            })
            .cloned()
            .collect())
    }
}

/// Builds an algorithm from its type name and props.
pub fn create_sharding_algorithm(
    type_name: &str,
    props: &HashMap<String, String>,
) -> Result<Arc<dyn ShardingAlgorithm>> {
    Ok(match type_name.to_uppercase().as_str() {
        "MOD" => Arc::new(ModShardingAlgorithm::new(props)?),
        "HASH_MOD" => Arc::new(HashModShardingAlgorithm::new(props)?),
        "INLINE" => Arc::new(InlineShardingAlgorithm::new(props)?),
        "BOUNDARY_RANGE" => Arc::new(BoundaryRangeShardingAlgorithm::new(props)?),
        other => {
            return Err(ShardingError::InvalidConfig(format!("unknown sharding algorithm type '{other}'")));
        }
    })
}

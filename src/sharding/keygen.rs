use super::datetime::{DatetimeService, SystemDatetimeService};
use crate::core::{Result, ShardingError, Value};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Distributed primary key generator.
pub trait KeyGenerator: Send + Sync + Debug {
    fn type_name(&self) -> &'static str;

    fn generate_key(&self) -> Result<Value>;
}

/// 2016-11-01T00:00:00Z
pub const SNOWFLAKE_EPOCH_MILLIS: i64 = 1_477_958_400_000;
const SEQUENCE_BITS: u32 = 12;
const WORKER_ID_BITS: u32 = 10;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;
const MAX_WORKER_ID: i64 = (1 << WORKER_ID_BITS) - 1;

#[derive(Debug, Default)]
struct SnowflakeState {
    last_millis: i64,
    sequence: i64,
}

/// 41-bit millisecond timestamp, 10-bit worker id, 12-bit sequence.
#[derive(Debug)]
pub struct SnowflakeKeyGenerator {
    worker_id: i64,
    clock: Arc<dyn DatetimeService>,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeKeyGenerator {
    pub fn new(worker_id: i64, clock: Arc<dyn DatetimeService>) -> Result<Self> {
        if !(0..=MAX_WORKER_ID).contains(&worker_id) {
            return Err(ShardingError::InvalidConfig(format!(
                "worker-id must be in 0..={MAX_WORKER_ID}, got {worker_id}"
            )));
        }
        Ok(Self { worker_id, clock, state: Mutex::new(SnowflakeState::default()) })
    }

    fn wait_until_after(&self, last_millis: i64) -> i64 {
        let mut now = self.clock.now_millis();
        while now <= last_millis {
            std::thread::yield_now();
            now = self.clock.now_millis();
        }
        now
    }
}

impl KeyGenerator for SnowflakeKeyGenerator {
    fn type_name(&self) -> &'static str {
        "SNOWFLAKE"
    }

    fn generate_key(&self) -> Result<Value> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ShardingError::InvalidConfig("snowflake state poisoned".to_string()))?;
        let mut now = self.clock.now_millis();
        // Clock moved backwards: keep issuing from the last timestamp.
        if now < state.last_millis {
            now = state.last_millis;
        }
        if now == state.last_millis {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                now = self.wait_until_after(state.last_millis);
            }
        } else {
            state.sequence = 0;
        }
        state.last_millis = now;
        let id = ((now - SNOWFLAKE_EPOCH_MILLIS) << (SEQUENCE_BITS + WORKER_ID_BITS))
            | (self.worker_id << SEQUENCE_BITS)
            | state.sequence;
        Ok(Value::Integer(id))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidKeyGenerator;

impl KeyGenerator for UuidKeyGenerator {
    fn type_name(&self) -> &'static str {
        "UUID"
    }

    fn generate_key(&self) -> Result<Value> {
        Ok(Value::Text(Uuid::new_v4().simple().to_string()))
    }
}

/// Builds a generator from its type name and props.
pub fn create_key_generator(
    type_name: &str,
    props: &HashMap<String, String>,
    clock: Option<Arc<dyn DatetimeService>>,
) -> Result<Arc<dyn KeyGenerator>> {
    match type_name.to_uppercase().as_str() {
        "SNOWFLAKE" => {
            let worker_id = match props.get("worker-id") {
                Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                    ShardingError::InvalidConfig(format!("worker-id is not an integer: {raw}"))
                })?,
                None => 0,
            };
            let clock = clock.unwrap_or_else(|| Arc::new(SystemDatetimeService));
            Ok(Arc::new(SnowflakeKeyGenerator::new(worker_id, clock)?))
        }
        "UUID" => Ok(Arc::new(UuidKeyGenerator)),
        other => Err(ShardingError::InvalidConfig(format!("unknown key generator type '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharding::datetime::FixedDatetimeService;
    use chrono::DateTime;

    #[test]
    fn test_snowflake_layout() {
        let instant = DateTime::from_timestamp_millis(SNOWFLAKE_EPOCH_MILLIS + 5).unwrap().naive_utc();
        let generator = SnowflakeKeyGenerator::new(3, Arc::new(FixedDatetimeService(instant))).unwrap();
        let first = generator.generate_key().unwrap().as_int().unwrap();
        let second = generator.generate_key().unwrap().as_int().unwrap();
        assert_eq!(first >> 22, 5);
        assert_eq!((first >> 12) & MAX_WORKER_ID, 3);
        assert_eq!(second - first, 1);
    }

    #[test]
    fn test_snowflake_keys_increase() {
        let generator = create_key_generator("snowflake", &HashMap::new(), None).unwrap();
        let mut last = 0;
        for _ in 0..100 {
            let key = generator.generate_key().unwrap().as_int().unwrap();
            assert!(key > last);
            last = key;
        }
    }

    #[test]
    fn test_invalid_worker_id() {
        let props = HashMap::from([("worker-id".to_string(), "4096".to_string())]);
        assert!(create_key_generator("SNOWFLAKE", &props, None).is_err());
    }

    #[test]
    fn test_uuid_and_unknown() {
        let key = create_key_generator("UUID", &HashMap::new(), None).unwrap().generate_key().unwrap();
        assert_eq!(key.as_text().unwrap().len(), 32);
        assert!(create_key_generator("AUTO", &HashMap::new(), None).is_err());
    }
}

use chrono::{NaiveDateTime, Utc};
use std::fmt::Debug;

/// Clock used for `NOW()` sharding values and key generation.
pub trait DatetimeService: Send + Sync + Debug {
    fn now(&self) -> NaiveDateTime;

    fn now_millis(&self) -> i64 {
        self.now().and_utc().timestamp_millis()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDatetimeService;

impl DatetimeService for SystemDatetimeService {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedDatetimeService(pub NaiveDateTime);

impl DatetimeService for FixedDatetimeService {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

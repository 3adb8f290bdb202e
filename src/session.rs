use crate::core::{Result, ShardingError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hands out transaction ids shared by every session of a runtime.
#[derive(Debug, Clone)]
pub struct TransactionIdGenerator {
    next_tx_id: Arc<AtomicU64>,
}

impl TransactionIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self { next_tx_id: Arc::new(AtomicU64::new(1)) }
    }

    pub fn next_id(&self) -> u64 {
        self.next_tx_id.fetch_add(1, Ordering::SeqCst)
    }

    /// The id the next transaction will get.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.next_tx_id.load(Ordering::SeqCst)
    }
}

impl Default for TransactionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-connection routing state.
///
/// `primary_visited` sticks reads to the primary after a write until the
/// transaction or session ends.
#[derive(Debug, Default)]
pub struct SessionContext {
    transaction_id: Option<u64>,
    primary_visited: bool,
    write_route_only: bool,
    ids: TransactionIdGenerator,
}

impl SessionContext {
    #[must_use]
    pub fn new(ids: TransactionIdGenerator) -> Self {
        Self { ids, ..Self::default() }
    }

    pub fn begin(&mut self) -> Result<u64> {
        if let Some(id) = self.transaction_id {
            return Err(ShardingError::Unsupported(format!("transaction {id} is already open")));
        }
        let id = self.ids.next_id();
        self.transaction_id = Some(id);
        tracing::debug!(transaction_id = id, "transaction begin");
        Ok(id)
    }

    pub fn commit(&mut self) {
        self.end_transaction("commit");
    }

    pub fn rollback(&mut self) {
        self.end_transaction("rollback");
    }

    /// Ends the session; any open transaction is discarded.
    pub fn close(&mut self) {
        self.end_transaction("close");
        self.write_route_only = false;
    }

    fn end_transaction(&mut self, action: &str) {
        match self.transaction_id.take() {
            Some(id) => tracing::debug!(transaction_id = id, action, "transaction end"),
            None if action != "close" => tracing::warn!(action, "no transaction in progress"),
            None => {}
        }
        self.primary_visited = false;
    }

    #[must_use]
    pub const fn transaction_id(&self) -> Option<u64> {
        self.transaction_id
    }

    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.transaction_id.is_some()
    }

    #[must_use]
    pub const fn is_primary_visited(&self) -> bool {
        self.primary_visited
    }

    pub fn mark_primary_visited(&mut self) {
        self.primary_visited = true;
    }

    /// Hint: route every statement of this session to the primary.
    pub fn set_write_route_only(&mut self, write_route_only: bool) {
        self.write_route_only = write_route_only;
    }

    #[must_use]
    pub const fn is_write_route_only(&self) -> bool {
        self.write_route_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_increment_and_are_shared() {
        let ids = TransactionIdGenerator::new();
        let other = ids.clone();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(other.next_id(), 2);
        assert_eq!(ids.current(), 3);
    }

    #[test]
    fn test_session_lifecycle_clears_primary_visited() {
        let ids = TransactionIdGenerator::new();
        let mut session = SessionContext::new(ids.clone());
        assert_eq!(session.begin().unwrap(), 1);
        assert!(session.begin().is_err());
        session.mark_primary_visited();
        assert!(session.in_transaction());
        session.commit();
        assert!(!session.in_transaction());
        assert!(!session.is_primary_visited());

        let mut second = SessionContext::new(ids);
        assert_eq!(second.begin().unwrap(), 2);
        second.set_write_route_only(true);
        second.close();
        assert!(!second.in_transaction());
        assert!(!second.is_write_route_only());
    }
}

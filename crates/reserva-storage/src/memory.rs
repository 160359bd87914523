use async_trait::async_trait;
use dashmap::DashMap;
use jiff::Timestamp;
use reserva_core::error::Result;
use reserva_core::{Clock, ReservationKey, ReservationStore, ReservedValue, SystemClock};
use std::collections::{HashMap, HashSet};

/// In-memory implementation of the reservation store using DashMap.
///
/// Values are grouped per key, so a bulk insert holds a single shard lock for
/// the whole batch. That lock is what makes each value's check-and-insert
/// atomic with respect to concurrent callers in the same process. Consumed
/// values are kept as tombstones.
#[derive(Debug)]
pub struct InMemoryStore<C: Clock = SystemClock> {
    storage: DashMap<ReservationKey, HashMap<String, ReservedValue>>,
    clock: C,
}

impl InMemoryStore<SystemClock> {
    /// Creates a new in-memory store backed by the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryStore<C> {
    /// Creates a new in-memory store that judges expiry by `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            storage: DashMap::new(),
            clock,
        }
    }

    /// Number of rows held, expired and consumed ones included.
    pub fn len(&self) -> usize {
        self.storage.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_taken(values: &HashMap<String, ReservedValue>, value: &str, now: Timestamp) -> bool {
        values.get(value).is_some_and(|row| row.is_taken_at(now))
    }
}

#[async_trait]
impl<C: Clock> ReservationStore for InMemoryStore<C> {
    async fn count_used(&self, key: &ReservationKey) -> Result<u64> {
        let now = self.clock.now();
        let Some(values) = self.storage.get(key) else {
            return Ok(0);
        };
        Ok(values.values().filter(|row| row.is_taken_at(now)).count() as u64)
    }

    async fn sample_available(
        &self,
        key: &ReservationKey,
        candidates: &[String],
        limit: usize,
    ) -> Result<HashSet<String>> {
        let now = self.clock.now();
        let values = self.storage.get(key);
        Ok(candidates
            .iter()
            .filter(|candidate| {
                !values
                    .as_ref()
                    .is_some_and(|values| Self::is_taken(values, candidate, now))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn bulk_reserve(
        &self,
        key: &ReservationKey,
        values: &[String],
        expires_at: Timestamp,
    ) -> Result<Vec<String>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let mut reserved = self.storage.entry(key.clone()).or_default();
        let mut accepted = Vec::with_capacity(values.len());

        for value in values {
            // Expired reservations give their value back; taken ones win.
            if Self::is_taken(&reserved, value, now) {
                continue;
            }
            reserved.insert(
                value.clone(),
                ReservedValue {
                    key: key.clone(),
                    value: value.clone(),
                    expires_at,
                    created_at: now,
                    used_at: None,
                },
            );
            accepted.push(value.clone());
        }

        Ok(accepted)
    }

    async fn is_reserved(&self, key: &ReservationKey, value: &str) -> Result<bool> {
        let now = self.clock.now();
        Ok(self
            .storage
            .get(key)
            .is_some_and(|values| values.get(value).is_some_and(|row| row.is_active_at(now))))
    }

    async fn consume(&self, key: &ReservationKey, value: &str) -> Result<bool> {
        let now = self.clock.now();
        let Some(mut values) = self.storage.get_mut(key) else {
            return Ok(false);
        };
        match values.get_mut(value) {
            Some(row) if row.is_active_at(now) => {
                row.used_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove_expired(&self) -> Result<u64> {
        let now = self.clock.now();
        let mut removed = 0u64;

        for mut entry in self.storage.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|_, row| row.is_taken_at(now));
            removed += (before - entry.value().len()) as u64;
        }
        self.storage.retain(|_, values| !values.is_empty());

        Ok(removed)
    }
}

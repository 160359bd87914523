use crate::error::Result;
use crate::pattern::Owner;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{self, Display};

/// Identifies one value space: the owner of a pattern plus the pattern's signature.
///
/// Two reservations under the same key never share a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReservationKey {
    pub owner: Owner,
    pub signature: String,
}

impl ReservationKey {
    pub fn new(owner: Owner, signature: impl Into<String>) -> Self {
        Self {
            owner,
            signature: signature.into(),
        }
    }
}

impl Display for ReservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.signature)
    }
}

/// A persisted claim on a value.
///
/// A consumed row stays behind with `used_at` set. It no longer counts as a
/// reservation but keeps its value out of every future draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedValue {
    pub key: ReservationKey,
    pub value: String,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
    pub used_at: Option<Timestamp>,
}

impl ReservedValue {
    /// Reserved and not yet consumed, strictly before its expiry.
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.used_at.is_none() && now < self.expires_at
    }

    /// Whether the value may not be handed out again: either it is still
    /// reserved, or it has been consumed.
    pub fn is_taken_at(&self, now: Timestamp) -> bool {
        self.used_at.is_some() || now < self.expires_at
    }
}

/// The uniqueness arbiter shared by every caller.
///
/// Implementations must make [`ReservationStore::bulk_reserve`] atomic per
/// value: when two callers insert the same value under the same key, exactly
/// one of them sees it accepted.
#[async_trait]
pub trait ReservationStore: Send + Sync + 'static {
    /// Number of taken values under a key: active reservations plus
    /// consumed values.
    async fn count_used(&self, key: &ReservationKey) -> Result<u64>;

    /// Returns the candidates that are not taken under `key`, at most
    /// `limit` of them.
    async fn sample_available(
        &self,
        key: &ReservationKey,
        candidates: &[String],
        limit: usize,
    ) -> Result<HashSet<String>>;

    /// Inserts every value as a new reservation. Taken values are dropped;
    /// the accepted values are returned in input order.
    async fn bulk_reserve(
        &self,
        key: &ReservationKey,
        values: &[String],
        expires_at: Timestamp,
    ) -> Result<Vec<String>>;

    /// Whether `value` is actively reserved under `key`.
    async fn is_reserved(&self, key: &ReservationKey, value: &str) -> Result<bool>;

    /// Marks the matching active reservation as used.
    /// Returns `true` if a reservation was consumed.
    async fn consume(&self, key: &ReservationKey, value: &str) -> Result<bool>;

    /// Purges expired reservations that were never consumed, across every
    /// key. Consumed rows are kept. Returns how many rows were removed and
    /// is safe to call repeatedly.
    async fn remove_expired(&self) -> Result<u64>;
}

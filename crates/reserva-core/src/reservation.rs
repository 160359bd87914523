use crate::error::ReservationError;
use crate::pattern::Pattern;
use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use std::collections::HashMap;

type Result<T> = std::result::Result<T, ReservationError>;

/// Caller-supplied context for contextual segments, e.g. `ORG_UNIT_CODE -> OSLO`.
pub type Variables = HashMap<String, String>;

/// How long reserved values stay claimed before they may be handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationPolicy {
    /// Reservations expire after a duration from now.
    AfterDuration(SignedDuration),
    /// Reservations expire at a specific timestamp.
    AtTimestamp(Timestamp),
}

impl ExpirationPolicy {
    /// Reservations live for 60 days unless told otherwise.
    pub const DEFAULT_TTL: SignedDuration = SignedDuration::from_hours(60 * 24);

    /// Resolves the policy against `now`. The result must lie in the future.
    pub fn expires_at(&self, now: Timestamp) -> Result<Timestamp> {
        let expires_at = match *self {
            ExpirationPolicy::AfterDuration(duration) => now.checked_add(duration).map_err(|e| {
                ReservationError::InvalidRequest(format!("invalid expiration duration: {e}"))
            })?,
            ExpirationPolicy::AtTimestamp(timestamp) => timestamp,
        };
        if expires_at <= now {
            return Err(ReservationError::InvalidRequest(format!(
                "expiration {expires_at} is not after {now}"
            )));
        }
        Ok(expires_at)
    }
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self::AfterDuration(Self::DEFAULT_TTL)
    }
}

/// A request for `count` previously unused values of a pattern.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub pattern: Pattern,
    pub count: usize,
    pub variables: Variables,
    pub expiration: ExpirationPolicy,
}

impl GenerationRequest {
    /// A request with no variables and the default expiration.
    pub fn new(pattern: Pattern, count: usize) -> Self {
        Self {
            pattern,
            count,
            variables: Variables::new(),
            expiration: ExpirationPolicy::default(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_expiration(mut self, expiration: ExpirationPolicy) -> Self {
        self.expiration = expiration;
        self
    }
}

/// The operations offered to callers above the reservation engine.
#[async_trait]
pub trait Reserver: Send + Sync + 'static {
    /// Reserves exactly `request.count` values that no other caller holds.
    /// Either every value is returned or none is.
    async fn reserve(&self, request: GenerationRequest) -> Result<Vec<String>>;

    /// Marks a reserved value as used. Returns `false` if nothing was reserved.
    async fn consume(&self, pattern: &Pattern, value: &str) -> Result<bool>;

    /// Whether `value` is currently reserved under its pattern.
    async fn is_reserved(&self, pattern: &Pattern, value: &str) -> Result<bool>;

    /// Purges expired reservations. Returns the number removed.
    async fn cleanup(&self) -> Result<u64>;
}

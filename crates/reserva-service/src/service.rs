use async_trait::async_trait;
use jiff::Timestamp;
use reserva_core::{
    Clock, GenerationRequest, Pattern, ReservationError, ReservationStore, Reserver, SystemClock,
};
use reserva_generator::{composer, CandidateSource, GenerationSettings, ResolvedPattern};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, ReservationError>;

/// A concrete implementation of the `Reserver` trait.
///
/// This service drives the generators against a `ReservationStore` to:
/// - Reject requests that cannot fit in the remaining value space
/// - Produce candidates and keep the ones the store reports as free
/// - Claim them with a bulk insert, retrying with further candidates for
///   any value a concurrent caller claimed first
///
/// The service keeps no state between calls. Uniqueness rests entirely on
/// the store's insert.
#[derive(Debug, Clone)]
pub struct ReservationService<S, C = SystemClock> {
    store: Arc<S>,
    clock: C,
    settings: GenerationSettings,
}

impl<S: ReservationStore> ReservationService<S, SystemClock> {
    /// Creates a new `ReservationService` with default generation settings.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: ReservationStore, C: Clock> ReservationService<S, C> {
    /// Creates a new `ReservationService` reading time from `clock`.
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store: Arc::new(store),
            clock,
            settings: GenerationSettings::default(),
        }
    }

    /// Replaces the generation settings.
    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Draws candidates and claims them until `count` values are held or
    /// the candidate source runs dry.
    ///
    /// Returns every value this call managed to claim, which may be fewer
    /// than `count`.
    async fn claim(
        &self,
        pattern: &ResolvedPattern,
        count: usize,
        expires_at: Timestamp,
    ) -> Result<Vec<String>> {
        let key = pattern.key();
        let mut source = CandidateSource::new(pattern, count, &self.settings);
        let mut pending: VecDeque<String> = VecDeque::new();
        let mut claimed = Vec::with_capacity(count);
        let mut round = 0usize;

        while claimed.len() < count {
            if pending.is_empty() {
                let Some(batch) = source.next_batch() else {
                    break;
                };
                round += 1;
                if batch.is_empty() {
                    continue;
                }
                let available = self
                    .store
                    .sample_available(key, &batch, batch.len())
                    .await?;
                pending.extend(
                    batch
                        .into_iter()
                        .filter(|candidate| available.contains(candidate)),
                );
                debug!(key = %key, round, available = pending.len(), "drew candidates");
                continue;
            }

            let take = (count - claimed.len()).min(pending.len());
            let attempt: Vec<String> = pending.drain(..take).collect();
            let accepted = self.store.bulk_reserve(key, &attempt, expires_at).await?;
            if accepted.len() < attempt.len() {
                debug!(
                    key = %key,
                    lost = attempt.len() - accepted.len(),
                    "candidates claimed by a concurrent caller"
                );
            }
            claimed.extend(accepted);
        }

        Ok(claimed)
    }
}

#[async_trait]
impl<S: ReservationStore, C: Clock> Reserver for ReservationService<S, C> {
    async fn reserve(&self, request: GenerationRequest) -> Result<Vec<String>> {
        let GenerationRequest {
            pattern,
            count,
            variables,
            expiration,
        } = request;

        if count == 0 {
            return Err(ReservationError::InvalidRequest(
                "count must be at least 1".to_string(),
            ));
        }

        let now = self.clock.now();
        let expires_at = expiration.expires_at(now)?;
        let resolved = composer::resolve(&pattern, &variables, now)?;
        let key = resolved.key();

        // Admission: refuse outright when the space cannot fit the request.
        let capacity = resolved.capacity();
        let used = self.store.count_used(key).await?;
        let remaining = capacity.saturating_sub(u128::from(used));
        if remaining < count as u128 {
            warn!(key = %key, requested = count, remaining = %remaining, "value space exhausted");
            return Err(ReservationError::Exhausted {
                requested: count,
                available: remaining as usize,
            });
        }

        let claimed = self.claim(&resolved, count, expires_at).await?;
        if claimed.len() < count {
            // Claimed values stay reserved until they expire.
            warn!(
                key = %key,
                requested = count,
                stranded = claimed.len(),
                "could not find enough free values"
            );
            return Err(ReservationError::Exhausted {
                requested: count,
                available: claimed.len(),
            });
        }

        info!(key = %key, count, expires_at = %expires_at, "reserved values");
        Ok(claimed)
    }

    async fn consume(&self, pattern: &Pattern, value: &str) -> Result<bool> {
        let Some(key) = composer::key_for_value(pattern, value) else {
            return Ok(false);
        };
        let consumed = self.store.consume(&key, value).await?;
        debug!(key = %key, value, consumed, "consume reserved value");
        Ok(consumed)
    }

    async fn is_reserved(&self, pattern: &Pattern, value: &str) -> Result<bool> {
        let Some(key) = composer::key_for_value(pattern, value) else {
            return Ok(false);
        };
        Ok(self.store.is_reserved(&key, value).await?)
    }

    async fn cleanup(&self) -> Result<u64> {
        let removed = self.store.remove_expired().await?;
        info!(removed, "removed expired reservations");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;
    use reserva_core::{
        ContextualFormat, ExpirationPolicy, ManualClock, Owner, ReservationKey, Segment,
        StorageError,
    };
    use reserva_storage::InMemoryStore;
    use std::collections::HashSet;

    type TestService = ReservationService<InMemoryStore<ManualClock>, ManualClock>;

    fn test_service() -> (TestService, ManualClock) {
        let clock = ManualClock::new("2026-01-01T00:00:00Z".parse().unwrap());
        let store = InMemoryStore::with_clock(clock.clone());
        let settings = GenerationSettings::builder().seed(17).build();
        let service = ReservationService::with_clock(store, clock.clone()).with_settings(settings);
        (service, clock)
    }

    fn pattern(segments: Vec<Segment>) -> Pattern {
        Pattern::new(Owner::new("ATTRIBUTE", "attr-1"), segments)
    }

    fn sequential(format: &str) -> Segment {
        Segment::Sequential(format.parse().unwrap())
    }

    fn random(format: &str) -> Segment {
        Segment::Random(format.parse().unwrap())
    }

    fn org_unit(shape: &str) -> Segment {
        Segment::Contextual(ContextualFormat::variable("ORG_UNIT_CODE", shape).unwrap())
    }

    fn distinct(values: &[String]) -> usize {
        values.iter().collect::<HashSet<_>>().len()
    }

    #[tokio::test]
    async fn literal_pattern_yields_its_text_once() {
        let (service, _) = test_service();
        let p = pattern(vec![Segment::literal("CONSTANT")]);

        let values = service
            .reserve(GenerationRequest::new(p.clone(), 1))
            .await
            .unwrap();
        assert_eq!(values, vec!["CONSTANT".to_string()]);

        let err = service
            .reserve(GenerationRequest::new(p, 1))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ReservationError::Exhausted {
                requested: 1,
                available: 0
            }
        );
    }

    #[tokio::test]
    async fn literal_pattern_cannot_yield_two_values() {
        let (service, _) = test_service();
        let p = pattern(vec![Segment::literal("CONSTANT")]);

        let err = service
            .reserve(GenerationRequest::new(p, 2))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ReservationError::Exhausted {
                requested: 2,
                available: 1
            }
        );
    }

    #[tokio::test]
    async fn sequential_pattern_fills_its_whole_space() {
        let (service, _) = test_service();
        let p = pattern(vec![sequential("##")]);

        let values = service
            .reserve(GenerationRequest::new(p, 100))
            .await
            .unwrap();

        let expected: Vec<String> = (0..100).map(|i| format!("{i:02}")).collect();
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn oversized_request_fails_before_generation() {
        let (service, _) = test_service();
        let p = pattern(vec![sequential("##")]);

        let err = service
            .reserve(GenerationRequest::new(p, 101))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ReservationError::Exhausted {
                requested: 101,
                available: 100
            }
        );
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn sequential_pattern_continues_after_used_values() {
        let (service, _) = test_service();
        let p = pattern(vec![Segment::literal("N-"), sequential("###")]);

        let first = service
            .reserve(GenerationRequest::new(p.clone(), 3))
            .await
            .unwrap();
        let second = service
            .reserve(GenerationRequest::new(p, 2))
            .await
            .unwrap();

        assert_eq!(first, vec!["N-000", "N-001", "N-002"]);
        assert_eq!(second, vec!["N-003", "N-004"]);
    }

    #[tokio::test]
    async fn capacity_is_honoured() {
        let (service, _) = test_service();
        let p = pattern(vec![sequential("#")]);

        service
            .reserve(GenerationRequest::new(p.clone(), 7))
            .await
            .unwrap();

        let err = service
            .reserve(GenerationRequest::new(p.clone(), 4))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ReservationError::Exhausted {
                requested: 4,
                available: 3
            }
        );

        let rest = service
            .reserve(GenerationRequest::new(p, 3))
            .await
            .unwrap();
        assert_eq!(rest, vec!["7", "8", "9"]);
    }

    #[tokio::test]
    async fn random_values_match_their_format() {
        let (service, _) = test_service();
        let p = pattern(vec![random("xxx###")]);

        let values = service
            .reserve(GenerationRequest::new(p, 200))
            .await
            .unwrap();

        assert_eq!(values.len(), 200);
        assert_eq!(distinct(&values), 200);
        for value in &values {
            assert_eq!(value.len(), 6);
            assert!(value[..3].chars().all(|c| c.is_ascii_lowercase()), "{value}");
            assert!(value[3..].chars().all(|c| c.is_ascii_digit()), "{value}");
        }
    }

    #[tokio::test]
    async fn small_random_space_finds_its_last_value() {
        let (service, _) = test_service();
        let p = pattern(vec![random("#")]);

        let most = service
            .reserve(GenerationRequest::new(p.clone(), 9))
            .await
            .unwrap();
        let last = service
            .reserve(GenerationRequest::new(p.clone(), 1))
            .await
            .unwrap();

        let all: HashSet<String> = most.into_iter().chain(last).collect();
        assert_eq!(all.len(), 10);

        let err = service
            .reserve(GenerationRequest::new(p, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::Exhausted { available: 0, .. }));
    }

    #[tokio::test]
    async fn mixed_pattern_composes_positionally() {
        let (service, _) = test_service();
        let p = pattern(vec![
            Segment::literal("ID-"),
            random("XX"),
            Segment::literal("-"),
            sequential("##"),
        ]);

        let values = service
            .reserve(GenerationRequest::new(p, 50))
            .await
            .unwrap();

        assert_eq!(distinct(&values), 50);
        for value in &values {
            let chars: Vec<char> = value.chars().collect();
            assert_eq!(chars.len(), 8);
            assert!(value.starts_with("ID-"));
            assert!(chars[3..5].iter().all(char::is_ascii_uppercase));
            assert_eq!(chars[5], '-');
            assert!(chars[6..].iter().all(char::is_ascii_digit));
        }
    }

    #[tokio::test]
    async fn contextual_segment_uses_the_variable() {
        let (service, _) = test_service();
        let p = pattern(vec![org_unit(".."), sequential("###")]);

        let oslo = service
            .reserve(GenerationRequest::new(p.clone(), 5).with_variable("ORG_UNIT_CODE", "OSLO"))
            .await
            .unwrap();
        assert!(oslo.iter().all(|value| value.starts_with("OS")));
        assert_eq!(oslo[0], "OS000");

        // Each context has its own counter.
        let bergen = service
            .reserve(GenerationRequest::new(p, 1).with_variable("ORG_UNIT_CODE", "BERGEN"))
            .await
            .unwrap();
        assert_eq!(bergen, vec!["BE000"]);
    }

    #[tokio::test]
    async fn missing_variable_fails_without_side_effects() {
        let (service, _) = test_service();
        let p = pattern(vec![org_unit(".."), sequential("###")]);

        let err = service
            .reserve(GenerationRequest::new(p, 1))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ReservationError::InvalidVariable("ORG_UNIT_CODE".to_string())
        );
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn zero_count_is_rejected() {
        let (service, _) = test_service();
        let p = pattern(vec![sequential("#")]);

        let err = service
            .reserve(GenerationRequest::new(p, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn consume_is_idempotent() {
        let (service, _) = test_service();
        let p = pattern(vec![org_unit(".."), Segment::literal("-"), sequential("##")]);

        let values = service
            .reserve(GenerationRequest::new(p.clone(), 1).with_variable("ORG_UNIT_CODE", "OSLO"))
            .await
            .unwrap();
        let value = &values[0];

        assert!(service.is_reserved(&p, value).await.unwrap());
        assert!(service.consume(&p, value).await.unwrap());
        assert!(!service.consume(&p, value).await.unwrap());
        assert!(!service.is_reserved(&p, value).await.unwrap());
    }

    #[tokio::test]
    async fn consume_of_foreign_value_is_false() {
        let (service, _) = test_service();
        let p = pattern(vec![sequential("##")]);

        assert!(!service.consume(&p, "123").await.unwrap());
        assert!(!service.consume(&p, "ab").await.unwrap());
        assert!(!service.is_reserved(&p, "12").await.unwrap());
    }

    #[tokio::test]
    async fn consumed_value_is_never_granted_again() {
        let (service, clock) = test_service();
        let p = pattern(vec![sequential("##")]);

        let first = service
            .reserve(GenerationRequest::new(p.clone(), 1))
            .await
            .unwrap();
        assert!(service.consume(&p, &first[0]).await.unwrap());

        let second = service
            .reserve(GenerationRequest::new(p.clone(), 1))
            .await
            .unwrap();
        assert_ne!(first, second);

        // Not after expiry and cleanup either.
        clock.advance(ExpirationPolicy::DEFAULT_TTL + SignedDuration::from_hours(1));
        service.cleanup().await.unwrap();
        let all = service
            .reserve(GenerationRequest::new(p, 99))
            .await
            .unwrap();
        assert!(!all.contains(&first[0]));
    }

    /// Counts the candidate probes a call makes.
    struct CountingStore<S> {
        inner: S,
        probes: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl<S: ReservationStore> ReservationStore for CountingStore<S> {
        async fn count_used(&self, key: &ReservationKey) -> reserva_core::error::Result<u64> {
            self.inner.count_used(key).await
        }

        async fn sample_available(
            &self,
            key: &ReservationKey,
            candidates: &[String],
            limit: usize,
        ) -> reserva_core::error::Result<HashSet<String>> {
            self.probes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.sample_available(key, candidates, limit).await
        }

        async fn bulk_reserve(
            &self,
            key: &ReservationKey,
            values: &[String],
            expires_at: Timestamp,
        ) -> reserva_core::error::Result<Vec<String>> {
            self.inner.bulk_reserve(key, values, expires_at).await
        }

        async fn is_reserved(
            &self,
            key: &ReservationKey,
            value: &str,
        ) -> reserva_core::error::Result<bool> {
            self.inner.is_reserved(key, value).await
        }

        async fn consume(
            &self,
            key: &ReservationKey,
            value: &str,
        ) -> reserva_core::error::Result<bool> {
            self.inner.consume(key, value).await
        }

        async fn remove_expired(&self) -> reserva_core::error::Result<u64> {
            self.inner.remove_expired().await
        }
    }

    #[tokio::test]
    async fn sampling_a_nearly_full_random_space_gives_up_within_budget() {
        let clock = ManualClock::new("2026-01-01T00:00:00Z".parse().unwrap());
        let inner = InMemoryStore::with_clock(clock.clone());
        let p = pattern(vec![random("xx")]);
        let key = composer::resolve(&p, &reserva_core::Variables::new(), clock.now())
            .unwrap()
            .key()
            .clone();

        // Leave 6 of the 676 values free.
        let letters = 'a'..='z';
        let taken: Vec<String> = letters
            .clone()
            .flat_map(|a| letters.clone().map(move |b| format!("{a}{b}")))
            .take(670)
            .collect();
        inner
            .bulk_reserve(&key, &taken, clock.now() + SignedDuration::from_hours(1))
            .await
            .unwrap();

        let settings = GenerationSettings::builder()
            .chunk_size(16)
            .random_rounds(2)
            .exhaustive_threshold(100)
            .seed(5)
            .build();
        let store = CountingStore {
            inner,
            probes: std::sync::atomic::AtomicUsize::new(0),
        };
        let service = ReservationService::with_clock(store, clock).with_settings(settings);

        let err = service
            .reserve(GenerationRequest::new(p, 5))
            .await
            .unwrap_err();

        let ReservationError::Exhausted {
            requested,
            available,
        } = err
        else {
            panic!("expected exhaustion, got {err:?}");
        };
        assert_eq!(requested, 5);
        assert!(available < 5);

        let probes = service
            .store()
            .probes
            .load(std::sync::atomic::Ordering::SeqCst);
        assert!(probes >= 1);
        assert!(probes <= settings.round_budget(5));
        assert_eq!(
            service.store().inner.count_used(&key).await.unwrap(),
            670 + available as u64
        );
    }

    /// Fails every call as an unreachable backend would.
    struct FailingStore {
        fail_reads: bool,
    }

    fn unavailable() -> StorageError {
        StorageError::Unavailable("connection refused".to_string())
    }

    #[async_trait]
    impl ReservationStore for FailingStore {
        async fn count_used(&self, _key: &ReservationKey) -> reserva_core::error::Result<u64> {
            if self.fail_reads {
                return Err(unavailable());
            }
            Ok(0)
        }

        async fn sample_available(
            &self,
            _key: &ReservationKey,
            candidates: &[String],
            limit: usize,
        ) -> reserva_core::error::Result<HashSet<String>> {
            if self.fail_reads {
                return Err(unavailable());
            }
            Ok(candidates.iter().take(limit).cloned().collect())
        }

        async fn bulk_reserve(
            &self,
            _key: &ReservationKey,
            _values: &[String],
            _expires_at: Timestamp,
        ) -> reserva_core::error::Result<Vec<String>> {
            Err(unavailable())
        }

        async fn is_reserved(
            &self,
            _key: &ReservationKey,
            _value: &str,
        ) -> reserva_core::error::Result<bool> {
            Err(unavailable())
        }

        async fn consume(
            &self,
            _key: &ReservationKey,
            _value: &str,
        ) -> reserva_core::error::Result<bool> {
            Err(unavailable())
        }

        async fn remove_expired(&self) -> reserva_core::error::Result<u64> {
            Err(unavailable())
        }
    }

    #[tokio::test]
    async fn store_failures_surface_unchanged() {
        let expected = ReservationError::Storage(unavailable());
        let p = pattern(vec![sequential("##")]);

        for fail_reads in [true, false] {
            let service = ReservationService::new(FailingStore { fail_reads });
            let err = service
                .reserve(GenerationRequest::new(p.clone(), 3))
                .await
                .unwrap_err();
            assert_eq!(err, expected, "fail_reads = {fail_reads}");
        }

        let service = ReservationService::new(FailingStore { fail_reads: true });
        assert_eq!(service.consume(&p, "42").await.unwrap_err(), expected);
        assert_eq!(service.is_reserved(&p, "42").await.unwrap_err(), expected);
        assert_eq!(service.cleanup().await.unwrap_err(), expected);
    }

    #[tokio::test]
    async fn expired_values_are_reissued_and_cleaned_up() {
        let (service, clock) = test_service();
        let p = pattern(vec![sequential("#")]);
        let short = ExpirationPolicy::AfterDuration(SignedDuration::from_hours(1));

        service
            .reserve(GenerationRequest::new(p.clone(), 10).with_expiration(short))
            .await
            .unwrap();
        assert!(service
            .reserve(GenerationRequest::new(p.clone(), 1))
            .await
            .is_err());

        clock.advance(SignedDuration::from_hours(2));
        assert_eq!(service.cleanup().await.unwrap(), 10);
        assert_eq!(service.cleanup().await.unwrap(), 0);

        let again = service
            .reserve(GenerationRequest::new(p, 10))
            .await
            .unwrap();
        assert_eq!(again.len(), 10);
    }

    #[tokio::test]
    async fn past_expiration_is_rejected() {
        let (service, clock) = test_service();
        let p = pattern(vec![sequential("#")]);
        let past = ExpirationPolicy::AtTimestamp(clock.now() - SignedDuration::from_secs(1));

        let err = service
            .reserve(GenerationRequest::new(p, 1).with_expiration(past))
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::InvalidRequest(_)));
    }

    /// Reports nothing as used or taken, as a stale replica would. Only the
    /// insert sees the truth.
    struct BlindStore<S>(S);

    #[async_trait]
    impl<S: ReservationStore> ReservationStore for BlindStore<S> {
        async fn count_used(&self, _key: &ReservationKey) -> reserva_core::error::Result<u64> {
            Ok(0)
        }

        async fn sample_available(
            &self,
            _key: &ReservationKey,
            candidates: &[String],
            limit: usize,
        ) -> reserva_core::error::Result<HashSet<String>> {
            Ok(candidates.iter().take(limit).cloned().collect())
        }

        async fn bulk_reserve(
            &self,
            key: &ReservationKey,
            values: &[String],
            expires_at: Timestamp,
        ) -> reserva_core::error::Result<Vec<String>> {
            self.0.bulk_reserve(key, values, expires_at).await
        }

        async fn is_reserved(
            &self,
            key: &ReservationKey,
            value: &str,
        ) -> reserva_core::error::Result<bool> {
            self.0.is_reserved(key, value).await
        }

        async fn consume(
            &self,
            key: &ReservationKey,
            value: &str,
        ) -> reserva_core::error::Result<bool> {
            self.0.consume(key, value).await
        }

        async fn remove_expired(&self) -> reserva_core::error::Result<u64> {
            self.0.remove_expired().await
        }
    }

    async fn blind_service_with_taken(
        taken: &[&str],
    ) -> ReservationService<BlindStore<InMemoryStore<ManualClock>>, ManualClock> {
        let clock = ManualClock::new("2026-01-01T00:00:00Z".parse().unwrap());
        let inner = InMemoryStore::with_clock(clock.clone());
        let key = ReservationKey::new(Owner::new("ATTRIBUTE", "attr-1"), "SEQUENTIAL(#)");
        let taken: Vec<String> = taken.iter().map(|s| s.to_string()).collect();
        inner
            .bulk_reserve(&key, &taken, clock.now() + SignedDuration::from_hours(1))
            .await
            .unwrap();
        ReservationService::with_clock(BlindStore(inner), clock)
    }

    #[tokio::test]
    async fn lost_insert_races_are_retried_with_other_candidates() {
        let service = blind_service_with_taken(&["0", "1", "2", "3", "4"]).await;
        let p = pattern(vec![sequential("#")]);

        let values = service
            .reserve(GenerationRequest::new(p, 5))
            .await
            .unwrap();
        assert_eq!(values, vec!["5", "6", "7", "8", "9"]);
    }

    #[tokio::test]
    async fn values_claimed_by_a_failed_call_stay_reserved() {
        let service =
            blind_service_with_taken(&["0", "1", "2", "3", "4", "5", "6", "7"]).await;
        let p = pattern(vec![sequential("#")]);

        let err = service
            .reserve(GenerationRequest::new(p, 5))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ReservationError::Exhausted {
                requested: 5,
                available: 2
            }
        );

        let key = ReservationKey::new(Owner::new("ATTRIBUTE", "attr-1"), "SEQUENTIAL(#)");
        assert_eq!(service.store().0.count_used(&key).await.unwrap(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_never_share_a_value() {
        let (service, _) = test_service();
        let service = Arc::new(service);
        let p = pattern(vec![sequential("##")]);
        let mut handles = vec![];

        for _ in 0..100 {
            let service = Arc::clone(&service);
            let p = p.clone();
            handles.push(tokio::spawn(async move {
                service.reserve(GenerationRequest::new(p, 1)).await
            }));
        }

        let mut values = Vec::new();
        for handle in handles {
            values.extend(handle.await.unwrap().unwrap());
        }
        assert_eq!(values.len(), 100);
        assert_eq!(distinct(&values), 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_random_callers_never_share_a_value() {
        let clock = ManualClock::new("2026-01-01T00:00:00Z".parse().unwrap());
        let store = InMemoryStore::with_clock(clock.clone());
        // Every caller draws the same seeded candidates, forcing collisions.
        let settings = GenerationSettings::builder()
            .chunk_size(64)
            .exhaustive_threshold(0)
            .seed(99)
            .build();
        let service = Arc::new(ReservationService::with_clock(store, clock).with_settings(settings));
        let p = pattern(vec![random("xx")]);
        let mut handles = vec![];

        for _ in 0..32 {
            let service = Arc::clone(&service);
            let p = p.clone();
            handles.push(tokio::spawn(async move {
                service.reserve(GenerationRequest::new(p, 2)).await
            }));
        }

        let mut values = Vec::new();
        for handle in handles {
            values.extend(handle.await.unwrap().unwrap());
        }
        assert_eq!(values.len(), 64);
        assert_eq!(distinct(&values), 64);
    }
}

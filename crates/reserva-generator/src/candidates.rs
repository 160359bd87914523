use crate::composer::ResolvedPattern;
use crate::sequential::SequentialCursor;
use crate::settings::GenerationSettings;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;

fn seeded_rng(settings: &GenerationSettings) -> StdRng {
    match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

#[derive(Debug)]
enum Strategy {
    /// A pattern without slots has exactly one value.
    Constant { pending: Option<String> },
    /// Sequential-only patterns walk their space in ascending order.
    Ascending { cursor: SequentialCursor },
    /// Small random-containing spaces, enumerated in shuffled order.
    Shuffled { order: Vec<u128>, position: usize },
    /// Large random-containing spaces, sampled in bounded rounds.
    Sampled {
        rng: StdRng,
        seen: HashSet<String>,
        rounds_left: usize,
    },
}

/// Produces batches of distinct candidate values for one reservation call.
///
/// No candidate is produced twice by the same source. Whether a candidate is
/// actually free is for the store to decide. Every strategy is finite:
/// `next_batch` eventually returns `None`.
#[derive(Debug)]
pub struct CandidateSource<'a> {
    pattern: &'a ResolvedPattern,
    chunk_size: usize,
    strategy: Strategy,
}

impl<'a> CandidateSource<'a> {
    pub fn new(pattern: &'a ResolvedPattern, count: usize, settings: &GenerationSettings) -> Self {
        let capacity = pattern.capacity();

        let strategy = if !pattern.has_slots() {
            Strategy::Constant {
                pending: Some(pattern.nth(0)),
            }
        } else if !pattern.has_random() {
            Strategy::Ascending {
                cursor: SequentialCursor::new(capacity),
            }
        } else if capacity <= settings.exhaustive_threshold {
            let mut order: Vec<u128> = (0..capacity).collect();
            order.shuffle(&mut seeded_rng(settings));
            Strategy::Shuffled { order, position: 0 }
        } else {
            Strategy::Sampled {
                rng: seeded_rng(settings),
                seen: HashSet::new(),
                rounds_left: settings.round_budget(count),
            }
        };

        Self {
            pattern,
            chunk_size: settings.chunk_size.max(1),
            strategy,
        }
    }

    /// Returns the next batch of unseen candidates, or `None` once the
    /// strategy has nothing left to try. A batch may be empty when a random
    /// round only produced duplicates.
    pub fn next_batch(&mut self) -> Option<Vec<String>> {
        let pattern = self.pattern;
        let chunk = self.chunk_size;
        match &mut self.strategy {
            Strategy::Constant { pending } => pending.take().map(|value| vec![value]),
            Strategy::Ascending { cursor } => cursor
                .next_range(chunk)
                .map(|range| range.map(|ordinal| pattern.nth(ordinal)).collect()),
            Strategy::Shuffled { order, position } => {
                if *position >= order.len() {
                    return None;
                }
                let end = (*position + chunk).min(order.len());
                let batch = order[*position..end]
                    .iter()
                    .map(|ordinal| pattern.nth(*ordinal))
                    .collect();
                *position = end;
                Some(batch)
            }
            Strategy::Sampled {
                rng,
                seen,
                rounds_left,
            } => {
                if *rounds_left == 0 {
                    return None;
                }
                *rounds_left -= 1;
                let batch = (0..chunk)
                    .map(|_| pattern.sample(&mut *rng))
                    .filter(|candidate| seen.insert(candidate.clone()))
                    .collect();
                Some(batch)
            }
        }
    }
}

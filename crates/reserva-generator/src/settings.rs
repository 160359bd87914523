use typed_builder::TypedBuilder;

/// Bounds on how much work a single reservation call may do.
///
/// Random generation is chunked: each round draws `chunk_size` candidates,
/// and a call needing `n` values gets `random_rounds * ceil(n / chunk_size)`
/// rounds before it gives up. Random-containing patterns whose capacity is at
/// most `exhaustive_threshold` are instead enumerated in full, in shuffled
/// order, so the last free value of a small space is always found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct GenerationSettings {
    #[builder(default = 1_000)]
    pub chunk_size: usize,
    #[builder(default = 10)]
    pub random_rounds: usize,
    #[builder(default = 10_000)]
    pub exhaustive_threshold: u128,
    /// Fixes the random source, for reproducible runs.
    #[builder(default, setter(strip_option))]
    pub seed: Option<u64>,
}

impl GenerationSettings {
    /// Number of random rounds allowed for a request of `count` values.
    pub fn round_budget(&self, count: usize) -> usize {
        let chunk = self.chunk_size.max(1);
        self.random_rounds.saturating_mul(count.div_ceil(chunk).max(1))
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

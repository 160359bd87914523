//! Segment value generators and the candidate composer.
//!
//! Everything here is pure: generators and composers never touch the
//! reservation store. Deciding which candidates are free is the store's job.

pub mod candidates;
pub mod composer;
pub mod contextual;
pub mod random;
pub mod sequential;
pub mod settings;

pub use candidates::CandidateSource;
pub use composer::{capacity, key_for_value, resolve, signature, ResolvedPattern};
pub use settings::GenerationSettings;

use rand::Rng;
use reserva_core::{RandomFormat, SequentialFormat};

/// A generated position of a resolved pattern.
///
/// Contextual segments are resolved to fixed text before generation starts,
/// so only sequential and random segments remain as slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Sequential(SequentialFormat),
    Random(RandomFormat),
}

impl Slot {
    /// Number of distinct fragments this slot can produce.
    pub fn value_space(&self) -> u128 {
        match self {
            Slot::Sequential(format) => format.value_space(),
            Slot::Random(format) => format.value_space(),
        }
    }

    /// The `ordinal`-th fragment in ascending order.
    pub fn nth(&self, ordinal: u128) -> String {
        match self {
            Slot::Sequential(format) => sequential::format_counter(format, ordinal),
            Slot::Random(format) => random::nth(format, ordinal),
        }
    }

    /// Draws a fragment uniformly from the slot's value space.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> String {
        match self {
            Slot::Sequential(format) => {
                sequential::format_counter(format, rng.random_range(0..format.value_space()))
            }
            Slot::Random(format) => random::sample(format, rng),
        }
    }
}

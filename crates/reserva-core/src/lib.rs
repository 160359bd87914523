//! Core types and traits for the Reserva value reservation engine.
//!
//! This crate holds the pattern model, the reservation store contract and
//! the caller-facing [`Reserver`] trait shared by the generator, storage and
//! service crates.

pub mod clock;
pub mod error;
pub mod format;
pub mod pattern;
pub mod reservation;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{FormatError, ReservationError, StorageError};
pub use format::{Anchor, CharClass, ContextSource, ContextualFormat, RandomFormat, SequentialFormat};
pub use pattern::{Owner, Pattern, Segment};
pub use reservation::{ExpirationPolicy, GenerationRequest, Reserver, Variables};
pub use store::{ReservationKey, ReservationStore, ReservedValue};

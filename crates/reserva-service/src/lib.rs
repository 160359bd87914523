//! Reservation service implementation.
//!
//! This crate ties the generators to a reservation store and exposes the
//! [`Reserver`] operations. Core types are re-exported from `reserva_core`.

pub mod service;

pub use reserva_core::{
    ExpirationPolicy, GenerationRequest, Owner, Pattern, ReservationError, Reserver, Segment,
};
pub use reserva_generator::GenerationSettings;
pub use service::ReservationService;

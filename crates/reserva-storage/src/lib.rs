//! Reservation store implementations.

pub mod memory;
pub mod mysql;

pub use memory::InMemoryStore;
pub use mysql::MySqlStore;
pub use reserva_core::{ReservationStore, StorageError};

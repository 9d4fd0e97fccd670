//! Record stores for bookings, the route pool and assignments.
//!
//! Each store is atomic only within itself; workflows spanning stores are
//! sagas built on top of these traits.

pub mod error;
pub mod fault;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use fault::FaultInjector;
pub use memory::{InMemoryAssignmentStore, InMemoryBookingStore, InMemoryRoutePool};
pub use postgres::PostgresStore;
pub use store::{AssignmentStore, BookingStore, RoutePool};

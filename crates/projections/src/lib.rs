//! Read-side views over the booking records.
//!
//! - [`group_pending`] folds pending bookings into a per-route [`GroupView`]

pub mod grouping;

pub use grouping::{GroupView, RouteGroup, group_pending};

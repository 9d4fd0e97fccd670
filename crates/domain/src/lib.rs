//! Domain records for the ride booking system.
//!
//! This crate provides the record shapes the assignment workflow operates on:
//! - [`Booking`] with its status rules
//! - [`RoutePoolEntry`] and [`Assignment`], the two shapes of one route identity
//! - [`DriverProfile`] / [`VehicleProfile`] resolved from the directories

pub mod assignment;
pub mod booking;
pub mod directory;
pub mod error;
pub mod route;

pub use assignment::{AssignRequest, Assignment, AssignmentStatus, Passenger};
pub use booking::{Booking, BookingStatus};
pub use directory::{DriverProfile, VehicleProfile};
pub use error::DomainError;
pub use route::{Itinerary, RoutePoolEntry, RouteStatus};

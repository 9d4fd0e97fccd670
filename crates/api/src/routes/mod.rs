//! HTTP handlers grouped by resource.

pub mod assignments;
pub mod system;

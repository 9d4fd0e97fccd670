//! Per-route assignment state machine.

use domain::{Assignment, RoutePoolEntry};
use serde::{Deserialize, Serialize};

/// The assignment state of one route identity.
///
/// State transitions:
/// ```text
/// Unassigned ──► Assigning ──► Assigned ──► Unassigning ──► Unassigned
/// ```
///
/// The state is derived from which records exist. When both the pool entry
/// and the assignment exist a saga was interrupted; the pool entry's
/// `updated_at` tells which one, since a restored entry is always stamped
/// after the assignment it replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteState {
    Unassigned,
    Assigning,
    Assigned,
    Unassigning,
}

impl RouteState {
    /// Derives the state from the route's records. Returns `None` if neither exists.
    pub fn derive(entry: Option<&RoutePoolEntry>, assignment: Option<&Assignment>) -> Option<Self> {
        match (entry, assignment) {
            (None, None) => None,
            (Some(_), None) => Some(RouteState::Unassigned),
            (None, Some(_)) => Some(RouteState::Assigned),
            (Some(entry), Some(assignment)) => {
                if entry.updated_at > assignment.assigned_at {
                    Some(RouteState::Unassigning)
                } else {
                    Some(RouteState::Assigning)
                }
            }
        }
    }

    /// Returns true if an assign saga may start or resume from this state.
    pub fn can_assign(&self) -> bool {
        matches!(self, RouteState::Unassigned | RouteState::Assigning)
    }

    /// Returns true if an unassign saga may start or resume from this state.
    pub fn can_unassign(&self) -> bool {
        matches!(self, RouteState::Assigned | RouteState::Unassigning)
    }

    /// Returns true if a saga was interrupted and has steps left to run.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RouteState::Assigning | RouteState::Unassigning)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteState::Unassigned => "unassigned",
            RouteState::Assigning => "assigning",
            RouteState::Assigned => "assigned",
            RouteState::Unassigning => "unassigning",
        }
    }
}

impl std::fmt::Display for RouteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

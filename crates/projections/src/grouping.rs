//! Pending bookings grouped by route.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::RouteId;
use domain::Booking;
use serde::Serialize;

/// Aggregate of the pending bookings on one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteGroup {
    pub route_id: RouteId,
    pub count: usize,
    /// Ordered by pickup time, then booking id.
    pub bookings: Vec<Booking>,
    pub earliest_pickup: DateTime<Utc>,
    pub latest_pickup: DateTime<Utc>,
    /// Taken from the earliest pickup.
    pub origin: String,
    pub destination: String,
}

/// Pending bookings keyed by route, iterated in route id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GroupView {
    groups: BTreeMap<RouteId, RouteGroup>,
}

impl GroupView {
    pub fn get(&self, route_id: &RouteId) -> Option<&RouteGroup> {
        self.groups.get(route_id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterates groups in route id order.
    pub fn iter(&self) -> impl Iterator<Item = &RouteGroup> {
        self.groups.values()
    }

    /// Returns groups for display: earliest pickup first, ties broken by route id.
    pub fn by_earliest_pickup(&self) -> Vec<&RouteGroup> {
        let mut groups: Vec<_> = self.groups.values().collect();
        groups.sort_by(|a, b| {
            a.earliest_pickup
                .cmp(&b.earliest_pickup)
                .then_with(|| a.route_id.cmp(&b.route_id))
        });
        groups
    }

    /// Total number of pending bookings across all routes.
    pub fn booking_count(&self) -> usize {
        self.groups.values().map(|g| g.count).sum()
    }
}

impl IntoIterator for GroupView {
    type Item = (RouteId, RouteGroup);
    type IntoIter = std::collections::btree_map::IntoIter<RouteId, RouteGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// Groups pending bookings by route.
///
/// Bookings in any other status are ignored. The result depends only on
/// the input set, not on its order.
pub fn group_pending<'a, I>(bookings: I) -> GroupView
where
    I: IntoIterator<Item = &'a Booking>,
{
    let mut by_route: BTreeMap<RouteId, Vec<Booking>> = BTreeMap::new();
    for booking in bookings.into_iter().filter(|b| b.is_pending()) {
        by_route
            .entry(booking.route_id.clone())
            .or_default()
            .push(booking.clone());
    }

    let groups = by_route
        .into_iter()
        .filter_map(|(route_id, mut bookings)| {
            bookings.sort_by(|a, b| {
                a.pickup_time
                    .cmp(&b.pickup_time)
                    .then_with(|| a.id.cmp(&b.id))
            });
            let first = bookings.first()?;
            let last = bookings.last()?;
            let group = RouteGroup {
                route_id: route_id.clone(),
                count: bookings.len(),
                earliest_pickup: first.pickup_time,
                latest_pickup: last.pickup_time,
                origin: first.origin.clone(),
                destination: first.destination.clone(),
                bookings,
            };
            Some((route_id, group))
        })
        .collect();

    GroupView { groups }
}

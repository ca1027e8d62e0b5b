//! Narrow interfaces over the external trip and breadcrumb stores, plus
//! in-memory implementations used by tests and embedders.
//!
//! The only concurrency-control mechanism is the compare-and-swap update on
//! a trip's status: a writer that observed a stale status loses the race and
//! gets `Conflict` instead of overwriting.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::error::TransitionError;
use crate::trip::{Breadcrumb, ProviderId, Trip, TripId, TripStatus};

pub trait TripStore: Send + Sync {
    fn get(&self, id: TripId) -> Result<Trip, TransitionError>;

    fn insert(&self, trip: Trip);

    /// Apply `mutate` and persist the result only when the stored status
    /// still equals `expected`; otherwise fail with `Conflict` carrying the
    /// actual status. Returns the persisted trip.
    fn update_if_status(
        &self,
        id: TripId,
        expected: TripStatus,
        mutate: &dyn Fn(&mut Trip),
    ) -> Result<Trip, TransitionError>;

    /// The provider's non-terminal trip, if any. At most one exists.
    fn active_trip_for_provider(&self, provider: ProviderId) -> Option<TripId>;
}

pub trait BreadcrumbStore: Send + Sync {
    /// Append-only; safe for concurrent writers within the same trip.
    fn append(&self, breadcrumb: Breadcrumb);

    /// All breadcrumbs for a trip ordered by capture time, regardless of
    /// arrival order.
    fn for_trip(&self, trip_id: TripId) -> Vec<Breadcrumb>;

    /// Most recent breadcrumb, used as the actual drop-off point.
    fn latest(&self, trip_id: TripId) -> Option<Breadcrumb>;
}

#[derive(Default)]
pub struct InMemoryTripStore {
    trips: Mutex<HashMap<TripId, Trip>>,
}

impl InMemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TripStore for InMemoryTripStore {
    fn get(&self, id: TripId) -> Result<Trip, TransitionError> {
        let trips = match self.trips.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        trips.get(&id).cloned().ok_or(TransitionError::NotFound(id))
    }

    fn insert(&self, trip: Trip) {
        let mut trips = match self.trips.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        trips.insert(trip.id, trip);
    }

    fn update_if_status(
        &self,
        id: TripId,
        expected: TripStatus,
        mutate: &dyn Fn(&mut Trip),
    ) -> Result<Trip, TransitionError> {
        let mut trips = match self.trips.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let trip = trips.get_mut(&id).ok_or(TransitionError::NotFound(id))?;
        if trip.status != expected {
            return Err(TransitionError::Conflict {
                expected,
                actual: trip.status,
            });
        }
        mutate(trip);
        debug!(%id, from = ?expected, to = ?trip.status, "trip updated");
        Ok(trip.clone())
    }

    fn active_trip_for_provider(&self, provider: ProviderId) -> Option<TripId> {
        let trips = match self.trips.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        trips
            .values()
            .find(|t| t.provider == Some(provider) && !t.status.is_terminal())
            .map(|t| t.id)
    }
}

#[derive(Default)]
pub struct InMemoryBreadcrumbStore {
    breadcrumbs: Mutex<HashMap<TripId, Vec<Breadcrumb>>>,
}

impl InMemoryBreadcrumbStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BreadcrumbStore for InMemoryBreadcrumbStore {
    fn append(&self, breadcrumb: Breadcrumb) {
        let mut breadcrumbs = match self.breadcrumbs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        breadcrumbs
            .entry(breadcrumb.trip_id)
            .or_default()
            .push(breadcrumb);
    }

    fn for_trip(&self, trip_id: TripId) -> Vec<Breadcrumb> {
        let breadcrumbs = match self.breadcrumbs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut result = breadcrumbs.get(&trip_id).cloned().unwrap_or_default();
        result.sort_by_key(|b| b.captured_at);
        result
    }

    fn latest(&self, trip_id: TripId) -> Option<Breadcrumb> {
        let breadcrumbs = match self.breadcrumbs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        breadcrumbs
            .get(&trip_id)?
            .iter()
            .max_by_key(|b| b.captured_at)
            .copied()
    }
}

//! Arrival at the pickup point.

use crate::error::TransitionError;
use crate::events::TripEventKind;
use crate::trip::{Trip, TripId, TripStatus};

use super::TripLifecycle;

impl TripLifecycle {
    /// Record the provider's arrival at the pickup point.
    ///
    /// Idempotent: a repeated arrival report returns the trip unchanged, so
    /// client retries cannot fail a legitimate arrival.
    pub fn mark_arrived(&self, trip_id: TripId) -> Result<Trip, TransitionError> {
        let trip = self.trips.get(trip_id)?;
        match trip.status {
            TripStatus::ProviderArrived => Ok(trip),
            TripStatus::Assigned => {
                let now = self.now();
                let updated = self
                    .trips
                    .update_if_status(trip_id, TripStatus::Assigned, &|t| {
                        t.status = TripStatus::ProviderArrived;
                        t.arrived_at = Some(now);
                    })?;
                self.emit(trip_id, TripEventKind::ProviderArrived);
                Ok(updated)
            }
            from => Err(TransitionError::InvalidTransition {
                from,
                op: "mark_arrived",
            }),
        }
    }
}

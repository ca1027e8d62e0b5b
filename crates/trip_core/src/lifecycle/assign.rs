//! Provider assignment.

use tracing::info;

use crate::error::TransitionError;
use crate::events::TripEventKind;
use crate::trip::{ProviderId, Trip, TripId, TripStatus};

use super::TripLifecycle;

impl TripLifecycle {
    /// Assign a provider to a requested trip.
    ///
    /// Fails with `Conflict` when the trip already left `Requested` (two
    /// dispatchers racing for the same trip), and with `ProviderBusy` when
    /// the provider already has a non-terminal trip.
    pub fn assign(
        &self,
        trip_id: TripId,
        provider: ProviderId,
    ) -> Result<Trip, TransitionError> {
        let trip = self.trips.get(trip_id)?;
        if trip.status != TripStatus::Requested {
            return Err(TransitionError::Conflict {
                expected: TripStatus::Requested,
                actual: trip.status,
            });
        }
        if let Some(active) = self.trips.active_trip_for_provider(provider) {
            if active != trip_id {
                return Err(TransitionError::ProviderBusy(provider));
            }
        }

        let now = self.now();
        let updated = self
            .trips
            .update_if_status(trip_id, TripStatus::Requested, &|t| {
                t.provider = Some(provider);
                t.status = TripStatus::Assigned;
                t.assigned_at = Some(now);
            })?;

        self.availability.mark_engaged(provider);
        info!(%trip_id, %provider, "trip assigned");
        self.emit(trip_id, TripEventKind::Assigned { provider });
        Ok(updated)
    }
}

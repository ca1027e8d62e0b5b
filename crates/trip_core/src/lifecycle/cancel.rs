//! Cancellation from any non-terminal state.

use tracing::info;

use crate::error::TransitionError;
use crate::events::TripEventKind;
use crate::trip::{CancelActor, Trip, TripId, TripStatus};

use super::TripLifecycle;

impl TripLifecycle {
    /// Cancel a trip. Allowed from every non-terminal state; a non-empty
    /// reason is mandatory. The assigned provider, if any, is released.
    pub fn cancel(
        &self,
        trip_id: TripId,
        reason: &str,
        by: CancelActor,
    ) -> Result<Trip, TransitionError> {
        if reason.trim().is_empty() {
            return Err(TransitionError::ReasonRequired);
        }
        let trip = self.trips.get(trip_id)?;
        if trip.status.is_terminal() {
            return Err(TransitionError::InvalidTransition {
                from: trip.status,
                op: "cancel",
            });
        }

        let now = self.now();
        let reason = reason.trim().to_string();
        let updated = self.trips.update_if_status(trip_id, trip.status, &|t| {
            t.status = TripStatus::Cancelled;
            t.cancel_reason = Some(reason.clone());
            t.cancelled_by = Some(by);
            t.ended_at = Some(now);
            t.pickup_code = None;
            t.drop_code = None;
        })?;

        if let Some(provider) = updated.provider {
            self.availability.mark_available(provider);
        }
        info!(%trip_id, reason = reason.as_str(), ?by, "trip cancelled");
        self.emit(trip_id, TripEventKind::Cancelled { reason, by });
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::ProviderAvailability;
    use crate::test_helpers::{lifecycle_fixture, make_trip};
    use crate::trip::{BookingType, ProviderId};

    #[test]
    fn cancel_releases_the_assigned_provider() {
        let fixture = lifecycle_fixture();
        let trip_id = fixture
            .lifecycle
            .submit_request(make_trip(BookingType::Metered));
        let provider = ProviderId::new();
        fixture.lifecycle.assign(trip_id, provider).expect("assign");

        let trip = fixture
            .lifecycle
            .cancel(trip_id, "rider changed plans", CancelActor::Rider)
            .expect("cancel");
        assert_eq!(trip.status, TripStatus::Cancelled);
        assert_eq!(trip.cancel_reason.as_deref(), Some("rider changed plans"));
        assert_eq!(trip.cancelled_by, Some(CancelActor::Rider));
        assert!(trip.ended_at.is_some());
        assert_eq!(
            fixture.lifecycle.availability().status_of(provider),
            ProviderAvailability::Available
        );
    }

    #[test]
    fn cancel_before_assignment_needs_no_provider_release() {
        let fixture = lifecycle_fixture();
        let trip_id = fixture
            .lifecycle
            .submit_request(make_trip(BookingType::Metered));

        let trip = fixture
            .lifecycle
            .cancel(trip_id, "no providers nearby", CancelActor::Operations)
            .expect("cancel");
        assert_eq!(trip.status, TripStatus::Cancelled);
        assert_eq!(trip.provider, None);
    }

    #[test]
    fn empty_reason_is_rejected() {
        let fixture = lifecycle_fixture();
        let trip_id = fixture
            .lifecycle
            .submit_request(make_trip(BookingType::Metered));

        for reason in ["", "   ", "\t"] {
            let err = fixture
                .lifecycle
                .cancel(trip_id, reason, CancelActor::Rider)
                .expect_err("blank reason");
            assert_eq!(err, TransitionError::ReasonRequired);
        }
        assert_eq!(
            fixture.lifecycle.trip(trip_id).expect("trip").status,
            TripStatus::Requested
        );
    }

    #[test]
    fn cancelling_a_terminal_trip_is_invalid() {
        let fixture = lifecycle_fixture();
        let trip_id = fixture
            .lifecycle
            .submit_request(make_trip(BookingType::Metered));
        fixture
            .lifecycle
            .cancel(trip_id, "first cancellation", CancelActor::Rider)
            .expect("cancel");

        let err = fixture
            .lifecycle
            .cancel(trip_id, "second cancellation", CancelActor::Rider)
            .expect_err("already terminal");
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: TripStatus::Cancelled,
                op: "cancel",
            }
        );
    }
}

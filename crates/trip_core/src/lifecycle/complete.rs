//! Trip completion: settle distance, compute the fare, close the trip.

use tracing::info;

use crate::error::TransitionError;
use crate::estimator::EstimateContext;
use crate::events::TripEventKind;
use crate::fare::FareBreakdown;
use crate::trip::{TripId, TripStatus};

use super::TripLifecycle;

impl TripLifecycle {
    /// Complete an in-progress trip.
    ///
    /// Distance and duration are settled first (the estimator cannot fail),
    /// then the fare is computed against the tariff snapshot. A missing
    /// tariff aborts before any write: the trip stays `InProgress` and the
    /// provider stays engaged, so a corrected tariff can retry the call.
    pub fn complete(&self, trip_id: TripId) -> Result<FareBreakdown, TransitionError> {
        let trip = self.trips.get(trip_id)?;
        if trip.status != TripStatus::InProgress {
            return Err(TransitionError::InvalidTransition {
                from: trip.status,
                op: "complete",
            });
        }

        let now = self.now();
        let breadcrumbs = self.breadcrumbs.for_trip(trip_id);
        // The actual drop-off point is where the vehicle last reported, not
        // where the rider said they were going.
        let destination = self
            .breadcrumbs
            .latest(trip_id)
            .map(|b| b.point)
            .unwrap_or(trip.destination);
        let started_at = trip.started_at.unwrap_or(trip.requested_at);

        let estimate = self.estimator.estimate(&EstimateContext {
            trip_id,
            pickup: trip.pickup,
            destination,
            breadcrumbs: &breadcrumbs,
            started_at,
            now,
            double_tier1: trip.billing_requires_round_trip(),
        });

        let snapshot = self
            .tariffs
            .snapshot(trip.booking_type, trip.vehicle_class)?;
        let fare = self.fare_engine.compute(&trip, &estimate, &snapshot)?;

        let updated = self
            .trips
            .update_if_status(trip_id, TripStatus::InProgress, &|t| {
                t.status = TripStatus::Completed;
                t.ended_at = Some(now);
                t.fare = Some(fare.clone());
                t.distance_km = Some(fare.details.actual_distance_km);
                t.duration_minutes = Some(fare.details.actual_duration_minutes);
                t.pickup_code = None;
                t.drop_code = None;
            })?;

        if let Some(provider) = updated.provider {
            self.availability.mark_available(provider);
        }
        info!(
            %trip_id,
            total_fare = fare.total_fare,
            distance_km = fare.details.actual_distance_km,
            tier = fare.details.estimate_tier,
            "trip completed"
        );
        self.emit(
            trip_id,
            TripEventKind::Completed {
                distance_km: fare.details.actual_distance_km,
                duration_minutes: fare.details.actual_duration_minutes,
                total_fare: fare.total_fare,
            },
        );
        Ok(fare)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::estimator::EstimateTier;
    use crate::geo::GeoPoint;
    use crate::store::{BreadcrumbStore, InMemoryBreadcrumbStore, InMemoryTripStore, TripStore};
    use crate::test_helpers::{default_tariffs, lifecycle_fixture, make_trip, LifecycleFixture};
    use crate::trip::{BookingType, Breadcrumb, CancelActor, ProviderId, Trip};

    /// Store that lets a cancellation land between a writer's read and its
    /// status swap, once armed.
    struct RacingCancelStore {
        inner: InMemoryTripStore,
        cancel_before_next_update: AtomicBool,
    }

    impl RacingCancelStore {
        fn new() -> Self {
            Self {
                inner: InMemoryTripStore::new(),
                cancel_before_next_update: AtomicBool::new(false),
            }
        }
    }

    impl TripStore for RacingCancelStore {
        fn get(&self, id: TripId) -> Result<Trip, TransitionError> {
            self.inner.get(id)
        }

        fn insert(&self, trip: Trip) {
            self.inner.insert(trip);
        }

        fn update_if_status(
            &self,
            id: TripId,
            expected: TripStatus,
            mutate: &dyn Fn(&mut Trip),
        ) -> Result<Trip, TransitionError> {
            if expected == TripStatus::InProgress
                && self.cancel_before_next_update.swap(false, Ordering::SeqCst)
            {
                self.inner
                    .update_if_status(id, TripStatus::InProgress, &|t| {
                        t.status = TripStatus::Cancelled;
                        t.cancel_reason = Some("rider stepped out".to_string());
                        t.cancelled_by = Some(CancelActor::Rider);
                    })
                    .expect("interleaved cancellation");
            }
            self.inner.update_if_status(id, expected, mutate)
        }

        fn active_trip_for_provider(&self, provider: ProviderId) -> Option<TripId> {
            self.inner.active_trip_for_provider(provider)
        }
    }

    fn start_trip(fixture: &LifecycleFixture, trip: Trip) -> TripId {
        let trip_id = fixture.lifecycle.submit_request(trip);
        fixture
            .lifecycle
            .assign(trip_id, ProviderId::new())
            .expect("assign");
        fixture.lifecycle.mark_arrived(trip_id).expect("arrived");
        let code = fixture.lifecycle.issue_pickup_code(trip_id).expect("code");
        fixture
            .lifecycle
            .verify_pickup_code(trip_id, &code)
            .expect("verify");
        trip_id
    }

    #[test]
    fn completion_without_breadcrumbs_uses_geometric_fallback() {
        let fixture = lifecycle_fixture();
        let trip_id = start_trip(&fixture, make_trip(BookingType::Metered));

        let fare = fixture.lifecycle.complete(trip_id).expect("complete");
        assert_eq!(fare.details.estimate_tier, EstimateTier::Geometric.code());
        assert!(fare.total_fare > 0.0);

        let audit = fixture.lifecycle.audit_log().snapshot();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].tier, 3);
        assert_eq!(audit[0].breadcrumb_count, 0);
    }

    #[test]
    fn latest_breadcrumb_overrides_booked_destination() {
        let fixture = lifecycle_fixture();
        let trip_id = start_trip(&fixture, make_trip(BookingType::Metered));
        let started = fixture
            .lifecycle
            .trip(trip_id)
            .expect("trip")
            .started_at
            .expect("started_at");

        // The rider got out early: the single breadcrumb is not enough for a
        // path estimate, but it moves the drop-off point used as baseline.
        fixture.breadcrumbs.append(Breadcrumb {
            trip_id,
            point: GeoPoint::new(12.76, 77.82),
            captured_at: started + Duration::minutes(4),
        });

        let fare = fixture.lifecycle.complete(trip_id).expect("complete");
        assert_eq!(fare.details.estimate_tier, EstimateTier::Geometric.code());
        let audit = fixture.lifecycle.audit_log().snapshot();
        // Baseline reflects pickup to the last breadcrumb (~2.2 km), not the
        // booked destination (~6.1 km).
        assert!(audit[0].baseline_km < 3.0, "baseline {}", audit[0].baseline_km);
    }

    #[test]
    fn completing_a_requested_trip_is_invalid() {
        let fixture = lifecycle_fixture();
        let trip_id = fixture
            .lifecycle
            .submit_request(make_trip(BookingType::Metered));

        let err = fixture.lifecycle.complete(trip_id).expect_err("not started");
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: TripStatus::Requested,
                op: "complete",
            }
        );
    }

    #[test]
    fn complete_losing_the_cancel_race_persists_nothing() {
        let trips = Arc::new(RacingCancelStore::new());
        let lifecycle = TripLifecycle::new(
            trips.clone(),
            Arc::new(InMemoryBreadcrumbStore::new()),
            default_tariffs(),
        )
        .with_code_seed(7);

        let trip_id = lifecycle.submit_request(make_trip(BookingType::Metered));
        lifecycle.assign(trip_id, ProviderId::new()).expect("assign");
        lifecycle.mark_arrived(trip_id).expect("arrived");
        let code = lifecycle.issue_pickup_code(trip_id).expect("code");
        lifecycle.verify_pickup_code(trip_id, &code).expect("verify");

        // The cancellation commits after complete has read the trip and
        // computed the fare, but before its own status swap.
        trips.cancel_before_next_update.store(true, Ordering::SeqCst);
        let err = lifecycle.complete(trip_id).expect_err("lost the race");
        assert_eq!(
            err,
            TransitionError::Conflict {
                expected: TripStatus::InProgress,
                actual: TripStatus::Cancelled,
            }
        );

        // The loser's fare never lands; the cancellation stands untouched.
        let stored = lifecycle.trip(trip_id).expect("trip");
        assert_eq!(stored.status, TripStatus::Cancelled);
        assert!(stored.fare.is_none());
        assert!(stored.distance_km.is_none());
        assert!(stored.duration_minutes.is_none());
        assert!(lifecycle
            .events()
            .snapshot()
            .iter()
            .all(|e| !matches!(e.kind, TripEventKind::Completed { .. })));

        // Retry after re-reading sees the terminal status, not a charge.
        let retry = lifecycle.complete(trip_id).expect_err("already cancelled");
        assert_eq!(
            retry,
            TransitionError::InvalidTransition {
                from: TripStatus::Cancelled,
                op: "complete",
            }
        );
    }

    #[test]
    fn one_way_intercity_completion_bills_round_trip_distance() {
        let fixture = lifecycle_fixture();
        let trip = make_trip(BookingType::Intercity).with_one_way();
        let trip_id = start_trip(&fixture, trip);
        let started = fixture
            .lifecycle
            .trip(trip_id)
            .expect("trip")
            .started_at
            .expect("started_at");

        // Straight run of ~39.5 km of breadcrumbs toward the destination.
        let path = [(12.74, 77.82), (12.9176, 77.76), (13.0953, 77.70)];
        for (i, &(lat, lng)) in path.iter().enumerate() {
            fixture.breadcrumbs.append(Breadcrumb {
                trip_id,
                point: GeoPoint::new(lat, lng),
                captured_at: started + Duration::minutes(i as i64 * 30),
            });
        }

        let fare = fixture.lifecycle.complete(trip_id).expect("complete");
        assert_eq!(fare.details.estimate_tier, EstimateTier::Breadcrumbs.code());
        // Billed distance is double the tracked leg.
        assert!(
            fare.details.actual_distance_km > 70.0,
            "distance {}",
            fare.details.actual_distance_km
        );
    }
}

//! One-time pickup and drop codes.
//!
//! A code is bound to the status it was issued in; any transition out of
//! that status invalidates it. Verifying the pickup code is what starts the
//! trip. The drop code confirms handover at the destination but does not
//! gate completion (riders lose phone battery; operations can still close
//! the trip).

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::TransitionError;
use crate::events::TripEventKind;
use crate::trip::{OtpCode, Trip, TripId, TripStatus};

use super::TripLifecycle;

/// Four-digit one-time-code generator. Seedable for reproducible tests.
pub struct OtpGenerator {
    rng: Mutex<StdRng>,
}

impl OtpGenerator {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Zero-padded four-digit code, "0000" through "9999".
    pub fn four_digit(&self) -> String {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        format!("{:04}", rng.gen_range(0..10_000))
    }
}

impl TripLifecycle {
    /// Issue (or re-issue) the pickup code. Re-issuing replaces the previous
    /// code.
    pub fn issue_pickup_code(&self, trip_id: TripId) -> Result<String, TransitionError> {
        let trip = self.trips.get(trip_id)?;
        if trip.status != TripStatus::ProviderArrived {
            return Err(TransitionError::InvalidTransition {
                from: trip.status,
                op: "issue_pickup_code",
            });
        }

        let value = self.codes.four_digit();
        let code = OtpCode {
            value: value.clone(),
            issued_in: TripStatus::ProviderArrived,
        };
        self.trips
            .update_if_status(trip_id, TripStatus::ProviderArrived, &|t| {
                t.pickup_code = Some(code.clone());
            })?;
        self.emit(trip_id, TripEventKind::PickupCodeIssued);
        Ok(value)
    }

    /// Verify the pickup code and start the trip.
    ///
    /// A code presented after the trip left the status it was issued in is
    /// `Expired`; a wrong code is `CodeMismatch` and leaves the trip where
    /// it was.
    pub fn verify_pickup_code(
        &self,
        trip_id: TripId,
        candidate: &str,
    ) -> Result<Trip, TransitionError> {
        let trip = self.trips.get(trip_id)?;
        if trip.status != TripStatus::ProviderArrived {
            return Err(TransitionError::Expired);
        }
        let code = trip.pickup_code.as_ref().ok_or(TransitionError::Expired)?;
        if !code.matches(candidate) {
            return Err(TransitionError::CodeMismatch);
        }

        let now = self.now();
        let updated = self
            .trips
            .update_if_status(trip_id, TripStatus::ProviderArrived, &|t| {
                t.status = TripStatus::InProgress;
                t.started_at = Some(now);
                // Single use.
                t.pickup_code = None;
            })?;
        info!(%trip_id, "pickup verified, trip started");
        self.emit(trip_id, TripEventKind::Started);
        Ok(updated)
    }

    /// Issue (or re-issue) the drop code for an in-progress trip.
    pub fn issue_drop_code(&self, trip_id: TripId) -> Result<String, TransitionError> {
        let trip = self.trips.get(trip_id)?;
        if trip.status != TripStatus::InProgress {
            return Err(TransitionError::InvalidTransition {
                from: trip.status,
                op: "issue_drop_code",
            });
        }

        let value = self.codes.four_digit();
        let code = OtpCode {
            value: value.clone(),
            issued_in: TripStatus::InProgress,
        };
        self.trips
            .update_if_status(trip_id, TripStatus::InProgress, &|t| {
                t.drop_code = Some(code.clone());
            })?;
        self.emit(trip_id, TripEventKind::DropCodeIssued);
        Ok(value)
    }

    /// Verify the drop code at the destination. Records the confirmed
    /// handover on the trip; completion proceeds either way.
    pub fn verify_drop_code(
        &self,
        trip_id: TripId,
        candidate: &str,
    ) -> Result<Trip, TransitionError> {
        let trip = self.trips.get(trip_id)?;
        if trip.status != TripStatus::InProgress {
            return Err(TransitionError::Expired);
        }
        let code = trip.drop_code.as_ref().ok_or(TransitionError::Expired)?;
        if !code.matches(candidate) {
            return Err(TransitionError::CodeMismatch);
        }

        self.trips
            .update_if_status(trip_id, TripStatus::InProgress, &|t| {
                t.drop_code_verified = true;
                t.drop_code = None;
            })
    }
}

use thiserror::Error;

use crate::trip::{BookingType, ProviderId, TripId, TripStatus, VehicleClass};

/// Errors surfaced by trip state transitions and their collaborators.
///
/// None of these are retried internally; `Conflict` is the only kind where a
/// caller is expected to re-read current state and retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("trip {0} not found")]
    NotFound(TripId),

    #[error("{op} is not legal from {from:?}")]
    InvalidTransition { from: TripStatus, op: &'static str },

    #[error("status changed concurrently: expected {expected:?}, found {actual:?}")]
    Conflict {
        expected: TripStatus,
        actual: TripStatus,
    },

    #[error("provider {0} already holds an active trip")]
    ProviderBusy(ProviderId),

    #[error("provider {0} has an active trip")]
    HasActiveTrip(ProviderId),

    #[error("code does not match the issued value")]
    CodeMismatch,

    #[error("code is no longer valid for the current trip status")]
    Expired,

    #[error("no tariff configured for {booking_type:?}/{vehicle_class:?}")]
    TariffNotFound {
        booking_type: BookingType,
        vehicle_class: VehicleClass,
    },

    #[error("cancellation requires a non-empty reason")]
    ReasonRequired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_display_names_both_statuses() {
        let err = TransitionError::Conflict {
            expected: TripStatus::InProgress,
            actual: TripStatus::Cancelled,
        };
        let s = err.to_string();
        assert!(s.contains("InProgress"));
        assert!(s.contains("Cancelled"));
    }

    #[test]
    fn tariff_not_found_display_names_keys() {
        let err = TransitionError::TariffNotFound {
            booking_type: BookingType::Rental,
            vehicle_class: VehicleClass::Suv,
        };
        let s = err.to_string();
        assert!(s.contains("Rental"));
        assert!(s.contains("Suv"));
    }
}

//! The trip aggregate and its supporting value types.
//!
//! A [`Trip`] is created in `Requested` and mutated exclusively through the
//! lifecycle module; once it reaches a terminal status it is never written
//! again. One-time pickup/drop codes live on the aggregate itself and are
//! invalidated whenever the trip leaves the status that issued them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fare::FareBreakdown;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripId(pub Uuid);

impl TripId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TripId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RiderId(pub Uuid);

impl RiderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RiderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RiderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub Uuid);

impl ProviderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProviderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TripStatus {
    Requested,
    Assigned,
    ProviderArrived,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingType {
    Metered,
    Rental,
    Intercity,
    AirportTransfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleClass {
    Mini,
    Sedan,
    Suv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Card,
    Wallet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// Who requested a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelActor {
    Rider,
    Provider,
    Operations,
}

/// Ephemeral single-use code bound to the status it was issued in.
/// Any transition out of `issued_in` invalidates the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpCode {
    pub value: String,
    pub issued_in: TripStatus,
}

impl OtpCode {
    pub fn matches(&self, candidate: &str) -> bool {
        self.value == candidate
    }
}

/// One timestamped GPS sample captured during an active trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub trip_id: TripId,
    pub point: GeoPoint,
    pub captured_at: DateTime<Utc>,
}

/// A single transport engagement between a rider and a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub rider: RiderId,
    pub provider: Option<ProviderId>,
    pub pickup: GeoPoint,
    pub pickup_address: String,
    pub destination: GeoPoint,
    pub destination_address: String,
    pub booking_type: BookingType,
    pub vehicle_class: VehicleClass,
    /// Intercity only: booked as a single leg but billed for the return-empty leg.
    pub one_way: bool,
    /// Rental only: requested package duration in hours.
    pub package_hours: Option<u32>,
    pub status: TripStatus,
    pub fare: Option<FareBreakdown>,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub pickup_code: Option<OtpCode>,
    pub drop_code: Option<OtpCode>,
    pub drop_code_verified: bool,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<CancelActor>,
    pub requested_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Trip {
    /// Create a new trip in `Requested` with no provider assigned.
    #[allow(clippy::too_many_arguments)]
    pub fn request(
        rider: RiderId,
        pickup: GeoPoint,
        pickup_address: &str,
        destination: GeoPoint,
        destination_address: &str,
        booking_type: BookingType,
        vehicle_class: VehicleClass,
        payment_method: PaymentMethod,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TripId::new(),
            rider,
            provider: None,
            pickup,
            pickup_address: pickup_address.to_string(),
            destination,
            destination_address: destination_address.to_string(),
            booking_type,
            vehicle_class,
            one_way: false,
            package_hours: None,
            status: TripStatus::Requested,
            fare: None,
            distance_km: None,
            duration_minutes: None,
            pickup_code: None,
            drop_code: None,
            drop_code_verified: false,
            payment_method,
            payment_status: PaymentStatus::Pending,
            cancel_reason: None,
            cancelled_by: None,
            requested_at,
            assigned_at: None,
            arrived_at: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Mark an intercity booking as one-way (billed for the return-empty leg).
    pub fn with_one_way(mut self) -> Self {
        self.one_way = true;
        self
    }

    /// Set the requested rental package duration.
    pub fn with_package_hours(mut self, hours: u32) -> Self {
        self.package_hours = Some(hours);
        self
    }

    /// Whether billing covers a round trip while breadcrumbs only cover one leg.
    pub fn billing_requires_round_trip(&self) -> bool {
        self.booking_type == BookingType::Intercity && self.one_way
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(TripStatus::Completed.is_terminal());
        assert!(TripStatus::Cancelled.is_terminal());
        assert!(!TripStatus::Requested.is_terminal());
        assert!(!TripStatus::InProgress.is_terminal());
    }

    #[test]
    fn one_way_intercity_bills_round_trip() {
        let trip = Trip::request(
            RiderId::new(),
            GeoPoint::new(12.74, 77.82),
            "pickup",
            GeoPoint::new(13.0, 77.6),
            "destination",
            BookingType::Intercity,
            VehicleClass::Sedan,
            PaymentMethod::Cash,
            Utc::now(),
        )
        .with_one_way();
        assert!(trip.billing_requires_round_trip());

        let metered = Trip {
            booking_type: BookingType::Metered,
            ..trip
        };
        assert!(!metered.billing_requires_round_trip());
    }

    #[test]
    fn otp_code_matches_exact_value_only() {
        let code = OtpCode {
            value: "4821".to_string(),
            issued_in: TripStatus::ProviderArrived,
        };
        assert!(code.matches("4821"));
        assert!(!code.matches("1248"));
        assert!(!code.matches(""));
    }
}

//! Versioned pricing tables keyed by (booking type, vehicle class).
//!
//! A [`TariffSnapshot`] is read exactly once when fare computation begins and
//! never re-fetched mid-calculation, so every number in a breakdown derives
//! from the same version of the table.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;
use crate::geo::GeoPoint;
use crate::trip::{BookingType, VehicleClass};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeteredRates {
    pub base_fare: f64,
    pub per_km: f64,
    pub per_minute: f64,
    /// Flat surge charge; zero when no surge applies.
    pub surge_charge: f64,
    /// Flat deadhead charge for the provider's unpaid return leg.
    pub deadhead_charge: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RentalPackage {
    pub hours: u32,
    pub included_km: f64,
    pub package_fare: f64,
    pub overage_per_km: f64,
}

impl RentalPackage {
    /// Human-readable package name used in fare diagnostics.
    pub fn name(&self) -> String {
        format!("{}h/{}km", self.hours, self.included_km)
    }
}

/// Pre-priced intercity tier. A slab named for N one-way kilometres covers
/// round trips up to 2N kilometres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntercitySlab {
    pub one_way_km: f64,
    pub fare: f64,
    pub overage_per_km: f64,
}

impl IntercitySlab {
    pub fn coverage_km(&self) -> f64 {
        self.one_way_km * 2.0
    }

    pub fn name(&self) -> String {
        format!("{}km slab", self.one_way_km)
    }
}

/// Per-day regime for intercity trips at or beyond the long-haul threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongHaulRates {
    pub per_day_base: f64,
    pub provider_daily_allowance: f64,
    pub per_km: f64,
    pub km_allowance_per_day: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AirportRates {
    /// Fixed reference point (the airport). The endpoint closer to it is the
    /// airport side of the trip.
    pub reference_point: GeoPoint,
    pub from_airport_fare: f64,
    pub to_airport_fare: f64,
}

/// Booking-type-specific portion of a tariff row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TariffRates {
    Metered(MeteredRates),
    Rental {
        packages: Vec<RentalPackage>,
        /// Fixed distance added to rental usage for the return to depot.
        depot_return_km: f64,
    },
    Intercity {
        slabs: Vec<IntercitySlab>,
        long_haul: LongHaulRates,
    },
    Airport(AirportRates),
}

/// Immutable read of the tariff table for one (booking type, vehicle class)
/// pair at a specific version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffSnapshot {
    pub version: u32,
    pub booking_type: BookingType,
    pub vehicle_class: VehicleClass,
    pub rates: TariffRates,
    pub platform_fee: f64,
    /// Tax rate applied to the pre-tax charge subtotal.
    pub tax_rate: f64,
    /// Separate tax rate applied to the platform fee.
    pub platform_fee_tax_rate: f64,
}

/// Read-only access to the external tariff store.
pub trait TariffStore: Send + Sync {
    fn snapshot(
        &self,
        booking_type: BookingType,
        vehicle_class: VehicleClass,
    ) -> Result<TariffSnapshot, TransitionError>;
}

/// In-memory tariff table for tests and embedders without an external store.
#[derive(Default)]
pub struct InMemoryTariffStore {
    rows: Mutex<HashMap<(BookingType, VehicleClass), TariffSnapshot>>,
}

impl InMemoryTariffStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, snapshot: TariffSnapshot) {
        let mut rows = match self.rows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rows.insert((snapshot.booking_type, snapshot.vehicle_class), snapshot);
    }
}

impl TariffStore for InMemoryTariffStore {
    fn snapshot(
        &self,
        booking_type: BookingType,
        vehicle_class: VehicleClass,
    ) -> Result<TariffSnapshot, TransitionError> {
        let rows = match self.rows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rows.get(&(booking_type, vehicle_class))
            .cloned()
            .ok_or(TransitionError::TariffNotFound {
                booking_type,
                vehicle_class,
            })
    }
}

//! Shared fixtures for unit tests and embedders' integration tests.
//!
//! Compiled under `cfg(test)` and behind the `test-helpers` feature so
//! downstream crates can drive the lifecycle against in-memory stores.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use crate::geo::GeoPoint;
use crate::lifecycle::TripLifecycle;
use crate::store::{InMemoryBreadcrumbStore, InMemoryTripStore};
use crate::tariff::{
    AirportRates, InMemoryTariffStore, IntercitySlab, LongHaulRates, MeteredRates, RentalPackage,
    TariffRates, TariffSnapshot,
};
use crate::trip::{BookingType, PaymentMethod, RiderId, Trip, VehicleClass};

/// City-side pickup point used across the fixtures.
pub fn test_pickup() -> GeoPoint {
    GeoPoint::new(12.74, 77.82)
}

/// Booked destination ~6.1 km north of [`test_pickup`].
pub fn test_destination() -> GeoPoint {
    GeoPoint::new(12.794858, 77.82)
}

/// Airport reference point used by the airport tariff fixture.
pub fn airport_reference() -> GeoPoint {
    GeoPoint::new(13.1986, 77.7066)
}

/// A freshly requested trip. Airport transfers are booked toward the
/// airport; everything else runs pickup to [`test_destination`].
pub fn make_trip(booking_type: BookingType) -> Trip {
    let destination = match booking_type {
        BookingType::AirportTransfer => GeoPoint::new(13.19, 77.70),
        _ => test_destination(),
    };
    Trip::request(
        RiderId::new(),
        test_pickup(),
        "12 Market Street",
        destination,
        "Meridian Tech Park",
        booking_type,
        VehicleClass::Sedan,
        PaymentMethod::Cash,
        Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0)
            .single()
            .expect("fixture timestamp"),
    )
}

pub fn metered_snapshot(vehicle_class: VehicleClass) -> TariffSnapshot {
    TariffSnapshot {
        version: 3,
        booking_type: BookingType::Metered,
        vehicle_class,
        rates: TariffRates::Metered(MeteredRates {
            base_fare: 50.0,
            per_km: 12.0,
            per_minute: 1.5,
            surge_charge: 0.0,
            deadhead_charge: 0.0,
        }),
        platform_fee: 30.0,
        tax_rate: 0.05,
        platform_fee_tax_rate: 0.18,
    }
}

pub fn rental_snapshot(vehicle_class: VehicleClass) -> TariffSnapshot {
    TariffSnapshot {
        version: 3,
        booking_type: BookingType::Rental,
        vehicle_class,
        rates: TariffRates::Rental {
            packages: vec![
                RentalPackage {
                    hours: 4,
                    included_km: 40.0,
                    package_fare: 800.0,
                    overage_per_km: 12.0,
                },
                RentalPackage {
                    hours: 8,
                    included_km: 80.0,
                    package_fare: 1500.0,
                    overage_per_km: 12.0,
                },
            ],
            depot_return_km: 9.0,
        },
        platform_fee: 30.0,
        tax_rate: 0.05,
        platform_fee_tax_rate: 0.18,
    }
}

pub fn intercity_snapshot(vehicle_class: VehicleClass) -> TariffSnapshot {
    TariffSnapshot {
        version: 3,
        booking_type: BookingType::Intercity,
        vehicle_class,
        rates: TariffRates::Intercity {
            slabs: vec![
                IntercitySlab {
                    one_way_km: 50.0,
                    fare: 2500.0,
                    overage_per_km: 11.0,
                },
                IntercitySlab {
                    one_way_km: 100.0,
                    fare: 4500.0,
                    overage_per_km: 11.0,
                },
            ],
            long_haul: LongHaulRates {
                per_day_base: 3000.0,
                provider_daily_allowance: 500.0,
                per_km: 13.0,
                km_allowance_per_day: 500.0,
            },
        },
        platform_fee: 30.0,
        tax_rate: 0.05,
        platform_fee_tax_rate: 0.18,
    }
}

pub fn airport_snapshot(vehicle_class: VehicleClass) -> TariffSnapshot {
    TariffSnapshot {
        version: 3,
        booking_type: BookingType::AirportTransfer,
        vehicle_class,
        rates: TariffRates::Airport(AirportRates {
            reference_point: airport_reference(),
            from_airport_fare: 1200.0,
            to_airport_fare: 1000.0,
        }),
        platform_fee: 30.0,
        tax_rate: 0.05,
        platform_fee_tax_rate: 0.18,
    }
}

/// Tariff table seeded with all four booking types for `Sedan`.
pub fn default_tariffs() -> Arc<InMemoryTariffStore> {
    let store = Arc::new(InMemoryTariffStore::new());
    store.upsert(metered_snapshot(VehicleClass::Sedan));
    store.upsert(rental_snapshot(VehicleClass::Sedan));
    store.upsert(intercity_snapshot(VehicleClass::Sedan));
    store.upsert(airport_snapshot(VehicleClass::Sedan));
    store
}

/// Lifecycle wired to in-memory stores, with direct access to the stores for
/// assertions and out-of-band setup.
pub struct LifecycleFixture {
    pub lifecycle: TripLifecycle,
    pub trips: Arc<InMemoryTripStore>,
    pub breadcrumbs: Arc<InMemoryBreadcrumbStore>,
    pub tariffs: Arc<InMemoryTariffStore>,
}

pub fn lifecycle_fixture() -> LifecycleFixture {
    let trips = Arc::new(InMemoryTripStore::new());
    let breadcrumbs = Arc::new(InMemoryBreadcrumbStore::new());
    let tariffs = default_tariffs();
    let lifecycle = TripLifecycle::new(
        trips.clone(),
        breadcrumbs.clone(),
        tariffs.clone(),
    )
    .with_code_seed(7);
    LifecycleFixture {
        lifecycle,
        trips,
        breadcrumbs,
        tariffs,
    }
}

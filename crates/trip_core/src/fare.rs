//! Fare computation: pure function of trip, estimate, and tariff snapshot.
//!
//! The engine never re-derives distance or duration; both are supplied by the
//! caller exactly once per completed trip, so the persisted breakdown and the
//! persisted distance/duration are always mutually consistent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::FareConfig;
use crate::error::TransitionError;
use crate::estimator::Estimate;
use crate::geo::haversine_km;
use crate::tariff::{TariffRates, TariffSnapshot};
use crate::trip::{BookingType, Trip};

/// Round to currency precision (2 decimals, half away from zero).
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Distance/duration actually billed plus booking-type-specific diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareDetails {
    pub actual_distance_km: f64,
    pub actual_duration_minutes: f64,
    /// Which estimation tier produced the distance (1 = breadcrumbs,
    /// 2 = routed, 3 = geometric).
    pub estimate_tier: u8,
    /// Free-form diagnostics: slab selected, package name, direction, days.
    pub diagnostics: BTreeMap<String, String>,
}

/// Structured fare output, persisted once per completed trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareBreakdown {
    pub base_fare: f64,
    pub distance_fare: f64,
    pub time_fare: f64,
    pub surge_charge: f64,
    pub deadhead_charge: f64,
    pub extra_distance_charge: f64,
    pub provider_allowance: f64,
    pub platform_fee: f64,
    pub tax_on_charges: f64,
    pub tax_on_platform_fee: f64,
    pub total_fare: f64,
    pub details: FareDetails,
}

impl FareBreakdown {
    /// Sum of all component lines; equals `total_fare` at currency precision.
    pub fn component_sum(&self) -> f64 {
        round_currency(
            self.base_fare
                + self.distance_fare
                + self.time_fare
                + self.surge_charge
                + self.deadhead_charge
                + self.extra_distance_charge
                + self.provider_allowance
                + self.platform_fee
                + self.tax_on_charges
                + self.tax_on_platform_fee,
        )
    }
}

/// Per-booking-type charge lines before platform fee and taxes.
#[derive(Debug, Default)]
struct ChargeLines {
    base_fare: f64,
    distance_fare: f64,
    time_fare: f64,
    surge_charge: f64,
    deadhead_charge: f64,
    extra_distance_charge: f64,
    provider_allowance: f64,
    diagnostics: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FareEngine {
    config: FareConfig,
}

impl FareEngine {
    pub fn new(config: FareConfig) -> Self {
        Self { config }
    }

    /// Compute the structured fare for a trip from an already-settled
    /// distance/duration estimate and a single tariff snapshot.
    pub fn compute(
        &self,
        trip: &Trip,
        estimate: &Estimate,
        snapshot: &TariffSnapshot,
    ) -> Result<FareBreakdown, TransitionError> {
        let distance_km = estimate.distance_km;
        let duration_minutes = estimate.duration_minutes;

        let lines = match &snapshot.rates {
            TariffRates::Metered(rates) => ChargeLines {
                base_fare: rates.base_fare,
                distance_fare: distance_km * rates.per_km,
                time_fare: duration_minutes * rates.per_minute,
                surge_charge: rates.surge_charge,
                deadhead_charge: rates.deadhead_charge,
                ..Default::default()
            },
            TariffRates::Rental {
                packages,
                depot_return_km,
            } => self.rental_lines(trip, distance_km, *depot_return_km, packages, snapshot)?,
            TariffRates::Intercity { slabs, long_haul } => {
                self.intercity_lines(distance_km, duration_minutes, slabs, long_haul)
            }
            TariffRates::Airport(rates) => {
                let pickup_to_ref = haversine_km(trip.pickup, rates.reference_point);
                let destination_to_ref = haversine_km(trip.destination, rates.reference_point);
                let (fare, direction) = if pickup_to_ref <= destination_to_ref {
                    (rates.from_airport_fare, "from_airport")
                } else {
                    (rates.to_airport_fare, "to_airport")
                };
                let mut diagnostics = BTreeMap::new();
                diagnostics.insert("direction".to_string(), direction.to_string());
                ChargeLines {
                    base_fare: fare,
                    diagnostics,
                    ..Default::default()
                }
            }
        };

        let base_fare = round_currency(lines.base_fare);
        let distance_fare = round_currency(lines.distance_fare);
        let time_fare = round_currency(lines.time_fare);
        let surge_charge = round_currency(lines.surge_charge);
        let deadhead_charge = round_currency(lines.deadhead_charge);
        let extra_distance_charge = round_currency(lines.extra_distance_charge);
        let provider_allowance = round_currency(lines.provider_allowance);
        let platform_fee = round_currency(snapshot.platform_fee);

        let charge_subtotal = base_fare
            + distance_fare
            + time_fare
            + surge_charge
            + deadhead_charge
            + extra_distance_charge
            + provider_allowance;
        let tax_on_charges = round_currency(charge_subtotal * snapshot.tax_rate);
        let tax_on_platform_fee = round_currency(platform_fee * snapshot.platform_fee_tax_rate);
        let total_fare =
            round_currency(charge_subtotal + platform_fee + tax_on_charges + tax_on_platform_fee);

        let mut diagnostics = lines.diagnostics;
        diagnostics.insert(
            "tariff_version".to_string(),
            snapshot.version.to_string(),
        );

        Ok(FareBreakdown {
            base_fare,
            distance_fare,
            time_fare,
            surge_charge,
            deadhead_charge,
            extra_distance_charge,
            provider_allowance,
            platform_fee,
            tax_on_charges,
            tax_on_platform_fee,
            total_fare,
            details: FareDetails {
                actual_distance_km: distance_km,
                actual_duration_minutes: duration_minutes,
                estimate_tier: estimate.tier.code(),
                diagnostics,
            },
        })
    }

    fn rental_lines(
        &self,
        trip: &Trip,
        distance_km: f64,
        depot_return_km: f64,
        packages: &[crate::tariff::RentalPackage],
        snapshot: &TariffSnapshot,
    ) -> Result<ChargeLines, TransitionError> {
        let requested_hours = trip.package_hours.unwrap_or(0);
        // Exact match on the requested hours, otherwise the smallest package
        // that covers them.
        let package = packages
            .iter()
            .find(|p| p.hours == requested_hours)
            .or_else(|| {
                packages
                    .iter()
                    .filter(|p| p.hours >= requested_hours)
                    .min_by_key(|p| p.hours)
            })
            .ok_or(TransitionError::TariffNotFound {
                booking_type: snapshot.booking_type,
                vehicle_class: snapshot.vehicle_class,
            })?;

        let billable_km = distance_km + depot_return_km;
        let extra_km = (billable_km - package.included_km).max(0.0);
        let mut diagnostics = BTreeMap::new();
        diagnostics.insert("package".to_string(), package.name());
        diagnostics.insert("billable_km".to_string(), format!("{billable_km:.1}"));
        Ok(ChargeLines {
            base_fare: package.package_fare,
            extra_distance_charge: extra_km * package.overage_per_km,
            diagnostics,
            ..Default::default()
        })
    }

    fn intercity_lines(
        &self,
        distance_km: f64,
        duration_minutes: f64,
        slabs: &[crate::tariff::IntercitySlab],
        long_haul: &crate::tariff::LongHaulRates,
    ) -> ChargeLines {
        if distance_km < self.config.long_haul_threshold_km {
            // Smallest slab whose round-trip coverage reaches the billed
            // distance; past the largest slab the excess is charged at that
            // slab's overage rate.
            let covering = slabs
                .iter()
                .filter(|s| s.coverage_km() >= distance_km)
                .min_by(|a, b| a.coverage_km().total_cmp(&b.coverage_km()));
            let (slab, extra_km) = match covering {
                Some(slab) => (slab, 0.0),
                None => {
                    let largest = slabs
                        .iter()
                        .max_by(|a, b| a.coverage_km().total_cmp(&b.coverage_km()));
                    match largest {
                        Some(slab) => (slab, distance_km - slab.coverage_km()),
                        None => {
                            // No slabs configured: bill everything at the
                            // long-haul per-km rate.
                            let mut diagnostics = BTreeMap::new();
                            diagnostics.insert("regime".to_string(), "no_slabs".to_string());
                            return ChargeLines {
                                distance_fare: distance_km * long_haul.per_km,
                                diagnostics,
                                ..Default::default()
                            };
                        }
                    }
                }
            };
            let mut diagnostics = BTreeMap::new();
            diagnostics.insert("regime".to_string(), "slab".to_string());
            diagnostics.insert("slab".to_string(), slab.name());
            ChargeLines {
                base_fare: slab.fare,
                extra_distance_charge: extra_km * slab.overage_per_km,
                diagnostics,
                ..Default::default()
            }
        } else {
            let days = (duration_minutes / (24.0 * 60.0)).ceil().max(1.0);
            let km_allowance = long_haul.km_allowance_per_day * days;
            let covered_km = distance_km.min(km_allowance);
            let extra_km = (distance_km - km_allowance).max(0.0);
            let mut diagnostics = BTreeMap::new();
            diagnostics.insert("regime".to_string(), "long_haul".to_string());
            diagnostics.insert("days".to_string(), format!("{}", days as u64));
            ChargeLines {
                base_fare: long_haul.per_day_base * days,
                distance_fare: covered_km * long_haul.per_km,
                extra_distance_charge: extra_km * long_haul.per_km,
                provider_allowance: long_haul.provider_daily_allowance * days,
                diagnostics,
                ..Default::default()
            }
        }
    }
}

/// Booking type of a snapshot must match the trip; kept as a helper for
/// callers that assemble inputs from separate stores.
pub fn rates_match_booking(snapshot: &TariffSnapshot, booking_type: BookingType) -> bool {
    snapshot.booking_type == booking_type
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::EstimateTier;
    use crate::test_helpers::{
        airport_snapshot, intercity_snapshot, make_trip, metered_snapshot, rental_snapshot,
    };
    use crate::trip::{BookingType, VehicleClass};

    fn estimate(distance_km: f64, duration_minutes: f64) -> Estimate {
        Estimate {
            distance_km,
            duration_minutes,
            tier: EstimateTier::Breadcrumbs,
            degraded: false,
            flagged_for_audit: false,
        }
    }

    #[test]
    fn metered_fare_is_base_plus_distance_plus_time() {
        let engine = FareEngine::default();
        let trip = make_trip(BookingType::Metered);
        let snapshot = metered_snapshot(VehicleClass::Sedan);
        let fare = engine
            .compute(&trip, &estimate(7.9, 14.0), &snapshot)
            .expect("fare");

        assert_eq!(fare.base_fare, 50.0);
        assert_eq!(fare.distance_fare, 94.8); // 7.9 * 12
        assert_eq!(fare.time_fare, 21.0); // 14 * 1.5
        assert_eq!(fare.platform_fee, 30.0);
        assert_eq!(fare.tax_on_charges, 8.29); // 5% of 165.8
        assert_eq!(fare.tax_on_platform_fee, 5.4); // 18% of 30
        assert_eq!(fare.total_fare, 209.49);
        assert_eq!(fare.details.actual_distance_km, 7.9);
        assert_eq!(fare.details.actual_duration_minutes, 14.0);
    }

    #[test]
    fn total_equals_component_sum() {
        let engine = FareEngine::default();
        let trip = make_trip(BookingType::Metered);
        let snapshot = metered_snapshot(VehicleClass::Sedan);
        for (km, minutes) in [(0.1, 1.0), (3.3, 11.0), (7.9, 14.0), (42.7, 95.0)] {
            let fare = engine
                .compute(&trip, &estimate(km, minutes), &snapshot)
                .expect("fare");
            assert_eq!(fare.total_fare, fare.component_sum(), "{km} km / {minutes} min");
        }
    }

    #[test]
    fn rental_charges_overage_past_included_km() {
        // 4-hour package with 40 km included; 35 km travelled + 9 km depot
        // return = 44 km, so 4 km at the overage rate.
        let engine = FareEngine::default();
        let trip = make_trip(BookingType::Rental).with_package_hours(4);
        let snapshot = rental_snapshot(VehicleClass::Sedan);
        let fare = engine
            .compute(&trip, &estimate(35.0, 180.0), &snapshot)
            .expect("fare");

        assert_eq!(fare.base_fare, 800.0);
        assert_eq!(fare.extra_distance_charge, 48.0); // 4 km * 12
        assert_eq!(fare.details.diagnostics["package"], "4h/40km");
        assert_eq!(fare.total_fare, fare.component_sum());
    }

    #[test]
    fn rental_within_allowance_has_no_overage() {
        let engine = FareEngine::default();
        let trip = make_trip(BookingType::Rental).with_package_hours(4);
        let snapshot = rental_snapshot(VehicleClass::Sedan);
        // 25 + 9 depot return = 34 km, under the 40 km allowance.
        let fare = engine
            .compute(&trip, &estimate(25.0, 120.0), &snapshot)
            .expect("fare");
        assert_eq!(fare.extra_distance_charge, 0.0);
    }

    #[test]
    fn rental_without_matching_package_is_tariff_not_found() {
        let engine = FareEngine::default();
        let trip = make_trip(BookingType::Rental).with_package_hours(24);
        let snapshot = rental_snapshot(VehicleClass::Sedan);
        let err = engine
            .compute(&trip, &estimate(10.0, 60.0), &snapshot)
            .expect_err("no 24h package");
        assert!(matches!(err, TransitionError::TariffNotFound { .. }));
    }

    #[test]
    fn intercity_slab_selected_by_round_trip_coverage() {
        // 84 km billed falls inside the 50 km slab (covers up to 100 km).
        let engine = FareEngine::default();
        let trip = make_trip(BookingType::Intercity);
        let snapshot = intercity_snapshot(VehicleClass::Sedan);
        let fare = engine
            .compute(&trip, &estimate(84.0, 150.0), &snapshot)
            .expect("fare");

        assert_eq!(fare.base_fare, 2500.0);
        assert_eq!(fare.extra_distance_charge, 0.0);
        assert_eq!(fare.provider_allowance, 0.0);
        assert_eq!(fare.details.diagnostics["slab"], "50km slab");
    }

    #[test]
    fn intercity_past_largest_slab_charges_overage() {
        let engine = FareEngine::default();
        let trip = make_trip(BookingType::Intercity);
        let snapshot = intercity_snapshot(VehicleClass::Sedan);
        // Largest slab is 100 km (covers 200); bill 260 km, still below the
        // 300 km long-haul threshold.
        let fare = engine
            .compute(&trip, &estimate(260.0, 300.0), &snapshot)
            .expect("fare");
        assert_eq!(fare.base_fare, 4500.0);
        assert_eq!(fare.extra_distance_charge, 660.0); // 60 km * 11
        assert_eq!(fare.details.diagnostics["slab"], "100km slab");
    }

    #[test]
    fn intercity_long_haul_uses_per_day_regime() {
        let engine = FareEngine::default();
        let trip = make_trip(BookingType::Intercity);
        let snapshot = intercity_snapshot(VehicleClass::Sedan);
        // 600 km over ~30 hours: 2 days, 500 km/day allowance at 250 km/day.
        let fare = engine
            .compute(&trip, &estimate(600.0, 30.0 * 60.0), &snapshot)
            .expect("fare");

        assert_eq!(fare.base_fare, 6000.0); // 3000 * 2 days
        assert_eq!(fare.provider_allowance, 1000.0); // 500 * 2 days
        assert_eq!(fare.distance_fare, 6500.0); // 500 km covered * 13
        assert_eq!(fare.extra_distance_charge, 1300.0); // 100 km excess * 13
        assert_eq!(fare.details.diagnostics["regime"], "long_haul");
        assert_eq!(fare.details.diagnostics["days"], "2");
        assert_eq!(fare.total_fare, fare.component_sum());
    }

    #[test]
    fn airport_direction_follows_closer_endpoint() {
        let engine = FareEngine::default();
        let snapshot = airport_snapshot(VehicleClass::Sedan);
        // make_trip's pickup is the city point, destination near the
        // reference point, so this is a to-airport trip.
        let to_airport = make_trip(BookingType::AirportTransfer);
        let fare = engine
            .compute(&to_airport, &estimate(38.0, 55.0), &snapshot)
            .expect("fare");
        assert_eq!(fare.base_fare, 1000.0);
        assert_eq!(fare.details.diagnostics["direction"], "to_airport");

        let mut from_airport = make_trip(BookingType::AirportTransfer);
        std::mem::swap(&mut from_airport.pickup, &mut from_airport.destination);
        let fare = engine
            .compute(&from_airport, &estimate(38.0, 55.0), &snapshot)
            .expect("fare");
        assert_eq!(fare.base_fare, 1200.0);
        assert_eq!(fare.details.diagnostics["direction"], "from_airport");
    }

    #[test]
    fn breakdown_serializes_with_structured_components() {
        let engine = FareEngine::default();
        let trip = make_trip(BookingType::Metered);
        let snapshot = metered_snapshot(VehicleClass::Sedan);
        let fare = engine
            .compute(&trip, &estimate(7.9, 14.0), &snapshot)
            .expect("fare");
        let json = serde_json::to_value(&fare).expect("serialize");
        assert_eq!(json["total_fare"], 209.49);
        assert_eq!(json["details"]["actual_distance_km"], 7.9);
        assert!(json["details"]["diagnostics"].is_object());
    }
}

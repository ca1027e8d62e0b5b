//! Tunable business constants for estimation and fare computation.
//!
//! The plausibility bounds and regime thresholds are empirically chosen
//! operational values, so they live in config structs rather than in logic.

/// Distance-estimation tuning.
#[derive(Debug, Clone, Copy)]
pub struct EstimatorConfig {
    /// Minimum number of breadcrumbs for a path-based estimate.
    pub min_breadcrumbs: usize,
    /// Path distance below this fraction of the straight-line baseline is
    /// treated as a tracking failure.
    pub plausibility_floor: f64,
    /// Path distance above this multiple of the baseline is accepted but
    /// flagged for audit.
    pub plausibility_ceiling: f64,
    /// Baselines under this are treated as a stationary engagement.
    pub stationary_baseline_km: f64,
    /// Distance reported for a stationary engagement.
    pub min_distance_km: f64,
    /// Floor applied to every reported duration.
    pub min_duration_minutes: f64,
    /// Road-circuity multiplier applied to the straight-line distance when
    /// neither breadcrumbs nor routing are usable.
    pub circuity_factor: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_breadcrumbs: 2,
            plausibility_floor: 0.5,
            plausibility_ceiling: 3.0,
            stationary_baseline_km: 0.1,
            min_distance_km: 0.1,
            min_duration_minutes: 1.0,
            circuity_factor: 1.3,
        }
    }
}

impl EstimatorConfig {
    pub fn with_plausibility_bounds(mut self, floor: f64, ceiling: f64) -> Self {
        self.plausibility_floor = floor;
        self.plausibility_ceiling = ceiling;
        self
    }

    pub fn with_circuity_factor(mut self, factor: f64) -> Self {
        self.circuity_factor = factor;
        self
    }
}

/// Fare-engine tuning.
#[derive(Debug, Clone, Copy)]
pub struct FareConfig {
    /// Intercity bookings at or above this billed distance switch from slab
    /// pricing to the per-day long-haul regime.
    pub long_haul_threshold_km: f64,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            long_haul_threshold_km: 300.0,
        }
    }
}

impl FareConfig {
    pub fn with_long_haul_threshold_km(mut self, km: f64) -> Self {
        self.long_haul_threshold_km = km;
        self
    }
}

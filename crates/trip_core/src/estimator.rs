//! Travelled-distance estimation from noisy location samples.
//!
//! Three strategies implementing one capability, tried in order:
//!
//! - **Breadcrumb path** (tier 1): sum of great-circle legs over the trip's
//!   breadcrumbs, with a plausibility check against the straight-line
//!   pickup-to-dropoff baseline.
//! - **Routed** (tier 2): driving-route distance/duration from an external
//!   routing service, LRU-cached. The OSRM client lives behind the `osrm`
//!   cargo feature.
//! - **Geometric** (tier 3): straight-line distance times a road-circuity
//!   factor. Cannot fail, so estimation as a whole never hard-fails.
//!
//! Every decision appends a record to the estimation audit log.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::audit::{EstimationAuditLog, EstimationAuditRecord};
use crate::config::EstimatorConfig;
use crate::geo::{haversine_km, path_distance_km, GeoPoint};
use crate::trip::{Breadcrumb, TripId};

/// Which strategy produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimateTier {
    Breadcrumbs,
    Routed,
    Geometric,
}

impl EstimateTier {
    pub fn code(self) -> u8 {
        match self {
            EstimateTier::Breadcrumbs => 1,
            EstimateTier::Routed => 2,
            EstimateTier::Geometric => 3,
        }
    }
}

/// Distance/duration result. `degraded` marks tier 2/3 fallbacks; it is a
/// diagnostic flag, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub tier: EstimateTier,
    pub degraded: bool,
    /// Path accepted above the plausibility ceiling (erratic tracking).
    pub flagged_for_audit: bool,
}

/// Everything a strategy may consult. Breadcrumbs are sorted by capture time.
#[derive(Debug, Clone, Copy)]
pub struct EstimateContext<'a> {
    pub trip_id: TripId,
    pub pickup: GeoPoint,
    /// Actual drop-off point: latest breadcrumb, or the booked destination.
    pub destination: GeoPoint,
    pub breadcrumbs: &'a [Breadcrumb],
    pub started_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
    /// Double a breadcrumb-path result (one-way booking billed round trip).
    /// Never applies to tiers 2-3, which already represent the booked leg.
    pub double_tier1: bool,
}

/// A strategy's result plus the reason recorded in the audit log.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub estimate: Estimate,
    pub reason: &'static str,
}

/// One rung of the fallback chain.
pub trait EstimateStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn estimate(&self, ctx: &EstimateContext<'_>) -> Option<StrategyOutcome>;
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds().max(0) as f64 / 60.0
}

// ---------------------------------------------------------------------------
// Tier 1: breadcrumb path
// ---------------------------------------------------------------------------

pub struct BreadcrumbStrategy {
    config: EstimatorConfig,
}

impl BreadcrumbStrategy {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }
}

impl EstimateStrategy for BreadcrumbStrategy {
    fn name(&self) -> &'static str {
        "breadcrumbs"
    }

    fn estimate(&self, ctx: &EstimateContext<'_>) -> Option<StrategyOutcome> {
        if ctx.breadcrumbs.len() < self.config.min_breadcrumbs {
            return None;
        }
        let points: Vec<GeoPoint> = ctx.breadcrumbs.iter().map(|b| b.point).collect();
        let path_km = path_distance_km(&points);
        let baseline_km = haversine_km(ctx.pickup, ctx.destination);
        let duration = minutes_between(
            ctx.breadcrumbs[0].captured_at,
            ctx.breadcrumbs[ctx.breadcrumbs.len() - 1].captured_at,
        )
        .max(self.config.min_duration_minutes);

        if path_km < baseline_km * self.config.plausibility_floor {
            if baseline_km < self.config.stationary_baseline_km {
                // Pickup and drop-off are effectively the same place: a
                // stationary engagement, not a tracking failure.
                return Some(StrategyOutcome {
                    estimate: Estimate {
                        distance_km: self.config.min_distance_km,
                        duration_minutes: self.config.min_duration_minutes,
                        tier: EstimateTier::Breadcrumbs,
                        degraded: false,
                        flagged_for_audit: false,
                    },
                    reason: "stationary engagement, minimum distance applied",
                });
            }
            // Tracking failure: hand over to the next tier.
            return None;
        }

        let flagged = path_km > baseline_km * self.config.plausibility_ceiling;
        let distance_km = if ctx.double_tier1 {
            path_km * 2.0
        } else {
            path_km
        };
        Some(StrategyOutcome {
            estimate: Estimate {
                distance_km,
                duration_minutes: duration,
                tier: EstimateTier::Breadcrumbs,
                degraded: false,
                flagged_for_audit: flagged,
            },
            reason: if flagged {
                "breadcrumb path above plausibility ceiling, accepted and flagged"
            } else {
                "breadcrumb path accepted"
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tier 2: external routing service
// ---------------------------------------------------------------------------

/// Driving-route result from an external routing backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub duration_minutes: f64,
}

/// Routing backends must be `Send + Sync` so the estimator can be shared.
pub trait RouteService: Send + Sync {
    /// Returns `None` when no route could be obtained.
    fn route(&self, from: GeoPoint, to: GeoPoint) -> Option<RouteEstimate>;
}

pub struct RoutedStrategy {
    service: Box<dyn RouteService>,
    config: EstimatorConfig,
}

impl RoutedStrategy {
    pub fn new(service: Box<dyn RouteService>, config: EstimatorConfig) -> Self {
        Self { service, config }
    }
}

impl EstimateStrategy for RoutedStrategy {
    fn name(&self) -> &'static str {
        "routed"
    }

    fn estimate(&self, ctx: &EstimateContext<'_>) -> Option<StrategyOutcome> {
        let route = self.service.route(ctx.pickup, ctx.destination)?;
        Some(StrategyOutcome {
            estimate: Estimate {
                distance_km: route.distance_km,
                duration_minutes: route.duration_minutes.max(self.config.min_duration_minutes),
                tier: EstimateTier::Routed,
                degraded: true,
                flagged_for_audit: false,
            },
            reason: "breadcrumbs unusable, routed estimate",
        })
    }
}

// ---------------------------------------------------------------------------
// Tier 3: geometric estimate (cannot fail)
// ---------------------------------------------------------------------------

pub struct GeometricStrategy {
    config: EstimatorConfig,
}

impl GeometricStrategy {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    /// Infallible variant used as the terminal rung of the chain.
    pub fn outcome(&self, ctx: &EstimateContext<'_>) -> StrategyOutcome {
        let distance_km = (haversine_km(ctx.pickup, ctx.destination) * self.config.circuity_factor)
            .max(self.config.min_distance_km);
        let duration_minutes =
            minutes_between(ctx.started_at, ctx.now).max(self.config.min_duration_minutes);
        StrategyOutcome {
            estimate: Estimate {
                distance_km,
                duration_minutes,
                tier: EstimateTier::Geometric,
                degraded: true,
                flagged_for_audit: false,
            },
            reason: "routing unavailable, geometric estimate",
        }
    }
}

impl EstimateStrategy for GeometricStrategy {
    fn name(&self) -> &'static str {
        "geometric"
    }

    fn estimate(&self, ctx: &EstimateContext<'_>) -> Option<StrategyOutcome> {
        Some(self.outcome(ctx))
    }
}

// ---------------------------------------------------------------------------
// LRU cache over a routing service
// ---------------------------------------------------------------------------

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Coordinates quantized to ~1 m so nearby lookups share cache entries.
fn cache_key(from: GeoPoint, to: GeoPoint) -> (i64, i64, i64, i64) {
    let q = |v: f64| (v * 100_000.0).round() as i64;
    (q(from.lat), q(from.lng), q(to.lat), q(to.lng))
}

/// LRU-cached wrapper around any [`RouteService`]. Only successful lookups
/// are cached; failures will retry on the next call.
pub struct CachedRouteService {
    inner: Box<dyn RouteService>,
    cache: Mutex<LruCache<(i64, i64, i64, i64), RouteEstimate>>,
}

impl CachedRouteService {
    pub fn new(inner: Box<dyn RouteService>, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).expect("cache capacity must be > 0"),
            )),
        }
    }
}

impl RouteService for CachedRouteService {
    fn route(&self, from: GeoPoint, to: GeoPoint) -> Option<RouteEstimate> {
        let key = cache_key(from, to);
        {
            let mut cache = match self.cache.lock() {
                Ok(guard) => guard,
                Err(_) => return self.inner.route(from, to),
            };
            if let Some(cached) = cache.get(&key) {
                return Some(*cached);
            }
        }

        let result = self.inner.route(from, to);
        if let Some(route) = result {
            if let Ok(mut cache) = self.cache.lock() {
                cache.put(key, route);
            }
        }
        result
    }
}

// ---------------------------------------------------------------------------
// OSRM routing client (behind `osrm` feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "osrm")]
pub mod osrm {
    use std::time::Duration;

    use reqwest::blocking::Client;
    use serde::Deserialize;

    use super::{RouteEstimate, RouteService};
    use crate::geo::GeoPoint;

    /// Routes via an OSRM HTTP endpoint.
    pub struct OsrmRouteService {
        client: Client,
        endpoint: String,
    }

    impl OsrmRouteService {
        pub fn new(endpoint: &str) -> Self {
            let client = Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("failed to build HTTP client");
            Self {
                client,
                endpoint: endpoint.trim_end_matches('/').to_string(),
            }
        }
    }

    /// Minimal OSRM JSON response structures.
    #[derive(Deserialize)]
    struct OsrmResponse {
        code: String,
        routes: Option<Vec<OsrmRoute>>,
    }

    #[derive(Deserialize)]
    struct OsrmRoute {
        distance: f64, // metres
        duration: f64, // seconds
    }

    impl RouteService for OsrmRouteService {
        fn route(&self, from: GeoPoint, to: GeoPoint) -> Option<RouteEstimate> {
            let url = format!(
                "{}/route/v1/driving/{},{};{},{}?overview=false",
                self.endpoint, from.lng, from.lat, to.lng, to.lat,
            );

            let resp: OsrmResponse = match self.client.get(&url).send() {
                Ok(r) => match r.json() {
                    Ok(j) => j,
                    Err(_) => return None,
                },
                Err(_) => return None,
            };

            if resp.code != "Ok" {
                return None;
            }
            let route = resp.routes?.into_iter().next()?;
            Some(RouteEstimate {
                distance_km: route.distance / 1000.0,
                duration_minutes: route.duration / 60.0,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// The chain
// ---------------------------------------------------------------------------

/// Ordered fallback chain. Tier 3 is always present, so [`estimate`] cannot
/// fail.
///
/// [`estimate`]: DistanceEstimator::estimate
pub struct DistanceEstimator {
    config: EstimatorConfig,
    strategies: Vec<Box<dyn EstimateStrategy>>,
    audit: Arc<EstimationAuditLog>,
}

impl DistanceEstimator {
    /// Build the standard chain: breadcrumbs, then the routing service when
    /// one is configured, then geometric.
    pub fn new(
        config: EstimatorConfig,
        route_service: Option<Box<dyn RouteService>>,
        audit: Arc<EstimationAuditLog>,
    ) -> Self {
        let mut strategies: Vec<Box<dyn EstimateStrategy>> =
            vec![Box::new(BreadcrumbStrategy::new(config))];
        if let Some(service) = route_service {
            strategies.push(Box::new(RoutedStrategy::new(service, config)));
        }
        strategies.push(Box::new(GeometricStrategy::new(config)));
        Self {
            config,
            strategies,
            audit,
        }
    }

    pub fn audit_log(&self) -> &Arc<EstimationAuditLog> {
        &self.audit
    }

    /// Run the chain and record the decision in the audit log.
    pub fn estimate(&self, ctx: &EstimateContext<'_>) -> Estimate {
        let outcome = self
            .strategies
            .iter()
            .find_map(|strategy| strategy.estimate(ctx));
        // The geometric rung always answers; this fallback only guards a
        // chain constructed without it.
        let outcome = match outcome {
            Some(outcome) => outcome,
            None => GeometricStrategy::new(self.config).outcome(ctx),
        };

        let points: Vec<GeoPoint> = ctx.breadcrumbs.iter().map(|b| b.point).collect();
        let path_km = if points.len() >= 2 {
            Some(path_distance_km(&points))
        } else {
            None
        };
        let record = EstimationAuditRecord {
            trip_id: ctx.trip_id,
            at: ctx.now,
            tier: outcome.estimate.tier.code(),
            reason: outcome.reason.to_string(),
            breadcrumb_count: ctx.breadcrumbs.len(),
            path_km,
            baseline_km: haversine_km(ctx.pickup, ctx.destination),
            distance_km: outcome.estimate.distance_km,
            duration_minutes: outcome.estimate.duration_minutes,
            flagged: outcome.estimate.flagged_for_audit,
        };
        if outcome.estimate.degraded || outcome.estimate.flagged_for_audit {
            warn!(
                trip_id = %ctx.trip_id,
                tier = record.tier,
                reason = record.reason.as_str(),
                "distance estimation degraded"
            );
        }
        self.audit.append(record);
        outcome.estimate
    }
}

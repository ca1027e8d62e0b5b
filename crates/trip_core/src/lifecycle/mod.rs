//! The trip state machine: the single writer of trip truth.
//!
//! `requested → assigned → provider_arrived → in_progress → {completed |
//! cancelled}`. Every transition reads the trip, validates legality from the
//! observed status, then commits through the store's compare-and-swap update;
//! a writer that observed a stale status gets `Conflict` and must re-read.
//! Readers (availability, reporting, notifications) subscribe to the emitted
//! transition events instead of polling shared state.
//!
//! One file per transition:
//!
//! - [`assign`]: provider assignment
//! - [`arrived`]: arrival at pickup
//! - [`codes`]: one-time pickup/drop codes
//! - [`complete`]: distance estimation, fare computation, completion
//! - [`cancel`]: cancellation from any non-terminal state

pub mod arrived;
pub mod assign;
pub mod cancel;
pub mod codes;
pub mod complete;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::audit::EstimationAuditLog;
use crate::availability::AvailabilityReconciler;
use crate::config::{EstimatorConfig, FareConfig};
use crate::error::TransitionError;
use crate::estimator::DistanceEstimator;
use crate::events::{EventLog, LifecycleObserver, TripEvent, TripEventKind};
use crate::fare::FareEngine;
use crate::store::{BreadcrumbStore, TripStore};
use crate::tariff::TariffStore;
use crate::trip::{Trip, TripId};

pub use codes::OtpGenerator;

pub struct TripLifecycle {
    trips: Arc<dyn TripStore>,
    breadcrumbs: Arc<dyn BreadcrumbStore>,
    tariffs: Arc<dyn TariffStore>,
    availability: Arc<AvailabilityReconciler>,
    estimator: DistanceEstimator,
    fare_engine: FareEngine,
    codes: OtpGenerator,
    events: EventLog,
    observers: Vec<Arc<dyn LifecycleObserver>>,
    clock: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl TripLifecycle {
    /// Wire up a lifecycle with default estimator/fare configuration and no
    /// routing service (tier 2 disabled).
    pub fn new(
        trips: Arc<dyn TripStore>,
        breadcrumbs: Arc<dyn BreadcrumbStore>,
        tariffs: Arc<dyn TariffStore>,
    ) -> Self {
        let availability = Arc::new(AvailabilityReconciler::new(trips.clone()));
        let estimator = DistanceEstimator::new(
            EstimatorConfig::default(),
            None,
            Arc::new(EstimationAuditLog::new()),
        );
        Self {
            trips,
            breadcrumbs,
            tariffs,
            availability,
            estimator,
            fare_engine: FareEngine::default(),
            codes: OtpGenerator::from_entropy(),
            events: EventLog::new(),
            observers: Vec::new(),
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the estimator chain (custom config or a routing service).
    pub fn with_estimator(mut self, estimator: DistanceEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_fare_config(mut self, config: FareConfig) -> Self {
        self.fare_engine = FareEngine::new(config);
        self
    }

    /// Seed the one-time-code generator (for reproducible tests).
    pub fn with_code_seed(mut self, seed: u64) -> Self {
        self.codes = OtpGenerator::with_seed(seed);
        self
    }

    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Persist a freshly requested trip and return its id.
    pub fn submit_request(&self, trip: Trip) -> TripId {
        let id = trip.id;
        self.trips.insert(trip);
        id
    }

    /// Current persisted trip; callers re-read through this after `Conflict`.
    pub fn trip(&self, id: TripId) -> Result<Trip, TransitionError> {
        self.trips.get(id)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn availability(&self) -> &Arc<AvailabilityReconciler> {
        &self.availability
    }

    pub fn audit_log(&self) -> &Arc<EstimationAuditLog> {
        self.estimator.audit_log()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn emit(&self, trip_id: TripId, kind: TripEventKind) {
        let event = TripEvent {
            trip_id,
            at: self.now(),
            kind,
        };
        for observer in &self.observers {
            observer.on_event(&event);
        }
        self.events.append(event);
    }
}

//! Trip lifecycle coordination core for a ride-hailing platform.
//!
//! The crate owns the authoritative path a trip takes from request to
//! settlement: the state machine over trip statuses, travelled-distance
//! estimation from GPS breadcrumbs with routed and geometric fallbacks,
//! booking-type-specific fare computation against versioned tariffs, and
//! reconciliation of provider availability against trip truth.
//!
//! Storage is abstracted behind the [`store`] traits; in-memory
//! implementations back the tests and lightweight embedders. Completed-trip
//! fares and estimation decisions can be exported to Parquet for downstream
//! reporting via [`audit_export`].

pub mod audit;
pub mod audit_export;
pub mod availability;
pub mod config;
pub mod error;
pub mod estimator;
pub mod events;
pub mod fare;
pub mod geo;
pub mod lifecycle;
pub mod store;
pub mod tariff;
pub mod trip;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use error::TransitionError;
pub use lifecycle::TripLifecycle;
pub use trip::{Trip, TripId, TripStatus};

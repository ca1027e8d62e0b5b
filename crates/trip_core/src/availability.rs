//! Provider availability reconciliation.
//!
//! Keeps the coarse availability flag consumed by dispatch consistent with
//! the true presence or absence of an active trip. Lifecycle instructions
//! write unconditionally; manual toggles are validated against the trip
//! store; on reconnect the flag is re-derived rather than trusted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::TransitionError;
use crate::store::TripStore;
use crate::trip::ProviderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderAvailability {
    Available,
    Engaged,
    Unavailable,
}

pub struct AvailabilityReconciler {
    flags: Mutex<HashMap<ProviderId, ProviderAvailability>>,
    trips: Arc<dyn TripStore>,
}

impl AvailabilityReconciler {
    pub fn new(trips: Arc<dyn TripStore>) -> Self {
        Self {
            flags: Mutex::new(HashMap::new()),
            trips,
        }
    }

    /// Current flag; providers default to `Available`.
    pub fn status_of(&self, provider: ProviderId) -> ProviderAvailability {
        let flags = match self.flags.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        flags
            .get(&provider)
            .copied()
            .unwrap_or(ProviderAvailability::Available)
    }

    fn set(&self, provider: ProviderId, status: ProviderAvailability) {
        let mut flags = match self.flags.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        flags.insert(provider, status);
    }

    /// Lifecycle instruction: provider picked up a trip. Unconditional.
    pub fn mark_engaged(&self, provider: ProviderId) {
        self.set(provider, ProviderAvailability::Engaged);
    }

    /// Lifecycle instruction: provider released from a trip. Unconditional.
    pub fn mark_available(&self, provider: ProviderId) {
        self.set(provider, ProviderAvailability::Available);
    }

    /// Manual toggle off-duty. Rejected while a non-terminal trip exists so
    /// the flag cannot drift from reality.
    pub fn set_unavailable(&self, provider: ProviderId) -> Result<(), TransitionError> {
        if self.trips.active_trip_for_provider(provider).is_some() {
            warn!(%provider, "rejecting manual off-duty toggle: active trip");
            return Err(TransitionError::HasActiveTrip(provider));
        }
        self.set(provider, ProviderAvailability::Unavailable);
        Ok(())
    }

    /// Manual toggle on-duty. Rejected while a non-terminal trip exists; the
    /// trip's own completion will release the provider.
    pub fn set_available(&self, provider: ProviderId) -> Result<(), TransitionError> {
        if self.trips.active_trip_for_provider(provider).is_some() {
            warn!(%provider, "rejecting manual on-duty toggle: active trip");
            return Err(TransitionError::HasActiveTrip(provider));
        }
        self.set(provider, ProviderAvailability::Available);
        Ok(())
    }

    /// Reconnect/resume path: re-derive the flag from the authoritative trip
    /// store instead of trusting whatever was cached. A manual `Unavailable`
    /// survives a resync with no active trip.
    pub fn resync(&self, provider: ProviderId) -> ProviderAvailability {
        let derived = if self.trips.active_trip_for_provider(provider).is_some() {
            ProviderAvailability::Engaged
        } else if self.status_of(provider) == ProviderAvailability::Unavailable {
            ProviderAvailability::Unavailable
        } else {
            ProviderAvailability::Available
        };
        info!(%provider, ?derived, "availability resynced from trip store");
        self.set(provider, derived);
        derived
    }
}

//! Transition events emitted by the lifecycle module.
//!
//! The state machine is the single writer of truth; availability, reporting,
//! and notification readers subscribe to these events instead of polling
//! shared state.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trip::{CancelActor, ProviderId, TripId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TripEventKind {
    Assigned { provider: ProviderId },
    ProviderArrived,
    PickupCodeIssued,
    Started,
    DropCodeIssued,
    Completed {
        distance_km: f64,
        duration_minutes: f64,
        total_fare: f64,
    },
    Cancelled {
        reason: String,
        by: CancelActor,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEvent {
    pub trip_id: TripId,
    pub at: DateTime<Utc>,
    pub kind: TripEventKind,
}

/// A reader of transition events. Observers must not block; they run on the
/// writer's call path.
pub trait LifecycleObserver: Send + Sync {
    fn on_event(&self, event: &TripEvent);
}

/// Append-only log of every transition, in commit order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<TripEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, event: TripEvent) {
        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event);
    }

    pub fn snapshot(&self) -> Vec<TripEvent> {
        let events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.clone()
    }

    pub fn len(&self) -> usize {
        let events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keeps_commit_order() {
        let log = EventLog::new();
        let trip_id = TripId::new();
        let at = Utc::now();
        log.append(TripEvent {
            trip_id,
            at,
            kind: TripEventKind::ProviderArrived,
        });
        log.append(TripEvent {
            trip_id,
            at,
            kind: TripEventKind::Started,
        });

        let events = log.snapshot();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, TripEventKind::ProviderArrived);
        assert_eq!(events[1].kind, TripEventKind::Started);
    }
}

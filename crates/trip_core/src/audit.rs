//! Append-only diagnostic log of distance-estimation decisions.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trip::TripId;

/// One estimation decision: which tier was used and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationAuditRecord {
    pub trip_id: TripId,
    pub at: DateTime<Utc>,
    /// 1 = breadcrumbs, 2 = routed, 3 = geometric.
    pub tier: u8,
    pub reason: String,
    pub breadcrumb_count: usize,
    /// Raw breadcrumb path distance, when at least two samples existed.
    pub path_km: Option<f64>,
    /// Straight-line pickup-to-dropoff distance used for plausibility checks.
    pub baseline_km: f64,
    pub distance_km: f64,
    pub duration_minutes: f64,
    /// True when the path was accepted above the plausibility ceiling.
    pub flagged: bool,
}

/// In-memory append-only audit log. Records are only ever added.
#[derive(Debug, Default)]
pub struct EstimationAuditLog {
    records: Mutex<Vec<EstimationAuditRecord>>,
}

impl EstimationAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: EstimationAuditRecord) {
        let mut records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(record);
    }

    pub fn snapshot(&self) -> Vec<EstimationAuditRecord> {
        let records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.clone()
    }

    pub fn len(&self) -> usize {
        let records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_insertion_order() {
        let log = EstimationAuditLog::new();
        for tier in [1u8, 3, 2] {
            log.append(EstimationAuditRecord {
                trip_id: TripId::new(),
                at: Utc::now(),
                tier,
                reason: "test".to_string(),
                breadcrumb_count: 0,
                path_km: None,
                baseline_km: 1.0,
                distance_km: 1.3,
                duration_minutes: 5.0,
                flagged: false,
            });
        }
        let records = log.snapshot();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records.iter().map(|r| r.tier).collect::<Vec<_>>(),
            vec![1, 3, 2]
        );
    }
}

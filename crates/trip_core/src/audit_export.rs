//! Parquet export of completed-trip fare rows and estimation audit rows for
//! downstream reporting and dispute resolution.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, UInt64Array, UInt8Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use thiserror::Error;

use crate::audit::EstimationAuditRecord;
use crate::trip::Trip;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flatten completed trips with a persisted fare into one row per trip, one
/// column per breakdown component. Trips without a fare are skipped.
pub fn write_fare_rows_parquet<P: AsRef<Path>>(path: P, trips: &[Trip]) -> Result<(), ExportError> {
    let rows: Vec<&Trip> = trips.iter().filter(|t| t.fare.is_some()).collect();

    let mut trip_ids = Vec::with_capacity(rows.len());
    let mut booking_types = Vec::with_capacity(rows.len());
    let mut ended_at_ms = Vec::with_capacity(rows.len());
    let mut base_fare = Vec::with_capacity(rows.len());
    let mut distance_fare = Vec::with_capacity(rows.len());
    let mut time_fare = Vec::with_capacity(rows.len());
    let mut surge_charge = Vec::with_capacity(rows.len());
    let mut deadhead_charge = Vec::with_capacity(rows.len());
    let mut extra_distance_charge = Vec::with_capacity(rows.len());
    let mut provider_allowance = Vec::with_capacity(rows.len());
    let mut platform_fee = Vec::with_capacity(rows.len());
    let mut tax_on_charges = Vec::with_capacity(rows.len());
    let mut tax_on_platform_fee = Vec::with_capacity(rows.len());
    let mut total_fare = Vec::with_capacity(rows.len());
    let mut distance_km = Vec::with_capacity(rows.len());
    let mut duration_minutes = Vec::with_capacity(rows.len());
    let mut estimate_tier = Vec::with_capacity(rows.len());

    for trip in rows {
        let fare = match &trip.fare {
            Some(fare) => fare,
            None => continue,
        };
        trip_ids.push(trip.id.to_string());
        booking_types.push(format!("{:?}", trip.booking_type));
        ended_at_ms.push(trip.ended_at.map(|t| t.timestamp_millis()));
        base_fare.push(fare.base_fare);
        distance_fare.push(fare.distance_fare);
        time_fare.push(fare.time_fare);
        surge_charge.push(fare.surge_charge);
        deadhead_charge.push(fare.deadhead_charge);
        extra_distance_charge.push(fare.extra_distance_charge);
        provider_allowance.push(fare.provider_allowance);
        platform_fee.push(fare.platform_fee);
        tax_on_charges.push(fare.tax_on_charges);
        tax_on_platform_fee.push(fare.tax_on_platform_fee);
        total_fare.push(fare.total_fare);
        distance_km.push(fare.details.actual_distance_km);
        duration_minutes.push(fare.details.actual_duration_minutes);
        estimate_tier.push(fare.details.estimate_tier);
    }

    let schema = Schema::new(vec![
        Field::new("trip_id", DataType::Utf8, false),
        Field::new("booking_type", DataType::Utf8, false),
        Field::new("ended_at_ms", DataType::Int64, true),
        Field::new("base_fare", DataType::Float64, false),
        Field::new("distance_fare", DataType::Float64, false),
        Field::new("time_fare", DataType::Float64, false),
        Field::new("surge_charge", DataType::Float64, false),
        Field::new("deadhead_charge", DataType::Float64, false),
        Field::new("extra_distance_charge", DataType::Float64, false),
        Field::new("provider_allowance", DataType::Float64, false),
        Field::new("platform_fee", DataType::Float64, false),
        Field::new("tax_on_charges", DataType::Float64, false),
        Field::new("tax_on_platform_fee", DataType::Float64, false),
        Field::new("total_fare", DataType::Float64, false),
        Field::new("distance_km", DataType::Float64, false),
        Field::new("duration_minutes", DataType::Float64, false),
        Field::new("estimate_tier", DataType::UInt8, false),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(trip_ids)),
        Arc::new(StringArray::from(booking_types)),
        Arc::new(Int64Array::from(ended_at_ms)),
        Arc::new(Float64Array::from(base_fare)),
        Arc::new(Float64Array::from(distance_fare)),
        Arc::new(Float64Array::from(time_fare)),
        Arc::new(Float64Array::from(surge_charge)),
        Arc::new(Float64Array::from(deadhead_charge)),
        Arc::new(Float64Array::from(extra_distance_charge)),
        Arc::new(Float64Array::from(provider_allowance)),
        Arc::new(Float64Array::from(platform_fee)),
        Arc::new(Float64Array::from(tax_on_charges)),
        Arc::new(Float64Array::from(tax_on_platform_fee)),
        Arc::new(Float64Array::from(total_fare)),
        Arc::new(Float64Array::from(distance_km)),
        Arc::new(Float64Array::from(duration_minutes)),
        Arc::new(UInt8Array::from(estimate_tier)),
    ];

    write_record_batch(path, schema, arrays)
}

/// One row per distance-estimation decision.
pub fn write_estimation_audit_parquet<P: AsRef<Path>>(
    path: P,
    records: &[EstimationAuditRecord],
) -> Result<(), ExportError> {
    let mut trip_ids = Vec::with_capacity(records.len());
    let mut at_ms = Vec::with_capacity(records.len());
    let mut tiers = Vec::with_capacity(records.len());
    let mut reasons = Vec::with_capacity(records.len());
    let mut breadcrumb_counts = Vec::with_capacity(records.len());
    let mut path_km = Vec::with_capacity(records.len());
    let mut baseline_km = Vec::with_capacity(records.len());
    let mut distance_km = Vec::with_capacity(records.len());
    let mut duration_minutes = Vec::with_capacity(records.len());
    let mut flagged = Vec::with_capacity(records.len());

    for record in records {
        trip_ids.push(record.trip_id.to_string());
        at_ms.push(record.at.timestamp_millis());
        tiers.push(record.tier);
        reasons.push(record.reason.clone());
        breadcrumb_counts.push(record.breadcrumb_count as u64);
        path_km.push(record.path_km);
        baseline_km.push(record.baseline_km);
        distance_km.push(record.distance_km);
        duration_minutes.push(record.duration_minutes);
        flagged.push(record.flagged);
    }

    let schema = Schema::new(vec![
        Field::new("trip_id", DataType::Utf8, false),
        Field::new("at_ms", DataType::Int64, false),
        Field::new("tier", DataType::UInt8, false),
        Field::new("reason", DataType::Utf8, false),
        Field::new("breadcrumb_count", DataType::UInt64, false),
        Field::new("path_km", DataType::Float64, true),
        Field::new("baseline_km", DataType::Float64, false),
        Field::new("distance_km", DataType::Float64, false),
        Field::new("duration_minutes", DataType::Float64, false),
        Field::new("flagged", DataType::Boolean, false),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(trip_ids)),
        Arc::new(Int64Array::from(at_ms)),
        Arc::new(UInt8Array::from(tiers)),
        Arc::new(StringArray::from(reasons)),
        Arc::new(UInt64Array::from(breadcrumb_counts)),
        Arc::new(Float64Array::from(path_km)),
        Arc::new(Float64Array::from(baseline_km)),
        Arc::new(Float64Array::from(distance_km)),
        Arc::new(Float64Array::from(duration_minutes)),
        Arc::new(BooleanArray::from(flagged)),
    ];

    write_record_batch(path, schema, arrays)
}

fn write_record_batch<P: AsRef<Path>>(
    path: P,
    schema: Schema,
    arrays: Vec<ArrayRef>,
) -> Result<(), ExportError> {
    let schema = Arc::new(schema);
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

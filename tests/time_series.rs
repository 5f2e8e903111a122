use chrono::{DateTime, Duration, TimeZone, Utc};
use chronos_series::model::{decode_row, decode_rows};
use chronos_series::storage::{MemoryTable, Options, Table};
use chronos_series::{
    BucketSize, FieldMap, IntoFieldMap, SeriesConfig, SeriesError, StorageError, TimeSeriesTable,
    Value, BUCKET_FIELD,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Reading {
    id: Uuid,
    at: DateTime<Utc>,
    celsius: f64,
}

impl IntoFieldMap for Reading {
    fn into_field_map(self) -> Result<FieldMap, SeriesError> {
        let mut m = FieldMap::new();
        m.insert("id".into(), self.id.into());
        m.insert("at".into(), self.at.into());
        m.insert("celsius".into(), self.celsius.into());
        Ok(m)
    }
}

fn hourly() -> TimeSeriesTable<MemoryTable> {
    let config = SeriesConfig::new("at", "id", BucketSize::from_secs(3600).unwrap()).unwrap();
    let series = TimeSeriesTable::in_memory("readings", config);
    series.create().unwrap();
    series
}

fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, h, m, s).unwrap()
}

fn reading(at: DateTime<Utc>, celsius: f64) -> Reading {
    Reading { id: Uuid::new_v4(), at, celsius }
}

#[test]
fn scenario_hour_buckets() {
    let series = hourly();
    let r = reading(utc(0, 30, 0), 20.0);
    series.set(r.clone()).unwrap().run().unwrap();

    let found = series.list(utc(0, 0, 0), utc(1, 0, 0)).run().unwrap();
    assert_eq!(decode_rows::<Reading>(found).unwrap(), vec![r]);

    let later = series.list(utc(1, 0, 1), utc(2, 0, 0)).run().unwrap();
    assert!(later.is_empty());
}

#[test]
fn stored_row_carries_scaled_bucket() {
    let series = hourly();
    let r = reading(utc(0, 30, 0), 20.0);
    series.set(r.clone()).unwrap().run().unwrap();

    let row = series.read(r.at, r.id).fetch_one().unwrap();
    assert_eq!(row[BUCKET_FIELD], Value::Int(1_609_459_200_000));
}

#[test]
fn write_then_read_at_window_edges() {
    let series = hourly();
    let edges = [utc(1, 0, 0), utc(0, 59, 59), utc(1, 59, 59) + Duration::milliseconds(999)];
    for at in edges {
        let r = reading(at, 1.0);
        series.set(r.clone()).unwrap().run().unwrap();
        let rows = series.read(r.at, r.id).run().unwrap();
        assert_eq!(decode_rows::<Reading>(rows).unwrap(), vec![r]);
    }
}

#[test]
fn list_includes_row_exactly_at_end() {
    let series = hourly();
    let r = reading(utc(1, 0, 0), 5.0);
    series.set(r.clone()).unwrap().run().unwrap();

    let rows = series.list(utc(0, 15, 0), utc(1, 0, 0)).run().unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn list_spans_many_buckets_and_trims_edges() {
    let series = hourly();
    let mut inside = Vec::new();
    for minutes in (0..6 * 60).step_by(17) {
        let r = reading(utc(0, 0, 0) + Duration::minutes(minutes), minutes as f64);
        series.set(r.clone()).unwrap().run().unwrap();
        if r.at >= utc(1, 10, 0) && r.at <= utc(4, 20, 0) {
            inside.push(r);
        }
    }

    let rows = series.list(utc(1, 10, 0), utc(4, 20, 0)).run().unwrap();
    let mut got = decode_rows::<Reading>(rows).unwrap();
    got.sort_by_key(|r| r.at);
    assert_eq!(got, inside);
}

#[test]
fn reversed_range_reads_nothing() {
    let series = hourly();
    series.set(reading(utc(0, 30, 0), 1.0)).unwrap().run().unwrap();

    assert_eq!(series.buckets(utc(2, 0, 0), utc(0, 0, 0)).count(), 0);
    assert!(series.list(utc(2, 0, 0), utc(0, 0, 0)).run().unwrap().is_empty());
}

#[test]
fn update_patches_only_the_keyed_row() {
    let series = hourly();
    let a = reading(utc(0, 10, 0), 1.0);
    let b = reading(utc(0, 10, 0), 2.0);
    series.set(a.clone()).unwrap().run().unwrap();
    series.set(b.clone()).unwrap().run().unwrap();

    let mut patch = FieldMap::new();
    patch.insert("celsius".into(), Value::Float(99.0));
    series.update(a.at, a.id, patch).run().unwrap();

    let a_row: Reading = decode_row(series.read(a.at, a.id).fetch_one().unwrap()).unwrap();
    let b_row: Reading = decode_row(series.read(b.at, b.id).fetch_one().unwrap()).unwrap();
    assert_eq!(a_row.celsius, 99.0);
    assert_eq!(b_row, b);
}

#[test]
fn repeated_update_builds_identical_predicates() {
    let series = hourly();
    let id = Uuid::new_v4();
    let mut patch = FieldMap::new();
    patch.insert("celsius".into(), Value::Float(4.0));

    let first = series.update(utc(3, 3, 3), id, patch.clone());
    let second = series.update(utc(3, 3, 3), id, patch);
    assert_eq!(first.kind(), second.kind());
}

#[test]
fn delete_removes_single_row() {
    let series = hourly();
    let a = reading(utc(0, 10, 0), 1.0);
    let b = reading(utc(0, 20, 0), 2.0);
    series.set(a.clone()).unwrap().run().unwrap();
    series.set(b.clone()).unwrap().run().unwrap();

    series.delete(a.at, a.id).run().unwrap();

    assert_eq!(series.read(a.at, a.id).run(), Err(StorageError::NotFound(series.name())));
    assert_eq!(series.list(utc(0, 0, 0), utc(0, 59, 0)).run().unwrap().len(), 1);
}

#[test]
fn read_with_wrong_timestamp_misses() {
    let series = hourly();
    let r = reading(utc(0, 30, 0), 1.0);
    series.set(r.clone()).unwrap().run().unwrap();

    assert!(series.read(r.at + Duration::seconds(1), r.id).run().is_err());
}

#[test]
fn with_options_shares_rows_but_not_settings() {
    let series = hourly();
    for m in 0..5 {
        series.set(reading(utc(0, m, 0), 0.0)).unwrap().run().unwrap();
    }

    let limited = series.with_options(Options::default().with_limit(2));
    assert_eq!(limited.list(utc(0, 0, 0), utc(1, 0, 0)).run().unwrap().len(), 2);
    assert_eq!(series.list(utc(0, 0, 0), utc(1, 0, 0)).run().unwrap().len(), 5);
}

#[test]
fn write_refusals_never_reach_the_table() {
    let series = hourly();
    let mut row = FieldMap::new();
    row.insert("id".into(), Value::Int(1));
    row.insert("at".into(), Value::Int(1_609_461_000));

    assert!(matches!(series.set(row), Err(SeriesError::Type { .. })));
    assert!(matches!(series.set(serde_json::json!(42)), Err(SeriesError::Conversion(_))));
    assert!(series.table().read(vec![]).run().unwrap().is_empty());
}

#[test]
fn lifecycle_is_forwarded() {
    let config = SeriesConfig::new("at", "id", BucketSize::from_secs(900).unwrap()).unwrap();
    let series = TimeSeriesTable::in_memory("events", config);

    assert_eq!(series.name(), "events_timeSeries_at_id_15m0s");
    assert!(matches!(
        series.list(utc(0, 0, 0), utc(1, 0, 0)).run(),
        Err(StorageError::TableMissing(_))
    ));

    series.create_if_not_exist().unwrap();
    series.set(reading(utc(0, 0, 0), 0.0)).unwrap().run().unwrap();
    series.recreate().unwrap();
    assert!(series.list(utc(0, 0, 0), utc(1, 0, 0)).run().unwrap().is_empty());

    assert_eq!(
        series.create_if_not_exist_statement().unwrap(),
        "CREATE TABLE IF NOT EXISTS events_timeSeries_at_id_15m0s \
         (bucket blob, at blob, id blob, PRIMARY KEY ((bucket), at, id))"
    );
}

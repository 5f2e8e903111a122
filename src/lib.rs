pub mod bucket;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod parser;
pub mod storage;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::bucket::Buckets;
use crate::filter::{eq, gte, is_in, lte, Relation};
use crate::storage::{Keys, MemoryTable, Options, Table};

pub use crate::bucket::BucketSize;
pub use crate::config::SeriesConfig;
pub use crate::error::{ConfigError, SeriesError, StorageError};
pub use crate::model::{FieldMap, IntoFieldMap, Value};

/// Column holding the bucket value. Persisted; never rename.
pub const BUCKET_FIELD: &str = "bucket";

/// Name of the backing table for a series, e.g. `readings_timeSeries_at_id_1h0m0s`.
/// The size is rendered Go-style so existing tables keep their names.
pub fn series_table_name(base: &str, config: &SeriesConfig) -> String {
    format!(
        "{}_timeSeries_{}_{}_{}",
        base,
        config.time_field(),
        config.id_field(),
        config.bucket_size().legacy_label()
    )
}

/// Time-series view over a generic table.
///
/// Rows are partitioned by `bucket` and clustered by (time, id). Every key
/// lookup derives the bucket from the timestamp the same way writes do, so a
/// row written at `t` is always found again at `t`.
///
/// The accessor performs no I/O; each method returns the underlying table's
/// pending operation.
#[derive(Debug, Clone)]
pub struct TimeSeriesTable<T> {
    table: T,
    config: SeriesConfig,
}

impl TimeSeriesTable<MemoryTable> {
    /// A series backed by a fresh in-memory table keyed `((bucket), time, id)`.
    pub fn in_memory(base: &str, config: SeriesConfig) -> Self {
        let keys = Keys {
            partition: vec![BUCKET_FIELD.to_string()],
            clustering: vec![config.time_field().to_string(), config.id_field().to_string()],
        };
        let table = MemoryTable::new(&series_table_name(base, &config), keys);
        Self::new(table, config)
    }
}

impl<T: Table> TimeSeriesTable<T> {
    pub fn new(table: T, config: SeriesConfig) -> Self {
        Self { table, config }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn config(&self) -> &SeriesConfig {
        &self.config
    }

    pub fn bucket(&self, ts: DateTime<Utc>) -> i64 {
        self.config.bucket_size().bucket_of(ts)
    }

    /// Buckets a `list(start, end)` call will query.
    pub fn buckets(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Buckets {
        self.config.bucket_size().buckets_between(start, end)
    }

    fn key_relations(&self, ts: DateTime<Utc>, id: Value) -> Vec<Relation> {
        vec![
            eq(BUCKET_FIELD, self.bucket(ts)),
            eq(self.config.time_field(), ts),
            eq(self.config.id_field(), id),
        ]
    }

    /// Full-row upsert. The bucket is derived from the record's time field and
    /// injected under `bucket`, replacing anything the caller put there.
    pub fn set<R: IntoFieldMap>(&self, record: R) -> Result<T::Op, SeriesError> {
        let mut row = record.into_field_map()?;
        let time_field = self.config.time_field();

        let ts = match row.get(time_field) {
            Some(Value::Timestamp(ts)) => *ts,
            other => {
                let found = other.map_or("nothing", Value::type_name).to_string();
                warn!(field = time_field, found = %found, "refusing write without a timestamp");
                return Err(SeriesError::Type { field: time_field.to_string(), found });
            }
        };

        let bucket = self.bucket(ts);
        debug!(%ts, bucket, "set");
        row.insert(BUCKET_FIELD.to_string(), Value::Int(bucket));
        Ok(self.table.set(row))
    }

    /// Partial update of the row at `(ts, id)`. The bucket column is never patched.
    pub fn update(&self, ts: DateTime<Utc>, id: impl Into<Value>, mut fields: FieldMap) -> T::Op {
        if fields.remove(BUCKET_FIELD).is_some() {
            warn!("ignoring '{}' in update; rows never change bucket", BUCKET_FIELD);
        }
        self.table.update(self.key_relations(ts, id.into()), fields)
    }

    /// Delete exactly the row at `(ts, id)`.
    pub fn delete(&self, ts: DateTime<Utc>, id: impl Into<Value>) -> T::Op {
        self.table.delete(self.key_relations(ts, id.into()))
    }

    /// Single-row read of `(ts, id)`. Absence is reported however the table reports it.
    pub fn read(&self, ts: DateTime<Utc>, id: impl Into<Value>) -> T::Op {
        self.table.read_one(self.key_relations(ts, id.into()))
    }

    /// All rows with `start <= time <= end`.
    ///
    /// Queries every bucket intersecting the range in one statement; the time
    /// bounds trim the partial buckets at either end. `start > end` yields an
    /// empty bucket set, so the read matches nothing.
    pub fn list(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> T::Op {
        let buckets: Vec<i64> = self.buckets(start, end).collect();
        debug!(%start, %end, buckets = buckets.len(), "list");

        let time_field = self.config.time_field();
        self.table.read(vec![
            is_in(BUCKET_FIELD, buckets),
            gte(time_field, start),
            lte(time_field, end),
        ])
    }

    /// Same series, with the underlying table reconfigured. `self` is untouched.
    pub fn with_options(&self, options: Options) -> Self {
        Self {
            table: self.table.with_options(options),
            config: self.config.clone(),
        }
    }

    // --- LIFECYCLE (forwarded) ---

    pub fn name(&self) -> String {
        self.table.name()
    }

    pub fn create(&self) -> Result<(), T::Error> {
        self.table.create()
    }

    pub fn create_if_not_exist(&self) -> Result<(), T::Error> {
        self.table.create_if_not_exist()
    }

    pub fn recreate(&self) -> Result<(), T::Error> {
        self.table.recreate()
    }

    pub fn create_statement(&self) -> Result<String, T::Error> {
        self.table.create_statement()
    }

    pub fn create_if_not_exist_statement(&self) -> Result<String, T::Error> {
        self.table.create_if_not_exist_statement()
    }
}

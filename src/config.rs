use serde::Deserialize;

use crate::bucket::BucketSize;
use crate::error::ConfigError;
use crate::parser;
use crate::BUCKET_FIELD;

/// Field layout and bucket width of one time series. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesConfig {
    time_field: String,
    id_field: String,
    bucket_size: BucketSize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBucketSize {
    Secs(i64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    time_field: String,
    id_field: String,
    bucket_size: RawBucketSize,
}

impl SeriesConfig {
    pub fn new(
        time_field: &str,
        id_field: &str,
        bucket_size: BucketSize,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            time_field: time_field.to_string(),
            id_field: id_field.to_string(),
            bucket_size,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from JSON, e.g. `{"time_field": "at", "id_field": "id", "bucket_size": "1h"}`.
    /// `bucket_size` may also be a plain number of seconds.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Json(e.to_string()))?;
        let bucket_size = match raw.bucket_size {
            RawBucketSize::Secs(secs) => BucketSize::from_secs(secs)?,
            RawBucketSize::Text(s) => BucketSize::from_duration(parser::parse_duration(&s)?)?,
        };
        Self::new(&raw.time_field, &raw.id_field, bucket_size)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.time_field.is_empty() {
            return Err(ConfigError::EmptyField("time"));
        }
        if self.id_field.is_empty() {
            return Err(ConfigError::EmptyField("id"));
        }
        for field in [&self.time_field, &self.id_field] {
            if field == BUCKET_FIELD {
                return Err(ConfigError::ReservedField(field.clone()));
            }
        }
        if self.time_field == self.id_field {
            return Err(ConfigError::DuplicateField(self.time_field.clone()));
        }
        Ok(())
    }

    pub fn time_field(&self) -> &str {
        &self.time_field
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn bucket_size(&self) -> BucketSize {
        self.bucket_size
    }
}

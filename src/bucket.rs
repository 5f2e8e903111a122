//! Mapping timestamps onto fixed-width time buckets.
//!
//! A bucket value is the start of its window in unix seconds, scaled by 1000:
//!
//! `bucket(t) = floor(t.secs / size) * size * 1000`
//!
//! The x1000 scale is part of the persisted format. Rows written by earlier
//! versions carry it, so it must not change.
//!
//! Windows are half-open `[start, start + size)`: a timestamp sitting exactly
//! on a boundary belongs to the window that starts there. Division floors
//! toward negative infinity so pre-epoch timestamps partition the same way.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::ConfigError;

/// Scale between a bucket's window start (seconds) and its stored value.
pub const BUCKET_SCALE: i64 = 1000;

/// Largest accepted bucket width. Leaves room for a pre-epoch window start
/// (up to one extra window below the timestamp) at the x1000 scale.
pub const MAX_BUCKET_SECS: i64 = i64::MAX / BUCKET_SCALE / 2;

/// Width of a bucket window, in whole seconds. Always > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketSize(i64);

impl BucketSize {
    pub fn from_secs(secs: i64) -> Result<Self, ConfigError> {
        if secs <= 0 || secs > MAX_BUCKET_SECS {
            return Err(ConfigError::InvalidBucketSize(format!("{}s", secs)));
        }
        Ok(Self(secs))
    }

    /// Sub-second parts are not allowed; windows are aligned to whole seconds.
    pub fn from_duration(d: Duration) -> Result<Self, ConfigError> {
        if d.subsec_nanos() != 0 {
            return Err(ConfigError::InvalidBucketSize(format!("{:?}", d)));
        }
        let secs = i64::try_from(d.as_secs())
            .map_err(|_| ConfigError::InvalidBucketSize(format!("{:?}", d)))?;
        Self::from_secs(secs)
    }

    pub fn secs(&self) -> i64 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0 as u64)
    }

    /// Distance between two neighbouring bucket values.
    pub fn step(&self) -> i64 {
        self.0 * BUCKET_SCALE
    }

    /// Saturates for seconds outside the range `DateTime<Utc>` can represent.
    pub fn bucket_from_secs(&self, secs: i64) -> i64 {
        secs.div_euclid(self.0).saturating_mul(self.0).saturating_mul(BUCKET_SCALE)
    }

    /// Duration text as Go's `time.Duration` prints it (`1h0m0s`, `15m0s`, `45s`).
    /// Backing table names of existing series embed this form.
    pub fn legacy_label(&self) -> String {
        let hours = self.0 / 3_600;
        let minutes = (self.0 % 3_600) / 60;
        let secs = self.0 % 60;

        if hours > 0 {
            format!("{}h{}m{}s", hours, minutes, secs)
        } else if minutes > 0 {
            format!("{}m{}s", minutes, secs)
        } else {
            format!("{}s", secs)
        }
    }

    pub fn bucket_of(&self, ts: DateTime<Utc>) -> i64 {
        // `timestamp()` already floors: sub-second parts are never negative.
        self.bucket_from_secs(ts.timestamp())
    }

    /// Every bucket whose window intersects the closed range `[start, end]`,
    /// in ascending order. Empty when `start > end`.
    pub fn buckets_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Buckets {
        if start > end {
            return Buckets::empty(self.step());
        }
        Buckets {
            next: Some(self.bucket_of(start)),
            last: self.bucket_of(end),
            step: self.step(),
        }
    }
}

impl fmt::Display for BucketSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        let days = rest / 86_400;
        rest %= 86_400;
        let hours = rest / 3_600;
        rest %= 3_600;
        let minutes = rest / 60;
        let secs = rest % 60;

        if days > 0 {
            write!(f, "{}d", days)?;
        }
        if hours > 0 {
            write!(f, "{}h", hours)?;
        }
        if minutes > 0 {
            write!(f, "{}m", minutes)?;
        }
        if secs > 0 {
            write!(f, "{}s", secs)?;
        }
        Ok(())
    }
}

/// Ascending iterator over bucket values.
#[derive(Debug, Clone)]
pub struct Buckets {
    next: Option<i64>,
    last: i64,
    step: i64,
}

impl Buckets {
    fn empty(step: i64) -> Self {
        Self { next: None, last: 0, step }
    }
}

impl Iterator for Buckets {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let current = self.next?;
        if current > self.last {
            self.next = None;
            return None;
        }
        self.next = current.checked_add(self.step);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(n) if n <= self.last => {
                let count = ((self.last - n) / self.step + 1) as usize;
                (count, Some(count))
            }
            _ => (0, Some(0)),
        }
    }
}

impl ExactSizeIterator for Buckets {}

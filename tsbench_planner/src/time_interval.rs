//! Half-open time intervals and the group-by bucket generator.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// A half-open span of time, `[start, end)`, in nanoseconds since the Unix epoch (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeInterval {
    start: i64,
    end: i64,
}

impl TimeInterval {
    /// Create an interval, failing if `start` is after `end`
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidTimeSpan { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn from_datetimes(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        Self::new(datetime_to_nanos(start)?, datetime_to_nanos(end)?)
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.start)
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.end)
    }

    pub fn duration_nanos(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp < self.end
    }

    /// True when the two intervals share at least one instant. Touching intervals such as
    /// `[a, b)` and `[b, c)` do not overlap, and neither does an empty interval.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start.max(other.start) < self.end.min(other.end)
    }

    /// The part of this interval that lies within `span`.
    ///
    /// Disjoint intervals collapse to an empty interval at the clamped start.
    pub fn clamp_to(&self, span: &Self) -> Self {
        let start = self.start.max(span.start);
        let end = self.end.min(span.end).max(start);
        Self { start, end }
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start_time().to_rfc3339_opts(SecondsFormat::AutoSi, true),
            self.end_time().to_rfc3339_opts(SecondsFormat::AutoSi, true),
        )
    }
}

pub(crate) fn datetime_to_nanos(t: DateTime<Utc>) -> Result<i64> {
    t.timestamp_nanos_opt()
        .ok_or_else(|| Error::TimestampOutOfRange {
            timestamp: t.to_rfc3339(),
        })
}

pub(crate) fn duration_to_nanos(duration: Duration) -> Result<i64> {
    i64::try_from(duration.as_nanos()).map_err(|_| Error::GroupByOutOfRange { duration })
}

/// One group-by bucket
///
/// `raw` is aligned to a multiple of the bucket width since the epoch, the same rounded boundary
/// InfluxDB uses for `GROUP BY time(...)`. `effective` is `raw` clamped to the query span and is
/// what statements should be bounded by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBucket {
    pub raw: TimeInterval,
    pub effective: TimeInterval,
}

/// Iterator over every epoch-aligned bucket of a fixed width that intersects a span, in
/// ascending time order
#[derive(Debug, Clone)]
pub struct TimeBuckets {
    span: TimeInterval,
    width: i64,
    next_start: Option<i64>,
}

impl TimeBuckets {
    /// Buckets of `width` over `span`. The width must be non-zero.
    pub fn new(span: TimeInterval, width: Duration) -> Result<Self> {
        let width_nanos = duration_to_nanos(width)?;
        if width_nanos == 0 {
            return Err(Error::GroupByOutOfRange { duration: width });
        }

        // the first aligned start can lie before i64::MIN when the span starts near it
        let next_start = (!span.is_empty())
            .then(|| {
                let offset = span.start.rem_euclid(width_nanos);
                span.start
                    .checked_sub(offset)
                    .ok_or(Error::GroupByOutOfRange { duration: width })
            })
            .transpose()?;

        Ok(Self {
            span,
            width: width_nanos,
            next_start,
        })
    }
}

impl Iterator for TimeBuckets {
    type Item = TimeBucket;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        if start >= self.span.end {
            self.next_start = None;
            return None;
        }

        let end = start.saturating_add(self.width);
        // a saturated end means there is no room for another bucket
        self.next_start = (end < self.span.end && end > start).then_some(end);

        let raw = TimeInterval { start, end };
        Some(TimeBucket {
            raw,
            effective: raw.clamp_to(&self.span),
        })
    }
}

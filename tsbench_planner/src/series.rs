//! Catalog entries for the physical series known to the client-side index.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use crate::query::TagSetFilter;
use crate::time_interval::{TimeInterval, datetime_to_nanos};
use crate::{Error, Result};

/// Separator between the segments of a series id
pub const SERIES_ID_DELIMITER: char = '#';

/// Date format of the trailing partition segment in a Cassandra series id
pub const SERIES_DAY_FORMAT: &str = "%Y-%m-%d";

const NANOS_PER_DAY: i64 = 24 * 60 * 60 * 1_000_000_000;

/// One physical time series in the target store
///
/// A series is identified by the table it is stored in and its series id. The id is a
/// `#`-delimited composite key whose second-to-last segment names the field; the tags and the
/// span of time the series holds data for are kept alongside so the planner can filter series
/// without touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    table: Arc<str>,
    id: Arc<str>,
    measurement: Arc<str>,
    field: Arc<str>,
    tags: BTreeMap<String, String>,
    interval: TimeInterval,
}

impl Series {
    pub fn new(
        table: impl Into<Arc<str>>,
        id: impl Into<Arc<str>>,
        measurement: impl Into<Arc<str>>,
        field: impl Into<Arc<str>>,
        tags: impl IntoIterator<Item = (String, String)>,
        interval: TimeInterval,
    ) -> Self {
        Self {
            table: table.into(),
            id: id.into(),
            measurement: measurement.into(),
            field: field.into(),
            tags: tags.into_iter().collect(),
            interval,
        }
    }

    /// Parse a series id in the Cassandra bulk-load layout:
    ///
    /// ```text
    /// <measurement>[,<tag key>=<tag value>...]#<field>#<YYYY-MM-DD>
    /// ```
    ///
    /// The trailing date is the day partition the series covers, so the resulting series is valid
    /// for `[day 00:00 UTC, next day 00:00 UTC)`.
    pub fn parse(table: impl Into<Arc<str>>, id: &str) -> Result<Self> {
        let mut segments = id.split(SERIES_ID_DELIMITER);
        let (Some(key), Some(field), Some(day), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(Error::malformed_series_id(
                id,
                "expected '<measurement,tags>#<field>#<day>'",
            ));
        };

        let mut key_parts = key.split(',');
        let measurement = key_parts.next().unwrap_or_default();
        if measurement.is_empty() {
            return Err(Error::malformed_series_id(id, "empty measurement"));
        }
        if field.is_empty() {
            return Err(Error::malformed_series_id(id, "empty field"));
        }

        let tags = key_parts
            .map(|pair| {
                pair.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| Error::malformed_series_id(id, "tag without '='"))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        let day = NaiveDate::parse_from_str(day, SERIES_DAY_FORMAT)
            .map_err(|_| Error::malformed_series_id(id, "unparseable day partition"))?;
        let start = datetime_to_nanos(day.and_time(NaiveTime::MIN).and_utc())
            .map_err(|_| Error::malformed_series_id(id, "day partition out of range"))?;
        let end = start
            .checked_add(NANOS_PER_DAY)
            .ok_or_else(|| Error::malformed_series_id(id, "day partition out of range"))?;

        Ok(Self {
            table: table.into(),
            id: Arc::from(id),
            measurement: Arc::from(measurement),
            field: Arc::from(field),
            tags,
            interval: TimeInterval::new(start, end)?,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn interval(&self) -> TimeInterval {
        self.interval
    }

    pub fn matches_measurement(&self, measurement: &str) -> bool {
        *self.measurement == *measurement
    }

    pub fn matches_field(&self, field: &str) -> bool {
        *self.field == *field
    }

    pub fn matches_any_field<S: AsRef<str>>(&self, fields: &[S]) -> bool {
        fields.iter().any(|f| self.matches_field(f.as_ref()))
    }

    pub fn matches_tag_sets(&self, filter: &TagSetFilter) -> bool {
        filter.matches(&self.tags)
    }

    pub fn matches_time_interval(&self, interval: &TimeInterval) -> bool {
        self.interval.overlaps(interval)
    }
}

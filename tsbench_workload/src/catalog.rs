//! Derives the series catalog of a devops dataset from its metadata alone.
//!
//! The bulk loader never reports back which series it created, so the planner's index is rebuilt
//! from the same scale, seed and time range the data was generated with.

use chrono::{DateTime, Days, NaiveDate, TimeDelta, Utc};
use tracing::info;
use tsbench_data::series_id;
use tsbench_planner::Series;

use crate::devops::{CPU_METRICS, DevopsModel, MEASUREMENT};
use crate::{Error, Result};

/// Table holding the float CPU metrics
pub const SERIES_TABLE: &str = "series_double";

/// Every series the devops dataset over `[start, end)` stores: one per host, CPU metric and UTC
/// day the range touches
pub fn build_catalog(
    model: &DevopsModel,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Series>> {
    if start > end {
        return Err(Error::InvalidTimeRange { start, end });
    }

    let days = days_touched(start, end);
    let mut catalog = Vec::with_capacity(model.scale() * CPU_METRICS.len() * days.len());
    for host in model.hosts() {
        let tags = host.tags();
        for metric in CPU_METRICS {
            for day in &days {
                let id = series_id(MEASUREMENT, &tags, metric, *day);
                catalog.push(Series::parse(SERIES_TABLE, &id)?);
            }
        }
    }

    info!(
        hosts = model.scale(),
        days = days.len(),
        series = catalog.len(),
        "built series catalog"
    );
    Ok(catalog)
}

fn days_touched(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<NaiveDate> {
    if start == end {
        return vec![];
    }
    let last = (end - TimeDelta::nanoseconds(1)).date_naive();
    let mut day = start.date_naive();
    let mut days = vec![];
    while day <= last {
        days.push(day);
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}

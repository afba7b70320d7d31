//! Seeded synthetic CPU readings for the devops fleet.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;
use tsbench_data::Point;

use crate::devops::{CPU_METRICS, DevopsModel, Host, MEASUREMENT};
use crate::{Error, Result};

const MAX_STEP: f64 = 1.0;

/// Emits one `cpu` point per host every `interval` in `[start, end)`, host by host within each
/// timestamp
///
/// Each metric follows its own random walk clamped to `[0, 100]`. The same model, range and seed
/// always produce the same points.
#[derive(Debug)]
pub struct CpuSimulator {
    hosts: Vec<Host>,
    usage: Vec<[f64; CPU_METRICS.len()]>,
    now: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: TimeDelta,
    next_host: usize,
    rng: SmallRng,
}

impl CpuSimulator {
    pub fn new(
        model: &DevopsModel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Duration,
        seed: u64,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::ZeroInterval);
        }
        if start > end {
            return Err(Error::InvalidTimeRange { start, end });
        }
        let interval =
            TimeDelta::from_std(interval).map_err(|_| Error::InvalidTimeRange { start, end })?;

        let mut rng = SmallRng::seed_from_u64(seed);
        let usage = model
            .hosts()
            .iter()
            .map(|_| std::array::from_fn(|_| round(rng.gen_range(0.0..=100.0))))
            .collect();

        debug!(hosts = model.scale(), %start, %end, ?interval, "starting cpu simulation");
        Ok(Self {
            hosts: model.hosts().to_vec(),
            usage,
            now: start,
            end,
            interval,
            next_host: 0,
            rng,
        })
    }

    fn point(&self, host: usize) -> Point {
        let mut point = Point::new(MEASUREMENT);
        for (key, value) in self.hosts[host].tags() {
            point.append_tag(key, value);
        }
        for (metric, value) in CPU_METRICS.iter().zip(self.usage[host]) {
            point.append_field(*metric, value);
        }
        point.set_timestamp(self.now);
        point
    }

    fn step(&mut self, host: usize) {
        for value in &mut self.usage[host] {
            let step = self.rng.gen_range(-MAX_STEP..=MAX_STEP);
            *value = round((*value + step).clamp(0.0, 100.0));
        }
    }
}

impl Iterator for CpuSimulator {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        if self.hosts.is_empty() || self.now >= self.end {
            return None;
        }

        let host = self.next_host;
        let point = self.point(host);
        self.step(host);

        self.next_host += 1;
        if self.next_host == self.hosts.len() {
            self.next_host = 0;
            self.now = self.now.checked_add_signed(self.interval).unwrap_or(self.end);
        }
        Some(point)
    }
}

fn round(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tsbench_data::{CassandraSerializer, write_points};
    use tsbench_planner::{ClientSideIndex, HighLevelQuery, QueryPlan, QueryPlanner, StatementArg};

    use super::*;
    use crate::catalog::{SERIES_TABLE, build_catalog};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap()
    }

    fn simulate(scale: usize, minutes: i64, seed: u64) -> (DevopsModel, Vec<Point>) {
        let model = DevopsModel::new(scale, seed);
        let end = start() + TimeDelta::minutes(minutes);
        let points = CpuSimulator::new(&model, start(), end, Duration::from_secs(60), seed)
            .unwrap()
            .collect();
        (model, points)
    }

    #[test]
    fn one_point_per_host_per_interval() {
        let (_, points) = simulate(3, 5, 1);
        assert_eq!(points.len(), 15);
        let hostname = |p: &Point| {
            p.tag_value("hostname")
                .and_then(|v| v.as_text())
                .map(String::from)
        };
        assert_eq!(hostname(&points[0]).as_deref(), Some("host_0"));
        assert_eq!(hostname(&points[2]).as_deref(), Some("host_2"));
        assert_eq!(points[3].timestamp(), Some(start() + TimeDelta::minutes(1)));
        assert_eq!(points[0].fields().len(), CPU_METRICS.len());
    }

    #[test]
    fn readings_are_bounded_and_reproducible() {
        let (_, a) = simulate(2, 30, 5);
        let (_, b) = simulate(2, 30, 5);
        assert_eq!(a, b);
        for point in &a {
            for (_, value) in point.fields() {
                let value = value.as_ref().and_then(|v| v.as_f64()).unwrap();
                assert!((0.0..=100.0).contains(&value));
                assert_eq!(value, round(value));
            }
        }
    }

    #[test]
    fn invalid_configuration() {
        let model = DevopsModel::new(1, 0);
        assert!(matches!(
            CpuSimulator::new(&model, start(), start(), Duration::ZERO, 0),
            Err(Error::ZeroInterval)
        ));
        assert!(matches!(
            CpuSimulator::new(
                &model,
                start() + TimeDelta::hours(1),
                start(),
                Duration::from_secs(1),
                0
            ),
            Err(Error::InvalidTimeRange { .. })
        ));
        let mut empty =
            CpuSimulator::new(&model, start(), start(), Duration::from_secs(1), 0).unwrap();
        assert!(empty.next().is_none());
    }

    #[test]
    fn loaded_series_ids_match_the_catalog() {
        let (model, points) = simulate(4, 10, 3);
        let mut out = vec![];
        write_points(&CassandraSerializer, &points, &mut out).unwrap();
        let loaded: BTreeSet<_> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| {
                let mut cols = line.split(',');
                let table = cols.next().unwrap().to_string();
                let rest: Vec<_> = cols.collect();
                // the series id itself contains commas; the last two columns are time and value
                (table, rest[..rest.len() - 2].join(","))
            })
            .collect();

        let end = start() + TimeDelta::minutes(10);
        let catalog: BTreeSet<_> = build_catalog(&model, start(), end)
            .unwrap()
            .into_iter()
            .map(|s| (s.table().to_string(), s.id().to_string()))
            .collect();
        assert_eq!(loaded, catalog);
        assert!(catalog.iter().all(|(table, _)| table == SERIES_TABLE));
    }

    #[test_log::test]
    fn catalog_feeds_the_planner() {
        let model = DevopsModel::new(4, 3);
        let end = start() + TimeDelta::hours(2);
        let index = ClientSideIndex::new(build_catalog(&model, start(), end).unwrap());
        let planner = QueryPlanner::new(index.into());

        let mut query = HighLevelQuery::new("cpu", "usage_user", start(), end);
        query.aggregation_type = "max".to_string();
        query.group_by_duration = Duration::from_secs(3600);
        query.tag_sets = vec![vec!["hostname=host_1".to_string()]];

        let QueryPlan::WithServerAggregation(plan) = planner.plan(&query).unwrap() else {
            panic!("expected a server aggregation plan");
        };
        assert_eq!(plan.buckets.len(), 2);
        for bucket in &plan.buckets {
            assert_eq!(bucket.statements.len(), 1);
            assert!(matches!(
                &bucket.statements[0].args()[0],
                StatementArg::Text(id) if id.starts_with("cpu,hostname=host_1,")
            ));
        }
    }
}

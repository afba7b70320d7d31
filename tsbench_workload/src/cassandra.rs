//! High-level queries for a Cassandra store, planned client side before execution.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use humantime::format_duration;
use tsbench_planner::HighLevelQuery;

use crate::devops::{self, DevopsCore, HOSTNAME_TAG, MEASUREMENT};
use crate::usecase::{Backend, DevopsGeneratorMaker, DevopsQueries, GeneratorConfig};
use crate::{CPU_METRICS, Result};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);
const DOUBLE_GROUPBY_WINDOW: Duration = Duration::from_secs(12 * 3600);
const HIGH_CPU_WINDOW: Duration = Duration::from_secs(12 * 3600);
const HIGH_CPU_THRESHOLD: &str = "usage_user,>,90.0";
const ORDER_BY_TIME_DESC: &str = "timestamp_ns DESC";

#[derive(Debug, Clone, Copy, Default)]
pub struct CassandraBackend;

impl Backend for CassandraBackend {
    fn name(&self) -> &str {
        "cassandra"
    }

    fn as_devops(&self) -> Option<&dyn DevopsGeneratorMaker> {
        Some(self)
    }
}

impl DevopsGeneratorMaker for CassandraBackend {
    fn new_devops(&self, config: &GeneratorConfig) -> Result<Box<dyn DevopsQueries>> {
        Ok(Box::new(CassandraDevops {
            core: DevopsCore::new(config)?,
        }))
    }
}

#[derive(Debug)]
struct CassandraDevops {
    core: DevopsCore,
}

impl CassandraDevops {
    fn fill(
        query: &mut HighLevelQuery,
        label: String,
        metrics: &[&str],
        aggregation: &str,
        (start, end): (DateTime<Utc>, DateTime<Utc>),
        group_by: Duration,
        tag_sets: Vec<Vec<String>>,
    ) {
        query.human_description = format!(
            "{label}: {}",
            start.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        );
        query.human_label = label;
        query.measurement_name = MEASUREMENT.to_string();
        query.field_name = metrics.join(",");
        query.aggregation_type = aggregation.to_string();
        query.time_start = start;
        query.time_end = end;
        query.group_by_duration = group_by;
        query.tag_sets = tag_sets;
    }
}

impl DevopsQueries for CassandraDevops {
    fn group_by_time(
        &mut self,
        query: &mut HighLevelQuery,
        hosts: usize,
        metrics: usize,
        window: Duration,
    ) -> Result<()> {
        let metrics = devops::cpu_metrics(metrics)?;
        let hostnames = self.core.random_hosts(hosts)?;
        let interval = self.core.random_window(window)?;
        let label = format!(
            "Cassandra {} cpu metric(s), random {hosts:>4} hosts, random {} by 1m",
            metrics.len(),
            format_duration(window)
        );
        Self::fill(
            query,
            label,
            metrics,
            "max",
            interval,
            MINUTE,
            devops::host_tag_sets(&hostnames),
        );
        Ok(())
    }

    fn max_all_cpu(
        &mut self,
        query: &mut HighLevelQuery,
        hosts: usize,
        window: Duration,
    ) -> Result<()> {
        let hostnames = self.core.random_hosts(hosts)?;
        let interval = self.core.random_window(window)?;
        let label = format!(
            "Cassandra max cpu all fields, rand {hosts:>4} hosts, rand {} by 1h",
            format_duration(window)
        );
        Self::fill(
            query,
            label,
            &CPU_METRICS,
            "max",
            interval,
            HOUR,
            devops::host_tag_sets(&hostnames),
        );
        Ok(())
    }

    fn group_by_time_and_primary_tag(
        &mut self,
        query: &mut HighLevelQuery,
        metrics: usize,
    ) -> Result<()> {
        let metrics = devops::cpu_metrics(metrics)?;
        let interval = self.core.random_window(DOUBLE_GROUPBY_WINDOW)?;
        let label = format!(
            "Cassandra mean of {} metrics, all hosts, random {} by 1h",
            metrics.len(),
            format_duration(DOUBLE_GROUPBY_WINDOW)
        );
        Self::fill(query, label, metrics, "avg", interval, HOUR, vec![]);
        Ok(())
    }

    fn group_by_orderby_limit(&mut self, query: &mut HighLevelQuery) -> Result<()> {
        let interval = self.core.random_window(HOUR)?;
        let label = "Cassandra max cpu over last 5 min-intervals (random end)".to_string();
        Self::fill(
            query,
            label,
            &CPU_METRICS[..1],
            "max",
            interval,
            MINUTE,
            vec![],
        );
        query.order_by = ORDER_BY_TIME_DESC.to_string();
        query.limit = Some(5);
        Ok(())
    }

    fn high_cpu_for_hosts(&mut self, query: &mut HighLevelQuery, hosts: usize) -> Result<()> {
        let (tag_sets, which) = if hosts == 0 {
            (vec![], "all hosts".to_string())
        } else {
            let hostnames = self.core.random_hosts(hosts)?;
            (devops::host_tag_sets(&hostnames), format!("{hosts} host(s)"))
        };
        let interval = self.core.random_window(HIGH_CPU_WINDOW)?;
        let label = format!("Cassandra CPU over threshold, {which}");
        Self::fill(
            query,
            label,
            &CPU_METRICS,
            "",
            interval,
            Duration::ZERO,
            tag_sets,
        );
        query.where_clause = HIGH_CPU_THRESHOLD.to_string();
        Ok(())
    }

    fn last_point_per_host(&mut self, query: &mut HighLevelQuery) -> Result<()> {
        let interval = (self.core.start(), self.core.end());
        let label = "Cassandra last row per host".to_string();
        Self::fill(
            query,
            label,
            &CPU_METRICS,
            "",
            interval,
            Duration::ZERO,
            vec![],
        );
        query.for_every_n = format!("{HOSTNAME_TAG},1");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::Error;

    fn queries(scale: usize) -> Box<dyn DevopsQueries> {
        let config = GeneratorConfig {
            start: Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2016, 1, 2, 0, 0, 0).unwrap(),
            scale,
            seed: 42,
        };
        CassandraBackend.new_devops(&config).unwrap()
    }

    fn empty() -> HighLevelQuery {
        HighLevelQuery::new("", "", DateTime::<Utc>::UNIX_EPOCH, DateTime::<Utc>::UNIX_EPOCH)
    }

    #[test]
    fn cassandra_serves_devops_only() {
        assert!(CassandraBackend.supports(crate::UseCase::Devops));
        assert!(!CassandraBackend.supports(crate::UseCase::Iot));
    }

    #[test]
    fn single_groupby() {
        let mut q = empty();
        queries(10)
            .group_by_time(&mut q, 8, 5, Duration::from_secs(3600))
            .unwrap();

        assert_eq!(
            q.human_label,
            "Cassandra 5 cpu metric(s), random    8 hosts, random 1h by 1m"
        );
        assert!(q.human_description.starts_with(&q.human_label));
        assert_eq!(q.measurement_name, "cpu");
        assert_eq!(
            q.field_name,
            "usage_user,usage_system,usage_idle,usage_nice,usage_iowait"
        );
        assert_eq!(q.aggregation_type, "max");
        assert_eq!(q.group_by_duration, MINUTE);
        assert_eq!(q.time_end - q.time_start, TimeDelta::hours(1));
        assert_eq!(q.tag_sets.len(), 8);
        assert!(q.tag_sets.iter().all(|c| c.len() == 1 && c[0].starts_with("hostname=host_")));
        assert_eq!(q.tag_filter().unwrap().clauses().len(), 8);
    }

    #[test]
    fn high_cpu_all_has_no_tag_filter() {
        let mut q = empty();
        queries(10).high_cpu_for_hosts(&mut q, 0).unwrap();
        assert_eq!(q.human_label, "Cassandra CPU over threshold, all hosts");
        assert!(q.tag_sets.is_empty());
        assert!(!q.is_aggregated());
        assert_eq!(q.where_clause, "usage_user,>,90.0");
        assert_eq!(q.field_name.split(',').count(), 10);
    }

    #[test]
    fn lastpoint_covers_the_whole_span() {
        let mut q = empty();
        queries(10).last_point_per_host(&mut q).unwrap();
        assert_eq!(q.for_every().unwrap().tag, "hostname");
        assert_eq!(q.for_every().unwrap().n, 1);
        assert_eq!(
            (q.time_start, q.time_end),
            (
                Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2016, 1, 2, 0, 0, 0).unwrap()
            )
        );
    }

    #[test]
    fn groupby_orderby_limit() {
        let mut q = empty();
        queries(10).group_by_orderby_limit(&mut q).unwrap();
        assert_eq!(q.field_name, "usage_user");
        assert_eq!(q.order_by, "timestamp_ns DESC");
        assert_eq!(q.limit, Some(5));
    }

    #[test]
    fn too_many_hosts_is_an_error() {
        let mut q = empty();
        let err = queries(4)
            .max_all_cpu(&mut q, 8, Duration::from_secs(8 * 3600))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidHostCount {
                requested: 8,
                scale: 4
            }
        ));
    }

    #[test]
    fn double_groupby_spans_twelve_hours() {
        let mut q = empty();
        queries(10).group_by_time_and_primary_tag(&mut q, 1).unwrap();
        assert_eq!(q.aggregation_type, "avg");
        assert_eq!(q.group_by_duration, HOUR);
        assert_eq!(q.time_end - q.time_start, TimeDelta::hours(12));
        assert_eq!(
            q.human_label,
            "Cassandra mean of 1 metrics, all hosts, random 12h by 1h"
        );
    }
}

//! The devops use case: a fleet of hosts, each reporting the same set of CPU metrics.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::SmallRng;
use rand::seq::{SliceRandom, index};
use rand::{Rng, SeedableRng};

use crate::usecase::GeneratorConfig;
use crate::{Error, Result};

pub const MEASUREMENT: &str = "cpu";

pub const HOSTNAME_TAG: &str = "hostname";

pub const CPU_METRICS: [&str; 10] = [
    "usage_user",
    "usage_system",
    "usage_idle",
    "usage_nice",
    "usage_iowait",
    "usage_irq",
    "usage_softirq",
    "usage_steal",
    "usage_guest",
    "usage_guest_nice",
];

const REGIONS: &[(&str, &[&str])] = &[
    (
        "us-east-1",
        &["us-east-1a", "us-east-1b", "us-east-1c", "us-east-1e"],
    ),
    ("us-west-1", &["us-west-1a", "us-west-1b"]),
    ("us-west-2", &["us-west-2a", "us-west-2b", "us-west-2c"]),
    ("eu-west-1", &["eu-west-1a", "eu-west-1b", "eu-west-1c"]),
    ("eu-central-1", &["eu-central-1a", "eu-central-1b"]),
    ("ap-southeast-1", &["ap-southeast-1a", "ap-southeast-1b"]),
    ("ap-southeast-2", &["ap-southeast-2a", "ap-southeast-2b"]),
    ("ap-northeast-1", &["ap-northeast-1a", "ap-northeast-1c"]),
    ("sa-east-1", &["sa-east-1a", "sa-east-1b", "sa-east-1c"]),
];

const OPERATING_SYSTEMS: &[&str] = &["Ubuntu16.10", "Ubuntu16.04LTS", "Ubuntu15.10"];
const ARCHITECTURES: &[&str] = &["x64", "x86"];
const TEAMS: &[&str] = &["SF", "NYC", "LON", "CHI"];
const RACKS: u32 = 100;
const SERVICES: u32 = 20;

/// The first `n` CPU metrics
pub fn cpu_metrics(n: usize) -> Result<&'static [&'static str]> {
    if n == 0 || n > CPU_METRICS.len() {
        return Err(Error::InvalidMetricCount {
            requested: n,
            available: CPU_METRICS.len(),
        });
    }
    Ok(&CPU_METRICS[..n])
}

/// One simulated host and its tag values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub name: String,
    pub region: &'static str,
    pub datacenter: &'static str,
    pub rack: String,
    pub os: &'static str,
    pub arch: &'static str,
    pub team: &'static str,
    pub service: String,
}

impl Host {
    pub fn hostname(id: usize) -> String {
        format!("host_{id}")
    }

    fn generate(id: usize, rng: &mut impl Rng) -> Self {
        let (region, datacenters) = REGIONS[rng.gen_range(0..REGIONS.len())];
        Self {
            name: Self::hostname(id),
            region,
            datacenter: datacenters[rng.gen_range(0..datacenters.len())],
            rack: rng.gen_range(0..RACKS).to_string(),
            os: pick(OPERATING_SYSTEMS, rng),
            arch: pick(ARCHITECTURES, rng),
            team: pick(TEAMS, rng),
            service: rng.gen_range(0..SERVICES).to_string(),
        }
    }

    /// Tag pairs in the order they appear in series ids and line protocol
    pub fn tags(&self) -> [(&'static str, &str); 8] {
        [
            (HOSTNAME_TAG, &self.name),
            ("region", self.region),
            ("datacenter", self.datacenter),
            ("rack", &self.rack),
            ("os", self.os),
            ("arch", self.arch),
            ("team", self.team),
            ("service", &self.service),
        ]
    }
}

fn pick(choices: &[&'static str], rng: &mut impl Rng) -> &'static str {
    choices.choose(rng).copied().unwrap_or_default()
}

/// The fleet of `scale` hosts; the same seed always yields the same tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevopsModel {
    hosts: Vec<Host>,
}

impl DevopsModel {
    pub fn new(scale: usize, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        Self {
            hosts: (0..scale).map(|id| Host::generate(id, &mut rng)).collect(),
        }
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn scale(&self) -> usize {
        self.hosts.len()
    }
}

/// Random choices shared by every backend's devops query generator
#[derive(Debug)]
pub struct DevopsCore {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    scale: usize,
    rng: SmallRng,
}

impl DevopsCore {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        if config.start > config.end {
            return Err(Error::InvalidTimeRange {
                start: config.start,
                end: config.end,
            });
        }
        Ok(Self {
            start: config.start,
            end: config.end,
            scale: config.scale,
            rng: SmallRng::seed_from_u64(config.seed),
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// A window of length `window` at a random, whole-second offset inside the dataset span
    pub fn random_window(&mut self, window: Duration) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let too_large = || Error::WindowTooLarge {
            start: self.start,
            end: self.end,
            window,
        };
        let window_delta = TimeDelta::from_std(window).map_err(|_| too_large())?;
        let slack = (self.end - self.start - window_delta)
            .num_nanoseconds()
            .filter(|slack| *slack >= 0)
            .ok_or_else(too_large)?;

        let offset = self.rng.gen_range(0..=slack);
        let offset = offset - offset % 1_000_000_000;
        let start = self.start + TimeDelta::nanoseconds(offset);
        Ok((start, start + window_delta))
    }

    /// `n` distinct host names in random order
    pub fn random_hosts(&mut self, n: usize) -> Result<Vec<String>> {
        if n == 0 || n > self.scale {
            return Err(Error::InvalidHostCount {
                requested: n,
                scale: self.scale,
            });
        }
        Ok(index::sample(&mut self.rng, self.scale, n)
            .into_iter()
            .map(Host::hostname)
            .collect())
    }
}

/// A tag filter matching any of `hosts`: one single-term clause per host
pub fn host_tag_sets(hosts: &[String]) -> Vec<Vec<String>> {
    hosts
        .iter()
        .map(|h| vec![format!("{HOSTNAME_TAG}={h}")])
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn config(hours: u32, scale: usize) -> GeneratorConfig {
        GeneratorConfig {
            start: Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2016, 1, 1, hours, 0, 0).unwrap(),
            scale,
            seed: 123,
        }
    }

    #[test]
    fn model_is_deterministic_per_seed() {
        let a = DevopsModel::new(50, 7);
        assert_eq!(a, DevopsModel::new(50, 7));
        assert_eq!(a.scale(), 50);
        assert_eq!(a.hosts()[3].name, "host_3");
        assert!(
            REGIONS
                .iter()
                .any(|(r, dcs)| *r == a.hosts()[0].region && dcs.contains(&a.hosts()[0].datacenter))
        );
    }

    #[test]
    fn tags_start_with_hostname() {
        let model = DevopsModel::new(1, 0);
        let tags = model.hosts()[0].tags();
        assert_eq!(tags[0], ("hostname", "host_0"));
        assert_eq!(tags.len(), 8);
    }

    #[test]
    fn metric_counts_are_bounded() {
        assert_eq!(cpu_metrics(1).unwrap(), &["usage_user"]);
        assert_eq!(cpu_metrics(10).unwrap().len(), 10);
        assert!(matches!(
            cpu_metrics(0),
            Err(Error::InvalidMetricCount { .. })
        ));
        assert!(matches!(
            cpu_metrics(11),
            Err(Error::InvalidMetricCount { .. })
        ));
    }

    #[test]
    fn random_windows_stay_inside_the_span() {
        let config = config(12, 10);
        let mut core = DevopsCore::new(&config).unwrap();
        for _ in 0..100 {
            let (start, end) = core.random_window(Duration::from_secs(3600)).unwrap();
            assert!(start >= config.start);
            assert!(end <= config.end);
            assert_eq!(end - start, TimeDelta::hours(1));
            assert_eq!(start.timestamp_subsec_nanos(), 0);
        }

        let (start, end) = core.random_window(Duration::from_secs(12 * 3600)).unwrap();
        assert_eq!((start, end), (config.start, config.end));

        assert!(matches!(
            core.random_window(Duration::from_secs(13 * 3600)),
            Err(Error::WindowTooLarge { .. })
        ));
    }

    #[test]
    fn random_hosts_are_distinct() {
        let mut core = DevopsCore::new(&config(1, 10)).unwrap();
        let mut hosts = core.random_hosts(10).unwrap();
        hosts.sort();
        hosts.dedup();
        assert_eq!(hosts.len(), 10);
        assert!(matches!(
            core.random_hosts(11),
            Err(Error::InvalidHostCount { .. })
        ));
    }

    #[test]
    fn host_filter_is_one_clause_per_host() {
        assert_eq!(
            host_tag_sets(&["host_1".to_string(), "host_7".to_string()]),
            vec![vec!["hostname=host_1"], vec!["hostname=host_7"]]
        );
    }

    #[test]
    fn backwards_range_is_rejected() {
        let mut config = config(1, 1);
        std::mem::swap(&mut config.start, &mut config.end);
        assert!(matches!(
            DevopsCore::new(&config),
            Err(Error::InvalidTimeRange { .. })
        ));
    }
}

//! Use cases, the query types each one offers and the capabilities a backend needs to serve them.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tsbench_planner::HighLevelQuery;

use crate::{Error, Result};

/// A family of workloads sharing a data model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UseCase {
    Devops,
    Iot,
}

impl UseCase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Devops => "devops",
            Self::Iot => "iot",
        }
    }
}

impl FromStr for UseCase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "devops" => Ok(Self::Devops),
            "iot" => Ok(Self::Iot),
            _ => Err(Error::UnknownUseCase(s.to_string())),
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters shared by every query generator of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Start of the dataset the queries run against
    pub start: DateTime<Utc>,
    /// End of the dataset, exclusive
    pub end: DateTime<Utc>,
    /// Number of hosts (devops) or trucks (iot) in the dataset
    pub scale: usize,
    pub seed: u64,
}

/// A target database the query generator can produce queries for
///
/// A backend advertises which use cases it supports by returning the matching capability.
pub trait Backend: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn as_devops(&self) -> Option<&dyn DevopsGeneratorMaker> {
        None
    }

    fn as_iot(&self) -> Option<&dyn IotGeneratorMaker> {
        None
    }

    fn supports(&self, use_case: UseCase) -> bool {
        match use_case {
            UseCase::Devops => self.as_devops().is_some(),
            UseCase::Iot => self.as_iot().is_some(),
        }
    }
}

/// Capability of producing devops queries
pub trait DevopsGeneratorMaker {
    fn new_devops(&self, config: &GeneratorConfig) -> Result<Box<dyn DevopsQueries>>;
}

/// Capability of producing iot queries
pub trait IotGeneratorMaker {
    fn new_iot(&self, config: &GeneratorConfig) -> Result<Box<dyn IotQueries>>;
}

/// Fills high-level queries for each devops query type
pub trait DevopsQueries: fmt::Debug + Send {
    /// Max of `metrics` CPU metrics for `hosts` random hosts over a random `window`, by minute
    fn group_by_time(
        &mut self,
        query: &mut HighLevelQuery,
        hosts: usize,
        metrics: usize,
        window: Duration,
    ) -> Result<()>;

    /// Max of every CPU metric for `hosts` random hosts over a random `window`, by hour
    fn max_all_cpu(&mut self, query: &mut HighLevelQuery, hosts: usize, window: Duration)
    -> Result<()>;

    /// Mean of `metrics` CPU metrics per host and hour across all hosts
    fn group_by_time_and_primary_tag(&mut self, query: &mut HighLevelQuery, metrics: usize)
    -> Result<()>;

    /// The five most recent per-minute maxima before a random end time
    fn group_by_orderby_limit(&mut self, query: &mut HighLevelQuery) -> Result<()>;

    /// Rows where usage_user exceeds a threshold, for `hosts` random hosts or all hosts if zero
    fn high_cpu_for_hosts(&mut self, query: &mut HighLevelQuery, hosts: usize) -> Result<()>;

    /// The latest reading of every host
    fn last_point_per_host(&mut self, query: &mut HighLevelQuery) -> Result<()>;
}

/// Fills high-level queries for each iot query type
pub trait IotQueries: fmt::Debug + Send {
    fn last_location_per_truck(&mut self, query: &mut HighLevelQuery) -> Result<()>;

    fn average_load(&mut self, query: &mut HighLevelQuery) -> Result<()>;
}

/// A devops query type with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevopsQuery {
    SingleGroupby {
        metrics: usize,
        hosts: usize,
        hours: u64,
    },
    MaxAll {
        hosts: usize,
        window: Duration,
    },
    DoubleGroupby {
        metrics: usize,
    },
    GroupbyOrderbyLimit,
    HighCpu {
        hosts: usize,
    },
    Lastpoint,
}

impl DevopsQuery {
    pub fn fill(self, queries: &mut dyn DevopsQueries, query: &mut HighLevelQuery) -> Result<()> {
        match self {
            Self::SingleGroupby {
                metrics,
                hosts,
                hours,
            } => queries.group_by_time(query, hosts, metrics, Duration::from_secs(hours * 3600)),
            Self::MaxAll { hosts, window } => queries.max_all_cpu(query, hosts, window),
            Self::DoubleGroupby { metrics } => queries.group_by_time_and_primary_tag(query, metrics),
            Self::GroupbyOrderbyLimit => queries.group_by_orderby_limit(query),
            Self::HighCpu { hosts } => queries.high_cpu_for_hosts(query, hosts),
            Self::Lastpoint => queries.last_point_per_host(query),
        }
    }
}

/// An iot query type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IotQuery {
    LastLocation,
    AverageLoad,
}

impl IotQuery {
    pub fn fill(self, queries: &mut dyn IotQueries, query: &mut HighLevelQuery) -> Result<()> {
        match self {
            Self::LastLocation => queries.last_location_per_truck(query),
            Self::AverageLoad => queries.average_load(query),
        }
    }
}

/// A query type of some use case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFiller {
    Devops(DevopsQuery),
    Iot(IotQuery),
}

impl QueryFiller {
    pub fn use_case(&self) -> UseCase {
        match self {
            Self::Devops(_) => UseCase::Devops,
            Self::Iot(_) => UseCase::Iot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NoCapabilities;

    impl Backend for NoCapabilities {
        fn name(&self) -> &str {
            "none"
        }
    }

    #[test]
    fn use_case_names() {
        assert_eq!("devops".parse::<UseCase>().unwrap(), UseCase::Devops);
        assert_eq!(UseCase::Iot.to_string(), "iot");
        assert!(matches!(
            "cpu-only".parse::<UseCase>(),
            Err(Error::UnknownUseCase(_))
        ));
    }

    #[test]
    fn capabilities_default_to_unsupported() {
        assert!(!NoCapabilities.supports(UseCase::Devops));
        assert!(!NoCapabilities.supports(UseCase::Iot));
    }

    #[test]
    fn fillers_know_their_use_case() {
        assert_eq!(
            QueryFiller::Devops(DevopsQuery::Lastpoint).use_case(),
            UseCase::Devops
        );
        assert_eq!(
            QueryFiller::Iot(IotQuery::AverageLoad).use_case(),
            UseCase::Iot
        );
    }
}

//! Synthetic benchmark workloads
//!
//! This crate models the devops use case (a fleet of hosts reporting CPU metrics), derives the
//! series catalog and synthetic points for it, and generates [`HighLevelQuery`]s through an
//! explicit [`UseCaseRegistry`] that only pairs a backend with the use cases it can serve.
//!
//! [`HighLevelQuery`]: tsbench_planner::HighLevelQuery

use std::time::Duration;

use chrono::{DateTime, Utc};

pub mod cassandra;
pub mod catalog;
pub mod devops;
pub mod registry;
pub mod simulator;
pub mod usecase;

pub use cassandra::CassandraBackend;
pub use catalog::build_catalog;
pub use devops::{CPU_METRICS, DevopsModel, Host};
pub use registry::{QueryGenerator, UseCaseRegistry};
pub use simulator::CpuSimulator;
pub use usecase::{
    Backend, DevopsGeneratorMaker, DevopsQueries, DevopsQuery, GeneratorConfig, IotGeneratorMaker,
    IotQueries, IotQuery, QueryFiller, UseCase,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("use case '{0}' is undefined")]
    UnknownUseCase(String),

    #[error("invalid query type for use case '{use_case}': '{query_type}'")]
    UnknownQueryType { use_case: UseCase, query_type: String },

    #[error("unknown backend '{0}'")]
    UnknownBackend(String),

    #[error("backend '{0}' is already registered")]
    DuplicateBackend(String),

    #[error("use case '{use_case}' not implemented for backend '{backend}'")]
    UseCaseNotImplemented { use_case: UseCase, backend: String },

    #[error("use case '{use_case}' is not registered for backend '{backend}'")]
    UseCaseNotRegistered { use_case: UseCase, backend: String },

    #[error("cannot pick {requested} hosts from a scale of {scale}")]
    InvalidHostCount { requested: usize, scale: usize },

    #[error("cannot pick {requested} of the {available} cpu metrics")]
    InvalidMetricCount { requested: usize, available: usize },

    #[error("time range {start} to {end} is shorter than the {window:?} query window")]
    WindowTooLarge {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        window: Duration,
    },

    #[error("invalid time range: start {start} is after end {end}")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("simulation interval must be non-zero")]
    ZeroInterval,

    #[error(transparent)]
    Planner(#[from] tsbench_planner::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Query planning for partitioned wide-column stores
//!
//! A [`HighLevelQuery`] describes what a benchmark query wants to know without saying how a
//! particular database should answer it. Stores such as Cassandra cannot discover series by
//! arbitrary tag combinations, so this crate keeps a [`ClientSideIndex`] of every known
//! [`Series`] and uses it to expand a high-level query into one of four [`QueryPlan`] shapes,
//! each a bundle of [`PhysicalStatement`]s that an executor can run directly.
//!
//! Planning is a pure function of the query and the index: the index is built once per run and is
//! read-only afterwards, so a [`QueryPlanner`] can be shared across threads without locking.

pub mod aggregate;
pub mod index;
pub mod plan;
pub mod planner;
pub mod query;
pub mod series;
pub mod statement;
pub mod time_interval;

pub use aggregate::{Aggregator, BucketAccumulator, BucketResult};
pub use index::ClientSideIndex;
pub use plan::{
    AggregatedBucket, QueryPlan, QueryPlanForEvery, QueryPlanNoAggregation,
    QueryPlanWithServerAggregation, QueryPlanWithoutServerAggregation,
};
pub use planner::{AggregationPlan, QueryPlanner};
pub use query::{ForEvery, HighLevelQuery, TagPredicate, TagSetFilter};
pub use series::Series;
pub use statement::{CqlDialect, PhysicalStatement, StatementArg, StatementBuilder};
pub use time_interval::{TimeBucket, TimeBuckets, TimeInterval};

/// The broad category of a planning failure
///
/// Planning is deterministic, so every kind is permanent for the query that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedQuerySpec,
    InvalidTimeSpan,
    IndexInconsistency,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed for-every spec '{spec}': expected exactly '<tag>,<n>'")]
    MalformedForEvery { spec: String },

    #[error("unparseable count in for-every spec '{spec}': {source}")]
    InvalidForEveryCount {
        spec: String,
        source: std::num::ParseIntError,
    },

    #[error("query has no measurement name")]
    EmptyMeasurement,

    #[error("query has no field name")]
    EmptyField,

    #[error("malformed tag predicate '{term}': expected '<key>=<value>'")]
    MalformedTagPredicate { term: String },

    #[error("group by duration {duration:?} must be non-zero and fit in a nanosecond timestamp")]
    GroupByOutOfRange { duration: std::time::Duration },

    #[error("invalid time span: start ({start}) is after end ({end})")]
    InvalidTimeSpan { start: i64, end: i64 },

    #[error("timestamp {timestamp} cannot be represented in nanoseconds")]
    TimestampOutOfRange { timestamp: String },

    #[error("malformed series id '{id}': {reason}")]
    MalformedSeriesId { id: String, reason: &'static str },

    #[error("unsupported aggregation '{label}' for client-side aggregation")]
    UnsupportedAggregation { label: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedForEvery { .. }
            | Self::InvalidForEveryCount { .. }
            | Self::EmptyMeasurement
            | Self::EmptyField
            | Self::MalformedTagPredicate { .. }
            | Self::GroupByOutOfRange { .. }
            | Self::UnsupportedAggregation { .. } => ErrorKind::MalformedQuerySpec,
            Self::InvalidTimeSpan { .. } | Self::TimestampOutOfRange { .. } => {
                ErrorKind::InvalidTimeSpan
            }
            Self::MalformedSeriesId { .. } => ErrorKind::IndexInconsistency,
        }
    }

    fn malformed_series_id(id: impl Into<String>, reason: &'static str) -> Self {
        Self::MalformedSeriesId {
            id: id.into(),
            reason,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

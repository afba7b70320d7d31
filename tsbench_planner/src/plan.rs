//! The four shapes of physical query plan.

use std::fmt;
use std::time::Duration;

use crate::query::ForEvery;
use crate::statement::PhysicalStatement;
use crate::time_interval::TimeInterval;

/// One group-by bucket of a server-side aggregation plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedBucket {
    /// Bucket bounds clamped to the query span
    pub interval: TimeInterval,
    /// One aggregating statement per series with data in the bucket; may be empty
    pub statements: Vec<PhysicalStatement>,
}

/// Pushes the aggregation down to the store: every (bucket, series) pair gets a statement that
/// returns a single aggregated value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlanWithServerAggregation {
    pub aggregation: String,
    /// Buckets in ascending time order, including empty ones
    pub buckets: Vec<AggregatedBucket>,
}

/// Reads raw rows once per series; the caller folds them into `time_buckets` with
/// [`BucketAccumulator`](crate::BucketAccumulator)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlanWithoutServerAggregation {
    pub aggregation: String,
    pub group_by: Duration,
    pub fields: Vec<String>,
    /// Clamped buckets, newest first when the query orders by time descending
    pub time_buckets: Vec<TimeInterval>,
    pub limit: Option<usize>,
    pub statements: Vec<PhysicalStatement>,
}

/// Reads raw rows for the whole span; `where_clause` is left for the caller to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlanNoAggregation {
    pub fields: Vec<String>,
    pub where_clause: String,
    pub statements: Vec<PhysicalStatement>,
}

/// Reads the latest point of each series; the caller groups the results by `for_every.tag`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlanForEvery {
    pub fields: Vec<String>,
    pub for_every: ForEvery,
    pub statements: Vec<PhysicalStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    WithServerAggregation(QueryPlanWithServerAggregation),
    WithoutServerAggregation(QueryPlanWithoutServerAggregation),
    NoAggregation(QueryPlanNoAggregation),
    ForEvery(QueryPlanForEvery),
}

impl QueryPlan {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WithServerAggregation(_) => "with_server_aggregation",
            Self::WithoutServerAggregation(_) => "without_server_aggregation",
            Self::NoAggregation(_) => "no_aggregation",
            Self::ForEvery(_) => "for_every",
        }
    }

    /// Every statement in the plan, in execution order
    pub fn statements(&self) -> Box<dyn Iterator<Item = &PhysicalStatement> + '_> {
        match self {
            Self::WithServerAggregation(p) => {
                Box::new(p.buckets.iter().flat_map(|b| b.statements.iter()))
            }
            Self::WithoutServerAggregation(p) => Box::new(p.statements.iter()),
            Self::NoAggregation(p) => Box::new(p.statements.iter()),
            Self::ForEvery(p) => Box::new(p.statements.iter()),
        }
    }

    pub fn statement_count(&self) -> usize {
        match self {
            Self::WithServerAggregation(p) => p.buckets.iter().map(|b| b.statements.len()).sum(),
            Self::WithoutServerAggregation(p) => p.statements.len(),
            Self::NoAggregation(p) => p.statements.len(),
            Self::ForEvery(p) => p.statements.len(),
        }
    }
}

fn write_statements(f: &mut fmt::Formatter<'_>, statements: &[PhysicalStatement]) -> fmt::Result {
    for s in statements {
        writeln!(f, "  {s}")?;
    }
    Ok(())
}

impl fmt::Display for QueryPlanWithServerAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "QueryPlanWithServerAggregation: aggregation {}, {} buckets",
            self.aggregation,
            self.buckets.len()
        )?;
        for bucket in &self.buckets {
            writeln!(
                f,
                " {}: {} statements",
                bucket.interval,
                bucket.statements.len()
            )?;
            write_statements(f, &bucket.statements)?;
        }
        Ok(())
    }
}

impl fmt::Display for QueryPlanWithoutServerAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueryPlanWithoutServerAggregation: aggregation {}, group by {}, fields [{}], \
             {} buckets",
            self.aggregation,
            humantime::format_duration(self.group_by),
            self.fields.join(","),
            self.time_buckets.len(),
        )?;
        if let Some(limit) = self.limit {
            write!(f, ", limit {limit}")?;
        }
        writeln!(f, ", {} statements", self.statements.len())?;
        write_statements(f, &self.statements)
    }
}

impl fmt::Display for QueryPlanNoAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "QueryPlanNoAggregation: fields [{}], where '{}', {} statements",
            self.fields.join(","),
            self.where_clause,
            self.statements.len()
        )?;
        write_statements(f, &self.statements)
    }
}

impl fmt::Display for QueryPlanForEvery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "QueryPlanForEvery: fields [{}], for every {} {}, {} statements",
            self.fields.join(","),
            self.for_every.n,
            self.for_every.tag,
            self.statements.len()
        )?;
        write_statements(f, &self.statements)
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WithServerAggregation(p) => p.fmt(f),
            Self::WithoutServerAggregation(p) => p.fmt(f),
            Self::NoAggregation(p) => p.fmt(f),
            Self::ForEvery(p) => p.fmt(f),
        }
    }
}

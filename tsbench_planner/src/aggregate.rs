//! Client-side aggregation of raw rows for plans without server-side aggregation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::plan::QueryPlanWithoutServerAggregation;
use crate::time_interval::TimeInterval;
use crate::{Error, Result};

/// Aggregation functions the client can apply to raw rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregator {
    Avg,
    Sum,
    Count,
    Max,
    Min,
}

impl FromStr for Aggregator {
    type Err = Error;

    fn from_str(label: &str) -> Result<Self> {
        match label.to_ascii_lowercase().as_str() {
            "avg" | "mean" => Ok(Self::Avg),
            "sum" => Ok(Self::Sum),
            "count" => Ok(Self::Count),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            _ => Err(Error::UnsupportedAggregation {
                label: label.to_string(),
            }),
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Avg => "avg",
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Max => "max",
            Self::Min => "min",
        })
    }
}

/// Running state for one (bucket, field) cell
#[derive(Debug, Clone, Copy, PartialEq)]
struct Aggregate {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Aggregate {
    fn update(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// `None` for an empty cell, except that an empty count is zero
    fn value(&self, aggregator: Aggregator) -> Option<f64> {
        match aggregator {
            Aggregator::Count => Some(self.count as f64),
            _ if self.count == 0 => None,
            Aggregator::Avg => Some(self.sum / self.count as f64),
            Aggregator::Sum => Some(self.sum),
            Aggregator::Max => Some(self.max),
            Aggregator::Min => Some(self.min),
        }
    }
}

/// Aggregated values of one bucket, keyed by field
#[derive(Debug, Clone, PartialEq)]
pub struct BucketResult {
    pub interval: TimeInterval,
    pub values: BTreeMap<String, Option<f64>>,
}

/// Folds the rows returned by a [`QueryPlanWithoutServerAggregation`] into its buckets
///
/// Rows are attributed to the field of the statement that returned them. Rows outside every
/// bucket are dropped.
#[derive(Debug)]
pub struct BucketAccumulator {
    aggregator: Aggregator,
    limit: Option<usize>,
    buckets: Vec<(TimeInterval, BTreeMap<String, Aggregate>)>,
}

impl BucketAccumulator {
    pub fn new(plan: &QueryPlanWithoutServerAggregation) -> Result<Self> {
        let aggregator = plan.aggregation.parse()?;
        let empty: BTreeMap<_, _> = plan
            .fields
            .iter()
            .map(|f| (f.clone(), Aggregate::default()))
            .collect();
        Ok(Self {
            aggregator,
            limit: plan.limit,
            buckets: plan
                .time_buckets
                .iter()
                .map(|ti| (*ti, empty.clone()))
                .collect(),
        })
    }

    pub fn aggregator(&self) -> Aggregator {
        self.aggregator
    }

    /// Add one row; returns false if `timestamp` falls outside every bucket
    pub fn accumulate(&mut self, field: &str, timestamp: i64, value: f64) -> bool {
        let Some((_, cells)) = self
            .buckets
            .iter_mut()
            .find(|(interval, _)| interval.contains(timestamp))
        else {
            return false;
        };
        match cells.get_mut(field) {
            Some(cell) => cell.update(value),
            None => {
                let mut cell = Aggregate::default();
                cell.update(value);
                cells.insert(field.to_string(), cell);
            }
        }
        true
    }

    /// The aggregated buckets in plan order, truncated to the plan's limit
    pub fn finish(self) -> Vec<BucketResult> {
        let aggregator = self.aggregator;
        let take = self.limit.unwrap_or(usize::MAX);
        self.buckets
            .into_iter()
            .take(take)
            .map(|(interval, cells)| BucketResult {
                interval,
                values: cells
                    .into_iter()
                    .map(|(field, cell)| (field, cell.value(aggregator)))
                    .collect(),
            })
            .collect()
    }
}

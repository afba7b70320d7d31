//! Turns high-level queries into physical plans against the client-side index.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::index::ClientSideIndex;
use crate::plan::{
    AggregatedBucket, QueryPlan, QueryPlanForEvery, QueryPlanNoAggregation,
    QueryPlanWithServerAggregation, QueryPlanWithoutServerAggregation,
};
use crate::query::{HighLevelQuery, TagSetFilter};
use crate::series::Series;
use crate::statement::{CqlDialect, StatementBuilder};
use crate::time_interval::{TimeBucket, TimeBuckets, TimeInterval};
use crate::{Error, Result};

/// Where aggregating queries are aggregated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AggregationPlan {
    /// One aggregating statement per (bucket, series); the store does the work
    #[default]
    Server,
    /// One raw statement per series; the client folds rows into buckets
    Client,
}

impl FromStr for AggregationPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            _ => Err(format!(
                "invalid aggregation plan '{s}', expected 'server' or 'client'"
            )),
        }
    }
}

impl fmt::Display for AggregationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str("server"),
            Self::Client => f.write_str("client"),
        }
    }
}

/// Builds [`QueryPlan`]s from [`HighLevelQuery`]s
///
/// The planner holds no mutable state; one instance can plan queries from any number of threads.
#[derive(Debug)]
pub struct QueryPlanner<B = CqlDialect> {
    index: Arc<ClientSideIndex>,
    builder: B,
    aggregation_plan: AggregationPlan,
}

impl QueryPlanner<CqlDialect> {
    /// A planner emitting CQL with the default column names
    pub fn new(index: Arc<ClientSideIndex>) -> Self {
        Self::with_builder(index, CqlDialect::default())
    }
}

impl<B: StatementBuilder> QueryPlanner<B> {
    pub fn with_builder(index: Arc<ClientSideIndex>, builder: B) -> Self {
        Self {
            index,
            builder,
            aggregation_plan: AggregationPlan::default(),
        }
    }

    pub fn with_aggregation_plan(mut self, aggregation_plan: AggregationPlan) -> Self {
        self.aggregation_plan = aggregation_plan;
        self
    }

    pub fn index(&self) -> &ClientSideIndex {
        &self.index
    }

    pub fn aggregation_plan(&self) -> AggregationPlan {
        self.aggregation_plan
    }

    /// Plan `query` using whichever plan shape fits it
    ///
    /// A for-every spec takes precedence; otherwise an unaggregated query gets a no-aggregation
    /// plan and an aggregated one follows the configured [`AggregationPlan`].
    pub fn plan(&self, query: &HighLevelQuery) -> Result<QueryPlan> {
        let plan = if query.has_for_every() {
            QueryPlan::ForEvery(self.for_every(query)?)
        } else if !query.is_aggregated() {
            QueryPlan::NoAggregation(self.no_aggregation(query)?)
        } else {
            match self.aggregation_plan {
                AggregationPlan::Server => {
                    QueryPlan::WithServerAggregation(self.with_server_aggregation(query)?)
                }
                AggregationPlan::Client => {
                    QueryPlan::WithoutServerAggregation(self.without_server_aggregation(query)?)
                }
            }
        };

        debug!(
            query_id = query.id,
            label = %query.human_label,
            plan = plan.name(),
            statements = plan.statement_count(),
            "planned query"
        );
        Ok(plan)
    }

    /// One aggregating statement per (bucket, matching series) pair
    ///
    /// Every bucket of the span is present in the plan, even those no series falls into, so
    /// that the result has a row for each group-by window. Several fields union their series;
    /// each statement carries its own field label. A series joins a bucket when it overlaps the
    /// bucket's clamped (effective) interval, not the raw epoch-aligned window.
    pub fn with_server_aggregation(
        &self,
        query: &HighLevelQuery,
    ) -> Result<QueryPlanWithServerAggregation> {
        let measurement = query.measurement()?;
        let fields = query.fields()?;
        let span = query.span()?;
        let filter = query.tag_filter()?;

        let mut buckets: Vec<_> = group_by_buckets(span, query.group_by_duration)?
            .into_iter()
            .map(|bucket| (bucket, vec![]))
            .collect();

        for series in self.index.series_for_fields(measurement, &fields) {
            if !series.matches_measurement(measurement)
                || !series.matches_any_field(&fields)
                || !series.matches_tag_sets(&filter)
            {
                continue;
            }
            for (bucket, members) in &mut buckets {
                if series.matches_time_interval(&bucket.effective) {
                    members.push(series);
                }
            }
        }

        let buckets = buckets
            .into_iter()
            .map(|(bucket, members)| {
                let statements = members
                    .into_iter()
                    .map(|series| {
                        self.builder.build(
                            &query.aggregation_type,
                            series.table(),
                            series.id(),
                            &query.order_by,
                            bucket.effective,
                        )
                    })
                    .collect::<Result<_>>()?;
                Ok::<_, Error>(AggregatedBucket {
                    interval: bucket.effective,
                    statements,
                })
            })
            .collect::<Result<_>>()?;

        Ok(QueryPlanWithServerAggregation {
            aggregation: query.aggregation_type.clone(),
            buckets,
        })
    }

    /// At most one raw statement per matching series, bounded by the whole span
    pub fn without_server_aggregation(
        &self,
        query: &HighLevelQuery,
    ) -> Result<QueryPlanWithoutServerAggregation> {
        let measurement = query.measurement()?;
        let fields = query.fields()?;
        let span = query.span()?;
        let filter = query.tag_filter()?;

        let mut time_buckets: Vec<_> = group_by_buckets(span, query.group_by_duration)?
            .into_iter()
            .map(|b| b.effective)
            .collect();
        if self.builder.is_time_descending(&query.order_by) {
            time_buckets.reverse();
        }

        let statements = self
            .index
            .series_for_fields(measurement, &fields)
            .into_iter()
            .filter(|s| {
                s.matches_measurement(measurement)
                    && s.matches_any_field(&fields)
                    && s.matches_tag_sets(&filter)
                    && s.matches_time_interval(&span)
            })
            .map(|s| self.builder.build("", s.table(), s.id(), &query.order_by, span))
            .collect::<Result<_>>()?;

        Ok(QueryPlanWithoutServerAggregation {
            aggregation: query.aggregation_type.clone(),
            group_by: query.group_by_duration,
            fields: fields.into_iter().map(str::to_string).collect(),
            time_buckets,
            limit: query.limit,
            statements,
        })
    }

    /// One raw statement per series matching the tag filter within the span
    pub fn no_aggregation(&self, query: &HighLevelQuery) -> Result<QueryPlanNoAggregation> {
        let measurement = query.measurement()?;
        let fields = query.fields()?;
        let span = query.span()?;
        let filter = query.tag_filter()?;

        let statements = self
            .candidates(measurement, &fields, &filter, span)
            .map(|s| self.builder.build("", s.table(), s.id(), &query.order_by, span))
            .collect::<Result<_>>()?;

        Ok(QueryPlanNoAggregation {
            fields: fields.into_iter().map(str::to_string).collect(),
            where_clause: query.where_clause.clone(),
            statements,
        })
    }

    /// One latest-point statement per series matching the tag filter within the span
    pub fn for_every(&self, query: &HighLevelQuery) -> Result<QueryPlanForEvery> {
        let for_every = query.for_every()?;
        let measurement = query.measurement()?;
        let fields = query.fields()?;
        let span = query.span()?;
        let filter = query.tag_filter()?;

        let statements = self
            .candidates(measurement, &fields, &filter, span)
            .map(|s| self.builder.build_latest(s.table(), s.id(), span))
            .collect::<Result<_>>()?;

        Ok(QueryPlanForEvery {
            fields: fields.into_iter().map(str::to_string).collect(),
            for_every,
            statements,
        })
    }

    fn candidates<'a>(
        &'a self,
        measurement: &str,
        fields: &[&str],
        filter: &'a TagSetFilter,
        span: TimeInterval,
    ) -> impl Iterator<Item = &'a Series> {
        self.index
            .series_for_fields(measurement, fields)
            .into_iter()
            .filter(move |s| s.matches_tag_sets(filter) && s.matches_time_interval(&span))
    }
}

/// The group-by buckets of `span`; a zero width makes the whole span a single bucket
fn group_by_buckets(span: TimeInterval, width: Duration) -> Result<Vec<TimeBucket>> {
    if width.is_zero() {
        return Ok(vec![TimeBucket {
            raw: span,
            effective: span,
        }]);
    }
    Ok(TimeBuckets::new(span, width)?.collect())
}

//! The declarative, database-agnostic query handed to the planner.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time_interval::TimeInterval;
use crate::{Error, Result};

/// A high-level query, as produced by a query generator
///
/// String-typed members are kept in the shape the generator emits them: `field_name` is a comma
/// separated list, `tag_sets` is a list of clauses of `key=value` terms and `for_every_n` is a
/// `tag,N` pair. They are parsed when a plan is built, so that malformed input surfaces as a
/// planning error for the query that carried it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighLevelQuery {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub human_label: String,
    #[serde(default)]
    pub human_description: String,
    pub measurement_name: String,
    pub field_name: String,
    /// Aggregation function to apply per group-by bucket, empty for raw queries
    #[serde(default)]
    pub aggregation_type: String,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    /// Width of the group-by buckets, zero when the query is not grouped by time
    #[serde(default, with = "humantime_serde")]
    pub group_by_duration: Duration,
    /// Disjunction of conjunctive clauses; each term is `key=value`
    #[serde(default)]
    pub tag_sets: Vec<Vec<String>>,
    #[serde(default)]
    pub order_by: String,
    #[serde(default)]
    pub limit: Option<usize>,
    /// `tag,N` for sampling queries that want the latest point per distinct tag value
    #[serde(default)]
    pub for_every_n: String,
    /// Predicate the executor applies to rows; opaque to the planner
    #[serde(default)]
    pub where_clause: String,
}

impl HighLevelQuery {
    /// A query over `field_name` of `measurement_name` for `[time_start, time_end)` with every
    /// optional member left empty
    pub fn new(
        measurement_name: impl Into<String>,
        field_name: impl Into<String>,
        time_start: DateTime<Utc>,
        time_end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            human_label: String::new(),
            human_description: String::new(),
            measurement_name: measurement_name.into(),
            field_name: field_name.into(),
            aggregation_type: String::new(),
            time_start,
            time_end,
            group_by_duration: Duration::ZERO,
            tag_sets: vec![],
            order_by: String::new(),
            limit: None,
            for_every_n: String::new(),
            where_clause: String::new(),
        }
    }

    /// The requested fields, split on `,`
    pub fn fields(&self) -> Result<Vec<&str>> {
        if self.field_name.is_empty() {
            return Err(Error::EmptyField);
        }
        Ok(self.field_name.split(',').collect())
    }

    pub fn measurement(&self) -> Result<&str> {
        if self.measurement_name.is_empty() {
            return Err(Error::EmptyMeasurement);
        }
        Ok(&self.measurement_name)
    }

    pub fn span(&self) -> Result<TimeInterval> {
        TimeInterval::from_datetimes(self.time_start, self.time_end)
    }

    pub fn tag_filter(&self) -> Result<TagSetFilter> {
        TagSetFilter::parse(&self.tag_sets)
    }

    pub fn for_every(&self) -> Result<ForEvery> {
        self.for_every_n.parse()
    }

    pub fn has_for_every(&self) -> bool {
        !self.for_every_n.is_empty()
    }

    pub fn is_aggregated(&self) -> bool {
        !self.aggregation_type.is_empty()
    }

    pub fn is_grouped_by_time(&self) -> bool {
        !self.group_by_duration.is_zero()
    }
}

impl fmt::Display for HighLevelQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {}, HumanLabel: {}, HumanDescription: {}, MeasurementName: {}, FieldName: {}, \
             AggregationType: {}, TimeStart: {}, TimeEnd: {}, GroupByDuration: {}, TagSets: {:?}",
            self.id,
            self.human_label,
            self.human_description,
            self.measurement_name,
            self.field_name,
            self.aggregation_type,
            self.time_start.to_rfc3339(),
            self.time_end.to_rfc3339(),
            humantime::format_duration(self.group_by_duration),
            self.tag_sets,
        )
    }
}

/// Parsed `tag,N` spec of a for-every-N query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForEvery {
    pub tag: String,
    pub n: i64,
}

impl FromStr for ForEvery {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut tokens = s.split(',');
        let (Some(tag), Some(n), None) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(Error::MalformedForEvery {
                spec: s.to_string(),
            });
        };
        if tag.is_empty() {
            return Err(Error::MalformedForEvery {
                spec: s.to_string(),
            });
        }
        let n = n.parse().map_err(|source| Error::InvalidForEveryCount {
            spec: s.to_string(),
            source,
        })?;

        Ok(Self {
            tag: tag.to_string(),
            n,
        })
    }
}

/// A single `key=value` term of a tag-set clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPredicate {
    pub key: String,
    pub value: String,
}

impl TagPredicate {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl FromStr for TagPredicate {
    type Err = Error;

    fn from_str(term: &str) -> Result<Self> {
        match term.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok(Self::new(key, value)),
            _ => Err(Error::MalformedTagPredicate {
                term: term.to_string(),
            }),
        }
    }
}

/// A disjunction of conjunctive clauses over tag values
///
/// A tag set matches when at least one clause has every one of its terms satisfied. The empty
/// filter has no clauses and matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSetFilter {
    clauses: Vec<Vec<TagPredicate>>,
}

impl TagSetFilter {
    pub fn new(clauses: Vec<Vec<TagPredicate>>) -> Self {
        Self { clauses }
    }

    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn parse<S: AsRef<str>>(clauses: &[Vec<S>]) -> Result<Self> {
        let clauses = clauses
            .iter()
            .map(|clause| {
                clause
                    .iter()
                    .map(|term| term.as_ref().parse())
                    .collect::<Result<Vec<TagPredicate>>>()
            })
            .collect::<Result<_>>()?;
        Ok(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Vec<TagPredicate>] {
        &self.clauses
    }

    pub fn matches(&self, tags: &BTreeMap<String, String>) -> bool {
        self.is_empty()
            || self.clauses.iter().any(|clause| {
                clause
                    .iter()
                    .all(|p| tags.get(&p.key).is_some_and(|v| *v == p.value))
            })
    }
}

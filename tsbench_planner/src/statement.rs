//! Physical statements and the builders that render them for a particular store.

use std::fmt;
use std::sync::Arc;

use crate::series::SERIES_ID_DELIMITER;
use crate::time_interval::TimeInterval;
use crate::{Error, Result};

/// Appended verbatim to the template of a latest-point statement
pub const LATEST_POINT_SUFFIX: &str = " LIMIT 1";

/// A positional argument bound to a statement placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementArg {
    Text(Arc<str>),
    Int(i64),
}

impl fmt::Display for StatementArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

/// One executable statement
///
/// The arguments are always, in order, the series id, the inclusive start of the time range and
/// the exclusive end of the time range, both in nanoseconds. `field` names the field the results
/// belong to and is taken from the series id rather than from the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalStatement {
    query: String,
    args: Vec<StatementArg>,
    field: Arc<str>,
}

impl PhysicalStatement {
    fn new(query: String, series_id: &str, bounds: TimeInterval) -> Result<Self> {
        let field = Arc::from(field_label(series_id)?);
        Ok(Self {
            query,
            args: vec![
                StatementArg::Text(Arc::from(series_id)),
                StatementArg::Int(bounds.start()),
                StatementArg::Int(bounds.end()),
            ],
            field,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn args(&self) -> &[StatementArg] {
        &self.args
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl fmt::Display for PhysicalStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.query)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, "] (field: {})", self.field)
    }
}

/// The segment of a series id immediately before its last `#`-delimited segment
pub fn field_label(series_id: &str) -> Result<&str> {
    let mut segments = series_id.rsplit(SERIES_ID_DELIMITER);
    segments.next();
    segments.next().ok_or_else(|| Error::MalformedSeriesId {
        id: series_id.to_string(),
        reason: "no field segment",
    })
}

/// Renders statements in the syntax of a target store
///
/// The planner only decides which series and time ranges to read; how that becomes text is up to
/// the builder, so the same plans can target any store that partitions by series id.
pub trait StatementBuilder: fmt::Debug + Send + Sync {
    /// Name of the timestamp column, used to recognise time ordering in `ORDER BY` clauses
    fn time_column(&self) -> &str;

    /// Build a statement reading one series over `bounds`.
    ///
    /// With an empty `aggregation` the statement selects raw timestamps and values, ordered by
    /// `order_by` when it is non-empty. Otherwise it selects `aggregation(value)` and ignores
    /// `order_by`.
    fn build(
        &self,
        aggregation: &str,
        table: &str,
        series_id: &str,
        order_by: &str,
        bounds: TimeInterval,
    ) -> Result<PhysicalStatement>;

    /// Build a statement returning only the most recent point of a series within `bounds`
    fn build_latest(
        &self,
        table: &str,
        series_id: &str,
        bounds: TimeInterval,
    ) -> Result<PhysicalStatement> {
        let order_by = format!("{} DESC", self.time_column());
        let mut statement = self.build("", table, series_id, &order_by, bounds)?;
        statement.query.push_str(LATEST_POINT_SUFFIX);
        Ok(statement)
    }

    /// Whether `order_by` sorts by time, newest first
    fn is_time_descending(&self, order_by: &str) -> bool {
        let mut tokens = order_by.split_whitespace();
        matches!(
            (tokens.next(), tokens.next(), tokens.next()),
            (Some(column), Some(direction), None)
                if column == self.time_column() && direction.eq_ignore_ascii_case("desc")
        )
    }
}

/// CQL statements against the benchmark's Cassandra schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CqlDialect {
    pub series_column: String,
    pub time_column: String,
    pub value_column: String,
}

impl Default for CqlDialect {
    fn default() -> Self {
        Self {
            series_column: "series_id".to_string(),
            time_column: "timestamp_ns".to_string(),
            value_column: "value".to_string(),
        }
    }
}

impl StatementBuilder for CqlDialect {
    fn time_column(&self) -> &str {
        &self.time_column
    }

    fn build(
        &self,
        aggregation: &str,
        table: &str,
        series_id: &str,
        order_by: &str,
        bounds: TimeInterval,
    ) -> Result<PhysicalStatement> {
        let Self {
            series_column,
            time_column,
            value_column,
        } = self;

        let selection = if aggregation.is_empty() {
            format!("{time_column}, {value_column}")
        } else {
            format!("{aggregation}({value_column})")
        };
        let mut query = format!(
            "SELECT {selection} FROM {table} \
             WHERE {series_column} = ? AND {time_column} >= ? AND {time_column} < ?"
        );
        if aggregation.is_empty() && !order_by.is_empty() {
            query.push_str(" ORDER BY ");
            query.push_str(order_by);
        }

        PhysicalStatement::new(query, series_id, bounds)
    }
}

//! Serializers that turn points into the bulk-load format of a target database.

use std::borrow::Borrow;
use std::fmt;
use std::io::{self, Write};

use chrono::NaiveDate;
use tracing::debug;
use tsbench_planner::series::{SERIES_DAY_FORMAT, SERIES_ID_DELIMITER};

use crate::point::Point;
use crate::{Error, Result};

/// Writes points in one database's bulk-load format
pub trait PointSerializer: fmt::Debug + Send + Sync {
    /// Short name of the format, as accepted on the command line
    fn name(&self) -> &'static str;

    /// Write `point` to `w`, returning the number of lines written
    fn serialize(&self, point: &Point, w: &mut dyn Write) -> Result<usize>;
}

/// InfluxDB line protocol, one line per point
#[derive(Debug, Clone, Copy, Default)]
pub struct LineProtocolSerializer;

impl PointSerializer for LineProtocolSerializer {
    fn name(&self) -> &'static str {
        "influx"
    }

    fn serialize(&self, point: &Point, w: &mut dyn Write) -> Result<usize> {
        Ok(usize::from(point.write_line_protocol(w)?))
    }
}

/// Cassandra bulk-load rows, one line per field:
///
/// ```text
/// <table>,<series id>,<timestamp ns>,<value>
/// ```
///
/// The table is chosen by the type of the value and the series id has the form
/// `<measurement>[,<tag>=<value>...]#<field>#<YYYY-MM-DD>`, partitioning each series by UTC day.
#[derive(Debug, Clone, Copy, Default)]
pub struct CassandraSerializer;

impl PointSerializer for CassandraSerializer {
    fn name(&self) -> &'static str {
        "cassandra"
    }

    fn serialize(&self, point: &Point, w: &mut dyn Write) -> Result<usize> {
        let timestamp = point.timestamp().ok_or_else(|| Error::MissingTimestamp {
            measurement: point.measurement().to_string(),
        })?;
        let nanos = timestamp
            .timestamp_nanos_opt()
            .ok_or_else(|| Error::TimestampOutOfRange {
                measurement: point.measurement().to_string(),
            })?;
        let day = timestamp.date_naive();
        let tags: Vec<_> = point
            .tags()
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
            .collect();

        let mut lines = 0;
        for (field, value) in point.fields() {
            let Some(value) = value else { continue };
            let id = series_id(point.measurement(), &tags, field, day);
            write!(w, "{},{id},{nanos},", value.cassandra_table())?;
            value.write_plain(w)?;
            writeln!(w)?;
            lines += 1;
        }
        Ok(lines)
    }
}

/// The Cassandra series id of `field` of a series with the given measurement and tags, on `day`
pub fn series_id<K: AsRef<str>, V: fmt::Display>(
    measurement: &str,
    tags: &[(K, V)],
    field: &str,
    day: NaiveDate,
) -> String {
    let mut id = measurement.to_string();
    for (k, v) in tags {
        id.push(',');
        id.push_str(k.as_ref());
        id.push('=');
        id.push_str(&v.to_string());
    }
    format!(
        "{id}{SERIES_ID_DELIMITER}{field}{SERIES_ID_DELIMITER}{}",
        day.format(SERIES_DAY_FORMAT)
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub points_written: usize,
    pub lines_written: usize,
    pub bytes_written: usize,
}

/// Serialize every point to `w` and flush it
pub fn write_points<P, W>(
    serializer: &dyn PointSerializer,
    points: impl IntoIterator<Item = P>,
    w: W,
) -> Result<WriteSummary>
where
    P: Borrow<Point>,
    W: Write,
{
    let mut w = ByteCounter::new(w);
    let mut summary = WriteSummary::default();
    for point in points {
        let point: &Point = point.borrow();
        summary.lines_written += serializer.serialize(point, &mut w)?;
        summary.points_written += 1;
    }
    w.flush()?;
    summary.bytes_written = w.bytes_written();

    debug!(
        format = serializer.name(),
        points = summary.points_written,
        lines = summary.lines_written,
        bytes = summary.bytes_written,
        "serialized points"
    );
    Ok(summary)
}

struct ByteCounter<W> {
    inner: W,
    count: usize,
}

impl<W: Write> ByteCounter<W> {
    fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    fn bytes_written(&self) -> usize {
        self.count
    }
}

impl<W: Write> Write for ByteCounter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res = self.inner.write(buf);
        if let Ok(size) = res {
            self.count += size
        }
        res
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::value::FieldValue;

    fn cpu(second: u32) -> Point {
        let mut p = Point::new("cpu");
        p.append_tag("hostname", "host_0");
        p.append_tag("region", "eu-west-1");
        p.append_field("usage_user", 58.1);
        p.append_field("usage_nice", 3);
        p.set_timestamp(Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, second).unwrap());
        p
    }

    fn serialize(serializer: &dyn PointSerializer, points: &[Point]) -> (String, WriteSummary) {
        let mut buf = vec![];
        let summary = write_points(serializer, points, &mut buf).unwrap();
        (String::from_utf8(buf).unwrap(), summary)
    }

    #[test]
    fn series_id_layout() {
        let day = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
        assert_eq!(
            series_id("cpu", &[("hostname", "host_0")], "usage_user", day),
            "cpu,hostname=host_0#usage_user#2016-01-01"
        );
        assert_eq!(
            series_id::<&str, &str>("mem", &[], "used", day),
            "mem#used#2016-01-01"
        );
    }

    #[test]
    fn series_ids_parse_as_index_series() {
        let day = NaiveDate::from_ymd_opt(2016, 1, 2).unwrap();
        let id = series_id("cpu", &[("hostname", "host_3")], "usage_idle", day);
        let series = tsbench_planner::Series::parse("series_double", &id).unwrap();
        assert_eq!(series.id(), id);
        assert_eq!(series.field(), "usage_idle");
        assert_eq!(
            series.interval().start_time(),
            Utc.with_ymd_and_hms(2016, 1, 2, 0, 0, 0).unwrap()
        );
    }

    #[test_log::test]
    fn cassandra_rows_per_field() {
        let (out, summary) = serialize(&CassandraSerializer, &[cpu(0), cpu(10)]);
        assert_eq!(
            out,
            "series_double,cpu,hostname=host_0,region=eu-west-1#usage_user#2016-01-01,\
             1451606400000000000,58.1\n\
             series_bigint,cpu,hostname=host_0,region=eu-west-1#usage_nice#2016-01-01,\
             1451606400000000000,3\n\
             series_double,cpu,hostname=host_0,region=eu-west-1#usage_user#2016-01-01,\
             1451606410000000000,58.1\n\
             series_bigint,cpu,hostname=host_0,region=eu-west-1#usage_nice#2016-01-01,\
             1451606410000000000,3\n"
        );
        assert_eq!(
            summary,
            WriteSummary {
                points_written: 2,
                lines_written: 4,
                bytes_written: out.len(),
            }
        );
    }

    #[test]
    fn cassandra_skips_cleared_values() {
        let mut p = cpu(0);
        p.clear_field_value("usage_user");
        p.clear_tag_value("region");
        let (out, _) = serialize(&CassandraSerializer, &[p]);
        assert_eq!(
            out,
            "series_bigint,cpu,hostname=host_0#usage_nice#2016-01-01,1451606400000000000,3\n"
        );
    }

    #[test]
    fn cassandra_requires_a_timestamp() {
        let mut p = Point::new("cpu");
        p.append_field("usage_user", 1.0);
        let err = CassandraSerializer.serialize(&p, &mut io::sink()).unwrap_err();
        assert!(matches!(err, Error::MissingTimestamp { .. }));
    }

    #[test]
    fn line_protocol_summary() {
        let mut empty = Point::new("cpu");
        empty.append_tag("hostname", "host_0");
        let (out, summary) = serialize(&LineProtocolSerializer, &[cpu(0), empty]);
        assert_eq!(
            out,
            "cpu,hostname=host_0,region=eu-west-1 usage_user=58.1,usage_nice=3i \
             1451606400000000000\n"
        );
        assert_eq!(summary.points_written, 2);
        assert_eq!(summary.lines_written, 1);
    }

    #[test]
    fn values_round_trip_through_the_series_table() {
        let mut p = Point::new("status");
        p.append_field("up", true);
        p.append_field("note", FieldValue::from("ok"));
        p.set_timestamp(Utc.with_ymd_and_hms(2016, 1, 2, 0, 0, 0).unwrap());
        let (out, _) = serialize(&CassandraSerializer, &[p]);
        let tables: Vec<_> = out.lines().map(|l| l.split(',').next().unwrap()).collect();
        assert_eq!(tables, vec!["series_boolean", "series_blob"]);
    }
}

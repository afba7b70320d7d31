//! A single data point of one measurement.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::value::FieldValue;

/// One point in time of one measurement
///
/// Tags and fields keep their insertion order. Each key is paired with its value, and a value
/// may be cleared to `None` so a point can be reused across samples without reallocating; cleared
/// entries are skipped when the point is serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Point {
    measurement: Arc<str>,
    tags: Vec<(Arc<str>, Option<FieldValue>)>,
    fields: Vec<(Arc<str>, Option<FieldValue>)>,
    timestamp: Option<DateTime<Utc>>,
}

impl Point {
    pub fn new(measurement: impl Into<Arc<str>>) -> Self {
        Self {
            measurement: measurement.into(),
            ..Default::default()
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn set_measurement(&mut self, measurement: impl Into<Arc<str>>) {
        self.measurement = measurement.into();
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = Some(timestamp);
    }

    pub fn append_tag(&mut self, key: impl Into<Arc<str>>, value: impl Into<FieldValue>) {
        self.tags.push((key.into(), Some(value.into())));
    }

    pub fn append_field(&mut self, key: impl Into<Arc<str>>, value: impl Into<FieldValue>) {
        self.fields.push((key.into(), Some(value.into())));
    }

    pub fn tags(&self) -> &[(Arc<str>, Option<FieldValue>)] {
        &self.tags
    }

    pub fn fields(&self) -> &[(Arc<str>, Option<FieldValue>)] {
        &self.fields
    }

    /// The value of the first tag named `key`, if present and not cleared
    pub fn tag_value(&self, key: &str) -> Option<&FieldValue> {
        lookup(&self.tags, key)
    }

    /// The value of the first field named `key`, if present and not cleared
    pub fn field_value(&self, key: &str) -> Option<&FieldValue> {
        lookup(&self.fields, key)
    }

    /// Clear the value of the first tag named `key`, keeping its slot
    pub fn clear_tag_value(&mut self, key: &str) {
        clear(&mut self.tags, key);
    }

    /// Clear the value of the first field named `key`, keeping its slot
    pub fn clear_field_value(&mut self, key: &str) {
        clear(&mut self.fields, key);
    }

    /// Remove every tag, field and the timestamp, keeping allocated capacity
    pub fn reset(&mut self) {
        self.measurement = Arc::from("");
        self.tags.clear();
        self.fields.clear();
        self.timestamp = None;
    }

    /// Write the point as one line of InfluxDB line protocol, newline terminated
    ///
    /// Non-text tag values are written as leading fields. A point with no field to write produces
    /// no output and returns false. The timestamp, when set, is written in nanoseconds.
    pub fn write_line_protocol<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<bool> {
        let (text_tags, fake_tags): (Vec<_>, Vec<_>) = self
            .tags
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
            .partition(|(_, v)| matches!(v, FieldValue::Text(_)));
        let fields: Vec<_> = fake_tags
            .into_iter()
            .chain(
                self.fields
                    .iter()
                    .filter_map(|(k, v)| v.as_ref().map(|v| (k, v))),
            )
            .collect();
        if fields.is_empty() {
            return Ok(false);
        }

        w.write_all(escape_measurement(&self.measurement).as_bytes())?;
        for (key, value) in text_tags {
            write!(
                w,
                ",{}={}",
                escape_key(key),
                escape_key(&value.to_string())
            )?;
        }
        for (i, (key, value)) in fields.into_iter().enumerate() {
            let separator = if i == 0 { " " } else { "," };
            write!(w, "{separator}{}=", escape_key(key))?;
            value.write_line_protocol(w)?;
        }
        if let Some(nanos) = self.timestamp.and_then(|t| t.timestamp_nanos_opt()) {
            write!(w, " {nanos}")?;
        }
        writeln!(w)?;
        Ok(true)
    }
}

fn lookup<'a>(entries: &'a [(Arc<str>, Option<FieldValue>)], key: &str) -> Option<&'a FieldValue> {
    entries
        .iter()
        .find(|(k, _)| **k == *key)
        .and_then(|(_, v)| v.as_ref())
}

fn clear(entries: &mut [(Arc<str>, Option<FieldValue>)], key: &str) {
    if let Some((_, v)) = entries.iter_mut().find(|(k, _)| **k == *key) {
        *v = None;
    }
}

fn escape_measurement(s: &str) -> String {
    s.replace(' ', "\\ ").replace(',', "\\,")
}

fn escape_key(s: &str) -> String {
    s.replace(' ', "\\ ")
        .replace(',', "\\,")
        .replace('=', "\\=")
}

/// Renders the line protocol form, or an empty string for a point without fields
impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = vec![];
        self.write_line_protocol(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

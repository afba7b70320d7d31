//! Typed tag and field values.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

/// The value of a tag or field
///
/// Tags are normally [`FieldValue::Text`]; any other variant on a tag is written as a field by the
/// line protocol serializer.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(Arc<str>),
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Table of the Cassandra bulk-load schema that stores values of this type
    pub fn cassandra_table(&self) -> &'static str {
        match self {
            Self::Integer(_) => "series_bigint",
            Self::Float(_) => "series_double",
            Self::Boolean(_) => "series_boolean",
            Self::Text(_) | Self::Bytes(_) => "series_blob",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Write the value without any type decoration
    pub(crate) fn write_plain<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Self::Bytes(b) => w.write_all(b),
            other => write!(w, "{other}"),
        }
    }

    /// Write the value as a line protocol field value: integers carry an `i` suffix and text is
    /// quoted
    pub(crate) fn write_line_protocol<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Self::Integer(i) => write!(w, "{i}i"),
            Self::Text(s) => write!(w, "\"{}\"", escape_string_field(s)),
            Self::Bytes(b) => write!(w, "\"{}\"", escape_string_field(&String::from_utf8_lossy(b))),
            other => write!(w, "{other}"),
        }
    }
}

fn escape_string_field(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
            Self::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(Arc::from(v))
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(Arc::from(v))
    }
}

impl From<Arc<str>> for FieldValue {
    fn from(v: Arc<str>) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn line_protocol(v: &FieldValue) -> String {
        let mut buf = vec![];
        v.write_line_protocol(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn plain_formatting() {
        assert_eq!(FieldValue::from(42).to_string(), "42");
        assert_eq!(FieldValue::from(58.1).to_string(), "58.1");
        assert_eq!(FieldValue::from(3.0).to_string(), "3");
        assert_eq!(FieldValue::from(true).to_string(), "true");
        assert_eq!(FieldValue::from("eu-west-1").to_string(), "eu-west-1");
        assert_eq!(FieldValue::from(b"raw".to_vec()).to_string(), "raw");
    }

    #[test]
    fn line_protocol_decoration() {
        assert_eq!(line_protocol(&FieldValue::from(-7)), "-7i");
        assert_eq!(line_protocol(&FieldValue::from(0.5)), "0.5");
        assert_eq!(line_protocol(&FieldValue::from(false)), "false");
        assert_eq!(
            line_protocol(&FieldValue::from(r#"say "hi" \o/"#)),
            r#""say \"hi\" \\o/""#
        );
    }

    #[test]
    fn cassandra_tables_follow_value_type() {
        assert_eq!(FieldValue::from(1).cassandra_table(), "series_bigint");
        assert_eq!(FieldValue::from(1.0).cassandra_table(), "series_double");
        assert_eq!(FieldValue::from(true).cassandra_table(), "series_boolean");
        assert_eq!(FieldValue::from("x").cassandra_table(), "series_blob");
        assert_eq!(FieldValue::from(vec![1u8]).cassandra_table(), "series_blob");
    }

    #[test]
    fn numeric_views() {
        assert_eq!(FieldValue::from(2).as_f64(), Some(2.0));
        assert_eq!(FieldValue::from(2.5).as_f64(), Some(2.5));
        assert_eq!(FieldValue::from("2").as_f64(), None);
        assert_eq!(FieldValue::from("host_0").as_text(), Some("host_0"));
    }
}

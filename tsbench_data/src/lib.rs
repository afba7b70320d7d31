//! Database-agnostic data points and the wire formats they are serialized to.

pub mod point;
pub mod serialize;
pub mod value;

pub use point::Point;
pub use serialize::{
    CassandraSerializer, LineProtocolSerializer, PointSerializer, WriteSummary, series_id,
    write_points,
};
pub use value::FieldValue;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("point in measurement '{measurement}' has no timestamp")]
    MissingTimestamp { measurement: String },

    #[error("timestamp of point in measurement '{measurement}' cannot be represented in nanoseconds")]
    TimestampOutOfRange { measurement: String },

    #[error("failed to write serialized points: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! The client-side index of known series.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::series::Series;

/// In-memory multimap from (measurement, field) to the series stored for that pair
///
/// The target store cannot find series by tag combination, so the planner looks candidates up
/// here and filters them itself. The index is built once and never mutated afterwards.
#[derive(Debug, Default)]
pub struct ClientSideIndex {
    series: HashMap<Arc<str>, HashMap<Arc<str>, Vec<Series>>>,
    series_count: usize,
}

impl ClientSideIndex {
    pub fn new(series: impl IntoIterator<Item = Series>) -> Self {
        let mut index = Self::default();
        for s in series {
            index
                .series
                .entry(Arc::from(s.measurement()))
                .or_default()
                .entry(Arc::from(s.field()))
                .or_default()
                .push(s);
            index.series_count += 1;
        }

        info!(
            series = index.series_count,
            measurements = index.series.len(),
            keys = index.key_count(),
            "built client-side index"
        );
        index
    }

    /// Every series registered for `measurement` and `field`
    pub fn series_for_measurement_and_field(&self, measurement: &str, field: &str) -> &[Series] {
        self.series
            .get(measurement)
            .and_then(|fields| fields.get(field))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The concatenation of the candidates for each of `fields`, in field order
    ///
    /// A field listed twice contributes its series twice.
    pub fn series_for_fields<S: AsRef<str>>(&self, measurement: &str, fields: &[S]) -> Vec<&Series> {
        let candidates: Vec<_> = fields
            .iter()
            .flat_map(|f| self.series_for_measurement_and_field(measurement, f.as_ref()))
            .collect();
        debug!(
            measurement,
            fields = fields.len(),
            candidates = candidates.len(),
            "looked up candidate series"
        );
        candidates
    }

    pub fn len(&self) -> usize {
        self.series_count
    }

    pub fn is_empty(&self) -> bool {
        self.series_count == 0
    }

    /// Number of distinct (measurement, field) pairs
    pub fn key_count(&self) -> usize {
        self.series.values().map(HashMap::len).sum()
    }

    pub fn measurements(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|m| &**m)
    }
}

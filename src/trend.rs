//! Confidence trend projection.
//!
//! Labels carry chronological position: the oldest entry is `#1` and the newest
//! carries the largest number, while the series itself stays newest-first so it
//! lines up index-for-index with the history it was built from.

use serde::Serialize;

use crate::insight::Insight;

pub const SERIES_LABEL: &str = "Confidence (%)";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub label: &'static str,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl Default for ChartSeries {
    fn default() -> Self {
        Self {
            label: SERIES_LABEL,
            labels: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl ChartSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// (label, value) pairs in series order.
    pub fn points(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Project a newest-first history into a chart series.
pub fn project(history: &[Insight]) -> ChartSeries {
    let n = history.len();
    let labels = (0..n).map(|i| format!("#{}", n - i)).collect();
    let values = history.iter().map(Insight::confidence_pct).collect();
    ChartSeries {
        label: SERIES_LABEL,
        labels,
        values,
    }
}

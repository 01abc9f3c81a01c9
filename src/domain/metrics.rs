//! Field metric types (real-user performance measurements)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Device profile a field measurement was aggregated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceProfile {
    Mobile,
    Desktop,
}

impl DeviceProfile {
    /// The strategy value the field-metrics API expects
    pub fn as_strategy(&self) -> &'static str {
        match self {
            DeviceProfile::Mobile => "PHONE",
            DeviceProfile::Desktop => "DESKTOP",
        }
    }
}

impl std::fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceProfile::Mobile => write!(f, "mobile"),
            DeviceProfile::Desktop => write!(f, "desktop"),
        }
    }
}

/// Canonical metric keys. The aggregator's rename table maps the source's raw
/// spellings (including legacy ones) onto these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    LargestContentfulPaint,
    InteractionToNextPaint,
    CumulativeLayoutShift,
    FirstContentfulPaint,
    TimeToFirstByte,
}

impl MetricKey {
    /// All canonical keys, in weight-table order
    pub const ALL: [MetricKey; 5] = [
        MetricKey::LargestContentfulPaint,
        MetricKey::InteractionToNextPaint,
        MetricKey::CumulativeLayoutShift,
        MetricKey::FirstContentfulPaint,
        MetricKey::TimeToFirstByte,
    ];

    /// Human-readable label for report output
    pub fn label(&self) -> &'static str {
        match self {
            MetricKey::LargestContentfulPaint => "Largest Contentful Paint",
            MetricKey::InteractionToNextPaint => "Interaction to Next Paint",
            MetricKey::CumulativeLayoutShift => "Cumulative Layout Shift",
            MetricKey::FirstContentfulPaint => "First Contentful Paint",
            MetricKey::TimeToFirstByte => "Time to First Byte",
        }
    }
}

/// Speed category reported by the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Fast,
    Average,
    Slow,
}

impl MetricCategory {
    /// Parse the source's spelling, tolerating both the current
    /// FAST/AVERAGE/SLOW and the legacy GOOD/NEEDS_IMPROVEMENT/POOR forms
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "FAST" | "GOOD" => Some(MetricCategory::Fast),
            "AVERAGE" | "NEEDS_IMPROVEMENT" => Some(MetricCategory::Average),
            "SLOW" | "POOR" => Some(MetricCategory::Slow),
            _ => None,
        }
    }
}

/// One bucket of a metric's value distribution
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DistributionBucket {
    /// Inclusive lower bound, absent for the first open bucket
    pub min: Option<f64>,
    /// Exclusive upper bound, absent for the last open bucket
    pub max: Option<f64>,
    /// Fraction of page loads falling in this bucket
    pub proportion: f64,
}

/// One Core-Web-Vitals-style measurement for one device profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMetric {
    /// 75th-percentile value; milliseconds for timing metrics, unitless for
    /// layout shift
    pub percentile: f64,
    /// Speed category assigned by the source
    pub category: MetricCategory,
    /// Value distribution; proportions sum to ~1.0 across the buckets
    pub distributions: Vec<DistributionBucket>,
}

impl FieldMetric {
    /// Sum of the distribution proportions (should be ~1.0, modulo rounding)
    pub fn distribution_sum(&self) -> f64 {
        self.distributions.iter().map(|b| b.proportion).sum()
    }
}

/// Per-URL, per-device collection of field metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldDataSet {
    /// Overall speed category for the page, when the source reports one
    pub overall_category: Option<MetricCategory>,
    /// Metrics present for this device. A metric with no matching raw key is
    /// simply absent, never zero.
    pub metrics: BTreeMap<MetricKey, FieldMetric>,
}

impl FieldDataSet {
    /// Whether at least one metric is present
    pub fn has_metrics(&self) -> bool {
        !self.metrics.is_empty()
    }
}

//! Compact report types returned across the facade boundary.
//!
//! Raw scan payloads never cross this boundary; downstream consumers (the UI
//! and narrative layer) receive only these shapes.

use serde::{Deserialize, Serialize};

use super::metrics::{FieldDataSet, MetricKey};
use super::scan::{JobStatus, Technology};

/// Per-metric contribution to the overall performance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricScore {
    /// Canonical metric key
    pub key: MetricKey,
    /// Human-readable label
    pub label: String,
    /// Measured 75th-percentile value
    pub value: f64,
    /// Weight from the fixed weight table
    pub weight: f64,
    /// Normalized 0-100 score for this metric
    pub score: u32,
}

/// Weighted overall performance score with its per-metric breakdown.
///
/// The overall score divides by the sum of the *present* metrics' weights, so
/// a missing metric's weight is redistributed rather than counted as zero.
/// Known characteristic, pinned by tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceScoreBreakdown {
    /// Weighted overall score, 0-100
    pub overall_score: u32,
    /// One entry per metric present in the input
    pub metrics: Vec<MetricScore>,
}

/// Discrete risk classification, ordered from harmless to dangerous
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        write!(f, "{label}")
    }
}

/// Decision-ready security summary for a scanned page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySummary {
    /// First-match risk classification
    pub risk_level: RiskLevel,
    /// Whether the overall verdict was malicious
    pub malicious: bool,
    /// Human-readable threat statements
    pub threats: Vec<String>,
    /// Human-readable remediation suggestions
    pub recommendations: Vec<String>,
    /// Security score, clamped to [0, 100]
    pub score: u32,
}

/// Result of a security analysis call: job metadata plus the summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityReport {
    /// External job id, kept so callers can link to the full scan
    pub job_id: String,
    /// Whether the scan was freshly submitted or a recent one was reused
    pub job_status: JobStatus,
    /// The reduced summary
    pub summary: SecuritySummary,
}

/// Result of a technology analysis call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnologyReport {
    /// External job id
    pub job_id: String,
    /// Whether the scan was freshly submitted or reused
    pub job_status: JobStatus,
    /// Detected technologies, sorted by confidence descending
    pub technologies: Vec<Technology>,
}

/// Joined dual-device field-metric result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldDataReport {
    /// True iff at least one requested device produced at least one metric
    pub has_data: bool,
    /// Mobile data, absent if the fetch failed or produced zero metrics
    pub mobile: Option<FieldDataSet>,
    /// Desktop data, absent if the fetch failed or produced zero metrics
    pub desktop: Option<FieldDataSet>,
}

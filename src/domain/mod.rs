//! Core data model: scan jobs, field metrics, and report types

mod metrics;
mod report;
mod scan;

pub use metrics::{
    DeviceProfile, DistributionBucket, FieldDataSet, FieldMetric, MetricCategory, MetricKey,
};
pub use report::{
    FieldDataReport, MetricScore, PerformanceScoreBreakdown, RiskLevel, SecurityReport,
    SecuritySummary, TechnologyReport,
};
pub use scan::{
    Detection, JobStatus, NetworkSummary, OverallVerdict, PageSignals, ScanJob, ScanResult,
    Technology, Verdicts, Visibility,
};

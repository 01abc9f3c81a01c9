//! Scan job lifecycle and result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Whether a scan appears in the external service's public search index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Indexed and discoverable by anyone
    Public,
    /// Retrievable by id only
    Unlisted,
}

/// The status of a submitted scan job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// A new job was created on the external service
    Submitted,
    /// An existing, sufficiently recent job for the same URL was found
    /// instead of creating a new one
    Reused,
    /// The external service reports the job as still in progress
    Running,
    /// Terminal: the job produced a result
    Finished,
    /// Terminal: the job failed on the external service
    Failed,
    /// Terminal: the client-side polling budget was exhausted
    TimedOut,
}

impl JobStatus {
    /// Whether no further transition occurs from this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed | JobStatus::TimedOut)
    }

    /// Short label used in logs
    pub fn as_label(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Reused => "reused",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

/// One submitted unit of work against an external scanner.
///
/// Created at submission time, mutated only by the polling loop, and never
/// persisted beyond the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    /// Opaque identifier assigned by the external service
    pub id: String,

    /// Normalized absolute target URL
    pub target_url: String,

    /// Search-index visibility requested at submission
    pub visibility: Visibility,

    /// Current status
    pub status: JobStatus,

    /// When the job was submitted (or, for reused jobs, when the original
    /// scan ran, if the search result carried a timestamp)
    pub submitted_at: DateTime<Utc>,
}

impl ScanJob {
    /// Create a job record for a freshly submitted scan
    pub fn submitted(id: impl Into<String>, target_url: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            id: id.into(),
            target_url: target_url.into(),
            visibility,
            status: JobStatus::Submitted,
            submitted_at: Utc::now(),
        }
    }

    /// Create a job record for a reused pre-existing scan
    pub fn reused(
        id: impl Into<String>,
        target_url: impl Into<String>,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.into(),
            target_url: target_url.into(),
            // Reused jobs were found through the search index.
            visibility: Visibility::Public,
            status: JobStatus::Reused,
            submitted_at: submitted_at.unwrap_or_else(Utc::now),
        }
    }
}

/// A single true/false detection signal from a scanning engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// Whether the engine flagged the page
    pub detected: bool,
}

impl Detection {
    /// Convenience constructor
    pub fn new(detected: bool) -> Self {
        Self { detected }
    }
}

/// The overall judgement about a scanned page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverallVerdict {
    /// Whether the page is judged malicious
    pub malicious: bool,
    /// Flagged category names (e.g. "phishing", "suspicious-redirect")
    pub categories: BTreeSet<String>,
    /// Free-form tags attached by the service
    pub tags: BTreeSet<String>,
}

/// Structured judgement for a finished scan.
///
/// Named sub-verdicts are modeled as fields rather than a string-keyed map so
/// that risk classification is an exhaustive match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Verdicts {
    /// Combined verdict across engines
    pub overall: OverallVerdict,
    /// Phishing-specific detection
    pub phishing: Detection,
    /// Malware-specific detection
    pub malware: Detection,
    /// Spam-specific detection
    pub spam: Detection,
}

/// One detected technology with its fingerprint confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technology {
    /// Product or library name
    pub name: String,
    /// Fingerprint confidence, clamped to [0, 100] on ingest
    pub confidence: f64,
    /// Category names (e.g. "CMS", "Analytics")
    pub categories: BTreeSet<String>,
}

/// Request counts observed while the page loaded; used only for scoring
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NetworkSummary {
    /// Total requests issued
    pub total_requests: u32,
    /// Distinct domains contacted
    pub unique_domains: u32,
    /// Requests to domains other than the page's own
    pub third_party_requests: u32,
    /// Requests over plain HTTP
    pub http_requests: u32,
    /// Requests over HTTPS
    pub https_requests: u32,
}

/// Page-level signals used by the security score
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSignals {
    /// URL of the page after redirects settled
    pub final_url: String,
    /// Whether a Content-Security-Policy header was observed
    pub content_security_policy: bool,
}

/// The payload returned once a scan job reaches `Finished`.
///
/// Failed and timed-out jobs never produce one. Technologies are deduplicated
/// by name and sorted by confidence descending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    /// Structured maliciousness judgement
    pub verdicts: Verdicts,
    /// Detected technologies, confidence-sorted
    pub technologies: Vec<Technology>,
    /// Request counts for scoring
    pub network: NetworkSummary,
    /// Page-level scoring signals
    pub page: PageSignals,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::TimedOut.is_terminal());
        assert!(!JobStatus::Submitted.is_terminal());
        assert!(!JobStatus::Reused.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_reused_job_defaults_timestamp() {
        let job = ScanJob::reused("abc", "https://example.com", None);
        assert_eq!(job.status, JobStatus::Reused);
        assert_eq!(job.id, "abc");
    }
}

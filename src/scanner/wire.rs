//! Wire shapes for the external scanning API and their interpretation into
//! domain types.
//!
//! Bodies are deserialized with lenient defaults and then interpreted by
//! explicit functions, so the three submission shapes (new job, 409 reuse,
//! malformed) and the ready/not-ready/failed result states are exhaustive
//! matches rather than optional-field probing.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{FetchOutcome, SubmitOutcome};
use crate::domain::{
    NetworkSummary, OverallVerdict, PageSignals, ScanResult, Technology, Verdicts,
};
use crate::error::AnalysisError;

/// `GET /search` response
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

/// One search hit wrapping the original submission task
#[derive(Debug, Deserialize)]
pub struct SearchHit {
    pub task: TaskRef,
}

/// Reference to a scan task on the external service
#[derive(Debug, Deserialize)]
pub struct TaskRef {
    pub uuid: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

/// `POST /scan` response body, shared by the 2xx and 409 shapes
#[derive(Debug, Default, Deserialize)]
pub struct SubmitBody {
    /// Present on a 2xx new-job response
    #[serde(default)]
    pub uuid: Option<String>,
    /// Present on a 409 response pointing at the existing scan
    #[serde(default)]
    pub result: Option<ExistingScanRef>,
    #[serde(default)]
    pub message: Option<String>,
}

/// The existing-task reference embedded in a 409 body
#[derive(Debug, Deserialize)]
pub struct ExistingScanRef {
    #[serde(default)]
    pub task: Option<TaskRef>,
}

/// Interpret a submission response into the tagged outcome.
///
/// Non-2xx, non-409 statuses are handled by the caller before this point.
pub fn interpret_submit(status: u16, body: SubmitBody) -> Result<SubmitOutcome, AnalysisError> {
    if status == 409 {
        return match body.result.and_then(|r| r.task) {
            Some(task) => Ok(SubmitOutcome::AlreadyScanned { id: task.uuid }),
            None => Err(AnalysisError::MalformedResponse {
                context: "409 submission response carried no existing task reference".to_string(),
            }),
        };
    }

    match body.uuid {
        Some(uuid) => Ok(SubmitOutcome::Created { id: uuid }),
        None => Err(AnalysisError::MalformedResponse {
            context: "submission response carried no job id".to_string(),
        }),
    }
}

/// `GET /result/{id}` response envelope
#[derive(Debug, Default, Deserialize)]
pub struct ResultEnvelope {
    /// Terminal success flag; absent while the job is still running
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<RawScanResult>,
}

/// Interpret a 200 result envelope. A 404 never reaches this function; the
/// HTTP layer maps it to [`FetchOutcome::NotReady`] directly.
pub fn interpret_result(envelope: ResultEnvelope) -> Result<FetchOutcome, AnalysisError> {
    match envelope.success {
        Some(true) => match envelope.result {
            Some(raw) => Ok(FetchOutcome::Ready(raw.into_domain())),
            None => Err(AnalysisError::MalformedResponse {
                context: "successful result envelope carried no payload".to_string(),
            }),
        },
        Some(false) => Ok(FetchOutcome::Failed {
            message: envelope
                .message
                .unwrap_or_else(|| "scan failed without a message".to_string()),
        }),
        None => {
            let message = envelope.message.unwrap_or_default().to_lowercase();
            if message.contains("not ready") || message.contains("not found") || message.is_empty()
            {
                Ok(FetchOutcome::NotReady)
            } else {
                Err(AnalysisError::MalformedResponse {
                    context: format!("unrecognized result envelope: {message}"),
                })
            }
        }
    }
}

/// Raw finished-scan payload
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScanResult {
    #[serde(default)]
    pub verdicts: RawVerdicts,
    #[serde(default)]
    pub meta: RawMeta,
    #[serde(default)]
    pub stats: RawStats,
    #[serde(default)]
    pub page: RawPage,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawVerdicts {
    #[serde(default)]
    pub overall: RawOverall,
    #[serde(default)]
    pub phishing: RawDetection,
    #[serde(default)]
    pub malware: RawDetection,
    #[serde(default)]
    pub spam: RawDetection,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawOverall {
    #[serde(default)]
    pub malicious: bool,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawDetection {
    #[serde(default)]
    pub detected: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawMeta {
    #[serde(default)]
    pub processors: RawProcessors,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawProcessors {
    #[serde(default)]
    pub tech: RawTechList,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawTechList {
    #[serde(default)]
    pub data: Vec<RawTech>,
}

#[derive(Debug, Deserialize)]
pub struct RawTech {
    pub name: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub categories: Vec<RawCategory>,
}

#[derive(Debug, Deserialize)]
pub struct RawCategory {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStats {
    #[serde(default)]
    pub total_requests: u32,
    #[serde(default)]
    pub unique_domains: u32,
    #[serde(default)]
    pub third_party_requests: u32,
    #[serde(default)]
    pub http_requests: u32,
    #[serde(default)]
    pub https_requests: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPage {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub security_headers: Vec<RawHeader>,
}

#[derive(Debug, Deserialize)]
pub struct RawHeader {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl RawScanResult {
    /// Reduce the raw payload to the domain result: technologies deduplicated
    /// by name (highest confidence wins), confidence clamped to [0, 100],
    /// sorted descending.
    pub fn into_domain(self) -> ScanResult {
        let mut by_name: BTreeMap<String, Technology> = BTreeMap::new();
        for raw in self.meta.processors.tech.data {
            let confidence = raw.confidence.clamp(0.0, 100.0);
            let categories: BTreeSet<String> = raw
                .categories
                .into_iter()
                .map(|c| c.name)
                .filter(|n| !n.is_empty())
                .collect();
            match by_name.entry(raw.name) {
                std::collections::btree_map::Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    if confidence > existing.confidence {
                        existing.confidence = confidence;
                    }
                    existing.categories.extend(categories);
                }
                std::collections::btree_map::Entry::Vacant(entry) => {
                    let name = entry.key().clone();
                    entry.insert(Technology {
                        name,
                        confidence,
                        categories,
                    });
                }
            }
        }
        let mut technologies: Vec<Technology> = by_name.into_values().collect();
        technologies.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });

        let content_security_policy = self
            .page
            .security_headers
            .iter()
            .any(|h| h.name.eq_ignore_ascii_case("content-security-policy") && !h.value.is_empty());

        ScanResult {
            verdicts: Verdicts {
                overall: OverallVerdict {
                    malicious: self.verdicts.overall.malicious,
                    categories: self.verdicts.overall.categories.into_iter().collect(),
                    tags: self.verdicts.overall.tags.into_iter().collect(),
                },
                phishing: crate::domain::Detection::new(self.verdicts.phishing.detected),
                malware: crate::domain::Detection::new(self.verdicts.malware.detected),
                spam: crate::domain::Detection::new(self.verdicts.spam.detected),
            },
            technologies,
            network: NetworkSummary {
                total_requests: self.stats.total_requests,
                unique_domains: self.stats.unique_domains,
                third_party_requests: self.stats.third_party_requests,
                http_requests: self.stats.http_requests,
                https_requests: self.stats.https_requests,
            },
            page: PageSignals {
                final_url: self.page.url,
                content_security_policy,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_submit_new_job() {
        let body: SubmitBody =
            serde_json::from_str(r#"{"uuid":"job-1","message":"Submission successful"}"#).unwrap();
        let outcome = interpret_submit(200, body).unwrap();
        assert_eq!(outcome, SubmitOutcome::Created { id: "job-1".to_string() });
    }

    #[test]
    fn test_interpret_submit_409_with_task_reference() {
        let body: SubmitBody = serde_json::from_str(
            r#"{"message":"url was recently scanned","result":{"task":{"uuid":"old-3","url":"https://example.com"}}}"#,
        )
        .unwrap();
        let outcome = interpret_submit(409, body).unwrap();
        assert_eq!(outcome, SubmitOutcome::AlreadyScanned { id: "old-3".to_string() });
    }

    #[test]
    fn test_interpret_submit_409_without_task_is_malformed() {
        let body: SubmitBody = serde_json::from_str(r#"{"message":"conflict"}"#).unwrap();
        let err = interpret_submit(409, body).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse { .. }));
    }

    #[test]
    fn test_interpret_submit_2xx_without_uuid_is_malformed() {
        let err = interpret_submit(200, SubmitBody::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse { .. }));
    }

    #[test]
    fn test_interpret_result_success_is_ready() {
        let envelope: ResultEnvelope =
            serde_json::from_str(r#"{"success":true,"result":{}}"#).unwrap();
        assert!(matches!(interpret_result(envelope).unwrap(), FetchOutcome::Ready(_)));
    }

    #[test]
    fn test_interpret_result_explicit_failure() {
        let envelope: ResultEnvelope =
            serde_json::from_str(r#"{"success":false,"message":"scan engine error"}"#).unwrap();
        match interpret_result(envelope).unwrap() {
            FetchOutcome::Failed { message } => assert_eq!(message, "scan engine error"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_interpret_result_not_ready_message() {
        let envelope: ResultEnvelope =
            serde_json::from_str(r#"{"message":"Scan is not ready yet"}"#).unwrap();
        assert!(matches!(interpret_result(envelope).unwrap(), FetchOutcome::NotReady));
    }

    #[test]
    fn test_technologies_deduplicated_clamped_and_sorted() {
        let raw: RawScanResult = serde_json::from_str(
            r#"{
                "meta": {"processors": {"tech": {"data": [
                    {"name": "React", "confidence": 60, "categories": [{"name": "JavaScript frameworks"}]},
                    {"name": "Nginx", "confidence": 140, "categories": [{"name": "Web servers"}]},
                    {"name": "React", "confidence": 95, "categories": [{"name": "UI"}]},
                    {"name": "Matomo", "confidence": -5, "categories": [{"name": "Analytics"}]}
                ]}}}
            }"#,
        )
        .unwrap();
        let result = raw.into_domain();

        let names: Vec<&str> = result.technologies.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Nginx", "React", "Matomo"]);
        assert!(result.technologies.iter().all(|t| (0.0..=100.0).contains(&t.confidence)));

        let react = result.technologies.iter().find(|t| t.name == "React").unwrap();
        assert_eq!(react.confidence, 95.0);
        assert!(react.categories.contains("UI"));
        assert!(react.categories.contains("JavaScript frameworks"));
    }

    #[test]
    fn test_csp_header_signal() {
        let raw: RawScanResult = serde_json::from_str(
            r#"{"page": {"url": "https://example.com/", "securityHeaders": [
                {"name": "Content-Security-Policy", "value": "default-src 'self'"}
            ]}}"#,
        )
        .unwrap();
        let result = raw.into_domain();
        assert!(result.page.content_security_policy);
        assert_eq!(result.page.final_url, "https://example.com/");
    }
}

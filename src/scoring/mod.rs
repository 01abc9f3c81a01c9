//! Composite scoring engine: normalized per-metric scores, a weighted
//! overall performance score, a security score, and risk classification.

use std::collections::BTreeSet;

use crate::domain::{
    FieldDataSet, MetricKey, MetricScore, PerformanceScoreBreakdown, RiskLevel, ScanResult,
    SecuritySummary, Verdicts,
};

/// Fixed weight per metric; sums to 1.0 over the canonical five-metric set
pub fn weight(key: MetricKey) -> f64 {
    match key {
        MetricKey::LargestContentfulPaint => 0.25,
        MetricKey::InteractionToNextPaint => 0.25,
        MetricKey::CumulativeLayoutShift => 0.25,
        MetricKey::FirstContentfulPaint => 0.10,
        MetricKey::TimeToFirstByte => 0.15,
    }
}

/// Fixed {good, poor} thresholds per metric, in the metric's own unit
pub fn thresholds(key: MetricKey) -> (f64, f64) {
    match key {
        MetricKey::LargestContentfulPaint => (2500.0, 4000.0),
        MetricKey::InteractionToNextPaint => (200.0, 500.0),
        MetricKey::CumulativeLayoutShift => (0.1, 0.25),
        MetricKey::FirstContentfulPaint => (1800.0, 3000.0),
        MetricKey::TimeToFirstByte => (800.0, 1800.0),
    }
}

/// Score one metric value: 100 at or below good, 0 at or above poor, linear
/// in between, rounded to the nearest integer
pub fn metric_score(key: MetricKey, value: f64) -> u32 {
    let (good, poor) = thresholds(key);
    if value <= good {
        100
    } else if value >= poor {
        0
    } else {
        (100.0 - (value - good) / (poor - good) * 100.0).round() as u32
    }
}

/// Compute the weighted overall performance score for one device's metrics.
///
/// The denominator is the sum of weights of the metrics actually present: a
/// missing metric's weight is redistributed, not counted as zero. This
/// matches the reference behavior and is pinned by tests. Returns `None` when
/// no scoreable metric is present.
pub fn performance_score(data: &FieldDataSet) -> Option<PerformanceScoreBreakdown> {
    let mut entries = Vec::new();
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;

    for key in MetricKey::ALL {
        let Some(metric) = data.metrics.get(&key) else {
            continue;
        };
        let score = metric_score(key, metric.percentile);
        let w = weight(key);
        weighted_sum += f64::from(score) * w;
        weight_sum += w;
        entries.push(MetricScore {
            key,
            label: key.label().to_string(),
            value: metric.percentile,
            weight: w,
            score,
        });
    }

    if entries.is_empty() {
        return None;
    }

    Some(PerformanceScoreBreakdown {
        overall_score: (weighted_sum / weight_sum).round() as u32,
        metrics: entries,
    })
}

/// Fraction of observed requests that went to third-party hosts
fn third_party_ratio(result: &ScanResult) -> f64 {
    if result.network.total_requests == 0 {
        return 0.0;
    }
    f64::from(result.network.third_party_requests) / f64::from(result.network.total_requests)
}

/// Compute the 0-100 security score for a finished scan
pub fn security_score(result: &ScanResult) -> u32 {
    let mut score: f64 = 100.0;

    if result.verdicts.overall.malicious {
        score -= 60.0;
    }
    score -= 5.0 * result.verdicts.overall.categories.len() as f64;
    if third_party_ratio(result) > 0.8 {
        score -= 10.0;
    }
    if result.network.http_requests > 0 {
        score -= 5.0;
    }
    if result.page.content_security_policy {
        score += 5.0;
    }
    if result.page.final_url.starts_with("https://") {
        score += 5.0;
    }

    score.clamp(0.0, 100.0).round() as u32
}

/// Classify the risk level, top-down, first match wins
pub fn classify_risk(verdicts: &Verdicts) -> RiskLevel {
    let overall = &verdicts.overall;
    let flagged = [
        verdicts.phishing.detected,
        verdicts.malware.detected,
        verdicts.spam.detected,
    ]
    .iter()
    .filter(|d| **d)
    .count();

    if overall.malicious && flagged >= 2 {
        RiskLevel::Critical
    } else if overall.malicious && (verdicts.malware.detected || verdicts.phishing.detected) {
        RiskLevel::High
    } else if overall.malicious {
        RiskLevel::Medium
    } else if overall.categories.iter().any(|c| {
        let lower = c.to_lowercase();
        lower.contains("suspicious") || lower.contains("risk")
    }) {
        RiskLevel::Low
    } else {
        RiskLevel::Safe
    }
}

/// Threshold above which the third-party domain count is called out
const EXCESSIVE_THIRD_PARTY_DOMAINS: u32 = 20;

/// Build the threat and recommendation lists for a finished scan
fn threats_and_recommendations(result: &ScanResult) -> (Vec<String>, Vec<String>) {
    let mut threats = Vec::new();
    let mut recommendations = Vec::new();

    if result.verdicts.overall.malicious {
        threats.push("Page is flagged as malicious by the scanning service".to_string());
        recommendations.push("Do not visit this site".to_string());
    }
    for category in &result.verdicts.overall.categories {
        threats.push(format!("Flagged category: {category}"));
    }
    if result.network.http_requests > 0 {
        threats.push(format!(
            "Mixed content: {} request(s) loaded over plain HTTP",
            result.network.http_requests
        ));
        recommendations.push("Serve all resources over HTTPS".to_string());
    }
    if result.network.unique_domains > EXCESSIVE_THIRD_PARTY_DOMAINS {
        threats.push(format!(
            "Excessive third-party connections ({} unique domains)",
            result.network.unique_domains
        ));
        recommendations.push("Reduce the number of third-party hosts the page depends on".to_string());
    }
    if !result.page.content_security_policy {
        recommendations.push("Add a Content-Security-Policy header".to_string());
    }

    (threats, recommendations)
}

/// Reduce a finished scan into its decision-ready security summary
pub fn security_summary(result: &ScanResult) -> SecuritySummary {
    let (threats, recommendations) = threats_and_recommendations(result);
    SecuritySummary {
        risk_level: classify_risk(&result.verdicts),
        malicious: result.verdicts.overall.malicious,
        threats,
        recommendations,
        score: security_score(result),
    }
}

/// Helper for building category sets in tests and callers
pub fn category_set<I: IntoIterator<Item = S>, S: Into<String>>(items: I) -> BTreeSet<String> {
    items.into_iter().map(Into::into).collect()
}

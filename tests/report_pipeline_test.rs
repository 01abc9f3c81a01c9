//! End-to-end reduction pipeline over the public API: a finished scan result
//! and a field data set go in, compact decision-ready summaries come out.

use std::collections::BTreeMap;
use std::sync::Once;

use siteprobe::scoring;
use siteprobe::{
    Detection, DistributionBucket, FieldDataSet, FieldMetric, MetricCategory, MetricKey,
    NetworkSummary, OverallVerdict, PageSignals, RiskLevel, ScanResult, Technology, Verdicts,
};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

fn finished_scan() -> ScanResult {
    ScanResult {
        verdicts: Verdicts {
            overall: OverallVerdict {
                malicious: false,
                categories: Default::default(),
                tags: Default::default(),
            },
            phishing: Detection::new(false),
            malware: Detection::new(false),
            spam: Detection::new(false),
        },
        technologies: vec![
            Technology {
                name: "Nginx".to_string(),
                confidence: 100.0,
                categories: scoring::category_set(["Web servers"]),
            },
            Technology {
                name: "React".to_string(),
                confidence: 80.0,
                categories: scoring::category_set(["JavaScript frameworks"]),
            },
        ],
        network: NetworkSummary {
            total_requests: 42,
            unique_domains: 8,
            third_party_requests: 12,
            http_requests: 0,
            https_requests: 42,
        },
        page: PageSignals {
            final_url: "https://example.com/".to_string(),
            content_security_policy: true,
        },
    }
}

#[test]
fn clean_scan_reduces_to_safe_summary() {
    init_tracing();
    let summary = scoring::security_summary(&finished_scan());

    assert_eq!(summary.risk_level, RiskLevel::Safe);
    assert!(!summary.malicious);
    assert_eq!(summary.score, 100);
    assert!(summary.threats.is_empty());
    // A clean page with CSP already in place gets no boilerplate advice.
    assert!(summary.recommendations.is_empty());
}

#[test]
fn malicious_scan_reduces_to_critical_summary_with_threats() {
    let mut scan = finished_scan();
    scan.verdicts.overall.malicious = true;
    scan.verdicts.overall.categories = scoring::category_set(["phishing", "malware"]);
    scan.verdicts.phishing = Detection::new(true);
    scan.verdicts.malware = Detection::new(true);
    scan.network.http_requests = 5;

    let summary = scoring::security_summary(&scan);

    assert_eq!(summary.risk_level, RiskLevel::Critical);
    assert!(summary.malicious);
    assert!(summary.score <= 40);
    assert!(summary.threats.len() >= 3);
    assert!(summary.recommendations.iter().any(|r| r.contains("Do not visit")));
}

#[test]
fn technology_list_invariants_hold() {
    let scan = finished_scan();
    let confidences: Vec<f64> = scan.technologies.iter().map(|t| t.confidence).collect();
    assert!(confidences.windows(2).all(|w| w[0] >= w[1]), "not confidence-sorted");
    assert!(confidences.iter().all(|c| (0.0..=100.0).contains(c)));
}

#[test]
fn field_data_scores_through_the_breakdown() -> anyhow::Result<()> {
    use anyhow::Context;

    let mut metrics = BTreeMap::new();
    metrics.insert(
        MetricKey::LargestContentfulPaint,
        FieldMetric {
            percentile: 3250.0,
            category: MetricCategory::Average,
            distributions: vec![
                DistributionBucket { min: None, max: Some(2500.0), proportion: 0.45 },
                DistributionBucket { min: Some(2500.0), max: Some(4000.0), proportion: 0.35 },
                DistributionBucket { min: Some(4000.0), max: None, proportion: 0.20 },
            ],
        },
    );
    metrics.insert(
        MetricKey::TimeToFirstByte,
        FieldMetric {
            percentile: 600.0,
            category: MetricCategory::Fast,
            distributions: Vec::new(),
        },
    );
    let data = FieldDataSet { overall_category: Some(MetricCategory::Average), metrics };

    let breakdown =
        scoring::performance_score(&data).context("two metrics should produce a breakdown")?;

    // LCP midway between good and poor scores 50; TTFB under good scores 100.
    // Present weights only: (50 * 0.25 + 100 * 0.15) / 0.40 = 68.75 -> 69.
    assert_eq!(breakdown.overall_score, 69);

    let weight_total: f64 = breakdown.metrics.iter().map(|m| m.weight).sum();
    assert!((weight_total - 0.40).abs() < 1e-9);

    let lcp = breakdown
        .metrics
        .iter()
        .find(|m| m.key == MetricKey::LargestContentfulPaint)
        .context("LCP entry missing from breakdown")?;
    assert_eq!(lcp.score, 50);
    assert_eq!(lcp.label, "Largest Contentful Paint");

    // Distribution proportions of the LCP metric stay within rounding
    // tolerance of 1.0.
    let sum = data.metrics[&MetricKey::LargestContentfulPaint].distribution_sum();
    assert!((sum - 1.0).abs() <= 0.01);
    Ok(())
}

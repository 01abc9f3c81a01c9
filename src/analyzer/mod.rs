//! Per-request facade wiring the scan client, field-metric aggregator, and
//! scoring engine together.
//!
//! Every call is independent and stateless; an analyzer instance holds only
//! immutable credentials and connection pools and is safe for concurrent use.

use std::collections::BTreeMap;
use tracing::info;
use url::Url;

use crate::config::{FieldMetricsCredentials, ScannerCredentials};
use crate::domain::{
    DeviceProfile, FieldDataReport, SecurityReport, TechnologyReport, Visibility,
};
use crate::error::AnalysisError;
use crate::field_metrics::{FieldMetricsAggregator, HttpFieldMetricsApi};
use crate::scanner::{HttpScanApi, PollBudget, ScanClient, ScanOptions};
use crate::scoring;

/// Normalize a user-typed target into an absolute URL, defaulting the scheme
/// to `https` when none was given
pub fn normalize_url(input: &str) -> Result<Url, AnalysisError> {
    let trimmed = input.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    Ok(Url::parse(&candidate)?)
}

/// Entry points for one analysis request
pub struct SiteAnalyzer {
    technology: ScanClient<HttpScanApi>,
    security: ScanClient<HttpScanApi>,
    field_metrics: FieldMetricsAggregator<HttpFieldMetricsApi>,
}

impl SiteAnalyzer {
    /// Build an analyzer from environment credentials.
    ///
    /// Fails fast with [`AnalysisError::ConfigurationMissing`] before any
    /// network call when a credential is absent.
    pub fn from_env() -> Result<Self, AnalysisError> {
        let scanner_credentials = ScannerCredentials::from_env()?;
        let field_credentials = FieldMetricsCredentials::from_env()?;
        Self::new(&scanner_credentials, &field_credentials)
    }

    /// Build an analyzer from explicit credentials
    pub fn new(
        scanner_credentials: &ScannerCredentials,
        field_credentials: &FieldMetricsCredentials,
    ) -> Result<Self, AnalysisError> {
        let scan_api = HttpScanApi::new(scanner_credentials)?;
        Ok(Self {
            technology: ScanClient::new(scan_api.clone(), PollBudget::TECHNOLOGY),
            security: ScanClient::new(scan_api, PollBudget::SECURITY),
            field_metrics: FieldMetricsAggregator::new(HttpFieldMetricsApi::new(field_credentials)?),
        })
    }

    /// Fetch field performance metrics for the requested devices.
    ///
    /// Partial failure is tolerated: a device whose fetch fails is absent
    /// from the report, and an error is raised only when every requested
    /// fetch failed.
    pub async fn analyze_performance(
        &self,
        url: &str,
        devices: &[DeviceProfile],
    ) -> Result<FieldDataReport, AnalysisError> {
        let target = normalize_url(url)?;
        self.field_metrics.fetch(target.as_str(), devices).await
    }

    /// Run a technology-fingerprint scan to completion and return the
    /// confidence-sorted technology list
    pub async fn analyze_technology(&self, url: &str) -> Result<TechnologyReport, AnalysisError> {
        let target = normalize_url(url)?;
        let scan = self
            .technology
            .run(target.as_str(), Visibility::Unlisted, &ScanOptions::default())
            .await?;
        info!(
            job_id = %scan.job.id,
            attempts = scan.attempts,
            technologies = scan.result.technologies.len(),
            "technology scan complete"
        );
        Ok(TechnologyReport {
            job_id: scan.job.id,
            job_status: scan.job.status,
            technologies: scan.result.technologies,
        })
    }

    /// Run a full security scan to completion and reduce it to the
    /// decision-ready summary. The raw scan payload never crosses this
    /// boundary.
    pub async fn analyze_security(
        &self,
        url: &str,
        visibility: Option<Visibility>,
        custom_headers: Option<BTreeMap<String, String>>,
    ) -> Result<SecurityReport, AnalysisError> {
        let target = normalize_url(url)?;
        let options = ScanOptions {
            custom_headers: custom_headers.unwrap_or_default(),
            ..ScanOptions::default()
        };
        let scan = self
            .security
            .run(
                target.as_str(),
                visibility.unwrap_or(Visibility::Unlisted),
                &options,
            )
            .await?;

        let summary = scoring::security_summary(&scan.result);
        info!(
            job_id = %scan.job.id,
            attempts = scan.attempts,
            risk = %summary.risk_level,
            score = summary.score,
            "security scan complete"
        );
        Ok(SecurityReport {
            job_id: scan.job.id,
            job_status: scan.job.status,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_defaults_scheme_to_https() {
        let url = normalize_url("example.com/path").unwrap();
        assert_eq!(url.as_str(), "https://example.com/path");
    }

    #[test]
    fn test_normalize_url_keeps_explicit_scheme() {
        let url = normalize_url("http://example.com").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_normalize_url_trims_whitespace() {
        let url = normalize_url("  example.com  ").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_normalize_url_rejects_garbage() {
        assert!(normalize_url("http://").is_err());
    }
}

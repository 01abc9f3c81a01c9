//! HTTP implementation of the scan API seam.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::retry::RetryPolicy;
use super::wire::{self, ResultEnvelope, SearchResponse, SubmitBody};
use super::{FetchOutcome, ScanApi, ScanOptions, SubmitOutcome};
use crate::config::ScannerCredentials;
use crate::domain::{ScanJob, Visibility};
use crate::error::AnalysisError;

/// Per-request connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-request overall timeout; the polling budget is enforced separately by
/// the client
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Scan API client bound to one account.
///
/// Holds only immutable credentials and a connection pool, so it is cheap to
/// clone and safe to share across in-flight requests.
#[derive(Clone)]
pub struct HttpScanApi {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    retry: RetryPolicy,
}

impl HttpScanApi {
    /// Create a client for the account in the given credentials
    pub fn new(credentials: &ScannerCredentials) -> Result<Self, AnalysisError> {
        let base_url = format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/urlscanner/v2",
            credentials.account_id
        );
        Self::with_base_url(base_url, &credentials.api_token)
    }

    /// Create a client against an explicit base URL (tests, self-hosted
    /// gateways)
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_token: &str,
    ) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_token: api_token.to_string(),
            retry: RetryPolicy::default(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitPayload<'a> {
    url: &'a str,
    visibility: Visibility,
    screenshots_resolutions: &'a [String],
    custom_headers: &'a BTreeMap<String, String>,
}

#[async_trait]
impl ScanApi for HttpScanApi {
    async fn search_recent(&self, target_url: &str) -> Result<Option<ScanJob>, AnalysisError> {
        let url = format!("{}/search", self.base_url);
        let query = format!("task.url:\"{target_url}\"");

        let response = self
            .retry
            .send(|| {
                self.http
                    .get(&url)
                    .bearer_auth(&self.api_token)
                    .query(&[("q", query.as_str()), ("limit", "1")])
                    .send()
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalysisError::UnexpectedStatus {
                status: status.as_u16(),
                message,
            });
        }

        let body: SearchResponse = response.json().await?;
        let Some(hit) = body.results.into_iter().next() else {
            debug!(url = %target_url, "no recent scan found");
            return Ok(None);
        };

        Ok(Some(ScanJob::reused(hit.task.uuid, target_url, hit.task.time)))
    }

    async fn submit(
        &self,
        target_url: &str,
        visibility: Visibility,
        options: &ScanOptions,
    ) -> Result<SubmitOutcome, AnalysisError> {
        let url = format!("{}/scan", self.base_url);
        let payload = SubmitPayload {
            url: target_url,
            visibility,
            screenshots_resolutions: &options.screenshot_resolutions,
            custom_headers: &options.custom_headers,
        };

        let response = self
            .retry
            .send(|| {
                self.http
                    .post(&url)
                    .bearer_auth(&self.api_token)
                    .json(&payload)
                    .send()
            })
            .await?;

        let status = response.status().as_u16();
        // 409 carries the existing-scan reference in its body; everything
        // else non-2xx is a fatal submission error.
        if !(200..300).contains(&status) && status != 409 {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Submission { status, message });
        }

        let body: SubmitBody = response.json().await?;
        wire::interpret_submit(status, body)
    }

    async fn fetch_result(&self, job_id: &str) -> Result<FetchOutcome, AnalysisError> {
        let url = format!("{}/result/{}", self.base_url, job_id);

        let response = self
            .retry
            .send(|| self.http.get(&url).bearer_auth(&self.api_token).send())
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // The result endpoint 404s until the scan is indexed; this is a
            // transient condition, not an error.
            return Ok(FetchOutcome::NotReady);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalysisError::UnexpectedStatus {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ResultEnvelope = response.json().await?;
        wire::interpret_result(envelope)
    }
}

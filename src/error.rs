//! Error taxonomy for the analysis core
//!
//! "Not ready yet" is deliberately absent: it is expected control flow and is
//! modeled as [`crate::scanner::FetchOutcome::NotReady`], never as an error.

use std::time::Duration;

/// Errors surfaced by the scan, field-metric, and facade layers
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// A required credential is absent from the environment. Fatal, raised
    /// before any network call, never retried.
    #[error("configuration missing: {variable} is not set")]
    ConfigurationMissing { variable: &'static str },

    /// HTTP 429 persisted past the backoff budget.
    #[error("rate limited after {attempts} attempts ({elapsed:?})")]
    RateLimited { attempts: u32, elapsed: Duration },

    /// Scan submission was rejected (non-2xx, non-409).
    #[error("scan submission failed with status {status}: {message}")]
    Submission { status: u16, message: String },

    /// Any other endpoint answered with an unexpected non-2xx status.
    #[error("unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The external service answered with a body we cannot interpret.
    #[error("malformed response: {context}")]
    MalformedResponse { context: String },

    /// The job reached a terminal failure state on the external service.
    #[error("scan {job_id} failed: {message}")]
    ScanFailed { job_id: String, message: String },

    /// The polling budget was exhausted without a terminal state.
    #[error("scan {job_id} timed out after {attempts} attempts ({elapsed:?})")]
    ScanTimeout {
        job_id: String,
        attempts: u32,
        elapsed: Duration,
    },

    /// Every requested field-metric device fetch failed outright. Partial
    /// success is never an error.
    #[error("all field metric fetches failed: {}", .failures.join("; "))]
    AggregateFetch { failures: Vec<String> },

    /// The target URL could not be parsed even after scheme defaulting.
    #[error("invalid target url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

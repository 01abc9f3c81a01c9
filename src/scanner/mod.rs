//! Scan job client: submit, dedup-search, and poll-to-terminal against a
//! slow external scanning API.
//!
//! Both scanner call sites (technology fingerprinting and full security
//! scans) follow the same orchestration shape; only the poll budget differs:
//!
//! 1. Search for a recent job for the same URL; reuse it if found.
//! 2. Otherwise submit, treating an HTTP 409 with an embedded task reference
//!    as reuse rather than failure.
//! 3. Attempt one immediate result fetch and short-circuit if already done.
//! 4. Poll on a fixed interval until a terminal state or the budget expires.
//!
//! The caller enforces every deadline; timing out client-side does not cancel
//! work already submitted to the external service.

mod http;
mod retry;
mod wire;

pub use http::HttpScanApi;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::domain::{ScanJob, ScanResult, Visibility};
use crate::error::AnalysisError;

/// Submission options forwarded to the external service
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Screenshot resolutions to capture
    pub screenshot_resolutions: Vec<String>,
    /// Extra headers the scanner should send when loading the page
    pub custom_headers: BTreeMap<String, String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            screenshot_resolutions: vec!["desktop".to_string()],
            custom_headers: BTreeMap::new(),
        }
    }
}

/// Outcome of a submission call.
///
/// The external API answers with one of three shapes (new job, 409 with an
/// existing task reference, or a malformed body). The first two are modeled
/// here; the third is [`AnalysisError::MalformedResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A new job was created
    Created { id: String },
    /// The service answered 409 and pointed at an existing job for this URL
    AlreadyScanned { id: String },
}

/// Outcome of a result fetch.
///
/// "Not ready yet" is expected control flow during polling, so it is a
/// variant here rather than an error.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The job finished and produced a result
    Ready(ScanResult),
    /// The job has not reached a terminal state; keep polling
    NotReady,
    /// The job reached a terminal failure state on the external service
    Failed { message: String },
}

/// Time budget for the polling loop
#[derive(Debug, Clone, Copy)]
pub struct PollBudget {
    /// Hard deadline for the whole polling run
    pub max_wait: Duration,
    /// Fixed delay between result fetches
    pub interval: Duration,
}

impl PollBudget {
    /// Budget for technology-fingerprint scans
    pub const TECHNOLOGY: PollBudget = PollBudget {
        max_wait: Duration::from_secs(180),
        interval: Duration::from_secs(10),
    };

    /// Budget for full security scans
    pub const SECURITY: PollBudget = PollBudget {
        max_wait: Duration::from_secs(300),
        interval: Duration::from_secs(15),
    };
}

/// Raw operations against the external scanning service.
///
/// The HTTP implementation is [`HttpScanApi`]; tests script this seam.
#[async_trait]
pub trait ScanApi: Send + Sync {
    /// Search for the most recent existing job for a target URL
    async fn search_recent(&self, target_url: &str) -> Result<Option<ScanJob>, AnalysisError>;

    /// Submit a new scan for a target URL
    async fn submit(
        &self,
        target_url: &str,
        visibility: Visibility,
        options: &ScanOptions,
    ) -> Result<SubmitOutcome, AnalysisError>;

    /// Fetch the result of a job, distinguishing not-ready from failure
    async fn fetch_result(&self, job_id: &str) -> Result<FetchOutcome, AnalysisError>;
}

/// Result of a completed polling run (local accounting, no shared state)
#[derive(Debug, Clone)]
pub struct PollOutcome {
    /// The finished scan payload
    pub result: ScanResult,
    /// Result fetches performed, including the immediate first attempt
    pub attempts: u32,
    /// Wall-clock time spent waiting
    pub elapsed: Duration,
}

/// A scan driven all the way to a successful terminal state
#[derive(Debug, Clone)]
pub struct CompletedScan {
    /// The job that produced the result
    pub job: ScanJob,
    /// The finished scan payload
    pub result: ScanResult,
    /// Result fetches performed
    pub attempts: u32,
    /// Wall-clock time spent waiting
    pub elapsed: Duration,
}

/// Drives one scan job from submission (or reuse) to a terminal state.
///
/// Holds only the API seam and an immutable budget, so one client instance is
/// safe for concurrent use by multiple in-flight requests.
pub struct ScanClient<A> {
    api: A,
    budget: PollBudget,
}

impl<A: ScanApi> ScanClient<A> {
    /// Create a client with the given API implementation and poll budget
    pub fn new(api: A, budget: PollBudget) -> Self {
        Self { api, budget }
    }

    /// Run the full orchestration for one target URL
    pub async fn run(
        &self,
        target_url: &str,
        visibility: Visibility,
        options: &ScanOptions,
    ) -> Result<CompletedScan, AnalysisError> {
        let job = self.find_or_submit(target_url, visibility, options).await?;
        info!(job_id = %job.id, status = %job.status, url = %target_url, "scan job ready");

        let started = Instant::now();

        // Reused or fast jobs may already have a result; short-circuit the
        // polling loop entirely in that case.
        match self.api.fetch_result(&job.id).await? {
            FetchOutcome::Ready(result) => {
                return Ok(CompletedScan {
                    job,
                    result,
                    attempts: 1,
                    elapsed: started.elapsed(),
                });
            }
            FetchOutcome::Failed { message } => {
                return Err(AnalysisError::ScanFailed {
                    job_id: job.id,
                    message,
                });
            }
            FetchOutcome::NotReady => {
                debug!(job_id = %job.id, "result not ready, entering polling loop");
            }
        }

        let outcome = self.poll_until_terminal(&job.id, started, 1).await?;
        Ok(CompletedScan {
            job,
            result: outcome.result,
            attempts: outcome.attempts,
            elapsed: outcome.elapsed,
        })
    }

    /// Poll a known job id until it reaches a terminal state.
    ///
    /// Exposed for callers that already hold a job id; `run` is the usual
    /// entry point.
    pub async fn await_completion(&self, job_id: &str) -> Result<PollOutcome, AnalysisError> {
        self.poll_until_terminal(job_id, Instant::now(), 0).await
    }

    /// Step 1 and 2 of the orchestration: dedup search with submission
    /// fallback. Search failure is non-fatal.
    async fn find_or_submit(
        &self,
        target_url: &str,
        visibility: Visibility,
        options: &ScanOptions,
    ) -> Result<ScanJob, AnalysisError> {
        match self.api.search_recent(target_url).await {
            Ok(Some(job)) => {
                debug!(job_id = %job.id, "found recent scan for url, reusing");
                return Ok(job);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(url = %target_url, error = %err, "recent-scan search failed, submitting directly");
            }
        }

        match self.api.submit(target_url, visibility, options).await? {
            SubmitOutcome::Created { id } => Ok(ScanJob::submitted(id, target_url, visibility)),
            SubmitOutcome::AlreadyScanned { id } => {
                debug!(job_id = %id, "submission answered 409, reusing existing scan");
                Ok(ScanJob::reused(id, target_url, None))
            }
        }
    }

    async fn poll_until_terminal(
        &self,
        job_id: &str,
        started: Instant,
        mut attempts: u32,
    ) -> Result<PollOutcome, AnalysisError> {
        loop {
            if started.elapsed() >= self.budget.max_wait {
                return Err(AnalysisError::ScanTimeout {
                    job_id: job_id.to_string(),
                    attempts,
                    elapsed: started.elapsed(),
                });
            }

            sleep(self.budget.interval).await;
            attempts += 1;

            match self.api.fetch_result(job_id).await? {
                FetchOutcome::Ready(result) => {
                    return Ok(PollOutcome {
                        result,
                        attempts,
                        elapsed: started.elapsed(),
                    });
                }
                FetchOutcome::Failed { message } => {
                    return Err(AnalysisError::ScanFailed {
                        job_id: job_id.to_string(),
                        message,
                    });
                }
                FetchOutcome::NotReady => {
                    debug!(job_id, attempts, "scan not ready yet");
                }
            }
        }
    }
}

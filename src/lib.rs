//! siteprobe - scan orchestration and scoring for domain analysis reports
//!
//! siteprobe drives slow, rate-limited external scanning services (a malicious
//! URL scanner and a technology fingerprinter) to completion under time and
//! retry budgets, fetches real-user field metrics for mobile and desktop
//! concurrently, and reduces the raw signals into small, decision-ready
//! summaries: a 0-100 performance score, a 0-100 security score, and a
//! discrete risk level.
//!
//! ## Entry points
//!
//! [`SiteAnalyzer`] is the per-request facade. Each call is independent and
//! stateless; an analyzer instance holds only immutable credentials and is
//! safe for concurrent use:
//!
//! 1. `analyze_performance` - dual-device field metrics, partial-failure tolerant.
//! 2. `analyze_technology` - fingerprint scan, confidence-sorted technology list.
//! 3. `analyze_security` - full security scan plus score and risk classification.

pub mod analyzer;
pub mod config;
pub mod domain;
pub mod error;
pub mod field_metrics;
pub mod scanner;
pub mod scoring;

pub use analyzer::SiteAnalyzer;
pub use domain::*;
pub use error::AnalysisError;

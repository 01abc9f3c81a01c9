//! Credential loading for the external scanning and field-metric services
//!
//! Missing credentials fail fast with [`AnalysisError::ConfigurationMissing`]
//! before any network call is attempted. There is no silent degradation.

use crate::error::AnalysisError;

/// Environment variable holding the scanner account id
pub const SCANNER_ACCOUNT_ID_VAR: &str = "CLOUDFLARE_ACCOUNT_ID";

/// Environment variable holding the scanner API token
pub const SCANNER_API_TOKEN_VAR: &str = "CLOUDFLARE_API_TOKEN";

/// Environment variable holding the field-metrics API key
pub const FIELD_METRICS_API_KEY_VAR: &str = "CRUX_API_KEY";

/// Credentials for the URL scanning service
#[derive(Debug, Clone)]
pub struct ScannerCredentials {
    /// Account id, part of the API base path
    pub account_id: String,
    /// Bearer token for API calls
    pub api_token: String,
}

impl ScannerCredentials {
    /// Build credentials from explicit values
    pub fn new(account_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            api_token: api_token.into(),
        }
    }

    /// Load credentials from the environment
    pub fn from_env() -> Result<Self, AnalysisError> {
        Ok(Self {
            account_id: require_env(SCANNER_ACCOUNT_ID_VAR)?,
            api_token: require_env(SCANNER_API_TOKEN_VAR)?,
        })
    }
}

/// Credentials for the field-metrics service
#[derive(Debug, Clone)]
pub struct FieldMetricsCredentials {
    /// API key passed as a query parameter
    pub api_key: String,
}

impl FieldMetricsCredentials {
    /// Build credentials from an explicit key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Load credentials from the environment
    pub fn from_env() -> Result<Self, AnalysisError> {
        Ok(Self {
            api_key: require_env(FIELD_METRICS_API_KEY_VAR)?,
        })
    }
}

/// Read a required environment variable, treating empty values as absent
fn require_env(variable: &'static str) -> Result<String, AnalysisError> {
    match std::env::var(variable) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AnalysisError::ConfigurationMissing { variable }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_is_fatal_and_named() {
        // SAFETY: test-local key, no concurrent reader.
        unsafe { std::env::remove_var("SITEPROBE_TEST_ABSENT") };
        let err = require_env("SITEPROBE_TEST_ABSENT").unwrap_err();
        match err {
            AnalysisError::ConfigurationMissing { variable } => {
                assert_eq!(variable, "SITEPROBE_TEST_ABSENT");
            }
            other => panic!("expected ConfigurationMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_credential_counts_as_missing() {
        // SAFETY: test-local key, no concurrent reader.
        unsafe { std::env::set_var("SITEPROBE_TEST_EMPTY", "   ") };
        let err = require_env("SITEPROBE_TEST_EMPTY").unwrap_err();
        assert!(matches!(err, AnalysisError::ConfigurationMissing { .. }));
        unsafe { std::env::remove_var("SITEPROBE_TEST_EMPTY") };
    }
}

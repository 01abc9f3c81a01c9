//! Dual-source field metrics aggregator.
//!
//! Fetches the same real-user metrics for each requested device profile
//! concurrently and joins the results, tolerating partial failure: a device
//! whose fetch fails is simply absent from the report, and an error is raised
//! only when every requested fetch failed at the transport level. A device
//! that fetched fine but has no traffic data is a valid empty outcome.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::FieldMetricsCredentials;
use crate::domain::{
    DeviceProfile, DistributionBucket, FieldDataReport, FieldDataSet, FieldMetric, MetricCategory,
    MetricKey,
};
use crate::error::AnalysisError;

/// Bound on each per-device fetch, distinct from the scan polling budgets
const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Raw metric keys mapped onto canonical keys. Multiple legacy spellings map
/// to the same canonical key; when both appear, the later raw entry wins.
const KEY_RENAMES: &[(&str, MetricKey)] = &[
    ("largest_contentful_paint", MetricKey::LargestContentfulPaint),
    ("LARGEST_CONTENTFUL_PAINT_MS", MetricKey::LargestContentfulPaint),
    ("interaction_to_next_paint", MetricKey::InteractionToNextPaint),
    ("INTERACTION_TO_NEXT_PAINT", MetricKey::InteractionToNextPaint),
    ("experimental_interaction_to_next_paint", MetricKey::InteractionToNextPaint),
    ("cumulative_layout_shift", MetricKey::CumulativeLayoutShift),
    ("CUMULATIVE_LAYOUT_SHIFT_SCORE", MetricKey::CumulativeLayoutShift),
    ("first_contentful_paint", MetricKey::FirstContentfulPaint),
    ("FIRST_CONTENTFUL_PAINT_MS", MetricKey::FirstContentfulPaint),
    ("time_to_first_byte", MetricKey::TimeToFirstByte),
    ("EXPERIMENTAL_TIME_TO_FIRST_BYTE", MetricKey::TimeToFirstByte),
];

/// Map a raw source key to its canonical metric key
fn canonical_key(raw: &str) -> Option<MetricKey> {
    KEY_RENAMES
        .iter()
        .find(|(spelling, _)| *spelling == raw)
        .map(|(_, key)| *key)
}

/// Raw per-device record from the field-metrics API, with metric entries in
/// source order (later entries win on canonical-key collisions)
#[derive(Debug, Default)]
pub struct RawFieldRecord {
    pub overall_category: Option<String>,
    pub metrics: Vec<(String, RawFieldMetric)>,
}

/// One raw metric entry
#[derive(Debug, Default, Deserialize)]
pub struct RawFieldMetric {
    #[serde(default)]
    pub percentile: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub distributions: Vec<RawBucket>,
}

/// One raw distribution bucket
#[derive(Debug, Deserialize)]
pub struct RawBucket {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub proportion: f64,
}

/// Transform a raw record into a device data set. Returns `None` if no metric
/// survived the transformation; an absent metric is never a zero value.
pub fn transform_record(raw: RawFieldRecord) -> Option<FieldDataSet> {
    let mut metrics: BTreeMap<MetricKey, FieldMetric> = BTreeMap::new();

    for (raw_key, raw_metric) in raw.metrics {
        let Some(key) = canonical_key(&raw_key) else {
            debug!(raw_key, "ignoring unrecognized metric key");
            continue;
        };
        let Some(percentile) = raw_metric.percentile else {
            continue;
        };
        let category = raw_metric
            .category
            .as_deref()
            .and_then(MetricCategory::parse)
            .unwrap_or(MetricCategory::Average);
        let distributions = raw_metric
            .distributions
            .into_iter()
            .map(|b| DistributionBucket {
                min: b.min,
                max: b.max,
                proportion: b.proportion,
            })
            .collect();

        // Insert unconditionally: when legacy and current spellings are both
        // present, the later raw entry wins.
        metrics.insert(
            key,
            FieldMetric {
                percentile,
                category,
                distributions,
            },
        );
    }

    if metrics.is_empty() {
        return None;
    }

    Some(FieldDataSet {
        overall_category: raw.overall_category.as_deref().and_then(MetricCategory::parse),
        metrics,
    })
}

/// Raw per-device fetch against the field-metrics service
#[async_trait]
pub trait FieldMetricsApi: Send + Sync {
    /// Fetch the raw record for one URL and device profile
    async fn fetch_device(
        &self,
        url: &str,
        device: DeviceProfile,
    ) -> Result<RawFieldRecord, AnalysisError>;
}

/// HTTP implementation of the field-metrics seam
#[derive(Clone)]
pub struct HttpFieldMetricsApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Default endpoint of the field-metrics service
const DEFAULT_BASE_URL: &str = "https://chromeuxreport.googleapis.com/v1/records";

impl HttpFieldMetricsApi {
    /// Create a client with the default endpoint
    pub fn new(credentials: &FieldMetricsCredentials) -> Result<Self, AnalysisError> {
        Self::with_base_url(DEFAULT_BASE_URL, &credentials.api_key)
    }

    /// Create a client against an explicit base URL
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: &str,
    ) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.to_string(),
        })
    }
}

/// Wire shape of the per-device endpoint: an overall category plus a map of
/// raw metric keys
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldRecordBody {
    #[serde(default)]
    overall_category: Option<String>,
    #[serde(default)]
    metrics: BTreeMap<String, RawFieldMetric>,
}

#[async_trait]
impl FieldMetricsApi for HttpFieldMetricsApi {
    async fn fetch_device(
        &self,
        url: &str,
        device: DeviceProfile,
    ) -> Result<RawFieldRecord, AnalysisError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("url", url),
                ("formFactor", device.as_strategy()),
                ("key", self.api_key.as_str()),
            ])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalysisError::UnexpectedStatus {
                status: status.as_u16(),
                message,
            });
        }

        let body: FieldRecordBody = response.json().await?;
        Ok(RawFieldRecord {
            overall_category: body.overall_category,
            metrics: body.metrics.into_iter().collect(),
        })
    }
}

/// Joins concurrent per-device fetches into one report
pub struct FieldMetricsAggregator<A> {
    api: A,
}

impl<A: FieldMetricsApi> FieldMetricsAggregator<A> {
    /// Create an aggregator over the given API seam
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Fetch field data for every requested device concurrently.
    ///
    /// Neither fetch cancels the other; the report is assembled only after
    /// both settle. Raises [`AnalysisError::AggregateFetch`] only when every
    /// requested fetch failed outright.
    pub async fn fetch(
        &self,
        url: &str,
        devices: &[DeviceProfile],
    ) -> Result<FieldDataReport, AnalysisError> {
        let fetches = devices
            .iter()
            .map(|device| async move { (*device, self.api.fetch_device(url, *device).await) });
        let settled = join_all(fetches).await;

        let mut report = FieldDataReport::default();
        let mut failures = Vec::new();
        let mut any_fetch_succeeded = false;

        for (device, outcome) in settled {
            match outcome {
                Ok(raw) => {
                    any_fetch_succeeded = true;
                    match transform_record(raw) {
                        Some(data) => match device {
                            DeviceProfile::Mobile => report.mobile = Some(data),
                            DeviceProfile::Desktop => report.desktop = Some(data),
                        },
                        None => {
                            debug!(%device, url, "device fetched successfully but carried no metrics");
                        }
                    }
                }
                Err(err) => {
                    warn!(%device, url, error = %err, "field metric fetch failed");
                    failures.push(format!("{device}: {err}"));
                }
            }
        }

        if !any_fetch_succeeded && !devices.is_empty() {
            return Err(AnalysisError::AggregateFetch { failures });
        }

        report.has_data = report.mobile.is_some() || report.desktop.is_some();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_metric(percentile: f64) -> RawFieldMetric {
        RawFieldMetric {
            percentile: Some(percentile),
            category: Some("FAST".to_string()),
            distributions: vec![
                RawBucket { min: None, max: Some(2500.0), proportion: 0.8 },
                RawBucket { min: Some(2500.0), max: Some(4000.0), proportion: 0.15 },
                RawBucket { min: Some(4000.0), max: None, proportion: 0.05 },
            ],
        }
    }

    struct ScriptedFieldApi {
        mobile: Option<RawFieldRecord>,
        desktop: Option<RawFieldRecord>,
    }

    #[async_trait]
    impl FieldMetricsApi for ScriptedFieldApi {
        async fn fetch_device(
            &self,
            _url: &str,
            device: DeviceProfile,
        ) -> Result<RawFieldRecord, AnalysisError> {
            let slot = match device {
                DeviceProfile::Mobile => &self.mobile,
                DeviceProfile::Desktop => &self.desktop,
            };
            match slot {
                Some(record) => Ok(RawFieldRecord {
                    overall_category: record.overall_category.clone(),
                    metrics: record
                        .metrics
                        .iter()
                        .map(|(k, m)| {
                            (
                                k.clone(),
                                RawFieldMetric {
                                    percentile: m.percentile,
                                    category: m.category.clone(),
                                    distributions: m
                                        .distributions
                                        .iter()
                                        .map(|b| RawBucket {
                                            min: b.min,
                                            max: b.max,
                                            proportion: b.proportion,
                                        })
                                        .collect(),
                                },
                            )
                        })
                        .collect(),
                }),
                None => Err(AnalysisError::UnexpectedStatus {
                    status: 500,
                    message: "upstream unavailable".to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_rename_table_maps_legacy_spellings() {
        assert_eq!(
            canonical_key("LARGEST_CONTENTFUL_PAINT_MS"),
            Some(MetricKey::LargestContentfulPaint)
        );
        assert_eq!(
            canonical_key("experimental_interaction_to_next_paint"),
            Some(MetricKey::InteractionToNextPaint)
        );
        assert_eq!(canonical_key("first_input_delay"), None);
    }

    #[test]
    fn test_last_write_wins_for_duplicate_canonical_keys() {
        let raw = RawFieldRecord {
            overall_category: Some("AVERAGE".to_string()),
            metrics: vec![
                ("INTERACTION_TO_NEXT_PAINT".to_string(), raw_metric(180.0)),
                ("experimental_interaction_to_next_paint".to_string(), raw_metric(220.0)),
            ],
        };
        let data = transform_record(raw).unwrap();
        let inp = &data.metrics[&MetricKey::InteractionToNextPaint];
        assert_eq!(inp.percentile, 220.0);
        assert_eq!(data.metrics.len(), 1);
    }

    #[test]
    fn test_zero_surviving_metrics_means_no_data_set() {
        let raw = RawFieldRecord {
            overall_category: Some("FAST".to_string()),
            metrics: vec![("first_input_delay".to_string(), raw_metric(12.0))],
        };
        assert!(transform_record(raw).is_none());
    }

    #[test]
    fn test_metric_without_percentile_is_absent_not_zero() {
        let raw = RawFieldRecord {
            overall_category: None,
            metrics: vec![(
                "largest_contentful_paint".to_string(),
                RawFieldMetric { percentile: None, category: None, distributions: vec![] },
            )],
        };
        assert!(transform_record(raw).is_none());
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_surviving_device() {
        let api = ScriptedFieldApi {
            mobile: None,
            desktop: Some(RawFieldRecord {
                overall_category: Some("FAST".to_string()),
                metrics: vec![("largest_contentful_paint".to_string(), raw_metric(2100.0))],
            }),
        };
        let aggregator = FieldMetricsAggregator::new(api);

        let report = aggregator
            .fetch("https://example.com", &[DeviceProfile::Mobile, DeviceProfile::Desktop])
            .await
            .unwrap();

        assert!(report.has_data);
        assert!(report.mobile.is_none());
        assert!(report.desktop.is_some());
    }

    #[tokio::test]
    async fn test_all_fetches_failing_raises_aggregate_error() {
        let api = ScriptedFieldApi { mobile: None, desktop: None };
        let aggregator = FieldMetricsAggregator::new(api);

        let err = aggregator
            .fetch("https://example.com", &[DeviceProfile::Mobile, DeviceProfile::Desktop])
            .await
            .unwrap_err();

        match err {
            AnalysisError::AggregateFetch { failures } => assert_eq!(failures.len(), 2),
            other => panic!("expected AggregateFetch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_successful_fetch_with_no_traffic_is_not_an_error() {
        let api = ScriptedFieldApi {
            mobile: Some(RawFieldRecord::default()),
            desktop: Some(RawFieldRecord::default()),
        };
        let aggregator = FieldMetricsAggregator::new(api);

        let report = aggregator
            .fetch("https://example.com", &[DeviceProfile::Mobile, DeviceProfile::Desktop])
            .await
            .unwrap();

        assert!(!report.has_data);
        assert!(report.mobile.is_none());
        assert!(report.desktop.is_none());
    }
}

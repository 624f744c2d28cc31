//! Client for the Piwik analytics API
//!
//! Only one report is consumed: the per-URL page view breakdown of the
//! submission pages for the previous day.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{StatsError, StatsResult};
use crate::scalar::Scalar;

/// One entry of the `Actions.getPageUrls` report.
#[derive(Debug, Clone, PartialEq)]
pub struct PageUrlRecord {
    /// Path segment Piwik grouped the views under. Submission pages use
    /// the bare submission id.
    pub label: String,
    pub avg_time_on_page: Option<Scalar>,
    pub nb_visits: Option<Scalar>,
}

impl PageUrlRecord {
    pub fn new(label: impl Into<String>, avg_time_on_page: Scalar, nb_visits: Scalar) -> Self {
        Self {
            label: label.into(),
            avg_time_on_page: Some(avg_time_on_page),
            nb_visits: Some(nb_visits),
        }
    }

    /// The submission id this record is about, if the label is one.
    pub fn submission_id(&self) -> Option<&str> {
        let label = self.label.as_str();
        let numeric = !label.is_empty() && label.bytes().all(|b| b.is_ascii_digit());
        numeric.then_some(label)
    }
}

/// Source of page view statistics.
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    /// Fetch the page URL breakdown, in the order the API returned it.
    async fn page_urls(&self) -> StatsResult<Vec<PageUrlRecord>>;
}

/// Settings for the analytics API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// `token_auth` value sent with every request.
    #[serde(default)]
    pub token: String,

    /// Subtable holding the submission page URLs.
    #[serde(default = "default_subtable_id")]
    pub subtable_id: u32,

    /// Overall request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "https://www.weasyl.com/piwik/index.php".to_string()
}

fn default_subtable_id() -> u32 {
    29
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            subtable_id: default_subtable_id(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// HTTP client for the Piwik reporting API.
#[derive(Debug, Clone)]
pub struct PiwikClient {
    client: Client,
    config: AnalyticsConfig,
}

impl PiwikClient {
    pub fn new(config: AnalyticsConfig) -> StatsResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                StatsError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    /// Full request URL for the page URL report.
    pub fn page_urls_url(&self) -> StatsResult<Url> {
        let subtable = self.config.subtable_id.to_string();
        Url::parse_with_params(
            &self.config.base_url,
            &[
                ("module", "API"),
                ("method", "Actions.getPageUrls"),
                ("idSite", "1"),
                ("period", "day"),
                ("date", "yesterday"),
                ("format", "json"),
                ("idSubtable", subtable.as_str()),
                ("depth", "200"),
                ("token_auth", self.config.token.as_str()),
            ],
        )
        .map_err(|e| StatsError::configuration(format!("Invalid analytics base URL: {}", e)))
    }
}

#[async_trait]
impl AnalyticsSource for PiwikClient {
    async fn page_urls(&self) -> StatsResult<Vec<PageUrlRecord>> {
        let url = self.page_urls_url()?;
        debug!("Fetching page URL report from {}", self.config.base_url);

        let body: Value = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_page_urls(&body)
    }
}

/// Parse a `getPageUrls` JSON body.
///
/// Every record must be an object with a string `label`. The metric fields
/// are optional here; consumers decide whether a missing one is fatal.
pub fn parse_page_urls(body: &Value) -> StatsResult<Vec<PageUrlRecord>> {
    let records = match body {
        Value::Array(records) => records,
        Value::Object(map) if map.get("result").and_then(Value::as_str) == Some("error") => {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(StatsError::analytics(message));
        }
        other => {
            return Err(StatsError::malformed(format!(
                "expected an array of records, found {}",
                json_kind(other)
            )))
        }
    };

    records
        .iter()
        .enumerate()
        .map(|(idx, record)| -> StatsResult<PageUrlRecord> {
            let fields = record
                .as_object()
                .ok_or_else(|| {
                    StatsError::malformed(format!("record {} is not an object", idx))
                })?;
            let label = fields
                .get("label")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    StatsError::malformed(format!("record {} has no string label", idx))
                })?;

            Ok(PageUrlRecord {
                label: label.to_string(),
                avg_time_on_page: fields
                    .get("avg_time_on_page")
                    .map(Scalar::from_json)
                    .transpose()?,
                nb_visits: fields.get("nb_visits").map(Scalar::from_json).transpose()?,
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_submission_id_detection() {
        let record = |label: &str| PageUrlRecord::new(label, Scalar::Null, Scalar::Null);
        assert_eq!(record("42").submission_id(), Some("42"));
        assert_eq!(record("not-a-number").submission_id(), None);
        assert_eq!(record("").submission_id(), None);
        assert_eq!(record("12a").submission_id(), None);
        assert_eq!(record("-3").submission_id(), None);
    }

    #[test]
    fn test_parse_page_urls() {
        let body = json!([
            {"label": "42", "avg_time_on_page": 31, "nb_visits": 7, "nb_hits": 9},
            {"label": "/index", "nb_visits": 2}
        ]);
        let records = parse_page_urls(&body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, "42");
        assert_eq!(records[0].avg_time_on_page, Some(Scalar::Integer(31)));
        assert_eq!(records[0].nb_visits, Some(Scalar::Integer(7)));
        assert_eq!(records[1].avg_time_on_page, None);
    }

    #[test]
    fn test_parse_rejects_missing_label() {
        let err = parse_page_urls(&json!([{"nb_visits": 2}])).unwrap_err();
        assert_eq!(err.category(), "malformed_response");

        let err = parse_page_urls(&json!([{"label": 42}])).unwrap_err();
        assert_eq!(err.category(), "malformed_response");
    }

    #[test]
    fn test_parse_reports_api_errors() {
        let body = json!({"result": "error", "message": "You can't access this resource"});
        let err = parse_page_urls(&body).unwrap_err();
        assert_eq!(err.category(), "analytics");
        assert!(err.to_string().contains("can't access"));
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let err = parse_page_urls(&json!("nope")).unwrap_err();
        assert!(err.to_string().contains("a string"));
    }

    #[test]
    fn test_request_url() {
        let client = PiwikClient::new(AnalyticsConfig {
            token: "s3cret".to_string(),
            ..Default::default()
        })
        .unwrap();

        let url = client.page_urls_url().unwrap();
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(url.path(), "/piwik/index.php");
        assert!(query.contains(&("method".to_string(), "Actions.getPageUrls".to_string())));
        assert!(query.contains(&("idSubtable".to_string(), "29".to_string())));
        assert!(query.contains(&("depth".to_string(), "200".to_string())));
        assert!(query.contains(&("token_auth".to_string(), "s3cret".to_string())));
    }
}

//! Downstream notification and webhook chaining.
//!
//! One completion POST per terminal state, at most once, best effort: a
//! failed delivery is logged and never retried, and it does not change the
//! session's own terminal status. A successful completion additionally
//! chains the assessment to the market-gap service.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use url::Url;

use crate::error::{Error, Result};

const MODULE_NAME: &str = "it_assessment";
const CHAIN_MODULE: &str = "gap_market";

/// Terminal (or in-flight) status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Processing,
    Complete,
    Error,
}

/// Artifact reference in the completion payload.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRef {
    pub file_name: String,
    pub drive_url: Option<String>,
}

/// The completion payload, built once at the end of a run.
#[derive(Debug, Clone)]
pub struct CompletionNotice {
    pub session_id: String,
    pub status: RunStatus,
    pub files: Vec<ArtifactRef>,
    /// Chart name to shareable URL; rides as top-level payload keys.
    pub charts: BTreeMap<String, String>,
    pub error: Option<String>,
}

impl CompletionNotice {
    /// Wire shape: fixed fields plus one top-level key per chart.
    pub fn to_json(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("session_id".to_string(), json!(self.session_id));
        payload.insert("gpt_module".to_string(), json!(MODULE_NAME));
        payload.insert("status".to_string(), json!(self.status));
        payload.insert("files".to_string(), json!(self.files));
        if let Some(error) = &self.error {
            payload.insert("error".to_string(), json!(error));
        }
        for (name, url) in &self.charts {
            payload.insert(name.clone(), json!(url));
        }
        Value::Object(payload)
    }
}

/// File descriptor for the market-gap chain request.
#[derive(Debug, Clone, Serialize)]
pub struct ChainFile {
    pub file_name: String,
    pub file_url: Option<String>,
    pub file_type: String,
}

pub struct Notifier {
    client: Client,
    default_webhook: Url,
    market_gap_base: Url,
}

impl Notifier {
    pub fn new(default_webhook: Url, market_gap_base: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            default_webhook,
            market_gap_base,
        })
    }

    /// Send the completion payload to the caller's webhook, or the default
    /// downstream target when none was supplied. At most one POST; errors
    /// are logged and swallowed.
    pub async fn notify(&self, webhook: Option<&Url>, notice: &CompletionNotice) {
        let target = webhook.unwrap_or(&self.default_webhook);
        match self
            .client
            .post(target.clone())
            .json(&notice.to_json())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(session = %notice.session_id, target = %target, "completion notified");
            }
            Ok(response) => {
                warn!(
                    session = %notice.session_id,
                    target = %target,
                    status = %response.status(),
                    "webhook rejected completion payload"
                );
            }
            Err(e) => {
                warn!(session = %notice.session_id, target = %target, error = %e, "webhook unreachable");
            }
        }
    }

    /// Hand the finished assessment to the market-gap service. Best
    /// effort, like the webhook.
    pub async fn chain_market_gap(
        &self,
        session_id: &str,
        email: &str,
        files: &[ChainFile],
        next_action_webhook: Option<&Url>,
    ) {
        let endpoint = match self.market_gap_base.join("start_market_gap") {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "invalid market-gap base URL, chain skipped");
                return;
            }
        };
        let webhook = next_action_webhook.unwrap_or(&self.default_webhook);
        let payload = json!({
            "session_id": session_id,
            "email": email,
            "gpt_module": CHAIN_MODULE,
            "files": files,
            "next_action_webhook": webhook.as_str(),
        });

        match self.client.post(endpoint).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!(session = session_id, "market-gap chain triggered");
            }
            Ok(response) => {
                warn!(session = session_id, status = %response.status(), "market-gap chain rejected");
            }
            Err(e) => {
                warn!(session = session_id, error = %e, "market-gap chain unreachable");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_fixed_fields_and_chart_keys() {
        let mut charts = BTreeMap::new();
        charts.insert(
            "hw_tier_distribution".to_string(),
            "https://drive/abc".to_string(),
        );
        let notice = CompletionNotice {
            session_id: "s1".to_string(),
            status: RunStatus::Complete,
            files: vec![ArtifactRef {
                file_name: "HWGapAnalysis_s1.csv".to_string(),
                drive_url: Some("https://drive/hw".to_string()),
            }],
            charts,
            error: None,
        };

        let payload = notice.to_json();
        assert_eq!(payload["session_id"], "s1");
        assert_eq!(payload["gpt_module"], "it_assessment");
        assert_eq!(payload["status"], "complete");
        assert_eq!(payload["files"][0]["file_name"], "HWGapAnalysis_s1.csv");
        assert_eq!(payload["hw_tier_distribution"], "https://drive/abc");
        assert!(payload.get("error").is_none());
    }

    #[test]
    fn error_notice_carries_message_without_charts() {
        let notice = CompletionNotice {
            session_id: "s2".to_string(),
            status: RunStatus::Error,
            files: vec![],
            charts: BTreeMap::new(),
            error: Some("ingest blew up".to_string()),
        };
        let payload = notice.to_json();
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error"], "ingest blew up");
    }

    #[test]
    fn failed_uploads_serialize_as_null_urls() {
        let notice = CompletionNotice {
            session_id: "s3".to_string(),
            status: RunStatus::Complete,
            files: vec![ArtifactRef {
                file_name: "SWGapAnalysis_s3.csv".to_string(),
                drive_url: None,
            }],
            charts: BTreeMap::new(),
            error: None,
        };
        let payload = notice.to_json();
        assert!(payload["files"][0]["drive_url"].is_null());
    }
}

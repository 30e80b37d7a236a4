//! Report generation client.
//!
//! Posts the assembled payload to the external document renderer and falls
//! back to the local renderer when the service is unreachable or answers
//! without the required URL fields. Only a local-renderer failure is fatal
//! for a run.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::narrative::NarrativeSection;
use crate::render::{self, RenderInputs};
use crate::retry::RetryPolicy;

/// Reference to an uploaded gap-analysis sheet in the payload.
#[derive(Debug, Clone, Serialize)]
pub struct GapTableRef {
    pub file_name: String,
    pub url: Option<String>,
}

/// Payload posted to the external renderer.
#[derive(Debug, Serialize)]
pub struct ReportPayload {
    pub session_id: String,
    pub goal: String,
    pub gap_tables: Vec<GapTableRef>,
    /// Chart name to shareable URL where uploaded, else bare name.
    pub charts: BTreeMap<String, String>,
    pub sections: Vec<SectionPayload>,
}

#[derive(Debug, Serialize)]
pub struct SectionPayload {
    pub index: usize,
    pub title: String,
    pub content: String,
}

impl ReportPayload {
    pub fn section_from(section: &NarrativeSection) -> SectionPayload {
        SectionPayload {
            index: section.index,
            title: section.title.to_string(),
            content: section.content.clone(),
        }
    }
}

/// Where a rendered artifact lives.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentRef {
    Remote(Url),
    Local(PathBuf),
}

/// Both rendered artifacts for one run.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub docx: DocumentRef,
    pub pptx: DocumentRef,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    docx_url: Option<String>,
    pptx_url: Option<String>,
}

/// Client for the external document renderer.
pub struct ReportClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
    warmup_deadline: Duration,
}

impl ReportClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            retry: RetryPolicy::default(),
            warmup_deadline: Duration::from_secs(60),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_warmup_deadline(mut self, deadline: Duration) -> Self {
        self.warmup_deadline = deadline;
        self
    }

    /// Generate both documents, preferring the external service and
    /// recovering locally on any failure.
    pub async fn generate(
        &self,
        payload: &ReportPayload,
        fallback: &RenderInputs<'_>,
        output_dir: &std::path::Path,
    ) -> Result<RenderedReport> {
        self.wait_for_service().await;

        match self
            .retry
            .run("report generation", || self.call_renderer(payload))
            .await
        {
            Ok(report) => {
                info!("external renderer produced both documents");
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "external renderer unavailable, rendering locally");
                let (docx, pptx) = render::render_locally(output_dir, fallback)?;
                Ok(RenderedReport {
                    docx: DocumentRef::Local(docx),
                    pptx: DocumentRef::Local(pptx),
                })
            }
        }
    }

    /// Probe the service root until it answers 200; cold-started renderers
    /// need a moment. A dead probe just falls through to the POST.
    async fn wait_for_service(&self) {
        let start = tokio::time::Instant::now();
        loop {
            match self.client.head(self.base_url.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("renderer service is ready");
                    return;
                }
                _ if start.elapsed() >= self.warmup_deadline => {
                    warn!("renderer did not warm up in time, attempting anyway");
                    return;
                }
                _ => tokio::time::sleep(Duration::from_secs(3)).await,
            }
        }
    }

    async fn call_renderer(&self, payload: &ReportPayload) -> Result<RenderedReport> {
        let endpoint = self
            .base_url
            .join("generate_assessment")
            .map_err(|e| Error::Config(format!("bad renderer base URL: {e}")))?;
        let response = self.client.post(endpoint).json(payload).send().await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(format!(
                "renderer answered {}",
                response.status()
            )));
        }

        let parsed: RenderResponse = response
            .json()
            .await
            .map_err(|e| Error::External(format!("renderer response unreadable: {e}")))?;

        let docx = self.resolve_url(parsed.docx_url.as_deref(), "docx_url")?;
        let pptx = self.resolve_url(parsed.pptx_url.as_deref(), "pptx_url")?;
        Ok(RenderedReport {
            docx: DocumentRef::Remote(docx),
            pptx: DocumentRef::Remote(pptx),
        })
    }

    /// Relative URLs are resolved against the service base. A missing
    /// field counts as a malformed response and triggers the fallback.
    fn resolve_url(&self, raw: Option<&str>, field: &str) -> Result<Url> {
        let raw = raw
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::External(format!("renderer response missing {field}")))?;
        match Url::parse(raw) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base_url
                .join(raw)
                .map_err(|e| Error::External(format!("unresolvable {field} {raw}: {e}"))),
            Err(e) => Err(Error::External(format!("invalid {field} {raw}: {e}"))),
        }
    }
}

//! The assessment pipeline orchestrator.
//!
//! Runs one session end to end: ingestion, enrichment, charts and
//! narrative, report generation, artifact upload, and downstream
//! notification, strictly in that order. Any error inside a worker is
//! caught at the top level and reported as an error notice; a session can
//! fail, the process cannot.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use reqwest::Client;
use tracing::{error, info, warn};

use crate::charts;
use crate::config::AssayConfig;
use crate::enrich::{CatalogMarketLookup, Enricher, MarketLookup};
use crate::ingest;
use crate::narrative::{self, CompletionClient, LocalTextGenerator, TextGenerator};
use crate::notify::{ArtifactRef, ChainFile, CompletionNotice, Notifier, RunStatus};
use crate::render::{RenderInputs, DOCX_FILE_NAME, PPTX_FILE_NAME};
use crate::report::{DocumentRef, GapTableRef, ReportClient, ReportPayload};
use crate::session::Session;
use crate::storage::{ArtifactStore, DisabledStore, DriveStore};
use crate::templates::TemplateStore;

pub struct Pipeline {
    config: Arc<AssayConfig>,
    templates: Arc<TemplateStore>,
    http: Client,
    store: Arc<dyn ArtifactStore>,
    text_generator: Arc<dyn TextGenerator>,
    market: Arc<dyn MarketLookup>,
    report: ReportClient,
    notifier: Notifier,
}

impl Pipeline {
    /// Wire the pipeline from configuration: Drive uploads and the HTTP
    /// completion client when credentials exist, their offline stand-ins
    /// otherwise.
    pub fn from_config(
        config: Arc<AssayConfig>,
        templates: Arc<TemplateStore>,
    ) -> crate::error::Result<Self> {
        let store: Arc<dyn ArtifactStore> = match &config.drive {
            Some(drive) => Arc::new(DriveStore::new(drive.clone(), config.http_timeout)?),
            None => Arc::new(DisabledStore),
        };
        let text_generator: Arc<dyn TextGenerator> = match &config.completion {
            Some(completion) => Arc::new(CompletionClient::new(
                completion.clone(),
                config.http_timeout,
            )?),
            None => Arc::new(LocalTextGenerator),
        };
        let report = ReportClient::new(config.docx_service_url.clone(), config.http_timeout)?;
        let notifier = Notifier::new(
            config.market_gap_webhook.clone(),
            config.market_gap_webhook.clone(),
            config.http_timeout,
        )?;

        Ok(Self {
            config,
            templates,
            http: Client::new(),
            store,
            text_generator,
            market: Arc::new(CatalogMarketLookup),
            report,
            notifier,
        })
    }

    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_text_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.text_generator = generator;
        self
    }

    pub fn with_market_lookup(mut self, market: Arc<dyn MarketLookup>) -> Self {
        self.market = market;
        self
    }

    pub fn with_report_client(mut self, report: ReportClient) -> Self {
        self.report = report;
        self
    }

    /// Run a session to its terminal state and deliver exactly one
    /// notification for it. Never returns an error: failures become the
    /// error notice.
    pub async fn run(&self, session: Session) {
        info!(session = %session.id, files = session.files.len(), "assessment started");

        match self.execute(&session).await {
            Ok((notice, chain_files)) => {
                self.notifier.notify(session.webhook.as_ref(), &notice).await;
                self.notifier
                    .chain_market_gap(
                        &session.id,
                        &session.email,
                        &chain_files,
                        session.webhook.as_ref(),
                    )
                    .await;
                info!(session = %session.id, "assessment complete");
            }
            Err(e) => {
                error!(session = %session.id, error = ?e, "assessment failed");
                let notice = CompletionNotice {
                    session_id: session.id.clone(),
                    status: RunStatus::Error,
                    files: Vec::new(),
                    charts: BTreeMap::new(),
                    error: Some(format!("{e:#}")),
                };
                self.notifier.notify(session.webhook.as_ref(), &notice).await;
            }
        }
    }

    async fn execute(
        &self,
        session: &Session,
    ) -> anyhow::Result<(CompletionNotice, Vec<ChainFile>)> {
        let workdir = session.workdir().context("creating session workdir")?.to_path_buf();

        // Ingestion: fail-soft per file, both tables possibly empty.
        let outcome = ingest::ingest_files(
            session,
            &self.http,
            &self.config.rules,
            self.config.download_timeout,
        )
        .await
        .context("ingesting inventory files")?;
        if !outcome.skipped.is_empty() {
            warn!(
                session = %session.id,
                skipped = outcome.skipped.len(),
                "some inventory files were skipped"
            );
        }

        // Enrichment against the reference templates.
        let enricher = Enricher::new(self.templates.tiers(), self.market.as_ref());
        let hw = enricher
            .enrich(
                &outcome.hardware,
                crate::ingest::InventoryKind::Hardware,
                self.templates.hardware(),
            )
            .await;
        let sw = enricher
            .enrich(
                &outcome.software,
                crate::ingest::InventoryKind::Software,
                self.templates.software(),
            )
            .await;

        // Gap-analysis sheets on disk.
        let hw_name = format!("HWGapAnalysis_{}.csv", session.id);
        let sw_name = format!("SWGapAnalysis_{}.csv", session.id);
        let hw_path = workdir.join(&hw_name);
        let sw_path = workdir.join(&sw_name);
        hw.write_csv_path(&hw_path).context("writing hardware gap sheet")?;
        sw.write_csv_path(&sw_path).context("writing software gap sheet")?;

        // Charts and narrative are independent of each other.
        let charts_dir = session.charts_dir().context("creating charts dir")?;
        let chart_paths = charts::generate_charts(&hw, &sw, &charts_dir)
            .context("rendering charts")?;
        let sections = narrative::assemble(&hw, &sw, self.text_generator.as_ref()).await;

        // Gap sheets and charts upload before the report call so the
        // renderer payload can reference their URLs.
        let uploads_on = self.uploads_enabled(session);
        let hw_url = self.upload(uploads_on, &hw_path, &hw_name, &session.id).await;
        let sw_url = self.upload(uploads_on, &sw_path, &sw_name, &session.id).await;
        let mut chart_urls = BTreeMap::new();
        for (name, path) in &chart_paths {
            let file_name = format!("{name}.svg");
            if let Some(url) = self.upload(uploads_on, path, &file_name, &session.id).await {
                chart_urls.insert(name.clone(), url);
            }
        }

        let payload = ReportPayload {
            session_id: session.id.clone(),
            goal: session.goal.clone(),
            gap_tables: vec![
                GapTableRef {
                    file_name: hw_name.clone(),
                    url: hw_url.clone(),
                },
                GapTableRef {
                    file_name: sw_name.clone(),
                    url: sw_url.clone(),
                },
            ],
            charts: chart_urls.clone(),
            sections: sections.iter().map(ReportPayload::section_from).collect(),
        };

        let fallback = RenderInputs {
            session_id: &session.id,
            hw: &hw,
            sw: &sw,
            charts: &chart_paths,
            sections: &sections,
        };
        let rendered = self
            .report
            .generate(&payload, &fallback, &workdir)
            .await
            .context("report generation failed in both external and local paths")?;

        // Locally rendered documents still need uploading; remote ones
        // already live behind a URL.
        let docx_url = self
            .document_url(uploads_on, &rendered.docx, DOCX_FILE_NAME, &session.id)
            .await;
        let pptx_url = self
            .document_url(uploads_on, &rendered.pptx, PPTX_FILE_NAME, &session.id)
            .await;

        let files = vec![
            ArtifactRef {
                file_name: hw_name.clone(),
                drive_url: hw_url.clone(),
            },
            ArtifactRef {
                file_name: sw_name.clone(),
                drive_url: sw_url.clone(),
            },
            ArtifactRef {
                file_name: DOCX_FILE_NAME.to_string(),
                drive_url: docx_url.clone(),
            },
            ArtifactRef {
                file_name: PPTX_FILE_NAME.to_string(),
                drive_url: pptx_url.clone(),
            },
        ];

        let chain_files = vec![
            ChainFile {
                file_name: hw_name,
                file_url: hw_url,
                file_type: "gap_hw".to_string(),
            },
            ChainFile {
                file_name: sw_name,
                file_url: sw_url,
                file_type: "gap_sw".to_string(),
            },
            ChainFile {
                file_name: DOCX_FILE_NAME.to_string(),
                file_url: docx_url,
                file_type: "docx".to_string(),
            },
            ChainFile {
                file_name: PPTX_FILE_NAME.to_string(),
                file_url: pptx_url,
                file_type: "pptx".to_string(),
            },
        ];

        let notice = CompletionNotice {
            session_id: session.id.clone(),
            status: RunStatus::Complete,
            files,
            charts: chart_urls,
            error: None,
        };
        Ok((notice, chain_files))
    }

    /// One warning per run when storage is off, then silence.
    fn uploads_enabled(&self, session: &Session) -> bool {
        if self.store.enabled() {
            true
        } else {
            warn!(
                session = %session.id,
                "no storage credentials configured, artifacts will not be uploaded"
            );
            false
        }
    }

    /// Upload one artifact; a failure yields a missing URL, never an
    /// aborted run.
    async fn upload(
        &self,
        enabled: bool,
        path: &std::path::Path,
        name: &str,
        folder: &str,
    ) -> Option<String> {
        if !enabled {
            return None;
        }
        match self.store.upload(path, name, folder).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(file = name, error = %e, "upload failed, URL omitted from payload");
                None
            }
        }
    }

    async fn document_url(
        &self,
        uploads_on: bool,
        document: &DocumentRef,
        name: &str,
        folder: &str,
    ) -> Option<String> {
        match document {
            DocumentRef::Remote(url) => Some(url.to_string()),
            DocumentRef::Local(path) => self.upload(uploads_on, path, name, folder).await,
        }
    }
}


//! Narrative assembly for the assessment report.
//!
//! A fixed ordered sequence of section builders turns the enriched tables
//! into small structured summaries; each summary is passed through a
//! text-generation adapter to obtain prose. Section numbering
//! (`content_1..content_N`) is positional and stable across runs for the
//! same builder sequence.

mod completion;
pub mod sections;

pub use completion::CompletionClient;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::table::Table;

/// Item lists longer than this are split across multiple adapter calls to
/// respect the collaborator's input-size limits.
pub const CHUNK_SIZE: usize = 20;

/// Structured summary computed by one section builder.
#[derive(Debug, Clone)]
pub struct SectionSummary {
    pub key: &'static str,
    pub title: &'static str,
    /// Short factual overview, always present.
    pub overview: String,
    /// Optional item list; may be long and is chunked before narration.
    pub items: Vec<String>,
}

impl SectionSummary {
    pub fn new(key: &'static str, title: &'static str, overview: String) -> Self {
        Self {
            key,
            title,
            overview,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<String>) -> Self {
        self.items = items;
        self
    }
}

/// One chunk handed to the text-generation adapter.
#[derive(Debug)]
pub struct NarrativeRequest<'a> {
    pub title: &'a str,
    pub overview: &'a str,
    pub items: &'a [String],
}

/// Text-generation collaborator. Service-level retries live behind this
/// seam; the assembler only owns chunking.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn narrate(&self, request: NarrativeRequest<'_>) -> Result<String>;
}

/// Deterministic offline generator used when no completion endpoint is
/// configured.
pub struct LocalTextGenerator;

#[async_trait]
impl TextGenerator for LocalTextGenerator {
    async fn narrate(&self, request: NarrativeRequest<'_>) -> Result<String> {
        let mut prose = request.overview.trim().to_string();
        if !prose.ends_with('.') && !prose.is_empty() {
            prose.push('.');
        }
        if !request.items.is_empty() {
            prose.push_str(&format!(
                " Notable entries include {}.",
                request.items.iter().take(5).cloned().collect::<Vec<_>>().join("; ")
            ));
        }
        Ok(prose)
    }
}

/// A finished narrative section in report order.
#[derive(Debug, Clone, Serialize)]
pub struct NarrativeSection {
    /// One-based position; the payload key is `content_{index}`.
    pub index: usize,
    pub key: &'static str,
    pub title: &'static str,
    pub content: String,
}

impl NarrativeSection {
    pub fn content_key(&self) -> String {
        format!("content_{}", self.index)
    }
}

/// Run every section builder in order and narrate each summary.
///
/// A generator failure degrades the affected section to its structured
/// overview rather than failing the run.
pub async fn assemble(
    hw: &Table,
    sw: &Table,
    generator: &dyn TextGenerator,
) -> Vec<NarrativeSection> {
    let mut out = Vec::new();
    for (position, builder) in sections::builders().iter().enumerate() {
        let summary = builder(hw, sw);
        let content = match narrate_summary(generator, &summary).await {
            Ok(prose) => prose,
            Err(e) => {
                warn!(section = summary.key, error = %e, "narration failed, using overview");
                summary.overview.clone()
            }
        };
        out.push(NarrativeSection {
            index: position + 1,
            key: summary.key,
            title: summary.title,
            content,
        });
    }
    out
}

/// Narrate one summary, chunking long item lists into multiple adapter
/// calls joined with blank lines.
async fn narrate_summary(
    generator: &dyn TextGenerator,
    summary: &SectionSummary,
) -> Result<String> {
    if summary.items.len() <= CHUNK_SIZE {
        return generator
            .narrate(NarrativeRequest {
                title: summary.title,
                overview: &summary.overview,
                items: &summary.items,
            })
            .await;
    }

    let mut parts = Vec::new();
    for chunk in summary.items.chunks(CHUNK_SIZE) {
        let prose = generator
            .narrate(NarrativeRequest {
                title: summary.title,
                overview: &summary.overview,
                items: chunk,
            })
            .await?;
        parts.push(prose);
    }
    Ok(parts.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn narrate(&self, request: NarrativeRequest<'_>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("[{} items]", request.items.len()))
        }
    }

    #[tokio::test]
    async fn short_lists_narrate_in_one_call() {
        let generator = CountingGenerator {
            calls: AtomicUsize::new(0),
        };
        let summary = SectionSummary::new("s", "Section", "overview".to_string())
            .with_items((0..CHUNK_SIZE).map(|i| i.to_string()).collect());
        let prose = narrate_summary(&generator, &summary).await.unwrap();
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(prose, "[20 items]");
    }

    #[tokio::test]
    async fn long_lists_chunk_and_join_with_blank_lines() {
        let generator = CountingGenerator {
            calls: AtomicUsize::new(0),
        };
        let summary = SectionSummary::new("s", "Section", "overview".to_string())
            .with_items((0..45).map(|i| i.to_string()).collect());
        let prose = narrate_summary(&generator, &summary).await.unwrap();
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(prose, "[20 items]\n\n[20 items]\n\n[5 items]");
    }

    #[tokio::test]
    async fn empty_tables_produce_every_section() {
        let sections = assemble(&Table::new(), &Table::new(), &LocalTextGenerator).await;
        assert_eq!(sections.len(), sections::builders().len());
        assert_eq!(sections[0].index, 1);
        assert_eq!(sections.last().unwrap().content_key(), "content_20");
        for section in &sections {
            assert!(!section.content.is_empty(), "{} empty", section.key);
        }
    }

    #[tokio::test]
    async fn section_numbering_is_stable_across_runs() {
        let first = assemble(&Table::new(), &Table::new(), &LocalTextGenerator).await;
        let second = assemble(&Table::new(), &Table::new(), &LocalTextGenerator).await;
        let keys_first: Vec<_> = first.iter().map(|s| (s.index, s.key)).collect();
        let keys_second: Vec<_> = second.iter().map(|s| (s.index, s.key)).collect();
        assert_eq!(keys_first, keys_second);
    }
}
